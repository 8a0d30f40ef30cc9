//! Overlay-aware source reading.

use crate::overlay::VirtualOverlay;
use std::io;
use std::path::Path;
use std::time::SystemTime;

/// Source text together with its modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    /// The file content.
    pub content: String,
    /// Last modification time.
    pub modified: SystemTime,
}

/// Reads sources, consulting the virtual overlay before the filesystem.
#[derive(Clone, Copy)]
pub struct SourceReader<'a> {
    overlay: &'a VirtualOverlay,
}

impl<'a> SourceReader<'a> {
    /// Creates a reader over the given overlay.
    pub fn new(overlay: &'a VirtualOverlay) -> Self {
        Self { overlay }
    }

    /// Reads a file's content and timestamp.
    pub fn read(&self, path: &Path) -> io::Result<SourceText> {
        if let Some(file) = self.overlay.read(path) {
            return Ok(SourceText {
                content: file.content,
                modified: file.modified,
            });
        }
        let content = std::fs::read_to_string(path)?;
        let modified = std::fs::metadata(path)?.modified()?;
        Ok(SourceText { content, modified })
    }

    /// Returns a file's modification time without reading it.
    pub fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        match self.overlay.read(path) {
            Some(file) => Ok(file.modified),
            None => std::fs::metadata(path)?.modified(),
        }
    }

    /// Returns `true` if the file exists in the overlay or on disk.
    pub fn exists(&self, path: &Path) -> bool {
        self.overlay.read(path).is_some() || path.is_file()
    }
}
