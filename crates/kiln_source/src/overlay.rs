//! Scoped in-memory shadow of source files.
//!
//! A [`VirtualOverlay`] has a single slot. [`VirtualOverlay::install`] fills it
//! and returns an [`OverlayGuard`]; the slot is emptied when the guard drops,
//! on every exit path. A second installation while a guard is alive is an
//! error rather than a nested scope.

use crate::path::normalize;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Errors raised by overlay installation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OverlayError {
    /// An overlay is already installed.
    #[error("a virtual overlay is already installed (for {})", .path.display())]
    AlreadyInstalled {
        /// A path shadowed by the active overlay.
        path: PathBuf,
    },
}

/// Content and timestamp of one shadowed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualFile {
    /// The in-memory content.
    pub content: String,
    /// Modification time assigned when the content was written.
    pub modified: SystemTime,
}

/// A single-slot, scoped overlay of virtual source files.
#[derive(Default)]
pub struct VirtualOverlay {
    slot: RefCell<Option<HashMap<PathBuf, VirtualFile>>>,
    last_stamp: Cell<Option<SystemTime>>,
}

impl VirtualOverlay {
    /// Creates an empty overlay with nothing installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the overlay with one file and returns the guard that owns it.
    pub fn install(
        &self,
        path: &Path,
        content: impl Into<String>,
    ) -> Result<OverlayGuard<'_>, OverlayError> {
        let mut slot = self.slot.borrow_mut();
        if let Some(files) = slot.as_ref() {
            let path = files.keys().next().cloned().unwrap_or_default();
            return Err(OverlayError::AlreadyInstalled { path });
        }
        let mut files = HashMap::new();
        files.insert(normalize(path), self.stamp(content.into()));
        *slot = Some(files);
        Ok(OverlayGuard { overlay: self })
    }

    /// Returns `true` while a guard is alive.
    pub fn is_active(&self) -> bool {
        self.slot.borrow().is_some()
    }

    /// Reads a shadowed file.
    pub fn read(&self, path: &Path) -> Option<VirtualFile> {
        self.slot.borrow().as_ref()?.get(&normalize(path)).cloned()
    }

    /// Assigns a fresh timestamp that is strictly later than any previous one,
    /// so a rewrite within one clock tick still looks modified.
    fn stamp(&self, content: String) -> VirtualFile {
        let now = SystemTime::now();
        let modified = match self.last_stamp.get() {
            Some(last) if last >= now => last + Duration::from_nanos(1),
            _ => now,
        };
        self.last_stamp.set(Some(modified));
        VirtualFile { content, modified }
    }
}

/// Owns the installed overlay; dropping it uninstalls the overlay.
pub struct OverlayGuard<'a> {
    overlay: &'a VirtualOverlay,
}

impl OverlayGuard<'_> {
    /// Writes (or replaces) a shadowed file with a fresh timestamp.
    pub fn write(&self, path: &Path, content: impl Into<String>) {
        let file = self.overlay.stamp(content.into());
        if let Some(files) = self.overlay.slot.borrow_mut().as_mut() {
            files.insert(normalize(path), file);
        }
    }

    /// Returns the shadowed paths, sorted.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .overlay
            .slot
            .borrow()
            .as_ref()
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default();
        paths.sort();
        paths
    }
}

impl Drop for OverlayGuard<'_> {
    fn drop(&mut self) {
        self.overlay.slot.borrow_mut().take();
    }
}
