//! Source text database for resolving diagnostic ranges to lines.

use crate::path::normalize;
use crate::range::SourceRange;
use crate::reader::SourceReader;
use kiln_common::ContentHash;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

/// Prefix of a line directive: `#line 12` renumbers the following line as 12.
pub const LINE_DIRECTIVE: &str = "#line";

/// A run of consecutive physical lines sharing one logical numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LineSegment {
    /// Logical number of the first line in the run.
    logical_start: u32,
    /// Zero-based physical index of the first line in the run.
    physical_start: usize,
    /// Number of lines in the run.
    len: usize,
}

/// A source file with precomputed line structure.
pub struct SourceFile {
    /// Normalized path of the file (may be a virtual path).
    pub path: PathBuf,
    /// The full text content.
    pub content: String,
    /// Hash of the content, used to detect edits.
    pub content_hash: ContentHash,
    lines: Vec<(usize, usize)>,
    segments: Vec<LineSegment>,
}

impl SourceFile {
    /// Creates a source file, indexing its lines and `#line` directives.
    pub fn new(path: PathBuf, content: String) -> Self {
        let lines = compute_lines(&content);
        let segments = compute_segments(&content, &lines);
        let content_hash = ContentHash::from_bytes(content.as_bytes());
        Self {
            path,
            content,
            content_hash,
            lines,
            segments,
        }
    }

    /// Returns the number of physical lines.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Returns the text of a logical line, without its terminator.
    ///
    /// When a logical number occurs in several directive regions (a
    /// synthesized header and the wrapped expression both start at line 1),
    /// the latest region wins.
    pub fn logical_line(&self, line: u32) -> Option<&str> {
        let physical = self.segments.iter().rev().find_map(|seg| {
            let offset = line.checked_sub(seg.logical_start)? as usize;
            (offset < seg.len).then_some(seg.physical_start + offset)
        })?;
        self.physical_line(physical)
    }

    fn physical_line(&self, index: usize) -> Option<&str> {
        let &(start, end) = self.lines.get(index)?;
        Some(&self.content[start..end])
    }
}

/// Computes `(start, end)` byte offsets of every line, excluding terminators.
fn compute_lines(content: &str) -> Vec<(usize, usize)> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            let end = if i > start && content.as_bytes()[i - 1] == b'\r' {
                i - 1
            } else {
                i
            };
            lines.push((start, end));
            start = i + 1;
        }
    }
    lines.push((start, content.len()));
    lines
}

/// Splits the physical lines into regions delimited by `#line` directives.
fn compute_segments(content: &str, lines: &[(usize, usize)]) -> Vec<LineSegment> {
    let mut segments = Vec::new();
    let mut current = LineSegment {
        logical_start: 1,
        physical_start: 0,
        len: 0,
    };
    for (index, &(start, end)) in lines.iter().enumerate() {
        match parse_line_directive(&content[start..end]) {
            Some(next) => {
                segments.push(current);
                current = LineSegment {
                    logical_start: next,
                    physical_start: index + 1,
                    len: 0,
                };
            }
            None => current.len += 1,
        }
    }
    segments.push(current);
    segments.retain(|seg| seg.len > 0);
    segments
}

fn parse_line_directive(line: &str) -> Option<u32> {
    let rest = line.trim_start().strip_prefix(LINE_DIRECTIVE)?;
    rest.split_whitespace().next()?.parse().ok()
}

/// The source database, owning loaded source text keyed by normalized path.
#[derive(Default)]
pub struct SourceDb {
    files: HashMap<PathBuf, SourceFile>,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a file from an in-memory string.
    pub fn add_source(&mut self, path: impl AsRef<Path>, content: impl Into<String>) {
        let path = normalize(path.as_ref());
        self.files
            .insert(path.clone(), SourceFile::new(path, content.into()));
    }

    /// Loads a file through the reader, so virtual files are visible.
    pub fn load_file(&mut self, reader: &SourceReader<'_>, path: &Path) -> io::Result<()> {
        let text = reader.read(path)?;
        self.add_source(path, text.content);
        Ok(())
    }

    /// Returns the file stored under `path`, if loaded.
    pub fn get_file(&self, path: &Path) -> Option<&SourceFile> {
        self.files.get(&normalize(path))
    }

    /// Returns the first logical line covered by a range, if its file is loaded.
    pub fn line_of(&self, range: &SourceRange) -> Option<&str> {
        self.get_file(&range.path)?.logical_line(range.start.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Pos;

    #[test]
    fn lines_without_directives() {
        let f = SourceFile::new(PathBuf::from("a.kk"), "abc\ndef\nghi".to_string());
        assert_eq!(f.line_count(), 3);
        assert_eq!(f.logical_line(1), Some("abc"));
        assert_eq!(f.logical_line(3), Some("ghi"));
        assert_eq!(f.logical_line(4), None);
    }

    #[test]
    fn crlf_terminators_are_stripped() {
        let f = SourceFile::new(PathBuf::from("a.kk"), "one\r\ntwo\r\n".to_string());
        assert_eq!(f.logical_line(1), Some("one"));
        assert_eq!(f.logical_line(2), Some("two"));
    }

    #[test]
    fn line_directive_renumbers_following_lines() {
        let text = "open import a\npub fun @expr() {\n#line 1\n1 + x\n}\n";
        let f = SourceFile::new(PathBuf::from("/@virtual/interactive.kk"), text.to_string());
        assert_eq!(f.logical_line(1), Some("1 + x"));
        assert_eq!(f.logical_line(2), Some("}"));
    }

    #[test]
    fn header_lines_before_directive_keep_numbers() {
        let text = "open import a\n#line 40\nbody";
        let f = SourceFile::new(PathBuf::from("v.kk"), text.to_string());
        assert_eq!(f.logical_line(40), Some("body"));
        assert_eq!(f.logical_line(1), Some("open import a"));
    }

    #[test]
    fn malformed_directive_is_a_plain_line() {
        let f = SourceFile::new(PathBuf::from("v.kk"), "#line x\nbody".to_string());
        assert_eq!(f.logical_line(1), Some("#line x"));
        assert_eq!(f.logical_line(2), Some("body"));
    }

    #[test]
    fn db_resolves_range_to_line() {
        let mut db = SourceDb::new();
        db.add_source("src/./a.kk", "fun f()\n  1");
        let range = SourceRange::new("src/a.kk", Pos::new(2, 3), Pos::new(2, 4));
        assert_eq!(db.line_of(&range), Some("  1"));
    }

    #[test]
    fn db_missing_file() {
        let db = SourceDb::new();
        let range = SourceRange::on_line("nope.kk", 1, 1, 1);
        assert!(db.line_of(&range).is_none());
    }

    #[test]
    fn content_hash_tracks_content() {
        let a = SourceFile::new(PathBuf::from("a.kk"), "x".to_string());
        let b = SourceFile::new(PathBuf::from("a.kk"), "y".to_string());
        assert_ne!(a.content_hash, b.content_hash);
    }
}
