//! Line/column ranges within source files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A 1-indexed line/column position.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct Pos {
    /// Line number, starting at 1.
    pub line: u32,
    /// Column number, starting at 1.
    pub col: u32,
}

impl Pos {
    /// Creates a position.
    pub fn new(line: u32, col: u32) -> Self {
        Self { line, col }
    }
}

/// A range of source text in a named file.
///
/// `start` is inclusive and `end` is exclusive. Line numbers are *logical*:
/// inside a file with `#line` directives they follow the directive, which is
/// how diagnostics in a synthesized module point at the user's expression.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct SourceRange {
    /// The file the range belongs to.
    pub path: PathBuf,
    /// First position covered by the range.
    pub start: Pos,
    /// First position past the range.
    pub end: Pos,
}

impl SourceRange {
    /// Creates a range.
    pub fn new(path: impl Into<PathBuf>, start: Pos, end: Pos) -> Self {
        Self {
            path: path.into(),
            start,
            end,
        }
    }

    /// Creates a range covering `len` characters on a single line.
    pub fn on_line(path: impl Into<PathBuf>, line: u32, col: u32, len: u32) -> Self {
        Self::new(path, Pos::new(line, col), Pos::new(line, col + len))
    }

    /// Returns `true` if the range lies in `path`.
    pub fn is_in(&self, path: &Path) -> bool {
        self.path == path
    }

    /// Returns `true` if the range starts and ends on the same line.
    pub fn is_single_line(&self) -> bool {
        self.start.line == self.end.line
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.path.display(),
            self.start.line,
            self.start.col
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_shows_start() {
        let r = SourceRange::new("src/a.kk", Pos::new(10, 5), Pos::new(12, 1));
        assert_eq!(r.to_string(), "src/a.kk:10:5");
    }

    #[test]
    fn on_line_builds_single_line_range() {
        let r = SourceRange::on_line("a.kk", 3, 4, 2);
        assert!(r.is_single_line());
        assert_eq!(r.end, Pos::new(3, 6));
        assert!(r.is_in(Path::new("a.kk")));
    }

    #[test]
    fn positions_order_by_line_then_column() {
        assert!(Pos::new(1, 9) < Pos::new(2, 1));
        assert!(Pos::new(2, 1) < Pos::new(2, 2));
    }

    #[test]
    fn serde_roundtrip() {
        let r = SourceRange::on_line("x.kk", 1, 1, 3);
        let json = serde_json::to_string(&r).unwrap();
        let back: SourceRange = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
