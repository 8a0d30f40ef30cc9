//! Human-readable diagnostic rendering with caret markers.

use crate::diagnostic::Diagnostic;
use kiln_source::SourceDb;

/// Formats diagnostics for an output target.
pub trait DiagnosticRenderer {
    /// Renders a single diagnostic into a formatted string.
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String;

    /// Renders a list of diagnostics, separated by blank lines.
    fn render_all(&self, diags: &[Diagnostic], source_db: &SourceDb) -> String {
        diags
            .iter()
            .map(|d| self.render(d, source_db))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Renders diagnostics in a rustc-style terminal format.
///
/// ```text
/// error[T201]: types do not match
///   --> /@virtual/@interactive.kk:1:5
///    |
///  1 | 1 + "a"
///    |     ^^^
///    = note: expected int
/// ```
///
/// The source line comes from the [`SourceDb`] (following `#line`
/// directives), falling back to the diagnostic's own excerpt when the
/// file is not loaded.
pub struct TerminalRenderer {
    /// Whether to use ANSI color codes in the header.
    pub color: bool,
}

impl TerminalRenderer {
    /// Creates a new terminal renderer.
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn header(&self, diag: &Diagnostic) -> String {
        let plain = format!("{}[{}]", diag.severity, diag.code);
        if !self.color {
            return plain;
        }
        let color = if diag.is_error() { "31" } else { "33" };
        format!("\x1b[1;{color}m{plain}\x1b[0m")
    }
}

impl DiagnosticRenderer for TerminalRenderer {
    fn render(&self, diag: &Diagnostic, source_db: &SourceDb) -> String {
        let mut out = format!("{}: {}\n", self.header(diag), diag.message);

        if let Some(range) = &diag.range {
            out.push_str(&format!("  --> {range}\n"));
            let line = source_db
                .line_of(range)
                .map(str::to_string)
                .or_else(|| diag.excerpt.clone());
            if let Some(line) = line {
                let line_num = range.start.line.to_string();
                let padding = " ".repeat(line_num.len());
                let col = range.start.col.max(1) as usize;
                let len = if range.is_single_line() {
                    range.end.col.saturating_sub(range.start.col).max(1) as usize
                } else {
                    line.chars().count().saturating_sub(col - 1).max(1)
                };
                out.push_str(&format!("{padding} |\n"));
                out.push_str(&format!("{line_num} | {line}\n"));
                out.push_str(&format!(
                    "{padding} | {}{}\n",
                    " ".repeat(col - 1),
                    "^".repeat(len)
                ));
            }
        }

        for note in &diag.notes {
            out.push_str(&format!("   = note: {note}\n"));
        }
        for help in &diag.help {
            out.push_str(&format!("   = help: {help}\n"));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::{Category, DiagnosticCode};
    use kiln_source::SourceRange;

    const T201: DiagnosticCode = DiagnosticCode::new(Category::Type, 201);

    #[test]
    fn renders_caret_under_range() {
        let mut db = SourceDb::new();
        db.add_source("a.kk", "val x = 1 + \"a\"\n");
        let diag = Diagnostic::error(T201, "types do not match")
            .at(SourceRange::on_line("a.kk", 1, 13, 3))
            .with_note("expected int");
        let out = TerminalRenderer::new(false).render(&diag, &db);
        assert!(out.starts_with("error[T201]: types do not match\n"));
        assert!(out.contains("  --> a.kk:1:13"));
        assert!(out.contains("1 | val x = 1 + \"a\"\n"));
        assert!(out.contains(&format!("  | {}^^^\n", " ".repeat(12))));
        assert!(out.contains("   = note: expected int"));
    }

    #[test]
    fn follows_line_directives() {
        let mut db = SourceDb::new();
        db.add_source(
            "/@virtual/@interactive.kk",
            "import std\npub fun @expr() {\n#line 1\n1 + true\n}\n",
        );
        let diag = Diagnostic::error(T201, "types do not match")
            .at(SourceRange::on_line("/@virtual/@interactive.kk", 1, 5, 4));
        let out = TerminalRenderer::new(false).render(&diag, &db);
        assert!(out.contains("1 | 1 + true\n"));
        assert!(out.contains("  |     ^^^^\n"));
    }

    #[test]
    fn falls_back_to_excerpt() {
        let db = SourceDb::new();
        let diag = Diagnostic::error(T201, "bad")
            .at(SourceRange::on_line("gone.kk", 2, 1, 2))
            .with_excerpt("xy + 1");
        let out = TerminalRenderer::new(false).render(&diag, &db);
        assert!(out.contains("2 | xy + 1\n"));
        assert!(out.contains("  | ^^\n"));
    }

    #[test]
    fn no_range_renders_header_only() {
        let db = SourceDb::new();
        let diag = Diagnostic::error(T201, "oops").with_help("try again");
        let out = TerminalRenderer::new(false).render(&diag, &db);
        assert_eq!(out, "error[T201]: oops\n   = help: try again\n");
    }

    #[test]
    fn color_wraps_header() {
        let db = SourceDb::new();
        let out = TerminalRenderer::new(true).render(&Diagnostic::error(T201, "x"), &db);
        assert!(out.starts_with("\x1b[1;31merror[T201]\x1b[0m: x"));
    }
}
