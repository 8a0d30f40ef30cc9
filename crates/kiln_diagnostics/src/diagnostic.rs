//! Structured diagnostic messages with severity, code, range and notes.

use crate::code::DiagnosticCode;
use kiln_source::SourceRange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The severity level of a diagnostic, ordered from least to most severe.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub enum Severity {
    /// Additional context.
    Note,
    /// A potential problem that does not stop the build.
    Warning,
    /// A problem that puts the module into an error phase.
    Error,
}

impl Severity {
    /// Returns `true` if this severity is [`Error`](Severity::Error).
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A diagnostic message with an optional source location.
///
/// `excerpt` carries the source text the range refers to when the file is
/// not loadable later, as happens for virtual modules whose overlay is gone
/// by the time diagnostics are rendered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main message.
    pub message: String,
    /// Where the problem was detected, if known.
    pub range: Option<SourceRange>,
    /// The source line the range starts on, captured at emission time.
    pub excerpt: Option<String>,
    /// Explanatory footnotes.
    pub notes: Vec<String>,
    /// Actionable suggestions.
    pub help: Vec<String>,
}

impl Diagnostic {
    /// Creates an error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Error, code, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self::with_severity(Severity::Warning, code, message)
    }

    fn with_severity(severity: Severity, code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            range: None,
            excerpt: None,
            notes: Vec::new(),
            help: Vec::new(),
        }
    }

    /// Attaches a source range.
    pub fn at(mut self, range: SourceRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Captures the source line the range starts on.
    pub fn with_excerpt(mut self, line: impl Into<String>) -> Self {
        self.excerpt = Some(line.into());
        self
    }

    /// Adds a note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Adds a help message.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help.push(help.into());
        self
    }

    /// Returns `true` for error-severity diagnostics.
    pub fn is_error(&self) -> bool {
        self.severity.is_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    const T201: DiagnosticCode = DiagnosticCode::new(Category::Type, 201);

    #[test]
    fn severity_ordering() {
        assert!(Severity::Note < Severity::Warning);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error.is_error());
        assert!(!Severity::Warning.is_error());
    }

    #[test]
    fn create_error() {
        let diag = Diagnostic::error(T201, "types do not match");
        assert!(diag.is_error());
        assert_eq!(diag.message, "types do not match");
        assert!(diag.range.is_none());
    }

    #[test]
    fn builder_methods() {
        let range = SourceRange::on_line("a.kk", 1, 3, 1);
        let diag = Diagnostic::warning(T201, "unused value")
            .at(range.clone())
            .with_excerpt("1 + x")
            .with_note("inferred: int")
            .with_help("remove it");
        assert!(!diag.is_error());
        assert_eq!(diag.range, Some(range));
        assert_eq!(diag.excerpt.as_deref(), Some("1 + x"));
        assert_eq!(diag.notes.len(), 1);
        assert_eq!(diag.help.len(), 1);
    }
}
