//! Diagnostic codes with category prefixes for structured error identification.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The error taxonomy of the build core, one variant per failure family.
///
/// Each category maps to a single-character prefix used in code display
/// (e.g., `T201` for a type error, `E301` for an unhandled effect).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Category {
    /// Lexing and parsing failures, prefixed with `P`.
    Parse,
    /// Type inference and checking failures, prefixed with `T`.
    Type,
    /// Effects without a resolvable default handler, prefixed with `E`.
    Effect,
    /// Code generation and linking failures, prefixed with `B`.
    Build,
    /// Missing or ambiguous symbols and modules, prefixed with `R`.
    Resolve,
}

impl Category {
    /// Returns the single-character prefix for this category.
    pub fn prefix(self) -> char {
        match self {
            Category::Parse => 'P',
            Category::Type => 'T',
            Category::Effect => 'E',
            Category::Build => 'B',
            Category::Resolve => 'R',
        }
    }
}

/// A structured diagnostic code: category prefix plus a numeric identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct DiagnosticCode {
    /// The category of this diagnostic.
    pub category: Category,
    /// The numeric identifier within the category.
    pub number: u16,
}

impl DiagnosticCode {
    /// Creates a new diagnostic code.
    pub const fn new(category: Category, number: u16) -> Self {
        Self { category, number }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:03}", self.category.prefix(), self.number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_format() {
        assert_eq!(DiagnosticCode::new(Category::Parse, 101).to_string(), "P101");
        assert_eq!(DiagnosticCode::new(Category::Type, 7).to_string(), "T007");
        assert_eq!(DiagnosticCode::new(Category::Effect, 301).to_string(), "E301");
        assert_eq!(DiagnosticCode::new(Category::Build, 401).to_string(), "B401");
        assert_eq!(DiagnosticCode::new(Category::Resolve, 502).to_string(), "R502");
    }

    #[test]
    fn const_construction() {
        const CODE: DiagnosticCode = DiagnosticCode::new(Category::Type, 201);
        assert_eq!(CODE.category, Category::Type);
    }

    #[test]
    fn serde_roundtrip() {
        let code = DiagnosticCode::new(Category::Resolve, 501);
        let json = serde_json::to_string(&code).unwrap();
        let back: DiagnosticCode = serde_json::from_str(&json).unwrap();
        assert_eq!(code, back);
    }
}
