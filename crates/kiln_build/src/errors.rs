//! Diagnostic codes and constructors used by the build core.

use kiln_common::{ModuleName, QualifiedName};
use kiln_diagnostics::{Category, Diagnostic, DiagnosticCode};

/// A source file failed to parse.
pub const P_SYNTAX: DiagnosticCode = DiagnosticCode::new(Category::Parse, 101);
/// Type checking failed.
pub const T_MISMATCH: DiagnosticCode = DiagnosticCode::new(Category::Type, 201);
/// An expression needs an effect handler that has no default.
pub const E_UNHANDLED: DiagnosticCode = DiagnosticCode::new(Category::Effect, 301);
/// Code generation or linking failed.
pub const B_LINK: DiagnosticCode = DiagnosticCode::new(Category::Build, 401);
/// No symbol matches a name.
pub const R_UNKNOWN_SYMBOL: DiagnosticCode = DiagnosticCode::new(Category::Resolve, 501);
/// More than one symbol matches a name.
pub const R_AMBIGUOUS_SYMBOL: DiagnosticCode = DiagnosticCode::new(Category::Resolve, 502);
/// A module is not in the build context.
pub const R_UNKNOWN_MODULE: DiagnosticCode = DiagnosticCode::new(Category::Resolve, 503);

/// Diagnostic for a name with no matching symbol.
pub fn unknown_symbol(name: &str) -> Diagnostic {
    Diagnostic::error(R_UNKNOWN_SYMBOL, format!("unknown symbol '{name}'"))
}

/// Diagnostic for a name matching several symbols.
pub fn ambiguous_symbol(name: &str, candidates: &[QualifiedName]) -> Diagnostic {
    let list: Vec<String> = candidates.iter().map(|c| c.to_string()).collect();
    Diagnostic::error(R_AMBIGUOUS_SYMBOL, format!("ambiguous symbol '{name}'"))
        .with_note(format!("candidates: {}", list.join(", ")))
        .with_help("qualify the name with its module")
}

/// Diagnostic for a module that is not loaded.
pub fn unknown_module(name: &ModuleName) -> Diagnostic {
    Diagnostic::error(R_UNKNOWN_MODULE, format!("module '{name}' is not loaded"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_render_with_prefix() {
        assert_eq!(P_SYNTAX.to_string(), "P101");
        assert_eq!(T_MISMATCH.to_string(), "T201");
        assert_eq!(E_UNHANDLED.to_string(), "E301");
        assert_eq!(B_LINK.to_string(), "B401");
        assert_eq!(R_AMBIGUOUS_SYMBOL.to_string(), "R502");
    }

    #[test]
    fn ambiguous_lists_candidates() {
        let d = ambiguous_symbol(
            "show",
            &[
                QualifiedName::parse("a/show").unwrap(),
                QualifiedName::parse("b/show").unwrap(),
            ],
        );
        assert_eq!(d.code, R_AMBIGUOUS_SYMBOL);
        assert_eq!(d.notes, vec!["candidates: a/show, b/show"]);
    }

    #[test]
    fn unknown_module_message() {
        let d = unknown_module(&ModuleName::new("x/y"));
        assert_eq!(d.message, "module 'x/y' is not loaded");
    }
}
