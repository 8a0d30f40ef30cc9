//! Diagnostics raised while evaluating expressions.

use kiln_build::errors::E_UNHANDLED;
use kiln_build::types::Type;
use kiln_diagnostics::Diagnostic;
use kiln_source::SourceRange;
use std::path::Path;

/// Diagnostic for an effect label with no default handler.
///
/// The range covers the first line of the expression in the virtual file.
pub fn unhandled_effect(label: &Type, effect: &Type, path: &Path, expr: &str) -> Diagnostic {
    let first = expr.lines().next().unwrap_or("");
    let width = first.chars().count().max(1) as u32;
    let name = label
        .head_name()
        .map_or_else(|| label.to_string(), |q| q.to_string());
    Diagnostic::error(E_UNHANDLED, format!("unhandled effect '{name}'"))
        .at(SourceRange::on_line(path, 1, 1, width))
        .with_excerpt(first)
        .with_note(format!("inferred effect: {effect}"))
        .with_help("handle the effect explicitly or define a default handler for it")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_at_expression() {
        let effect = Type::effect_row(vec![Type::handled("app/state/state")], None);
        let d = unhandled_effect(
            &Type::con("app/state/state"),
            &effect,
            Path::new("/@virtual/app/@interactive.kk"),
            "get() + 1\nmore",
        );
        assert_eq!(d.code.to_string(), "E301");
        assert_eq!(d.message, "unhandled effect 'app/state/state'");
        assert_eq!(d.excerpt.as_deref(), Some("get() + 1"));
        let range = d.range.unwrap();
        assert_eq!(range.start.line, 1);
        assert_eq!(d.notes[0], "inferred effect: <state>");
    }
}
