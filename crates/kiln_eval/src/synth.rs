//! Text of the synthetic interactive module.
//!
//! The module is plain source for the regular parser: one `open import` per
//! dependency, the wrapped expression as a public zero-argument function
//! preceded by a `#line 1` directive, and optionally a public `main` tagged
//! with the `io` effect that runs it.

use kiln_common::ModuleName;
use kiln_source::source_db::LINE_DIRECTIVE;

/// Basename of the synthetic source file.
pub const INTERACTIVE_BASENAME: &str = "@interactive";
/// Name of the function wrapping the expression.
pub const EXPR_FUN: &str = "@expr";
/// Name of the synthetic entry point.
pub const MAIN_FUN: &str = "main";
/// Printed instead of a function-typed result.
pub const FUNCTION_PLACEHOLDER: &str = "cannot print a function";

/// How the result of the expression is presented by `main`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Presentation {
    /// Evaluate and drop the result.
    Discard,
    /// Print a placeholder instead of a function value.
    Placeholder,
    /// Print the result.
    Show,
}

impl Presentation {
    /// Returns the `main` body statement for this presentation.
    pub fn statement(self) -> String {
        match self {
            Presentation::Discard => format!("val _ = {EXPR_FUN}(); ()"),
            Presentation::Placeholder => format!("println(\"{FUNCTION_PLACEHOLDER}\")"),
            Presentation::Show => format!("println({EXPR_FUN}())"),
        }
    }
}

/// Source of the type-check stub: imports plus the expression function.
pub fn expr_source(imports: &[ModuleName], expr: &str) -> String {
    let mut out = open_imports(imports);
    out.push('\n');
    out.push_str(&expr_function(expr));
    out
}

/// Source of the runnable module: the stub plus `main` running `body`.
///
/// `handler_modules` are imported (not opened) so the fully qualified
/// default handlers in `body` resolve.
pub fn main_source(
    imports: &[ModuleName],
    handler_modules: &[ModuleName],
    expr: &str,
    body: &str,
) -> String {
    let mut out = open_imports(imports);
    for module in handler_modules.iter().filter(|m| !imports.contains(m)) {
        out.push_str(&format!("import {module}\n"));
    }
    out.push('\n');
    out.push_str(&expr_function(expr));
    out.push('\n');
    out.push_str(&format!("pub fun {MAIN_FUN}() : io () {{\n  {body}\n}}\n"));
    out
}

/// Wraps `body` in a call to `handler` taking it as a closure.
pub fn wrap_handler(handler: &str, body: &str) -> String {
    format!("{handler}(fn() {{ {body} }})")
}

fn open_imports(imports: &[ModuleName]) -> String {
    imports
        .iter()
        .map(|module| format!("open import {module}\n"))
        .collect()
}

fn expr_function(expr: &str) -> String {
    format!("pub fun {EXPR_FUN}() {{\n{LINE_DIRECTIVE} 1\n{expr}\n}}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mods(list: &[&str]) -> Vec<ModuleName> {
        list.iter().map(ModuleName::new).collect()
    }

    #[test]
    fn expr_stub_layout() {
        let src = expr_source(&mods(&["std/core", "app/main"]), "1 + 1");
        assert_eq!(
            src,
            "open import std/core\nopen import app/main\n\npub fun @expr() {\n#line 1\n1 + 1\n}\n"
        );
    }

    #[test]
    fn expr_stub_without_imports() {
        assert!(expr_source(&[], "x").starts_with("\npub fun @expr() {\n"));
    }

    #[test]
    fn main_imports_handler_modules_once() {
        let src = main_source(
            &mods(&["std/core", "app/state"]),
            &mods(&["std/async", "app/state"]),
            "go()",
            "println(@expr())",
        );
        assert!(src.contains("open import app/state\n"));
        assert!(src.contains("import std/async\n"));
        assert!(!src.contains("\nimport app/state\n"));
        assert!(src.ends_with("pub fun main() : io () {\n  println(@expr())\n}\n"));
    }

    #[test]
    fn presentation_statements() {
        assert_eq!(Presentation::Show.statement(), "println(@expr())");
        assert_eq!(Presentation::Discard.statement(), "val _ = @expr(); ()");
        assert_eq!(
            Presentation::Placeholder.statement(),
            "println(\"cannot print a function\")"
        );
    }

    #[test]
    fn wrap_nests_closure() {
        assert_eq!(
            wrap_handler("std/core/default-exn", "println(@expr())"),
            "std/core/default-exn(fn() { println(@expr()) })"
        );
    }
}
