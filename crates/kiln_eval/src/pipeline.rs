//! Expression and entry compilation.
//!
//! An expression is compiled in two rounds inside one virtual module. The
//! first round type checks a stub that wraps the expression in a function.
//! The second replaces the stub with a runnable `main` that discharges the
//! inferred effects through default handlers and prints the result, then
//! builds it.

use crate::errors;
use crate::handlers::wrap_default_handlers;
use crate::synth::{self, Presentation, EXPR_FUN, INTERACTIVE_BASENAME, MAIN_FUN};
use crate::virtual_module::with_virtual_module;
use kiln_build::types::Type;
use kiln_build::{BuildContext, BuildEnv, BuildError, BuildResult, Entry, Module};
use kiln_common::{InternalError, ModuleName, QualifiedName};
use kiln_diagnostics::Diagnostic;
use kiln_source::path::{normalize, same_path, virtual_path};
use kiln_source::SourceFile;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Flags of one compilation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CompileOptions {
    /// Print the result of the expression.
    pub add_show: bool,
    /// Stop after type checking; no entry point is produced.
    pub type_check_only: bool,
}

impl CompileOptions {
    /// Build an entry point that prints the result.
    pub const fn show() -> Self {
        Self {
            add_show: true,
            type_check_only: false,
        }
    }

    /// Build an entry point that discards the result.
    pub const fn silent() -> Self {
        Self {
            add_show: false,
            type_check_only: false,
        }
    }

    /// Only infer the type.
    pub const fn type_only() -> Self {
        Self {
            add_show: false,
            type_check_only: true,
        }
    }
}

/// The outcome of a successful compilation.
#[derive(Clone, Debug)]
pub struct Compiled {
    /// Inferred scheme of the wrapper function.
    pub scheme: Type,
    /// Instantiated result type of the expression.
    pub result: Type,
    /// Inferred effect row of the expression.
    pub effect: Type,
    /// The runnable program; `None` when only type checking was requested.
    pub entry: Option<Entry>,
}

/// Compiles an expression against `imports`, or against the roots when
/// `imports` is empty.
///
/// Returns `Ok(None)` after reporting diagnostics when the expression has
/// type, effect or build errors; the context stays usable.
pub fn compile_expr(
    ctx: &mut BuildContext,
    env: &BuildEnv<'_>,
    options: CompileOptions,
    imports: &[ModuleName],
    expr: &str,
) -> BuildResult<Option<Compiled>> {
    let imports: Vec<ModuleName> = if imports.is_empty() {
        ctx.roots().to_vec()
    } else {
        imports.to_vec()
    };
    let dir = virtual_dir(ctx, env, &imports);
    let path = virtual_path(
        env.virtual_mount(),
        &dir,
        INTERACTIVE_BASENAME,
        env.source_extension(),
    );
    let stub = synth::expr_source(&imports, expr);
    debug!(path = %path.display(), ?options, "compiling expression");

    with_virtual_module(ctx, env, &path, &stub, |ctx, guard, vname| {
        ctx.type_check(env)?;
        if report_errors(ctx, env, vname, &path, &stub) {
            return Ok(None);
        }

        let expr_name = vname.qualify(EXPR_FUN);
        let scheme = ctx
            .lookup_type_of(&expr_name)
            .ok_or_else(|| InternalError::new(format!("no type inferred for '{expr_name}'")))?;
        let Some((_, effect, result)) = scheme.as_function() else {
            return Err(InternalError::new(format!(
                "'{expr_name}' has non-function type {scheme}"
            ))
            .into());
        };
        let mut compiled = Compiled {
            effect: effect.clone(),
            result: result.clone(),
            scheme: scheme.clone(),
            entry: None,
        };
        if options.type_check_only {
            return Ok(Some(compiled));
        }

        let statement = presentation(&compiled.result, options.add_show).statement();
        let labels = env.host.effect_labels(&compiled.effect);
        let wrapped = match wrap_default_handlers(ctx, &labels, statement) {
            Ok(wrapped) => wrapped,
            Err(label) => {
                env.sink
                    .emit(errors::unhandled_effect(&label, &compiled.effect, &path, expr));
                return Ok(None);
            }
        };

        let source = synth::main_source(&imports, &wrapped.handler_modules, expr, &wrapped.body);
        guard.write(&path, source.as_str());
        ctx.build(env, &[vname.qualify(MAIN_FUN)])?;
        if report_errors(ctx, env, vname, &path, &source) {
            return Ok(None);
        }

        let entry = ctx
            .lookup_module(vname)
            .and_then(Module::entry)
            .cloned()
            .ok_or_else(|| InternalError::new(format!("'{vname}' linked without an entry point")))?;
        info!(exe = %entry.exe.display(), "expression compiled");
        compiled.entry = Some(entry);
        Ok(Some(compiled))
    })
}

/// Compiles a call of the zero-argument function `name`.
///
/// A qualified name (`a/f` or `a.f`) is imported from its own module; a bare
/// name must resolve to exactly one symbol in the context.
pub fn compile_entry(
    ctx: &mut BuildContext,
    env: &BuildEnv<'_>,
    options: CompileOptions,
    name: &str,
) -> BuildResult<Option<Compiled>> {
    let qname = match QualifiedName::parse(name) {
        Some(qname) => qname,
        None => ctx.lookup_unqualified(name)?.name,
    };
    let imports = [qname.module.clone()];
    compile_expr(ctx, env, options, &imports, &format!("{qname}()"))
}

/// Compiles and runs the function `name`, discarding its result.
pub fn run_entry(
    ctx: &mut BuildContext,
    env: &BuildEnv<'_>,
    name: &str,
) -> BuildResult<Option<Compiled>> {
    let compiled = compile_entry(ctx, env, CompileOptions::silent(), name)?;
    run_compiled(compiled)
}

/// Compiles and runs an expression, printing its result.
pub fn run_expr(
    ctx: &mut BuildContext,
    env: &BuildEnv<'_>,
    imports: &[ModuleName],
    expr: &str,
) -> BuildResult<Option<Compiled>> {
    let compiled = compile_expr(ctx, env, CompileOptions::show(), imports, expr)?;
    run_compiled(compiled)
}

fn run_compiled(compiled: Option<Compiled>) -> BuildResult<Option<Compiled>> {
    if let Some(entry) = compiled.as_ref().and_then(|c| c.entry.as_ref()) {
        debug!(exe = %entry.exe.display(), "running entry");
        entry.run().map_err(BuildError::Run)?;
    }
    Ok(compiled)
}

/// Decides how `main` presents a result of type `result`.
pub fn presentation(result: &Type, add_show: bool) -> Presentation {
    if result.is_unit() || !add_show {
        Presentation::Discard
    } else if result.is_function() {
        Presentation::Placeholder
    } else {
        Presentation::Show
    }
}

/// Directory for the synthetic file: next to the first import whose
/// source can be located.
fn virtual_dir(ctx: &BuildContext, env: &BuildEnv<'_>, imports: &[ModuleName]) -> PathBuf {
    for import in imports {
        let cached = ctx
            .lookup_module(import)
            .and_then(|module| module.paths().relative_source.clone());
        if let Some(relative) = cached {
            return parent_dir(&relative);
        }
        let hint = import.to_relative_path(env.source_extension());
        if let Some(found) = ctx.search_source_file(env, &hint) {
            return parent_dir(&found.stem);
        }
    }
    PathBuf::new()
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Emits the errors of the virtual module and of everything it imports.
/// Returns `true` if there were any; errors in unrelated modules are ignored.
///
/// Diagnostics pointing into the synthetic file get the offending line of
/// `source` as their excerpt, mapped through its `#line` directive.
fn report_errors(
    ctx: &BuildContext,
    env: &BuildEnv<'_>,
    vname: &ModuleName,
    path: &Path,
    source: &str,
) -> bool {
    let errors = ctx.errors_reachable_from(std::slice::from_ref(vname));
    if errors.is_empty() {
        return false;
    }
    let file = SourceFile::new(normalize(path), source.to_string());
    debug!(count = errors.len(), "expression has errors");
    env.sink
        .emit_all(errors.into_iter().map(|diag| with_excerpt(diag, &file)));
    true
}

fn with_excerpt(diag: Diagnostic, file: &SourceFile) -> Diagnostic {
    if diag.excerpt.is_some() {
        return diag;
    }
    let line = match &diag.range {
        Some(range) if same_path(&range.path, &file.path) => {
            file.logical_line(range.start.line).map(str::to_string)
        }
        _ => None,
    };
    match line {
        Some(line) => diag.with_excerpt(line),
        None => diag,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_build::types::names;
    use kiln_source::SourceRange;

    #[test]
    fn presentation_rules() {
        let int = Type::con(names::INT);
        let fun = Type::fun(vec![], Type::total(), int.clone());
        assert_eq!(presentation(&int, true), Presentation::Show);
        assert_eq!(presentation(&int, false), Presentation::Discard);
        assert_eq!(presentation(&Type::unit(), true), Presentation::Discard);
        assert_eq!(presentation(&fun, true), Presentation::Placeholder);
    }

    #[test]
    fn excerpt_follows_line_directive() {
        let path = Path::new("/@virtual/@interactive.kk");
        let source = synth::expr_source(&[ModuleName::new("std/core")], "1 + true");
        let file = SourceFile::new(normalize(path), source);
        let diag = Diagnostic::error(kiln_build::errors::T_MISMATCH, "mismatch")
            .at(SourceRange::on_line(path, 1, 5, 4));
        let diag = with_excerpt(diag, &file);
        assert_eq!(diag.excerpt.as_deref(), Some("1 + true"));
    }

    #[test]
    fn excerpt_skips_other_files() {
        let file = SourceFile::new(PathBuf::from("/@virtual/@interactive.kk"), "x".to_string());
        let diag = Diagnostic::error(kiln_build::errors::T_MISMATCH, "mismatch")
            .at(SourceRange::on_line("/src/a.kk", 1, 1, 1));
        assert!(with_excerpt(diag, &file).excerpt.is_none());
    }
}
