//! Type and effect inference for scripts.
//!
//! Signatures of annotated functions are taken as declared; unannotated
//! functions get the type and effect row of their body. Handlers (functions
//! with a closure parameter) are trusted: a call `default-x(fn() { .. })`
//! removes the `x` label from the closure's row and adds the handler's own
//! declared effects.

use crate::expr::{Block, Expr, ExprKind, Stmt};
use crate::script::{FunDecl, Script};
use kiln_build::errors::T_MISMATCH;
use kiln_build::types::{names, Type};
use kiln_build::{CoreProgram, RangeEntry, RangeMap, ValueSort, Visibility};
use kiln_common::{ModuleName, QualifiedName};
use kiln_diagnostics::Diagnostic;
use kiln_eval::handlers::DEFAULT_HANDLER_PREFIX;
use kiln_source::SourceRange;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// Every parsed script known to the host, by module.
pub type Scripts = BTreeMap<ModuleName, Rc<Script>>;

/// The console effect; provided by the runtime, never handled.
pub const CONSOLE: &str = "std/core/console/console";
/// Divergence; provided by the runtime, never handled.
pub const DIV: &str = "std/core/types/div";
/// Exceptions; handled by `std/core/default-exn`.
pub const EXN: &str = "std/core/exn/exn";
/// The print builtin.
pub const PRINTLN: &str = "println";

/// Resolves a called name from `from` to a function declaration.
///
/// Qualified names must refer to `from` itself or one of its imports; bare
/// names are searched in `from`, then in its open imports in order.
/// Private functions are only visible inside their own module.
pub fn resolve_fun<'a>(
    scripts: &'a Scripts,
    from: &ModuleName,
    name: &str,
) -> Option<(QualifiedName, &'a FunDecl)> {
    let script = scripts.get(from)?;
    if let Some(qname) = name.contains('/').then(|| QualifiedName::parse(name)).flatten() {
        let imported = qname.module == *from
            || script.imports.iter().any(|import| import.module == qname.module);
        if !imported {
            return None;
        }
        let fun = scripts.get(&qname.module)?.fun(&qname.name)?;
        return (fun.public || qname.module == *from).then_some((qname, fun));
    }
    if let Some(fun) = script.fun(name) {
        return Some((from.qualify(name), fun));
    }
    script
        .imports
        .iter()
        .filter(|import| import.open)
        .find_map(|import| {
            let fun = scripts.get(&import.module)?.fun(name)?;
            fun.public.then(|| (import.module.qualify(name), fun))
        })
}

/// Returns the effect a label stands for, looking through `handled`.
pub fn label_name(label: &Type) -> Option<&QualifiedName> {
    match label {
        Type::App(head, args)
            if (head.is_con(names::HANDLED) || head.is_con(names::HANDLED1)) && args.len() == 1 =>
        {
            args[0].head_name()
        }
        other => other.head_name(),
    }
}

/// Inferred signature of a function.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Sig {
    /// Parameter names.
    pub params: Vec<String>,
    /// Effect labels in first-use order.
    pub effects: Vec<Type>,
    /// Result type.
    pub result: Type,
}

impl Sig {
    /// Returns the function type of this signature.
    pub fn scheme(&self) -> Type {
        let params = self.params.iter().map(|p| Type::var(p.as_str())).collect();
        Type::fun(
            params,
            Type::effect_row(self.effects.clone(), None),
            self.result.clone(),
        )
    }
}

/// The outcome of checking one module.
#[derive(Debug)]
pub struct Checked {
    /// The core program: one value per function.
    pub core: CoreProgram,
    /// Resolved call sites.
    pub range_map: RangeMap,
    /// Type errors, at most one per function.
    pub errors: Vec<Diagnostic>,
}

/// Checks every function of `module`.
pub fn check_module(scripts: &Scripts, module: &ModuleName) -> Checked {
    let mut checker = Checker::new(scripts);
    let mut core = CoreProgram::new(module.clone());
    let mut entries = Vec::new();
    let mut errors = Vec::new();
    if let Some(script) = scripts.get(module) {
        core.imports = script.imports.iter().map(|i| i.module.clone()).collect();
        for fun in &script.funs {
            match checker.check_fun(module, fun, &mut entries) {
                Ok(sig) => {
                    let visibility = if fun.public {
                        Visibility::Public
                    } else {
                        Visibility::Private
                    };
                    core = core.with_value(&fun.name, visibility, ValueSort::Function, sig.scheme());
                    if let Some(value) = core.values.last_mut() {
                        value.range = Some(fun.range.clone());
                    }
                }
                Err(diag) => errors.push(diag),
            }
        }
    }
    Checked {
        core,
        range_map: RangeMap::new(entries),
        errors,
    }
}

struct Checker<'a> {
    scripts: &'a Scripts,
    sigs: HashMap<QualifiedName, Sig>,
    in_progress: HashSet<QualifiedName>,
}

type Locals = Vec<(String, Type)>;

impl<'a> Checker<'a> {
    fn new(scripts: &'a Scripts) -> Self {
        Self {
            scripts,
            sigs: HashMap::new(),
            in_progress: HashSet::new(),
        }
    }

    fn path_of(&self, module: &ModuleName) -> std::path::PathBuf {
        self.scripts
            .get(module)
            .map(|s| s.path.clone())
            .unwrap_or_default()
    }

    fn range_of(&self, module: &ModuleName, expr: &Expr) -> SourceRange {
        SourceRange::on_line(self.path_of(module), expr.pos.line, expr.pos.col, expr.len)
    }

    fn error_at(&self, module: &ModuleName, expr: &Expr, message: String) -> Diagnostic {
        Diagnostic::error(T_MISMATCH, message).at(self.range_of(module, expr))
    }

    /// Signature of any function, checking its body on first use.
    fn sig_of(&mut self, qname: &QualifiedName, fun: &FunDecl) -> Result<Sig, Diagnostic> {
        if let Some(sig) = self.sigs.get(qname) {
            return Ok(sig.clone());
        }
        if fun.annotation.is_some() || fun.is_handler() {
            return self.declared_sig(&qname.module, fun);
        }
        if !self.in_progress.insert(qname.clone()) {
            return Err(Diagnostic::error(
                T_MISMATCH,
                format!("cannot infer the type of recursive function '{qname}'"),
            )
            .at(fun.range.clone())
            .with_help("add a type signature"));
        }
        let sig = self.check_fun(&qname.module, fun, &mut Vec::new());
        self.in_progress.remove(qname);
        sig
    }

    fn declared_sig(&self, module: &ModuleName, fun: &FunDecl) -> Result<Sig, Diagnostic> {
        let mut effects = Vec::new();
        let mut result = Type::unit();
        if let Some(annotation) = &fun.annotation {
            for name in &annotation.effects {
                for label in self.resolve_effect(module, name).map_err(|message| {
                    Diagnostic::error(T_MISMATCH, message).at(fun.range.clone())
                })? {
                    push_label(&mut effects, label);
                }
            }
            result = parse_type(&annotation.result).ok_or_else(|| {
                Diagnostic::error(T_MISMATCH, format!("unknown type '{}'", annotation.result))
                    .at(fun.range.clone())
            })?;
        }
        Ok(Sig {
            params: fun.params.clone(),
            effects,
            result,
        })
    }

    fn resolve_effect(&self, module: &ModuleName, name: &str) -> Result<Vec<Type>, String> {
        match name {
            "io" => return Ok(vec![Type::con(CONSOLE), Type::con(DIV)]),
            "console" => return Ok(vec![Type::con(CONSOLE)]),
            "div" => return Ok(vec![Type::con(DIV)]),
            "exn" => return Ok(vec![Type::handled(EXN)]),
            _ => {}
        }
        let script = self
            .scripts
            .get(module)
            .ok_or_else(|| format!("module '{module}' is not loaded"))?;
        if script.has_effect(name) {
            return Ok(vec![Type::handled(&module.qualify(name).to_string())]);
        }
        script
            .imports
            .iter()
            .find(|import| {
                self.scripts
                    .get(&import.module)
                    .is_some_and(|s| s.has_effect(name))
            })
            .map(|import| vec![Type::handled(&import.module.qualify(name).to_string())])
            .ok_or_else(|| format!("unknown effect '{name}'"))
    }

    fn check_fun(
        &mut self,
        module: &ModuleName,
        fun: &FunDecl,
        entries: &mut Vec<RangeEntry>,
    ) -> Result<Sig, Diagnostic> {
        let qname = module.qualify(&fun.name);
        if fun.is_handler() {
            let sig = self.declared_sig(module, fun)?;
            self.sigs.insert(qname, sig.clone());
            return Ok(sig);
        }

        let mut effects = Vec::new();
        let result = self.infer_block(module, &mut Vec::new(), &fun.body, &mut effects, entries)?;
        let sig = match &fun.annotation {
            None => Sig {
                params: Vec::new(),
                effects,
                result,
            },
            Some(_) => {
                let declared = self.declared_sig(module, fun)?;
                let at = fun
                    .body
                    .result()
                    .map_or_else(|| fun.range.clone(), |last| self.range_of(module, last));
                if declared.result != result {
                    return Err(Diagnostic::error(
                        T_MISMATCH,
                        format!(
                            "'{}' is declared to return {} but its body has type {result}",
                            fun.name, declared.result
                        ),
                    )
                    .at(at));
                }
                if let Some(extra) = effects.iter().find(|l| !declared.effects.contains(l)) {
                    return Err(Diagnostic::error(
                        T_MISMATCH,
                        format!(
                            "effect '{extra}' is not declared in the signature of '{}'",
                            fun.name
                        ),
                    )
                    .at(at));
                }
                declared
            }
        };
        self.sigs.insert(qname, sig.clone());
        Ok(sig)
    }

    fn infer_block(
        &mut self,
        module: &ModuleName,
        locals: &mut Locals,
        block: &Block,
        effects: &mut Vec<Type>,
        entries: &mut Vec<RangeEntry>,
    ) -> Result<Type, Diagnostic> {
        let depth = locals.len();
        let mut last = Type::unit();
        for stmt in &block.stmts {
            match stmt {
                Stmt::Val(name, value) => {
                    let ty = self.infer(module, locals, value, effects, entries)?;
                    if name != "_" {
                        locals.push((name.clone(), ty));
                    }
                }
                Stmt::Expr(expr) => last = self.infer(module, locals, expr, effects, entries)?,
            }
        }
        locals.truncate(depth);
        Ok(last)
    }

    fn infer(
        &mut self,
        module: &ModuleName,
        locals: &mut Locals,
        expr: &Expr,
        effects: &mut Vec<Type>,
        entries: &mut Vec<RangeEntry>,
    ) -> Result<Type, Diagnostic> {
        match &expr.kind {
            ExprKind::Int(_) => Ok(Type::con(names::INT)),
            ExprKind::Bool(_) => Ok(Type::con(names::BOOL)),
            ExprKind::Str(_) => Ok(Type::con(names::STRING)),
            ExprKind::Unit => Ok(Type::unit()),
            ExprKind::Binary(op, lhs, rhs) => {
                for side in [lhs, rhs] {
                    let ty = self.infer(module, locals, side, effects, entries)?;
                    if !ty.is_con(names::INT) {
                        return Err(self.error_at(
                            module,
                            side,
                            format!("operator '{op}' expects int operands, found {ty}"),
                        ));
                    }
                }
                Ok(Type::con(names::INT))
            }
            ExprKind::Lambda(_) => Err(self.error_at(
                module,
                expr,
                "closures can only be passed to handlers".to_string(),
            )),
            ExprKind::Name(name) => {
                if let Some((_, ty)) = locals.iter().rev().find(|(n, _)| n == name) {
                    return Ok(ty.clone());
                }
                let (qname, fun) = self.lookup(module, expr, name)?;
                let sig = self.sig_of(&qname, fun)?;
                Ok(sig.scheme())
            }
            ExprKind::Call(name, args) if name == PRINTLN => {
                let [arg] = args.as_slice() else {
                    return Err(self.error_at(module, expr, "println takes one argument".to_string()));
                };
                self.infer(module, locals, arg, effects, entries)?;
                push_label(effects, Type::con(CONSOLE));
                Ok(Type::unit())
            }
            ExprKind::Call(name, args) => {
                let (qname, fun) = self.lookup(module, expr, name)?;
                let sig = self.sig_of(&qname, fun)?;
                entries.push(RangeEntry {
                    range: self.range_of(module, expr),
                    name: qname.clone(),
                    ty: Some(sig.scheme()),
                });
                if !fun.is_handler() {
                    if !args.is_empty() {
                        return Err(self.error_at(
                            module,
                            expr,
                            format!("'{qname}' takes no arguments"),
                        ));
                    }
                    for label in sig.effects {
                        push_label(effects, label);
                    }
                    return Ok(sig.result);
                }

                let [Expr {
                    kind: ExprKind::Lambda(body),
                    ..
                }] = args.as_slice()
                else {
                    return Err(self.error_at(
                        module,
                        expr,
                        format!("handler '{qname}' takes one closure"),
                    ));
                };
                let mut inner = Vec::new();
                let ty = self.infer_block(module, locals, body, &mut inner, entries)?;
                let handled = qname.name.strip_prefix(DEFAULT_HANDLER_PREFIX);
                for label in inner {
                    let discharged = handled.is_some_and(|stem| {
                        label_name(&label).is_some_and(|n| n.name == stem)
                    });
                    if !discharged {
                        push_label(effects, label);
                    }
                }
                for label in sig.effects {
                    push_label(effects, label);
                }
                Ok(ty)
            }
        }
    }

    fn lookup(
        &self,
        module: &ModuleName,
        expr: &Expr,
        name: &str,
    ) -> Result<(QualifiedName, &'a FunDecl), Diagnostic> {
        resolve_fun(self.scripts, module, name)
            .ok_or_else(|| self.error_at(module, expr, format!("unknown identifier '{name}'")))
    }
}

fn push_label(effects: &mut Vec<Type>, label: Type) {
    if !effects.contains(&label) {
        effects.push(label);
    }
}

/// Parses a result type written in a signature.
pub fn parse_type(text: &str) -> Option<Type> {
    match text {
        "int" => Some(Type::con(names::INT)),
        "bool" => Some(Type::con(names::BOOL)),
        "string" => Some(Type::con(names::STRING)),
        "()" => Some(Type::unit()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{parse_script, scan, wants_prelude, PRELUDE};
    use kiln_build::Import;
    use std::path::Path;

    fn scripts(files: &[(&str, &str)]) -> Scripts {
        let have_prelude = files.iter().any(|(m, _)| *m == PRELUDE);
        files
            .iter()
            .map(|(module, text)| {
                let name = ModuleName::new(module);
                let path = Path::new("/src").join(name.to_relative_path("kk"));
                let mut imports = scan(&path, text).imports;
                if have_prelude && wants_prelude(&name) {
                    imports.push(Import {
                        module: ModuleName::new(PRELUDE),
                        open: true,
                    });
                }
                let script = parse_script(name.clone(), &path, text, imports).unwrap();
                (name, Rc::new(script))
            })
            .collect()
    }

    const CORE: &str = "\
pub fun default-exn(action) : () { action() }
pub fun answer() : int { 42 }
";

    #[test]
    fn infers_unannotated_function() {
        let scripts = scripts(&[(PRELUDE, CORE), ("a", "pub fun f() { answer() + 1 }\n")]);
        let checked = check_module(&scripts, &ModuleName::new("a"));
        assert!(checked.errors.is_empty(), "{:?}", checked.errors);
        let f = checked.core.value("f").unwrap();
        assert_eq!(f.ty.to_string(), "() -> int");
        assert_eq!(checked.range_map.entries()[0].name.to_string(), "std/core/answer");
    }

    #[test]
    fn effects_flow_through_calls() {
        let scripts = scripts(&[
            (PRELUDE, CORE),
            ("app/state", "effect state\npub fun get() : <state> int { 1 }\n"),
            ("a", "import app/state\npub fun f() { app/state/get() }\n"),
        ]);
        let checked = check_module(&scripts, &ModuleName::new("a"));
        let f = checked.core.value("f").unwrap();
        let (_, effect, _) = f.ty.as_function().unwrap();
        assert_eq!(effect, &Type::effect_row(vec![Type::handled("app/state/state")], None));
    }

    #[test]
    fn default_handler_discharges_label() {
        let scripts = scripts(&[
            (PRELUDE, CORE),
            (
                "a",
                "pub fun boom() : exn int { 1 }\npub fun f() { default-exn(fn() { boom() }) }\n",
            ),
        ]);
        let checked = check_module(&scripts, &ModuleName::new("a"));
        assert!(checked.errors.is_empty(), "{:?}", checked.errors);
        assert_eq!(checked.core.value("f").unwrap().ty.to_string(), "() -> int");
    }

    #[test]
    fn mismatch_points_at_operand() {
        let scripts = scripts(&[("a", "pub fun f() {\n  1 + true\n}\n")]);
        let checked = check_module(&scripts, &ModuleName::new("a"));
        let err = &checked.errors[0];
        assert_eq!(err.code, T_MISMATCH);
        assert_eq!(err.message, "operator '+' expects int operands, found bool");
        let range = err.range.as_ref().unwrap();
        assert_eq!((range.start.line, range.start.col), (2, 7));
    }

    #[test]
    fn declared_result_is_enforced() {
        let scripts = scripts(&[("a", "pub fun f() : bool { 1 }\n")]);
        let checked = check_module(&scripts, &ModuleName::new("a"));
        assert!(checked.errors[0].message.contains("declared to return bool"));
    }

    #[test]
    fn undeclared_effect_is_rejected() {
        let scripts = scripts(&[("a", "pub fun f() : int { println(1); 2 }\n")]);
        let checked = check_module(&scripts, &ModuleName::new("a"));
        assert!(checked.errors[0].message.contains("effect 'console'"));
    }

    #[test]
    fn private_functions_stay_private() {
        let scripts = scripts(&[
            ("b", "fun hidden() { 1 }\n"),
            ("a", "open import b\npub fun f() { hidden() }\n"),
        ]);
        let checked = check_module(&scripts, &ModuleName::new("a"));
        assert_eq!(checked.errors[0].message, "unknown identifier 'hidden'");
    }

    #[test]
    fn resolves_through_open_imports() {
        let scripts = scripts(&[
            ("b", "pub fun g() { 2 }\n"),
            ("a", "open import b\npub fun f() { g() }\n"),
        ]);
        let (qname, _) = resolve_fun(&scripts, &ModuleName::new("a"), "g").unwrap();
        assert_eq!(qname.to_string(), "b/g");
        assert!(resolve_fun(&scripts, &ModuleName::new("a"), "c/g").is_none());
    }
}
