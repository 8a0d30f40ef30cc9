//! End-to-end tests of root management, validation, focus and retirement
//! against on-disk projects.

use kiln_build::{merge_modules, Module, Phase};
use kiln_common::{ModuleName, QualifiedName};
use kiln_conformance::{write_source, Session};
use kiln_diagnostics::{DiagnosticRenderer, TerminalRenderer};
use kiln_source::SourceDb;
use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

fn mods(names: &[&str]) -> Vec<ModuleName> {
    names.iter().map(ModuleName::new).collect()
}

fn qname(text: &str) -> QualifiedName {
    QualifiedName::parse(text).unwrap()
}

/// Rewrites a file and pushes its modification time forward so the change is
/// visible even on file systems with coarse timestamps.
fn touch(path: &Path, content: &str) {
    fs::write(path, content).unwrap();
    let file = fs::File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();
}

/// `a` and `b` both import `c`; `d` is unrelated.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write_source(root, "a.kk", "import c\npub fun f() : int { c/base() + 1 }\nfun hidden() { 0 }\n").unwrap();
    write_source(root, "b.kk", "import c\npub fun g() { c/base() * 2 }\n").unwrap();
    write_source(root, "c.kk", "pub fun base() : int { 20 }\n").unwrap();
    write_source(root, "d.kk", "pub fun other() { 7 }\n").unwrap();
    dir
}

fn snapshot(modules: &kiln_build::ModuleCache) -> Vec<Module> {
    modules.iter().cloned().collect()
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn typecheck_exposes_public_definitions() {
    let dir = project();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();

    let added = ctx.add_root_sources(&env, &[dir.path().join("a.kk")]).unwrap();
    assert_eq!(added, mods(&["a"]));
    ctx.type_check(&env).unwrap();

    let defs = ctx.get_definitions(&mods(&["a"]));
    assert_eq!(defs.value_names(), vec![&qname("a/f")]);
    assert_eq!(
        ctx.lookup_type_of(&qname("a/f")).unwrap().to_string(),
        "() -> int"
    );
    assert_eq!(ctx.module_names(), mods(&["a", "c"]));
    assert!(!ctx.has_errors());
}

#[test]
fn removed_root_stays_available_until_fingerprint_changes() {
    let dir = project();
    let mut session = Session::new(dir.path());
    let mut ctx = session.context();
    {
        let env = session.env();
        ctx.add_root_sources(&env, &[dir.path().join("a.kk")]).unwrap();
        ctx.type_check(&env).unwrap();

        let removed = ctx.remove_root_source(&dir.path().join("a.kk"));
        assert_eq!(removed, Some(ModuleName::new("a")));
        ctx.validate(&env, false, &[]).unwrap();
        assert!(ctx.roots().is_empty());
        assert!(ctx.modules().is_empty());
        let retired = ctx.lookup_module(&ModuleName::new("a")).unwrap();
        assert_eq!(retired.phase(), Phase::Typed);
        assert!(ctx.lookup_module_by_path(&dir.path().join("a.kk")).is_some());
    }

    session.config.build.optimization = 2;
    let env = session.env();
    ctx.validate(&env, false, &[]).unwrap();
    assert!(ctx.lookup_module(&ModuleName::new("a")).is_none());
}

#[test]
fn focus_reuses_cached_dependency() {
    let dir = project();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();
    ctx.add_root_sources(&env, &[dir.path().join("a.kk")]).unwrap();
    ctx.type_check(&env).unwrap();
    session.host.clear_log();

    let (roots_seen, touched) = ctx
        .focus(&env, &mods(&["b"]), |narrowed, env| {
            let roots = narrowed.roots().to_vec();
            narrowed.type_check(env)?;
            Ok(roots)
        })
        .unwrap();

    assert_eq!(roots_seen, mods(&["b"]));
    assert_eq!(touched, mods(&["b"]));
    assert_eq!(session.host.checked(), mods(&["b"]));
    assert_eq!(ctx.roots(), mods(&["a"]).as_slice());
    assert_eq!(
        ctx.lookup_module(&ModuleName::new("b")).unwrap().phase(),
        Phase::Typed
    );
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn validate_is_idempotent() {
    let dir = project();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();
    ctx.add_root_sources(&env, &[dir.path().join("a.kk"), dir.path().join("d.kk")])
        .unwrap();
    ctx.type_check(&env).unwrap();

    ctx.validate(&env, false, &[]).unwrap();
    let first = snapshot(ctx.modules());
    ctx.validate(&env, false, &[]).unwrap();
    let second = snapshot(ctx.modules());

    assert_eq!(first.len(), second.len());
    for (x, y) in first.iter().zip(&second) {
        assert!(x.same_artifacts(y), "{} changed", x.name());
    }
}

#[test]
fn merge_never_regresses_phase() {
    let dir = project();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();
    ctx.add_root_sources(&env, &[dir.path().join("a.kk")]).unwrap();
    ctx.validate(&env, false, &[]).unwrap();
    let loaded = ctx.lookup_module(&ModuleName::new("a")).unwrap().clone();
    ctx.type_check(&env).unwrap();
    let typed = ctx.lookup_module(&ModuleName::new("a")).unwrap().clone();

    for (left, right) in [(loaded.clone(), typed.clone()), (typed.clone(), loaded.clone())] {
        let floor = left.phase().max(right.phase());
        assert_eq!(merge_modules(left, right).phase(), floor);
    }
    assert!(merge_modules(typed.clone(), typed.clone()).same_artifacts(&typed));
}

#[test]
fn fingerprint_change_resolves_everything_fresh() {
    let dir = project();
    let mut session = Session::new(dir.path());
    let mut ctx = session.context();
    let before = {
        let env = session.env();
        ctx.add_root_sources(&env, &[dir.path().join("a.kk")]).unwrap();
        ctx.type_check(&env).unwrap();
        snapshot(ctx.modules())
    };

    session.config.build.debug = !session.config.build.debug;
    let env = session.env();
    ctx.validate(&env, false, &[]).unwrap();

    assert_eq!(ctx.fingerprint(), session.config.fingerprint());
    assert_eq!(ctx.module_names(), mods(&["a", "c"]));
    for module in ctx.modules().iter() {
        assert_eq!(module.phase(), Phase::Loaded, "{} was reused", module.name());
        assert!(before.iter().all(|old| !old.same_artifacts(module)));
    }
}

#[test]
fn focus_leaves_unrelated_modules_untouched() {
    let dir = project();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();
    ctx.add_root_sources(&env, &[dir.path().join("d.kk"), dir.path().join("a.kk")])
        .unwrap();
    ctx.type_check(&env).unwrap();
    let d_before = ctx.lookup_module(&ModuleName::new("d")).unwrap().clone();
    let roots_before = ctx.roots().to_vec();

    ctx.focus(&env, &mods(&["b"]), |narrowed, env| narrowed.type_check(env))
        .unwrap();

    let d_after = ctx.lookup_module(&ModuleName::new("d")).unwrap();
    assert!(d_after.same_artifacts(&d_before));
    assert_eq!(ctx.roots(), roots_before.as_slice());
}

#[test]
fn edited_dependency_rechecks_dependents() {
    let dir = project();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();
    ctx.add_root_sources(&env, &[dir.path().join("a.kk"), dir.path().join("d.kk")])
        .unwrap();
    ctx.type_check(&env).unwrap();
    session.host.clear_log();

    touch(&dir.path().join("c.kk"), "pub fun base() : int { 30 }\n");
    ctx.type_check(&env).unwrap();

    assert_eq!(session.host.checked(), mods(&["c", "a"]));
}

#[test]
fn syntax_errors_stay_on_the_module() {
    let dir = project();
    write_source(dir.path(), "bad.kk", "pub fun f() {\n  1 +\n}\n").unwrap();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();
    ctx.add_root_sources(&env, &[dir.path().join("bad.kk")]).unwrap();
    ctx.type_check(&env).unwrap();

    let module = ctx.lookup_module(&ModuleName::new("bad")).unwrap();
    assert_eq!(module.phase(), Phase::ParsedError);
    let errors = ctx.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].code.to_string(), "P101");
    assert_eq!(errors[0].range.as_ref().unwrap().start.line, 2);
    assert!(ctx.throw_on_error().is_err());
}

#[test]
fn unknown_import_fails_validation() {
    let dir = project();
    write_source(dir.path(), "lost.kk", "import nowhere\npub fun f() { 1 }\n").unwrap();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();
    ctx.add_root_sources(&env, &[dir.path().join("lost.kk")]).unwrap();

    let err = ctx.validate(&env, false, &[]).unwrap_err();
    assert!(err.to_string().contains("nowhere"));
}

#[test]
fn lean_keeps_dependencies_reachable() {
    let dir = project();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();
    ctx.add_root_sources(&env, &[dir.path().join("a.kk")]).unwrap();
    ctx.type_check(&env).unwrap();

    assert_eq!(ctx.lean(), 2);
    ctx.validate(&env, false, &[]).unwrap();
    assert_eq!(ctx.module_names(), mods(&["a", "c"]));
    let a = ctx.lookup_module(&ModuleName::new("a")).unwrap();
    assert!(a.program().is_none());
    assert_eq!(a.import_names(), Some(mods(&["c"]).as_slice()));

    session.host.clear_log();
    touch(&dir.path().join("c.kk"), "pub fun base() : int { 5 }\n");
    ctx.type_check(&env).unwrap();
    assert_eq!(session.host.checked(), mods(&["c", "a"]));
}

#[test]
fn include_path_names_modules() {
    let dir = TempDir::new().unwrap();
    write_source(dir.path(), "src/app/main.kk", "import app/util\npub fun run() { app/util/two() }\n").unwrap();
    write_source(dir.path(), "src/app/util.kk", "pub fun two() { 2 }\n").unwrap();
    let config = kiln_conformance::make_config("include = [\"src\"]").unwrap();
    let session = Session::with_config(dir.path(), config);
    let env = session.env();
    let mut ctx = session.context();

    let added = ctx
        .add_root_sources(&env, &[dir.path().join("src/app/main.kk")])
        .unwrap();
    assert_eq!(added, mods(&["app/main"]));
    ctx.type_check(&env).unwrap();
    assert_eq!(ctx.module_names(), mods(&["app/main", "app/util"]));
    assert_eq!(
        ctx.lookup_unqualified("two").unwrap().name,
        qname("app/util/two")
    );
}

#[test]
fn module_errors_render_against_loaded_sources() {
    let dir = project();
    let bad = write_source(dir.path(), "bad.kk", "pub fun f() {\n  1 +\n}\n").unwrap();
    let session = Session::new(dir.path());
    let env = session.env();
    let mut ctx = session.context();
    ctx.add_root_sources(&env, &[bad.clone()]).unwrap();
    ctx.type_check(&env).unwrap();

    let mut db = SourceDb::new();
    db.load_file(&env.reader(), &bad).unwrap();
    let text = TerminalRenderer::new(false).render_all(&ctx.errors(), &db);

    assert!(text.starts_with("error[P101]: unexpected end of line"), "{text}");
    assert!(text.contains(&format!("--> {}:2:", bad.display())), "{text}");
    assert!(text.contains("2 |   1 +\n"), "{text}");
    assert!(text.contains('^'), "{text}");
}
