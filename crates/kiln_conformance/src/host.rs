//! A scripted compiler behind the build context.
//!
//! [`ScriptHost`] resolves `.kk` files through the overlay-aware reader,
//! scans imports, computes dependency closures with timestamp checks, type
//! checks with [`crate::check`] and links mains into entries that run under
//! [`crate::interp`]. It records which modules it checked so tests can
//! observe reuse.

use crate::check::{check_module, Scripts};
use crate::interp::{self, Console};
use crate::script::{parse_script, scan, wants_prelude, PRELUDE};
use kiln_build::errors::{B_LINK, P_SYNTAX};
use kiln_build::{
    BuildEnv, BuildError, BuildHost, BuildResult, Entry, Failed, FoundSource, Import, Inlines,
    LinkedUnit, LoadedUnit, Module, ModulePaths, ModuleState, ParsedUnit, Phase, Program, Stamped,
    TypedUnit,
};
use kiln_common::{ModuleName, QualifiedName};
use kiln_diagnostics::Diagnostic;
use kiln_source::path::{is_virtual, normalize, relative_to};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// The scripted collaborator.
pub struct ScriptHost {
    root: PathBuf,
    scripts: RefCell<Scripts>,
    checked: RefCell<Vec<ModuleName>>,
    console: Console,
}

impl ScriptHost {
    /// Creates a host for the project rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scripts: RefCell::new(Scripts::new()),
            checked: RefCell::new(Vec::new()),
            console: Console::default(),
        }
    }

    /// Lines printed by programs run so far.
    pub fn output(&self) -> Vec<String> {
        self.console.output.borrow().clone()
    }

    /// Handlers entered by programs run so far, outermost first.
    pub fn trace(&self) -> Vec<String> {
        self.console.trace.borrow().clone()
    }

    /// Modules type checked so far, in order.
    pub fn checked(&self) -> Vec<ModuleName> {
        self.checked.borrow().clone()
    }

    /// Forgets output, trace and the checked log.
    pub fn clear_log(&self) {
        self.console.output.borrow_mut().clear();
        self.console.trace.borrow_mut().clear();
        self.checked.borrow_mut().clear();
    }

    fn include_roots(&self, env: &BuildEnv<'_>) -> Vec<PathBuf> {
        if env.config.build.include.is_empty() {
            vec![self.root.clone()]
        } else {
            env.config
                .build
                .include
                .iter()
                .map(|dir| normalize(&self.root.join(dir)))
                .collect()
        }
    }

    fn shell(&self, env: &BuildEnv<'_>, name: Option<ModuleName>, path: &Path) -> BuildResult<Module> {
        let path = normalize(path);
        let modified = env
            .reader()
            .modified(&path)
            .map_err(|e| BuildError::ResolveSource {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        let found = if is_virtual(&path, env.virtual_mount()) {
            relative_to(&path, env.virtual_mount())
        } else {
            self.include_roots(env)
                .iter()
                .find_map(|root| relative_to(&path, root))
        };
        let relative =
            found.unwrap_or_else(|| path.file_name().map(PathBuf::from).unwrap_or_default());
        let name = name.unwrap_or_else(|| ModuleName::from_relative_path(&relative));
        Ok(Module::new(name).with_paths(ModulePaths {
            source: Some(Stamped::new(path, modified)),
            relative_source: Some(relative),
            ..ModulePaths::default()
        }))
    }

    fn is_stale(&self, env: &BuildEnv<'_>, module: &Module) -> bool {
        match &module.paths().source {
            Some(source) => env
                .reader()
                .modified(&source.path)
                .map_or(true, |modified| modified != source.modified),
            None => false,
        }
    }

    /// Scans a shell: reads its imports and adds the prelude when available.
    fn load(&self, env: &BuildEnv<'_>, module: Module) -> BuildResult<Module> {
        let path = source_of(&module)?;
        let text = read(env, &path)?;
        let scanned = scan(&path, &text.content);
        let mut import_names: Vec<ModuleName> =
            scanned.imports.into_iter().map(|i| i.module).collect();
        let prelude = ModuleName::new(PRELUDE);
        if wants_prelude(module.name())
            && !import_names.contains(&prelude)
            && self
                .search_source_file(env, &prelude.to_relative_path(env.source_extension()))
                .is_some()
        {
            import_names.push(prelude);
        }
        debug!(module = %module.name(), imports = ?import_names, "scanned");
        let unit = LoadedUnit {
            lexemes: scanned.lexemes,
            import_names,
        };
        Ok(module.with_state(ModuleState::Loaded(Rc::new(unit))))
    }

    /// Brings a module that is not typed yet to `Typed`, `ParsedError` or `TypedError`.
    fn check_one(&self, env: &BuildEnv<'_>, module: Module) -> BuildResult<Module> {
        let module = if module.phase() == Phase::Init {
            self.load(env, module)?
        } else {
            module
        };
        let loaded = match module.state() {
            ModuleState::Loaded(unit) => unit.clone(),
            ModuleState::Parsed(parsed) => parsed.loaded.clone(),
            _ => return Ok(module),
        };
        let path = source_of(&module)?;
        let text = read(env, &path)?;

        let mut imports = scan(&path, &text.content).imports;
        for name in &loaded.import_names {
            if !imports.iter().any(|i| &i.module == name) {
                imports.push(Import {
                    module: name.clone(),
                    open: true,
                });
            }
        }
        let script = match parse_script(module.name().clone(), &path, &text.content, imports.clone()) {
            Ok(script) => script,
            Err(err) => {
                let diag = Diagnostic::error(P_SYNTAX, err.message).at(err.range);
                return Ok(module.with_state(ModuleState::ParsedError(Failed::new(loaded, vec![diag]))));
            }
        };
        let program = Program {
            imports,
            decls: script.decls(),
        };
        self.scripts
            .borrow_mut()
            .insert(module.name().clone(), Rc::new(script));
        let parsed = Rc::new(ParsedUnit { loaded, program });

        self.checked.borrow_mut().push(module.name().clone());
        let checked = check_module(&self.scripts.borrow(), module.name());
        debug!(module = %module.name(), errors = checked.errors.len(), "type checked");
        if !checked.errors.is_empty() {
            return Ok(module.with_state(ModuleState::TypedError(Failed::new(parsed, checked.errors))));
        }
        Ok(module.with_state(ModuleState::Typed(Rc::new(TypedUnit {
            parsed: Some(parsed),
            range_map: checked.range_map,
            core: Rc::new(checked.core),
            inlines: Inlines::none(),
        }))))
    }

    /// Type checks `name` after its dependencies. Returns `true` if it ends up typed.
    fn check_rec(
        &self,
        env: &BuildEnv<'_>,
        modules: &mut BTreeMap<ModuleName, Module>,
        name: &ModuleName,
        visiting: &mut HashSet<ModuleName>,
    ) -> BuildResult<bool> {
        let Some(module) = modules.get(name) else {
            return Ok(false);
        };
        let phase = module.phase();
        if phase.is_error() {
            return Ok(false);
        }
        if phase.is_typed() {
            return Ok(true);
        }
        if !visiting.insert(name.clone()) {
            return Ok(false);
        }
        let mut ready = true;
        for dep in module.import_names().unwrap_or_default().to_vec() {
            ready &= self.check_rec(env, modules, &dep, visiting)?;
        }
        if !ready {
            return Ok(false);
        }
        let Some(module) = modules.remove(name) else {
            return Ok(false);
        };
        let module = self.check_one(env, module)?;
        let typed = module.phase() == Phase::Typed;
        modules.insert(name.clone(), module);
        Ok(typed)
    }

    fn link(
        &self,
        env: &BuildEnv<'_>,
        mains: &[QualifiedName],
        module: Module,
        scripts: &Rc<Scripts>,
    ) -> Module {
        let unit = match module.state() {
            ModuleState::Typed(unit)
            | ModuleState::Optimized(unit)
            | ModuleState::CodeGen(unit)
            | ModuleState::LibIfaceLoaded(unit) => unit.clone(),
            ModuleState::Linked(linked) if linked.entry.is_none() => linked.typed.clone(),
            _ => return module,
        };
        let Some(main) = mains.iter().find(|m| &m.module == module.name()) else {
            if matches!(module.state(), ModuleState::Linked(_)) {
                return module;
            }
            return module.with_state(ModuleState::Linked(Rc::new(LinkedUnit {
                typed: unit,
                entry: None,
            })));
        };
        if unit.core.value(&main.name).is_none() {
            let diag = Diagnostic::error(B_LINK, format!("no function '{}' to link", main.name))
                .with_note(format!("module '{}' was linked as a program", module.name()));
            return module.with_state(ModuleState::LinkedError(Failed::new(unit, vec![diag])));
        }

        let exe = env.config.build.output_dir.join(module.name().as_str());
        let (scripts, console, main) = (scripts.clone(), self.console.clone(), main.clone());
        let entry = Entry::new(exe, move || interp::run(&scripts, &console, &main).map(|_| ()));
        debug!(module = %module.name(), "linked entry point");
        module.with_state(ModuleState::Linked(Rc::new(LinkedUnit {
            typed: unit,
            entry: Some(entry),
        })))
    }
}

fn source_of(module: &Module) -> BuildResult<PathBuf> {
    module
        .source_path()
        .map(Path::to_path_buf)
        .ok_or_else(|| BuildError::ResolveModule {
            name: module.name().clone(),
            reason: "module has no source file".to_string(),
        })
}

fn read(env: &BuildEnv<'_>, path: &Path) -> BuildResult<kiln_source::SourceText> {
    env.reader().read(path).map_err(|e| BuildError::ResolveSource {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

impl BuildHost for ScriptHost {
    fn resolve_source(&self, env: &BuildEnv<'_>, path: &Path) -> BuildResult<Module> {
        self.shell(env, None, path)
    }

    fn resolve_module_name(
        &self,
        env: &BuildEnv<'_>,
        base_dir: &Path,
        name: &ModuleName,
    ) -> BuildResult<Module> {
        let relative = name.to_relative_path(env.source_extension());
        let local = (!base_dir.as_os_str().is_empty()).then(|| base_dir.join(&relative));
        let reader = env.reader();
        let found = local
            .into_iter()
            .chain(self.include_roots(env).iter().map(|root| root.join(&relative)))
            .find(|candidate| reader.exists(candidate))
            .ok_or_else(|| BuildError::ResolveModule {
                name: name.clone(),
                reason: "not found on the search path".to_string(),
            })?;
        self.shell(env, Some(name.clone()), &found)
    }

    fn revalidate_dependencies(
        &self,
        env: &BuildEnv<'_>,
        rebuild: bool,
        forced: &[ModuleName],
        dependencies: Vec<Module>,
        roots: Vec<Module>,
    ) -> BuildResult<Vec<Module>> {
        let mut queue: VecDeque<ModuleName> = roots.iter().map(|m| m.name().clone()).collect();
        let mut pool: BTreeMap<ModuleName, Module> = dependencies
            .into_iter()
            .chain(roots)
            .map(|m| (m.name().clone(), m))
            .collect();
        let mut closure: BTreeMap<ModuleName, Module> = BTreeMap::new();
        let mut fresh: HashSet<ModuleName> = HashSet::new();

        while let Some(name) = queue.pop_front() {
            if closure.contains_key(&name) {
                continue;
            }
            let mut module = match pool.remove(&name) {
                Some(module) => module,
                None => self.resolve_module_name(env, Path::new(""), &name)?,
            };
            if rebuild || forced.contains(&name) || self.is_stale(env, &module) {
                debug!(module = %name, "source changed, resetting");
                let path = source_of(&module)?;
                let open = module.should_open();
                module = self.shell(env, Some(name.clone()), &path)?;
                module.set_should_open(open);
            }
            if module.phase() == Phase::Init {
                module = self.load(env, module)?;
                fresh.insert(name.clone());
            }
            queue.extend(module.import_names().unwrap_or_default().iter().cloned());
            closure.insert(name, module);
        }

        loop {
            let dirty: Vec<ModuleName> = closure
                .values()
                .filter(|m| !fresh.contains(m.name()))
                .filter(|m| {
                    m.import_names()
                        .unwrap_or_default()
                        .iter()
                        .any(|d| fresh.contains(d))
                })
                .map(|m| m.name().clone())
                .collect();
            if dirty.is_empty() {
                break;
            }
            for name in dirty {
                if let Some(module) = closure.get_mut(&name) {
                    debug!(module = %name, "dependency changed, resetting");
                    module.reset();
                    *module = self.load(env, module.clone())?;
                }
                fresh.insert(name);
            }
        }
        Ok(closure.into_values().collect())
    }

    fn type_check_modules(
        &self,
        env: &BuildEnv<'_>,
        modules: Vec<Module>,
    ) -> BuildResult<Vec<Module>> {
        let mut map: BTreeMap<ModuleName, Module> =
            modules.into_iter().map(|m| (m.name().clone(), m)).collect();
        let names: Vec<ModuleName> = map.keys().cloned().collect();
        let mut visiting = HashSet::new();
        for name in &names {
            self.check_rec(env, &mut map, name, &mut visiting)?;
        }
        Ok(map.into_values().collect())
    }

    fn build_modules(
        &self,
        env: &BuildEnv<'_>,
        mains: &[QualifiedName],
        modules: Vec<Module>,
    ) -> BuildResult<Vec<Module>> {
        let modules = self.type_check_modules(env, modules)?;
        let scripts = Rc::new(self.scripts.borrow().clone());
        Ok(modules
            .into_iter()
            .map(|module| self.link(env, mains, module, &scripts))
            .collect())
    }

    fn search_source_file(&self, env: &BuildEnv<'_>, hint: &Path) -> Option<FoundSource> {
        let reader = env.reader();
        if hint.is_absolute() {
            return reader.exists(hint).then(|| FoundSource {
                root: PathBuf::new(),
                stem: hint.to_path_buf(),
            });
        }
        self.include_roots(env)
            .into_iter()
            .find(|root| reader.exists(&root.join(hint)))
            .map(|root| FoundSource {
                root,
                stem: hint.to_path_buf(),
            })
    }
}
