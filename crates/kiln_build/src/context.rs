//! The incremental build context.
//!
//! A [`BuildContext`] owns the root set, the module cache, and the fingerprint
//! of the configuration the cache was built under. [`BuildContext::validate`]
//! brings the cache back to exactly the dependency closure of the roots;
//! [`BuildContext::type_check`] and [`BuildContext::build`] advance it through
//! the collaborators in [`BuildEnv::host`]; [`BuildContext::focus`] runs a
//! sub-build on a narrowed root set without losing the rest of the cache.
//!
//! Modules dropped by revalidation are kept in a retired store so an earlier
//! compiled copy stays available to lookups until the configuration changes.

use crate::artifact::{InlineDef, Inlines, RangeMap};
use crate::cache::ModuleCache;
use crate::definitions::{Definitions, SymbolInfo};
use crate::env::BuildEnv;
use crate::error::{BuildError, BuildResult};
use crate::errors;
use crate::host::FoundSource;
use crate::module::{Module, TypedUnit};
use crate::types::Type;
use kiln_common::{ContentHash, ModuleName, QualifiedName};
use kiln_diagnostics::Diagnostic;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Roots, cached modules, and the configuration fingerprint of one session.
#[derive(Clone, Debug)]
pub struct BuildContext {
    roots: Vec<ModuleName>,
    modules: ModuleCache,
    retired: ModuleCache,
    fingerprint: ContentHash,
}

impl BuildContext {
    /// Creates an empty context for a configuration fingerprint.
    pub fn new(fingerprint: ContentHash) -> Self {
        Self {
            roots: Vec::new(),
            modules: ModuleCache::new(),
            retired: ModuleCache::new(),
            fingerprint,
        }
    }

    /// Creates an empty context for the configuration of `env`.
    pub fn for_env(env: &BuildEnv<'_>) -> Self {
        Self::new(env.fingerprint())
    }

    /// Returns the root modules in insertion order.
    pub fn roots(&self) -> &[ModuleName] {
        &self.roots
    }

    /// Returns the module cache.
    pub fn modules(&self) -> &ModuleCache {
        &self.modules
    }

    /// Returns the fingerprint the cache was validated under.
    pub fn fingerprint(&self) -> ContentHash {
        self.fingerprint
    }

    // ---- roots ----

    /// Adds source files as roots.
    ///
    /// Returns the module name of every path, in call order, including
    /// those that were already roots.
    pub fn add_root_sources(
        &mut self,
        env: &BuildEnv<'_>,
        paths: &[PathBuf],
    ) -> BuildResult<Vec<ModuleName>> {
        let shells = paths
            .iter()
            .map(|path| env.host.resolve_source(env, path))
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(self.add_roots(shells))
    }

    /// Adds modules found on the search path as roots.
    pub fn add_root_modules(
        &mut self,
        env: &BuildEnv<'_>,
        names: &[ModuleName],
    ) -> BuildResult<Vec<ModuleName>> {
        let shells = names
            .iter()
            .map(|name| env.host.resolve_module_name(env, Path::new(""), name))
            .collect::<BuildResult<Vec<_>>>()?;
        Ok(self.add_roots(shells))
    }

    fn add_roots(&mut self, shells: Vec<Module>) -> Vec<ModuleName> {
        let mut names = Vec::with_capacity(shells.len());
        for shell in shells {
            let name = shell.name().clone();
            if !self.roots.contains(&name) {
                debug!(module = %name, "adding root");
                self.roots.push(name.clone());
            }
            if let Some(retired) = self.retired.remove(&name) {
                debug!(module = %name, phase = %retired.phase(), "restoring retired module");
                self.modules.merge_under(retired);
            }
            self.modules.merge_under(shell);
            names.push(name);
        }
        names
    }

    /// Removes every root. Cached modules are kept.
    pub fn clear_roots(&mut self) {
        self.roots.clear();
    }

    /// Removes one root by name. Returns `true` if it was a root.
    pub fn remove_root_module(&mut self, name: &ModuleName) -> bool {
        let before = self.roots.len();
        self.roots.retain(|r| r != name);
        before != self.roots.len()
    }

    /// Removes the root whose source is `path`, matched against canonical or
    /// include-relative paths. Returns the removed module name.
    pub fn remove_root_source(&mut self, path: &Path) -> Option<ModuleName> {
        let name = self
            .roots
            .iter()
            .find(|root| {
                self.lookup_module(root)
                    .is_some_and(|module| module.matches_path(path))
            })?
            .clone();
        self.remove_root_module(&name);
        Some(name)
    }

    // ---- validation ----

    /// Reconciles the cache with the configuration and the root set.
    ///
    /// On a fingerprint change the cache is discarded and every root is
    /// resolved again from its source. Otherwise the collaborator revalidates
    /// the cached modules, resetting those named in `forced` (or all of them
    /// when `rebuild` is set). Afterwards the cache holds exactly the
    /// dependency closure of the roots.
    pub fn validate(
        &mut self,
        env: &BuildEnv<'_>,
        rebuild: bool,
        forced: &[ModuleName],
    ) -> BuildResult<()> {
        let fingerprint = env.fingerprint();
        if fingerprint != self.fingerprint {
            debug!(
                old = %self.fingerprint,
                new = %fingerprint,
                "configuration changed, rebuilding from roots"
            );
            let roots = self
                .roots
                .iter()
                .map(|name| self.resolve_fresh(env, name))
                .collect::<BuildResult<Vec<_>>>()?;
            let modules =
                env.host
                    .revalidate_dependencies(env, rebuild, forced, Vec::new(), roots)?;
            self.modules = ModuleCache::from_modules(modules);
            self.retired = ModuleCache::new();
            self.fingerprint = fingerprint;
            return Ok(());
        }

        let (mut roots, dependencies) = self.modules.partition(&self.roots);
        for name in &self.roots {
            if !self.modules.contains(name) {
                roots.push(self.resolve_fresh(env, name)?);
            }
        }
        let modules = env
            .host
            .revalidate_dependencies(env, rebuild, forced, dependencies, roots)?;
        let next = ModuleCache::from_modules(modules);
        for module in self.modules.iter().filter(|m| !next.contains(m.name())) {
            debug!(module = %module.name(), "retiring unreachable module");
            self.retired.merge_over(module.clone());
        }
        self.modules = next;
        debug!(modules = self.modules.len(), roots = self.roots.len(), "validated");
        Ok(())
    }

    /// Resolves a root again from its original source path, or from the
    /// search path when it has none.
    fn resolve_fresh(&self, env: &BuildEnv<'_>, name: &ModuleName) -> BuildResult<Module> {
        match self.lookup_module(name).and_then(Module::source_path) {
            Some(path) => env.host.resolve_source(env, path),
            None => env.host.resolve_module_name(env, Path::new(""), name),
        }
    }

    /// Validates, then type checks every cached module.
    pub fn type_check(&mut self, env: &BuildEnv<'_>) -> BuildResult<()> {
        self.validate(env, false, &[])?;
        let modules = env
            .host
            .type_check_modules(env, self.modules.clone().into_modules())?;
        self.modules = ModuleCache::from_modules(modules);
        Ok(())
    }

    /// Validates, then builds every cached module, linking entry points for `mains`.
    pub fn build(&mut self, env: &BuildEnv<'_>, mains: &[QualifiedName]) -> BuildResult<()> {
        self.build_ex(env, false, &[], mains)
    }

    /// [`build`](Self::build) with explicit rebuild controls.
    pub fn build_ex(
        &mut self,
        env: &BuildEnv<'_>,
        rebuild: bool,
        forced: &[ModuleName],
        mains: &[QualifiedName],
    ) -> BuildResult<()> {
        env.timed("build", || {
            self.validate(env, rebuild, forced)?;
            let modules = env
                .host
                .build_modules(env, mains, self.modules.clone().into_modules())?;
            self.modules = ModuleCache::from_modules(modules);
            Ok(())
        })
    }

    /// Runs `action` on a context narrowed to the roots `names`.
    ///
    /// The names first become roots of this context and are validated, so
    /// their dependencies resolve. `action` then sees exactly `names` as
    /// roots but the full cache. Its modules are merged back (its records win
    /// ties), the original roots are restored, and the names of the modules
    /// `action` produced or changed are returned with its result.
    pub fn focus<T>(
        &mut self,
        env: &BuildEnv<'_>,
        names: &[ModuleName],
        action: impl FnOnce(&mut BuildContext, &BuildEnv<'_>) -> BuildResult<T>,
    ) -> BuildResult<(T, Vec<ModuleName>)> {
        let saved_roots = self.roots.clone();
        let prepared = self.prepare_focus(env, names);
        if let Err(err) = prepared {
            self.roots = saved_roots;
            return Err(err);
        }

        let baseline = self.modules.clone();
        let mut narrowed = BuildContext {
            roots: names.to_vec(),
            modules: self.modules.clone(),
            retired: ModuleCache::new(),
            fingerprint: self.fingerprint,
        };
        let result = action(&mut narrowed, env);

        let mut touched = Vec::new();
        for module in narrowed.modules.into_modules() {
            let changed = baseline
                .get(module.name())
                .map_or(true, |before| !before.same_artifacts(&module));
            if changed {
                touched.push(module.name().clone());
            }
            self.modules.merge_over(module);
        }
        self.roots = saved_roots;
        debug!(?touched, "focus finished");
        Ok((result?, touched))
    }

    fn prepare_focus(&mut self, env: &BuildEnv<'_>, names: &[ModuleName]) -> BuildResult<()> {
        let unknown: Vec<ModuleName> = names
            .iter()
            .filter(|name| self.lookup_module(name).is_none())
            .cloned()
            .collect();
        self.add_root_modules(env, &unknown)?;
        for name in names {
            if !self.roots.contains(name) {
                self.roots.push(name.clone());
            }
            if let Some(retired) = self.retired.remove(name) {
                self.modules.merge_under(retired);
            }
        }
        self.validate(env, false, &[])
    }

    // ---- lookups ----

    /// Returns a module from the cache, or a retired copy.
    pub fn lookup_module(&self, name: &ModuleName) -> Option<&Module> {
        self.modules.get(name).or_else(|| self.retired.get(name))
    }

    /// Returns the module whose source is `path` (canonical or include-relative).
    pub fn lookup_module_by_path(&self, path: &Path) -> Option<&Module> {
        self.modules
            .find_by_path(path)
            .or_else(|| self.retired.find_by_path(path))
    }

    /// Returns the cached module names in order.
    pub fn module_names(&self) -> Vec<ModuleName> {
        self.modules.names()
    }

    /// Marks whether a module's private definitions are visible to lookups.
    pub fn set_open(&mut self, name: &ModuleName, open: bool) -> bool {
        match self.modules.get_mut(name) {
            Some(module) => {
                module.set_should_open(open);
                true
            }
            None => false,
        }
    }

    /// Composes the symbol tables of the named modules, in argument order.
    ///
    /// Names without a typed module are skipped.
    pub fn get_definitions(&self, names: &[ModuleName]) -> Definitions {
        Definitions::compose_all(
            names
                .iter()
                .filter_map(|name| self.lookup_module(name))
                .filter_map(Module::definitions)
                .map(Rc::unwrap_or_clone),
        )
    }

    /// Composes the symbol tables of every cached module.
    pub fn all_definitions(&self) -> Definitions {
        Definitions::compose_all(
            self.modules
                .iter()
                .filter_map(Module::definitions)
                .map(Rc::unwrap_or_clone),
        )
    }

    /// Returns every symbol with a fully qualified name.
    pub fn lookup_symbol(&self, name: &QualifiedName) -> Vec<SymbolInfo> {
        self.lookup_module(&name.module)
            .and_then(Module::definitions)
            .and_then(|defs| defs.lookup(name).cloned())
            .into_iter()
            .collect()
    }

    /// Resolves a name that may or may not be qualified.
    ///
    /// A qualified name must match exactly; a bare name must match exactly one
    /// symbol across the cache.
    pub fn lookup_unqualified(&self, name: &str) -> BuildResult<SymbolInfo> {
        let mut candidates: Vec<SymbolInfo> = match QualifiedName::parse(name) {
            Some(qname) if self.lookup_module(&qname.module).is_none() => {
                return Err(BuildError::Unresolved(Box::new(errors::unknown_module(
                    &qname.module,
                ))));
            }
            Some(qname) => self.lookup_symbol(&qname),
            None => self
                .all_definitions()
                .lookup_unqualified(name)
                .into_iter()
                .cloned()
                .collect(),
        };
        match candidates.len() {
            0 => Err(BuildError::Unresolved(Box::new(errors::unknown_symbol(name)))),
            1 => Ok(candidates.remove(0)),
            _ => {
                let names: Vec<QualifiedName> = candidates.into_iter().map(|c| c.name).collect();
                Err(BuildError::Unresolved(Box::new(errors::ambiguous_symbol(
                    name, &names,
                ))))
            }
        }
    }

    /// Returns the type scheme of a fully qualified name.
    pub fn lookup_type_of(&self, name: &QualifiedName) -> Option<Type> {
        self.lookup_symbol(name).into_iter().next().map(|info| info.ty)
    }

    /// Returns the range map of a typed module.
    pub fn range_map(&self, name: &ModuleName) -> Option<&RangeMap> {
        self.lookup_module(name)?.range_map()
    }

    /// Finds a source file through the collaborator.
    pub fn search_source_file(&self, env: &BuildEnv<'_>, hint: &Path) -> Option<FoundSource> {
        env.host.search_source_file(env, hint)
    }

    // ---- inlines ----

    /// Resolves pending inline definitions against the whole-program symbol table.
    pub fn resolve_inlines(&mut self) -> BuildResult<()> {
        let defs = self.all_definitions();
        for module in self.modules.iter_mut() {
            let Some(typed) = module.typed_unit() else {
                continue;
            };
            if !typed.inlines.is_pending() {
                continue;
            }
            let resolved = typed.inlines.resolve(&defs).map_err(|message| {
                BuildError::collaborator("inline resolution", format!("{}: {message}", module.name()))
            })?;
            let unit = Rc::new(TypedUnit {
                parsed: typed.parsed.clone(),
                range_map: typed.range_map.clone(),
                core: typed.core.clone(),
                inlines: Inlines::Resolved(resolved),
            });
            debug!(module = %module.name(), "resolved inline definitions");
            module.replace_typed_unit(unit);
        }
        Ok(())
    }

    /// Returns the resolved inline definitions of a module.
    ///
    /// `None` if the module is not typed or its inlines are still pending.
    pub fn inlines(&self, name: &ModuleName) -> Option<&[InlineDef]> {
        match self.lookup_module(name)?.inlines()? {
            Inlines::Resolved(list) => Some(list),
            Inlines::Pending(_) => None,
        }
    }

    // ---- errors and housekeeping ----

    /// Returns the diagnostics of every cached module in an error phase.
    pub fn errors(&self) -> Vec<Diagnostic> {
        self.modules
            .iter()
            .flat_map(|m| m.errors().iter().cloned())
            .collect()
    }

    /// Returns the error diagnostics of `names` and of every cached module they
    /// import, directly or not, in module name order.
    pub fn errors_reachable_from(&self, names: &[ModuleName]) -> Vec<Diagnostic> {
        let mut reached = BTreeSet::new();
        let mut todo = names.to_vec();
        while let Some(name) = todo.pop() {
            if !reached.insert(name.clone()) {
                continue;
            }
            if let Some(module) = self.modules.get(&name) {
                todo.extend(module.import_names().unwrap_or_default().iter().cloned());
            }
        }
        self.modules
            .iter()
            .filter(|m| reached.contains(m.name()))
            .flat_map(|m| m.errors().iter().cloned())
            .collect()
    }

    /// Returns `true` if any cached module is in an error phase.
    pub fn has_errors(&self) -> bool {
        self.modules.iter().any(Module::has_errors)
    }

    /// Fails with every error diagnostic if any cached module is in an error phase.
    pub fn throw_on_error(&self) -> BuildResult<()> {
        if self.has_errors() {
            Err(BuildError::Failed {
                diagnostics: self.errors(),
            })
        } else {
            Ok(())
        }
    }

    /// Drops tokens and syntax trees of typed modules. Returns how many were leaned.
    pub fn lean(&mut self) -> usize {
        let count = self
            .modules
            .iter_mut()
            .map(Module::lean)
            .filter(|leaned| *leaned)
            .count();
        debug!(count, "leaned modules");
        count
    }
}
