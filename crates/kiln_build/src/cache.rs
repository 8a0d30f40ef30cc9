//! The module cache: at most one record per module name.

use crate::module::{merge_modules, Module};
use kiln_common::ModuleName;
use std::collections::BTreeMap;
use std::path::Path;

/// Cached modules keyed by name.
///
/// Every insertion goes through [`merge_modules`], so a module already in the
/// cache is never replaced by a record at a lower phase.
#[derive(Clone, Debug, Default)]
pub struct ModuleCache {
    modules: BTreeMap<ModuleName, Module>,
}

impl ModuleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a cache from a list, merging duplicate names (earlier records win ties).
    pub fn from_modules(modules: impl IntoIterator<Item = Module>) -> Self {
        let mut cache = Self::new();
        for module in modules {
            cache.merge_under(module);
        }
        cache
    }

    /// Inserts `module`; on a tie the record already cached is kept.
    pub fn merge_under(&mut self, module: Module) {
        self.merge_with(module, false);
    }

    /// Inserts `module`; on a tie `module` replaces the cached record.
    pub fn merge_over(&mut self, module: Module) {
        self.merge_with(module, true);
    }

    fn merge_with(&mut self, module: Module, incoming_wins: bool) {
        let merged = match self.modules.remove(module.name()) {
            Some(existing) if incoming_wins => merge_modules(module, existing),
            Some(existing) => merge_modules(existing, module),
            None => module,
        };
        self.modules.insert(merged.name().clone(), merged);
    }

    /// Returns the module named `name`.
    pub fn get(&self, name: &ModuleName) -> Option<&Module> {
        self.modules.get(name)
    }

    /// Returns the module named `name` for in-place updates.
    pub fn get_mut(&mut self, name: &ModuleName) -> Option<&mut Module> {
        self.modules.get_mut(name)
    }

    /// Returns `true` if `name` is cached.
    pub fn contains(&self, name: &ModuleName) -> bool {
        self.modules.contains_key(name)
    }

    /// Removes and returns the module named `name`.
    pub fn remove(&mut self, name: &ModuleName) -> Option<Module> {
        self.modules.remove(name)
    }

    /// Returns the module whose source is `path` (canonical or include-relative).
    pub fn find_by_path(&self, path: &Path) -> Option<&Module> {
        self.modules.values().find(|m| m.matches_path(path))
    }

    /// Returns the number of cached modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Returns the cached names in order.
    pub fn names(&self) -> Vec<ModuleName> {
        self.modules.keys().cloned().collect()
    }

    /// Iterates over cached modules in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Iterates mutably over cached modules in name order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Module> {
        self.modules.values_mut()
    }

    /// Consumes the cache into a list in name order.
    pub fn into_modules(self) -> Vec<Module> {
        self.modules.into_values().collect()
    }

    /// Splits the cache into root modules (in `roots` order) and the rest.
    pub fn partition(&self, roots: &[ModuleName]) -> (Vec<Module>, Vec<Module>) {
        let root_modules = roots.iter().filter_map(|r| self.get(r).cloned()).collect();
        let dependencies = self
            .modules
            .values()
            .filter(|m| !roots.contains(m.name()))
            .cloned()
            .collect();
        (root_modules, dependencies)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{LoadedUnit, ModulePaths, ModuleState, Stamped};
    use crate::phase::Phase;
    use std::rc::Rc;
    use std::time::SystemTime;

    fn init(name: &str) -> Module {
        Module::new(ModuleName::new(name))
    }

    fn loaded(name: &str) -> Module {
        init(name).with_state(ModuleState::Loaded(Rc::new(LoadedUnit {
            lexemes: Vec::new(),
            import_names: Vec::new(),
        })))
    }

    #[test]
    fn merge_never_regresses() {
        let mut cache = ModuleCache::new();
        cache.merge_under(loaded("a"));
        cache.merge_under(init("a"));
        assert_eq!(cache.get(&"a".into()).unwrap().phase(), Phase::Loaded);
        cache.merge_over(init("a"));
        assert_eq!(cache.get(&"a".into()).unwrap().phase(), Phase::Loaded);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn tie_break_direction() {
        let first = loaded("a");
        let second = loaded("a");

        let mut under = ModuleCache::from_modules(vec![first.clone()]);
        under.merge_under(second.clone());
        assert!(under.get(&"a".into()).unwrap().same_artifacts(&first));

        let mut over = ModuleCache::from_modules(vec![first]);
        over.merge_over(second.clone());
        assert!(over.get(&"a".into()).unwrap().same_artifacts(&second));
    }

    #[test]
    fn partition_by_roots() {
        let cache = ModuleCache::from_modules(vec![init("c"), init("a"), init("b")]);
        let (roots, deps) = cache.partition(&[
            ModuleName::new("b"),
            ModuleName::new("a"),
            ModuleName::new("zz"),
        ]);
        let root_names: Vec<&str> = roots.iter().map(|m| m.name().as_str()).collect();
        let dep_names: Vec<&str> = deps.iter().map(|m| m.name().as_str()).collect();
        assert_eq!(root_names, vec!["b", "a"]);
        assert_eq!(dep_names, vec!["c"]);
    }

    #[test]
    fn find_by_path_and_names() {
        let with_src = init("app/x").with_paths(ModulePaths {
            source: Some(Stamped::new("/p/app/x.kk", SystemTime::UNIX_EPOCH)),
            relative_source: Some("app/x.kk".into()),
            ..ModulePaths::default()
        });
        let cache = ModuleCache::from_modules(vec![with_src, init("b")]);
        assert_eq!(
            cache.find_by_path(Path::new("app/x.kk")).map(|m| m.name().as_str()),
            Some("app/x")
        );
        assert!(cache.find_by_path(Path::new("/p/b.kk")).is_none());
        assert_eq!(cache.names(), vec![ModuleName::new("app/x"), ModuleName::new("b")]);
        assert!(!cache.is_empty());
        assert!(cache.contains(&"b".into()));
    }
}
