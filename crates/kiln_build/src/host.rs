//! The collaborators the build core delegates to.
//!
//! Scanning, parsing, type inference, optimization, and code generation all
//! live behind [`BuildHost`]. The build context only decides *which* modules
//! to hand over and how to fold the results back into its cache.

use crate::env::BuildEnv;
use crate::error::BuildResult;
use crate::module::Module;
use crate::types::{handled_labels, Type};
use kiln_common::{ModuleName, QualifiedName};
use std::path::{Path, PathBuf};

/// A file found by [`BuildHost::search_source_file`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct FoundSource {
    /// The include root the file was found under.
    pub root: PathBuf,
    /// The file path relative to `root`.
    pub stem: PathBuf,
}

/// Compiler services used by the build context.
pub trait BuildHost {
    /// Resolves a source path to a shell module (phase `Init`, paths filled in).
    fn resolve_source(&self, env: &BuildEnv<'_>, path: &Path) -> BuildResult<Module>;

    /// Resolves a module name on the search path, relative to `base_dir`.
    fn resolve_module_name(
        &self,
        env: &BuildEnv<'_>,
        base_dir: &Path,
        name: &ModuleName,
    ) -> BuildResult<Module>;

    /// Recomputes the dependency closure of `roots`.
    ///
    /// Modules whose sources changed (or that are named in `forced`, or all
    /// modules when `rebuild` is set) are reset; modules not reachable from
    /// any root are left out of the result.
    fn revalidate_dependencies(
        &self,
        env: &BuildEnv<'_>,
        rebuild: bool,
        forced: &[ModuleName],
        dependencies: Vec<Module>,
        roots: Vec<Module>,
    ) -> BuildResult<Vec<Module>>;

    /// Type checks the modules, returning every module at its new phase.
    fn type_check_modules(&self, env: &BuildEnv<'_>, modules: Vec<Module>)
        -> BuildResult<Vec<Module>>;

    /// Generates code and links the modules; each name in `mains` gets an entry point.
    fn build_modules(
        &self,
        env: &BuildEnv<'_>,
        mains: &[QualifiedName],
        modules: Vec<Module>,
    ) -> BuildResult<Vec<Module>>;

    /// Finds a source file from a path hint.
    fn search_source_file(&self, env: &BuildEnv<'_>, hint: &Path) -> Option<FoundSource>;

    /// Returns the labels of an effect row that need a handler.
    fn effect_labels(&self, effect: &Type) -> Vec<Type> {
        handled_labels(effect)
    }
}
