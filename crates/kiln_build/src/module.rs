//! Compilation units and their phase-tagged artifacts.
//!
//! A [`Module`] pairs a name and its file paths with a [`ModuleState`]: one
//! variant per phase, each carrying exactly the artifacts valid at that
//! phase. Payloads are reference counted, so cloning a module is cheap and
//! [`Module::same_artifacts`] can tell a reused record from a recompiled one
//! by identity.

use crate::artifact::{Entry, Inlines, Lexeme, Program, RangeMap};
use crate::ir::CoreProgram;
use crate::definitions::Definitions;
use crate::phase::Phase;
use kiln_common::ModuleName;
use kiln_diagnostics::Diagnostic;
use kiln_source::path::{normalize, same_path};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::SystemTime;

/// A file path with the modification time observed when it was resolved.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Stamped {
    /// The path.
    pub path: PathBuf,
    /// Last modification time.
    pub modified: SystemTime,
}

impl Stamped {
    /// Creates a stamped path.
    pub fn new(path: impl Into<PathBuf>, modified: SystemTime) -> Self {
        Self {
            path: path.into(),
            modified,
        }
    }
}

/// The files backing a module.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ModulePaths {
    /// The source file.
    pub source: Option<Stamped>,
    /// The generated interface file.
    pub iface: Option<Stamped>,
    /// The precompiled library interface.
    pub lib_iface: Option<Stamped>,
    /// The source path relative to its include root, used in diagnostics.
    pub relative_source: Option<PathBuf>,
}

/// Artifacts of a scanned module.
#[derive(Debug)]
pub struct LoadedUnit {
    /// The token stream.
    pub lexemes: Vec<Lexeme>,
    /// Direct dependencies named by import declarations.
    pub import_names: Vec<ModuleName>,
}

/// Artifacts of a parsed module.
#[derive(Debug)]
pub struct ParsedUnit {
    /// The scan this parse was built from.
    pub loaded: Rc<LoadedUnit>,
    /// The syntax tree.
    pub program: Program,
}

/// Artifacts of a type-checked module.
///
/// `parsed` is `None` for modules loaded from an interface and for modules
/// whose syntax was dropped by [`Module::lean`].
#[derive(Debug)]
pub struct TypedUnit {
    /// The parse this module was checked from.
    pub parsed: Option<Rc<ParsedUnit>>,
    /// Resolved names and types by source range.
    pub range_map: RangeMap,
    /// The core program.
    pub core: Rc<CoreProgram>,
    /// Inline definitions.
    pub inlines: Inlines,
}

/// Artifacts of a linked module.
#[derive(Debug)]
pub struct LinkedUnit {
    /// The typed artifacts the program was generated from.
    pub typed: Rc<TypedUnit>,
    /// The entry point, when the module was linked with a main function.
    pub entry: Option<Entry>,
}

/// A failed step: the artifacts of the previous step plus the diagnostics.
#[derive(Debug)]
pub struct Failed<T> {
    /// Artifacts of the last successful step.
    pub unit: Rc<T>,
    /// The diagnostics that stopped this step.
    pub errors: Vec<Diagnostic>,
}

impl<T> Failed<T> {
    /// Creates a failure record.
    pub fn new(unit: Rc<T>, errors: Vec<Diagnostic>) -> Rc<Self> {
        Rc::new(Self { unit, errors })
    }
}

/// The phase of a module together with the artifacts valid at that phase.
#[derive(Clone, Debug)]
pub enum ModuleState {
    /// Known by name only.
    Init,
    /// Scanned.
    Loaded(Rc<LoadedUnit>),
    /// Parsing failed.
    ParsedError(Rc<Failed<LoadedUnit>>),
    /// Parsed.
    Parsed(Rc<ParsedUnit>),
    /// Type checking failed.
    TypedError(Rc<Failed<ParsedUnit>>),
    /// Type checked.
    Typed(Rc<TypedUnit>),
    /// Optimized.
    Optimized(Rc<TypedUnit>),
    /// Code generated.
    CodeGen(Rc<TypedUnit>),
    /// Library interface loaded.
    LibIfaceLoaded(Rc<TypedUnit>),
    /// Linking failed.
    LinkedError(Rc<Failed<TypedUnit>>),
    /// Linked.
    Linked(Rc<LinkedUnit>),
}

impl ModuleState {
    /// Returns the phase this state belongs to.
    pub fn phase(&self) -> Phase {
        match self {
            ModuleState::Init => Phase::Init,
            ModuleState::Loaded(_) => Phase::Loaded,
            ModuleState::ParsedError(_) => Phase::ParsedError,
            ModuleState::Parsed(_) => Phase::Parsed,
            ModuleState::TypedError(_) => Phase::TypedError,
            ModuleState::Typed(_) => Phase::Typed,
            ModuleState::Optimized(_) => Phase::Optimized,
            ModuleState::CodeGen(_) => Phase::CodeGen,
            ModuleState::LibIfaceLoaded(_) => Phase::LibIfaceLoaded,
            ModuleState::LinkedError(_) => Phase::LinkedError,
            ModuleState::Linked(_) => Phase::Linked,
        }
    }

    /// Returns `true` if both states are the same phase with the same payload.
    pub fn same_payload(&self, other: &ModuleState) -> bool {
        use ModuleState::*;
        match (self, other) {
            (Init, Init) => true,
            (Loaded(a), Loaded(b)) => Rc::ptr_eq(a, b),
            (ParsedError(a), ParsedError(b)) => Rc::ptr_eq(a, b),
            (Parsed(a), Parsed(b)) => Rc::ptr_eq(a, b),
            (TypedError(a), TypedError(b)) => Rc::ptr_eq(a, b),
            (Typed(a), Typed(b))
            | (Optimized(a), Optimized(b))
            | (CodeGen(a), CodeGen(b))
            | (LibIfaceLoaded(a), LibIfaceLoaded(b)) => Rc::ptr_eq(a, b),
            (LinkedError(a), LinkedError(b)) => Rc::ptr_eq(a, b),
            (Linked(a), Linked(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    fn loaded(&self) -> Option<&LoadedUnit> {
        match self {
            ModuleState::Init => None,
            ModuleState::Loaded(unit) => Some(unit.as_ref()),
            ModuleState::ParsedError(failed) => Some(failed.unit.as_ref()),
            _ => self.parsed().map(|p| &*p.loaded),
        }
    }

    fn parsed(&self) -> Option<&ParsedUnit> {
        match self {
            ModuleState::Parsed(unit) => Some(unit.as_ref()),
            ModuleState::TypedError(failed) => Some(failed.unit.as_ref()),
            _ => self.typed().and_then(|t| t.parsed.as_deref()),
        }
    }

    fn typed(&self) -> Option<&Rc<TypedUnit>> {
        match self {
            ModuleState::Typed(unit)
            | ModuleState::Optimized(unit)
            | ModuleState::CodeGen(unit)
            | ModuleState::LibIfaceLoaded(unit) => Some(unit),
            ModuleState::LinkedError(failed) => Some(&failed.unit),
            ModuleState::Linked(linked) => Some(&linked.typed),
            _ => None,
        }
    }

    fn errors(&self) -> &[Diagnostic] {
        match self {
            ModuleState::ParsedError(failed) => failed.errors.as_slice(),
            ModuleState::TypedError(failed) => failed.errors.as_slice(),
            ModuleState::LinkedError(failed) => failed.errors.as_slice(),
            _ => &[],
        }
    }

    /// Returns the same state with its typed payload replaced by `unit`.
    ///
    /// `None` for states without typed artifacts.
    pub fn with_typed_unit(&self, unit: Rc<TypedUnit>) -> Option<ModuleState> {
        Some(match self {
            ModuleState::Typed(_) => ModuleState::Typed(unit),
            ModuleState::Optimized(_) => ModuleState::Optimized(unit),
            ModuleState::CodeGen(_) => ModuleState::CodeGen(unit),
            ModuleState::LibIfaceLoaded(_) => ModuleState::LibIfaceLoaded(unit),
            ModuleState::LinkedError(failed) => {
                ModuleState::LinkedError(Failed::new(unit, failed.errors.clone()))
            }
            ModuleState::Linked(linked) => ModuleState::Linked(Rc::new(LinkedUnit {
                typed: unit,
                entry: linked.entry.clone(),
            })),
            _ => return None,
        })
    }
}

#[derive(Clone, Debug)]
struct CachedDefinitions {
    open: bool,
    core: Rc<CoreProgram>,
    defs: Rc<Definitions>,
}

/// One compilation unit and its progress through the phase lattice.
#[derive(Clone, Debug)]
pub struct Module {
    name: ModuleName,
    state: ModuleState,
    paths: ModulePaths,
    should_open: bool,
    definitions: RefCell<Option<CachedDefinitions>>,
}

impl Module {
    /// Creates a module at [`Phase::Init`].
    pub fn new(name: ModuleName) -> Self {
        Self {
            name,
            state: ModuleState::Init,
            paths: ModulePaths::default(),
            should_open: false,
            definitions: RefCell::new(None),
        }
    }

    /// Sets the backing files.
    pub fn with_paths(mut self, paths: ModulePaths) -> Self {
        self.paths = paths;
        self
    }

    /// Replaces the state.
    pub fn with_state(mut self, state: ModuleState) -> Self {
        self.state = state;
        self
    }

    /// Returns the module name.
    pub fn name(&self) -> &ModuleName {
        &self.name
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    /// Returns the phase-tagged state.
    pub fn state(&self) -> &ModuleState {
        &self.state
    }

    /// Replaces the state in place.
    pub fn set_state(&mut self, state: ModuleState) {
        self.state = state;
    }

    /// Returns the module to [`Phase::Init`], keeping its paths.
    pub fn reset(&mut self) {
        self.state = ModuleState::Init;
    }

    /// Returns the backing files.
    pub fn paths(&self) -> &ModulePaths {
        &self.paths
    }

    /// Returns the source path, if the module has a source.
    pub fn source_path(&self) -> Option<&Path> {
        self.paths.source.as_ref().map(|s| s.path.as_path())
    }

    /// Returns `true` if `path` names this module's source, either by its
    /// canonical path or by its include-relative display path.
    pub fn matches_path(&self, path: &Path) -> bool {
        let path = normalize(path);
        self.source_path().is_some_and(|p| same_path(p, &path))
            || self
                .paths
                .relative_source
                .as_deref()
                .is_some_and(|p| same_path(p, &path))
    }

    /// Returns `true` if private definitions are exposed.
    pub fn should_open(&self) -> bool {
        self.should_open
    }

    /// Marks whether private definitions are exposed.
    pub fn set_should_open(&mut self, open: bool) {
        self.should_open = open;
    }

    /// Returns the diagnostics of an error phase; empty otherwise.
    pub fn errors(&self) -> &[Diagnostic] {
        self.state.errors()
    }

    /// Returns `true` if the module is in an error phase.
    pub fn has_errors(&self) -> bool {
        self.phase().is_error()
    }

    /// Returns the tokens, once scanned.
    pub fn lexemes(&self) -> Option<&[Lexeme]> {
        self.state.loaded().map(|u| u.lexemes.as_slice())
    }

    /// Returns the direct imports, once scanned.
    ///
    /// Typed modules without syntax (leaned or loaded from an interface)
    /// answer from their core program.
    pub fn import_names(&self) -> Option<&[ModuleName]> {
        self.state
            .loaded()
            .map(|u| u.import_names.as_slice())
            .or_else(|| self.state.typed().map(|t| t.core.imports.as_slice()))
    }

    /// Returns the syntax tree, once parsed.
    pub fn program(&self) -> Option<&Program> {
        self.state.parsed().map(|u| &u.program)
    }

    /// Returns the range map, once typed.
    pub fn range_map(&self) -> Option<&RangeMap> {
        self.state.typed().map(|u| &u.range_map)
    }

    /// Returns the core program, once typed.
    pub fn core(&self) -> Option<&Rc<CoreProgram>> {
        self.state.typed().map(|u| &u.core)
    }

    /// Returns the inline definitions, once typed.
    pub fn inlines(&self) -> Option<&Inlines> {
        self.state.typed().map(|u| &u.inlines)
    }

    /// Returns the typed payload, once typed.
    pub fn typed_unit(&self) -> Option<&Rc<TypedUnit>> {
        self.state.typed()
    }

    /// Returns the entry point of a linked main module.
    pub fn entry(&self) -> Option<&Entry> {
        match &self.state {
            ModuleState::Linked(linked) => linked.entry.as_ref(),
            _ => None,
        }
    }

    /// Returns the symbol tables of this module, once typed.
    ///
    /// The result is cached and reused while both the core program and the
    /// `should_open` flag are unchanged.
    pub fn definitions(&self) -> Option<Rc<Definitions>> {
        let core = self.core()?;
        let mut cache = self.definitions.borrow_mut();
        if let Some(cached) = cache.as_ref() {
            if cached.open == self.should_open && Rc::ptr_eq(&cached.core, core) {
                return Some(cached.defs.clone());
            }
        }
        let defs = Rc::new(Definitions::extract(core, self.should_open));
        *cache = Some(CachedDefinitions {
            open: self.should_open,
            core: core.clone(),
            defs: defs.clone(),
        });
        Some(defs)
    }

    /// Returns `true` if `other` is this very record: same name, phase,
    /// paths, and identical artifact payloads.
    pub fn same_artifacts(&self, other: &Module) -> bool {
        self.name == other.name
            && self.paths == other.paths
            && self.state.same_payload(&other.state)
    }

    /// Drops tokens and syntax from a typed module. Returns `true` if anything was dropped.
    pub fn lean(&mut self) -> bool {
        let Some(typed) = self.state.typed() else {
            return false;
        };
        if typed.parsed.is_none() {
            return false;
        }
        let lean = Rc::new(TypedUnit {
            parsed: None,
            range_map: typed.range_map.clone(),
            core: typed.core.clone(),
            inlines: typed.inlines.clone(),
        });
        self.replace_typed_unit(lean)
    }

    /// Replaces the typed payload, keeping the phase. Returns `false` if the
    /// module has no typed artifacts.
    pub fn replace_typed_unit(&mut self, unit: Rc<TypedUnit>) -> bool {
        match self.state.with_typed_unit(unit) {
            Some(state) => {
                self.state = state;
                true
            }
            None => false,
        }
    }
}

/// Merges two records of one module, keeping the one further along.
///
/// Ties go to `left`, so a merge never regresses the phase of either side.
pub fn merge_modules(left: Module, right: Module) -> Module {
    if right.phase() > left.phase() {
        right
    } else {
        left
    }
}
