//! Artifacts attached to modules as they advance through the phases.

use crate::definitions::Definitions;
use crate::types::Type;
use kiln_common::{ModuleName, QualifiedName};
use kiln_source::{Pos, SourceRange};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

/// One scanned token.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Lexeme {
    /// The token text.
    pub text: String,
    /// Where the token occurs.
    pub range: SourceRange,
}

/// A top-level declaration as written in the source.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SyntaxDecl {
    /// Declared name.
    pub name: String,
    /// Whether the declaration is marked `pub`.
    pub public: bool,
    /// Where the name occurs.
    pub range: SourceRange,
}

/// An import declaration.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Import {
    /// The imported module.
    pub module: ModuleName,
    /// Whether the import is `open` (brings private names into scope).
    pub open: bool,
}

/// A parsed syntax tree, reduced to its top-level structure.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Program {
    /// Import declarations, in source order.
    pub imports: Vec<Import>,
    /// Top-level declarations, in source order.
    pub decls: Vec<SyntaxDecl>,
}

/// One entry of a range map: a source range and the name it refers to.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RangeEntry {
    /// The range of the occurrence.
    pub range: SourceRange,
    /// The name the occurrence resolves to.
    pub name: QualifiedName,
    /// The type at the occurrence, if known.
    pub ty: Option<Type>,
}

/// Maps source ranges of a typed module to resolved names and types.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct RangeMap {
    entries: Vec<RangeEntry>,
}

impl RangeMap {
    /// Creates a range map from entries.
    pub fn new(mut entries: Vec<RangeEntry>) -> Self {
        entries.sort_by(|a, b| a.range.start.cmp(&b.range.start));
        Self { entries }
    }

    /// Returns all entries sorted by start position.
    pub fn entries(&self) -> &[RangeEntry] {
        &self.entries
    }

    /// Returns the innermost entry containing `pos`.
    pub fn at(&self, pos: Pos) -> Option<&RangeEntry> {
        self.entries
            .iter()
            .filter(|e| e.range.start <= pos && pos < e.range.end)
            .max_by_key(|e| e.range.start)
    }
}

/// A function body the optimizer may inline across modules.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct InlineDef {
    /// The inlinable function.
    pub name: QualifiedName,
    /// Size estimate used by the inliner.
    pub cost: u32,
}

/// Resolves inline definitions from a precompiled interface once the
/// whole-program symbol table is known.
pub type InlineExtractor = Rc<dyn Fn(&Definitions) -> Result<Vec<InlineDef>, String>>;

/// Inline definitions of a typed module.
#[derive(Clone)]
pub enum Inlines {
    /// Loaded from an interface; needs a symbol table to resolve.
    Pending(InlineExtractor),
    /// Ready for the optimizer.
    Resolved(Vec<InlineDef>),
}

impl Inlines {
    /// No inline definitions.
    pub fn none() -> Self {
        Inlines::Resolved(Vec::new())
    }

    /// Returns `true` while resolution is still pending.
    pub fn is_pending(&self) -> bool {
        matches!(self, Inlines::Pending(_))
    }

    /// Resolves pending definitions against `defs`; resolved lists are returned as is.
    pub fn resolve(&self, defs: &Definitions) -> Result<Vec<InlineDef>, String> {
        match self {
            Inlines::Pending(extract) => extract(defs),
            Inlines::Resolved(list) => Ok(list.clone()),
        }
    }
}

impl fmt::Debug for Inlines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inlines::Pending(_) => f.write_str("Pending(..)"),
            Inlines::Resolved(list) => f.debug_tuple("Resolved").field(list).finish(),
        }
    }
}

/// The action that runs a linked program.
pub type RunAction = Rc<dyn Fn() -> Result<(), String>>;

/// A linked executable and the action that runs it.
#[derive(Clone)]
pub struct Entry {
    /// Path of the produced executable.
    pub exe: PathBuf,
    /// Runs the program to completion.
    pub run: RunAction,
}

impl Entry {
    /// Creates an entry point.
    pub fn new(exe: impl Into<PathBuf>, run: impl Fn() -> Result<(), String> + 'static) -> Self {
        Self {
            exe: exe.into(),
            run: Rc::new(run),
        }
    }

    /// Runs the program.
    pub fn run(&self) -> Result<(), String> {
        (self.run)()
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").field("exe", &self.exe).finish_non_exhaustive()
    }
}
