//! The core intermediate representation produced by type checking.
//!
//! Only the declaration-level view is modelled: what a module defines and
//! with which types. Symbol tables are extracted from it, so it carries
//! everything the tables need and nothing about function bodies.

use crate::types::Type;
use kiln_common::ModuleName;
use kiln_source::SourceRange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether a declaration is exported.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Visibility {
    /// Visible to importing modules.
    Public,
    /// Visible only inside the defining module, unless the module is opened.
    Private,
}

impl Visibility {
    /// Returns `true` for [`Visibility::Public`].
    pub fn is_public(self) -> bool {
        self == Visibility::Public
    }
}

/// A kind, e.g. `V` for value types or `E` for effect rows.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Kind(pub String);

impl Kind {
    /// The kind of value types.
    pub fn value() -> Kind {
        Kind("V".to_string())
    }

    /// The kind of effect constants.
    pub fn effect() -> Kind {
        Kind("X".to_string())
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of value a definition binds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ValueSort {
    /// A top-level value.
    Value,
    /// A function.
    Function,
    /// A data constructor.
    Constructor,
}

/// A top-level value or function definition.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CoreValue {
    /// Local name.
    pub name: String,
    /// Export status.
    pub visibility: Visibility,
    /// Value or function.
    pub sort: ValueSort,
    /// Inferred type scheme.
    pub ty: Type,
    /// Where the definition's name appears.
    pub range: Option<SourceRange>,
}

/// A data constructor of an algebraic type.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CoreConstructor {
    /// Local name.
    pub name: String,
    /// Export status.
    pub visibility: Visibility,
    /// Constructor function type.
    pub ty: Type,
}

/// An algebraic type (or effect) declaration.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CoreDataType {
    /// Local name.
    pub name: String,
    /// Export status.
    pub visibility: Visibility,
    /// Kind signature.
    pub kind: Kind,
    /// Data constructors, in declaration order.
    pub constructors: Vec<CoreConstructor>,
}

/// A type synonym declaration.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CoreSynonym {
    /// Local name.
    pub name: String,
    /// Export status.
    pub visibility: Visibility,
    /// Kind signature.
    pub kind: Kind,
    /// The type the synonym expands to.
    pub rhs: Type,
}

/// Associativity of an operator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Assoc {
    /// Left associative.
    Left,
    /// Right associative.
    Right,
    /// Not associative.
    None,
}

/// An operator fixity declaration.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct Fixity {
    /// Associativity.
    pub assoc: Assoc,
    /// Binding strength, higher binds tighter.
    pub precedence: u8,
}

/// An operator with its fixity.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CoreFixity {
    /// The operator, e.g. `+`.
    pub op: String,
    /// Its fixity.
    pub fixity: Fixity,
}

/// Which parameters of a function are borrowed rather than owned.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CoreBorrow {
    /// Local function name.
    pub name: String,
    /// One flag per parameter; `true` means borrowed.
    pub params: Vec<bool>,
}

/// The declaration-level core program of one module.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CoreProgram {
    /// The module this program belongs to.
    pub module: ModuleName,
    /// Direct imports after resolution.
    pub imports: Vec<ModuleName>,
    /// Values and functions.
    pub values: Vec<CoreValue>,
    /// Algebraic types and effects.
    pub data_types: Vec<CoreDataType>,
    /// Type synonyms.
    pub synonyms: Vec<CoreSynonym>,
    /// Operator fixities.
    pub fixities: Vec<CoreFixity>,
    /// Borrowing facts for functions.
    pub borrows: Vec<CoreBorrow>,
}

impl CoreProgram {
    /// Creates an empty program for `module`.
    pub fn new(module: ModuleName) -> Self {
        Self {
            module,
            imports: Vec::new(),
            values: Vec::new(),
            data_types: Vec::new(),
            synonyms: Vec::new(),
            fixities: Vec::new(),
            borrows: Vec::new(),
        }
    }

    /// Adds a value or function definition.
    pub fn with_value(
        mut self,
        name: impl Into<String>,
        visibility: Visibility,
        sort: ValueSort,
        ty: Type,
    ) -> Self {
        self.values.push(CoreValue {
            name: name.into(),
            visibility,
            sort,
            ty,
            range: None,
        });
        self
    }

    /// Returns the definition of a local value, if present.
    pub fn value(&self, name: &str) -> Option<&CoreValue> {
        self.values.iter().find(|v| v.name == name)
    }
}
