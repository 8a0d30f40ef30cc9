//! Composable symbol tables extracted from core programs.
//!
//! A [`Definitions`] bundle holds seven independent tables. Bundles extracted
//! from single modules are folded with [`Definitions::compose`] into the view a
//! set of modules presents to the type checker or to interactive lookups.

use crate::ir::{CoreProgram, Fixity, Kind, ValueSort, Visibility};
use crate::types::Type;
use kiln_common::QualifiedName;
use kiln_source::SourceRange;
use std::collections::BTreeMap;

/// Everything known about one value-level name.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SymbolInfo {
    /// The fully qualified name.
    pub name: QualifiedName,
    /// Value, function, or constructor.
    pub sort: ValueSort,
    /// The type scheme.
    pub ty: Type,
    /// Export status in the defining module.
    pub visibility: Visibility,
    /// Where the name is defined, if known.
    pub range: Option<SourceRange>,
}

/// An algebraic type known to the symbol tables.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct DataInfo {
    /// Kind signature.
    pub kind: Kind,
    /// Constructor names, in declaration order.
    pub constructors: Vec<QualifiedName>,
}

/// A data constructor known to the symbol tables.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ConstructorInfo {
    /// The type the constructor builds.
    pub data_type: QualifiedName,
    /// Constructor function type.
    pub ty: Type,
}

/// The seven symbol tables of one or more modules.
///
/// [`compose`](Self::compose) is left-biased on every table: when both sides
/// define a key, the left entry is kept. Duplicate definitions are rejected
/// by the type checker before tables are composed, so the bias only decides
/// between identical re-exports of one definition.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Definitions {
    /// Values, functions and constructors.
    pub gamma: BTreeMap<QualifiedName, SymbolInfo>,
    /// Kind signatures of type constructors.
    pub kinds: BTreeMap<QualifiedName, Kind>,
    /// Type synonyms and their expansions.
    pub synonyms: BTreeMap<QualifiedName, Type>,
    /// Algebraic types.
    pub data_types: BTreeMap<QualifiedName, DataInfo>,
    /// Data constructors.
    pub constructors: BTreeMap<QualifiedName, ConstructorInfo>,
    /// Operator fixities, keyed by operator.
    pub fixities: BTreeMap<String, Fixity>,
    /// Borrowed-parameter flags of functions.
    pub borrowed: BTreeMap<QualifiedName, Vec<bool>>,
}

impl Definitions {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extracts the tables of one core program.
    ///
    /// Only public declarations are exposed unless `open` is set, in which case
    /// private declarations are exposed as well.
    pub fn extract(core: &CoreProgram, open: bool) -> Definitions {
        let visible = |vis: Visibility| open || vis.is_public();
        let module = &core.module;
        let mut defs = Definitions::new();

        for value in core.values.iter().filter(|v| visible(v.visibility)) {
            let name = module.qualify(&value.name);
            defs.gamma.insert(
                name.clone(),
                SymbolInfo {
                    name,
                    sort: value.sort,
                    ty: value.ty.clone(),
                    visibility: value.visibility,
                    range: value.range.clone(),
                },
            );
        }

        for data in core.data_types.iter().filter(|d| visible(d.visibility)) {
            let type_name = module.qualify(&data.name);
            let mut constructors = Vec::new();
            for con in data.constructors.iter().filter(|c| visible(c.visibility)) {
                let con_name = module.qualify(&con.name);
                constructors.push(con_name.clone());
                defs.constructors.insert(
                    con_name.clone(),
                    ConstructorInfo {
                        data_type: type_name.clone(),
                        ty: con.ty.clone(),
                    },
                );
                defs.gamma.insert(
                    con_name.clone(),
                    SymbolInfo {
                        name: con_name,
                        sort: ValueSort::Constructor,
                        ty: con.ty.clone(),
                        visibility: con.visibility,
                        range: None,
                    },
                );
            }
            defs.kinds.insert(type_name.clone(), data.kind.clone());
            defs.data_types.insert(
                type_name,
                DataInfo {
                    kind: data.kind.clone(),
                    constructors,
                },
            );
        }

        for syn in core.synonyms.iter().filter(|s| visible(s.visibility)) {
            let name = module.qualify(&syn.name);
            defs.kinds.insert(name.clone(), syn.kind.clone());
            defs.synonyms.insert(name, syn.rhs.clone());
        }

        for fix in &core.fixities {
            defs.fixities.insert(fix.op.clone(), fix.fixity);
        }

        for borrow in &core.borrows {
            let name = module.qualify(&borrow.name);
            if defs.gamma.contains_key(&name) {
                defs.borrowed.insert(name, borrow.params.clone());
            }
        }

        defs
    }

    /// Composes two bundles; the left side wins on duplicate keys.
    pub fn compose(mut self, other: Definitions) -> Definitions {
        union_left(&mut self.gamma, other.gamma);
        union_left(&mut self.kinds, other.kinds);
        union_left(&mut self.synonyms, other.synonyms);
        union_left(&mut self.data_types, other.data_types);
        union_left(&mut self.constructors, other.constructors);
        union_left(&mut self.fixities, other.fixities);
        union_left(&mut self.borrowed, other.borrowed);
        self
    }

    /// Folds any number of bundles with [`compose`](Self::compose).
    pub fn compose_all(all: impl IntoIterator<Item = Definitions>) -> Definitions {
        all.into_iter().fold(Definitions::new(), Definitions::compose)
    }

    /// Returns `true` if every table is empty.
    pub fn is_empty(&self) -> bool {
        self.gamma.is_empty()
            && self.kinds.is_empty()
            && self.synonyms.is_empty()
            && self.data_types.is_empty()
            && self.constructors.is_empty()
            && self.fixities.is_empty()
            && self.borrowed.is_empty()
    }

    /// Looks up a fully qualified value name.
    pub fn lookup(&self, name: &QualifiedName) -> Option<&SymbolInfo> {
        self.gamma.get(name)
    }

    /// Returns every value whose local name is `name`, in name order.
    pub fn lookup_unqualified(&self, name: &str) -> Vec<&SymbolInfo> {
        self.gamma.values().filter(|info| info.name.name == name).collect()
    }

    /// Returns the qualified names of all values, in name order.
    pub fn value_names(&self) -> Vec<&QualifiedName> {
        self.gamma.keys().collect()
    }
}

fn union_left<K: Ord, V>(left: &mut BTreeMap<K, V>, right: BTreeMap<K, V>) {
    for (key, value) in right {
        left.entry(key).or_insert(value);
    }
}
