//! Type terms attached to typed artifacts, with effect-row helpers.
//!
//! The build core never infers types; it only reads the schemes produced
//! by the type checker: to report the type of an interactive expression and
//! to find which effects that expression still needs handled.

use kiln_common::{ModuleName, QualifiedName};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Well-known type constructor names.
pub mod names {
    /// Extends an effect row with one label: `effect-extend<label, rest>`.
    pub const EFFECT_EXTEND: &str = "std/core/types/effect-extend";
    /// The empty (total) effect row.
    pub const EFFECT_EMPTY: &str = "std/core/types/total";
    /// Marks a user-handled effect label.
    pub const HANDLED: &str = "std/core/types/handled";
    /// Marks a user-handled linear effect label.
    pub const HANDLED1: &str = "std/core/types/handled1";
    /// Marker label of named effect instances; those are supplied by the
    /// caller and never get a default handler.
    pub const NAMED_MARKER: &str = "std/core/types/nmd";
    /// The unit type.
    pub const UNIT: &str = "std/core/types/unit";
    /// The void type.
    pub const VOID: &str = "std/core/types/void";
    /// Arbitrary precision integers.
    pub const INT: &str = "std/core/types/int";
    /// Booleans.
    pub const BOOL: &str = "std/core/types/bool";
    /// Strings.
    pub const STRING: &str = "std/core/types/string";
}

/// A type term.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Type {
    /// A type variable.
    Var(String),
    /// A type constructor.
    Con(QualifiedName),
    /// A constructor applied to arguments.
    App(Box<Type>, Vec<Type>),
    /// A function type with its effect row.
    Fun {
        /// Parameter types.
        params: Vec<Type>,
        /// The effect row of the body.
        effect: Box<Type>,
        /// The result type.
        result: Box<Type>,
    },
    /// A quantified type scheme.
    Forall(Vec<String>, Box<Type>),
}

impl Type {
    /// A type constructor from its qualified textual form.
    pub fn con(name: &str) -> Type {
        let qname = QualifiedName::parse(name)
            .unwrap_or_else(|| QualifiedName::new(ModuleName::new(""), name));
        Type::Con(qname)
    }

    /// A type variable.
    pub fn var(name: impl Into<String>) -> Type {
        Type::Var(name.into())
    }

    /// Applies a constructor to arguments.
    pub fn app(head: Type, args: Vec<Type>) -> Type {
        Type::App(Box::new(head), args)
    }

    /// A function type.
    pub fn fun(params: Vec<Type>, effect: Type, result: Type) -> Type {
        Type::Fun {
            params,
            effect: Box::new(effect),
            result: Box::new(result),
        }
    }

    /// Quantifies `body` over `vars`; no quantifier is added when `vars` is empty.
    pub fn forall(vars: Vec<String>, body: Type) -> Type {
        if vars.is_empty() {
            body
        } else {
            Type::Forall(vars, Box::new(body))
        }
    }

    /// The unit type.
    pub fn unit() -> Type {
        Type::con(names::UNIT)
    }

    /// The empty effect row.
    pub fn total() -> Type {
        Type::con(names::EFFECT_EMPTY)
    }

    /// Wraps an effect constructor as a handled label.
    pub fn handled(effect: &str) -> Type {
        Type::app(Type::con(names::HANDLED), vec![Type::con(effect)])
    }

    /// Builds an effect row from labels and an optional open tail.
    pub fn effect_row(labels: Vec<Type>, tail: Option<Type>) -> Type {
        labels
            .into_iter()
            .rev()
            .fold(tail.unwrap_or_else(Type::total), |rest, label| {
                Type::app(Type::con(names::EFFECT_EXTEND), vec![label, rest])
            })
    }

    /// Returns the name of the outermost constructor, looking through applications.
    pub fn head_name(&self) -> Option<&QualifiedName> {
        match self {
            Type::Con(name) => Some(name),
            Type::App(head, _) => head.head_name(),
            _ => None,
        }
    }

    /// Returns `true` if the outermost constructor is named `name`.
    pub fn is_con(&self, name: &str) -> bool {
        self.head_name().is_some_and(|q| q.to_string() == name)
    }

    /// Returns `true` for `unit` and `void`.
    pub fn is_unit(&self) -> bool {
        matches!(self, Type::Con(_)) && (self.is_con(names::UNIT) || self.is_con(names::VOID))
    }

    /// Returns `true` for function types, quantified or not.
    pub fn is_function(&self) -> bool {
        matches!(self.instantiate(), Type::Fun { .. })
    }

    /// Strips outer quantifiers.
    pub fn instantiate(&self) -> &Type {
        match self {
            Type::Forall(_, body) => body.instantiate(),
            other => other,
        }
    }

    /// Splits a function scheme into its parameters, effect and result.
    pub fn as_function(&self) -> Option<(&[Type], &Type, &Type)> {
        match self.instantiate() {
            Type::Fun {
                params,
                effect,
                result,
            } => Some((params, effect, result)),
            _ => None,
        }
    }

    /// Splits an effect row into its labels and its tail.
    ///
    /// The tail is `None` for a closed row.
    pub fn row_labels(&self) -> (Vec<&Type>, Option<&Type>) {
        let mut labels = Vec::new();
        let mut current = self;
        loop {
            match current {
                Type::App(head, args) if head.is_con(names::EFFECT_EXTEND) && args.len() == 2 => {
                    labels.push(&args[0]);
                    current = &args[1];
                }
                Type::Con(_) if current.is_con(names::EFFECT_EMPTY) => return (labels, None),
                tail => return (labels, Some(tail)),
            }
        }
    }

    fn is_row(&self) -> bool {
        self.is_con(names::EFFECT_EXTEND) || self.is_con(names::EFFECT_EMPTY)
    }
}

/// Returns the user-handled labels of an effect row, in row order.
///
/// Built-in effects that the runtime provides (console, divergence, ...) are
/// not wrapped as handled and are skipped, as is the named-effect marker.
pub fn handled_labels(effect: &Type) -> Vec<Type> {
    let (labels, _) = effect.row_labels();
    labels
        .into_iter()
        .filter_map(|label| match label {
            Type::App(head, args)
                if (head.is_con(names::HANDLED) || head.is_con(names::HANDLED1))
                    && args.len() == 1 =>
            {
                Some(&args[0])
            }
            _ => None,
        })
        .filter(|label| !label.is_con(names::NAMED_MARKER))
        .cloned()
        .collect()
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Var(name) => f.write_str(name),
            Type::Con(_) if self.is_con(names::UNIT) => f.write_str("()"),
            Type::Con(_) if self.is_con(names::EFFECT_EMPTY) => f.write_str("<>"),
            Type::Con(name) => f.write_str(&name.name),
            Type::App(head, _) if head.is_con(names::EFFECT_EXTEND) => {
                let (labels, tail) = self.row_labels();
                let labels: Vec<String> = labels.iter().map(|l| l.to_string()).collect();
                write!(f, "<{}", labels.join(","))?;
                if let Some(tail) = tail {
                    write!(f, "|{tail}")?;
                }
                f.write_str(">")
            }
            Type::App(head, args)
                if (head.is_con(names::HANDLED) || head.is_con(names::HANDLED1))
                    && args.len() == 1 =>
            {
                write!(f, "{}", args[0])
            }
            Type::App(head, args) => {
                let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{head}<{}>", args.join(","))
            }
            Type::Fun {
                params,
                effect,
                result,
            } => {
                let params: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) -> ", params.join(", "))?;
                if !effect.is_con(names::EFFECT_EMPTY) {
                    if effect.is_row() {
                        write!(f, "{effect} ")?;
                    } else {
                        write!(f, "<|{effect}> ")?;
                    }
                }
                write!(f, "{result}")
            }
            Type::Forall(vars, body) => write!(f, "forall<{}> {body}", vars.join(",")),
        }
    }
}
