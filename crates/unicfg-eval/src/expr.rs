//! Intermediate expression tree used while fragments are being unified.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;
use unicfg_yaml::SourceInfo;

/// A type constraint written as a bare tag (`port: !int`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    /// `!any`: unifies with everything.
    Top,
    Bool,
    Int,
    Float,
    /// Either an int or a float.
    Number,
    String,
    Bytes,
}

impl BasicType {
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "any" => BasicType::Top,
            "bool" => BasicType::Bool,
            "int" => BasicType::Int,
            "float" => BasicType::Float,
            "number" => BasicType::Number,
            "string" => BasicType::String,
            "bytes" => BasicType::Bytes,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            BasicType::Top => "_",
            BasicType::Bool => "bool",
            BasicType::Int => "int",
            BasicType::Float => "float",
            BasicType::Number => "number",
            BasicType::String => "string",
            BasicType::Bytes => "bytes",
        }
    }

    /// Whether a concrete value satisfies this constraint.
    pub(crate) fn accepts(self, expr: &Expr) -> bool {
        matches!(
            (self, expr),
            (BasicType::Top, _)
                | (BasicType::Bool, Expr::Bool(_))
                | (BasicType::Int, Expr::Int(_))
                | (BasicType::Float, Expr::Float(_))
                | (BasicType::Number, Expr::Int(_) | Expr::Float(_))
                | (BasicType::String, Expr::String(_))
                | (BasicType::Bytes, Expr::Bytes(_))
        )
    }

    /// The greatest lower bound of two constraints, if any.
    pub(crate) fn meet(self, other: BasicType) -> Option<BasicType> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (BasicType::Top, b) => Some(b),
            (a, BasicType::Top) => Some(a),
            (BasicType::Number, b @ (BasicType::Int | BasicType::Float)) => Some(b),
            (a @ (BasicType::Int | BasicType::Float), BasicType::Number) => Some(a),
            _ => None,
        }
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An expression together with every position that contributed to it.
#[derive(Debug, Clone)]
pub(crate) struct Term {
    pub expr: Expr,
    pub positions: Vec<SourceInfo>,
}

#[derive(Debug, Clone)]
pub(crate) enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Struct(IndexMap<String, Term>),
    List(Vec<Term>),
    Type(BasicType),
    /// Weak value: yields to a concrete value of the same type.
    Default(Box<Term>),
    /// Absolute path written with `!ref`.
    Ref(Vec<String>),
    /// Unification that has to wait until references are resolved.
    Conj(Vec<Term>),
    /// Resolved reference target, shared by every reference to it.
    Shared(Arc<Term>),
    /// Result of a failed unification; the error is already recorded.
    Bottom,
}

impl Term {
    pub fn new(expr: Expr, position: SourceInfo) -> Self {
        Self {
            expr,
            positions: vec![position],
        }
    }

    pub fn empty_struct(position: SourceInfo) -> Self {
        Term::new(Expr::Struct(IndexMap::new()), position)
    }

    pub fn bottom(positions: Vec<SourceInfo>) -> Self {
        Self {
            expr: Expr::Bottom,
            positions,
        }
    }

    /// Append `other`'s positions, skipping duplicates.
    pub fn absorb_positions(&mut self, other: &[SourceInfo]) {
        for position in other {
            if !self.positions.contains(position) {
                self.positions.push(position.clone());
            }
        }
    }

    /// Replace a shared reference target by an owned copy carrying the
    /// positions of both the target and the reference.
    pub fn unshare(self) -> Term {
        let Term { expr, positions } = self;
        match expr {
            Expr::Shared(target) => {
                let mut term = Arc::unwrap_or_clone(target).unshare();
                term.absorb_positions(&positions);
                term
            }
            expr => Term { expr, positions },
        }
    }

    pub fn has_references(&self) -> bool {
        match &self.expr {
            Expr::Ref(_) | Expr::Conj(_) => true,
            Expr::Default(inner) => inner.has_references(),
            _ => false,
        }
    }
}

impl Expr {
    pub fn type_name(&self) -> &'static str {
        match self {
            Expr::Null => "null",
            Expr::Bool(_) => "bool",
            Expr::Int(_) => "int",
            Expr::Float(_) => "float",
            Expr::String(_) => "string",
            Expr::Bytes(_) => "bytes",
            Expr::Struct(_) => "struct",
            Expr::List(_) => "list",
            Expr::Type(t) => t.name(),
            Expr::Default(inner) => inner.expr.type_name(),
            Expr::Ref(_) => "reference",
            Expr::Conj(_) => "conjunction",
            Expr::Shared(target) => target.expr.type_name(),
            Expr::Bottom => "_|_",
        }
    }

    pub fn is_concrete_scalar(&self) -> bool {
        matches!(
            self,
            Expr::Null
                | Expr::Bool(_)
                | Expr::Int(_)
                | Expr::Float(_)
                | Expr::String(_)
                | Expr::Bytes(_)
        )
    }

    /// Equality of concrete scalars; `false` for anything else.
    pub fn scalar_eq(&self, other: &Expr) -> bool {
        match (self, other) {
            (Expr::Null, Expr::Null) => true,
            (Expr::Bool(a), Expr::Bool(b)) => a == b,
            (Expr::Int(a), Expr::Int(b)) => a == b,
            (Expr::Float(a), Expr::Float(b)) => a == b,
            (Expr::String(a), Expr::String(b)) => a == b,
            (Expr::Bytes(a), Expr::Bytes(b)) => a == b,
            _ => false,
        }
    }

    /// Short rendering used in error messages.
    pub fn describe(&self) -> String {
        match self {
            Expr::Null => "null".to_string(),
            Expr::Bool(b) => b.to_string(),
            Expr::Int(i) => i.to_string(),
            Expr::Float(f) => format!("{:?}", f),
            Expr::String(s) => format!("{:?}", s),
            Expr::Bytes(b) => format!("'{}'", String::from_utf8_lossy(b)),
            Expr::Struct(_) => "{...}".to_string(),
            Expr::List(_) => "[...]".to_string(),
            Expr::Type(t) => t.name().to_string(),
            Expr::Default(inner) => format!("*{}", inner.expr.describe()),
            Expr::Ref(path) => path.join("."),
            Expr::Conj(_) => "(...)".to_string(),
            Expr::Shared(target) => target.expr.describe(),
            Expr::Bottom => "_|_".to_string(),
        }
    }
}
