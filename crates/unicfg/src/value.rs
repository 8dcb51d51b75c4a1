//! Read access to an evaluated document.

use crate::decode::{self, DecodeContext, DecodeTarget};
use crate::error::ConfigError;
use crate::iter::Iter;
use crate::marshal;
use std::fmt;
use std::sync::Arc;
use unicfg_eval::{Node, NodeId, NodeValue, Tree};

/// Kind of a value as seen by callers.
///
/// Constraints that never became concrete (`port: !int` with no fragment
/// supplying a port) report [`Kind::Undefined`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Undefined,
    Null,
    Bool,
    String,
    Bytes,
    Struct,
    List,
    /// Integer number.
    Number,
    /// Floating-point number.
    Decimal,
}

impl Kind {
    pub fn name(self) -> &'static str {
        match self {
            Kind::Undefined => "undefined",
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::Struct => "struct",
            Kind::List => "list",
            Kind::Number => "int",
            Kind::Decimal => "float",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of the path from the document root to a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    Field(String),
    Index(usize),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Field(label) => f.write_str(label),
            Selector::Index(index) => write!(f, "{}", index),
        }
    }
}

/// A value converted to its natural representation.
///
/// Containers are handed back as iterators so callers can walk them lazily.
#[derive(Debug)]
pub enum Interface {
    Null,
    Bool(bool),
    String(String),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
    Struct(Iter),
    List(Iter),
}

/// A node of an evaluated document, or an undefined value.
///
/// Values are cheap to clone; every value derived from a load shares the
/// same immutable document.
#[derive(Debug, Clone)]
pub struct Value {
    tree: Arc<Tree>,
    node: Option<NodeId>,
    path: Vec<Selector>,
}

impl Value {
    pub(crate) fn root(tree: Arc<Tree>) -> Self {
        let node = Some(tree.root());
        Self {
            tree,
            node,
            path: Vec::new(),
        }
    }

    pub(crate) fn child(&self, id: NodeId, selector: Selector) -> Self {
        let mut path = self.path.clone();
        path.push(selector);
        Self {
            tree: Arc::clone(&self.tree),
            node: Some(id),
            path,
        }
    }

    pub(crate) fn undefined(&self) -> Self {
        Self {
            tree: Arc::clone(&self.tree),
            node: None,
            path: self.path.clone(),
        }
    }

    pub(crate) fn tree(&self) -> &Tree {
        &self.tree
    }

    pub(crate) fn node_id(&self) -> Option<NodeId> {
        self.node
    }

    fn node(&self) -> Option<&Node> {
        self.node.map(|id| self.tree.node(id))
    }

    /// Path from the document root.
    pub fn selectors(&self) -> &[Selector] {
        &self.path
    }

    /// Dotted form of [`Value::selectors`]; empty for the root.
    pub fn path(&self) -> String {
        self.path
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn exists(&self) -> bool {
        self.node.is_some()
    }

    pub fn kind(&self) -> Kind {
        let Some(node) = self.node() else {
            return Kind::Undefined;
        };
        match node.value {
            NodeValue::Null => Kind::Null,
            NodeValue::Bool(_) => Kind::Bool,
            NodeValue::Int(_) => Kind::Number,
            NodeValue::Float(_) => Kind::Decimal,
            NodeValue::String(_) => Kind::String,
            NodeValue::Bytes(_) => Kind::Bytes,
            NodeValue::Struct(_) => Kind::Struct,
            NodeValue::List(_) => Kind::List,
            NodeValue::Incomplete(_) => Kind::Undefined,
        }
    }

    /// Where the value was first defined, as `file:line:col`, or `-`.
    pub fn position(&self) -> String {
        self.node()
            .and_then(|node| node.positions.first())
            .map_or_else(|| "-".to_string(), ToString::to_string)
    }

    /// File the value was first defined in.
    pub fn file(&self) -> Option<&str> {
        self.node()?.positions.first()?.file.as_deref()
    }

    /// Concrete content of the node, or the error for a value that has none.
    fn concrete(&self, expected: &'static str) -> Result<&NodeValue, ConfigError> {
        match self.node().map(|node| &node.value) {
            None => Err(self.mismatch(expected)),
            Some(NodeValue::Incomplete(constraint)) => Err(ConfigError::Incomplete {
                constraint: *constraint,
                position: self.position(),
            }),
            Some(value) => Ok(value),
        }
    }

    pub(crate) fn mismatch(&self, expected: &'static str) -> ConfigError {
        ConfigError::TypeMismatch {
            expected,
            found: self.kind(),
            position: self.position(),
        }
    }

    pub(crate) fn out_of_range(
        &self,
        value: impl fmt::Display,
        target: &'static str,
    ) -> ConfigError {
        ConfigError::OutOfRange {
            value: value.to_string(),
            target,
            position: self.position(),
        }
    }

    pub fn string(&self) -> Result<String, ConfigError> {
        match self.concrete("string")? {
            NodeValue::String(s) => Ok(s.clone()),
            _ => Err(self.mismatch("string")),
        }
    }

    /// Bytes of a `!bytes` value, or the UTF-8 encoding of a string.
    pub fn bytes(&self) -> Result<Vec<u8>, ConfigError> {
        match self.concrete("bytes")? {
            NodeValue::Bytes(b) => Ok(b.clone()),
            NodeValue::String(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(self.mismatch("bytes")),
        }
    }

    pub fn bool(&self) -> Result<bool, ConfigError> {
        match self.concrete("bool")? {
            NodeValue::Bool(b) => Ok(*b),
            _ => Err(self.mismatch("bool")),
        }
    }

    pub fn i64(&self) -> Result<i64, ConfigError> {
        match self.concrete("int")? {
            NodeValue::Int(i) => Ok(*i),
            _ => Err(self.mismatch("int")),
        }
    }

    pub fn u64(&self) -> Result<u64, ConfigError> {
        match self.concrete("uint")? {
            NodeValue::Int(i) => u64::try_from(*i).map_err(|_| self.out_of_range(i, "uint64")),
            _ => Err(self.mismatch("uint")),
        }
    }

    /// Floats as is; integers are widened.
    pub fn f64(&self) -> Result<f64, ConfigError> {
        match self.concrete("float")? {
            NodeValue::Float(f) => Ok(*f),
            NodeValue::Int(i) => Ok(*i as f64),
            _ => Err(self.mismatch("float")),
        }
    }

    pub fn list(&self) -> Result<Iter, ConfigError> {
        match self.concrete("list")? {
            NodeValue::List(_) => Ok(Iter::new(self.clone())),
            _ => Err(self.mismatch("list")),
        }
    }

    /// Iterate the fields of a struct in definition order.
    pub fn fields(&self) -> Result<Iter, ConfigError> {
        match self.concrete("struct")? {
            NodeValue::Struct(_) => Ok(Iter::new(self.clone())),
            _ => Err(self.mismatch("struct")),
        }
    }

    /// Every element of a list as a string.
    ///
    /// The first element that is not a string fails the whole call; the
    /// error names the element's index.
    pub fn string_list(&self) -> Result<Vec<String>, ConfigError> {
        let mut items = self.list()?;
        let mut result = Vec::new();
        while items.advance() {
            let item = items.value().string().map_err(|source| ConfigError::Element {
                label: items.label(),
                source: Box::new(source),
            })?;
            result.push(item);
        }
        Ok(result)
    }

    /// Follow `path` from this value.
    ///
    /// Returns the value and `true` when every step resolved, otherwise an
    /// undefined value and `false`. Use [`Value::try_lookup`] to tell a
    /// missing field from a path that cannot apply.
    pub fn lookup<I, S>(&self, path: I) -> (Value, bool)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        match self.try_lookup(path) {
            Ok(Some(value)) => (value, true),
            _ => (self.undefined(), false),
        }
    }

    /// Follow `path` from this value.
    ///
    /// A missing field or an index past the end is `Ok(None)`. Selecting into
    /// a scalar, or a non-numeric selector on a list, is an error. List
    /// elements are selected by their decimal index.
    pub fn try_lookup<I, S>(&self, path: I) -> Result<Option<Value>, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut current = self.clone();
        for segment in path {
            let segment = segment.as_ref();
            let Some(node) = current.node() else {
                return Ok(None);
            };
            let next = match &node.value {
                NodeValue::Struct(fields) => fields
                    .get(segment)
                    .map(|&id| current.child(id, Selector::Field(segment.to_string()))),
                NodeValue::List(items) => {
                    let index = segment
                        .parse::<usize>()
                        .map_err(|_| current.invalid_selector(segment))?;
                    items
                        .get(index)
                        .map(|&id| current.child(id, Selector::Index(index)))
                }
                NodeValue::Incomplete(constraint) => {
                    return Err(ConfigError::Incomplete {
                        constraint: *constraint,
                        position: current.position(),
                    });
                }
                _ => return Err(current.invalid_selector(segment)),
            };
            match next {
                Some(value) => current = value,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    fn invalid_selector(&self, selector: &str) -> ConfigError {
        ConfigError::InvalidSelector {
            selector: selector.to_string(),
            kind: self.kind(),
            position: self.position(),
        }
    }

    /// The value in its natural representation.
    pub fn interface(&self) -> Result<Interface, ConfigError> {
        match self.kind() {
            Kind::Null => Ok(Interface::Null),
            Kind::Bool => self.bool().map(Interface::Bool),
            Kind::String => self.string().map(Interface::String),
            Kind::Bytes => self.bytes().map(Interface::Bytes),
            Kind::Number => self.i64().map(Interface::Int),
            Kind::Decimal => self.f64().map(Interface::Float),
            Kind::Struct => self.fields().map(Interface::Struct),
            Kind::List => self.list().map(Interface::List),
            kind @ Kind::Undefined => Err(ConfigError::UnsupportedKind {
                kind,
                position: self.position(),
            }),
        }
    }

    /// JSON encoding of the value and everything below it.
    pub fn marshal(&self) -> Result<Vec<u8>, ConfigError> {
        marshal::to_json(self)
    }

    /// Decode into `target`, without a context.
    pub fn decode(&self, target: &mut dyn DecodeTarget) -> Result<(), ConfigError> {
        decode::dispatch(self, None, target)
    }

    /// Decode into `target`; context-aware decoders receive `ctx`, or a
    /// background context when it is `None`.
    pub fn decode_with_context(
        &self,
        ctx: Option<&DecodeContext>,
        target: &mut dyn DecodeTarget,
    ) -> Result<(), ConfigError> {
        decode::dispatch(self, ctx, target)
    }
}
