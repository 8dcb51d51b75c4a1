//! The frozen, evaluated document.

use crate::expr::{BasicType, Expr, Term};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use unicfg_yaml::SourceInfo;

/// Index of a node inside its [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// The evaluated content of one node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Fields in first-definition order.
    Struct(IndexMap<String, NodeId>),
    List(Vec<NodeId>),
    /// A constraint that no fragment made concrete.
    Incomplete(BasicType),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub value: NodeValue,
    /// Positions of every fragment value that unified into this node.
    pub positions: Vec<SourceInfo>,
}

/// Arena of evaluated nodes. Immutable once built.
#[derive(Debug, Clone)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    pub(crate) fn from_term(term: Term) -> Self {
        let mut settler = Settler::default();
        let root = settler.settle(term);
        Self {
            nodes: settler.nodes,
            root,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Panics if `id` was minted by a different tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn field(&self, id: NodeId, label: &str) -> Option<NodeId> {
        match &self.node(id).value {
            NodeValue::Struct(fields) => fields.get(label).copied(),
            _ => None,
        }
    }

    pub fn element(&self, id: NodeId, index: usize) -> Option<NodeId> {
        match &self.node(id).value {
            NodeValue::List(items) => items.get(index).copied(),
            _ => None,
        }
    }
}

/// Builds the arena bottom-up. A shared reference target is settled once;
/// every reference to it gets a node of its own that reuses the target's
/// children.
#[derive(Default)]
struct Settler {
    nodes: Vec<Node>,
    shared: HashMap<*const Term, NodeId>,
    /// Keeps settled targets alive so their addresses stay unique.
    retained: Vec<Arc<Term>>,
}

impl Settler {
    /// Children are pushed before their parent; defaults collapse to their value.
    fn settle(&mut self, term: Term) -> NodeId {
        let Term { expr, mut positions } = term;
        let value = match expr {
            Expr::Null => NodeValue::Null,
            Expr::Bool(b) => NodeValue::Bool(b),
            Expr::Int(i) => NodeValue::Int(i),
            Expr::Float(f) => NodeValue::Float(f),
            Expr::String(s) => NodeValue::String(s),
            Expr::Bytes(b) => NodeValue::Bytes(b),
            Expr::Struct(fields) => NodeValue::Struct(
                fields
                    .into_iter()
                    .map(|(label, field)| (label, self.settle(field)))
                    .collect(),
            ),
            Expr::List(items) => {
                NodeValue::List(items.into_iter().map(|item| self.settle(item)).collect())
            }
            Expr::Type(basic) => NodeValue::Incomplete(basic),
            Expr::Default(inner) => {
                let Term {
                    expr,
                    positions: inner_positions,
                } = *inner;
                merge_positions(&mut positions, inner_positions);
                return self.settle(Term { expr, positions });
            }
            Expr::Shared(target) => {
                let id = self.settle_shared(target);
                let node = self.nodes[id.0].clone();
                let mut merged = node.positions;
                merge_positions(&mut merged, positions);
                positions = merged;
                node.value
            }
            // Evaluation fails before these can be settled.
            Expr::Ref(_) | Expr::Conj(_) | Expr::Bottom => NodeValue::Incomplete(BasicType::Top),
        };
        self.nodes.push(Node { value, positions });
        NodeId(self.nodes.len() - 1)
    }

    fn settle_shared(&mut self, target: Arc<Term>) -> NodeId {
        let key = Arc::as_ptr(&target);
        if let Some(id) = self.shared.get(&key) {
            return *id;
        }
        let id = self.settle(Term::clone(&target));
        self.shared.insert(key, id);
        self.retained.push(target);
        id
    }
}

fn merge_positions(positions: &mut Vec<SourceInfo>, more: Vec<SourceInfo>) {
    for position in more {
        if !positions.contains(&position) {
            positions.push(position);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_struct_and_default() {
        let mut fields = IndexMap::new();
        fields.insert(
            "port".to_string(),
            Term::new(
                Expr::Default(Box::new(Term::new(Expr::Int(80), SourceInfo::default()))),
                SourceInfo::default(),
            ),
        );
        fields.insert(
            "host".to_string(),
            Term::new(Expr::Type(BasicType::String), SourceInfo::default()),
        );
        let tree = Tree::from_term(Term::new(Expr::Struct(fields), SourceInfo::default()));

        let port = tree.field(tree.root(), "port").unwrap();
        assert_eq!(tree.node(port).value, NodeValue::Int(80));
        let host = tree.field(tree.root(), "host").unwrap();
        assert_eq!(tree.node(host).value, NodeValue::Incomplete(BasicType::String));
        assert!(tree.field(tree.root(), "missing").is_none());
        assert_eq!(tree.len(), 3);
    }
}
