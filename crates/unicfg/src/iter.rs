//! Cursor over the children of a struct or list.

use crate::value::{Selector, Value};
use unicfg_eval::{NodeId, NodeValue};

/// Walks the fields of a struct (in definition order) or the elements of a
/// list.
///
/// The cursor starts before the first child; call [`Iter::advance`] before
/// reading. `Iter` is also an [`Iterator`] over `(label, value)` pairs.
#[derive(Debug, Clone)]
pub struct Iter {
    parent: Value,
    cursor: Option<usize>,
}

impl Iter {
    pub(crate) fn new(parent: Value) -> Self {
        Self {
            parent,
            cursor: None,
        }
    }

    fn len(&self) -> usize {
        let Some(id) = self.parent.node_id() else {
            return 0;
        };
        match &self.parent.tree().node(id).value {
            NodeValue::Struct(fields) => fields.len(),
            NodeValue::List(items) => items.len(),
            _ => 0,
        }
    }

    fn current(&self) -> Option<(Selector, NodeId)> {
        let index = self.cursor?;
        let id = self.parent.node_id()?;
        match &self.parent.tree().node(id).value {
            NodeValue::Struct(fields) => fields
                .get_index(index)
                .map(|(label, &child)| (Selector::Field(label.clone()), child)),
            NodeValue::List(items) => {
                items.get(index).map(|&child| (Selector::Index(index), child))
            }
            _ => None,
        }
    }

    /// Move to the next child. Returns `false` once the children are
    /// exhausted, and keeps returning `false` after that.
    pub fn advance(&mut self) -> bool {
        let len = self.len();
        let next = self.cursor.map_or(0, |index| (index + 1).min(len));
        self.cursor = Some(next);
        next < len
    }

    /// The current child, or an undefined value when the cursor is not on one.
    pub fn value(&self) -> Value {
        match self.current() {
            Some((selector, id)) => self.parent.child(id, selector),
            None => self.parent.undefined(),
        }
    }

    /// Field name, or the decimal index for list elements. Empty when the
    /// cursor is not on a child.
    pub fn label(&self) -> String {
        self.current()
            .map(|(selector, _)| selector.to_string())
            .unwrap_or_default()
    }
}

impl Iterator for Iter {
    type Item = (String, Value);

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() {
            Some((self.label(), self.value()))
        } else {
            None
        }
    }
}
