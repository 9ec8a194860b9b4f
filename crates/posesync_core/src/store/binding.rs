//! Node binding table: the external node bound to each slot.

use crate::node::NodeHandle;

/// One optional node handle per slot, kept at the store's column length.
#[derive(Clone, Default)]
pub struct NodeBindingTable {
    nodes: Vec<Option<NodeHandle>>,
}

impl std::fmt::Debug for NodeBindingTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeBindingTable")
            .field("len", &self.nodes.len())
            .field("bound", &self.bound_count())
            .finish()
    }
}

impl NodeBindingTable {
    /// Creates an empty table with reserved capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
        }
    }

    /// Number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Checks whether the table has no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of entries holding a node.
    #[must_use]
    pub fn bound_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Extends the table with empty entries up to `len`.
    pub fn grow_to(&mut self, len: usize) {
        if len > self.nodes.len() {
            self.nodes.resize(len, None);
        }
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Binds `node` to slot `i`, replacing any previous binding.
    #[inline]
    pub fn bind(&mut self, i: usize, node: Option<NodeHandle>) {
        self.nodes[i] = node;
    }

    /// Releases the binding of slot `i`.
    #[inline]
    pub fn unbind(&mut self, i: usize) {
        self.nodes[i] = None;
    }

    /// Node bound to slot `i`, if any.
    #[inline]
    #[must_use]
    pub fn get(&self, i: usize) -> Option<&NodeHandle> {
        self.nodes.get(i).and_then(Option::as_ref)
    }

    /// Copies the binding of slot `from` to slot `to`.
    pub fn copy(&mut self, from: usize, to: usize) {
        self.nodes[to] = self.nodes[from].clone();
    }
}
