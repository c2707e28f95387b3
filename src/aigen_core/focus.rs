use crate::dom::NodeId;

/// Which focusable control of the page is selected.
#[derive(Clone, Copy, Debug, Default)]
pub struct FocusState {
    pub index: usize,
}

impl FocusState {
    pub fn next(&mut self, len: usize) {
        if len > 0 {
            self.index = (self.index + 1) % len;
        }
    }
    pub fn prev(&mut self, len: usize) {
        if len > 0 {
            self.index = (self.index + len - 1) % len;
        }
    }
    pub fn current(&self, items: &[NodeId]) -> Option<NodeId> {
        items.get(self.index.min(items.len().saturating_sub(1))).copied()
    }
    /// Keep the same node selected after the list changed (rows added or removed).
    pub fn follow(&mut self, items: &[NodeId], node: Option<NodeId>) {
        match node.and_then(|n| items.iter().position(|i| *i == n)) {
            Some(pos) => self.index = pos,
            None => self.index = self.index.min(items.len().saturating_sub(1)),
        }
    }
}
