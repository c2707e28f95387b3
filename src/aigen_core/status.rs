use crate::dom::{markup::STATUS_CLASS, Dom, NodeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

pub const DEFAULT_HIDE_AFTER: Duration = Duration::from_millis(5000);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusKind {
    Success,
    Error,
}

impl StatusKind {
    pub fn as_class(&self) -> &'static str {
        match self {
            StatusKind::Success => "success",
            StatusKind::Error => "error",
        }
    }
}

/// Inline feedback next to a widget. Success messages clear themselves after
/// `hide_after`; errors stay until the next `hide`.
pub struct StatusPresenter {
    hide_after: Duration,
    pending: HashMap<NodeId, Instant>,
}

impl Default for StatusPresenter {
    fn default() -> Self {
        Self::new(DEFAULT_HIDE_AFTER)
    }
}

impl StatusPresenter {
    pub fn new(hide_after: Duration) -> Self {
        Self {
            hide_after,
            pending: HashMap::new(),
        }
    }

    pub fn show<D: Dom + ?Sized>(
        &mut self,
        doc: &mut D,
        el: Option<NodeId>,
        message: &str,
        kind: StatusKind,
        now: Instant,
    ) {
        let Some(el) = el else { return };
        doc.set_text(el, message);
        doc.set_class(el, &format!("{STATUS_CLASS} {}", kind.as_class()));
        doc.set_visible(el, true);
        match kind {
            StatusKind::Success => {
                self.pending.insert(el, now + self.hide_after);
            }
            StatusKind::Error => {
                self.pending.remove(&el);
            }
        }
    }

    /// Clear the region and cancel its pending auto-hide.
    pub fn hide<D: Dom + ?Sized>(&mut self, doc: &mut D, el: Option<NodeId>) {
        let Some(el) = el else { return };
        self.pending.remove(&el);
        doc.set_visible(el, false);
        doc.set_text(el, "");
        doc.set_class(el, STATUS_CLASS);
    }

    /// Drop the pending auto-hide of an element that is going away.
    pub fn forget(&mut self, el: Option<NodeId>) {
        if let Some(el) = el {
            self.pending.remove(&el);
        }
    }

    /// Apply every auto-hide that is due at `now`. Returns how many fired.
    pub fn tick<D: Dom + ?Sized>(&mut self, doc: &mut D, now: Instant) -> usize {
        let due: Vec<NodeId> = self
            .pending
            .iter()
            .filter(|(_, at)| now >= **at)
            .map(|(n, _)| *n)
            .collect();
        for el in &due {
            self.hide(doc, Some(*el));
        }
        due.len()
    }

    #[cfg(test)]
    pub fn hide_pending(&self, el: NodeId) -> Option<Instant> {
        self.pending.get(&el).copied()
    }
}
