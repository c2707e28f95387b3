use crate::aigen_core::resolver::target_field;
use crate::dom::markup::*;
use crate::dom::{Dom, NodeId, Selector};
use crate::model::{parse_context_fields, WidgetConfig};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting,
    Succeeded,
    Failed,
}

/// Elements one widget works with. Presentation parts are optional.
#[derive(Clone, Debug, PartialEq)]
pub struct WidgetParts {
    pub trigger: NodeId,
    pub container: NodeId,
    pub target: NodeId,
    pub label: Option<NodeId>,
    pub loading: Option<NodeId>,
    pub status: Option<NodeId>,
    pub custom_prompt: Option<NodeId>,
}

pub struct Widget {
    pub config: WidgetConfig,
    pub parts: WidgetParts,
    pub phase: Phase,
}

/// Bound generate triggers, keyed by trigger element.
#[derive(Default)]
pub struct WidgetRegistry {
    widgets: BTreeMap<NodeId, Widget>,
}

impl WidgetRegistry {
    /// Bind every not-yet-bound trigger inside `root` (the whole document when `None`).
    /// Safe to call repeatedly and on overlapping subtrees. Returns how many were bound.
    pub fn register<D: Dom + ?Sized>(&mut self, doc: &mut D, root: Option<NodeId>) -> usize {
        let scope = root.unwrap_or_else(|| doc.root());
        let sel = Selector::Class(TRIGGER_CLASS);
        let mut found = Vec::new();
        if doc.matches(scope, &sel) {
            found.push(scope);
        }
        found.extend(doc.query_all(scope, &sel));

        let mut bound = 0;
        for trigger in found {
            if self.widgets.contains_key(&trigger) {
                continue;
            }
            let Some(parts) = widget_parts(doc, trigger) else {
                tracing::warn!("generate trigger {trigger:?} has no widget container or target field");
                continue;
            };
            let config = widget_config(doc, trigger);
            doc.set_attr(trigger, DATA_INITIALIZED, "true");
            tracing::debug!(
                "bound widget {trigger:?} prompt='{}' context={:?}",
                config.prompt_type,
                config.context_fields
            );
            self.widgets.insert(
                trigger,
                Widget {
                    config,
                    parts,
                    phase: Phase::Idle,
                },
            );
            bound += 1;
        }
        bound
    }

    /// Forget widgets whose trigger has left the document. Returns their parts so
    /// the caller can release anything keyed on them.
    pub fn prune<D: Dom + ?Sized>(&mut self, doc: &D) -> Vec<WidgetParts> {
        let gone: Vec<NodeId> = self
            .widgets
            .keys()
            .copied()
            .filter(|t| !doc.is_connected(*t))
            .collect();
        gone.into_iter()
            .filter_map(|t| self.widgets.remove(&t))
            .map(|w| w.parts)
            .collect()
    }

    pub fn get(&self, trigger: NodeId) -> Option<&Widget> {
        self.widgets.get(&trigger)
    }

    pub fn get_mut(&mut self, trigger: NodeId) -> Option<&mut Widget> {
        self.widgets.get_mut(&trigger)
    }

    #[cfg(test)]
    pub fn is_bound(&self, trigger: NodeId) -> bool {
        self.widgets.contains_key(&trigger)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn triggers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.widgets.keys().copied()
    }
}

pub fn widget_config<D: Dom + ?Sized>(doc: &D, trigger: NodeId) -> WidgetConfig {
    let attr = |k: &str| doc.attr(trigger, k).filter(|v| !v.is_empty());
    WidgetConfig {
        prompt_type: attr(DATA_PROMPT).unwrap_or_default(),
        context_fields: parse_context_fields(&attr(DATA_CONTEXT_FIELDS).unwrap_or_default()),
        field_label: attr(DATA_FIELD_LABEL),
        help_text: attr(DATA_HELP_TEXT),
        max_length: attr(DATA_MAX_LENGTH).and_then(|m| m.trim().parse().ok()),
        field_type: attr(DATA_FIELD_TYPE),
    }
}

fn widget_parts<D: Dom + ?Sized>(doc: &D, trigger: NodeId) -> Option<WidgetParts> {
    let container = doc.closest(trigger, &Selector::Class(CONTAINER_CLASS))?;
    let target = target_field(doc, container)?;
    Some(WidgetParts {
        trigger,
        container,
        target,
        label: doc.query(trigger, &Selector::Class(LABEL_CLASS)),
        loading: doc.query(trigger, &Selector::Class(LOADING_CLASS)),
        status: doc.query(container, &Selector::Class(STATUS_CLASS)),
        custom_prompt: doc.query(container, &Selector::Class(CUSTOM_PROMPT_CLASS)),
    })
}
