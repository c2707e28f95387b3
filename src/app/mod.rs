use crate::aigen_core::csrf::CsrfProvider;
use crate::aigen_core::registry::{Phase, WidgetParts, WidgetRegistry};
use crate::aigen_core::resolver::FieldResolver;
use crate::aigen_core::status::{StatusKind, StatusPresenter};
use crate::dom::{Dom, NodeId};
use crate::model::{GenerateError, GenerationRequest, GenerationResponse};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const SUCCESS_MESSAGE: &str = "Content generated successfully!";

/// Everything the widget state machines act on.
pub struct Controller<D: Dom> {
    pub doc: D,
    pub registry: WidgetRegistry,
    pub status: StatusPresenter,
    pub resolver: FieldResolver,
    pub csrf: Box<dyn CsrfProvider>,
}

impl<D: Dom> Controller<D> {
    pub fn new(doc: D, csrf: Box<dyn CsrfProvider>, hide_after: Duration) -> Self {
        Self {
            doc,
            registry: WidgetRegistry::default(),
            status: StatusPresenter::new(hide_after),
            resolver: FieldResolver::new(),
            csrf,
        }
    }

    pub fn phase(&self, trigger: NodeId) -> Option<Phase> {
        self.registry.get(trigger).map(|w| w.phase)
    }
}

pub enum AppMsg {
    /// Initial scan (whole document when `root` is `None`), or a programmatic re-scan.
    Register { root: Option<NodeId> },
    /// The host form inserted a repeated row.
    RowAdded { root: NodeId },
    /// The host form detached a repeated row; its widgets are destroyed.
    RowRemoved { root: NodeId },
    /// Operator clicked a generate trigger.
    Activate { trigger: NodeId },
    /// The endpoint call for `trigger` completed.
    Generated {
        trigger: NodeId,
        outcome: Result<GenerationResponse, GenerateError>,
        now: Instant,
    },
    Tick { now: Instant },
}

#[derive(Debug)]
pub enum Effect {
    Generate {
        trigger: NodeId,
        request: GenerationRequest,
        csrf_token: String,
    },
}

pub fn update<D: Dom>(ctl: &mut Controller<D>, msg: AppMsg) -> Vec<Effect> {
    use AppMsg::*;
    let mut effects: Vec<Effect> = Vec::new();
    match msg {
        Register { root } => {
            prune_detached(ctl);
            let n = ctl.registry.register(&mut ctl.doc, root);
            tracing::info!("registered {n} generate widget(s)");
        }
        RowAdded { root } => {
            let n = ctl.registry.register(&mut ctl.doc, Some(root));
            tracing::debug!("row {root:?} added, {n} new widget(s)");
        }
        RowRemoved { root } => {
            let n = prune_detached(ctl);
            tracing::debug!("row {root:?} removed, {n} widget(s) destroyed");
        }
        Activate { trigger } => {
            if let Some(eff) = begin_cycle(ctl, trigger) {
                effects.push(eff);
            }
        }
        Generated {
            trigger,
            outcome,
            now,
        } => finish_cycle(ctl, trigger, outcome, now),
        Tick { now } => {
            ctl.status.tick(&mut ctl.doc, now);
        }
    }
    effects
}

// Widgets whose trigger left the document go, along with their pending status hides.
fn prune_detached<D: Dom>(ctl: &mut Controller<D>) -> usize {
    let gone = ctl.registry.prune(&ctl.doc);
    for parts in &gone {
        ctl.status.forget(parts.status);
    }
    gone.len()
}

// Idle -> Submitting: lock the trigger, gather context, emit the one request.
fn begin_cycle<D: Dom>(ctl: &mut Controller<D>, trigger: NodeId) -> Option<Effect> {
    let Controller {
        doc,
        registry,
        status,
        resolver,
        csrf,
    } = ctl;
    let Some(w) = registry.get_mut(trigger) else {
        tracing::debug!("activation of unbound trigger {trigger:?}");
        return None;
    };
    // Advisory guard: a disabled button does not fire
    if doc.is_disabled(trigger) {
        return None;
    }
    let parts = &w.parts;
    doc.set_disabled(parts.trigger, true);
    if let Some(label) = parts.label {
        doc.set_visible(label, false);
    }
    if let Some(loading) = parts.loading {
        doc.set_visible(loading, true);
    }
    status.hide(&mut *doc, parts.status);
    w.phase = Phase::Submitting;

    let mut context = BTreeMap::new();
    for name in &w.config.context_fields {
        let value = resolver
            .resolve(&*doc, name, parts.container)
            .and_then(|n| doc.value(n));
        if let Some(v) = value {
            context.insert(name.clone(), v);
        }
    }
    let field_name = doc.attr(parts.target, "name").unwrap_or_default();
    let custom_prompt = parts.custom_prompt.and_then(|n| doc.value(n));
    let request =
        GenerationRequest::new(&w.config, context, field_name).with_custom_prompt(custom_prompt);
    let csrf_token = csrf.token(&*doc);
    tracing::info!(
        "generate '{}' for '{}' ({} context field(s))",
        request.prompt_type,
        request.field_name,
        request.context.len()
    );
    Some(Effect::Generate {
        trigger,
        request,
        csrf_token,
    })
}

/// Restores the idle presentation when dropped, so it runs exactly once per cycle
/// whichever branch finished it, including a panicking one.
struct Cycle<'a, D: Dom> {
    doc: &'a mut D,
    parts: &'a WidgetParts,
    phase: &'a mut Phase,
}

impl<D: Dom> Drop for Cycle<'_, D> {
    fn drop(&mut self) {
        self.doc.set_disabled(self.parts.trigger, false);
        if let Some(label) = self.parts.label {
            self.doc.set_visible(label, true);
        }
        if let Some(loading) = self.parts.loading {
            self.doc.set_visible(loading, false);
        }
        *self.phase = Phase::Idle;
    }
}

// Submitting -> Succeeded | Failed -> Idle
fn finish_cycle<D: Dom>(
    ctl: &mut Controller<D>,
    trigger: NodeId,
    outcome: Result<GenerationResponse, GenerateError>,
    now: Instant,
) {
    let Controller {
        doc,
        registry,
        status,
        ..
    } = ctl;
    let Some(w) = registry.get_mut(trigger) else {
        tracing::warn!("response for unknown widget {trigger:?} dropped");
        return;
    };
    let parts = &w.parts;
    let mut cycle = Cycle {
        doc: &mut *doc,
        parts,
        phase: &mut w.phase,
    };
    match outcome.and_then(GenerationResponse::into_content) {
        Ok(content) => {
            *cycle.phase = Phase::Succeeded;
            cycle.doc.set_value(parts.target, &content);
            cycle.doc.dispatch_change(parts.target);
            status.show(
                &mut *cycle.doc,
                parts.status,
                SUCCESS_MESSAGE,
                StatusKind::Success,
                now,
            );
            tracing::info!("generated {} chars for {trigger:?}", content.chars().count());
        }
        Err(e) => {
            *cycle.phase = Phase::Failed;
            let message = match &e {
                GenerateError::Rejected(msg) => msg.clone(),
                GenerateError::Transport(msg) => format!("Request failed: {msg}"),
            };
            status.show(
                &mut *cycle.doc,
                parts.status,
                &message,
                StatusKind::Error,
                now,
            );
            tracing::warn!("generation for {trigger:?} failed: {message}");
        }
    }
}

#[cfg(test)]
mod tests;
