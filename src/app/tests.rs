use super::*;
use crate::aigen_core::csrf::CookieCsrf;
use crate::aigen_core::status::DEFAULT_HIDE_AFTER;
use crate::dom::markup::{CONTAINER_CLASS, TRIGGER_CLASS};
use crate::dom::{Page, Selector};
use crate::model::PageConfig;
use serde_json::json;
use std::time::Duration;

const PAGE: &str = r#"
cookie: "foo=1; csrftoken=abc123; bar=2"
forms:
  - id: hero_form
    fields:
      - name: title
        value: "Flat title"
      - name: tagline
        value: "Homes built to last"
      - name: heading_main
        value: "Build with us"
      - name: description
        kind: textarea
        ai:
          prompt: hero_description
          context: [tagline, heading_main, company_name]
          allow_custom_prompt: true
    inlines:
      - prefix: items
        rows: 3
        fields:
          - name: title
          - name: description
            kind: textarea
            ai: { prompt: item_description, context: [title] }
"#;

fn controller() -> Controller<Page> {
    let cfg: PageConfig = serde_yaml::from_str(PAGE).unwrap();
    let mut ctl = Controller::new(
        Page::from_config(&cfg),
        Box::new(CookieCsrf::default()),
        DEFAULT_HIDE_AFTER,
    );
    let _ = update(&mut ctl, AppMsg::Register { root: None });
    ctl
}

fn trigger_for<D: Dom>(doc: &D, target_name: &str) -> NodeId {
    let target = doc.query(doc.root(), &Selector::Name(target_name)).unwrap();
    let container = doc.closest(target, &Selector::Class(CONTAINER_CLASS)).unwrap();
    doc.query(container, &Selector::Class(TRIGGER_CLASS)).unwrap()
}

fn response(v: serde_json::Value) -> Result<GenerationResponse, GenerateError> {
    Ok(serde_json::from_value(v).unwrap())
}

fn activate(ctl: &mut Controller<Page>, trigger: NodeId) -> (GenerationRequest, String) {
    let effects = update(ctl, AppMsg::Activate { trigger });
    assert_eq!(effects.len(), 1, "exactly one request per activation");
    match effects.into_iter().next() {
        Some(Effect::Generate {
            trigger: t,
            request,
            csrf_token,
        }) => {
            assert_eq!(t, trigger);
            (request, csrf_token)
        }
        None => unreachable!(),
    }
}

#[test]
fn activation_enters_submitting_before_any_response() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "description");
    let (request, token) = activate(&mut ctl, t);

    assert_eq!(ctl.phase(t), Some(Phase::Submitting));
    assert!(ctl.doc.is_disabled(t));
    let parts = ctl.registry.get(t).unwrap().parts.clone();
    assert!(!ctl.doc.is_visible(parts.label.unwrap()));
    assert!(ctl.doc.is_visible(parts.loading.unwrap()));

    assert_eq!(token, "abc123");
    // company_name is not on the page and is simply left out
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        json!({
            "prompt_type": "hero_description",
            "context": {"tagline": "Homes built to last", "heading_main": "Build with us"},
            "field_name": "description",
            "field_type": "TextField"
        })
    );
}

#[test]
fn success_writes_target_notifies_once_and_auto_hides() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "description");
    activate(&mut ctl, t);
    let t0 = Instant::now();
    let _ = update(
        &mut ctl,
        AppMsg::Generated {
            trigger: t,
            outcome: response(json!({"success": true, "content": "Hello"})),
            now: t0,
        },
    );
    let parts = ctl.registry.get(t).unwrap().parts.clone();
    assert_eq!(ctl.doc.value(parts.target).as_deref(), Some("Hello"));
    assert_eq!(ctl.doc.take_changes(), vec![parts.target]);

    let status = parts.status.unwrap();
    assert!(ctl.doc.is_visible(status));
    assert_eq!(ctl.doc.text(status).as_deref(), Some(SUCCESS_MESSAGE));

    // Back to idle straight away
    assert_eq!(ctl.phase(t), Some(Phase::Idle));
    assert!(!ctl.doc.is_disabled(t));
    assert!(ctl.doc.is_visible(parts.label.unwrap()));
    assert!(!ctl.doc.is_visible(parts.loading.unwrap()));

    let _ = update(
        &mut ctl,
        AppMsg::Tick {
            now: t0 + Duration::from_millis(4999),
        },
    );
    assert!(ctl.doc.is_visible(status));
    let _ = update(
        &mut ctl,
        AppMsg::Tick {
            now: t0 + Duration::from_millis(5000),
        },
    );
    assert!(!ctl.doc.is_visible(status));
}

#[test]
fn rejection_shows_server_error_and_persists() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "description");
    activate(&mut ctl, t);
    let t0 = Instant::now();
    let _ = update(
        &mut ctl,
        AppMsg::Generated {
            trigger: t,
            outcome: response(json!({"success": false, "error": "quota exceeded"})),
            now: t0,
        },
    );
    let parts = ctl.registry.get(t).unwrap().parts.clone();
    let status = parts.status.unwrap();
    assert_eq!(ctl.doc.text(status).as_deref(), Some("quota exceeded"));
    assert_eq!(
        ctl.doc.attr(status, "class").as_deref(),
        Some("ai-status error")
    );
    let _ = update(
        &mut ctl,
        AppMsg::Tick {
            now: t0 + Duration::from_secs(60),
        },
    );
    assert!(ctl.doc.is_visible(status));
    assert!(ctl.doc.take_changes().is_empty());
    assert_eq!(ctl.phase(t), Some(Phase::Idle));
    assert!(!ctl.doc.is_disabled(t));
}

#[test]
fn transport_failure_message_carries_description() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "description");
    activate(&mut ctl, t);
    let _ = update(
        &mut ctl,
        AppMsg::Generated {
            trigger: t,
            outcome: Err(GenerateError::Transport("network down".into())),
            now: Instant::now(),
        },
    );
    let status = ctl.registry.get(t).unwrap().parts.status.unwrap();
    let text = ctl.doc.text(status).unwrap();
    assert!(text.contains("network down"), "{text}");
    assert!(!ctl.doc.is_disabled(t));
}

#[test]
fn second_activation_while_submitting_is_ignored() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "description");
    activate(&mut ctl, t);
    assert!(update(&mut ctl, AppMsg::Activate { trigger: t }).is_empty());
}

#[test]
fn programmatic_reenable_allows_overlap() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "description");
    activate(&mut ctl, t);
    ctl.doc.set_disabled(t, false);
    assert_eq!(update(&mut ctl, AppMsg::Activate { trigger: t }).len(), 1);
}

#[test]
fn new_cycle_clears_status_and_cancels_pending_hide() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "description");
    activate(&mut ctl, t);
    let t0 = Instant::now();
    let _ = update(
        &mut ctl,
        AppMsg::Generated {
            trigger: t,
            outcome: response(json!({"success": true, "content": "one"})),
            now: t0,
        },
    );
    let status = ctl.registry.get(t).unwrap().parts.status.unwrap();
    assert!(ctl.status.hide_pending(status).is_some());
    activate(&mut ctl, t);
    assert!(!ctl.doc.is_visible(status));
    assert!(ctl.status.hide_pending(status).is_none());
}

#[test]
fn custom_prompt_is_forwarded_when_filled() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "description");
    let prompt = ctl.registry.get(t).unwrap().parts.custom_prompt.unwrap();
    ctl.doc.set_value(prompt, "Mention the harbour view");
    let (request, _) = activate(&mut ctl, t);
    assert_eq!(
        request.custom_prompt.as_deref(),
        Some("Mention the harbour view")
    );
}

#[test]
fn row_widget_reads_its_own_row() {
    let mut ctl = controller();
    let row_title = ctl
        .doc
        .query(ctl.doc.root(), &Selector::Name("items-2-title"))
        .unwrap();
    ctl.doc.set_value(row_title, "Row three");
    let t = trigger_for(&ctl.doc, "items-2-description");
    let (request, _) = activate(&mut ctl, t);
    assert_eq!(request.field_name, "items-2-description");
    assert_eq!(request.context.get("title").map(String::as_str), Some("Row three"));
}

#[test]
fn row_added_binds_new_widgets_only() {
    let mut ctl = controller();
    assert_eq!(ctl.registry.len(), 4);
    let row = ctl.doc.add_inline_row("items").unwrap();
    let _ = update(&mut ctl, AppMsg::RowAdded { root: row });
    let _ = update(&mut ctl, AppMsg::RowAdded { root: row });
    assert_eq!(ctl.registry.len(), 5);
    let t = trigger_for(&ctl.doc, "items-3-description");
    assert_eq!(ctl.registry.get(t).unwrap().phase, Phase::Idle);
    // A whole-document rescan finds nothing new to bind
    assert_eq!(ctl.registry.register(&mut ctl.doc, None), 0);
}

#[test]
fn removed_row_destroys_its_widget_and_pending_hide() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "items-1-description");
    activate(&mut ctl, t);
    let now = Instant::now();
    let _ = update(
        &mut ctl,
        AppMsg::Generated {
            trigger: t,
            outcome: response(json!({"success": true, "content": "done"})),
            now,
        },
    );
    let status = ctl.registry.get(t).unwrap().parts.status.unwrap();
    assert!(ctl.status.hide_pending(status).is_some());

    let row = ctl.doc.element_by_id("items-1").unwrap();
    ctl.doc.remove(row);
    let _ = update(&mut ctl, AppMsg::RowRemoved { root: row });
    assert_eq!(ctl.registry.len(), 3);
    assert!(ctl.phase(t).is_none());
    assert!(ctl.status.hide_pending(status).is_none());
    // Nothing to re-bind, and activation of the dead trigger is ignored
    let _ = update(&mut ctl, AppMsg::Register { root: None });
    assert_eq!(ctl.registry.len(), 3);
    assert!(update(&mut ctl, AppMsg::Activate { trigger: t }).is_empty());
}

#[test]
fn rescan_prunes_rows_removed_without_notice() {
    let mut ctl = controller();
    let row = ctl.doc.element_by_id("items-2").unwrap();
    ctl.doc.remove(row);
    assert_eq!(ctl.registry.len(), 4);
    let _ = update(&mut ctl, AppMsg::Register { root: None });
    assert_eq!(ctl.registry.len(), 3);
}

#[test]
fn unbound_trigger_activation_does_nothing() {
    let mut ctl = controller();
    assert!(update(&mut ctl, AppMsg::Activate { trigger: NodeId(0) }).is_empty());
}

#[test]
fn late_response_for_removed_row_is_harmless() {
    let mut ctl = controller();
    let t = trigger_for(&ctl.doc, "items-1-description");
    activate(&mut ctl, t);
    let row = ctl.doc.element_by_id("items-1").unwrap();
    ctl.doc.remove(row);
    let _ = update(
        &mut ctl,
        AppMsg::Generated {
            trigger: t,
            outcome: response(json!({"success": true, "content": "late"})),
            now: Instant::now(),
        },
    );
    assert_eq!(ctl.phase(t), Some(Phase::Idle));
    assert!(ctl.doc.element_by_id("id_items-1-description").is_none());
}

// Document whose field writes blow up, to check the idle restore still runs.
struct ExplodingWrites(Page);

impl Dom for ExplodingWrites {
    fn root(&self) -> NodeId {
        self.0.root()
    }
    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.0.element_by_id(id)
    }
    fn closest(&self, node: NodeId, sel: &Selector) -> Option<NodeId> {
        self.0.closest(node, sel)
    }
    fn query_all(&self, scope: NodeId, sel: &Selector) -> Vec<NodeId> {
        self.0.query_all(scope, sel)
    }
    fn matches(&self, node: NodeId, sel: &Selector) -> bool {
        self.0.matches(node, sel)
    }
    fn is_connected(&self, node: NodeId) -> bool {
        self.0.is_connected(node)
    }
    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        self.0.attr(node, name)
    }
    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        self.0.set_attr(node, name, value)
    }
    fn value(&self, node: NodeId) -> Option<String> {
        self.0.value(node)
    }
    fn set_value(&mut self, _node: NodeId, _value: &str) {
        panic!("write rejected");
    }
    fn text(&self, node: NodeId) -> Option<String> {
        self.0.text(node)
    }
    fn set_text(&mut self, node: NodeId, text: &str) {
        self.0.set_text(node, text)
    }
    fn set_class(&mut self, node: NodeId, class: &str) {
        self.0.set_class(node, class)
    }
    fn is_visible(&self, node: NodeId) -> bool {
        self.0.is_visible(node)
    }
    fn set_visible(&mut self, node: NodeId, visible: bool) {
        self.0.set_visible(node, visible)
    }
    fn is_disabled(&self, node: NodeId) -> bool {
        self.0.is_disabled(node)
    }
    fn set_disabled(&mut self, node: NodeId, disabled: bool) {
        self.0.set_disabled(node, disabled)
    }
    fn dispatch_change(&mut self, node: NodeId) {
        self.0.dispatch_change(node)
    }
    fn cookie(&self) -> String {
        self.0.cookie()
    }
}

#[test]
fn idle_is_restored_even_when_handling_panics() {
    let cfg: PageConfig = serde_yaml::from_str(PAGE).unwrap();
    let mut ctl = Controller::new(
        ExplodingWrites(Page::from_config(&cfg)),
        Box::new(CookieCsrf::default()),
        DEFAULT_HIDE_AFTER,
    );
    let _ = update(&mut ctl, AppMsg::Register { root: None });
    let t = trigger_for(&ctl.doc, "description");
    assert_eq!(update(&mut ctl, AppMsg::Activate { trigger: t }).len(), 1);
    assert!(ctl.doc.is_disabled(t));

    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        update(
            &mut ctl,
            AppMsg::Generated {
                trigger: t,
                outcome: response(json!({"success": true, "content": "x"})),
                now: Instant::now(),
            },
        )
    }));
    assert!(res.is_err());
    assert!(!ctl.doc.is_disabled(t));
    assert_eq!(ctl.phase(t), Some(Phase::Idle));
    let loading = ctl.registry.get(t).unwrap().parts.loading.unwrap();
    assert!(!ctl.doc.is_visible(loading));
}
