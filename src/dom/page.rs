use super::markup::*;
use super::{Dom, NodeId, Selector, Tag};
use crate::model::{AiSpec, FieldKindSpec, FieldSpec, PageConfig};
use std::collections::{BTreeMap, HashMap};

pub const CSRF_INPUT_NAME: &str = "csrfmiddlewaretoken";
pub const DEFAULT_BUTTON_TEXT: &str = "✨ Generate with AI";
pub const DEFAULT_LOADING_TEXT: &str = "Generating...";

#[derive(Clone, Debug)]
pub struct Element {
    pub tag: Tag,
    pub id: Option<String>,
    pub name: Option<String>,
    pub classes: Vec<String>,
    pub attrs: BTreeMap<String, String>,
    pub value: String,
    pub text: String,
    // Human label for form controls
    pub label: Option<String>,
    pub visible: bool,
    pub disabled: bool,
    pub hidden_input: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Element {
    pub fn new(tag: Tag) -> Self {
        Self {
            tag,
            id: None,
            name: None,
            classes: Vec::new(),
            attrs: BTreeMap::new(),
            value: String::new(),
            text: String::new(),
            label: None,
            visible: true,
            disabled: false,
            hidden_input: false,
            parent: None,
            children: Vec::new(),
        }
    }
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
    pub fn class(mut self, class: &str) -> Self {
        self.classes.push(class.to_string());
        self
    }
    pub fn attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(key.to_string(), value.into());
        self
    }
    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
    pub fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }
    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

struct InlineGroup {
    group: NodeId,
    total_forms: NodeId,
    fields: Vec<FieldSpec>,
}

/// In-memory document built from a page description.
pub struct Page {
    pub title: String,
    nodes: Vec<Element>,
    cookie: String,
    changes: Vec<NodeId>,
    inlines: HashMap<String, InlineGroup>,
}

impl Default for Page {
    fn default() -> Self {
        Self::new("")
    }
}

impl Page {
    pub fn new(cookie: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            nodes: vec![Element::new(Tag::Root)],
            cookie: cookie.into(),
            changes: Vec::new(),
            inlines: HashMap::new(),
        }
    }

    pub fn set_cookie(&mut self, cookie: impl Into<String>) {
        self.cookie = cookie.into();
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0)
    }

    fn el_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(node.0)
    }

    pub fn append(&mut self, parent: NodeId, mut el: Element) -> NodeId {
        let id = NodeId(self.nodes.len());
        el.parent = Some(parent);
        self.nodes.push(el);
        if let Some(p) = self.el_mut(parent) {
            p.children.push(id);
        }
        id
    }

    /// Detach a subtree from the document. Its nodes stay addressable.
    /// An inline row's TOTAL_FORMS counter is left alone, see `add_inline_row`.
    pub fn remove(&mut self, node: NodeId) {
        let parent = self.element(node).and_then(|e| e.parent);
        if let Some(p) = parent.and_then(|p| self.el_mut(p)) {
            p.children.retain(|c| *c != node);
        }
        if let Some(e) = self.el_mut(node) {
            e.parent = None;
        }
    }

    /// Change notifications dispatched since the last call.
    pub fn take_changes(&mut self) -> Vec<NodeId> {
        std::mem::take(&mut self.changes)
    }

    /// Connected elements in document order with their depth below the root.
    pub fn walk(&self) -> Vec<(NodeId, usize)> {
        let mut out = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = self.nodes[0]
            .children
            .iter()
            .rev()
            .map(|c| (*c, 0))
            .collect();
        while let Some((n, depth)) = stack.pop() {
            out.push((n, depth));
            if let Some(e) = self.element(n) {
                for c in e.children.iter().rev() {
                    stack.push((*c, depth + 1));
                }
            }
        }
        out
    }

    /// Controls the operator can move between: visible inputs, textareas and buttons.
    pub fn focusables(&self) -> Vec<NodeId> {
        self.walk()
            .into_iter()
            .filter_map(|(n, _)| {
                let e = self.element(n)?;
                let focusable = match e.tag {
                    Tag::Input => !e.hidden_input,
                    Tag::TextArea | Tag::Button => true,
                    _ => false,
                };
                (focusable && e.visible).then_some(n)
            })
            .collect()
    }

    fn descendants(&self, scope: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.element(scope) {
            Some(e) => e.children.iter().rev().copied().collect(),
            None => return out,
        };
        while let Some(n) = stack.pop() {
            out.push(n);
            if let Some(e) = self.element(n) {
                stack.extend(e.children.iter().rev().copied());
            }
        }
        out
    }

    // ---- building from a page description ----------------------------------

    pub fn from_config(cfg: &PageConfig) -> Self {
        let mut page = Page::new(cfg.cookie.clone().unwrap_or_default());
        page.title = cfg.title.clone().unwrap_or_else(|| "Form".to_string());
        let root = page.root();
        for (fi, form) in cfg.forms.iter().enumerate() {
            let form_id = form.id.clone().unwrap_or_else(|| format!("form_{fi}"));
            let title = form.title.clone().unwrap_or_else(|| capfirst(&form_id));
            let form_node = page.append(root, Element::new(Tag::Form).id(form_id).text(title));
            if let Some(token) = &cfg.csrf_token {
                let mut hidden = Element::new(Tag::Input)
                    .name(CSRF_INPUT_NAME)
                    .value(token.clone());
                hidden.hidden_input = true;
                page.append(form_node, hidden);
            }
            for f in &form.fields {
                page.build_field(form_node, f, None);
            }
            for inline in &form.inlines {
                page.build_inline(form_node, inline);
            }
        }
        page
    }

    fn build_inline(&mut self, form: NodeId, spec: &crate::model::InlineSpec) {
        let title = spec.title.clone().unwrap_or_else(|| capfirst(&spec.prefix));
        let group = self.append(
            form,
            Element::new(Tag::Div)
                .id(format!("{}-group", spec.prefix))
                .class(INLINE_GROUP_CLASS)
                .attr("data-prefix", spec.prefix.clone())
                .text(title),
        );
        let mut total = Element::new(Tag::Input)
            .id(format!("id_{}-TOTAL_FORMS", spec.prefix))
            .name(format!("{}-TOTAL_FORMS", spec.prefix))
            .value("0");
        total.hidden_input = true;
        let total_forms = self.append(group, total);
        self.inlines.insert(
            spec.prefix.clone(),
            InlineGroup {
                group,
                total_forms,
                fields: spec.fields.clone(),
            },
        );
        for _ in 0..spec.rows {
            self.add_inline_row(&spec.prefix);
        }
    }

    /// Append the next row to an inline group and bump its TOTAL_FORMS counter.
    /// Returns the new row's root, which is what a row-added notification carries.
    ///
    /// TOTAL_FORMS is the next free row index, not a count of live rows: removing
    /// a row never decrements it, so indexes are not reused.
    pub fn add_inline_row(&mut self, prefix: &str) -> Option<NodeId> {
        let (group, total_forms, fields) = {
            let g = self.inlines.get(prefix)?;
            (g.group, g.total_forms, g.fields.clone())
        };
        let index: usize = self
            .element(total_forms)
            .and_then(|e| e.value.parse().ok())
            .unwrap_or(0);
        let row_prefix = format!("{prefix}-{index}");
        let row = self.append(
            group,
            Element::new(Tag::Div)
                .id(row_prefix.clone())
                .class(INLINE_ROW_CLASS)
                .text(format!("#{}", index + 1)),
        );
        for f in &fields {
            self.build_field(row, f, Some(&row_prefix));
        }
        if let Some(e) = self.el_mut(total_forms) {
            e.value = (index + 1).to_string();
        }
        Some(row)
    }

    /// Inline prefixes, in the order their groups appear.
    pub fn inline_prefixes(&self) -> Vec<String> {
        let mut groups: Vec<(NodeId, String)> = self
            .inlines
            .iter()
            .map(|(p, g)| (g.group, p.clone()))
            .collect();
        groups.sort();
        groups.into_iter().map(|(_, p)| p).collect()
    }

    /// Prefix of the inline group containing `node`, if any.
    pub fn inline_prefix_of(&self, node: NodeId) -> Option<String> {
        let group = self.closest(node, &Selector::Class(INLINE_GROUP_CLASS))?;
        self.attr(group, "data-prefix")
    }

    fn build_field(&mut self, parent: NodeId, f: &FieldSpec, row_prefix: Option<&str>) {
        let name = match row_prefix {
            Some(p) => format!("{p}-{}", f.name),
            None => f.name.clone(),
        };
        let label = f.label.clone().unwrap_or_else(|| capfirst(&f.name));
        match f.kind {
            FieldKindSpec::SplitDatetime => {
                let (date, time) = f.value.split_once(' ').unwrap_or((f.value.as_str(), ""));
                for (i, (part, v)) in [("date", date), ("time", time)].iter().enumerate() {
                    self.append(
                        parent,
                        Element::new(Tag::Input)
                            .id(format!("id_{name}_{i}"))
                            .name(format!("{name}_{i}"))
                            .label(format!("{label} ({part})"))
                            .value(*v),
                    );
                }
            }
            FieldKindSpec::Hidden => {
                let mut el = Element::new(Tag::Input)
                    .id(format!("id_{name}"))
                    .name(name)
                    .value(f.value.clone());
                el.hidden_input = true;
                self.append(parent, el);
            }
            FieldKindSpec::Text | FieldKindSpec::Textarea => {
                let tag = if f.kind == FieldKindSpec::Textarea {
                    Tag::TextArea
                } else {
                    Tag::Input
                };
                let control = Element::new(tag)
                    .id(format!("id_{name}"))
                    .name(name)
                    .label(label)
                    .value(f.value.clone());
                match &f.ai {
                    Some(ai) => self.build_ai_widget(parent, control, ai, f.kind.clone()),
                    None => {
                        self.append(parent, control);
                    }
                }
            }
        }
    }

    fn build_ai_widget(
        &mut self,
        parent: NodeId,
        control: Element,
        ai: &AiSpec,
        kind: FieldKindSpec,
    ) {
        let container = self.append(parent, Element::new(Tag::Div).class(CONTAINER_CLASS));
        self.append(container, control);
        let field_type = if kind == FieldKindSpec::Textarea {
            "TextField"
        } else {
            "CharField"
        };
        let mut trigger = Element::new(Tag::Button)
            .class(TRIGGER_CLASS)
            .attr(DATA_CONTEXT_FIELDS, ai.context.join(","))
            .attr(DATA_PROMPT, ai.prompt.clone())
            .attr(DATA_FIELD_TYPE, field_type);
        if let Some(l) = &ai.label {
            trigger = trigger.attr(DATA_FIELD_LABEL, l.clone());
        }
        if let Some(h) = &ai.help_text {
            trigger = trigger.attr(DATA_HELP_TEXT, h.clone());
        }
        if let Some(m) = ai.max_length {
            trigger = trigger.attr(DATA_MAX_LENGTH, m.to_string());
        }
        let trigger = self.append(container, trigger);
        self.append(
            trigger,
            Element::new(Tag::Span)
                .class(LABEL_CLASS)
                .text(ai.button_text.as_deref().unwrap_or(DEFAULT_BUTTON_TEXT)),
        );
        self.append(
            trigger,
            Element::new(Tag::Span)
                .class(LOADING_CLASS)
                .text(ai.loading_text.as_deref().unwrap_or(DEFAULT_LOADING_TEXT))
                .hidden(),
        );
        if ai.allow_custom_prompt {
            self.append(
                container,
                Element::new(Tag::Input)
                    .class(CUSTOM_PROMPT_CLASS)
                    .label("Custom prompt"),
            );
        }
        self.append(
            container,
            Element::new(Tag::Span).class(STATUS_CLASS).hidden(),
        );
    }
}

fn capfirst(s: &str) -> String {
    let s = s.replace('_', " ");
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn matches_el(e: &Element, sel: &Selector) -> bool {
    match sel {
        Selector::Tag(t) => e.tag == *t,
        Selector::Class(c) => e.has_class(c),
        Selector::Name(n) => e.name.as_deref() == Some(*n),
        Selector::NameEndsWith(s) => e.name.as_deref().is_some_and(|n| n.ends_with(*s)),
    }
}

impl Dom for Page {
    fn root(&self) -> NodeId {
        NodeId(0)
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|n| self.element(*n).and_then(|e| e.id.as_deref()) == Some(id))
    }

    fn closest(&self, node: NodeId, sel: &Selector) -> Option<NodeId> {
        let mut cur = Some(node);
        while let Some(n) = cur {
            let e = self.element(n)?;
            if matches_el(e, sel) {
                return Some(n);
            }
            cur = e.parent;
        }
        None
    }

    fn query_all(&self, scope: NodeId, sel: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.matches(*n, sel))
            .collect()
    }

    fn matches(&self, node: NodeId, sel: &Selector) -> bool {
        self.element(node).is_some_and(|e| matches_el(e, sel))
    }

    fn is_connected(&self, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(n) = cur {
            if n == self.root() {
                return true;
            }
            cur = self.element(n).and_then(|e| e.parent);
        }
        false
    }

    fn attr(&self, node: NodeId, name: &str) -> Option<String> {
        let e = self.element(node)?;
        match name {
            "id" => e.id.clone(),
            "name" => e.name.clone(),
            "class" => Some(e.classes.join(" ")),
            _ => e.attrs.get(name).cloned(),
        }
    }

    fn set_attr(&mut self, node: NodeId, name: &str, value: &str) {
        if name == "class" {
            self.set_class(node, value);
            return;
        }
        if let Some(e) = self.el_mut(node) {
            match name {
                "id" => e.id = Some(value.to_string()),
                "name" => e.name = Some(value.to_string()),
                _ => {
                    e.attrs.insert(name.to_string(), value.to_string());
                }
            }
        }
    }

    fn value(&self, node: NodeId) -> Option<String> {
        self.element(node).map(|e| e.value.clone())
    }

    fn set_value(&mut self, node: NodeId, value: &str) {
        if let Some(e) = self.el_mut(node) {
            e.value = value.to_string();
        }
    }

    fn text(&self, node: NodeId) -> Option<String> {
        self.element(node).map(|e| e.text.clone())
    }

    fn set_text(&mut self, node: NodeId, text: &str) {
        if let Some(e) = self.el_mut(node) {
            e.text = text.to_string();
        }
    }

    fn set_class(&mut self, node: NodeId, class: &str) {
        if let Some(e) = self.el_mut(node) {
            e.classes = class.split_whitespace().map(|c| c.to_string()).collect();
        }
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|e| e.visible)
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(e) = self.el_mut(node) {
            e.visible = visible;
        }
    }

    fn is_disabled(&self, node: NodeId) -> bool {
        self.element(node).is_some_and(|e| e.disabled)
    }

    fn set_disabled(&mut self, node: NodeId, disabled: bool) {
        if let Some(e) = self.el_mut(node) {
            e.disabled = disabled;
        }
    }

    fn dispatch_change(&mut self, node: NodeId) {
        if self.element(node).is_some() {
            self.changes.push(node);
        }
    }

    fn cookie(&self) -> String {
        self.cookie.clone()
    }
}
