pub mod page;

pub use page::Page;

/// Index of an element inside a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tag {
    Root,
    Form,
    Div,
    Input,
    TextArea,
    Button,
    Span,
}

/// The handful of element queries the widget controller needs.
#[derive(Clone, Copy, Debug)]
pub enum Selector<'a> {
    Tag(Tag),
    Class(&'a str),
    /// `[name="..."]`
    Name(&'a str),
    /// `[name$="..."]`
    NameEndsWith(&'a str),
}

/// Markup contract shared with the form renderer.
pub mod markup {
    pub const TRIGGER_CLASS: &str = "ai-generate-btn";
    pub const CONTAINER_CLASS: &str = "ai-textarea-widget";
    pub const LABEL_CLASS: &str = "ai-btn-text";
    pub const LOADING_CLASS: &str = "ai-btn-loading";
    pub const STATUS_CLASS: &str = "ai-status";
    pub const CUSTOM_PROMPT_CLASS: &str = "ai-custom-prompt";
    pub const INLINE_GROUP_CLASS: &str = "inline-group";
    pub const INLINE_ROW_CLASS: &str = "inline-related";

    pub const DATA_CONTEXT_FIELDS: &str = "data-context-fields";
    pub const DATA_PROMPT: &str = "data-prompt";
    pub const DATA_FIELD_LABEL: &str = "data-field-label";
    pub const DATA_HELP_TEXT: &str = "data-help-text";
    pub const DATA_MAX_LENGTH: &str = "data-max-length";
    pub const DATA_FIELD_TYPE: &str = "data-field-type";
    pub const DATA_INITIALIZED: &str = "data-initialized";
}

/// Document access used by the widget controller.
///
/// Lookups are total: a missing element is `None`, never an error. Mutators on a
/// node that no longer belongs to the document are allowed and have no visible effect.
pub trait Dom {
    fn root(&self) -> NodeId;
    fn element_by_id(&self, id: &str) -> Option<NodeId>;
    /// Nearest inclusive ancestor matching `sel`.
    fn closest(&self, node: NodeId, sel: &Selector) -> Option<NodeId>;
    /// Descendants of `scope` (excluding `scope`) matching `sel`, in document order.
    fn query_all(&self, scope: NodeId, sel: &Selector) -> Vec<NodeId>;
    fn query(&self, scope: NodeId, sel: &Selector) -> Option<NodeId> {
        self.query_all(scope, sel).into_iter().next()
    }
    fn matches(&self, node: NodeId, sel: &Selector) -> bool;
    /// Whether `node` is still attached under the document root.
    fn is_connected(&self, node: NodeId) -> bool;

    fn attr(&self, node: NodeId, name: &str) -> Option<String>;
    fn set_attr(&mut self, node: NodeId, name: &str, value: &str);
    fn value(&self, node: NodeId) -> Option<String>;
    fn set_value(&mut self, node: NodeId, value: &str);
    fn text(&self, node: NodeId) -> Option<String>;
    fn set_text(&mut self, node: NodeId, text: &str);
    fn set_class(&mut self, node: NodeId, class: &str);
    fn is_visible(&self, node: NodeId) -> bool;
    fn set_visible(&mut self, node: NodeId, visible: bool);
    fn is_disabled(&self, node: NodeId) -> bool;
    fn set_disabled(&mut self, node: NodeId, disabled: bool);
    /// Bubbling `change` notification, as if the operator edited the field.
    fn dispatch_change(&mut self, node: NodeId);
    /// `document.cookie`
    fn cookie(&self) -> String;
}
