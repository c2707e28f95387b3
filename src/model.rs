use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Body posted to the generation endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt_type: String,
    pub context: BTreeMap<String, String>,
    pub field_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(
        config: &WidgetConfig,
        context: BTreeMap<String, String>,
        field_name: impl Into<String>,
    ) -> Self {
        Self {
            prompt_type: config.prompt_type.clone(),
            context,
            field_name: field_name.into(),
            field_label: config.field_label.clone(),
            help_text: config.help_text.clone(),
            max_length: config.max_length,
            field_type: config.field_type.clone(),
            custom_prompt: None,
        }
    }

    pub fn with_custom_prompt(mut self, prompt: Option<String>) -> Self {
        self.custom_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }
}

/// Envelope returned by the generation endpoint, success or not.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GenerationResponse {
    pub success: bool,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

pub const GENERIC_REJECTION: &str = "Failed to generate content";

impl GenerationResponse {
    /// Content on success; the server-supplied error (or a generic one) otherwise.
    pub fn into_content(self) -> Result<String, GenerateError> {
        if self.success {
            Ok(self.content.unwrap_or_default())
        } else {
            let msg = self
                .error
                .filter(|e| !e.is_empty())
                .unwrap_or_else(|| GENERIC_REJECTION.to_string());
            Err(GenerateError::Rejected(msg))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    /// Endpoint answered with `success: false`.
    #[error("{0}")]
    Rejected(String),
    /// The call failed or the body was not a generation envelope.
    #[error("{0}")]
    Transport(String),
}

/// Per-widget configuration, parsed once from the trigger's data attributes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetConfig {
    pub prompt_type: String,
    pub context_fields: Vec<String>,
    pub field_label: Option<String>,
    pub help_text: Option<String>,
    pub max_length: Option<u32>,
    pub field_type: Option<String>,
}

/// Split a comma-separated field list, dropping blanks and repeats (first one wins).
pub fn parse_context_fields(raw: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let name = part.trim();
        if name.is_empty() || out.iter().any(|n| n == name) {
            continue;
        }
        out.push(name.to_string());
    }
    out
}

// ---- Page description (YAML) ------------------------------------------------

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PageConfig {
    #[serde(default)]
    pub title: Option<String>,
    // Raw `document.cookie` style string
    #[serde(default)]
    pub cookie: Option<String>,
    // Value of the hidden csrfmiddlewaretoken input, rendered into every form
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default)]
    pub forms: Vec<FormSpec>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FormSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub inlines: Vec<InlineSpec>,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FieldKindSpec {
    #[default]
    Text,
    Textarea,
    // Two inputs `<name>_0` / `<name>_1`, as a split date/time widget renders them
    SplitDatetime,
    Hidden,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: FieldKindSpec,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub ai: Option<AiSpec>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AiSpec {
    pub prompt: String,
    #[serde(default)]
    pub context: Vec<String>,
    #[serde(default)]
    pub button_text: Option<String>,
    #[serde(default)]
    pub loading_text: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub help_text: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub allow_custom_prompt: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct InlineSpec {
    pub prefix: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_rows")]
    pub rows: usize,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

fn default_rows() -> usize {
    1
}

pub(crate) fn validate_page_config(cfg: &PageConfig) -> Result<(), String> {
    use std::collections::HashSet;
    if cfg.forms.is_empty() {
        return Err("page must declare at least one form".to_string());
    }
    for (fi, form) in cfg.forms.iter().enumerate() {
        let mut names = HashSet::new();
        for (i, f) in form.fields.iter().enumerate() {
            validate_field(f, &format!("forms[{fi}].fields[{i}]"))?;
            if !names.insert(f.name.as_str()) {
                return Err(format!(
                    "forms[{fi}]: duplicate field name '{}' at index {i}",
                    f.name
                ));
            }
        }
        let mut prefixes = HashSet::new();
        for (ii, inline) in form.inlines.iter().enumerate() {
            if inline.prefix.trim().is_empty() {
                return Err(format!("forms[{fi}].inlines[{ii}]: prefix must not be empty"));
            }
            if !prefixes.insert(inline.prefix.as_str()) {
                return Err(format!(
                    "forms[{fi}].inlines[{ii}]: duplicate inline prefix '{}'",
                    inline.prefix
                ));
            }
            for (i, f) in inline.fields.iter().enumerate() {
                validate_field(f, &format!("forms[{fi}].inlines[{ii}].fields[{i}]"))?;
            }
        }
    }
    Ok(())
}

fn validate_field(f: &FieldSpec, at: &str) -> Result<(), String> {
    if f.name.trim().is_empty() {
        return Err(format!("{at}: field name must not be empty"));
    }
    if let Some(ai) = &f.ai {
        if ai.prompt.trim().is_empty() {
            return Err(format!("{at} ('{}'): ai.prompt must not be empty", f.name));
        }
        if !matches!(f.kind, FieldKindSpec::Text | FieldKindSpec::Textarea) {
            return Err(format!(
                "{at} ('{}'): ai widgets need a text or textarea field",
                f.name
            ));
        }
    }
    Ok(())
}
