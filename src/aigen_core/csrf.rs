use crate::dom::{Dom, Selector, Tag};

/// Source of the anti-forgery token sent with every generation request.
pub trait CsrfProvider {
    /// Never fails; an empty token is still sent and left for the endpoint to reject.
    fn token(&self, doc: &dyn Dom) -> String;
}

/// Reads the token from a named cookie, falling back to a hidden form input.
#[derive(Clone, Debug)]
pub struct CookieCsrf {
    pub cookie_name: String,
    pub fallback_input: String,
}

impl CookieCsrf {
    pub fn new(cookie_name: impl Into<String>, fallback_input: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            fallback_input: fallback_input.into(),
        }
    }
}

impl Default for CookieCsrf {
    fn default() -> Self {
        Self::new("csrftoken", crate::dom::page::CSRF_INPUT_NAME)
    }
}

/// Value of `name` in a `document.cookie` style string.
pub fn cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies
        .split(';')
        .filter_map(|entry| entry.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v.to_string())
}

impl CsrfProvider for CookieCsrf {
    fn token(&self, doc: &dyn Dom) -> String {
        if let Some(v) = cookie_value(&doc.cookie(), &self.cookie_name).filter(|v| !v.is_empty()) {
            return v;
        }
        let from_input = doc
            .query_all(doc.root(), &Selector::Name(&self.fallback_input))
            .into_iter()
            .find(|n| doc.matches(*n, &Selector::Tag(Tag::Input)))
            .and_then(|n| doc.value(n))
            .filter(|v| !v.is_empty());
        if from_input.is_none() {
            tracing::debug!("no csrf token in cookie '{}' or input '{}'", self.cookie_name, self.fallback_input);
        }
        from_input.unwrap_or_default()
    }
}
