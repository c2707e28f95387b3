use crate::dom::{markup, Dom, NodeId, Selector, Tag};
use regex::Regex;

/// Maps a logical field name to the live input a widget should read.
///
/// Handles flat forms (`title`), id-prefixed fields (`id_title`), multi-part widgets
/// (`id_when_0`) and repeated inline rows (`items-2-title`), without knowing which
/// convention produced the surrounding form.
pub struct FieldResolver {
    row_name: Regex,
}

impl Default for FieldResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldResolver {
    pub fn new() -> Self {
        Self {
            // <prefix>-<index>-<rest>
            row_name: Regex::new(r"^(.+)-(\d+)-").expect("static regex"),
        }
    }

    /// Same-row identifiers for `logical` when the widget's target field lives in an
    /// inline row (`items-2-description` gives `items-2-title`, `id_items-2-title`).
    pub fn row_candidates(&self, logical: &str, target_name: Option<&str>) -> Vec<String> {
        match self.row_of(target_name) {
            Some((prefix, index)) => vec![
                format!("{prefix}-{index}-{logical}"),
                format!("id_{prefix}-{index}-{logical}"),
            ],
            None => Vec::new(),
        }
    }

    /// Candidate identifiers for `logical`, in lookup order.
    pub fn candidates(&self, logical: &str, target_name: Option<&str>) -> Vec<String> {
        let mut out = vec![
            logical.to_string(),
            format!("id_{logical}"),
            format!("id_{logical}_0"),
        ];
        if let Some((prefix, _)) = self.row_of(target_name) {
            out.push(format!("{prefix}-{logical}"));
            out.push(format!("id_{prefix}-{logical}"));
        }
        out
    }

    fn row_of(&self, target_name: Option<&str>) -> Option<(String, String)> {
        let caps = self.row_name.captures(target_name?)?;
        Some((caps[1].to_string(), caps[2].to_string()))
    }

    /// Same-row siblings first, by id or exact name only. Then each candidate by id,
    /// exact name, and finally any name ending in `-<logical>`.
    pub fn resolve<D: Dom + ?Sized>(
        &self,
        doc: &D,
        logical: &str,
        scope: NodeId,
    ) -> Option<NodeId> {
        let form = doc.closest(scope, &Selector::Tag(Tag::Form))?;
        let target_name = target_field(doc, scope).and_then(|t| doc.attr(t, "name"));
        let by_identifier = |cand: &str| {
            doc.element_by_id(cand)
                .or_else(|| doc.query(form, &Selector::Name(cand)))
        };
        for cand in self.row_candidates(logical, target_name.as_deref()) {
            if let Some(hit) = by_identifier(&cand) {
                return Some(hit);
            }
        }
        let suffix = format!("-{logical}");
        for cand in self.candidates(logical, target_name.as_deref()) {
            let hit = by_identifier(&cand)
                .or_else(|| doc.query(form, &Selector::NameEndsWith(&suffix)));
            if hit.is_some() {
                return hit;
            }
        }
        tracing::debug!("field '{logical}' not found near {scope:?}");
        None
    }
}

/// The text control a widget writes into: its textarea, else its first plain input.
pub fn target_field<D: Dom + ?Sized>(doc: &D, container: NodeId) -> Option<NodeId> {
    doc.query(container, &Selector::Tag(Tag::TextArea)).or_else(|| {
        doc.query_all(container, &Selector::Tag(Tag::Input))
            .into_iter()
            .find(|n| !doc.matches(*n, &Selector::Class(markup::CUSTOM_PROMPT_CLASS)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::page::{Element, Page};

    // form > [fields..., container > textarea(target)]
    fn form_with(target_name: &str, fields: &[(Option<&str>, Option<&str>)]) -> (Page, NodeId) {
        let mut page = Page::new("");
        let root = page.root();
        let form = page.append(root, Element::new(Tag::Form));
        for (id, name) in fields {
            let mut el = Element::new(Tag::Input).value(format!("{id:?}/{name:?}"));
            if let Some(id) = id {
                el = el.id(*id);
            }
            if let Some(name) = name {
                el = el.name(*name);
            }
            page.append(form, el);
        }
        let container = page.append(
            form,
            Element::new(Tag::Div).class(markup::CONTAINER_CLASS),
        );
        page.append(container, Element::new(Tag::TextArea).name(target_name));
        (page, container)
    }

    #[test]
    fn candidate_list_for_flat_and_row_targets() {
        let r = FieldResolver::new();
        assert_eq!(
            r.candidates("title", Some("description")),
            vec!["title", "id_title", "id_title_0"]
        );
        assert!(r.row_candidates("title", Some("description")).is_empty());
        assert_eq!(
            r.row_candidates("title", Some("items-2-description")),
            vec!["items-2-title", "id_items-2-title"]
        );
        assert_eq!(
            r.candidates("title", Some("items-2-description")),
            vec!["title", "id_title", "id_title_0", "items-title", "id_items-title"]
        );
    }

    #[test]
    fn no_enclosing_form_yields_none() {
        let mut page = Page::new("");
        let root = page.root();
        let lone = page.append(root, Element::new(Tag::Div));
        page.append(root, Element::new(Tag::Input).id("title").name("title"));
        assert!(FieldResolver::new().resolve(&page, "title", lone).is_none());
    }

    #[test]
    fn missing_markup_never_panics() {
        let (page, scope) = form_with("body", &[]);
        let r = FieldResolver::new();
        for name in ["", "-", "x-0-", "weird name", "ünïcode"] {
            assert!(r.resolve(&page, name, scope).is_none());
        }
    }

    #[test]
    fn resolves_by_id_name_and_compound_part() {
        let (page, scope) = form_with(
            "description",
            &[(Some("id_tagline"), Some("tagline")), (Some("id_when_0"), Some("when_0"))],
        );
        let r = FieldResolver::new();
        let tagline = r.resolve(&page, "tagline", scope).unwrap();
        assert_eq!(page.attr(tagline, "id").as_deref(), Some("id_tagline"));
        let when = r.resolve(&page, "when", scope).unwrap();
        assert_eq!(page.attr(when, "name").as_deref(), Some("when_0"));
    }

    #[test]
    fn identifier_match_beats_suffix_match() {
        // `other-title` would satisfy the suffix lookup and comes first in the form
        let (page, scope) = form_with(
            "description",
            &[(None, Some("other-title")), (Some("title"), None)],
        );
        let got = FieldResolver::new().resolve(&page, "title", scope).unwrap();
        assert_eq!(page.attr(got, "id").as_deref(), Some("title"));
    }

    #[test]
    fn suffix_lookup_catches_unknown_prefixes() {
        let (page, scope) = form_with("description", &[(None, Some("legacy-title"))]);
        let got = FieldResolver::new().resolve(&page, "title", scope).unwrap();
        assert_eq!(page.attr(got, "name").as_deref(), Some("legacy-title"));
    }

    #[test]
    fn row_widget_prefers_sibling_in_same_row() {
        let (page, scope) = form_with(
            "items-2-description",
            &[
                (Some("id_title"), Some("title")),
                (Some("id_items-0-title"), Some("items-0-title")),
                (Some("id_items-2-title"), Some("items-2-title")),
            ],
        );
        let got = FieldResolver::new().resolve(&page, "title", scope).unwrap();
        assert_eq!(page.attr(got, "name").as_deref(), Some("items-2-title"));
    }

    #[test]
    fn row_widget_without_row_sibling_takes_flat_field_over_other_rows() {
        // `items-0-title` comes first and would satisfy the suffix lookup
        let (page, scope) = form_with(
            "sections-0-text",
            &[
                (Some("id_items-0-title"), Some("items-0-title")),
                (Some("id_title"), Some("title")),
            ],
        );
        let got = FieldResolver::new().resolve(&page, "title", scope).unwrap();
        assert_eq!(page.attr(got, "name").as_deref(), Some("title"));
    }

    #[test]
    fn target_field_prefers_textarea_and_skips_custom_prompt() {
        let mut page = Page::new("");
        let root = page.root();
        let c = page.append(root, Element::new(Tag::Div));
        page.append(
            c,
            Element::new(Tag::Input).class(markup::CUSTOM_PROMPT_CLASS),
        );
        let input = page.append(c, Element::new(Tag::Input).name("headline"));
        assert_eq!(target_field(&page, c), Some(input));
        let ta = page.append(c, Element::new(Tag::TextArea).name("body"));
        assert_eq!(target_field(&page, c), Some(ta));
    }
}
