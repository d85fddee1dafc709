use std::collections::{HashMap, HashSet};

pub const ALLOWED_TAGS: &[&str] = &[
    "a", "b", "blockquote", "br", "code", "em", "figcaption", "figure", "h1",
    "h2", "h3", "h4", "hr", "i", "img", "li", "ol", "p", "pre", "s", "span",
    "strong", "u", "ul",
];

pub const ALLOWED_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "title"]),
    ("img", &["src", "alt", "title"]),
];

/// Allow-list HTML cleaner. Every piece of stored content passes through it
/// before it is rendered.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    tags: HashSet<&'static str>,
    attributes: HashMap<&'static str, HashSet<&'static str>>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(ALLOWED_TAGS, ALLOWED_ATTRIBUTES)
    }
}

impl Sanitizer {
    pub fn new(
        tags: &[&'static str],
        attributes: &[(&'static str, &[&'static str])],
    ) -> Self {
        Self {
            tags: tags.iter().copied().collect(),
            attributes: attributes
                .iter()
                .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
                .collect(),
        }
    }

    /// Malformed markup is repaired or dropped, never rejected.
    pub fn sanitize(&self, html: &str) -> String {
        ammonia::Builder::default()
            .tags(self.tags.clone())
            .tag_attributes(self.attributes.clone())
            .generic_attributes(HashSet::new())
            .clean(html)
            .to_string()
    }
}
