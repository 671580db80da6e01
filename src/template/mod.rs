//! DOCX templating: a `{field}` / `{#section}…{/section}` language bound
//! over the paragraphs of a Word document.
//!
//! A template is compiled once (every tag is checked, even inside sections
//! that end up repeated zero times) and then rendered against
//! [`TemplateData`]. Rendering itself cannot fail.

pub mod docx;
pub mod engine;

use std::collections::BTreeMap;

use thiserror::Error;

pub use docx::*;
pub use engine::*;

/// Errors raised while loading, compiling or packaging a template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("unclosed tag in paragraph \"{paragraph}\"")]
    UnclosedTag { paragraph: String },

    #[error("empty tag in paragraph \"{paragraph}\"")]
    EmptyTag { paragraph: String },

    #[error("section '{name}' is never closed")]
    UnclosedSection { name: String },

    #[error("closing tag for section '{name}' without a matching opening tag")]
    UnmatchedSectionEnd { name: String },

    #[error("section '{inner}' nested inside section '{outer}' is not supported")]
    NestedSection { outer: String, inner: String },

    #[error("section tag must be alone in its paragraph: \"{paragraph}\"")]
    InlineSectionTag { paragraph: String },

    #[error("tags are not supported in paragraphs holding text boxes or shapes: \"{paragraph}\"")]
    NestedParagraph { paragraph: String },

    #[error("part '{0}' is not valid UTF-8")]
    InvalidEncoding(String),

    #[error("missing package part '{0}'")]
    MissingPart(String),

    #[error("invalid DOCX package: {0}")]
    Package(String),
}

impl From<zip::result::ZipError> for TemplateError {
    fn from(e: zip::result::ZipError) -> Self {
        TemplateError::Package(e.to_string())
    }
}

impl From<std::io::Error> for TemplateError {
    fn from(e: std::io::Error) -> Self {
        TemplateError::Package(e.to_string())
    }
}

/// One item of a repeating section: field name → value
pub type TemplateItem = BTreeMap<String, String>;

/// Values bound into a template
#[derive(Debug, Clone, Default)]
pub struct TemplateData {
    scalars: BTreeMap<String, String>,
    sections: BTreeMap<String, Vec<TemplateItem>>,
}

impl TemplateData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a top-level field
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.scalars.insert(key.into(), value.into());
        self
    }

    /// Bind a list of items to a repeating section
    pub fn set_section(&mut self, name: impl Into<String>, items: Vec<TemplateItem>) -> &mut Self {
        self.sections.insert(name.into(), items);
        self
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.scalars.get(key).map(String::as_str)
    }

    /// Items bound to `name`; an unbound section has no items
    pub fn section(&self, name: &str) -> &[TemplateItem] {
        self.sections.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unbound_section_is_empty() {
        let data = TemplateData::new();
        assert!(data.section("products").is_empty());
        assert_eq!(data.scalar("missing"), None);
    }

    #[test]
    fn test_set_overwrites() {
        let mut data = TemplateData::new();
        data.set("title", "a").set("title", "b");
        assert_eq!(data.scalar("title"), Some("b"));
    }
}
