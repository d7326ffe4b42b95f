//! Markup passes built on `lol_html`
//!
//! Every pass streams the document through an [`HtmlRewriter`]. Bytes that no
//! handler touches are written out exactly as rendered, and text inside
//! `script`, `style` or comments is never taken for a tag.

use html_escape::{decode_html_entities, encode_double_quoted_attribute};
use lol_html::errors::RewritingError;
use lol_html::html_content::Element;
use lol_html::{element, HtmlRewriter, Settings};
use std::cell::{Cell, RefCell};

/// One attribute of a start tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name
    pub name: String,
    /// Entity-decoded value; empty for bare attributes such as `download`
    pub value: String,
}

/// A start tag found in the markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTag {
    /// Lowercased element name
    pub name: String,
    pub attributes: Vec<Attribute>,
}

impl StartTag {
    fn from_element(el: &Element<'_, '_>) -> Self {
        Self {
            name: el.tag_name().to_ascii_lowercase(),
            attributes: el
                .attributes()
                .iter()
                .map(|attribute| Attribute {
                    name: attribute.name().to_ascii_lowercase(),
                    value: decode_html_entities(&attribute.value()).into_owned(),
                })
                .collect(),
        }
    }

    /// Returns the decoded value of an attribute
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Returns true if the attribute is present, with or without a value
    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.name == name)
    }

    /// Whitespace-separated tokens of the `rel` attribute, lowercased
    pub fn rel_tokens(&self) -> Vec<String> {
        self.attr("rel")
            .map(|rel| {
                rel.split_ascii_whitespace()
                    .map(|t| t.to_ascii_lowercase())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Lists the start tags matching `selector`, in document order
pub fn start_tags(markup: &str, selector: &str) -> Result<Vec<StartTag>, RewritingError> {
    let tags = RefCell::new(Vec::new());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!(selector, |el| {
                tags.borrow_mut().push(StartTag::from_element(el));
                Ok(())
            })],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    rewriter.write(markup.as_bytes())?;
    rewriter.end()?;

    Ok(tags.into_inner())
}

/// Rewrites attribute values
///
/// `rewrite` is called for every attribute of every element with the tag and
/// the attribute. Returning `Some(new)` replaces the value.
pub fn rewrite_attributes<F>(markup: &str, mut rewrite: F) -> Result<String, RewritingError>
where
    F: FnMut(&StartTag, &Attribute) -> Option<String>,
{
    let mut output = Vec::with_capacity(markup.len());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![element!("*", |el| {
                let tag = StartTag::from_element(el);
                for attribute in &tag.attributes {
                    if let Some(value) = rewrite(&tag, attribute) {
                        el.set_attribute(&attribute.name, &encode_double_quoted_attribute(&value))?;
                    }
                }
                Ok(())
            })],
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(markup.as_bytes())?;
    rewriter.end()?;

    Ok(String::from_utf8_lossy(&output).into_owned())
}

/// Removes every element matching one of `selectors`, content included
///
/// Returns `None` when nothing matched. Selectors must already be valid.
pub fn remove_elements(
    markup: &str,
    selectors: &[String],
) -> Result<Option<String>, RewritingError> {
    let removed = Cell::new(0usize);
    let counter = &removed;
    let mut output = Vec::with_capacity(markup.len());

    let handlers = selectors
        .iter()
        .map(|selector| {
            element!(selector.as_str(), move |el| {
                el.remove();
                counter.set(counter.get() + 1);
                Ok(())
            })
        })
        .collect();

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: handlers,
            ..Settings::default()
        },
        |chunk: &[u8]| output.extend_from_slice(chunk),
    );

    rewriter.write(markup.as_bytes())?;
    rewriter.end()?;

    if removed.get() == 0 {
        return Ok(None);
    }
    Ok(Some(String::from_utf8_lossy(&output).into_owned()))
}
