//! The owned element tree.

use indexmap::IndexMap;

use super::namespace::{declared_prefix, split_qname};
use crate::constants::XMLNS;

/// An XML element and the subtree it owns.
///
/// Attributes keep document order. `text` is the character data before the
/// first child; `tail` is the character data that follows this element
/// inside its parent, so mixed content survives a round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    /// The qualified name (e.g. "item", "ns1:item").
    tag: String,
    /// Attributes keyed by qualified name.
    attributes: IndexMap<String, String>,
    /// Leading text content.
    text: Option<String>,
    /// Text after the closing tag.
    tail: Option<String>,
    /// Child elements in document order.
    children: Vec<Element>,
}

impl Element {
    /// Creates an empty element with the given qualified name.
    pub fn new(tag: impl Into<String>) -> Self {
        Element {
            tag: tag.into(),
            ..Default::default()
        }
    }

    /// Returns the qualified name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Returns the prefix of the qualified name, if any.
    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.tag).0
    }

    /// Returns the attributes.
    pub fn attributes(&self) -> &IndexMap<String, String> {
        &self.attributes
    }

    /// Returns the value of an attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Sets an attribute, keeping its position if it already exists.
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    /// Returns the leading text.
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Appends to the leading text.
    pub fn append_text(&mut self, text: &str) {
        self.text.get_or_insert_with(String::new).push_str(text);
    }

    /// Returns the tail text.
    pub fn tail(&self) -> Option<&str> {
        self.tail.as_deref()
    }

    /// Sets the tail text.
    pub fn set_tail(&mut self, tail: Option<String>) {
        self.tail = tail;
    }

    /// Appends to the tail text.
    pub fn append_tail(&mut self, text: &str) {
        self.tail.get_or_insert_with(String::new).push_str(text);
    }

    /// Returns the children as a slice.
    pub fn children(&self) -> &[Element] {
        &self.children
    }

    /// Returns a mutable reference to the children.
    pub fn children_mut(&mut self) -> &mut Vec<Element> {
        &mut self.children
    }

    /// Returns the number of children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Appends a child element.
    pub fn push_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// Consumes the element and returns its children.
    pub fn into_children(self) -> Vec<Element> {
        self.children
    }

    /// Returns true if the element has neither text nor children.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.children.is_empty()
    }

    /// Returns true if text is interleaved with child elements.
    pub fn has_mixed_content(&self) -> bool {
        !self.children.is_empty()
            && (self.text.is_some() || self.children.iter().any(|c| c.tail.is_some()))
    }

    /// Iterates over this element and all descendants in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Iterates over the namespace declarations made on this element as
    /// (prefix, uri) pairs, "" being the default namespace.
    pub fn namespace_decls(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .filter_map(|(name, uri)| declared_prefix(name).map(|p| (p, uri.as_str())))
    }

    /// Returns the default namespace declared on this element, if any.
    pub fn default_namespace(&self) -> Option<&str> {
        self.attribute(XMLNS)
    }

    /// Declares `uri` as the default namespace of this element unless it
    /// declares its own.
    pub fn inherit_default_namespace(&mut self, uri: &str) {
        if !self.attributes.contains_key(XMLNS) {
            self.attributes.shift_insert(0, XMLNS.to_string(), uri.to_string());
        }
    }

    /// Removes prefixed namespace declarations (`xmlns:p`) from this element
    /// and every descendant. Default namespace declarations are kept.
    /// Returns how many were removed.
    pub fn strip_prefixed_namespace_decls(&mut self) -> usize {
        let before = self.attributes.len();
        self.attributes
            .retain(|name, _| !matches!(declared_prefix(name), Some(p) if !p.is_empty()));
        let mut removed = before - self.attributes.len();
        for child in &mut self.children {
            removed += child.strip_prefixed_namespace_decls();
        }
        removed
    }
}

/// Pre-order iterator over an element subtree.
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.stack.pop()?;
        self.stack.extend(next.children.iter().rev());
        Some(next)
    }
}
