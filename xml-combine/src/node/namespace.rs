//! Namespace and name helpers for XML elements.

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use super::element::Element;
use crate::constants::{XMLNS, XML_NAMESPACE, XML_PREFIX};

/// Splits a qualified name into prefix and local name.
///
/// Returns (Some(prefix), local) for "prefix:local"
/// Returns (None, name) for "name" without prefix
pub fn split_qname(qname: &str) -> (Option<&str>, &str) {
    if let Some(pos) = qname.find(':') {
        (Some(&qname[..pos]), &qname[pos + 1..])
    } else {
        (None, qname)
    }
}

/// Checks if an attribute name is a namespace declaration.
pub fn is_xmlns_attr(name: &str) -> bool {
    name == XMLNS || name.starts_with("xmlns:")
}

/// Returns the prefix declared by a namespace declaration attribute.
///
/// `xmlns` declares the default namespace and yields `Some("")`;
/// `xmlns:foo` yields `Some("foo")`. Other attributes yield `None`.
pub fn declared_prefix(attr_name: &str) -> Option<&str> {
    if attr_name == XMLNS {
        Some("")
    } else {
        attr_name.strip_prefix("xmlns:")
    }
}

/// Builds the declaration attribute name for a prefix.
pub fn declaration_attr(prefix: &str) -> String {
    if prefix.is_empty() {
        XMLNS.to_string()
    } else {
        format!("{XMLNS}:{prefix}")
    }
}

/// Checks whether `name` is usable as an element name.
///
/// Accepts the XML 1.0 name shape: a letter or `_` first, then letters,
/// digits, `-`, `.`, `_`, and at most one `:` separating non-empty parts.
pub fn is_valid_xml_name(name: &str) -> bool {
    let (prefix, local) = split_qname(name);
    if let Some(prefix) = prefix {
        if !is_ncname(prefix) {
            return false;
        }
    }
    is_ncname(local)
}

fn is_ncname(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_' | '\u{B7}'))
}

/// Prefix bindings in effect at one point of a document, `""` being the
/// default namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamespaceScope {
    bindings: FxHashMap<String, String>,
}

impl NamespaceScope {
    /// Creates a scope with no bindings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the scope inside `element`: these bindings overridden by the
    /// element's own declarations.
    pub fn enter(&self, element: &Element) -> Cow<'_, NamespaceScope> {
        let mut decls = element.namespace_decls().peekable();
        if decls.peek().is_none() {
            return Cow::Borrowed(self);
        }
        let mut inner = self.clone();
        for (prefix, uri) in decls {
            inner.bindings.insert(prefix.to_string(), uri.to_string());
        }
        Cow::Owned(inner)
    }

    /// Returns the URI bound to `prefix`. An empty declaration unbinds it.
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        if prefix == XML_PREFIX {
            return Some(XML_NAMESPACE);
        }
        self.bindings
            .get(prefix)
            .map(String::as_str)
            .filter(|uri| !uri.is_empty())
    }
}
