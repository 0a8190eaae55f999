//! Run-wide namespace bindings.
//!
//! Every `xmlns:p` declaration met in merged content is recorded here and
//! written once on the combined root. The first URI registered for a prefix
//! wins; later different URIs for that prefix are dropped with a warning.
//! Prefixes are not rewritten, so content from the losing document keeps its
//! prefix and ends up bound to the winning URI.
//!
//! Default namespace declarations (`xmlns`) are not collected; they stay on
//! the elements that make them.

use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::constants::{XMLNS, XML_PREFIX};
use crate::node::{declaration_attr, Element};

/// Result of offering one binding to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// The prefix was new and is now bound.
    Added,
    /// The same binding was already present.
    AlreadyPresent,
    /// The prefix is bound to another URI, which is kept.
    Conflict {
        /// The URI that stays bound.
        existing: String,
    },
    /// The binding cannot be declared on the root and was ignored.
    Ignored,
}

/// Prefix → URI bindings collected over a whole run, in registration order.
#[derive(Debug, Clone, Default)]
pub struct NamespaceRegistry {
    bindings: IndexMap<String, String>,
}

impl NamespaceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Offers a binding.
    ///
    /// The default namespace (`""`), the reserved `xml`/`xmlns` prefixes and
    /// empty URIs are ignored.
    pub fn register(&mut self, prefix: &str, uri: &str) -> Registration {
        if prefix.is_empty() || prefix == XML_PREFIX || prefix == XMLNS || uri.is_empty() {
            return Registration::Ignored;
        }
        match self.bindings.get(prefix) {
            Some(existing) if existing == uri => Registration::AlreadyPresent,
            Some(existing) => Registration::Conflict {
                existing: existing.clone(),
            },
            None => {
                self.bindings.insert(prefix.to_string(), uri.to_string());
                Registration::Added
            }
        }
    }

    /// Registers every prefixed declaration on `element` and its descendants.
    ///
    /// `origin` names the source document in log messages. Returns the
    /// number of newly added bindings.
    pub fn register_element(&mut self, element: &Element, origin: &Path) -> usize {
        let mut added = 0;
        for node in element.descendants() {
            for (prefix, uri) in node.namespace_decls() {
                match self.register(prefix, uri) {
                    Registration::Added => {
                        debug!(prefix, uri, file = %origin.display(), "registered namespace");
                        added += 1;
                    }
                    Registration::Conflict { existing } => {
                        warn!(
                            prefix,
                            kept = %existing,
                            dropped = uri,
                            file = %origin.display(),
                            "namespace prefix already bound to another URI; keeping the first"
                        );
                    }
                    Registration::AlreadyPresent | Registration::Ignored => {}
                }
            }
        }
        added
    }

    /// Returns the URI bound to `prefix`.
    pub fn uri(&self, prefix: &str) -> Option<&str> {
        self.bindings.get(prefix).map(String::as_str)
    }

    /// Returns the number of bindings.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterates over (prefix, uri) in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.bindings.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    /// Returns the declarations to write on the root element as
    /// (attribute name, uri), in registration order.
    pub fn declarations(&self) -> Vec<(String, String)> {
        self.bindings
            .iter()
            .map(|(prefix, uri)| (declaration_attr(prefix), uri.clone()))
            .collect()
    }
}
