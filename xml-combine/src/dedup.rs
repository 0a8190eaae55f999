//! Content fingerprints for duplicate detection.

use md5::{Digest, Md5};
use rustc_hash::FxHashSet;

use crate::node::{is_xmlns_attr, split_qname, Element, NamespaceScope};

/// Fingerprints of elements already merged during a run.
pub type FingerprintSet = FxHashSet<String>;

/// Computes the fingerprint of an element subtree whose ancestors bind
/// `scope`.
///
/// The digest covers the tag and the namespace URI it resolves to, the
/// text, the attributes sorted by name and, recursively, every child in
/// document order. Namespace declarations count only through the URIs they
/// bind, so the same prefix bound to different URIs gives different
/// fingerprints. Tail text is left out; a missing text counts the same as
/// an empty one. Every field is length-prefixed so distinct trees never
/// share an encoding.
pub fn fingerprint(element: &Element, scope: &NamespaceScope) -> String {
    let mut hasher = Md5::new();
    hash_element(&mut hasher, element, scope);
    hex::encode(hasher.finalize())
}

fn hash_element(hasher: &mut Md5, element: &Element, outer: &NamespaceScope) {
    let scope = outer.enter(element);
    hash_field(hasher, b'E', element.tag());
    hash_field(hasher, b'N', resolved_uri(&scope, element.prefix().unwrap_or("")));
    hash_field(hasher, b'T', element.text().unwrap_or(""));

    let mut attrs: Vec<(&String, &String)> = element
        .attributes()
        .iter()
        .filter(|(name, _)| !is_xmlns_attr(name))
        .collect();
    attrs.sort();
    hasher.update((attrs.len() as u64).to_le_bytes());
    for (name, value) in attrs {
        // Unprefixed attributes are in no namespace
        let uri = match split_qname(name).0 {
            Some(prefix) => resolved_uri(&scope, prefix),
            None => "",
        };
        hash_field(hasher, b'A', name);
        hash_field(hasher, b'U', uri);
        hash_field(hasher, b'V', value);
    }

    hasher.update((element.child_count() as u64).to_le_bytes());
    for child in element.children() {
        hash_element(hasher, child, &scope);
    }
}

fn resolved_uri<'a>(scope: &'a NamespaceScope, prefix: &str) -> &'a str {
    scope.resolve(prefix).unwrap_or("")
}

fn hash_field(hasher: &mut Md5, kind: u8, value: &str) {
    hasher.update([kind]);
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

/// Tracks fingerprints across a run so each distinct subtree is merged once.
#[derive(Debug, Clone, Default)]
pub struct DuplicateDetector {
    seen: FingerprintSet,
}

impl DuplicateDetector {
    /// Creates an empty detector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `element`, whose ancestors bind `scope`, and returns true if
    /// its content was not seen before.
    pub fn check_and_record(&mut self, element: &Element, scope: &NamespaceScope) -> bool {
        self.seen.insert(fingerprint(element, scope))
    }

    /// Returns the number of distinct fingerprints recorded.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
