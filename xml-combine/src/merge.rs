//! Merging parsed documents into the combined tree.
//!
//! # Modes
//!
//! - [`MergeMode::Preserve`] appends each document's effective root as one
//!   child of the combined root.
//! - [`MergeMode::Flatten`] appends only the direct children of the
//!   effective root and discards the root itself.
//!
//! Prefixed namespace declarations anywhere in the document are moved into
//! the [`NamespaceRegistry`], so they end up declared once on the combined
//! root. Default namespace declarations stay on the element that makes
//! them, so unprefixed content from other documents keeps no namespace.
//! When flattening discards a root that declares a default namespace, each
//! kept child declares it instead.

use std::path::Path;

use tracing::debug;

use crate::constants::WRAPPER_SUFFIX;
use crate::dedup::DuplicateDetector;
use crate::node::{Element, NamespaceScope};
use crate::registry::NamespaceRegistry;

/// How parsed documents are laid out under the combined root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeMode {
    /// Keep each document's root and its full subtree.
    #[default]
    Preserve,
    /// Keep only the direct children of each document's root.
    Flatten,
}

/// The output document being assembled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedTree {
    root: Element,
}

impl CombinedTree {
    /// Creates an empty tree with a root named `root_name`.
    pub fn new(root_name: &str) -> Self {
        CombinedTree {
            root: Element::new(root_name),
        }
    }

    /// Returns the root element.
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Returns the number of direct children of the root.
    pub fn len(&self) -> usize {
        self.root.child_count()
    }

    /// Returns true if nothing was merged yet.
    pub fn is_empty(&self) -> bool {
        self.root.child_count() == 0
    }

    /// Appends a node under the root.
    pub fn append(&mut self, node: Element) {
        self.root.push_child(node);
    }
}

/// Cross-file state of one run.
#[derive(Debug, Clone)]
pub struct MergeState {
    /// The combined output tree.
    pub tree: CombinedTree,
    /// Namespace bindings to declare on the root.
    pub namespaces: NamespaceRegistry,
    /// Fingerprints of merged nodes, consulted when deduplicating.
    pub duplicates: DuplicateDetector,
}

impl MergeState {
    /// Creates empty state for a combined root named `root_name`.
    pub fn new(root_name: &str) -> Self {
        MergeState {
            tree: CombinedTree::new(root_name),
            namespaces: NamespaceRegistry::new(),
            duplicates: DuplicateDetector::new(),
        }
    }
}

/// What merging one document did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    /// Nodes appended to the combined root.
    pub merged: usize,
    /// Nodes skipped as duplicates.
    pub skipped: usize,
}

/// Appends parsed documents to a [`MergeState`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeMerger {
    mode: MergeMode,
    deduplicate: bool,
}

impl TreeMerger {
    /// Creates a merger for the given mode.
    pub fn new(mode: MergeMode, deduplicate: bool) -> Self {
        TreeMerger { mode, deduplicate }
    }

    /// Merges one document's effective root into `state`.
    ///
    /// `origin` names the source document in log messages.
    pub fn merge(&self, root: Element, origin: &Path, state: &mut MergeState) -> MergeReport {
        state.namespaces.register_element(&root, origin);

        // Bindings the candidates inherit from the document
        let (candidates, scope) = match self.mode {
            MergeMode::Preserve => (vec![root], NamespaceScope::new()),
            MergeMode::Flatten => {
                let scope = NamespaceScope::new().enter(&root).into_owned();
                let default_ns = root
                    .default_namespace()
                    .filter(|uri| !uri.is_empty())
                    .map(str::to_string);
                let mut children = root.into_children();
                if let Some(uri) = default_ns {
                    for child in &mut children {
                        child.inherit_default_namespace(&uri);
                    }
                }
                (children, scope)
            }
        };

        let mut report = MergeReport::default();
        for mut node in candidates {
            if self.deduplicate && !state.duplicates.check_and_record(&node, &scope) {
                debug!(tag = node.tag(), file = %origin.display(), "Skipping duplicate element");
                report.skipped += 1;
                continue;
            }
            node.strip_prefixed_namespace_decls();
            // The tail belonged to the discarded parent
            node.set_tail(None);
            state.tree.append(node);
            report.merged += 1;
        }
        report
    }
}

/// Wraps the top-level elements of a multi-root document in a synthetic
/// `{root_name}_wrapper` element.
pub fn wrap_roots(root_name: &str, roots: Vec<Element>) -> Element {
    let mut wrapper = Element::new(format!("{root_name}{WRAPPER_SUFFIX}"));
    for mut root in roots {
        root.set_tail(None);
        wrapper.push_child(root);
    }
    wrapper
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_str;

    fn origin() -> &'static Path {
        Path::new("test.xml")
    }

    fn doc(xml: &str) -> Element {
        parse_str(xml).unwrap()
    }

    fn child_tags(state: &MergeState) -> Vec<String> {
        state
            .tree
            .root()
            .children()
            .iter()
            .map(|c| c.tag().to_string())
            .collect()
    }

    #[test]
    fn test_preserve_appends_whole_root() {
        let merger = TreeMerger::new(MergeMode::Preserve, false);
        let mut state = MergeState::new("combined");

        let report = merger.merge(doc("<a><x/><y/></a>"), origin(), &mut state);
        merger.merge(doc("<b><x/><y/></b>"), origin(), &mut state);

        assert_eq!(report, MergeReport { merged: 1, skipped: 0 });
        assert_eq!(child_tags(&state), vec!["a", "b"]);
        assert!(state.tree.root().children().iter().all(|c| c.child_count() == 2));
    }

    #[test]
    fn test_flatten_appends_children_only() {
        let merger = TreeMerger::new(MergeMode::Flatten, false);
        let mut state = MergeState::new("combined");

        let report = merger.merge(doc("<a><x/><y/></a>"), origin(), &mut state);
        merger.merge(doc("<b><z/><w/></b>"), origin(), &mut state);

        assert_eq!(report.merged, 2);
        assert_eq!(child_tags(&state), vec!["x", "y", "z", "w"]);
    }

    #[test]
    fn test_flatten_drops_root_text_and_tails() {
        let merger = TreeMerger::new(MergeMode::Flatten, false);
        let mut state = MergeState::new("combined");
        merger.merge(doc("<a>lead<x/>between<y/>end</a>"), origin(), &mut state);

        assert!(state.tree.root().children().iter().all(|c| c.tail().is_none()));
        assert_eq!(state.tree.root().text(), None);
    }

    #[test]
    fn test_dedup_preserve_mode() {
        let merger = TreeMerger::new(MergeMode::Preserve, true);
        let mut state = MergeState::new("combined");

        merger.merge(doc(r#"<a k="1"><x>t</x></a>"#), origin(), &mut state);
        let report = merger.merge(doc(r#"<a k="1"><x>t</x></a>"#), origin(), &mut state);
        merger.merge(doc(r#"<a k="2"><x>t</x></a>"#), origin(), &mut state);

        assert_eq!(report, MergeReport { merged: 0, skipped: 1 });
        assert_eq!(state.tree.len(), 2);
    }

    #[test]
    fn test_dedup_flatten_mode_checks_each_child() {
        let merger = TreeMerger::new(MergeMode::Flatten, true);
        let mut state = MergeState::new("combined");

        merger.merge(doc("<a><r>1</r><r>2</r></a>"), origin(), &mut state);
        let report = merger.merge(doc("<b><r>2</r><r>3</r><r>3</r></b>"), origin(), &mut state);

        assert_eq!(report, MergeReport { merged: 1, skipped: 2 });
        let texts: Vec<_> = state
            .tree
            .root()
            .children()
            .iter()
            .map(|c| c.text().unwrap_or_default().to_string())
            .collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_without_dedup_duplicates_are_kept() {
        let merger = TreeMerger::new(MergeMode::Preserve, false);
        let mut state = MergeState::new("combined");
        merger.merge(doc("<a/>"), origin(), &mut state);
        merger.merge(doc("<a/>"), origin(), &mut state);

        assert_eq!(state.tree.len(), 2);
        assert!(state.duplicates.is_empty());
    }

    #[test]
    fn test_namespaces_move_to_registry() {
        let merger = TreeMerger::new(MergeMode::Flatten, true);
        let mut state = MergeState::new("combined");

        merger.merge(
            doc(r#"<ns1:a xmlns:ns1="urn:one"><ns1:x xmlns:ns2="urn:two"/></ns1:a>"#),
            origin(),
            &mut state,
        );
        // Duplicate child is skipped but its document's bindings still count
        merger.merge(
            doc(r#"<b xmlns:ns3="urn:three" xmlns:ns1="urn:one"><ns1:x/></b>"#),
            origin(),
            &mut state,
        );

        assert_eq!(state.namespaces.uri("ns1"), Some("urn:one"));
        assert_eq!(state.namespaces.uri("ns2"), Some("urn:two"));
        assert_eq!(state.namespaces.uri("ns3"), Some("urn:three"));
        assert_eq!(state.tree.len(), 1);
        assert!(state
            .tree
            .root()
            .descendants()
            .all(|e| e.namespace_decls().next().is_none()));
    }

    #[test]
    fn test_default_namespace_stays_on_declaring_element() {
        let merger = TreeMerger::new(MergeMode::Preserve, false);
        let mut state = MergeState::new("combined");
        merger.merge(doc(r#"<a xmlns="urn:a"><x/></a>"#), origin(), &mut state);
        merger.merge(doc("<b><y/></b>"), origin(), &mut state);

        assert!(state.namespaces.is_empty());
        let root = state.tree.root();
        assert_eq!(root.default_namespace(), None);
        assert_eq!(root.children()[0].default_namespace(), Some("urn:a"));
        assert_eq!(root.children()[1].default_namespace(), None);
    }

    #[test]
    fn test_flatten_pushes_default_namespace_to_children() {
        let merger = TreeMerger::new(MergeMode::Flatten, false);
        let mut state = MergeState::new("combined");
        merger.merge(
            doc(r#"<a xmlns="urn:a"><x/><y xmlns="urn:y"/></a>"#),
            origin(),
            &mut state,
        );
        merger.merge(doc("<b><z/></b>"), origin(), &mut state);

        let children = state.tree.root().children();
        assert_eq!(children[0].default_namespace(), Some("urn:a"));
        assert_eq!(children[1].default_namespace(), Some("urn:y"));
        assert_eq!(children[2].default_namespace(), None);
    }

    #[test]
    fn test_dedup_distinguishes_namespaces() {
        let merger = TreeMerger::new(MergeMode::Flatten, true);
        let mut state = MergeState::new("combined");
        merger.merge(doc(r#"<r xmlns:p="urn:p"><p:a/></r>"#), origin(), &mut state);
        let other = merger.merge(doc(r#"<r xmlns:p="urn:q"><p:a/></r>"#), origin(), &mut state);
        let same = merger.merge(
            doc(r#"<s><p:a xmlns:p="urn:p"/></s>"#),
            origin(),
            &mut state,
        );

        assert_eq!(other, MergeReport { merged: 1, skipped: 0 });
        assert_eq!(same, MergeReport { merged: 0, skipped: 1 });
    }

    #[test]
    fn test_wrap_roots() {
        let wrapper = wrap_roots("combined", vec![doc("<r1/>"), doc("<r2/>")]);
        assert_eq!(wrapper.tag(), "combined_wrapper");
        let tags: Vec<&str> = wrapper.children().iter().map(Element::tag).collect();
        assert_eq!(tags, vec!["r1", "r2"]);
    }
}
