//! Node structures for XML tree representation.
//!
//! Parsed documents and the combined output are plain owned trees of
//! [`Element`]s. Each element owns its children exclusively; merging moves
//! subtrees rather than sharing them.

mod element;
pub mod namespace;

pub use element::{Descendants, Element};
pub use namespace::{
    declaration_attr, declared_prefix, is_valid_xml_name, is_xmlns_attr, split_qname, NamespaceScope,
};
