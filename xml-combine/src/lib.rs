//! xml-combine - merge a directory of XML documents into one
//!
//! This library collects the `.xml` files of a directory and appends their
//! content under a single synthetic root element.
//!
//! # Overview
//!
//! A run discovers files in sorted order, parses each one, and merges the
//! result into one in-memory tree that is written out at the end. Along the
//! way it:
//!
//! - tolerates files with several top-level elements by wrapping them
//! - retries parsing a bounded number of times and isolates failing files
//! - optionally skips subtrees identical to one already merged
//! - declares every namespace prefix used by merged content once, on the root
//!
//! # Example
//!
//! ```no_run
//! use xml_combine::{CombineOptions, Combiner, MergeMode};
//!
//! let options = CombineOptions::new("data/", "combined.xml")
//!     .with_deduplicate(true)
//!     .with_mode(MergeMode::Flatten);
//! let result = Combiner::new(options).run()?;
//! println!("merged {} files", result.files_processed);
//! # Ok::<(), xml_combine::Error>(())
//! ```

pub mod combiner;
pub mod constants;
pub mod dedup;
pub mod discovery;
pub mod error;
pub mod merge;
pub mod node;
pub mod registry;
pub mod xml;

// Re-export commonly used types
pub use combiner::{CombineOptions, Combiner, Phase, ProcessingResult};
pub use constants::*;
pub use dedup::{fingerprint, DuplicateDetector, FingerprintSet};
pub use discovery::{is_xml_file, FileDiscovery};
pub use error::{Error, Result};
pub use merge::{wrap_roots, CombinedTree, MergeMode, MergeReport, MergeState, TreeMerger};
pub use node::{Element, NamespaceScope};
pub use registry::{NamespaceRegistry, Registration};
pub use xml::{
    count_top_level_elements, parse_str, FileSource, ParseOutcome, ParsedDocument, XmlParser,
    XmlPrinter, XmlPrinterOptions, XmlSource,
};
