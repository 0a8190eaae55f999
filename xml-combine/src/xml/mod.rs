//! XML parsing and output.
//!
//! Parsing reads through the [`XmlSource`] trait so the combiner can be
//! driven from files in production and from memory in tests. Output goes to
//! any `std::io::Write` through [`XmlPrinter`].

mod parser;
mod printer;

pub use parser::{count_top_level_elements, parse_str, ParseOutcome, ParsedDocument, XmlParser};
pub use printer::{print_to_string, print_to_string_pretty, XmlPrinter, XmlPrinterOptions};

use std::path::{Path, PathBuf};

/// Something that can supply the bytes of one XML document.
///
/// Every call to [`read`](XmlSource::read) must return the document afresh;
/// each parse attempt starts from a new read.
pub trait XmlSource {
    /// Path used to identify the source in logs and errors.
    fn path(&self) -> &Path;

    /// Reads the full document.
    fn read(&self) -> std::io::Result<Vec<u8>>;
}

/// An XML document stored in a file.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Creates a source reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileSource { path: path.into() }
    }
}

impl XmlSource for FileSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> std::io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}
