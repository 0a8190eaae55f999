//! Discovery of candidate XML files.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::constants::XML_SUFFIX;
use crate::error::{Error, Result};

/// Finds `.xml` files under a directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileDiscovery {
    recursive: bool,
}

impl FileDiscovery {
    /// Creates a discovery that optionally descends into subdirectories.
    pub fn new(recursive: bool) -> Self {
        FileDiscovery { recursive }
    }

    /// Returns the sorted list of XML files under `root`.
    ///
    /// Symlinked files are included; symlinked directories are not entered.
    /// Unreadable entries are logged and skipped.
    pub fn discover(&self, root: &Path) -> Result<Vec<PathBuf>> {
        if !root.is_dir() {
            return Err(Error::NotADirectory(root.to_path_buf()));
        }

        let max_depth = if self.recursive { usize::MAX } else { 1 };
        let walker = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(false);

        let mut files = Vec::new();
        for entry in walker {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if is_xml_file(path) && path.is_file() {
                        files.push(path.to_path_buf());
                    }
                }
                Err(e) => {
                    warn!("Error accessing entry: {}", e);
                }
            }
        }

        files.sort();
        debug!(
            root = %root.display(),
            recursive = self.recursive,
            count = files.len(),
            "discovery complete"
        );
        Ok(files)
    }
}

/// Returns true if the file name ends in `.xml`, ignoring case.
pub fn is_xml_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.to_lowercase().ends_with(XML_SUFFIX))
}
