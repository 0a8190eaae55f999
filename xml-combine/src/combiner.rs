//! The combine run: discovery, per-file parse and merge, serialization.
//!
//! A run moves through [`Phase`]s in order. Discovery happens once; each
//! file is then parsed (with bounded retries) and merged in sorted order.
//! A failing file is logged and counted, never fatal. The output is written
//! only if at least one file made it into the combined tree.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, info_span, warn};

use crate::constants::{DEFAULT_MAX_RETRIES, DEFAULT_OUTPUT, DEFAULT_ROOT_ELEMENT};
use crate::discovery::FileDiscovery;
use crate::error::{Error, Result};
use crate::merge::{wrap_roots, MergeMode, MergeReport, MergeState, TreeMerger};
use crate::node::{is_valid_xml_name, Element};
use crate::xml::{FileSource, ParseOutcome, XmlParser, XmlPrinter, XmlPrinterOptions, XmlSource};

/// Settings for one combine run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombineOptions {
    /// Directory to scan for XML files.
    pub input_dir: PathBuf,
    /// Where to write the combined document.
    pub output: PathBuf,
    /// Name of the synthetic root element.
    pub root_element: String,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Schema path; when set, documents must be well-formed single-root XML.
    pub schema: Option<PathBuf>,
    /// Skip subtrees identical to one already merged.
    pub deduplicate: bool,
    /// Structural mode.
    pub mode: MergeMode,
    /// Parse attempts per file. Zero is treated as one.
    pub max_retries: u32,
    /// Indent the output.
    pub pretty: bool,
}

impl Default for CombineOptions {
    fn default() -> Self {
        CombineOptions {
            input_dir: PathBuf::from("."),
            output: PathBuf::from(DEFAULT_OUTPUT),
            root_element: DEFAULT_ROOT_ELEMENT.to_string(),
            recursive: false,
            schema: None,
            deduplicate: false,
            mode: MergeMode::Preserve,
            max_retries: DEFAULT_MAX_RETRIES,
            pretty: false,
        }
    }
}

impl CombineOptions {
    /// Creates options for combining `input_dir` into `output`.
    pub fn new(input_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        CombineOptions {
            input_dir: input_dir.into(),
            output: output.into(),
            ..Default::default()
        }
    }

    /// Sets the root element name.
    pub fn with_root_element(mut self, name: impl Into<String>) -> Self {
        self.root_element = name.into();
        self
    }

    /// Enables or disables recursive discovery.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Sets the schema path.
    pub fn with_schema(mut self, schema: Option<PathBuf>) -> Self {
        self.schema = schema;
        self
    }

    /// Enables or disables deduplication.
    pub fn with_deduplicate(mut self, deduplicate: bool) -> Self {
        self.deduplicate = deduplicate;
        self
    }

    /// Sets the structural mode.
    pub fn with_mode(mut self, mode: MergeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Sets the number of parse attempts per file.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Enables or disables indented output.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started.
    Init,
    /// Checking the input directory and options.
    Validating,
    /// Listing candidate files.
    Discovering,
    /// Parsing and merging files.
    Processing,
    /// Writing the combined document.
    Serializing,
    /// Finished successfully.
    Done,
    /// Stopped on a fatal error.
    Failed,
}

/// Counters for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessingResult {
    /// Files found by discovery.
    pub files_discovered: usize,
    /// Files parsed and merged.
    pub files_processed: usize,
    /// Files that failed validation or parsing.
    pub files_failed: usize,
    /// Nodes appended to the combined root.
    pub elements_merged: usize,
    /// Nodes skipped as duplicates.
    pub duplicates_skipped: usize,
}

impl ProcessingResult {
    /// A run succeeds iff at least one file was processed.
    pub fn is_success(&self) -> bool {
        self.files_processed > 0
    }

    fn record(&mut self, report: MergeReport) {
        self.files_processed += 1;
        self.elements_merged += report.merged;
        self.duplicates_skipped += report.skipped;
    }
}

/// Drives a combine run.
pub struct Combiner {
    options: CombineOptions,
    parser: XmlParser,
    merger: TreeMerger,
    phase: Phase,
    /// Whether the well-formedness check is active for this run.
    check_documents: bool,
}

impl Combiner {
    /// Creates a combiner for the given options.
    pub fn new(options: CombineOptions) -> Self {
        let merger = TreeMerger::new(options.mode, options.deduplicate);
        let check_documents = options.schema.is_some();
        Combiner {
            options,
            parser: XmlParser::new(),
            merger,
            phase: Phase::Init,
            check_documents,
        }
    }

    /// Returns the options.
    pub fn options(&self) -> &CombineOptions {
        &self.options
    }

    /// Returns the current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the whole combine and writes the output file.
    ///
    /// Nothing is written unless at least one file was processed.
    pub fn run(&mut self) -> Result<ProcessingResult> {
        match self.execute() {
            Ok(result) => {
                self.phase = Phase::Done;
                Ok(result)
            }
            Err(e) => {
                self.phase = Phase::Failed;
                Err(e)
            }
        }
    }

    fn execute(&mut self) -> Result<ProcessingResult> {
        self.phase = Phase::Validating;
        self.validate()?;

        self.phase = Phase::Discovering;
        let files = FileDiscovery::new(self.options.recursive).discover(&self.options.input_dir)?;
        info!("Found {} XML files", files.len());
        if files.is_empty() {
            return Err(Error::NoInputFiles(self.options.input_dir.clone()));
        }

        self.phase = Phase::Processing;
        let sources: Vec<FileSource> = files.into_iter().map(FileSource::new).collect();
        let (state, result) = self.combine_sources(&sources);

        info!(
            "Successfully processed {} of {} files",
            result.files_processed, result.files_discovered
        );
        if result.files_failed > 0 {
            warn!("Failed to process {} files", result.files_failed);
        }
        if !result.is_success() {
            return Err(Error::NoFilesProcessed {
                discovered: result.files_discovered,
            });
        }

        self.phase = Phase::Serializing;
        self.write_output(&state)?;
        info!(output = %self.options.output.display(), "Combined XML file saved");
        Ok(result)
    }

    fn validate(&mut self) -> Result<()> {
        let input = &self.options.input_dir;
        if !input.exists() {
            return Err(Error::InvalidInput(format!(
                "input folder does not exist: {}",
                input.display()
            )));
        }
        if !input.is_dir() {
            return Err(Error::InvalidInput(format!(
                "path is not a directory: {}",
                input.display()
            )));
        }
        if !is_valid_xml_name(&self.options.root_element) {
            return Err(Error::InvalidInput(format!(
                "root element name is not a valid XML name: {:?}",
                self.options.root_element
            )));
        }
        if let Some(schema) = &self.options.schema {
            if !schema.exists() {
                warn!(schema = %schema.display(), "Schema file not found; skipping validation");
                self.check_documents = false;
            }
        }
        Ok(())
    }

    /// Parses and merges `sources` in order into fresh state.
    ///
    /// Per-file failures are logged and counted in the result.
    pub fn combine_sources<S: XmlSource>(&self, sources: &[S]) -> (MergeState, ProcessingResult) {
        let mut state = MergeState::new(&self.options.root_element);
        let mut result = ProcessingResult {
            files_discovered: sources.len(),
            ..Default::default()
        };

        for source in sources {
            let _span = info_span!("file", path = %source.path().display()).entered();
            match self.process_source(source, &mut state) {
                Ok(report) => {
                    debug!(merged = report.merged, skipped = report.skipped, "Processed file");
                    result.record(report);
                }
                Err(e) => {
                    error!("{}", e);
                    result.files_failed += 1;
                }
            }
        }
        (state, result)
    }

    /// Validates, parses and merges one source into `state`.
    pub fn process_source(
        &self,
        source: &dyn XmlSource,
        state: &mut MergeState,
    ) -> Result<MergeReport> {
        if self.check_documents {
            self.check_well_formed(source)?;
        }
        let root = self.load(source)?;
        Ok(self.merger.merge(root, source.path(), state))
    }

    /// Reads and parses a source with bounded retries, returning the
    /// effective root to merge.
    pub fn load(&self, source: &dyn XmlSource) -> Result<Element> {
        let attempts = self.options.attempts();
        let mut last_failure = String::new();

        for attempt in 1..=attempts {
            let outcome = match source.read() {
                Ok(bytes) => self.parser.parse(&bytes),
                Err(e) => ParseOutcome::Failure(format!("read failed: {e}")),
            };
            match outcome {
                ParseOutcome::Success(root) => return Ok(root),
                ParseOutcome::MultipleRoots(roots) => {
                    warn!(
                        "File {} has {} root elements, wrapping them",
                        source.path().display(),
                        roots.len()
                    );
                    return Ok(wrap_roots(&self.options.root_element, roots));
                }
                ParseOutcome::Failure(reason) => {
                    if attempt < attempts {
                        warn!(
                            attempt,
                            max_attempts = attempts,
                            "Parse error in {}: {}",
                            source.path().display(),
                            reason
                        );
                    }
                    last_failure = reason;
                }
            }
        }

        Err(Error::Parse {
            path: source.path().to_path_buf(),
            attempts,
            message: last_failure,
        })
    }

    fn check_well_formed(&self, source: &dyn XmlSource) -> Result<()> {
        let checked = source
            .read()
            .map_err(Error::from)
            .and_then(|bytes| self.parser.check_well_formed(&bytes));
        match checked {
            Ok(()) => {
                debug!("Validated {}", source.path().display());
                Ok(())
            }
            Err(e) => Err(Error::ValidationFailed {
                path: source.path().to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    fn write_output(&self, state: &MergeState) -> Result<()> {
        let path = &self.options.output;
        let write_error = |source| Error::Write {
            path: path.clone(),
            source,
        };

        if let Some(parent) = non_empty_parent(path) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        let file = File::create(path).map_err(write_error)?;
        let options = XmlPrinterOptions {
            pretty_print: self.options.pretty,
        };
        XmlPrinter::with_options(BufWriter::new(file), options)
            .print_document(state.tree.root(), &state.namespaces.declarations())
            .map_err(write_error)
    }
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// A source that fails to deliver valid XML a fixed number of times.
    struct FlakySource {
        path: PathBuf,
        failures_left: Cell<u32>,
        reads: Cell<u32>,
        content: &'static str,
    }

    impl FlakySource {
        fn new(failures: u32, content: &'static str) -> Self {
            FlakySource {
                path: PathBuf::from("flaky.xml"),
                failures_left: Cell::new(failures),
                reads: Cell::new(0),
                content,
            }
        }
    }

    impl XmlSource for FlakySource {
        fn path(&self) -> &Path {
            &self.path
        }

        fn read(&self) -> std::io::Result<Vec<u8>> {
            self.reads.set(self.reads.get() + 1);
            let left = self.failures_left.get();
            if left > 0 {
                self.failures_left.set(left - 1);
                // Truncated read
                return Ok(b"<doc><unfinished".to_vec());
            }
            Ok(self.content.as_bytes().to_vec())
        }
    }

    struct MemorySource {
        path: PathBuf,
        content: &'static str,
    }

    impl XmlSource for MemorySource {
        fn path(&self) -> &Path {
            &self.path
        }

        fn read(&self) -> std::io::Result<Vec<u8>> {
            Ok(self.content.as_bytes().to_vec())
        }
    }

    fn memory(name: &str, content: &'static str) -> MemorySource {
        MemorySource {
            path: PathBuf::from(name),
            content,
        }
    }

    #[test]
    fn test_transient_failure_recovers_within_retries() {
        let combiner = Combiner::new(CombineOptions::default().with_max_retries(3));
        let source = FlakySource::new(2, "<doc><a/></doc>");

        let root = combiner.load(&source).unwrap();
        assert_eq!(root.tag(), "doc");
        assert_eq!(source.reads.get(), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let combiner = Combiner::new(CombineOptions::default().with_max_retries(3));
        let source = FlakySource::new(5, "<doc/>");

        match combiner.load(&source) {
            Err(Error::Parse { attempts, path, .. }) => {
                assert_eq!(attempts, 3);
                assert_eq!(path, PathBuf::from("flaky.xml"));
            }
            other => panic!("Expected parse failure, got {:?}", other),
        }
        assert_eq!(source.reads.get(), 3);
    }

    #[test]
    fn test_zero_retries_still_attempts_once() {
        let combiner = Combiner::new(CombineOptions::default().with_max_retries(0));
        let source = FlakySource::new(0, "<doc/>");

        assert!(combiner.load(&source).is_ok());
        assert_eq!(source.reads.get(), 1);
    }

    #[test]
    fn test_multi_root_file_is_wrapped() {
        let combiner = Combiner::new(CombineOptions::default().with_root_element("all"));
        let root = combiner
            .load(&memory("log.xml", "<e n=\"1\"/><e n=\"2\"/>"))
            .unwrap();

        assert_eq!(root.tag(), "all_wrapper");
        assert_eq!(root.child_count(), 2);
    }

    #[test]
    fn test_failure_isolation() {
        let combiner = Combiner::new(CombineOptions::default().with_max_retries(2));
        let sources = vec![
            memory("a.xml", "<a><x/></a>"),
            memory("b.xml", "<b><broken></b>"),
            memory("c.xml", "<c><y/></c>"),
        ];

        let (state, result) = combiner.combine_sources(&sources);
        assert_eq!(
            result,
            ProcessingResult {
                files_discovered: 3,
                files_processed: 2,
                files_failed: 1,
                elements_merged: 2,
                duplicates_skipped: 0,
            }
        );
        let tags: Vec<&str> = state.tree.root().children().iter().map(Element::tag).collect();
        assert_eq!(tags, vec!["a", "c"]);
    }

    #[test]
    fn test_validation_rejects_multi_root_without_retry() {
        let dir = tempfile::tempdir().unwrap();
        let schema = dir.path().join("schema.xsd");
        fs::write(&schema, "<xs:schema/>").unwrap();

        let mut combiner = Combiner::new(
            CombineOptions::new(dir.path(), dir.path().join("out.xml"))
                .with_schema(Some(schema)),
        );
        combiner.validate().unwrap();

        let mut state = MergeState::new("combined");
        let err = combiner
            .process_source(&memory("multi.xml", "<a/><b/>"), &mut state)
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailed { .. }));
        assert!(combiner
            .process_source(&memory("ok.xml", "<a/>"), &mut state)
            .is_ok());
    }

    #[test]
    fn test_missing_schema_disables_validation() {
        let dir = tempfile::tempdir().unwrap();
        let mut combiner = Combiner::new(
            CombineOptions::new(dir.path(), dir.path().join("out.xml"))
                .with_schema(Some(dir.path().join("missing.xsd"))),
        );
        combiner.validate().unwrap();

        let mut state = MergeState::new("combined");
        assert!(combiner
            .process_source(&memory("multi.xml", "<a/><b/>"), &mut state)
            .is_ok());
    }

    #[test]
    fn test_invalid_root_element_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut combiner = Combiner::new(
            CombineOptions::new(dir.path(), dir.path().join("out.xml"))
                .with_root_element("not valid"),
        );

        assert!(matches!(combiner.run(), Err(Error::InvalidInput(_))));
        assert_eq!(combiner.phase(), Phase::Failed);
    }

    #[test]
    fn test_options_builder() {
        let options = CombineOptions::new("in", "out/all.xml")
            .with_root_element("records")
            .with_recursive(true)
            .with_deduplicate(true)
            .with_mode(MergeMode::Flatten)
            .with_max_retries(5)
            .with_pretty(true);

        assert_eq!(options.input_dir, PathBuf::from("in"));
        assert_eq!(options.output, PathBuf::from("out/all.xml"));
        assert_eq!(options.root_element, "records");
        assert!(options.recursive && options.deduplicate && options.pretty);
        assert_eq!(options.mode, MergeMode::Flatten);
        assert_eq!(options.max_retries, 5);
        assert_eq!(CombineOptions::default().root_element, "combined");
        assert_eq!(CombineOptions::default().max_retries, 3);
    }

    #[test]
    fn test_non_empty_parent() {
        assert_eq!(non_empty_parent(Path::new("out.xml")), None);
        assert_eq!(
            non_empty_parent(Path::new("a/b/out.xml")),
            Some(Path::new("a/b"))
        );
    }
}
