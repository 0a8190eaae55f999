//! Command-line front end for xml-combine.
//!
//! Collects every `.xml` file of a directory into one document.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;
use xml_combine::{
    CombineOptions, Combiner, MergeMode, ProcessingResult, DEFAULT_MAX_RETRIES, DEFAULT_OUTPUT,
    DEFAULT_ROOT_ELEMENT,
};

/// Combine the XML files of a directory into a single XML document
#[derive(Parser, Debug)]
#[command(name = "combine")]
#[command(version)]
#[command(about = "Combine the XML files of a directory into one document", long_about = None)]
struct Cli {
    /// Directory containing the XML files
    input_folder: PathBuf,

    /// Output file
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Name of the root element of the combined document
    #[arg(short, long, default_value = DEFAULT_ROOT_ELEMENT)]
    root_element: String,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Search subdirectories as well
    #[arg(long)]
    recursive: bool,

    /// Check that each file is well-formed before merging it
    #[arg(long, value_name = "PATH")]
    validate_schema: Option<PathBuf>,

    /// Skip elements identical to one already merged
    #[arg(long)]
    deduplicate: bool,

    /// Merge the children of each document's root instead of the root itself
    #[arg(long)]
    flatten: bool,

    /// Parse attempts per file (0 is treated as 1)
    #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
    max_retries: u32,

    /// Indent the output
    #[arg(long)]
    pretty: bool,
}

impl Cli {
    fn into_options(self) -> CombineOptions {
        let mode = if self.flatten {
            MergeMode::Flatten
        } else {
            MergeMode::Preserve
        };
        CombineOptions::new(self.input_folder, self.output)
            .with_root_element(self.root_element)
            .with_recursive(self.recursive)
            .with_schema(self.validate_schema)
            .with_deduplicate(self.deduplicate)
            .with_mode(mode)
            .with_max_retries(self.max_retries)
            .with_pretty(self.pretty)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Installs the stderr log subscriber.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<ProcessingResult> {
    let options = cli.into_options();
    let input = options.input_dir.clone();
    Combiner::new(options)
        .run()
        .with_context(|| format!("Failed to combine {}", input.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["combine", "data"]).unwrap();
        let options = cli.into_options();

        assert_eq!(options.input_dir, PathBuf::from("data"));
        assert_eq!(options.output, PathBuf::from("combined.xml"));
        assert_eq!(options.root_element, "combined");
        assert_eq!(options.mode, MergeMode::Preserve);
        assert_eq!(options.max_retries, 3);
        assert!(!options.recursive && !options.deduplicate && !options.pretty);
        assert_eq!(options.schema, None);
    }

    #[test]
    fn test_all_flags() {
        let cli = Cli::try_parse_from([
            "combine",
            "data",
            "-o",
            "out/all.xml",
            "-r",
            "records",
            "-v",
            "--recursive",
            "--validate-schema",
            "schema.xsd",
            "--deduplicate",
            "--flatten",
            "--max-retries",
            "5",
            "--pretty",
        ])
        .unwrap();
        assert!(cli.verbose);
        let options = cli.into_options();

        assert_eq!(options.output, PathBuf::from("out/all.xml"));
        assert_eq!(options.root_element, "records");
        assert!(options.recursive && options.deduplicate && options.pretty);
        assert_eq!(options.schema, Some(PathBuf::from("schema.xsd")));
        assert_eq!(options.mode, MergeMode::Flatten);
        assert_eq!(options.max_retries, 5);
    }

    #[test]
    fn test_long_forms() {
        let cli = Cli::try_parse_from([
            "combine",
            "data",
            "--output",
            "x.xml",
            "--root-element",
            "r",
            "--verbose",
        ])
        .unwrap();

        assert!(cli.verbose);
        assert_eq!(cli.output, PathBuf::from("x.xml"));
        assert_eq!(cli.root_element, "r");
    }

    #[test]
    fn test_input_folder_is_required() {
        assert!(Cli::try_parse_from(["combine"]).is_err());
    }

    #[test]
    fn test_max_retries_help_mentions_zero() {
        use clap::CommandFactory;

        let help = Cli::command().render_help().to_string();
        assert!(help.contains("0 is treated as 1"));

        let cli = Cli::try_parse_from(["combine", "data", "--max-retries", "0"]).unwrap();
        assert_eq!(cli.into_options().max_retries, 0);
    }

    #[test]
    fn test_max_retries_must_be_a_number() {
        assert!(Cli::try_parse_from(["combine", "data", "--max-retries", "many"]).is_err());
    }

    #[test]
    fn test_run_reports_missing_folder() {
        let dir = std::env::temp_dir().join("combine-cli-test-missing-folder");
        let cli = Cli::try_parse_from(["combine", dir.to_str().unwrap()]).unwrap();

        let err = run(cli).unwrap_err();
        assert!(format!("{err:#}").contains("does not exist"));
    }
}
