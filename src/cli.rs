//! CLI: (fetch | local | stdin) → select → dereference → print
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rayon::prelude::*;

use crate::config::{init_tracing, LogLevel, FETCH_TIMEOUT_ENV};
use crate::extract::{Extraction, Selector};
use crate::output::{render, OutputFormat};
use crate::prune::PruneOptions;
use crate::resolve::{ResolveOptions, DEFAULT_MAX_DEPTH};
use crate::source::{self, FetchSettings, RawSpec};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// extract a fully dereferenced piece of an OpenAPI description and print it as JSON or YAML
#[derive(Parser, Debug)]
#[command(name = "apispec", version)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// fetch the API description over HTTP(S)
    Fetch(FetchIn),
    /// read the API description from local files
    Local(LocalIn),
    /// read the API description from stdin
    Stdin(StdinIn),
}

#[derive(Args, Debug, Clone)]
struct ExtractSettings {
    /// jq filter selecting the sub-tree (e.g. '.paths["/pets"].get')
    #[arg(long, short = 'p', required_unless_present = "path", conflicts_with = "path")]
    pattern: Option<String>,

    /// endpoint under `paths` to select (e.g. /pets); the leading slash is optional
    #[arg(long)]
    path: Option<String>,

    /// output format
    #[arg(long, short, value_enum, default_value_t = OutputFormat::Json)]
    output: OutputFormat,

    /// logging level (RUST_LOG overrides it)
    #[arg(long, short = 'l', value_enum, default_value_t = LogLevel::Warn)]
    loglevel: LogLevel,

    /// validate the document as OpenAPI 3.0 before extracting
    #[arg(long, short = 'v', default_value_t = false)]
    validate: bool,

    /// print the selection as-is, without dereferencing `$ref`s
    #[arg(long, default_value_t = false)]
    no_resolve: bool,

    /// also dereference references found inside resolved content
    #[arg(long, default_value_t = false, conflicts_with = "no_resolve")]
    deep: bool,

    /// nesting limit for --deep
    #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
    max_depth: usize,

    /// fail when any reference cannot be resolved
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// drop description, summary and externalDocs
    #[arg(long, default_value_t = false)]
    remove_docs: bool,

    /// drop example and examples
    #[arg(long, default_value_t = false)]
    remove_examples: bool,

    /// drop x-* vendor extensions
    #[arg(long, default_value_t = false)]
    remove_extensions: bool,
}

#[derive(clap::Parser, Debug)]
struct FetchIn {
    /// URL of the API description
    #[arg(long, short)]
    url: String,

    /// accept invalid TLS certificates
    #[arg(long, default_value_t = false)]
    insecure: bool,

    /// HTTP timeout in seconds
    #[arg(long, env = FETCH_TIMEOUT_ENV, default_value_t = source::DEFAULT_FETCH_TIMEOUT.as_secs())]
    timeout: u64,

    #[command(flatten)]
    settings: ExtractSettings,
}

#[derive(clap::Parser, Debug)]
struct LocalIn {
    /// one or more files; literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    file: Vec<String>,

    #[command(flatten)]
    settings: ExtractSettings,
}

#[derive(clap::Parser, Debug)]
struct StdinIn {
    #[command(flatten)]
    settings: ExtractSettings,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl ExtractSettings {
    fn extraction(&self) -> Extraction {
        let selector = match (&self.pattern, &self.path) {
            (Some(pattern), _) => Selector::Query(pattern.clone()),
            (None, Some(path)) => Selector::Endpoint(path.clone()),
            // clap requires one of the two
            (None, None) => Selector::Query(".".into()),
        };
        Extraction {
            selector,
            validate: self.validate,
            resolve: (!self.no_resolve).then_some(ResolveOptions {
                deep: self.deep,
                max_depth: self.max_depth,
            }),
            prune: PruneOptions {
                docs: self.remove_docs,
                examples: self.remove_examples,
                extensions: self.remove_extensions,
            },
            strict: self.strict,
        }
    }

    fn process(&self, raw: &RawSpec) -> anyhow::Result<String> {
        let full = source::parse(raw)?;
        let outcome = self
            .extraction()
            .run(&full)
            .with_context(|| format!("extraction from {} failed", raw.origin))?;
        let text = render(&outcome.value, self.output)?;
        Ok(text)
    }
}

impl FetchIn {
    fn fetch_settings(&self) -> FetchSettings {
        FetchSettings { timeout: Duration::from_secs(self.timeout), insecure: self.insecure }
    }
}

impl Command {
    fn settings(&self) -> &ExtractSettings {
        match self {
            Command::Fetch(target) => &target.settings,
            Command::Local(target) => &target.settings,
            Command::Stdin(target) => &target.settings,
        }
    }
}

/// The single line printed for an error that ends the process, with its cause chain.
pub fn fatal_message(err: &anyhow::Error) -> String {
    format!("error: {err:#}")
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }
    pub fn run(&self) -> anyhow::Result<()> {
        let settings = self.cmd.settings();
        init_tracing(settings.loglevel);

        match &self.cmd {
            Command::Fetch(target) => {
                let raw = source::fetch(&target.url, &target.fetch_settings())?;
                println!("{}", settings.process(&raw)?);
            }
            Command::Local(target) => {
                let paths = source::expand_inputs(&target.file)?;
                let rendered = process_files(&paths, settings)?;
                for (ix, text) in rendered.iter().enumerate() {
                    if ix > 0 && settings.output == OutputFormat::Yaml {
                        println!("---");
                    }
                    println!("{text}");
                }
            }
            Command::Stdin(_) => {
                let raw = source::read_stdin()?;
                println!("{}", settings.process(&raw)?);
            }
        }
        Ok(())
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

/// Files are independent documents; work on them in parallel, report in argument order.
fn process_files(paths: &[PathBuf], settings: &ExtractSettings) -> anyhow::Result<Vec<String>> {
    paths
        .par_iter()
        .map(|path| {
            let raw = source::read_file(path)?;
            settings.process(&raw)
        })
        .collect()
}
