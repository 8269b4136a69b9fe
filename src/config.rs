use crate::DEFAULT_CONTENT_TYPE;
use crate::loader::LoadOptions;
use crate::sample::SampleOptions;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_TYPE_MAX_DEPTH: usize = 10;

/// Plain values threaded into the spec service at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerConfig {
    pub cache_ttl: Duration,
    /// Content type preferred when a body offers several.
    pub default_content_type: String,
    pub sample: SampleOptions,
    pub type_max_depth: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        ExplorerConfig {
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            default_content_type: DEFAULT_CONTENT_TYPE.to_string(),
            sample: SampleOptions::default(),
            type_max_depth: DEFAULT_TYPE_MAX_DEPTH,
        }
    }
}

impl ExplorerConfig {
    pub fn from_args(args: &CliArgs) -> Self {
        let defaults = ExplorerConfig::default();
        let default_content_type = args
            .content_type
            .as_deref()
            .map(str::trim)
            .filter(|content_type| !content_type.is_empty())
            .map(str::to_owned)
            .unwrap_or(defaults.default_content_type);
        ExplorerConfig {
            cache_ttl: args
                .cache_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            default_content_type,
            ..defaults
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "oas-explorer",
    about = "Explore an OpenAPI 2.0 / 3.x specification through tool calls",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "PATH",
        help = "Specification file (JSON or YAML) to load before running the command",
        conflicts_with = "url",
        global = true
    )]
    pub file: Option<PathBuf>,

    #[arg(
        long,
        value_name = "URL",
        help = "Specification URL to load before running the command",
        global = true
    )]
    pub url: Option<String>,

    #[arg(
        long,
        env = "OAS_EXPLORER_CACHE_TTL",
        value_name = "SECS",
        help = "Seconds a loaded specification stays cached",
        value_parser = clap::value_parser!(u64)
    )]
    pub cache_ttl_secs: Option<u64>,

    #[arg(
        long,
        env = "OAS_EXPLORER_CONTENT_TYPE",
        value_name = "MIME",
        help = "Preferred content type for request and response bodies"
    )]
    pub content_type: Option<String>,

    #[arg(
        long,
        env = "RUST_LOG",
        value_name = "FILTER",
        default_value = "info",
        help = "Log filter directive, e.g. debug or oas_explorer=trace"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl CliArgs {
    /// The spec to load up front, if `--file` or `--url` was given.
    pub fn load_options(&self) -> Option<LoadOptions> {
        match (&self.file, &self.url) {
            (Some(file), _) => Some(LoadOptions::file(file.display().to_string())),
            (None, Some(url)) => Some(LoadOptions::url(url.clone())),
            (None, None) => None,
        }
    }
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the available tools.
    Tools,
    /// Invoke one tool and print its response envelope.
    Call {
        tool: String,
        #[arg(long, value_name = "JSON", default_value = "{}")]
        args: String,
    },
}
