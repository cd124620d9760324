// CLI subcommand dispatch and shared wiring.

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use termlight_engine::cache::store::SqliteStore;
use termlight_engine::config::EngineConfig;
use termlight_engine::revalidate::{RevalidateOutcome, RevalidationOrchestrator};
use termlight_engine::service::HttpTermService;
use termlight_engine::startup;

use crate::output::{self, OutputFormat};

pub mod annotate;
pub mod cache;
pub mod config;
pub mod lookup;
pub mod refresh;
pub mod terms;

#[derive(Subcommand)]
pub enum Command {
    /// Annotate known terms in a markdown file and print HTML
    Annotate(annotate::AnnotateArgs),
    /// List, add, edit or remove terms on the term service
    Terms(terms::TermsArgs),
    /// Refetch the term list and update the local cache
    Refresh(refresh::RefreshArgs),
    /// Inspect or clear the local term cache
    Cache(cache::CacheArgs),
    /// Resolve a word through the cached term index
    Lookup(lookup::LookupArgs),
    /// Show or initialize the configuration file
    Config(config::ConfigArgs),
}

pub fn run(cmd: Command, config_path: Option<&Path>) -> Result<()> {
    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(error) => {
            output::print_anyhow_error(OutputFormat::Human, &error);
            return Err(error);
        }
    };

    match cmd {
        Command::Annotate(args) => annotate::run(args, &config),
        Command::Terms(args) => terms::run(args, &config),
        Command::Refresh(args) => refresh::run(args, &config),
        Command::Cache(args) => cache::run(args, &config),
        Command::Lookup(args) => lookup::run(args, &config),
        Command::Config(args) => config::run(args, &config, config_path),
    }
}

/// An explicit `--config` must exist; the default location falls back to
/// built-in defaults.
fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(EngineConfig::load()),
    }
}

pub(crate) type LiveOrchestrator = RevalidationOrchestrator<HttpTermService, SqliteStore>;

pub(crate) fn open_orchestrator(config: &EngineConfig) -> Result<LiveOrchestrator> {
    let service = startup::connect_service(&config.service)?;
    let cache = startup::open_cache(&config.cache)?;
    Ok(RevalidationOrchestrator::new(service, cache))
}

/// Drive one async command body on a current-thread runtime.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    Ok(runtime.block_on(future))
}

/// Print `result`'s error in `format` and hand the result back.
pub(crate) fn report<T>(format: OutputFormat, result: Result<T>) -> Result<T> {
    if let Err(error) = &result {
        output::print_anyhow_error(format, error);
    }
    result
}

/// Serializable view of a revalidation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Revalidation {
    Skipped,
    Unchanged,
    Refreshed { terms: usize },
    Failed { message: String },
}

impl From<&RevalidateOutcome> for Revalidation {
    fn from(outcome: &RevalidateOutcome) -> Self {
        match outcome {
            RevalidateOutcome::Unchanged => Self::Unchanged,
            RevalidateOutcome::Refreshed { terms } => Self::Refreshed { terms: *terms },
            RevalidateOutcome::Failed(error) => Self::Failed { message: error.to_string() },
        }
    }
}

impl Revalidation {
    pub fn describe(&self) -> String {
        match self {
            Self::Skipped => "revalidation skipped (offline)".into(),
            Self::Unchanged => "term list unchanged".into(),
            Self::Refreshed { terms } => format!("term list refreshed ({terms} term(s))"),
            Self::Failed { message } => format!("revalidation failed: {message}"),
        }
    }
}
