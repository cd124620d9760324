// `termlight cache`: inspect or clear the local term cache.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use serde::Serialize;
use termlight_engine::cache::{CacheEntry, CACHE_KEY};
use termlight_engine::config::EngineConfig;
use termlight_engine::startup;

use super::report;
use crate::exit_code::NotFoundError;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    action: CacheAction,

    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Show the cached term list and its age
    Show,
    /// Remove the cached term list
    Clear,
}

#[derive(Debug, Serialize)]
pub struct CacheSummary {
    pub key: &'static str,
    pub fetched_at: DateTime<Utc>,
    pub age_sec: u64,
    pub ttl_sec: u64,
    pub fresh: bool,
    pub entry: CacheEntry,
}

impl CacheSummary {
    fn new(entry: CacheEntry, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            key: CACHE_KEY,
            fetched_at: entry.fetched_at,
            age_sec: entry.age_at(now).as_secs(),
            ttl_sec: ttl.as_secs(),
            fresh: entry.is_fresh_at(ttl, now),
            entry,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Cleared {
    pub key: &'static str,
    pub cleared: bool,
}

pub fn run(args: CacheArgs, config: &EngineConfig) -> Result<()> {
    let format = OutputFormat::detect(args.json);
    match args.action {
        CacheAction::Show => {
            let summary = report(format, show(config))?;
            output::print_output(format, &summary, format_summary)?;
        }
        CacheAction::Clear => {
            report(format, clear(config))?;
            let cleared = Cleared { key: CACHE_KEY, cleared: true };
            output::print_output(format, &cleared, |_| "Term cache cleared.".to_string())?;
        }
    }
    Ok(())
}

fn show(config: &EngineConfig) -> Result<CacheSummary> {
    let cache = startup::open_cache(&config.cache)?;
    let entry = cache
        .entry()
        .context("failed to read term cache")?
        .ok_or_else(|| NotFoundError("term cache is empty. Run: termlight refresh".into()))?;
    Ok(CacheSummary::new(entry, config.cache.ttl(), Utc::now()))
}

fn clear(config: &EngineConfig) -> Result<()> {
    let cache = startup::open_cache(&config.cache)?;
    cache.clear().context("failed to clear term cache")
}

fn format_summary(summary: &CacheSummary) -> String {
    let freshness = if summary.fresh { "fresh" } else { "stale" };
    let mut lines = vec![format!(
        "{} term(s), fetched {} ({}s ago, {freshness}; ttl {}s)",
        summary.entry.data.len(),
        summary.fetched_at.to_rfc3339(),
        summary.age_sec,
        summary.ttl_sec,
    )];
    for term in &summary.entry.data {
        lines.push(format!("  {}  {} → {}", term.id, term.original, term.translated));
    }
    lines.join("\n")
}
