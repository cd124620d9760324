// `termlight terms`: manage terms on the term service.
//
// Every mutation refetches the list afterwards so the local cache follows.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use termlight_common::types::{Term, TermId, TermPatch};
use termlight_engine::config::EngineConfig;
use termlight_engine::revalidate::{NoAnnotations, RevalidateOutcome};
use termlight_engine::service::ServiceAck;

use super::{block_on, open_orchestrator, report, LiveOrchestrator};
use crate::exit_code::UsageError;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct TermsArgs {
    #[command(subcommand)]
    action: TermsAction,

    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum TermsAction {
    /// List terms; falls back to the cache when the service is unreachable
    List,
    /// Add a term
    Add {
        original: String,
        translated: String,
    },
    /// Change a term's original text or translation
    Edit {
        id: String,
        #[arg(long)]
        original: Option<String>,
        #[arg(long)]
        translated: Option<String>,
    },
    /// Delete a term
    Rm { id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListSource {
    Service,
    Cache,
}

#[derive(Debug, Serialize)]
pub struct TermListing {
    pub source: ListSource,
    pub terms: Vec<Term>,
}

#[derive(Debug, Serialize)]
pub struct MutationResult {
    pub action: &'static str,
    pub id: Option<TermId>,
    pub message: Option<String>,
    /// Size of the refetched list.
    pub terms: usize,
}

pub fn run(args: TermsArgs, config: &EngineConfig) -> Result<()> {
    let format = OutputFormat::detect(args.json);
    let mut orchestrator = report(format, open_orchestrator(config))?;

    let result = match args.action {
        TermsAction::List => {
            let listing = report(format, list(&mut orchestrator))?;
            if listing.source == ListSource::Cache {
                output::print_warning(format, "SERVICE_UNREACHABLE", "showing cached terms");
            }
            output::print_output(format, &listing, format_listing)?;
            return Ok(());
        }
        TermsAction::Add { original, translated } => add(&mut orchestrator, &original, &translated),
        TermsAction::Edit { id, original, translated } => {
            edit(&mut orchestrator, TermId::from(id), original, translated)
        }
        TermsAction::Rm { id } => remove(&mut orchestrator, TermId::from(id)),
    };
    let result = report(format, result)?;
    output::print_output(format, &result, format_mutation)?;
    Ok(())
}

fn list(orchestrator: &mut LiveOrchestrator) -> Result<TermListing> {
    orchestrator.paint_stale(&mut NoAnnotations);
    let outcome = block_on(orchestrator.revalidate(&mut NoAnnotations))?;
    let source = match outcome {
        RevalidateOutcome::Failed(error) if orchestrator.terms().is_empty() => {
            return Err(anyhow::Error::new(error).context("failed to list terms"));
        }
        RevalidateOutcome::Failed(_) => ListSource::Cache,
        _ => ListSource::Service,
    };
    Ok(TermListing { source, terms: orchestrator.terms().as_slice().to_vec() })
}

fn add(orchestrator: &mut LiveOrchestrator, original: &str, translated: &str) -> Result<MutationResult> {
    let (original, translated) = (original.trim(), translated.trim());
    if original.is_empty() || translated.is_empty() {
        return Err(UsageError("both ORIGINAL and TRANSLATED must be non-empty".into()).into());
    }
    let ack = block_on(orchestrator.create_term(original, translated, &mut NoAnnotations))?
        .context("failed to create term")?;
    Ok(mutation_result("created", ack, orchestrator))
}

fn edit(
    orchestrator: &mut LiveOrchestrator,
    id: TermId,
    original: Option<String>,
    translated: Option<String>,
) -> Result<MutationResult> {
    let patch = edit_patch(original, translated)?;
    let ack = block_on(orchestrator.update_term(&id, &patch, &mut NoAnnotations))?
        .with_context(|| format!("failed to update term {id}"))?;
    Ok(mutation_result("updated", with_id(ack, id), orchestrator))
}

fn remove(orchestrator: &mut LiveOrchestrator, id: TermId) -> Result<MutationResult> {
    let ack = block_on(orchestrator.delete_term(&id, &mut NoAnnotations))?
        .with_context(|| format!("failed to delete term {id}"))?;
    Ok(mutation_result("deleted", with_id(ack, id), orchestrator))
}

fn mutation_result(action: &'static str, ack: ServiceAck, orchestrator: &LiveOrchestrator) -> MutationResult {
    MutationResult { action, id: ack.id, message: ack.message, terms: orchestrator.terms().len() }
}

/// Keep only fields with visible content; at least one is required.
fn edit_patch(original: Option<String>, translated: Option<String>) -> Result<TermPatch> {
    let keep = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let patch = TermPatch { original: keep(original), translated: keep(translated) };
    if patch.is_empty() {
        return Err(UsageError("nothing to change: pass --original and/or --translated".into()).into());
    }
    Ok(patch)
}

fn with_id(mut ack: ServiceAck, id: TermId) -> ServiceAck {
    ack.id.get_or_insert(id);
    ack
}

fn format_listing(listing: &TermListing) -> String {
    if listing.terms.is_empty() {
        return "No terms.".into();
    }
    let width = listing.terms.iter().map(|t| t.id.as_str().len()).max().unwrap_or(0);
    let mut lines = vec![format!("{} term(s)", listing.terms.len())];
    for term in &listing.terms {
        lines.push(format!("  {:<width$}  {} → {}", term.id.as_str(), term.original, term.translated));
    }
    lines.join("\n")
}

fn format_mutation(result: &MutationResult) -> String {
    let mut line = match &result.id {
        Some(id) => format!("Term {id} {}", result.action),
        None => format!("Term {}", result.action),
    };
    if let Some(message) = &result.message {
        line.push_str(&format!(": {message}"));
    }
    line
}
