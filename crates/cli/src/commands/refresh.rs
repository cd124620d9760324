// `termlight refresh`: refetch the term list now and restamp the cache,
// regardless of cache age or whether the list changed.

use anyhow::{Context, Result};
use clap::Args;
use termlight_engine::config::EngineConfig;
use termlight_engine::revalidate::{NoAnnotations, RevalidateOutcome};

use super::{block_on, open_orchestrator, report, Revalidation};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct RefreshArgs {
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: RefreshArgs, config: &EngineConfig) -> Result<()> {
    let format = OutputFormat::detect(args.json);
    let revalidation = report(format, refresh(config))?;
    output::print_output(format, &revalidation, Revalidation::describe)?;
    Ok(())
}

fn refresh(config: &EngineConfig) -> Result<Revalidation> {
    let mut orchestrator = open_orchestrator(config)?;
    match block_on(orchestrator.force_refresh(&mut NoAnnotations))? {
        RevalidateOutcome::Failed(error) => Err(error).context("refresh failed"),
        outcome => Ok(Revalidation::from(&outcome)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_outcomes() {
        assert_eq!(Revalidation::Unchanged.describe(), "term list unchanged");
        assert_eq!(Revalidation::Refreshed { terms: 2 }.describe(), "term list refreshed (2 term(s))");
    }

    #[test]
    fn json_output_is_tagged() {
        let mut buf = Vec::new();
        let unchanged = Revalidation::Unchanged;
        output::write_output(&mut buf, OutputFormat::Json, &unchanged, Revalidation::describe).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "{\"status\":\"unchanged\"}\n");
    }
}
