// `termlight lookup`: resolve a word through the cached term index.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use termlight_common::types::{lookup_key, IndexedTerm, TermId, TermIndex};
use termlight_engine::config::EngineConfig;
use termlight_engine::revalidate::NoAnnotations;

use super::{open_orchestrator, report};
use crate::exit_code::NotFoundError;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct LookupArgs {
    /// Word or phrase to resolve (case-insensitive).
    word: String,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
pub struct LookupResult {
    pub word: String,
    pub key: String,
    pub id: TermId,
    pub translated: String,
}

pub fn run(args: LookupArgs, config: &EngineConfig) -> Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = report(format, lookup(&args.word, config))?;
    output::print_output(format, &result, format_human)?;
    Ok(())
}

fn lookup(word: &str, config: &EngineConfig) -> Result<LookupResult> {
    let mut orchestrator = open_orchestrator(config)?;
    orchestrator.paint_stale(&mut NoAnnotations);
    resolve(orchestrator.index(), word)
}

fn resolve(index: &TermIndex, word: &str) -> Result<LookupResult> {
    let word = word.trim();
    let IndexedTerm { id, translated } = index
        .lookup(word)
        .cloned()
        .ok_or_else(|| NotFoundError(format!("no cached term for `{word}`. Run: termlight refresh")))?;
    Ok(LookupResult { word: word.to_string(), key: lookup_key(word), id, translated })
}

fn format_human(result: &LookupResult) -> String {
    format!("{} → {} (term {})", result.word, result.translated, result.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use termlight_common::types::Term;

    use crate::exit_code::ExitCode;

    fn index() -> TermIndex {
        TermIndex::from_terms(&[Term::new("1", "Hello", "olá"), Term::new("2", "hello", "oi")])
    }

    #[test]
    fn resolves_case_insensitively_first_wins() {
        let result = resolve(&index(), "  HELLO ").unwrap();
        assert_eq!(result.word, "HELLO");
        assert_eq!(result.key, "hello");
        assert_eq!(result.id, TermId::from("1"));
        assert_eq!(result.translated, "olá");
        assert_eq!(format_human(&result), "HELLO → olá (term 1)");
    }

    #[test]
    fn miss_is_not_found() {
        let err = resolve(&index(), "world").unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::NotFound);
        assert!(err.to_string().contains("world"));
    }
}
