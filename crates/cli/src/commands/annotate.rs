// `termlight annotate`: annotate a markdown file with known terms.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use termlight_engine::annotate::Annotation;
use termlight_engine::config::EngineConfig;
use termlight_engine::document::markdown::{append_markdown, block_sources, parse_markdown};
use termlight_engine::document::Document;
use termlight_engine::{startup, Engine};
use tracing::debug;

use super::{block_on, report, Revalidation};
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct AnnotateArgs {
    /// Markdown file to annotate.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Use cached terms only; never contact the term service.
    #[arg(long)]
    offline: bool,

    /// Feed the document block by block and annotate each block as it lands.
    #[arg(long)]
    stream: bool,

    /// Print a JSON summary instead of HTML.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
pub struct AnnotateReport {
    pub file: String,
    pub painted_from_cache: Option<usize>,
    pub revalidation: Revalidation,
    pub terms: usize,
    pub annotations: Vec<Annotation>,
    pub html: String,
}

pub fn run(args: AnnotateArgs, config: &EngineConfig) -> Result<()> {
    let format = OutputFormat::from_flag(args.json);
    let result = annotate(&args, config);
    let result = report(format, result)?;

    if let Revalidation::Failed { message } = &result.revalidation {
        let warning = format!("using cached terms: {message}");
        output::print_warning(format, "REVALIDATION_FAILED", &warning);
    }
    output::print_output(format, &result, format_human)?;
    Ok(())
}

fn annotate(args: &AnnotateArgs, config: &EngineConfig) -> Result<AnnotateReport> {
    let markdown = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let (doc, pending) = if args.stream {
        (Document::new(), block_sources(&markdown))
    } else {
        (parse_markdown(&markdown).context("failed to build document")?, Vec::new())
    };
    let root = doc.root();

    let service = startup::connect_service(&config.service)?;
    let cache = startup::open_cache(&config.cache)?;
    let mut engine = Engine::new(doc, root, service, cache).with_config(config);

    let (painted_from_cache, revalidation) = if args.offline {
        (engine.paint_from_cache(), Revalidation::Skipped)
    } else {
        let boot = block_on(engine.boot())?;
        (boot.painted_from_cache, Revalidation::from(&boot.outcome))
    };

    for chunk in pending {
        append_markdown(engine.tree_mut(), root, chunk).context("failed to append block")?;
        let stats = engine.pump_mutations();
        debug!(annotations = stats.annotations, "streamed block");
    }

    Ok(AnnotateReport {
        file: args.file.display().to_string(),
        painted_from_cache,
        revalidation,
        terms: engine.orchestrator().terms().len(),
        annotations: engine.annotations(),
        html: engine.tree().inner_html(root),
    })
}

fn format_human(report: &AnnotateReport) -> String {
    report.html.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use termlight_common::types::Term;
    use termlight_engine::config::CacheConfig;

    fn offline_config(dir: &TempDir) -> EngineConfig {
        let mut config = EngineConfig::default();
        config.cache = CacheConfig { path: Some(dir.path().join("cache.db")), ttl_sec: 300 };
        config
    }

    fn write_markdown(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("doc.md");
        std::fs::write(&path, body).unwrap();
        path
    }

    fn seed_cache(config: &EngineConfig, terms: &[Term]) {
        startup::open_cache(&config.cache).unwrap().write(terms).unwrap();
    }

    #[test]
    fn offline_annotation_uses_cache() {
        let dir = TempDir::new().unwrap();
        let config = offline_config(&dir);
        seed_cache(&config, &[Term::new("1", "cat", "gato")]);
        let file = write_markdown(&dir, "The cat sat.\n\n`cat` stays code.\n");

        let args = AnnotateArgs { file, offline: true, stream: false, json: true };
        let report = annotate(&args, &config).unwrap();

        assert_eq!(report.painted_from_cache, Some(1));
        assert_eq!(report.revalidation, Revalidation::Skipped);
        assert_eq!(report.annotations.len(), 1);
        assert!(report.html.contains(r#"data-termlight-term="cat""#));
    }

    #[test]
    fn streamed_annotation_matches_whole_document() {
        let dir = TempDir::new().unwrap();
        let config = offline_config(&dir);
        seed_cache(&config, &[Term::new("1", "cat", "gato")]);
        let file = write_markdown(&dir, "# A cat\n\nOne cat.\n\n- cat\n- dog\n");

        let whole_args = AnnotateArgs { file: file.clone(), offline: true, stream: false, json: true };
        let whole = annotate(&whole_args, &config).unwrap();
        let streamed_args = AnnotateArgs { file, offline: true, stream: true, json: true };
        let streamed = annotate(&streamed_args, &config).unwrap();

        assert_eq!(streamed.annotations.len(), 3);
        assert_eq!(streamed.html, whole.html);
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = offline_config(&dir);
        let file = dir.path().join("missing.md");
        let args = AnnotateArgs { file, offline: true, stream: false, json: false };
        let err = annotate(&args, &config).unwrap_err();
        assert!(format!("{err:#}").contains("missing.md"));
    }

    #[test]
    fn human_output_is_html() {
        let report = AnnotateReport {
            file: "doc.md".into(),
            painted_from_cache: None,
            revalidation: Revalidation::Skipped,
            terms: 0,
            annotations: vec![],
            html: "<p>hi</p>".into(),
        };
        assert_eq!(format_human(&report), "<p>hi</p>");
    }
}
