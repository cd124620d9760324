// `termlight config`: show the effective configuration or write defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use termlight_engine::config::{global_config_path, EngineConfig};

use super::report;
use crate::exit_code::UsageError;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,

    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file location
    Path,
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Serialize)]
pub struct ConfigLocation {
    pub path: PathBuf,
    pub exists: bool,
}

pub fn run(args: ConfigArgs, config: &EngineConfig, explicit: Option<&Path>) -> Result<()> {
    let format = OutputFormat::detect(args.json);
    match args.action {
        ConfigAction::Show => {
            let rendered = report(format, render_toml(config))?;
            output::print_output(format, config, |_| rendered.trim_end().to_string())?;
        }
        ConfigAction::Path => {
            let path = report(format, resolve_path(explicit))?;
            let location = ConfigLocation { exists: path.exists(), path };
            output::print_output(format, &location, |l| l.path.display().to_string())?;
        }
        ConfigAction::Init { force } => {
            let path = report(format, resolve_path(explicit))?;
            report(format, init(&path, force))?;
            let location = ConfigLocation { exists: true, path };
            output::print_output(format, &location, |l| format!("Wrote {}", l.path.display()))?;
        }
    }
    Ok(())
}

fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => global_config_path().context("could not determine home directory"),
    }
}

fn render_toml(config: &EngineConfig) -> Result<String> {
    toml::to_string_pretty(config).context("failed to render config")
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        let message = format!("{} already exists; pass --force to overwrite", path.display());
        return Err(UsageError(message).into());
    }
    EngineConfig::default()
        .save_to(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn rendered_config_parses_back() {
        let mut config = EngineConfig::default();
        config.annotate.extra_skip_tags = vec!["kbd".into()];
        let rendered = render_toml(&config).unwrap();
        assert!(rendered.contains("[service]"));
        let parsed: EngineConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        init(&path, false).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), EngineConfig::default());

        let err = init(&path, false).unwrap_err();
        assert!(err.downcast_ref::<UsageError>().is_some());
        init(&path, true).unwrap();
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/termlight.toml");
        assert_eq!(resolve_path(Some(path)).unwrap(), path);
    }
}
