// Output formatting for the CLI.
//
// TTY → human-readable text. Piped/redirected → structured JSON.
// `--json` forces JSON output regardless of terminal.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use termlight_engine::config::ConfigError;
use termlight_engine::service::ServiceError;

use crate::exit_code::{NotFoundError, UsageError};

const ANSI_RED: &str = "\x1b[31m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    /// JSON if `--json` was passed or stdout is not a TTY.
    pub fn detect(json_flag: bool) -> Self {
        if json_flag {
            return Self::Json;
        }
        Self::detect_from_terminal(io::stdout().is_terminal())
    }

    pub fn detect_from_terminal(is_tty: bool) -> Self {
        if is_tty {
            Self::Human
        } else {
            Self::Json
        }
    }

    /// Flag only; for commands whose human output is meant to be piped.
    pub fn from_flag(json_flag: bool) -> Self {
        if json_flag {
            Self::Json
        } else {
            Self::Human
        }
    }
}

/// Write a value to stdout in the selected format.
pub fn print_output<T, F>(format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    write_output(&mut io::stdout().lock(), format, value, human_fn)
}

pub fn write_output<W, T, F>(writer: &mut W, format: OutputFormat, value: &T, human_fn: F) -> io::Result<()>
where
    W: Write,
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match format {
        OutputFormat::Human => writeln!(writer, "{}", human_fn(value)),
        OutputFormat::Json => {
            serde_json::to_writer(&mut *writer, value).map_err(io::Error::other)?;
            writeln!(writer)
        }
    }
}

pub fn print_error(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "error", code, message, ANSI_RED);
}

pub fn print_warning(format: OutputFormat, code: &str, message: &str) {
    print_diagnostic(format, "warning", code, message, ANSI_YELLOW);
}

fn print_diagnostic(format: OutputFormat, label: &str, code: &str, message: &str, color: &str) {
    let mut err = io::stderr().lock();
    match format {
        OutputFormat::Human => {
            let line = render_human_stderr_line(label, message, io::stderr().is_terminal(), color);
            let _ = writeln!(err, "{line}");
        }
        OutputFormat::Json => {
            let obj = serde_json::json!({ label: { "code": code, "message": message } });
            let _ = serde_json::to_writer(&mut err, &obj);
            let _ = writeln!(err);
        }
    }
}

/// Print a mapped, actionable error for a command failure.
pub fn print_anyhow_error(format: OutputFormat, error: &anyhow::Error) {
    let (code, message) = actionable_error(error);
    print_error(format, code, &message);
}

fn actionable_error(error: &anyhow::Error) -> (&'static str, String) {
    let message = format!("{error:#}");

    for cause in error.chain() {
        if let Some(service_err) = cause.downcast_ref::<ServiceError>() {
            return match service_err {
                ServiceError::Transport(_) => (
                    "SERVICE_UNREACHABLE",
                    format!(
                        "{message}. Check [service] base_url in ~/.termlight/config.toml \
                         (see: termlight config show)"
                    ),
                ),
                ServiceError::Status { .. } => ("SERVICE_REJECTED", message),
                ServiceError::Decode(_) => ("SERVICE_BAD_RESPONSE", message),
                ServiceError::NotFound(id) => (
                    "TERM_NOT_FOUND",
                    format!("Term {id} not found. Run: termlight terms list"),
                ),
                ServiceError::InvalidUrl(_) => ("CONFIG_INVALID", message),
            };
        }
        if cause.downcast_ref::<ConfigError>().is_some() {
            return ("CONFIG_INVALID", message);
        }
        if cause.downcast_ref::<UsageError>().is_some() {
            return ("USAGE", message);
        }
        if cause.downcast_ref::<NotFoundError>().is_some() {
            return ("NOT_FOUND", message);
        }
    }

    ("ERROR", message)
}

fn render_human_stderr_line(label: &str, message: &str, is_tty: bool, color: &str) -> String {
    if is_tty {
        format!("{color}{label}:{ANSI_RESET} {message}")
    } else {
        format!("{label}: {message}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use termlight_common::types::TermId;

    #[test]
    fn detect_tty_returns_human() {
        assert_eq!(OutputFormat::detect_from_terminal(true), OutputFormat::Human);
    }

    #[test]
    fn detect_pipe_returns_json() {
        assert_eq!(OutputFormat::detect_from_terminal(false), OutputFormat::Json);
    }

    #[test]
    fn json_flag_wins() {
        assert_eq!(OutputFormat::detect(true), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flag(true), OutputFormat::Json);
        assert_eq!(OutputFormat::from_flag(false), OutputFormat::Human);
    }

    #[test]
    fn write_output_human_format() {
        #[derive(Serialize)]
        struct Info {
            name: String,
        }
        let info = Info { name: "alice".into() };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Human, &info, |i| format!("Name: {}", i.name)).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Name: alice\n");
    }

    #[test]
    fn write_output_json_format() {
        #[derive(Serialize)]
        struct Info {
            name: String,
            count: u32,
        }
        let info = Info { name: "bob".into(), count: 42 };
        let mut buf = Vec::new();
        write_output(&mut buf, OutputFormat::Json, &info, |_| {
            unreachable!("human_fn should not be called in JSON mode")
        })
        .unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert!(output.ends_with('\n'));
        let parsed: serde_json::Value = serde_json::from_str(output.trim()).unwrap();
        assert_eq!(parsed["name"], "bob");
        assert_eq!(parsed["count"], 42);
    }

    #[test]
    fn render_human_error_uses_color_for_tty() {
        let line = render_human_stderr_line("error", "boom", true, ANSI_RED);
        assert!(line.contains(ANSI_RED));
        assert!(line.contains(ANSI_RESET));
        assert!(line.contains("boom"));
    }

    #[test]
    fn render_human_warning_without_tty_is_plain() {
        let line = render_human_stderr_line("warning", "careful", false, ANSI_YELLOW);
        assert_eq!(line, "warning: careful");
    }

    #[test]
    fn unreachable_service_points_at_config() {
        let err = Err::<(), _>(ServiceError::Transport("connection refused".into()))
            .context("failed to fetch terms")
            .unwrap_err();
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "SERVICE_UNREACHABLE");
        assert!(message.contains("connection refused"));
        assert!(message.contains("base_url"));
    }

    #[test]
    fn missing_term_suggests_listing() {
        let err = anyhow::Error::new(ServiceError::NotFound(TermId::from("42")));
        let (code, message) = actionable_error(&err);
        assert_eq!(code, "TERM_NOT_FOUND");
        assert!(message.contains("42"));
        assert!(message.contains("termlight terms list"));
    }

    #[test]
    fn usage_error_keeps_message() {
        let err = anyhow::Error::new(UsageError("nothing to change".into()));
        assert_eq!(actionable_error(&err), ("USAGE", "nothing to change".to_string()));
    }

    #[test]
    fn unknown_error_passes_through() {
        let err = anyhow::anyhow!("disk on fire");
        assert_eq!(actionable_error(&err), ("ERROR", "disk on fire".to_string()));
    }
}
