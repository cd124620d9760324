// Consistent exit codes for the termlight CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   10 = term service unreachable
//   11 = term service rejected the request
//   12 = term or cache record not found
//   13 = invalid configuration

use std::process;

use termlight_engine::config::ConfigError;
use termlight_engine::service::ServiceError;

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    ServiceDown = 10,
    Rejected = 11,
    NotFound = 12,
    Config = 13,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(service_err) = cause.downcast_ref::<ServiceError>() {
                return Self::from_service_error(service_err);
            }
            if cause.downcast_ref::<ConfigError>().is_some() {
                return Self::Config;
            }
            if cause.downcast_ref::<UsageError>().is_some() {
                return Self::Usage;
            }
            if cause.downcast_ref::<NotFoundError>().is_some() {
                return Self::NotFound;
            }
        }
        Self::Error
    }

    pub fn from_service_error(err: &ServiceError) -> Self {
        match err {
            ServiceError::Transport(_) => Self::ServiceDown,
            ServiceError::Status { .. } | ServiceError::Decode(_) => Self::Rejected,
            ServiceError::NotFound(_) => Self::NotFound,
            ServiceError::InvalidUrl(_) => Self::Config,
        }
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}

/// Bad flag combination or empty input, detected after clap parsing.
#[derive(Debug)]
pub struct UsageError(pub String);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for UsageError {}

/// A lookup or cache read that came back empty.
#[derive(Debug)]
pub struct NotFoundError(pub String);

impl std::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NotFoundError {}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use termlight_common::types::TermId;

    #[test]
    fn exit_code_values() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Error.code(), 1);
        assert_eq!(ExitCode::Usage.code(), 2);
        assert_eq!(ExitCode::ServiceDown.code(), 10);
        assert_eq!(ExitCode::Rejected.code(), 11);
        assert_eq!(ExitCode::NotFound.code(), 12);
        assert_eq!(ExitCode::Config.code(), 13);
    }

    #[test]
    fn service_errors_map_by_kind() {
        let transport = ServiceError::Transport("refused".into());
        assert_eq!(ExitCode::from_service_error(&transport), ExitCode::ServiceDown);
        assert_eq!(
            ExitCode::from_service_error(&ServiceError::Status { status: 500, message: "boom".into() }),
            ExitCode::Rejected
        );
        let missing = ServiceError::NotFound(TermId::from("7"));
        assert_eq!(ExitCode::from_service_error(&missing), ExitCode::NotFound);
        let bad_url = ServiceError::InvalidUrl("x".into());
        assert_eq!(ExitCode::from_service_error(&bad_url), ExitCode::Config);
    }

    #[test]
    fn typed_error_found_under_context() {
        let err = Err::<(), _>(ServiceError::Transport("refused".into()))
            .context("failed to list terms")
            .unwrap_err();
        assert_eq!(ExitCode::from_error(&err), ExitCode::ServiceDown);
    }

    #[test]
    fn usage_and_not_found_errors() {
        let err = anyhow::Error::new(UsageError("pass --original or --translated".into()));
        assert_eq!(ExitCode::from_error(&err), ExitCode::Usage);
        let err = anyhow::Error::new(NotFoundError("no term for `cat`".into()));
        assert_eq!(ExitCode::from_error(&err), ExitCode::NotFound);
    }

    #[test]
    fn from_error_generic_is_error() {
        let err = anyhow::anyhow!("something went wrong");
        assert_eq!(ExitCode::from_error(&err), ExitCode::Error);
    }
}
