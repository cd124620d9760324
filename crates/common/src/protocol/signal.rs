// Host signals delivered by the command dispatcher.
//
// The host forwards keyboard shortcuts and context-menu clicks as small JSON
// messages tagged by `type`. Only two signals exist; everything else is
// rejected at decode time.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signals the engine accepts from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum HostSignal {
    /// Open the term-entry popup at the current selection.
    #[serde(alias = "open-translation-box")]
    OpenEntryUi,
    /// Refetch the term list and rebuild annotations now.
    #[serde(alias = "refresh-highlights")]
    ForceRefresh,
}

impl HostSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenEntryUi => "open-entry-ui",
            Self::ForceRefresh => "force-refresh",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignalError {
    #[error("signal payload is not valid JSON: {0}")]
    Malformed(String),

    #[error("signal payload has no `type` tag")]
    MissingType,

    #[error("unsupported signal type: {0}")]
    Unsupported(String),
}

/// Decode a raw host message into a [`HostSignal`].
pub fn decode_signal(payload: &str) -> Result<HostSignal, SignalError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| SignalError::Malformed(e.to_string()))?;
    decode_signal_value(value)
}

/// Decode an already-parsed host message.
pub fn decode_signal_value(value: serde_json::Value) -> Result<HostSignal, SignalError> {
    let kind = match value.get("type") {
        Some(serde_json::Value::String(kind)) => kind.clone(),
        _ => return Err(SignalError::MissingType),
    };
    serde_json::from_value(value).map_err(|_| SignalError::Unsupported(kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_canonical_names() {
        assert_eq!(decode_signal(r#"{"type":"open-entry-ui"}"#), Ok(HostSignal::OpenEntryUi));
        assert_eq!(decode_signal(r#"{"type":"force-refresh"}"#), Ok(HostSignal::ForceRefresh));
    }

    #[test]
    fn decodes_legacy_aliases() {
        assert_eq!(
            decode_signal(r#"{"type":"open-translation-box"}"#),
            Ok(HostSignal::OpenEntryUi)
        );
        assert_eq!(
            decode_signal(r#"{"type":"refresh-highlights"}"#),
            Ok(HostSignal::ForceRefresh)
        );
    }

    #[test]
    fn rejects_unknown_type() {
        assert_eq!(
            decode_signal(r#"{"type":"delete-everything"}"#),
            Err(SignalError::Unsupported("delete-everything".into()))
        );
    }

    #[test]
    fn rejects_missing_or_non_string_type() {
        assert_eq!(decode_signal(r#"{}"#), Err(SignalError::MissingType));
        assert_eq!(decode_signal(r#"{"type":3}"#), Err(SignalError::MissingType));
        assert_eq!(decode_signal(r#"[1,2]"#), Err(SignalError::MissingType));
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(decode_signal("{not json"), Err(SignalError::Malformed(_))));
    }

    #[test]
    fn serializes_canonical_name() {
        let json = serde_json::to_string(&HostSignal::ForceRefresh).unwrap();
        assert_eq!(json, r#"{"type":"force-refresh"}"#);
        assert_eq!(HostSignal::OpenEntryUi.as_str(), "open-entry-ui");
    }
}
