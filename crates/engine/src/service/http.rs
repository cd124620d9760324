// HTTP client for the term backend.
//
// Wire format:
//   POST   {base}/salvar              {original, traduzido}
//   GET    {base}/traduzidas/{user}   -> [{id, original, traduzido}]
//   PUT    {base}/traducao/{id}       {original?, traduzido?}
//   DELETE {base}/traducao/{id}

use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use termlight_common::types::{Term, TermId, TermPatch};
use tracing::debug;
use url::Url;

use super::{ServiceAck, ServiceError, ServiceFuture, TermService};

#[derive(Debug, Clone)]
pub struct HttpTermService {
    client: Client,
    base: Url,
    user_scope: String,
}

#[derive(Debug, Serialize)]
struct CreateBody<'a> {
    original: &'a str,
    traduzido: &'a str,
}

#[derive(Debug, Serialize)]
struct PatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    original: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    traduzido: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct WireTerm {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    original: Option<String>,
    #[serde(default)]
    traduzido: Option<String>,
}

impl From<WireTerm> for Term {
    fn from(wire: WireTerm) -> Self {
        Term {
            id: wire.id.as_ref().and_then(id_from_value).unwrap_or_default(),
            original: wire.original.unwrap_or_default(),
            translated: wire.traduzido.unwrap_or_default(),
        }
    }
}

impl HttpTermService {
    pub fn new(
        base_url: &str,
        user_scope: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let base = validate_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Transport(e.to_string()))?;
        Ok(Self { client, base, user_scope: user_scope.into() })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn user_scope(&self) -> &str {
        &self.user_scope
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ServiceError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }
}

impl TermService for HttpTermService {
    fn create<'a>(&'a self, original: &'a str, translated: &'a str) -> ServiceFuture<'a, ServiceAck> {
        Box::pin(async move {
            let url = self.endpoint(&["salvar"])?;
            debug!(%url, "creating term");
            let response = self
                .client
                .post(url)
                .json(&CreateBody { original, traduzido: translated })
                .send()
                .await
                .map_err(transport)?;
            let response = check_status(response, None).await?;
            read_ack(response).await
        })
    }

    fn list(&self) -> ServiceFuture<'_, Vec<Term>> {
        Box::pin(async move {
            let url = self.endpoint(&["traduzidas", self.user_scope.as_str()])?;
            debug!(%url, "listing terms");
            let response = self.client.get(url).send().await.map_err(transport)?;
            let response = check_status(response, None).await?;
            let wire: Vec<WireTerm> =
                response.json().await.map_err(|e| ServiceError::Decode(e.to_string()))?;
            Ok(wire.into_iter().map(Term::from).collect())
        })
    }

    fn update<'a>(&'a self, id: &'a TermId, patch: &'a TermPatch) -> ServiceFuture<'a, ServiceAck> {
        Box::pin(async move {
            let url = self.endpoint(&["traducao", id.as_str()])?;
            debug!(%url, "updating term");
            let body = PatchBody {
                original: patch.original.as_deref(),
                traduzido: patch.translated.as_deref(),
            };
            let response = self.client.put(url).json(&body).send().await.map_err(transport)?;
            let response = check_status(response, Some(id)).await?;
            read_ack(response).await
        })
    }

    fn delete<'a>(&'a self, id: &'a TermId) -> ServiceFuture<'a, ServiceAck> {
        Box::pin(async move {
            let url = self.endpoint(&["traducao", id.as_str()])?;
            debug!(%url, "deleting term");
            let response = self.client.delete(url).send().await.map_err(transport)?;
            let response = check_status(response, Some(id)).await?;
            read_ack(response).await
        })
    }
}

fn transport(error: reqwest::Error) -> ServiceError {
    ServiceError::Transport(error.to_string())
}

async fn check_status(response: Response, id: Option<&TermId>) -> Result<Response, ServiceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        if let Some(id) = id {
            return Err(ServiceError::NotFound(id.clone()));
        }
    }
    let text = response.text().await.unwrap_or_default();
    let message = if text.trim().is_empty() {
        status.canonical_reason().unwrap_or("request failed").to_string()
    } else {
        text
    };
    Err(ServiceError::Status { status: status.as_u16(), message })
}

async fn read_ack(response: Response) -> Result<ServiceAck, ServiceError> {
    let text = response.text().await.map_err(transport)?;
    Ok(parse_ack(&text))
}

/// Lenient ack parsing: the backend's mutation bodies vary, and a 2xx with
/// an unexpected body still counts as success.
fn parse_ack(text: &str) -> ServiceAck {
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(text) else {
        return ServiceAck::default();
    };
    ServiceAck {
        id: map.get("id").and_then(id_from_value),
        message: ["message", "mensagem", "detail"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string),
    }
}

fn id_from_value(value: &Value) -> Option<TermId> {
    match value {
        Value::String(s) if !s.is_empty() => Some(TermId::new(s.clone())),
        Value::Number(n) => Some(TermId::new(n.to_string())),
        _ => None,
    }
}

fn validate_base_url(value: &str) -> Result<Url, ServiceError> {
    let parsed = Url::parse(value).map_err(|e| ServiceError::InvalidUrl(format!("`{value}`: {e}")))?;
    match parsed.scheme() {
        "http" | "https" if !parsed.cannot_be_a_base() => Ok(parsed),
        other => Err(ServiceError::InvalidUrl(format!("unsupported scheme `{other}` in `{value}`"))),
    }
}
