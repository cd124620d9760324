// Remote term data service boundary.

pub mod http;
pub mod memory;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use termlight_common::types::{Term, TermId, TermPatch};
use thiserror::Error;

pub use http::HttpTermService;
pub use memory::MemoryTermService;

pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ServiceError>> + Send + 'a>>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("service returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("service unreachable: {0}")]
    Transport(String),

    #[error("service response could not be decoded: {0}")]
    Decode(String),

    #[error("term {0} not found")]
    NotFound(TermId),

    #[error("invalid service url: {0}")]
    InvalidUrl(String),
}

/// What the service reports back for a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceAck {
    pub id: Option<TermId>,
    pub message: Option<String>,
}

/// Stores and returns term/translation pairs for one user scope.
///
/// In production this is the HTTP backend; tests use `MemoryTermService`.
pub trait TermService: Send + Sync {
    fn create<'a>(&'a self, original: &'a str, translated: &'a str) -> ServiceFuture<'a, ServiceAck>;

    fn list(&self) -> ServiceFuture<'_, Vec<Term>>;

    fn update<'a>(&'a self, id: &'a TermId, patch: &'a TermPatch) -> ServiceFuture<'a, ServiceAck>;

    fn delete<'a>(&'a self, id: &'a TermId) -> ServiceFuture<'a, ServiceAck>;
}

impl<S: TermService + ?Sized> TermService for Arc<S> {
    fn create<'a>(&'a self, original: &'a str, translated: &'a str) -> ServiceFuture<'a, ServiceAck> {
        (**self).create(original, translated)
    }

    fn list(&self) -> ServiceFuture<'_, Vec<Term>> {
        (**self).list()
    }

    fn update<'a>(&'a self, id: &'a TermId, patch: &'a TermPatch) -> ServiceFuture<'a, ServiceAck> {
        (**self).update(id, patch)
    }

    fn delete<'a>(&'a self, id: &'a TermId) -> ServiceFuture<'a, ServiceAck> {
        (**self).delete(id)
    }
}

impl<S: TermService + ?Sized> TermService for Box<S> {
    fn create<'a>(&'a self, original: &'a str, translated: &'a str) -> ServiceFuture<'a, ServiceAck> {
        (**self).create(original, translated)
    }

    fn list(&self) -> ServiceFuture<'_, Vec<Term>> {
        (**self).list()
    }

    fn update<'a>(&'a self, id: &'a TermId, patch: &'a TermPatch) -> ServiceFuture<'a, ServiceAck> {
        (**self).update(id, patch)
    }

    fn delete<'a>(&'a self, id: &'a TermId) -> ServiceFuture<'a, ServiceAck> {
        (**self).delete(id)
    }
}
