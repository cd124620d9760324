// In-process term service used by tests and offline runs.

use std::future::ready;
use std::sync::Mutex;

use termlight_common::types::{Term, TermId, TermPatch};
use uuid::Uuid;

use super::{ServiceAck, ServiceError, ServiceFuture, TermService};

#[derive(Debug, Default)]
struct MemoryState {
    terms: Vec<Term>,
    offline: bool,
    fail_next_list: bool,
    fail_next_mutation: Option<ServiceError>,
    list_calls: usize,
}

#[derive(Debug, Default)]
pub struct MemoryTermService {
    state: Mutex<MemoryState>,
}

impl MemoryTermService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terms(terms: Vec<Term>) -> Self {
        Self { state: Mutex::new(MemoryState { terms, ..MemoryState::default() }) }
    }

    /// Every call fails with a transport error while offline.
    pub fn set_offline(&self, offline: bool) {
        let _ = self.with_state(|state| state.offline = offline);
    }

    pub fn fail_next_list(&self) {
        let _ = self.with_state(|state| state.fail_next_list = true);
    }

    pub fn fail_next_mutation(&self, error: ServiceError) {
        let _ = self.with_state(|state| state.fail_next_mutation = Some(error));
    }

    /// Swap the stored list, as if another client had changed it.
    pub fn replace_terms(&self, terms: Vec<Term>) {
        let _ = self.with_state(|state| state.terms = terms);
    }

    pub fn terms(&self) -> Vec<Term> {
        self.with_state(|state| state.terms.clone()).unwrap_or_default()
    }

    pub fn list_calls(&self) -> usize {
        self.with_state(|state| state.list_calls).unwrap_or_default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MemoryState) -> R) -> Result<R, ServiceError> {
        let mut state =
            self.state.lock().map_err(|_| ServiceError::Transport("memory service lock poisoned".into()))?;
        Ok(f(&mut state))
    }

    fn mutate(
        &self,
        f: impl FnOnce(&mut Vec<Term>) -> Result<ServiceAck, ServiceError>,
    ) -> Result<ServiceAck, ServiceError> {
        self.with_state(|state| {
            if state.offline {
                return Err(offline());
            }
            if let Some(error) = state.fail_next_mutation.take() {
                return Err(error);
            }
            f(&mut state.terms)
        })?
    }
}

fn offline() -> ServiceError {
    ServiceError::Transport("service offline".into())
}

impl TermService for MemoryTermService {
    fn create<'a>(&'a self, original: &'a str, translated: &'a str) -> ServiceFuture<'a, ServiceAck> {
        let result = self.mutate(|terms| {
            let id = TermId::new(Uuid::new_v4().to_string());
            terms.push(Term::new(id.clone(), original, translated));
            Ok(ServiceAck { id: Some(id), message: Some("saved".into()) })
        });
        Box::pin(ready(result))
    }

    fn list(&self) -> ServiceFuture<'_, Vec<Term>> {
        let result = self
            .with_state(|state| {
                state.list_calls += 1;
                if state.offline {
                    return Err(offline());
                }
                if std::mem::take(&mut state.fail_next_list) {
                    return Err(ServiceError::Status { status: 500, message: "list failed".into() });
                }
                Ok(state.terms.clone())
            })
            .and_then(|inner| inner);
        Box::pin(ready(result))
    }

    fn update<'a>(&'a self, id: &'a TermId, patch: &'a TermPatch) -> ServiceFuture<'a, ServiceAck> {
        let result = self.mutate(|terms| {
            let term = terms
                .iter_mut()
                .find(|term| &term.id == id)
                .ok_or_else(|| ServiceError::NotFound(id.clone()))?;
            if let Some(original) = &patch.original {
                term.original = original.clone();
            }
            if let Some(translated) = &patch.translated {
                term.translated = translated.clone();
            }
            Ok(ServiceAck { id: Some(id.clone()), message: Some("updated".into()) })
        });
        Box::pin(ready(result))
    }

    fn delete<'a>(&'a self, id: &'a TermId) -> ServiceFuture<'a, ServiceAck> {
        let result = self.mutate(|terms| {
            let before = terms.len();
            terms.retain(|term| &term.id != id);
            if terms.len() == before {
                return Err(ServiceError::NotFound(id.clone()));
            }
            Ok(ServiceAck { id: Some(id.clone()), message: Some("deleted".into()) })
        });
        Box::pin(ready(result))
    }
}
