// termlight-engine: annotates terms in a live document and keeps them in
// sync with a remote term list.

pub mod annotate;
pub mod cache;
pub mod config;
pub mod document;
pub mod engine;
pub mod overlay;
pub mod revalidate;
pub mod service;
pub mod startup;

pub use engine::{ClickOutcome, Engine, EngineError, HostContext, Selection, SignalOutcome, SubmitOutcome};
