// Stale-while-revalidate term synchronization.
//
// Boot paints from whatever the cache holds, then asks the service for the
// authoritative list and rebuilds annotations only if it differs. Forced
// refreshes and mutations always refetch, persist and rebuild.

use termlight_common::types::{IndexedTerm, Term, TermId, TermIndex, TermPatch, TermSet};
use tracing::{debug, info, warn};

use crate::cache::store::KvStore;
use crate::cache::TermDataCache;
use crate::service::{ServiceAck, ServiceError, TermService};

/// Receiver of term-set changes; the live document binding in production.
pub trait AnnotationSink {
    fn initialize(&mut self, originals: &[String]);
    fn refresh(&mut self, originals: &[String]);
}

/// Sink for callers with no document attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAnnotations;

impl AnnotationSink for NoAnnotations {
    fn initialize(&mut self, _originals: &[String]) {}
    fn refresh(&mut self, _originals: &[String]) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevalidateOutcome {
    /// Fetched list equals the cached one; nothing rebuilt. Boot only.
    Unchanged,
    /// Cache overwritten and annotations rebuilt.
    Refreshed { terms: usize },
    /// Fetch failed; annotations untouched.
    Failed(ServiceError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootReport {
    /// Number of cached terms painted before the fetch, if any.
    pub painted_from_cache: Option<usize>,
    pub outcome: RevalidateOutcome,
}

pub struct RevalidationOrchestrator<S, K> {
    service: S,
    cache: TermDataCache<K>,
    terms: TermSet,
    index: TermIndex,
}

impl<S: TermService, K: KvStore> RevalidationOrchestrator<S, K> {
    pub fn new(service: S, cache: TermDataCache<K>) -> Self {
        Self { service, cache, terms: TermSet::default(), index: TermIndex::default() }
    }

    pub fn terms(&self) -> &TermSet {
        &self.terms
    }

    pub fn index(&self) -> &TermIndex {
        &self.index
    }

    pub fn lookup(&self, word: &str) -> Option<&IndexedTerm> {
        self.index.lookup(word)
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    pub fn cache(&self) -> &TermDataCache<K> {
        &self.cache
    }

    /// Install cached terms, of any age, and initialize annotations from
    /// them. Returns the cached payload; `None` when absent or unreadable.
    pub fn paint_stale<A: AnnotationSink + ?Sized>(&mut self, sink: &mut A) -> Option<Vec<Term>> {
        let cached = self.read_cache()?;
        if !cached.is_empty() {
            self.install(cached.clone());
            sink.initialize(&self.terms.originals());
            info!(terms = cached.len(), "painted annotations from cache");
        }
        Some(cached)
    }

    /// Paint from cache, then revalidate against the service.
    pub async fn boot<A: AnnotationSink + ?Sized>(&mut self, sink: &mut A) -> BootReport {
        let cached = self.paint_stale(sink);
        let painted_from_cache = cached.as_ref().filter(|terms| !terms.is_empty()).map(Vec::len);
        let outcome = self.revalidate_against(cached, sink).await;
        BootReport { painted_from_cache, outcome }
    }

    /// Refetch now, regardless of cache age, and rebuild only if the list
    /// differs from the cached one.
    pub async fn revalidate<A: AnnotationSink + ?Sized>(&mut self, sink: &mut A) -> RevalidateOutcome {
        let cached = self.read_cache();
        self.revalidate_against(cached, sink).await
    }

    /// Refetch now and always persist and rebuild, even when the list is
    /// unchanged. The cache entry is restamped on success.
    pub async fn force_refresh<A: AnnotationSink + ?Sized>(&mut self, sink: &mut A) -> RevalidateOutcome {
        match self.resync(sink).await {
            Ok(count) => {
                info!(terms = count, "forced refresh; annotations rebuilt");
                RevalidateOutcome::Refreshed { terms: count }
            }
            Err(error) => {
                warn!(error = %error, "forced refresh failed; keeping current annotations");
                RevalidateOutcome::Failed(error)
            }
        }
    }

    async fn revalidate_against<A: AnnotationSink + ?Sized>(
        &mut self,
        cached: Option<Vec<Term>>,
        sink: &mut A,
    ) -> RevalidateOutcome {
        let fetched = match self.service.list().await {
            Ok(fetched) => fetched,
            Err(error) => {
                warn!(error = %error, "term fetch failed; keeping current annotations");
                return RevalidateOutcome::Failed(error);
            }
        };

        let changed = cached.as_ref() != Some(&fetched);
        let count = fetched.len();
        if changed {
            self.persist(&fetched);
        }
        self.install(fetched);

        if !changed {
            debug!(terms = count, "term list unchanged");
            return RevalidateOutcome::Unchanged;
        }
        sink.refresh(&self.terms.originals());
        info!(terms = count, "term list changed; annotations rebuilt");
        RevalidateOutcome::Refreshed { terms: count }
    }

    pub async fn create_term<A: AnnotationSink + ?Sized>(
        &mut self,
        original: &str,
        translated: &str,
        sink: &mut A,
    ) -> Result<ServiceAck, ServiceError> {
        let ack = self.service.create(original, translated).await?;
        info!(original, "term created");
        self.resync_after_mutation(sink).await;
        Ok(ack)
    }

    pub async fn update_term<A: AnnotationSink + ?Sized>(
        &mut self,
        id: &TermId,
        patch: &TermPatch,
        sink: &mut A,
    ) -> Result<ServiceAck, ServiceError> {
        let ack = self.service.update(id, patch).await?;
        info!(id = %id, "term updated");
        self.resync_after_mutation(sink).await;
        Ok(ack)
    }

    pub async fn delete_term<A: AnnotationSink + ?Sized>(
        &mut self,
        id: &TermId,
        sink: &mut A,
    ) -> Result<ServiceAck, ServiceError> {
        let ack = self.service.delete(id).await?;
        info!(id = %id, "term deleted");
        self.resync_after_mutation(sink).await;
        Ok(ack)
    }

    /// Refetch, persist and rebuild without diffing. On failure nothing
    /// changes.
    async fn resync<A: AnnotationSink + ?Sized>(&mut self, sink: &mut A) -> Result<usize, ServiceError> {
        let fetched = self.service.list().await?;
        let count = fetched.len();
        self.persist(&fetched);
        self.install(fetched);
        sink.refresh(&self.terms.originals());
        Ok(count)
    }

    async fn resync_after_mutation<A: AnnotationSink + ?Sized>(&mut self, sink: &mut A) {
        if let Err(error) = self.resync(sink).await {
            warn!(error = %error, "refetch after mutation failed");
        }
    }

    fn read_cache(&self) -> Option<Vec<Term>> {
        match self.cache.read_stale() {
            Ok(cached) => cached,
            Err(error) => {
                warn!(error = %error, "term cache unreadable; treating as empty");
                None
            }
        }
    }

    fn persist(&self, terms: &[Term]) {
        if let Err(error) = self.cache.write(terms) {
            warn!(error = %error, "failed to write term cache");
        }
    }

    fn install(&mut self, terms: Vec<Term>) {
        self.terms = TermSet::new(terms);
        self.index = self.terms.index();
    }
}
