// Per-document engine instance.
//
// Owns the document, the annotation lifecycle, the revalidation orchestrator
// and the overlay slot. Every entry point takes `&mut self`, so refresh cycles
// and overlay flows never interleave.

use termlight_common::protocol::signal::HostSignal;
use termlight_common::types::{IndexedTerm, TermId, TermPatch};
use thiserror::Error;
use tracing::{debug, info};

use crate::annotate::lifecycle::{AnnotationLifecycle, LifecycleState};
use crate::annotate::scanner::{ScanStats, SkipPolicy};
use crate::annotate::{annotation_literal, collect_annotations, enclosing_annotation, Annotation};
use crate::cache::store::KvStore;
use crate::cache::TermDataCache;
use crate::config::{EngineConfig, OverlayConfig};
use crate::document::{ContentTree, DocumentError, NodeId};
use crate::overlay::session::{OpenOverlay, DELETING_LABEL, SAVING_LABEL};
use crate::overlay::{
    place, resolve_anchor, OverlayAction, OverlayContent, OverlaySlot, PlacementStyle, Rect, Viewport,
};
use crate::revalidate::{AnnotationSink, BootReport, RevalidateOutcome, RevalidationOrchestrator};
use crate::service::{ServiceAck, ServiceError, TermService};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// Current text selection as reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub text: String,
    /// Bounding box of the selected range; may be collapsed.
    pub rect: Rect,
    /// Box of the nearest enclosing element, used when `rect` is collapsed.
    pub fallback: Option<Rect>,
}

/// Host state captured when a signal arrives.
#[derive(Debug, Clone, PartialEq)]
pub struct HostContext {
    pub selection: Option<Selection>,
    pub viewport: Viewport,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalOutcome {
    EntryOpened,
    NoSelection,
    NoAnchor,
    Revalidated(RevalidateOutcome),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// Lookup tooltip opened for the clicked annotation.
    Opened { term_id: TermId },
    /// Clicked an annotation whose literal is not in the index. Any open
    /// lookup tooltip is closed; an entry popup stays.
    UnknownTerm { literal: String },
    /// Click landed outside the open overlay and closed it.
    Dismissed,
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The service accepted the mutation; the overlay is closed.
    Completed(ServiceAck),
    /// Nothing to send; the overlay is closed.
    NoChange,
    /// Wrong overlay, empty input, or a request already in flight.
    Ignored,
}

/// The document plus the annotation state bound to it. Receives term-set
/// changes from the orchestrator.
struct LiveDocument<T> {
    tree: T,
    root: NodeId,
    lifecycle: AnnotationLifecycle,
}

impl<T: ContentTree> AnnotationSink for LiveDocument<T> {
    fn initialize(&mut self, originals: &[String]) {
        self.lifecycle.initialize(&mut self.tree, self.root, originals);
    }

    fn refresh(&mut self, originals: &[String]) {
        self.lifecycle.refresh(&mut self.tree, self.root, originals);
    }
}

pub struct Engine<T, S, K> {
    doc: LiveDocument<T>,
    orchestrator: RevalidationOrchestrator<S, K>,
    overlays: OverlaySlot,
    overlay_config: OverlayConfig,
}

impl<T, S, K> Engine<T, S, K>
where
    T: ContentTree,
    S: TermService,
    K: KvStore,
{
    pub fn new(tree: T, root: NodeId, service: S, cache: TermDataCache<K>) -> Self {
        Self {
            doc: LiveDocument { tree, root, lifecycle: AnnotationLifecycle::new(SkipPolicy::default()) },
            orchestrator: RevalidationOrchestrator::new(service, cache),
            overlays: OverlaySlot::new(),
            overlay_config: OverlayConfig::default(),
        }
    }

    /// Apply skip tags and overlay metrics. Call before `boot`.
    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        self.doc.lifecycle = AnnotationLifecycle::new(config.skip_policy());
        self.overlay_config = config.overlay.clone();
        self
    }

    pub fn tree(&self) -> &T {
        &self.doc.tree
    }

    /// Mutable access for host-driven edits. Insertions are picked up by the
    /// next `pump_mutations`.
    pub fn tree_mut(&mut self) -> &mut T {
        &mut self.doc.tree
    }

    pub fn root(&self) -> NodeId {
        self.doc.root
    }

    pub fn into_tree(self) -> T {
        self.doc.tree
    }

    pub fn state(&self) -> LifecycleState {
        self.doc.lifecycle.state()
    }

    pub fn orchestrator(&self) -> &RevalidationOrchestrator<S, K> {
        &self.orchestrator
    }

    pub fn overlay(&self) -> Option<&OpenOverlay> {
        self.overlays.current()
    }

    pub fn lookup(&self, word: &str) -> Option<&IndexedTerm> {
        self.orchestrator.lookup(word)
    }

    pub fn annotations(&self) -> Vec<Annotation> {
        collect_annotations(&self.doc.tree, self.doc.root)
    }

    // ── Startup ────────────────────────────────────────────────────

    /// Paint from the cache, then revalidate against the service.
    pub async fn boot(&mut self) -> BootReport {
        self.orchestrator.boot(&mut self.doc).await
    }

    /// Paint from the cache only. Returns the number of cached terms used.
    pub fn paint_from_cache(&mut self) -> Option<usize> {
        self.orchestrator.paint_stale(&mut self.doc).map(|terms| terms.len())
    }

    /// Annotate content inserted since the last call.
    pub fn pump_mutations(&mut self) -> ScanStats {
        self.doc.lifecycle.pump(&mut self.doc.tree)
    }

    /// Stop observing and close any overlay. Annotations stay in place.
    pub fn teardown(&mut self) {
        self.overlays.close(&mut self.doc.tree);
        self.doc.lifecycle.teardown(&mut self.doc.tree);
    }

    // ── Host signals ───────────────────────────────────────────────

    pub async fn handle_signal(
        &mut self,
        signal: HostSignal,
        context: &HostContext,
    ) -> Result<SignalOutcome, EngineError> {
        debug!(signal = signal.as_str(), "host signal");
        match signal {
            HostSignal::OpenEntryUi => self.open_entry(context),
            HostSignal::ForceRefresh => {
                let outcome = self.orchestrator.force_refresh(&mut self.doc).await;
                Ok(SignalOutcome::Revalidated(outcome))
            }
        }
    }

    fn open_entry(&mut self, context: &HostContext) -> Result<SignalOutcome, EngineError> {
        let Some(selection) = &context.selection else {
            return Ok(SignalOutcome::NoSelection);
        };
        let text = selection.text.trim();
        if text.is_empty() {
            return Ok(SignalOutcome::NoSelection);
        }
        let Some(anchor) = resolve_anchor(selection.rect, selection.fallback) else {
            debug!("selection has no usable box");
            return Ok(SignalOutcome::NoAnchor);
        };

        let content = OverlayContent::Entry { selected_text: text.to_string() };
        self.open_overlay(content, anchor, &context.viewport)?;
        Ok(SignalOutcome::EntryOpened)
    }

    // ── Annotation clicks ──────────────────────────────────────────

    /// Route a click on `target`. `anchor` is the box of the clicked node.
    pub fn click(
        &mut self,
        target: NodeId,
        anchor: Rect,
        viewport: &Viewport,
    ) -> Result<ClickOutcome, EngineError> {
        if self.overlays.contains(&self.doc.tree, target) {
            return Ok(ClickOutcome::Ignored);
        }

        let Some(span) = enclosing_annotation(&self.doc.tree, target) else {
            if self.overlays.close(&mut self.doc.tree).is_some() {
                return Ok(ClickOutcome::Dismissed);
            }
            return Ok(ClickOutcome::Ignored);
        };

        let Some(literal) = annotation_literal(&self.doc.tree, span) else {
            return Ok(ClickOutcome::Ignored);
        };
        let Some(entry) = self.orchestrator.lookup(&literal).cloned() else {
            debug!(literal = %literal, "annotation has no indexed term");
            let tooltip_open =
                matches!(self.overlays.current().map(|open| &open.content), Some(OverlayContent::Lookup { .. }));
            if tooltip_open {
                self.overlays.close(&mut self.doc.tree);
            }
            return Ok(ClickOutcome::UnknownTerm { literal });
        };

        let term_id = entry.id.clone();
        let content =
            OverlayContent::Lookup { term_id: entry.id, original: literal, translated: entry.translated };
        self.open_overlay(content, anchor, viewport)?;
        Ok(ClickOutcome::Opened { term_id })
    }

    // ── Overlay flows ──────────────────────────────────────────────

    /// Create a term from the open entry popup.
    pub async fn submit_entry(&mut self, translation: &str) -> Result<SubmitOutcome, EngineError> {
        let original = match self.overlays.current().map(|open| &open.content) {
            Some(OverlayContent::Entry { selected_text }) => selected_text.clone(),
            _ => return Ok(SubmitOutcome::Ignored),
        };
        let translation = translation.trim();
        if translation.is_empty() {
            return Ok(SubmitOutcome::Ignored);
        }
        if !self.overlays.begin_action(&mut self.doc.tree, OverlayAction::Save, SAVING_LABEL) {
            return Ok(SubmitOutcome::Ignored);
        }

        let result = self.orchestrator.create_term(&original, translation, &mut self.doc).await;
        self.finish(OverlayAction::Save, result)
    }

    /// Swap the open lookup tooltip for an edit popup at the same anchor.
    pub fn begin_edit(&mut self, viewport: &Viewport) -> Result<bool, EngineError> {
        let Some(open) = self.overlays.current() else {
            return Ok(false);
        };
        let OverlayContent::Lookup { term_id, original, translated } = &open.content else {
            return Ok(false);
        };
        let content = OverlayContent::Edit {
            term_id: term_id.clone(),
            original: original.clone(),
            translated: translated.clone(),
        };
        let anchor = open.anchor;
        self.open_overlay(content, anchor, viewport)?;
        Ok(true)
    }

    /// Send the fields typed into the edit popup. Blank fields are left
    /// unchanged; two blank fields close the popup without a request.
    pub async fn submit_edit(
        &mut self,
        original: &str,
        translated: &str,
    ) -> Result<SubmitOutcome, EngineError> {
        let term_id = match self.overlays.current().map(|open| &open.content) {
            Some(OverlayContent::Edit { term_id, .. }) => term_id.clone(),
            _ => return Ok(SubmitOutcome::Ignored),
        };
        let patch = TermPatch {
            original: non_blank(original),
            translated: non_blank(translated),
        };
        if patch.is_empty() {
            self.overlays.close(&mut self.doc.tree);
            return Ok(SubmitOutcome::NoChange);
        }
        if !self.overlays.begin_action(&mut self.doc.tree, OverlayAction::Save, SAVING_LABEL) {
            return Ok(SubmitOutcome::Ignored);
        }

        let result = self.orchestrator.update_term(&term_id, &patch, &mut self.doc).await;
        self.finish(OverlayAction::Save, result)
    }

    /// Delete the term shown in the open lookup tooltip.
    pub async fn delete_current(&mut self) -> Result<SubmitOutcome, EngineError> {
        let term_id = match self.overlays.current().map(|open| &open.content) {
            Some(OverlayContent::Lookup { term_id, .. }) => term_id.clone(),
            _ => return Ok(SubmitOutcome::Ignored),
        };
        if !self.overlays.begin_action(&mut self.doc.tree, OverlayAction::Delete, DELETING_LABEL) {
            return Ok(SubmitOutcome::Ignored);
        }

        let result = self.orchestrator.delete_term(&term_id, &mut self.doc).await;
        self.finish(OverlayAction::Delete, result)
    }

    pub fn close_overlay(&mut self) -> Option<OverlayContent> {
        self.overlays.close(&mut self.doc.tree)
    }

    fn finish(
        &mut self,
        action: OverlayAction,
        result: Result<ServiceAck, ServiceError>,
    ) -> Result<SubmitOutcome, EngineError> {
        match result {
            Ok(ack) => {
                self.overlays.close(&mut self.doc.tree);
                Ok(SubmitOutcome::Completed(ack))
            }
            Err(error) => {
                info!(error = %error, "overlay request failed; control restored");
                self.overlays.restore_action(&mut self.doc.tree, action);
                Err(error.into())
            }
        }
    }

    fn open_overlay(
        &mut self,
        content: OverlayContent,
        anchor: Rect,
        viewport: &Viewport,
    ) -> Result<(), EngineError> {
        let size = match content.style() {
            PlacementStyle::EntryPopup => self.overlay_config.popup_size(),
            PlacementStyle::LookupTooltip => self.overlay_config.tooltip_size(),
        };
        let geometry = place(anchor, size, viewport, content.style(), &self.overlay_config.metrics());
        self.overlays.open(&mut self.doc.tree, self.doc.root, content, anchor, geometry)?;
        Ok(())
    }
}

fn non_blank(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::{ANNOTATION_CLASS, TERM_ATTR};
    use crate::cache::store::MemoryStore;
    use crate::document::markdown::parse_markdown;
    use crate::document::Document;
    use crate::overlay::session::{SAVE_LABEL, SAVING_LABEL};
    use crate::service::MemoryTermService;
    use termlight_common::types::Term;

    type TestEngine = Engine<Document, MemoryTermService, MemoryStore>;

    async fn booted(markdown: &str, remote: Vec<Term>) -> TestEngine {
        let doc = parse_markdown(markdown).unwrap();
        let root = doc.root();
        let mut engine = Engine::new(
            doc,
            root,
            MemoryTermService::with_terms(remote),
            TermDataCache::new(MemoryStore::new()),
        );
        engine.boot().await;
        engine
    }

    fn viewport() -> Viewport {
        Viewport::new(1000.0, 800.0)
    }

    fn context(text: &str, rect: Rect) -> HostContext {
        HostContext {
            selection: Some(Selection { text: text.into(), rect, fallback: None }),
            viewport: viewport(),
        }
    }

    fn first_annotation_text(engine: &TestEngine) -> NodeId {
        let span = engine.tree().find_by_class(engine.root(), ANNOTATION_CLASS)[0];
        engine.tree().children(span)[0]
    }

    #[tokio::test]
    async fn boot_annotates_document() {
        let engine = booted("the cat sat", vec![Term::new("1", "cat", "gato")]).await;
        assert_eq!(engine.state(), LifecycleState::Active);
        let annotations = engine.annotations();
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].matched_text, "cat");
    }

    #[tokio::test]
    async fn open_entry_places_popup_below_selection() {
        let mut engine = booted("the cat sat", vec![]).await;
        let outcome = engine
            .handle_signal(HostSignal::OpenEntryUi, &context(" sat ", Rect::new(100.0, 100.0, 20.0, 10.0)))
            .await
            .unwrap();
        assert_eq!(outcome, SignalOutcome::EntryOpened);

        let open = engine.overlay().unwrap();
        assert_eq!(open.content, OverlayContent::Entry { selected_text: "sat".into() });
        assert_eq!(open.geometry.top, 116.0);
        assert!(open.geometry.placed_below);
    }

    #[tokio::test]
    async fn open_entry_without_selection_or_box() {
        let mut engine = booted("the cat sat", vec![]).await;
        let empty = HostContext { selection: None, viewport: viewport() };
        let outcome = engine.handle_signal(HostSignal::OpenEntryUi, &empty).await.unwrap();
        assert_eq!(outcome, SignalOutcome::NoSelection);

        let blank = context("   ", Rect::new(1.0, 1.0, 1.0, 1.0));
        let outcome = engine.handle_signal(HostSignal::OpenEntryUi, &blank).await.unwrap();
        assert_eq!(outcome, SignalOutcome::NoSelection);

        let collapsed = context("cat", Rect::default());
        let outcome = engine.handle_signal(HostSignal::OpenEntryUi, &collapsed).await.unwrap();
        assert_eq!(outcome, SignalOutcome::NoAnchor);
        assert!(engine.overlay().is_none());
    }

    #[tokio::test]
    async fn force_refresh_picks_up_remote_changes() {
        let mut engine = booted("the cat sat on the dog", vec![Term::new("1", "cat", "gato")]).await;
        engine.orchestrator().service().replace_terms(vec![Term::new("2", "dog", "cão")]);

        let empty = HostContext { selection: None, viewport: viewport() };
        let outcome = engine.handle_signal(HostSignal::ForceRefresh, &empty).await.unwrap();
        assert_eq!(outcome, SignalOutcome::Revalidated(RevalidateOutcome::Refreshed { terms: 1 }));
        let texts: Vec<_> = engine.annotations().into_iter().map(|a| a.matched_text).collect();
        assert_eq!(texts, vec!["dog"]);
    }

    fn append_unindexed_annotation(engine: &mut TestEngine, literal: &str) -> NodeId {
        let root = engine.root();
        let tree = engine.tree_mut();
        let span = tree.append_element(root, "span").unwrap();
        tree.set_attribute(span, "class", ANNOTATION_CLASS).unwrap();
        tree.set_attribute(span, TERM_ATTR, literal).unwrap();
        tree.append_text(span, literal).unwrap()
    }

    #[tokio::test]
    async fn unknown_term_click_closes_tooltip_but_keeps_entry_popup() {
        let mut engine = booted("the cat sat", vec![Term::new("1", "cat", "gato")]).await;
        let stray = append_unindexed_annotation(&mut engine, "bird");
        let target = first_annotation_text(&engine);
        engine.click(target, Rect::new(50.0, 200.0, 30.0, 16.0), &viewport()).unwrap();
        assert!(engine.overlay().is_some());

        let outcome = engine.click(stray, Rect::new(10.0, 10.0, 20.0, 16.0), &viewport()).unwrap();
        assert_eq!(outcome, ClickOutcome::UnknownTerm { literal: "bird".into() });
        assert!(engine.overlay().is_none());

        engine
            .handle_signal(HostSignal::OpenEntryUi, &context("sat", Rect::new(10.0, 10.0, 20.0, 10.0)))
            .await
            .unwrap();
        let outcome = engine.click(stray, Rect::new(10.0, 10.0, 20.0, 16.0), &viewport()).unwrap();
        assert_eq!(outcome, ClickOutcome::UnknownTerm { literal: "bird".into() });
        assert!(matches!(engine.overlay().map(|o| &o.content), Some(OverlayContent::Entry { .. })));
    }

    #[tokio::test]
    async fn clicking_annotation_opens_lookup() {
        let mut engine = booted("the Cat sat", vec![Term::new("1", "cat", "gato")]).await;
        let target = first_annotation_text(&engine);

        let outcome = engine.click(target, Rect::new(50.0, 200.0, 30.0, 16.0), &viewport()).unwrap();
        assert_eq!(outcome, ClickOutcome::Opened { term_id: TermId::from("1") });
        match &engine.overlay().unwrap().content {
            OverlayContent::Lookup { original, translated, .. } => {
                assert_eq!(original, "Cat");
                assert_eq!(translated, "gato");
            }
            other => panic!("unexpected overlay {other:?}"),
        }
    }

    #[tokio::test]
    async fn click_outside_dismisses_and_inside_is_ignored() {
        let mut engine = booted("the cat sat", vec![Term::new("1", "cat", "gato")]).await;
        let target = first_annotation_text(&engine);
        engine.click(target, Rect::new(50.0, 200.0, 30.0, 16.0), &viewport()).unwrap();

        let inside = engine.overlay().unwrap().node;
        assert_eq!(engine.click(inside, Rect::default(), &viewport()).unwrap(), ClickOutcome::Ignored);
        assert!(engine.overlay().is_some());

        let root = engine.root();
        assert_eq!(engine.click(root, Rect::default(), &viewport()).unwrap(), ClickOutcome::Dismissed);
        assert!(engine.overlay().is_none());
        assert_eq!(engine.click(root, Rect::default(), &viewport()).unwrap(), ClickOutcome::Ignored);
    }

    #[tokio::test]
    async fn submit_entry_creates_and_reannotates() {
        let mut engine = booted("the cat sat", vec![]).await;
        engine
            .handle_signal(HostSignal::OpenEntryUi, &context("sat", Rect::new(10.0, 10.0, 20.0, 10.0)))
            .await
            .unwrap();

        assert_eq!(engine.submit_entry("  ").await.unwrap(), SubmitOutcome::Ignored);
        let outcome = engine.submit_entry("sentou").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed(_)));
        assert!(engine.overlay().is_none());
        assert_eq!(engine.lookup("sat").unwrap().translated, "sentou");
        assert_eq!(engine.annotations().len(), 1);
    }

    #[tokio::test]
    async fn failed_save_restores_label_and_keeps_popup() {
        let mut engine = booted("the cat sat", vec![]).await;
        engine
            .handle_signal(HostSignal::OpenEntryUi, &context("sat", Rect::new(10.0, 10.0, 20.0, 10.0)))
            .await
            .unwrap();
        engine
            .orchestrator()
            .service()
            .fail_next_mutation(ServiceError::Status { status: 500, message: "down".into() });

        let err = engine.submit_entry("sentou").await.unwrap_err();
        assert!(matches!(err, EngineError::Service(ServiceError::Status { status: 500, .. })));

        let open = engine.overlay().unwrap();
        let control = open.control(OverlayAction::Save).unwrap();
        assert!(!control.is_busy());
        assert_eq!(control.label(), SAVE_LABEL);
        assert_ne!(control.label(), SAVING_LABEL);
        assert!(engine.tree().text_content(open.node).ends_with(SAVE_LABEL));
    }

    #[tokio::test]
    async fn edit_flow_sends_only_typed_fields() {
        let mut engine = booted("the cat sat", vec![Term::new("1", "cat", "gato")]).await;
        let target = first_annotation_text(&engine);
        engine.click(target, Rect::new(50.0, 200.0, 30.0, 16.0), &viewport()).unwrap();
        assert!(engine.begin_edit(&viewport()).unwrap());
        assert!(matches!(engine.overlay().unwrap().content, OverlayContent::Edit { .. }));

        let outcome = engine.submit_edit("", "felino").await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed(_)));
        assert_eq!(engine.orchestrator().service().terms(), vec![Term::new("1", "cat", "felino")]);
        assert_eq!(engine.lookup("cat").unwrap().translated, "felino");
    }

    #[tokio::test]
    async fn blank_edit_closes_without_request() {
        let mut engine = booted("the cat sat", vec![Term::new("1", "cat", "gato")]).await;
        let target = first_annotation_text(&engine);
        engine.click(target, Rect::new(50.0, 200.0, 30.0, 16.0), &viewport()).unwrap();
        engine.begin_edit(&viewport()).unwrap();

        assert_eq!(engine.submit_edit(" ", "").await.unwrap(), SubmitOutcome::NoChange);
        assert!(engine.overlay().is_none());
        assert_eq!(engine.lookup("cat").unwrap().translated, "gato");
    }

    #[tokio::test]
    async fn delete_removes_annotation() {
        let mut engine = booted("the cat sat", vec![Term::new("1", "cat", "gato")]).await;
        let target = first_annotation_text(&engine);
        engine.click(target, Rect::new(50.0, 200.0, 30.0, 16.0), &viewport()).unwrap();

        let outcome = engine.delete_current().await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Completed(_)));
        assert!(engine.annotations().is_empty());
        assert!(engine.lookup("cat").is_none());
        assert_eq!(engine.state(), LifecycleState::Idle);
    }

    #[tokio::test]
    async fn appended_content_is_annotated_on_pump() {
        let mut engine = booted("intro", vec![Term::new("1", "cat", "gato")]).await;
        let root = engine.root();
        let p = engine.tree_mut().append_element(root, "p").unwrap();
        engine.tree_mut().append_text(p, "a cat appears").unwrap();

        let stats = engine.pump_mutations();
        assert_eq!(stats.annotations, 1);
        assert_eq!(engine.annotations()[0].matched_text, "cat");
    }
}
