pub mod error;
pub mod factory;
pub mod history;
pub mod mutation;
pub mod template;
pub mod verify;

pub use error::EngineError;
pub use factory::{find_duplicate_symbols, resolve_symbol_collision, SymbolResolution};
pub use history::{HistoryManager, DEFAULT_HISTORY_DEPTH};
pub use mutation::{DeletionOutcome, DeletionPlan};
pub use template::{Template, TemplateNode};
pub use verify::{
    ComputeClient, ComputeError, DocxExport, UnitCheckVerdict, VerificationResult,
};

use tracing::{info, warn};

use calcgraph_core::{
    ActorId, DocumentId, EngineIdentity, MonotonicClock, NodeId, WorksheetDocument,
};
use calcgraph_storage::{interchange, DocumentStore};

/// One editing session over one live document.
///
/// The session is the only authorized mutation path: it owns the
/// document, the monotonic clock stamping `updated_at`, the identity
/// signing audit entries, the undo/redo stacks, and the UI-facing
/// selection/dirty/error state. All of that is replaced together when a
/// different document is installed.
pub struct Session {
    pub(crate) document: WorksheetDocument,
    pub(crate) clock: MonotonicClock,
    pub(crate) identity: EngineIdentity,
    pub(crate) history: HistoryManager,
    pub(crate) selected: Option<NodeId>,
    pub(crate) dirty: bool,
    pub(crate) is_verifying: bool,
    pub(crate) last_error: Option<String>,
}

impl Session {
    pub fn new(name: &str) -> Self {
        Self::with_identity(name, EngineIdentity::generate())
    }

    pub fn with_identity(name: &str, identity: EngineIdentity) -> Self {
        let mut clock = MonotonicClock::new();
        let document = WorksheetDocument::new(name, &mut clock);
        info!(document = %document.id, name, "created document");
        Self {
            document,
            clock,
            identity,
            history: HistoryManager::new(DEFAULT_HISTORY_DEPTH),
            selected: None,
            dirty: false,
            is_verifying: false,
            last_error: None,
        }
    }

    pub fn document(&self) -> &WorksheetDocument {
        &self.document
    }

    pub fn selected_node(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_verifying(&self) -> bool {
        self.is_verifying
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    pub fn actor_id(&self) -> ActorId {
        self.identity.actor_id()
    }

    pub fn undo_depth(&self) -> usize {
        self.history.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.history.redo_depth()
    }

    /// Replace the live document, dropping per-document state: undo/redo
    /// stacks, selection, dirty flag, and the error field.
    pub(crate) fn install(&mut self, document: WorksheetDocument) {
        self.document = document;
        self.history.reset();
        self.selected = None;
        self.dirty = false;
        self.last_error = None;
    }

    /// Stamp the document and mark it dirty after a mutation.
    pub(crate) fn touch(&mut self) {
        self.document.updated_at = self.clock.tick();
        self.dirty = true;
    }

    /// Push an undo snapshot of the current state. A failure abandons the
    /// pending operation: the error is recorded and the document is left
    /// exactly as it was.
    pub(crate) fn snapshot(&mut self) -> bool {
        match self.history.push_snapshot(&self.document) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "snapshot failed; operation abandoned");
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    /// Restore the most recent snapshot. Returns whether anything was
    /// undone.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(&self.document) {
            Ok(Some(document)) => {
                self.document = document;
                self.dirty = true;
                self.drop_stale_selection();
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    /// Reapply the most recently undone state. Returns whether anything
    /// was redone.
    pub fn redo(&mut self) -> bool {
        match self.history.redo(&self.document) {
            Ok(Some(document)) => {
                self.document = document;
                self.dirty = true;
                self.drop_stale_selection();
                true
            }
            Ok(None) => false,
            Err(e) => {
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    fn drop_stale_selection(&mut self) {
        if let Some(id) = self.selected
            && !self.document.contains_node(id)
        {
            self.selected = None;
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Serialize and store the live document under its id.
    pub fn save_to(&mut self, store: &mut dyn DocumentStore) -> Result<(), EngineError> {
        self.document.updated_at = self.clock.tick();
        let blob = match interchange::encode(&self.document) {
            Ok(blob) => blob,
            Err(e) => {
                self.last_error = Some(e.to_string());
                return Err(e.into());
            }
        };
        let saved_at = self.clock.tick();
        if let Err(e) = store.put(self.document.id, &self.document.name, saved_at, &blob) {
            self.last_error = Some(e.to_string());
            return Err(e.into());
        }
        self.dirty = false;
        info!(document = %self.document.id, bytes = blob.len(), "saved document");
        Ok(())
    }

    /// Load a stored document, replacing the live one. Any failure —
    /// missing key, corrupt blob, unparseable payload — records the error
    /// and installs a known-good fresh document instead of leaving the
    /// session empty.
    pub fn open_from(&mut self, store: &dyn DocumentStore, id: DocumentId) {
        let failure = match store.get(id) {
            Ok(Some(blob)) => match interchange::decode(&blob) {
                Ok(document) => {
                    info!(document = %document.id, "opened document");
                    self.install(document);
                    return;
                }
                Err(e) => e.to_string(),
            },
            Ok(None) => format!("document {id} not found"),
            Err(e) => e.to_string(),
        };

        warn!(error = %failure, "open failed; falling back to a fresh document");
        let fallback = WorksheetDocument::new("Untitled", &mut self.clock);
        self.install(fallback);
        self.last_error = Some(failure);
    }

    /// Open whichever document was saved last, with the same fallback
    /// behavior as `open_from`.
    pub fn open_most_recent(&mut self, store: &dyn DocumentStore) {
        match store.most_recent() {
            Ok(Some(entry)) => self.open_from(store, entry.document_id),
            Ok(None) => {
                let fallback = WorksheetDocument::new("Untitled", &mut self.clock);
                self.install(fallback);
                self.last_error = Some("store has no documents".to_string());
            }
            Err(e) => {
                let failure = e.to_string();
                warn!(error = %failure, "index lookup failed; falling back to a fresh document");
                let fallback = WorksheetDocument::new("Untitled", &mut self.clock);
                self.install(fallback);
                self.last_error = Some(failure);
            }
        }
    }

    /// Install a document from interchange bytes. A malformed payload is
    /// rejected before any state changes; the current document survives.
    pub fn import_bytes(&mut self, bytes: &[u8]) -> Result<(), EngineError> {
        match interchange::decode(bytes) {
            Ok(document) => {
                info!(document = %document.id, "imported document");
                self.install(document);
                self.dirty = true;
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "import rejected");
                self.last_error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// The live document as interchange bytes.
    pub fn export_bytes(&self) -> Result<Vec<u8>, EngineError> {
        Ok(interchange::encode(&self.document)?)
    }

    /// Hand the document to the compute collaborator for DOCX export.
    pub fn export_docx(&self, client: &dyn ComputeClient) -> Result<DocxExport, EngineError> {
        Ok(client.export_docx(
            &self.document.name,
            &self.document.nodes,
            &self.document.assumptions,
        )?)
    }

    /// Hydrate a template into a fresh document and install it.
    pub fn load_template(&mut self, template: &Template) {
        let document = template::hydrate(template, &mut self.clock);
        info!(document = %document.id, template = %template.name, "hydrated template");
        self.install(document);
        self.dirty = true;
    }
}
