//! Local mirror of the signed-in user's documents.
//!
//! [`DocumentSyncStore`] fetches the user's documents from the remote service,
//! keeps them newest first, and applies creates and deletes locally once the
//! service has confirmed them. Nothing is applied optimistically: a failed
//! call leaves the collection exactly as it was.
//!
//! # Phases
//!
//! ```text
//! Uninitialized ──fetch_all──▶ Loading ──(ok or err)──▶ Ready ◀──create/delete/fetch_all
//!        │                        │                       │
//!        └────────────────────────┴────────unmount────────┴──▶ Detached
//! ```
//!
//! # Concurrency
//!
//! Operations are not serialized against each other. Each one suspends at its
//! service call and applies its result when the response arrives, so two
//! overlapping mutations land in response order, not call order. The lock
//! guarding the collection is only taken for the synchronous read or write and
//! is never held across an await.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::Utc;
use docdesk_core::error::{DocdeskError, Result, ServiceError};
use docdesk_core::model::{AuthUser, Document, DocumentType, NewDocument, normalize_title};
use docdesk_core::search::filter_by_title;
use docdesk_core::service::{AuthService, DocumentTable};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::notify::{Notification, Notifier};

/// Lifecycle phase of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPhase {
    /// Created, no fetch started yet.
    Uninitialized,
    /// First fetch in flight.
    Loading,
    /// First fetch finished, successfully or not.
    Ready,
    /// Unmounted. State updates are dropped.
    Detached,
}

/// What the presentation layer renders from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSnapshot {
    /// The user's documents, newest first.
    pub documents: Vec<Document>,
    /// True while a fetch is outstanding or before the first one.
    pub loading: bool,
}

#[derive(Debug)]
struct Collection {
    phase: SyncPhase,
    /// User the documents belong to.
    owner: Option<String>,
    documents: Vec<Document>,
    fetches_in_flight: usize,
}

impl Collection {
    fn new() -> Self {
        Self {
            phase: SyncPhase::Uninitialized,
            owner: None,
            documents: Vec::new(),
            fetches_in_flight: 0,
        }
    }

    fn loading(&self) -> bool {
        match self.phase {
            SyncPhase::Uninitialized | SyncPhase::Loading => true,
            SyncPhase::Ready => self.fetches_in_flight > 0,
            SyncPhase::Detached => false,
        }
    }

    fn begin_fetch(&mut self) {
        if self.phase == SyncPhase::Uninitialized {
            self.phase = SyncPhase::Loading;
        }
        self.fetches_in_flight += 1;
    }

    fn end_fetch(&mut self) {
        self.fetches_in_flight = self.fetches_in_flight.saturating_sub(1);
        if self.phase == SyncPhase::Loading {
            self.phase = SyncPhase::Ready;
        }
    }

    /// Bind the collection to `user_id`, dropping another user's documents.
    fn adopt_owner(&mut self, user_id: &str) {
        if self.owner.as_deref() != Some(user_id) {
            if self.owner.is_some() {
                debug!(
                    previous = ?self.owner,
                    current = user_id,
                    "session user changed; clearing collection"
                );
            }
            self.documents.clear();
            self.owner = Some(user_id.to_string());
        }
    }

    fn clear(&mut self) {
        self.documents.clear();
        self.owner = None;
    }
}

struct Inner {
    auth: Arc<dyn AuthService>,
    table: Arc<dyn DocumentTable>,
    notifier: Arc<dyn Notifier>,
    state: RwLock<Collection>,
}

/// Client-side mirror of one user's documents.
///
/// Cloning is cheap and every clone shares the same collection, so a page and
/// its dialogs can hold the same store.
#[derive(Clone)]
pub struct DocumentSyncStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for DocumentSyncStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read_state();
        f.debug_struct("DocumentSyncStore")
            .field("phase", &state.phase)
            .field("owner", &state.owner)
            .field("documents", &state.documents.len())
            .finish()
    }
}

impl DocumentSyncStore {
    /// Create an empty, uninitialized store.
    ///
    /// `auth` supplies the session user for every operation; `table` is where
    /// documents are read and written; `notifier` receives fetch failures.
    pub fn new(
        auth: Arc<dyn AuthService>,
        table: Arc<dyn DocumentTable>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                auth,
                table,
                notifier,
                state: RwLock::new(Collection::new()),
            }),
        }
    }

    /// Create a store and run the initial fetch.
    ///
    /// A failed initial fetch still yields a usable store in
    /// [`SyncPhase::Ready`]; the failure has already been notified.
    pub async fn mount(
        auth: Arc<dyn AuthService>,
        table: Arc<dyn DocumentTable>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let store = Self::new(auth, table, notifier);
        if let Err(err) = store.fetch_all().await {
            debug!(%err, "initial fetch failed");
        }
        store
    }

    /// Replace the collection with the session user's documents.
    ///
    /// Failures are notified here, once, and the previous collection is kept.
    /// The returned error is informational; background refreshes can ignore it.
    /// Without a session the collection is emptied and
    /// [`DocdeskError::Unauthenticated`] is returned.
    pub async fn fetch_all(&self) -> Result<usize> {
        self.update(Collection::begin_fetch);

        let outcome = match self.load().await {
            Ok((user, documents)) => {
                let count = documents.len();
                self.update(|c| {
                    c.adopt_owner(&user.id);
                    c.documents = documents;
                });
                debug!(user = %user.id, count, "documents fetched");
                Ok(count)
            }
            Err(err) => {
                if err == DocdeskError::Unauthenticated {
                    self.update(Collection::clear);
                }
                warn!(%err, "Error fetching documents");
                if self.phase() != SyncPhase::Detached {
                    self.inner.notifier.notify(Notification::FetchFailed {
                        reason: err.to_string(),
                    });
                }
                Err(err)
            }
        };

        self.update(Collection::end_fetch);
        outcome
    }

    /// Same as [`fetch_all`](Self::fetch_all); the dashboard's refresh action.
    pub async fn refresh(&self) -> Result<usize> {
        self.fetch_all().await
    }

    async fn load(&self) -> Result<(AuthUser, Vec<Document>)> {
        let user = self.require_user().await?;
        let rows = self.inner.table.list_documents(&user.id).await?;
        let total = rows.len();
        let owned: Vec<Document> = rows
            .into_iter()
            .filter(|doc| doc.created_by == user.id)
            .collect();
        if owned.len() != total {
            warn!(
                user = %user.id,
                dropped = total - owned.len(),
                "service returned documents owned by another user"
            );
        }
        Ok((user, owned))
    }

    /// Create a draft document and put it at the front of the collection.
    ///
    /// The title is trimmed and must not be blank. Errors are returned to the
    /// caller without touching the collection or notifying; the caller decides
    /// what to show.
    pub async fn create(&self, title: &str, document_type: DocumentType) -> Result<Document> {
        let title = normalize_title(title)?;
        let user = self.require_user().await?;
        let draft = NewDocument::draft(&title, document_type, &user.id, Utc::now())?;

        let created = self
            .inner
            .table
            .insert_document(&draft)
            .await
            .inspect_err(|err| warn!(%err, "Error creating document"))?;

        if created.created_by != user.id {
            warn!(id = %created.id, owner = %created.created_by, "inserted document has wrong owner");
            return Err(ServiceError::Decode(format!(
                "inserted document {} is owned by {}, expected {}",
                created.id, created.created_by, user.id
            ))
            .into());
        }

        self.update(|c| {
            c.adopt_owner(&user.id);
            c.documents.insert(0, created.clone());
        });
        info!(id = %created.id, document_type = %created.document_type, "document created");
        Ok(created)
    }

    /// Delete a document remotely, then drop it from the collection.
    ///
    /// Deleting an id that is not in the collection is not an error.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.inner
            .table
            .delete_document(id)
            .await
            .inspect_err(|err| warn!(%err, id, "Error deleting document"))?;

        self.update(|c| c.documents.retain(|doc| doc.id != id));
        info!(id, "document deleted");
        Ok(())
    }

    /// Discard the collection and stop applying results.
    ///
    /// Calls still in flight complete against the service, but their local
    /// updates become no-ops and fetch failures are no longer notified.
    pub fn unmount(&self) {
        let mut state = self.write_state();
        state.clear();
        state.phase = SyncPhase::Detached;
        state.fetches_in_flight = 0;
        debug!("document store unmounted");
    }

    /// Documents, newest first.
    pub fn documents(&self) -> Vec<Document> {
        self.read_state().documents.clone()
    }

    /// True before the first fetch completes and while any fetch is in flight.
    pub fn loading(&self) -> bool {
        self.read_state().loading()
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SyncPhase {
        self.read_state().phase
    }

    /// Documents and loading flag, read together.
    pub fn snapshot(&self) -> CollectionSnapshot {
        let state = self.read_state();
        CollectionSnapshot {
            documents: state.documents.clone(),
            loading: state.loading(),
        }
    }

    /// User the collection currently belongs to.
    pub fn owner(&self) -> Option<String> {
        self.read_state().owner.clone()
    }

    /// The document with this id, if present locally.
    pub fn get(&self, id: &str) -> Option<Document> {
        self.read_state()
            .documents
            .iter()
            .find(|doc| doc.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.read_state().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_state().documents.is_empty()
    }

    /// Local documents whose title contains `query`, ignoring case.
    pub fn search(&self, query: &str) -> Vec<Document> {
        let state = self.read_state();
        filter_by_title(&state.documents, query)
            .into_iter()
            .cloned()
            .collect()
    }

    async fn require_user(&self) -> Result<AuthUser> {
        self.inner
            .auth
            .current_user()
            .await?
            .ok_or(DocdeskError::Unauthenticated)
    }

    /// Apply `f` unless the store has been unmounted.
    fn update(&self, f: impl FnOnce(&mut Collection)) {
        let mut state = self.write_state();
        if state.phase == SyncPhase::Detached {
            debug!("store unmounted; dropping state update");
            return;
        }
        f(&mut state);
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, Collection> {
        self.inner
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, Collection> {
        self.inner
            .state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
