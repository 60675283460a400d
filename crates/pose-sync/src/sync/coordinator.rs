//! SyncCoordinator: owns the working copy and keeps it in sync with the
//! remote document.
//!
//! Mutations apply to the in-memory working copy immediately, persist the
//! dirty flag, refresh the document cache and re-arm a debounce timer. When
//! the timer fires a flush is appended to a single-flight FIFO queue, so at
//! most one remote write is ever in flight. Reconciles run through the same
//! queue.
//!
//! Every durable side effect that depends on the working copy (dirty flag,
//! cached snapshot) happens while the state lock is held, so a slow flush
//! can never overwrite the marker left by a newer mutation.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::cache::{DirtyFlag, DocumentCache, ReadOptions};
use crate::clock::{Clock, SystemClock};
use crate::document::{Document, DocumentSnapshot, PoseSet};
use crate::error::{StoreError, SyncError};
use crate::store::{RemoteDocumentStore, WriteReceipt};

use super::debounce::Debouncer;
use super::merge::{merge_documents, merge_with_report};
use super::queue::SerialQueue;
use super::types::*;

struct CoordinatorState {
    phase: SyncState,
    document: Document,
    remote_id: Option<String>,
    fingerprint: Option<String>,
    last_modified: Option<String>,
    dirty: bool,
    /// Bumped on every local mutation.
    revision: u64,
    /// Set once `hydrate` has run; until then the cached snapshot is not
    /// overwritten.
    hydrated: bool,
    auth_paused: bool,
}

impl CoordinatorState {
    fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            document: self.document.clone(),
            remote_id: self.remote_id.clone(),
            fingerprint: self.fingerprint.clone(),
            last_modified: self.last_modified.clone(),
        }
    }

    fn settled_phase(&self) -> SyncState {
        if self.dirty {
            SyncState::Dirty
        } else {
            SyncState::Idle
        }
    }
}

pub struct SyncCoordinator {
    store: Arc<dyn RemoteDocumentStore>,
    cache: DocumentCache,
    dirty_flag: DirtyFlag,
    clock: Arc<dyn Clock>,
    state: Mutex<CoordinatorState>,
    queue: SerialQueue,
    debouncer: Debouncer,
    on_error: Option<Arc<SyncErrorCallback>>,
    on_state_change: Option<Arc<StateChangeCallback>>,
    weak_self: Weak<SyncCoordinator>,
}

impl SyncCoordinator {
    pub fn new(options: SyncCoordinatorOptions) -> Arc<Self> {
        let clock = options
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let config = options.config;

        Arc::new_cyclic(|weak_self| Self {
            store: options.store,
            cache: DocumentCache::new(options.kv.clone(), &config, clock.clone()),
            dirty_flag: DirtyFlag::new(options.kv, config.dirty_flag_key())
                .protecting(config.document_cache_key()),
            clock,
            state: Mutex::new(CoordinatorState {
                phase: SyncState::Uninitialized,
                document: Document::default(),
                remote_id: None,
                fingerprint: None,
                last_modified: None,
                dirty: false,
                revision: 0,
                hydrated: false,
                auth_paused: false,
            }),
            queue: SerialQueue::new(),
            debouncer: Debouncer::new(config.debounce()),
            on_error: options.on_error,
            on_state_change: options.on_state_change,
            weak_self: weak_self.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Read API
    // -----------------------------------------------------------------------

    pub fn state(&self) -> SyncState {
        self.state.lock().phase
    }

    pub fn document(&self) -> Document {
        self.state.lock().document.clone()
    }

    pub fn sets(&self) -> Vec<PoseSet> {
        self.state.lock().document.sets.clone()
    }

    pub fn get_set(&self, id: &str) -> Option<PoseSet> {
        self.state.lock().document.get(id).cloned()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn is_auth_paused(&self) -> bool {
        self.state.lock().auth_paused
    }

    pub fn remote_id(&self) -> Option<String> {
        self.state.lock().remote_id.clone()
    }

    pub fn fingerprint(&self) -> Option<String> {
        self.state.lock().fingerprint.clone()
    }

    // -----------------------------------------------------------------------
    // Hydrate
    // -----------------------------------------------------------------------

    /// Load the cached snapshot and the persisted dirty flag.
    ///
    /// A persisted dirty flag forces a stale read so unsynced edits from a
    /// previous session are never dropped for being old. Edits made before
    /// hydration are merged over the cached copy.
    pub fn hydrate(&self, opts: ReadOptions) -> HydrateOutcome {
        self.transition(SyncState::Hydrating);

        let persisted_dirty = self.dirty_flag.load();
        let cached = self.cache.read(opts).or_else(|| {
            if persisted_dirty && !opts.allow_stale {
                self.cache.read(ReadOptions::allow_stale())
            } else {
                None
            }
        });

        let outcome = {
            let mut st = self.state.lock();
            let from_cache = cached.is_some();
            if let Some(snapshot) = cached {
                st.document = if st.revision > 0 {
                    merge_documents(&st.document, &snapshot.document)
                } else {
                    snapshot.document
                };
                st.remote_id = snapshot.remote_id;
                st.fingerprint = snapshot.fingerprint;
                st.last_modified = snapshot.last_modified;
            }
            if st.revision > 0 {
                self.cache.write(&st.snapshot());
            }
            st.dirty = st.dirty || persisted_dirty;
            st.hydrated = true;
            HydrateOutcome {
                from_cache,
                dirty: st.dirty,
                sets: st.document.len(),
            }
        };

        tracing::info!(
            from_cache = outcome.from_cache,
            dirty = outcome.dirty,
            sets = outcome.sets,
            "hydrated working copy"
        );
        self.settle();
        outcome
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Apply an edit to the working copy.
    ///
    /// `edit` runs against a draft and returns the ids of the sets it
    /// touched; those get a fresh `updatedAt`. The draft is committed only if
    /// `edit` succeeds and ids stay unique. On commit the dirty flag and the
    /// cached snapshot are written immediately and a coalesced flush is
    /// scheduled. Edits made before `hydrate` stay in memory until it runs.
    pub fn mutate<F>(&self, edit: F) -> Result<(), SyncError>
    where
        F: FnOnce(&mut Document) -> Result<Vec<String>, SyncError>,
    {
        let transition = {
            let mut st = self.state.lock();
            let mut draft = st.document.clone();
            let touched = edit(&mut draft)?;
            draft.check_unique_ids()?;

            let now = self.clock.now_ms();
            for id in &touched {
                let previous = st.document.get(id).and_then(|s| s.updated_at);
                if let Some(set) = draft.get_mut(id) {
                    set.updated_at = Some(next_stamp(now, previous.max(set.updated_at)));
                }
            }

            st.document = draft;
            st.dirty = true;
            st.revision += 1;
            self.dirty_flag.store(true);
            if st.hydrated {
                self.cache.write(&st.snapshot());
            }

            let from = st.phase;
            if matches!(from, SyncState::Idle | SyncState::Uninitialized) {
                st.phase = SyncState::Dirty;
                Some((from, SyncState::Dirty))
            } else {
                None
            }
        };

        if let Some((from, to)) = transition {
            self.notify_transition(from, to);
        }
        self.schedule_flush();
        Ok(())
    }

    pub fn create_set(&self, set: PoseSet) -> Result<(), SyncError> {
        self.mutate(move |doc| {
            if doc.get(&set.id).is_some() {
                return Err(SyncError::DuplicateSet(set.id));
            }
            let id = set.id.clone();
            doc.sets.push(set);
            Ok(vec![id])
        })
    }

    /// Edit one set in place. The set's id cannot be changed.
    pub fn update_set<F>(&self, id: &str, edit: F) -> Result<(), SyncError>
    where
        F: FnOnce(&mut PoseSet),
    {
        self.mutate(|doc| {
            let set = doc
                .get_mut(id)
                .ok_or_else(|| SyncError::UnknownSet(id.to_string()))?;
            edit(set);
            set.id = id.to_string();
            Ok(vec![id.to_string()])
        })
    }

    pub fn delete_set(&self, id: &str) -> Result<(), SyncError> {
        self.mutate(|doc| {
            let pos = doc
                .position(id)
                .ok_or_else(|| SyncError::UnknownSet(id.to_string()))?;
            doc.sets.remove(pos);
            Ok(Vec::new())
        })
    }

    /// Move the listed sets to the front in the given order; unlisted sets
    /// keep their relative order after them. Unknown ids are ignored.
    pub fn reorder_sets(&self, order: &[String]) -> Result<(), SyncError> {
        self.mutate(|doc| {
            let mut rest = std::mem::take(&mut doc.sets);
            let mut front = Vec::with_capacity(order.len());
            for id in order {
                if let Some(pos) = rest.iter().position(|s| &s.id == id) {
                    front.push(rest.remove(pos));
                }
            }
            front.extend(rest);
            doc.sets = front;
            Ok(Vec::new())
        })
    }

    // -----------------------------------------------------------------------
    // Flush
    // -----------------------------------------------------------------------

    /// Cancel the debounce timer and flush through the queue now.
    pub async fn flush_now(&self) -> Result<FlushOutcome, SyncError> {
        self.debouncer.cancel();
        let this = self.strong()?;
        this.enqueue_flush()
            .await
            .map_err(|_| SyncError::QueueClosed)?
    }

    /// Lift an auth pause. Pending edits are flushed on the usual schedule.
    pub fn resume_after_reauth(&self) {
        let dirty = {
            let mut st = self.state.lock();
            st.auth_paused = false;
            st.dirty
        };
        tracing::info!(dirty, "remote sync resumed after re-authentication");
        if dirty {
            self.schedule_flush();
        }
    }

    fn schedule_flush(&self) {
        let weak = self.weak_self.clone();
        let armed = self.debouncer.schedule(move || {
            if let Some(this) = weak.upgrade() {
                // Outcome is reported through on_error / tracing.
                drop(this.enqueue_flush());
            }
        });
        if !armed {
            tracing::warn!("no async runtime, flush deferred until the next reconcile");
        }
    }

    fn enqueue_flush(
        self: &Arc<Self>,
    ) -> tokio::sync::oneshot::Receiver<Result<FlushOutcome, SyncError>> {
        let this = Arc::clone(self);
        self.queue.push(async move { this.flush_job().await })
    }

    async fn flush_job(&self) -> Result<FlushOutcome, SyncError> {
        {
            let st = self.state.lock();
            if st.auth_paused {
                return Err(SyncError::AuthPaused);
            }
            if !st.dirty {
                return Ok(FlushOutcome::Clean);
            }
        }

        self.transition(SyncState::Flushing);
        let result = self.flush_inner().await;
        self.settle();

        match &result {
            Ok(outcome) => tracing::debug!(?outcome, "flush finished"),
            Err(err) => self.report(SyncPhase::Flush, err),
        }
        result
    }

    async fn flush_inner(&self) -> Result<FlushOutcome, SyncError> {
        let (known_id, known_fingerprint) = {
            let st = self.state.lock();
            (st.remote_id.clone(), st.fingerprint.clone())
        };

        // Guard against clobbering an edit made elsewhere since our last sync.
        let probe = self.store.probe().await?;
        let mut merged = false;
        let target = if !probe.exists {
            None
        } else if probe.remote_id == known_id && probe.fingerprint == known_fingerprint {
            known_id
        } else {
            match self.store.fetch().await {
                Ok(Some(fetched)) => {
                    let mut st = self.state.lock();
                    let report = merge_with_report(&st.document, &fetched.document);
                    st.document = report.document;
                    st.remote_id = Some(fetched.remote_id.clone());
                    st.fingerprint = fetched.fingerprint;
                    st.last_modified = fetched.last_modified;
                    self.cache.write(&st.snapshot());
                    merged = true;
                    Some(fetched.remote_id)
                }
                Ok(None) => None,
                Err(err) if err.is_absent() => {
                    tracing::warn!("remote document unreadable, overwriting: {err}");
                    probe.remote_id.clone()
                }
                Err(err) => return Err(err.into()),
            }
        };

        let receipt = self.write_working_copy(target).await?;
        let still_dirty = self.state.lock().dirty;
        Ok(FlushOutcome::Written {
            remote_id: receipt.remote_id,
            merged,
            still_dirty,
        })
    }

    /// Write the current working copy. The dirty flag is cleared only if no
    /// mutation landed while the write was in flight.
    async fn write_working_copy(&self, remote_id: Option<String>) -> Result<WriteReceipt, SyncError> {
        let (document, revision) = {
            let st = self.state.lock();
            (st.document.clone(), st.revision)
        };

        let receipt = self.store.write(remote_id.as_deref(), &document).await?;

        let mut st = self.state.lock();
        st.remote_id = Some(receipt.remote_id.clone());
        st.fingerprint = receipt.fingerprint.clone();
        st.last_modified = receipt.last_modified.clone();
        if st.revision == revision {
            st.dirty = false;
            self.dirty_flag.store(false);
        }
        self.cache.write(&st.snapshot());
        tracing::info!(
            remote_id = %receipt.remote_id,
            sets = document.len(),
            still_dirty = st.dirty,
            "wrote remote document"
        );
        Ok(receipt)
    }

    // -----------------------------------------------------------------------
    // Reconcile
    // -----------------------------------------------------------------------

    /// Bring the working copy in line with the remote document. Runs through
    /// the flush queue so it never overlaps a write.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, SyncError> {
        let this = self.strong()?;
        self.queue
            .push(async move { this.reconcile_job().await })
            .await
            .map_err(|_| SyncError::QueueClosed)?
    }

    async fn reconcile_job(&self) -> Result<ReconcileOutcome, SyncError> {
        if self.state.lock().auth_paused {
            return Err(SyncError::AuthPaused);
        }

        self.transition(SyncState::Reconciling);
        let result = self.reconcile_inner().await;
        self.settle();

        match &result {
            Ok(outcome) => tracing::info!(?outcome, "reconcile finished"),
            Err(err) => self.report(SyncPhase::Reconcile, err),
        }
        result
    }

    async fn reconcile_inner(&self) -> Result<ReconcileOutcome, SyncError> {
        let probe = self.store.probe().await?;
        let (known_id, known_fingerprint, dirty) = {
            let st = self.state.lock();
            (st.remote_id.clone(), st.fingerprint.clone(), st.dirty)
        };

        if !probe.exists {
            return self.publish_local(None).await;
        }

        if probe.fingerprint.is_some()
            && probe.fingerprint == known_fingerprint
            && probe.remote_id == known_id
        {
            if dirty {
                self.write_working_copy(known_id).await?;
                return Ok(ReconcileOutcome::PushedPending);
            }
            return Ok(ReconcileOutcome::Unchanged);
        }

        let fetched = match self.store.fetch().await {
            Ok(Some(fetched)) => fetched,
            Ok(None) => return self.publish_local(None).await,
            Err(err) if err.is_absent() => {
                tracing::warn!("remote document unreadable, treating as absent: {err}");
                return self.publish_local(probe.remote_id).await;
            }
            Err(err) => return Err(err.into()),
        };

        // Decide under the lock: an edit may have landed while fetching.
        let sets = {
            let mut st = self.state.lock();
            st.remote_id = Some(fetched.remote_id.clone());
            st.fingerprint = fetched.fingerprint;
            st.last_modified = fetched.last_modified;
            if !st.dirty {
                st.document = fetched.document;
                self.dirty_flag.store(false);
                self.cache.write(&st.snapshot());
                return Ok(ReconcileOutcome::Replaced {
                    sets: st.document.len(),
                });
            }
            st.document = merge_documents(&st.document, &fetched.document);
            self.cache.write(&st.snapshot());
            st.document.len()
        };

        // Persist the merge right away so the next reconcile sees a matching
        // fingerprint.
        self.write_working_copy(Some(fetched.remote_id)).await?;
        Ok(ReconcileOutcome::Merged { sets })
    }

    /// The remote is missing or unreadable: publish whatever we have.
    async fn publish_local(&self, remote_id: Option<String>) -> Result<ReconcileOutcome, SyncError> {
        let has_sets = {
            let mut st = self.state.lock();
            if st.document.is_empty() {
                if st.dirty {
                    st.dirty = false;
                    self.dirty_flag.store(false);
                }
                false
            } else {
                true
            }
        };
        if !has_sets {
            return Ok(ReconcileOutcome::RemoteMissing);
        }
        tracing::info!(?remote_id, "publishing local document");
        self.write_working_copy(remote_id).await?;
        Ok(ReconcileOutcome::Published)
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn strong(&self) -> Result<Arc<Self>, SyncError> {
        self.weak_self.upgrade().ok_or(SyncError::QueueClosed)
    }

    fn transition(&self, to: SyncState) {
        let from = {
            let mut st = self.state.lock();
            std::mem::replace(&mut st.phase, to)
        };
        self.notify_transition(from, to);
    }

    fn settle(&self) {
        let (from, to) = {
            let mut st = self.state.lock();
            let to = st.settled_phase();
            (std::mem::replace(&mut st.phase, to), to)
        };
        self.notify_transition(from, to);
    }

    fn notify_transition(&self, from: SyncState, to: SyncState) {
        if from == to {
            return;
        }
        tracing::debug!(?from, ?to, "sync state changed");
        if let Some(ref on_state_change) = self.on_state_change {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                on_state_change(from, to);
            }));
        }
    }

    fn report(&self, phase: SyncPhase, err: &SyncError) {
        let kind = match err {
            SyncError::Store(store_err) => store_err.kind(),
            SyncError::AuthPaused => SyncErrorKind::Auth,
            _ => SyncErrorKind::Permanent,
        };
        if matches!(err, SyncError::Store(StoreError::AuthExpired(_))) {
            self.state.lock().auth_paused = true;
            tracing::warn!("authentication expired, pausing remote sync");
        }
        tracing::warn!(?phase, ?kind, "sync failed: {err}");

        let event = SyncErrorEvent {
            phase,
            message: err.to_string(),
            kind,
        };
        if let Some(ref on_error) = self.on_error {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                on_error(&event);
            }));
        }
    }
}

/// `updatedAt` for a mutation: the current time, but always strictly after
/// the previous stamp so a clock stepping backwards cannot regress it.
fn next_stamp(now: i64, previous: Option<i64>) -> i64 {
    match previous {
        Some(prev) if prev >= now => prev + 1,
        _ => now,
    }
}
