//! Coordinator-facing types: lifecycle states, outcomes, error events and
//! construction options.

use std::sync::Arc;

use crate::cache::KeyValueStore;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::store::RemoteDocumentStore;

// ============================================================================
// Lifecycle
// ============================================================================

/// Coordinator lifecycle. `Reconciling` and `Flushing` always settle back to
/// `Idle` (or `Dirty` when edits are still pending).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    Uninitialized,
    Hydrating,
    Reconciling,
    Idle,
    Dirty,
    Flushing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HydrateOutcome {
    /// A cached snapshot was applied as the working copy.
    pub from_cache: bool,
    /// Dirty state after hydration (persisted flag or pre-hydrate edits).
    pub dirty: bool,
    pub sets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Remote fingerprint matches the last synced one and nothing is pending.
    Unchanged,
    /// Remote unchanged, pending local edits were written.
    PushedPending,
    /// Clean local copy replaced wholesale by the remote body.
    Replaced { sets: usize },
    /// Dirty local copy merged with the remote body and written back.
    Merged { sets: usize },
    /// Remote missing or unreadable; the local copy was (re)published.
    Published,
    /// Remote missing and there is nothing local to publish.
    RemoteMissing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing was dirty.
    Clean,
    Written {
        remote_id: String,
        /// The remote had moved and was merged before writing.
        merged: bool,
        /// A newer mutation landed while writing; another flush is scheduled.
        still_dirty: bool,
    },
}

// ============================================================================
// Errors
// ============================================================================

/// Classification of sync errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// Retriable (network, temporary failures)
    Transient,
    /// Not retriable (corrupt data, unsupported versions)
    Permanent,
    /// Authentication failed
    Auth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Reconcile,
    Flush,
}

/// A failure surfaced to the host while the coordinator keeps running.
#[derive(Debug, Clone)]
pub struct SyncErrorEvent {
    pub phase: SyncPhase,
    pub message: String,
    pub kind: SyncErrorKind,
}

// ============================================================================
// Options
// ============================================================================

/// Callback type for sync error events.
pub type SyncErrorCallback = dyn Fn(&SyncErrorEvent) + Send + Sync;

/// Callback type for lifecycle transitions, called with `(from, to)`.
pub type StateChangeCallback = dyn Fn(SyncState, SyncState) + Send + Sync;

/// Configuration for `SyncCoordinator`.
pub struct SyncCoordinatorOptions {
    pub store: Arc<dyn RemoteDocumentStore>,
    /// Synchronous durable storage for the document snapshot and dirty flag.
    pub kv: Arc<dyn KeyValueStore>,
    /// Defaults to the system clock.
    pub clock: Option<Arc<dyn Clock>>,
    pub config: SyncConfig,
    pub on_error: Option<Arc<SyncErrorCallback>>,
    pub on_state_change: Option<Arc<StateChangeCallback>>,
}

impl SyncCoordinatorOptions {
    pub fn new(store: Arc<dyn RemoteDocumentStore>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            kv,
            clock: None,
            config: SyncConfig::default(),
            on_error: None,
            on_state_change: None,
        }
    }
}
