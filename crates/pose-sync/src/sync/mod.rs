pub mod coordinator;
pub mod debounce;
pub mod merge;
pub mod queue;
pub mod types;

pub use coordinator::SyncCoordinator;
pub use debounce::Debouncer;
pub use merge::{merge_documents, merge_with_report, MergeReport};
pub use queue::SerialQueue;
pub use types::{
    FlushOutcome, HydrateOutcome, ReconcileOutcome, StateChangeCallback, SyncCoordinatorOptions,
    SyncErrorCallback, SyncErrorEvent, SyncErrorKind, SyncPhase, SyncState,
};
