pub mod document_store;
pub mod index_store;
pub mod memory;
pub mod traits;

pub use document_store::BlobDocumentStore;
pub use index_store::{ImageIndexSource, ImageIndexStore};
pub use memory::{BlobCallCounts, BlobOp, MemoryBlobStore};
pub use traits::{BlobMeta, BlobStore, FetchedDocument, Probe, RemoteDocumentStore, WriteReceipt};
