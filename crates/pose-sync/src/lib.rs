pub mod error;

pub mod cache;
pub mod clock;
pub mod config;
pub mod document;
pub mod image_index;
pub mod images;
pub mod sampler;
pub mod store;
pub mod sync;

pub use error::{PoseSyncError, Result};
