//! Core abstractions shared by the strategies, lifecycle and command layers

pub mod cache;
pub mod classify;
pub mod config;
pub mod entry;
pub mod error;
pub mod log;
pub mod partition;
pub mod policy;
pub mod request;
pub mod transport;

// Re-export main types for cleaner imports
pub use cache::{CachePartition, CacheStore};
pub use classify::{Classifier, ContentClass};
pub use entry::CacheEntry;
pub use error::CacheError;
pub use partition::{PartitionKind, PartitionNames};
pub use policy::{FreshnessPolicy, PolicyTable};
pub use request::{Destination, Method, Request, Response, ResponseSource};
pub use transport::Transport;
