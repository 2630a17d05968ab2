#![forbid(unsafe_code)]

pub mod catalog;
pub mod error;
pub mod queue;

pub use casework_core::Clock;

pub use catalog::{CaseCatalog, CatalogError, InMemoryCaseCatalog};
pub use error::QueueError;
pub use queue::{
    PreviousOutcome, QueueProgress, QueueSessionManager, QueueSessionView, QueueSnapshot,
};
