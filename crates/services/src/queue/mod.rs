mod manager;
mod materialize;
mod view;

// Public API of the queue subsystem.
pub use crate::error::QueueError;
pub use manager::{PreviousOutcome, QueueSessionManager};
pub use view::{QueueProgress, QueueSessionView, QueueSnapshot};
