mod case;
mod filter;
mod hash;
mod ids;
mod progress;
mod session;
mod status;

pub use case::CaseRecord;
pub use filter::{FilterSelection, SpecializedAreaFilter};
pub use hash::FilterContextHash;
pub use ids::{CaseId, ParseIdError, SessionId, UserId};
pub use progress::CaseProgress;
pub use session::{QueueSession, QueueSessionError};
pub use status::{CaseStatus, ParseStatusError};
