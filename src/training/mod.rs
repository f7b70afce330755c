//! Training-job lifecycle.
//!
//! - [`progress`] file-backed progress records
//! - [`cancel`] cooperative cancel markers
//! - [`session`] admission-control sessions and the expiry rules
//! - [`threads`] one live task per app
//! - [`job`] body of a single run
//! - [`coordinator`] ties the above together

pub mod cancel;
pub mod coordinator;
pub mod job;
pub mod progress;
pub mod session;
pub mod threads;

#[cfg(test)]
pub(crate) mod fakes;

pub use cancel::CancelSignal;
pub use coordinator::{JobCoordinator, TrainingRequest, TrainingStatus};
pub use job::{JobOutcome, TrainingJob};
pub use progress::{ProgressRecord, ProgressStore};
pub use session::{Admission, Rejection, SessionRegistry};
pub use threads::ThreadRegistry;
