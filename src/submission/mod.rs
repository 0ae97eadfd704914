//! Chat submission: lifecycle state machine, single-flight lock and the
//! orchestration service.

mod lock;
mod service;
mod state;

pub use lock::SubmissionLock;
pub use service::{SubmissionOutcome, SubmissionService};
pub use state::{SubmissionAction, SubmissionState, SubmissionStatus};
