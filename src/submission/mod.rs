//! Submission: turning a completed step aggregate into backend rows.

pub mod cancel;
pub mod orchestrator;
pub mod plan;

pub use cancel::CancelToken;
pub use orchestrator::Orchestrator;
pub use plan::{EntityWrite, ForeignRef, Row, SubmissionPlan, SubmissionResult, WriteOp};
