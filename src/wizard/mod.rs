//! The wizard engine: step registry, session, state machine, autosave, and
//! the controller tying them together.

pub mod autosave;
pub mod controller;
pub mod session;
pub mod state;
pub mod step;

pub use autosave::DraftAutosave;
pub use controller::{PendingSubmission, SubmissionOutcome, WizardController, WizardDeps};
pub use session::{StepData, SubmissionProgress, WizardSession};
pub use state::WizardState;
pub use step::{
    FieldRow, FormStep, StepDescriptor, StepModel, StepRegistry, StepRenderer, StepView,
};
