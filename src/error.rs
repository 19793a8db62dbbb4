//! Error types for the wizard engine.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Wizard error: {0}")]
    Wizard(#[from] WizardError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Local database errors (draft store, offline records).
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Errors returned by a table backend for a single write.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Backend rejected the write ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid response from backend: {0}")]
    InvalidResponse(String),

    #[error("Row {id} not found in {table}")]
    NotFound { table: String, id: String },

    #[error("No authenticated session for backend call")]
    Unauthorized,

    #[error("Local store error: {0}")]
    Store(#[from] DatabaseError),
}

/// Errors from the submission orchestrator.
///
/// Only the first failure of a run is reported; the run stops there.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Not signed in: an authenticated session is required to submit")]
    Unauthenticated,

    #[error("Cannot submit: {0}")]
    Precondition(String),

    #[error("{entity} requires {depends_on}, which was never created")]
    MissingDependency { entity: String, depends_on: String },

    #[error("Could not serialize {entity}: {reason}")]
    Serialization { entity: String, reason: String },

    #[error("Failed to write {entity}: {source}")]
    Write {
        entity: String,
        #[source]
        source: BackendError,
    },

    #[error("Submission cancelled before writing {entity}")]
    Cancelled { entity: String },
}

impl SubmissionError {
    /// The logical entity this error concerns, if any.
    pub fn entity(&self) -> Option<&str> {
        match self {
            Self::MissingDependency { entity, .. }
            | Self::Serialization { entity, .. }
            | Self::Write { entity, .. }
            | Self::Cancelled { entity } => Some(entity),
            Self::Unauthenticated | Self::Precondition(_) => None,
        }
    }
}

/// Errors from the wizard controller and step registry.
#[derive(Debug, thiserror::Error)]
pub enum WizardError {
    #[error("Wizard has no steps")]
    EmptyRegistry,

    #[error("Duplicate step id: {0}")]
    DuplicateStep(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Step {step} has no field named {field}")]
    UnknownField { step: String, field: String },

    #[error("Payload for step {payload} cannot be stored under {step}")]
    PayloadMismatch { step: String, payload: String },

    #[error("Wizard is {state}, not editing")]
    NotEditing { state: String },

    #[error("Submission is only possible from the last step (at {step} of {last})")]
    NotOnLastStep { step: usize, last: usize },

    #[error("Steps not ready for submission: {}", .0.join(", "))]
    IncompleteSteps(Vec<String>),

    #[error("Submission outcome belongs to a discarded session")]
    StaleSubmission,

    #[error(transparent)]
    Submission(#[from] SubmissionError),
}

/// Result type alias for the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_errors_name_the_entity() {
        let err = SubmissionError::Write {
            entity: "audience_segment".into(),
            source: BackendError::Transport("connection reset".into()),
        };
        assert_eq!(err.entity(), Some("audience_segment"));
        assert_eq!(
            err.to_string(),
            "Failed to write audience_segment: Request failed: connection reset"
        );
        assert_eq!(SubmissionError::Unauthenticated.entity(), None);
    }

    #[test]
    fn wizard_errors_wrap_submission_errors_transparently() {
        let err: WizardError = SubmissionError::Precondition("a campaign name is required".into()).into();
        assert_eq!(err.to_string(), "Cannot submit: a campaign name is required");

        let top: Error = err.into();
        assert!(matches!(top, Error::Wizard(WizardError::Submission(_))));
    }

    #[test]
    fn incomplete_steps_are_listed() {
        let err = WizardError::IncompleteSteps(vec!["planning".into(), "audience".into()]);
        assert_eq!(
            err.to_string(),
            "Steps not ready for submission: planning, audience"
        );
    }
}
