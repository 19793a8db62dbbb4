//! Step forms: schema-driven editing state for a single wizard step.

pub mod adapter;
pub mod schema;

pub use adapter::{StepForm, StepProps};
pub use schema::{FieldError, FieldKind, FieldSpec, FieldValue, FieldValues, RawFields, StepSchema};
