//! Step definitions: static descriptors, typed step models, and the
//! renderer registry a workflow exposes.

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::WizardError;
use crate::form::{FieldValues, RawFields, StepForm, StepSchema};
use crate::workflows::StepPayload;

/// Static description of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDescriptor {
    /// Unique within a wizard; also the key in the step aggregate.
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Required steps must be present and valid at submission.
    pub required: bool,
}

/// A typed step payload with a known schema.
///
/// `from_fields` must accept any subset of fields; missing or blank fields
/// take the type's default. Validity is decided by the schema, not here.
pub trait StepModel: Clone + Default + Send + Sync + 'static {
    const DESCRIPTOR: StepDescriptor;

    fn schema() -> StepSchema;

    fn from_fields(fields: &FieldValues) -> Self;

    /// Raw text that re-coerces to this value.
    fn to_raw(&self) -> RawFields;

    fn wrap(self) -> StepPayload;

    fn peek(payload: &StepPayload) -> Option<&Self>;
}

/// One renderable step of a wizard.
pub trait StepRenderer: Send + Sync {
    fn descriptor(&self) -> &StepDescriptor;

    fn schema(&self) -> &StepSchema;

    /// Initial raw state from the existing payload, or schema defaults.
    fn seed(&self, existing: Option<&StepPayload>) -> RawFields;

    /// Build the typed payload from coerced values.
    fn build(&self, fields: &FieldValues) -> StepPayload;

    fn render(&self, form: &StepForm) -> StepView;
}

/// Schema-driven renderer for a `StepModel`.
pub struct FormStep<T> {
    descriptor: StepDescriptor,
    schema: StepSchema,
    _model: PhantomData<fn() -> T>,
}

impl<T: StepModel> FormStep<T> {
    pub fn new() -> Self {
        Self {
            descriptor: T::DESCRIPTOR,
            schema: T::schema(),
            _model: PhantomData,
        }
    }
}

impl<T: StepModel> Default for FormStep<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: StepModel> StepRenderer for FormStep<T> {
    fn descriptor(&self) -> &StepDescriptor {
        &self.descriptor
    }

    fn schema(&self) -> &StepSchema {
        &self.schema
    }

    fn seed(&self, existing: Option<&StepPayload>) -> RawFields {
        let mut raw = self.schema.default_raw();
        if let Some(model) = existing.and_then(T::peek) {
            for (name, value) in model.to_raw() {
                raw.insert(name, value);
            }
        }
        raw
    }

    fn build(&self, fields: &FieldValues) -> StepPayload {
        T::from_fields(fields).wrap()
    }

    fn render(&self, form: &StepForm) -> StepView {
        let fields = self
            .schema
            .fields()
            .iter()
            .map(|spec| FieldRow {
                name: spec.name,
                label: spec.label,
                value: form.raw(spec.name).unwrap_or_default().to_string(),
                required: spec.required,
                error: form.error(spec.name).map(|e| e.to_string()),
            })
            .collect();

        StepView {
            step_id: self.descriptor.id,
            title: self.descriptor.title,
            description: self.descriptor.description,
            fields,
            is_valid: form.is_valid(),
        }
    }
}

/// One field line in a rendered step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRow {
    pub name: &'static str,
    pub label: &'static str,
    pub value: String,
    pub required: bool,
    pub error: Option<String>,
}

/// Surface-neutral rendering of a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepView {
    pub step_id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub fields: Vec<FieldRow>,
    pub is_valid: bool,
}

impl fmt::Display for StepView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "## {}", self.title)?;
        writeln!(f, "{}", self.description)?;
        for row in &self.fields {
            let marker = if row.required { "*" } else { " " };
            write!(f, "{marker} {} ({}) = {}", row.label, row.name, row.value)?;
            if let Some(ref error) = row.error {
                write!(f, "   <- {error}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Fixed, ordered list of a wizard's steps.
#[derive(Clone)]
pub struct StepRegistry {
    steps: Vec<Arc<dyn StepRenderer>>,
}

impl StepRegistry {
    /// Build a registry; step ids must be unique and the list non-empty.
    pub fn new(steps: Vec<Arc<dyn StepRenderer>>) -> Result<Self, WizardError> {
        if steps.is_empty() {
            return Err(WizardError::EmptyRegistry);
        }
        let mut seen = HashSet::new();
        for step in &steps {
            let id = step.descriptor().id;
            if !seen.insert(id) {
                return Err(WizardError::DuplicateStep(id.to_string()));
            }
        }
        Ok(Self { steps })
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.steps.len().saturating_sub(1)
    }

    pub fn get(&self, index: usize) -> Option<&Arc<dyn StepRenderer>> {
        self.steps.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&Arc<dyn StepRenderer>> {
        self.steps.iter().find(|s| s.descriptor().id == id)
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.descriptor().id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn StepRenderer>> {
        self.steps.iter()
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.steps.iter().map(|s| s.descriptor().id))
            .finish()
    }
}
