//! Step form adapter: live editing state for one wizard step.
//!
//! The form keeps every raw string the user typed, forwards only coerced
//! values upward, and reports validity after every recompute. It never
//! navigates or persists; both are the controller's job.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::WizardError;
use crate::wizard::session::StepData;
use crate::wizard::step::{StepRenderer, StepView};

use super::schema::{FieldError, FieldValue, FieldValues, RawFields};

/// What a step form is bound to: the aggregate and two callbacks.
pub trait StepProps {
    /// Full wizard aggregate, keyed by step id.
    fn data(&self) -> &StepData;

    /// Called with the full aggregate, this step's slice replaced.
    fn on_change(&mut self, aggregate: StepData);

    /// Called after every recompute with the step's current validity.
    fn on_validation_change(&mut self, is_valid: bool);
}

/// Editing state for one step.
pub struct StepForm {
    renderer: Arc<dyn StepRenderer>,
    raw: RawFields,
    accepted: FieldValues,
    errors: IndexMap<String, FieldError>,
    is_valid: bool,
}

impl StepForm {
    /// Open a form seeded from the aggregate's slice for this step (or the
    /// schema defaults) and report its initial validity.
    pub fn open(renderer: Arc<dyn StepRenderer>, props: &mut dyn StepProps) -> Self {
        let existing = props.data().get(renderer.descriptor().id);
        let raw = renderer.seed(existing);

        let mut form = Self {
            renderer: Arc::clone(&renderer),
            raw: RawFields::new(),
            accepted: FieldValues::new(),
            errors: IndexMap::new(),
            is_valid: false,
        };
        for spec in renderer.schema().fields() {
            let input = raw.get(spec.name).cloned().unwrap_or_default();
            form.apply(spec.name, input);
        }
        form.is_valid = form.compute_validity();
        props.on_validation_change(form.is_valid);
        form
    }

    pub fn step_id(&self) -> &'static str {
        self.renderer.descriptor().id
    }

    /// Edit one field, then push the merged aggregate and validity upward.
    pub fn set_field(
        &mut self,
        name: &str,
        raw: impl Into<String>,
        props: &mut dyn StepProps,
    ) -> Result<bool, WizardError> {
        if self.renderer.schema().field(name).is_none() {
            return Err(WizardError::UnknownField {
                step: self.step_id().to_string(),
                field: name.to_string(),
            });
        }

        self.apply(name, raw.into());
        self.is_valid = self.compute_validity();

        let payload = self.renderer.build(&self.accepted);
        let mut aggregate = props.data().clone();
        aggregate.insert(self.step_id().to_string(), payload);
        props.on_change(aggregate);
        props.on_validation_change(self.is_valid);

        tracing::debug!(
            step = self.step_id(),
            field = name,
            valid = self.is_valid,
            "Step field updated"
        );
        Ok(self.is_valid)
    }

    /// Raw text of a field as last typed.
    pub fn raw(&self, name: &str) -> Option<&str> {
        self.raw.get(name).map(String::as_str)
    }

    /// Coercion error, or `Required` for a blank required field.
    pub fn error(&self, name: &str) -> Option<FieldError> {
        if let Some(e) = self.errors.get(name) {
            return Some(e.clone());
        }
        let spec = self.renderer.schema().field(name)?;
        let value = self.accepted.get(name).unwrap_or(&FieldValue::Empty);
        spec.check(value).err()
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn view(&self) -> StepView {
        self.renderer.render(self)
    }

    /// Store the raw text; accept the coerced value or keep the previous one.
    fn apply(&mut self, name: &str, input: String) {
        let Some(spec) = self.renderer.schema().field(name) else {
            return;
        };
        match spec.coerce(&input) {
            Ok(value) => {
                self.accepted.insert(name, value);
                self.errors.shift_remove(name);
            }
            Err(e) => {
                self.errors.insert(name.to_string(), e);
            }
        }
        self.raw.insert(name.to_string(), input);
    }

    fn compute_validity(&self) -> bool {
        self.errors.is_empty()
            && self.renderer.schema().fields().iter().all(|spec| {
                let value = self.accepted.get(spec.name).unwrap_or(&FieldValue::Empty);
                spec.check(value).is_ok()
            })
    }
}
