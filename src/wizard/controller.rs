//! Wizard controller: owns one `WizardSession` and drives it.
//!
//! Navigation is gated on the current step's reported validity. Every
//! change schedules a debounced draft write. Completion runs the
//! submission orchestrator; a failure puts the wizard back on the last step
//! with the error attached and all entered data (and any ids already
//! created) kept for a retry.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::AuthContext;
use crate::config::WizardConfig;
use crate::error::{SubmissionError, WizardError};
use crate::form::{StepForm, StepProps};
use crate::store::{DataBackend, DraftStore};
use crate::submission::{CancelToken, Orchestrator, SubmissionResult};
use crate::workflows::{StepPayload, Workflow};

use super::autosave::DraftAutosave;
use super::session::{StepData, SubmissionProgress, WizardSession};
use super::state::WizardState;
use super::step::{StepDescriptor, StepView};

/// External collaborators of a controller.
#[derive(Clone)]
pub struct WizardDeps {
    pub backend: Arc<dyn DataBackend>,
    /// Draft store; autosave is off when `None`.
    pub drafts: Option<Arc<dyn DraftStore>>,
}

pub struct WizardController<W: Workflow> {
    workflow: Arc<W>,
    backend: Arc<dyn DataBackend>,
    autosave: Option<DraftAutosave>,
    persistence_key: String,
    session: WizardSession,
    state: WizardState,
    form: Option<StepForm>,
    /// Bumped whenever the session is discarded; outcomes of submissions
    /// started under an older generation are ignored.
    generation: u64,
    /// Generation of a submission left running by `unmount`. Its outcome
    /// still lands in the draft.
    detached: Option<u64>,
    cancel: CancelToken,
}

impl<W: Workflow> WizardController<W> {
    /// Fresh controller at step 0. Spawns the draft writer, so it must be
    /// called inside a tokio runtime when a draft store is configured.
    pub fn new(workflow: Arc<W>, deps: WizardDeps, config: &WizardConfig) -> Self {
        let persistence_key = config.persistence_key(workflow.kind());
        let autosave = deps.drafts.map(|store| {
            DraftAutosave::spawn(store, persistence_key.clone(), config.autosave_debounce)
        });
        Self {
            workflow,
            backend: deps.backend,
            autosave,
            persistence_key,
            session: WizardSession::new(),
            state: WizardState::default(),
            form: None,
            generation: 0,
            detached: None,
            cancel: CancelToken::new(),
        }
    }

    /// Controller hydrated from the stored draft for this wizard type, if any.
    pub async fn resume(workflow: Arc<W>, deps: WizardDeps, config: &WizardConfig) -> Self {
        let store = deps.drafts.clone();
        let mut controller = Self::new(workflow, deps, config);
        if let Some(store) = store {
            match store.load(&controller.persistence_key).await {
                Ok(Some(value)) => controller.restore(value),
                Ok(None) => debug!(key = %controller.persistence_key, "No draft to resume"),
                Err(e) => warn!(key = %controller.persistence_key, error = %e, "Failed to load draft"),
            }
        }
        controller
    }

    fn restore(&mut self, value: serde_json::Value) {
        let mut session = match WizardSession::from_json(value) {
            Ok(session) => session,
            Err(e) => {
                warn!(key = %self.persistence_key, error = %e, "Ignoring undecodable draft");
                return;
            }
        };

        let steps = self.workflow.steps();
        session.step_data.retain(|id, payload| {
            let keep = steps.find(id).is_some() && payload.step_id() == id.as_str();
            if !keep {
                warn!(step = %id, "Dropping draft payload for a step this wizard lacks");
            }
            keep
        });
        session.current_step_index = session.current_step_index.min(steps.last_index());

        self.state = WizardState::editing(session.current_step_index);
        info!(
            key = %self.persistence_key,
            step = session.current_step_index,
            steps_filled = session.step_data.len(),
            "Draft restored"
        );
        self.session = session;
    }

    // ── Accessors ───────────────────────────────────────────────────

    pub fn workflow(&self) -> &W {
        &self.workflow
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    pub fn persistence_key(&self) -> &str {
        &self.persistence_key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Descriptor of the step at `current_step_index`.
    pub fn current_step(&self) -> Option<&StepDescriptor> {
        self.workflow
            .steps()
            .get(self.session.current_step_index)
            .map(|r| r.descriptor())
    }

    /// Token of the latest submission.
    pub fn cancel_handle(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Rendering of the open form, if it belongs to the current step.
    pub fn view(&self) -> Option<StepView> {
        let current = self.current_step()?.id;
        self.form
            .as_ref()
            .filter(|f| f.step_id() == current)
            .map(StepForm::view)
    }

    // ── Navigation ──────────────────────────────────────────────────

    /// Advance one step. `Ok(false)` when the current step is not valid or
    /// already the last one; the session is left untouched.
    pub fn next(&mut self) -> Result<bool, WizardError> {
        let step = self.editing_step()?;
        let id = self.step_id_at(step)?;
        if !self.session.is_step_valid(id) {
            debug!(step = id, "Next blocked: step not valid");
            return Ok(false);
        }
        if step >= self.workflow.steps().last_index() {
            return Ok(false);
        }
        self.move_to(step + 1);
        Ok(true)
    }

    /// Go back one step without validation. `Ok(false)` on the first step.
    pub fn previous(&mut self) -> Result<bool, WizardError> {
        let step = self.editing_step()?;
        if step == 0 {
            return Ok(false);
        }
        self.move_to(step - 1);
        Ok(true)
    }

    fn move_to(&mut self, step: usize) {
        debug_assert!(self.state.can_transition_to(&WizardState::editing(step)));
        self.session.current_step_index = step;
        self.state = WizardState::editing(step);
        self.form = None;
        debug!(step, "Moved to step");
        self.persist();
    }

    // ── Step data ───────────────────────────────────────────────────

    /// Insert or replace one step's payload.
    pub fn update_step_data(
        &mut self,
        step_id: &str,
        payload: StepPayload,
    ) -> Result<(), WizardError> {
        self.editing_step()?;
        self.check_step(step_id)?;
        if payload.step_id() != step_id {
            return Err(WizardError::PayloadMismatch {
                step: step_id.to_string(),
                payload: payload.step_id().to_string(),
            });
        }

        self.session.step_data.insert(step_id.to_string(), payload);
        // An open form for this step would now show stale raw text.
        if self.form.as_ref().is_some_and(|f| f.step_id() == step_id) {
            self.form = None;
        }
        self.persist();
        Ok(())
    }

    pub fn set_step_validity(&mut self, step_id: &str, is_valid: bool) -> Result<(), WizardError> {
        self.check_step(step_id)?;
        self.session.set_step_valid(step_id, is_valid);
        self.persist();
        Ok(())
    }

    /// Open (or reopen) the form for the current step.
    pub fn open_form(&mut self) -> Result<StepView, WizardError> {
        let step = self.editing_step()?;
        let form = self.open_step_form(step)?;
        Ok(self.form.insert(form).view())
    }

    /// Edit one field of the current step. Returns the step's validity.
    pub fn edit_field(&mut self, name: &str, raw: &str) -> Result<bool, WizardError> {
        let step = self.editing_step()?;
        let current = self.step_id_at(step)?;
        let mut form = match self.form.take() {
            Some(form) if form.step_id() == current => form,
            _ => self.open_step_form(step)?,
        };
        let result = form.set_field(name, raw, self);
        self.form = Some(form);
        result
    }

    fn open_step_form(&mut self, step: usize) -> Result<StepForm, WizardError> {
        let renderer = self
            .workflow
            .steps()
            .get(step)
            .cloned()
            .ok_or_else(|| WizardError::UnknownStep(step.to_string()))?;
        Ok(StepForm::open(renderer, self))
    }

    // ── Completion ──────────────────────────────────────────────────

    /// Submit from the last step and wait for the outcome.
    pub async fn complete(&mut self, auth: &AuthContext) -> Result<SubmissionResult, WizardError> {
        let pending = self.begin_submission(auth)?;
        let outcome = pending.run().await;
        self.apply_outcome(outcome)
            .await
            .unwrap_or(Err(WizardError::StaleSubmission))
    }

    /// Check readiness and move to `Submitting`. The returned submission
    /// owns a snapshot of the aggregate and may run on another task.
    pub fn begin_submission(&mut self, auth: &AuthContext) -> Result<PendingSubmission<W>, WizardError> {
        let step = self.editing_step()?;
        let last = self.workflow.steps().last_index();
        if step != last {
            return Err(WizardError::NotOnLastStep { step, last });
        }
        self.check_ready()?;

        self.state = WizardState::Submitting;
        self.cancel = CancelToken::new();
        info!(
            kind = self.workflow.kind(),
            generation = self.generation,
            already_written = self.session.progress.len(),
            "Submission started"
        );

        Ok(PendingSubmission {
            generation: self.generation,
            workflow: Arc::clone(&self.workflow),
            orchestrator: Orchestrator::new(Arc::clone(&self.backend)),
            data: self.session.step_data.clone(),
            auth: auth.clone(),
            progress: self.session.progress.clone(),
            cancel: self.cancel.clone(),
        })
    }

    /// Fold a finished submission back into the session.
    ///
    /// Returns `None` when the outcome belongs to a discarded generation.
    /// An outcome detached by `unmount` is still recorded in the draft.
    pub async fn apply_outcome(
        &mut self,
        outcome: SubmissionOutcome,
    ) -> Option<Result<SubmissionResult, WizardError>> {
        if self.detached == Some(outcome.generation) {
            self.detached = None;
            self.keep_detached_outcome(outcome).await;
            return None;
        }
        if outcome.generation != self.generation || self.state != WizardState::Submitting {
            debug!(
                generation = outcome.generation,
                current = self.generation,
                "Ignoring stale submission outcome"
            );
            return None;
        }

        self.session.progress = outcome.progress;
        match outcome.result {
            Ok(result) => {
                self.state = WizardState::Completed;
                info!(kind = self.workflow.kind(), ids = ?result.ids, "Submission completed");
                if let Some(autosave) = &self.autosave {
                    autosave.clear().await;
                }
                Some(Ok(result))
            }
            Err(e) => {
                let last = self.workflow.steps().last_index();
                warn!(
                    kind = self.workflow.kind(),
                    entity = e.entity().unwrap_or("-"),
                    error = %e,
                    "Submission failed"
                );
                self.state = WizardState::Editing {
                    step: last,
                    last_error: Some(e.to_string()),
                };
                self.flush_draft().await;
                Some(Err(WizardError::Submission(e)))
            }
        }
    }

    /// Ids written after `unmount` go into the draft so a resumed wizard
    /// skips them; a run that finished clears the draft instead.
    async fn keep_detached_outcome(&mut self, outcome: SubmissionOutcome) {
        self.session.progress = outcome.progress;
        match outcome.result {
            Ok(result) => {
                info!(kind = self.workflow.kind(), ids = ?result.ids, "Detached submission completed");
                if let Some(autosave) = &self.autosave {
                    autosave.clear().await;
                }
            }
            Err(e) => {
                info!(
                    kind = self.workflow.kind(),
                    written = self.session.progress.len(),
                    error = %e,
                    "Detached submission stopped; progress kept in draft"
                );
                self.flush_draft().await;
            }
        }
    }

    /// Steps blocking submission: visited steps reported invalid, present
    /// payloads failing their schema, and absent required steps.
    fn check_ready(&self) -> Result<(), WizardError> {
        let mut incomplete = Vec::new();
        for (index, renderer) in self.workflow.steps().iter().enumerate() {
            let descriptor = renderer.descriptor();
            let visited = index <= self.session.current_step_index;
            let flagged_invalid =
                self.session.is_valid_by_step.get(descriptor.id) == Some(&false);

            let ready = match self.session.step_data.get(descriptor.id) {
                Some(payload) => renderer
                    .schema()
                    .validate(&renderer.seed(Some(payload)))
                    .is_ok(),
                None => !descriptor.required,
            };
            if !ready || (visited && flagged_invalid) {
                incomplete.push(descriptor.id.to_string());
            }
        }

        if incomplete.is_empty() {
            Ok(())
        } else {
            Err(WizardError::IncompleteSteps(incomplete))
        }
    }

    // ── Lifecycle ───────────────────────────────────────────────────

    /// Discard the session and its draft. Any submission in flight stops
    /// before its next write and its outcome is ignored.
    pub async fn cancel(&mut self) {
        self.invalidate();
        self.detached = None;
        self.session = WizardSession::new();
        if self.state != WizardState::Unmounted {
            self.state = WizardState::default();
        }
        self.form = None;
        if let Some(autosave) = &self.autosave {
            autosave.clear().await;
        }
        info!(key = %self.persistence_key, "Wizard cancelled");
    }

    /// The owning view is going away: keep the draft and stop accepting
    /// edits. A submission in flight stops before its next write; hand its
    /// outcome to `apply_outcome` so the ids it wrote reach the draft.
    pub async fn unmount(&mut self) {
        if self.state == WizardState::Submitting {
            self.detached = Some(self.generation);
        }
        self.invalidate();
        self.state = WizardState::Unmounted;
        self.form = None;
        self.flush_draft().await;
        debug!(key = %self.persistence_key, "Wizard unmounted");
    }

    /// Write the current session to the draft store now.
    pub async fn flush_draft(&self) {
        self.persist();
        if let Some(autosave) = &self.autosave {
            autosave.flush().await;
        }
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        self.cancel.cancel();
    }

    fn persist(&self) {
        let Some(autosave) = &self.autosave else {
            return;
        };
        match self.session.to_json() {
            Ok(snapshot) => autosave.schedule(snapshot),
            Err(e) => warn!(key = %self.persistence_key, error = %e, "Failed to serialize draft"),
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    fn editing_step(&self) -> Result<usize, WizardError> {
        self.state.step().ok_or_else(|| WizardError::NotEditing {
            state: self.state.to_string(),
        })
    }

    fn step_id_at(&self, step: usize) -> Result<&'static str, WizardError> {
        self.workflow
            .steps()
            .get(step)
            .map(|r| r.descriptor().id)
            .ok_or_else(|| WizardError::UnknownStep(step.to_string()))
    }

    fn check_step(&self, step_id: &str) -> Result<(), WizardError> {
        match self.workflow.steps().find(step_id) {
            Some(_) => Ok(()),
            None => Err(WizardError::UnknownStep(step_id.to_string())),
        }
    }
}

impl<W: Workflow> StepProps for WizardController<W> {
    fn data(&self) -> &StepData {
        &self.session.step_data
    }

    fn on_change(&mut self, aggregate: StepData) {
        self.session.step_data = aggregate;
        self.persist();
    }

    fn on_validation_change(&mut self, is_valid: bool) {
        if let Some(id) = self.current_step().map(|d| d.id) {
            self.session.set_step_valid(id, is_valid);
            self.persist();
        }
    }
}

/// A submission that runs apart from its controller.
pub struct PendingSubmission<W: Workflow> {
    generation: u64,
    workflow: Arc<W>,
    orchestrator: Orchestrator,
    data: StepData,
    auth: AuthContext,
    progress: SubmissionProgress,
    cancel: CancelToken,
}

impl<W: Workflow> PendingSubmission<W> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Run the writes. Never touches the controller.
    pub async fn run(self) -> SubmissionOutcome {
        let mut progress = self.progress;
        let result = self
            .orchestrator
            .submit(
                self.workflow.as_ref(),
                &self.data,
                &self.auth,
                &mut progress,
                &self.cancel,
            )
            .await;
        SubmissionOutcome {
            generation: self.generation,
            progress,
            result,
        }
    }
}

/// Result of a `PendingSubmission`, handed back to `apply_outcome`.
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub generation: u64,
    /// Entities written so far, including by earlier attempts.
    pub progress: SubmissionProgress,
    pub result: Result<SubmissionResult, SubmissionError>,
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use secrecy::SecretString;
    use serde_json::{Map, Value};
    use tokio::sync::Notify;

    use super::*;
    use crate::auth::AuthSession;
    use crate::error::BackendError;
    use crate::store::MemoryDraftStore;
    use crate::wizard::step::StepModel;
    use crate::workflows::CampaignWorkflow;
    use crate::workflows::campaign::{Audience, Planning};

    #[derive(Default)]
    struct RecordingBackend {
        inserts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DataBackend for RecordingBackend {
        async fn insert(
            &self,
            table: &str,
            _row: &Map<String, Value>,
            _auth: &AuthContext,
        ) -> Result<String, BackendError> {
            let mut inserts = self.inserts.lock().unwrap();
            inserts.push(table.to_string());
            Ok(format!("id-{}", inserts.len()))
        }

        async fn update(
            &self,
            _table: &str,
            _id: &str,
            _patch: &Map<String, Value>,
            _auth: &AuthContext,
        ) -> Result<(), BackendError> {
            Ok(())
        }
    }

    /// Holds the first insert until `release` is notified.
    #[derive(Default)]
    struct GatedBackend {
        inserts: Mutex<Vec<String>>,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl DataBackend for GatedBackend {
        async fn insert(
            &self,
            table: &str,
            _row: &Map<String, Value>,
            _auth: &AuthContext,
        ) -> Result<String, BackendError> {
            let n = {
                let mut inserts = self.inserts.lock().unwrap();
                inserts.push(table.to_string());
                inserts.len()
            };
            if n == 1 {
                self.started.notify_one();
                self.release.notified().await;
            }
            Ok(format!("id-{n}"))
        }

        async fn update(
            &self,
            _table: &str,
            _id: &str,
            _patch: &Map<String, Value>,
            _auth: &AuthContext,
        ) -> Result<(), BackendError> {
            Ok(())
        }
    }

    fn config() -> WizardConfig {
        WizardConfig {
            autosave_debounce: Duration::from_millis(10),
            ..Default::default()
        }
    }

    fn auth() -> AuthContext {
        AuthContext::authenticated(AuthSession::new("u1", SecretString::from("t")))
    }

    fn controller(
        backend: Arc<RecordingBackend>,
        drafts: Option<Arc<MemoryDraftStore>>,
    ) -> WizardController<CampaignWorkflow> {
        controller_with(backend, drafts)
    }

    fn controller_with(
        backend: Arc<dyn DataBackend>,
        drafts: Option<Arc<MemoryDraftStore>>,
    ) -> WizardController<CampaignWorkflow> {
        let deps = WizardDeps {
            backend,
            drafts: drafts.map(|d| d as Arc<dyn DraftStore>),
        };
        WizardController::new(Arc::new(CampaignWorkflow::new().unwrap()), deps, &config())
    }

    fn fill_planning(c: &mut WizardController<CampaignWorkflow>) {
        c.edit_field("name", "Summer Promo").unwrap();
    }

    /// Walk to the last step, marking the optional steps as valid.
    fn walk_to_last(c: &mut WizardController<CampaignWorkflow>) {
        while c.session().current_step_index < c.workflow().steps().last_index() {
            let id = c.current_step().unwrap().id;
            if !c.session().is_step_valid(id) {
                c.set_step_validity(id, true).unwrap();
            }
            assert!(c.next().unwrap());
        }
    }

    #[tokio::test]
    async fn next_is_gated_on_validity() {
        let mut c = controller(Arc::default(), None);
        assert!(!c.next().unwrap(), "unreported step is not valid");
        assert_eq!(c.session().current_step_index, 0);

        let valid = c.edit_field("status", "draft").unwrap();
        assert!(!valid, "name still missing");
        assert!(!c.next().unwrap());

        fill_planning(&mut c);
        assert!(c.session().is_step_valid("planning"));
        assert!(c.next().unwrap());
        assert_eq!(c.state(), &WizardState::editing(1));
    }

    #[tokio::test]
    async fn next_stops_at_last_step_and_previous_at_first() {
        let mut c = controller(Arc::default(), None);
        assert!(!c.previous().unwrap());

        fill_planning(&mut c);
        walk_to_last(&mut c);
        let last = c.workflow().steps().last_index();
        c.set_step_validity("schedule", true).unwrap();
        assert!(!c.next().unwrap());
        assert_eq!(c.session().current_step_index, last);

        assert!(c.previous().unwrap());
        assert_eq!(c.session().current_step_index, last - 1);
    }

    #[tokio::test]
    async fn update_step_data_is_idempotent() {
        let mut c = controller(Arc::default(), None);
        let audience = Audience {
            segment_name: "Families".into(),
            size: 500,
            filters: None,
        };
        c.update_step_data("audience", audience.clone().wrap()).unwrap();
        c.update_step_data("audience", audience.clone().wrap()).unwrap();

        assert_eq!(c.session().step_data.len(), 1);
        assert_eq!(
            c.session().step_data.get("audience"),
            Some(&audience.wrap())
        );
    }

    #[tokio::test]
    async fn update_step_data_rejects_unknown_and_mismatched_steps() {
        let mut c = controller(Arc::default(), None);
        assert!(matches!(
            c.update_step_data("payment", Planning::default().wrap()),
            Err(WizardError::UnknownStep(_))
        ));
        assert!(matches!(
            c.update_step_data("audience", Planning::default().wrap()),
            Err(WizardError::PayloadMismatch { .. })
        ));
        assert!(c.session().step_data.is_empty());
    }

    #[tokio::test]
    async fn complete_only_from_last_step() {
        let mut c = controller(Arc::default(), None);
        fill_planning(&mut c);
        let err = c.complete(&auth()).await.unwrap_err();
        assert!(matches!(err, WizardError::NotOnLastStep { step: 0, last: 3 }));
    }

    #[tokio::test]
    async fn complete_refuses_invalid_visited_steps() {
        let backend = Arc::new(RecordingBackend::default());
        let mut c = controller(backend.clone(), None);
        fill_planning(&mut c);
        walk_to_last(&mut c);
        c.set_step_validity("creative", false).unwrap();

        let err = c.complete(&auth()).await.unwrap_err();
        assert!(matches!(err, WizardError::IncompleteSteps(ref ids) if ids == &["creative"]));
        assert!(backend.inserts.lock().unwrap().is_empty());
        assert_eq!(c.state().step(), Some(3), "still editing");
    }

    #[tokio::test]
    async fn successful_completion_clears_draft() {
        let backend = Arc::new(RecordingBackend::default());
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut c = controller(backend.clone(), Some(drafts.clone()));
        fill_planning(&mut c);
        walk_to_last(&mut c);
        c.flush_draft().await;
        assert!(drafts.load("wizard_draft:campaign").await.unwrap().is_some());

        let result = c.complete(&auth()).await.unwrap();
        assert_eq!(result.id("campaignId"), Some("id-1"));
        assert_eq!(c.state(), &WizardState::Completed);
        assert!(drafts.load("wizard_draft:campaign").await.unwrap().is_none());
        assert!(matches!(c.next(), Err(WizardError::NotEditing { .. })));
    }

    #[tokio::test]
    async fn unauthenticated_completion_returns_to_last_step() {
        let backend = Arc::new(RecordingBackend::default());
        let mut c = controller(backend.clone(), None);
        fill_planning(&mut c);
        walk_to_last(&mut c);

        let err = c.complete(&AuthContext::anonymous()).await.unwrap_err();
        assert!(matches!(
            err,
            WizardError::Submission(SubmissionError::Unauthenticated)
        ));
        assert!(backend.inserts.lock().unwrap().is_empty());
        assert_eq!(c.state().step(), Some(3));
        assert!(c.state().last_error().is_some());
        assert_eq!(
            c.session().step_data.get("planning").and_then(Planning::peek).map(|p| p.name.as_str()),
            Some("Summer Promo"),
            "entered data kept"
        );
    }

    #[tokio::test]
    async fn late_outcome_after_cancel_is_ignored() {
        let backend = Arc::new(RecordingBackend::default());
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut c = controller(backend.clone(), Some(drafts.clone()));
        fill_planning(&mut c);
        walk_to_last(&mut c);

        let pending = c.begin_submission(&auth()).unwrap();
        assert_eq!(c.state(), &WizardState::Submitting);
        let token = c.cancel_handle();

        c.cancel().await;
        assert!(token.is_cancelled());
        assert_eq!(c.generation(), 1);

        let outcome = tokio::spawn(pending.run()).await.unwrap();
        assert!(matches!(
            outcome.result,
            Err(SubmissionError::Cancelled { .. })
        ));
        assert!(c.apply_outcome(outcome).await.is_none());
        assert!(backend.inserts.lock().unwrap().is_empty());
        assert_eq!(c.state(), &WizardState::editing(0));
        assert!(c.session().step_data.is_empty());
        assert!(drafts.load("wizard_draft:campaign").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unmount_mid_write_keeps_written_ids_for_resume() {
        let backend = Arc::new(GatedBackend::default());
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut c = controller_with(backend.clone(), Some(drafts.clone()));
        fill_planning(&mut c);
        assert!(c.next().unwrap());
        c.edit_field("segmentName", "Families").unwrap();
        assert!(c.edit_field("size", "500").unwrap());
        walk_to_last(&mut c);

        let pending = c.begin_submission(&auth()).unwrap();
        let run = tokio::spawn(pending.run());
        backend.started.notified().await;
        c.unmount().await;
        assert_eq!(c.state(), &WizardState::Unmounted);
        assert!(matches!(c.edit_field("name", "x"), Err(WizardError::NotEditing { .. })));

        backend.release.notify_one();
        let outcome = run.await.unwrap();
        assert!(matches!(
            outcome.result,
            Err(SubmissionError::Cancelled { ref entity }) if entity == "audience_segment"
        ));
        assert!(c.apply_outcome(outcome).await.is_none());

        let stored = drafts.load("wizard_draft:campaign").await.unwrap().unwrap();
        assert_eq!(stored["progress"]["campaign"], "id-1");
        drop(c);

        let deps = WizardDeps {
            backend: backend.clone(),
            drafts: Some(drafts.clone() as Arc<dyn DraftStore>),
        };
        let mut resumed = WizardController::resume(
            Arc::new(CampaignWorkflow::new().unwrap()),
            deps,
            &config(),
        )
        .await;
        let result = resumed.complete(&auth()).await.unwrap();
        assert_eq!(result.id("campaignId"), Some("id-1"));
        assert_eq!(
            *backend.inserts.lock().unwrap(),
            ["campaigns", "audience_segments"],
            "campaign row written once"
        );
    }

    #[tokio::test]
    async fn unmount_then_finished_submission_clears_draft() {
        let backend = Arc::new(GatedBackend::default());
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut c = controller_with(backend.clone(), Some(drafts.clone()));
        fill_planning(&mut c);
        walk_to_last(&mut c);

        let pending = c.begin_submission(&auth()).unwrap();
        let run = tokio::spawn(pending.run());
        backend.started.notified().await;
        c.unmount().await;
        assert!(drafts.load("wizard_draft:campaign").await.unwrap().is_some());

        backend.release.notify_one();
        let outcome = run.await.unwrap();
        assert!(outcome.result.is_ok());
        assert!(c.apply_outcome(outcome).await.is_none());
        assert!(drafts.load("wizard_draft:campaign").await.unwrap().is_none());
        assert_eq!(*backend.inserts.lock().unwrap(), ["campaigns"]);
    }

    #[tokio::test]
    async fn unmount_keeps_the_draft() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut c = controller(Arc::default(), Some(drafts.clone()));
        fill_planning(&mut c);
        c.unmount().await;

        let stored = drafts.load("wizard_draft:campaign").await.unwrap().unwrap();
        assert_eq!(stored["stepData"]["planning"]["data"]["name"], "Summer Promo");
    }

    #[tokio::test]
    async fn resume_restores_draft_verbatim() {
        let drafts = Arc::new(MemoryDraftStore::new());
        let mut first = controller(Arc::default(), Some(drafts.clone()));
        fill_planning(&mut first);
        assert!(first.next().unwrap());
        first.edit_field("segmentName", "Families").unwrap();
        first.edit_field("size", "500").unwrap();
        first.flush_draft().await;
        let saved = first.session().clone();

        let deps = WizardDeps {
            backend: Arc::new(RecordingBackend::default()),
            drafts: Some(drafts.clone() as Arc<dyn DraftStore>),
        };
        let resumed = WizardController::resume(
            Arc::new(CampaignWorkflow::new().unwrap()),
            deps,
            &config(),
        )
        .await;

        assert_eq!(resumed.session().step_data, saved.step_data);
        assert_eq!(resumed.session().current_step_index, 1);
        assert_eq!(resumed.state(), &WizardState::editing(1));
    }

    #[tokio::test]
    async fn undecodable_draft_is_ignored() {
        let drafts = Arc::new(MemoryDraftStore::new());
        drafts
            .save("wizard_draft:campaign", &serde_json::json!({"currentStepIndex": "two"}))
            .await
            .unwrap();
        let deps = WizardDeps {
            backend: Arc::new(RecordingBackend::default()),
            drafts: Some(drafts as Arc<dyn DraftStore>),
        };
        let c = WizardController::resume(
            Arc::new(CampaignWorkflow::new().unwrap()),
            deps,
            &config(),
        )
        .await;
        assert_eq!(c.session(), &WizardSession::new());
    }

    #[tokio::test]
    async fn view_follows_current_step() {
        let mut c = controller(Arc::default(), None);
        assert!(c.view().is_none());
        let view = c.open_form().unwrap();
        assert_eq!(view.step_id, "planning");
        fill_planning(&mut c);
        assert!(c.next().unwrap());
        assert!(c.view().is_none(), "form closed on navigation");
        c.edit_field("segmentName", "Families").unwrap();
        assert_eq!(c.view().unwrap().step_id, "audience");
    }
}
