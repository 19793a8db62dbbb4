//! Submission orchestrator: runs a workflow's plan against a table backend.
//!
//! Writes run one at a time in plan order; later rows need ids returned by
//! earlier ones. The first failure ends the run. Nothing already written is
//! rolled back: `SubmissionProgress` records it so a retry continues from
//! the failed entity instead of writing duplicates.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::auth::AuthContext;
use crate::error::SubmissionError;
use crate::store::DataBackend;
use crate::wizard::session::{StepData, SubmissionProgress};
use crate::workflows::Workflow;

use super::cancel::CancelToken;
use super::plan::{SubmissionPlan, SubmissionResult, WriteOp};

pub struct Orchestrator {
    backend: Arc<dyn DataBackend>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn DataBackend>) -> Self {
        Self { backend }
    }

    /// Build the workflow's plan from `data` and execute it.
    ///
    /// Authentication and plan preconditions are checked before any write.
    pub async fn submit<W: Workflow + ?Sized>(
        &self,
        workflow: &W,
        data: &StepData,
        auth: &AuthContext,
        progress: &mut SubmissionProgress,
        cancel: &CancelToken,
    ) -> Result<SubmissionResult, SubmissionError> {
        let session = auth.require_session()?;
        let plan = workflow.plan(data, session)?;
        self.execute(&plan, auth, progress, cancel).await
    }

    /// Execute a plan. Entities already in `progress` are skipped.
    pub async fn execute(
        &self,
        plan: &SubmissionPlan,
        auth: &AuthContext,
        progress: &mut SubmissionProgress,
        cancel: &CancelToken,
    ) -> Result<SubmissionResult, SubmissionError> {
        auth.require_session()?;
        plan.validate(progress)?;

        for write in plan.writes() {
            if let Some(id) = progress.get(write.entity) {
                debug!(entity = write.entity, id, "Already written by an earlier attempt");
                continue;
            }
            if cancel.is_cancelled() {
                warn!(entity = write.entity, "Submission cancelled");
                return Err(SubmissionError::Cancelled {
                    entity: write.entity.to_string(),
                });
            }

            let row = write.resolve(progress)?;
            match write.op {
                WriteOp::Insert => {
                    let id = self
                        .backend
                        .insert(write.table, &row, auth)
                        .await
                        .map_err(|source| {
                            warn!(entity = write.entity, table = write.table, error = %source, "Insert failed");
                            SubmissionError::Write {
                                entity: write.entity.to_string(),
                                source,
                            }
                        })?;
                    info!(entity = write.entity, table = write.table, id = %id, "Entity created");
                    progress.record(write.entity, id);
                }
                WriteOp::Update { target } => {
                    let id = progress
                        .get(target)
                        .ok_or_else(|| SubmissionError::MissingDependency {
                            entity: write.entity.to_string(),
                            depends_on: target.to_string(),
                        })?
                        .to_string();
                    self.backend
                        .update(write.table, &id, &row, auth)
                        .await
                        .map_err(|source| {
                            warn!(entity = write.entity, table = write.table, error = %source, "Update failed");
                            SubmissionError::Write {
                                entity: write.entity.to_string(),
                                source,
                            }
                        })?;
                    info!(entity = write.entity, table = write.table, id = %id, "Entity updated");
                    progress.record(write.entity, id);
                }
            }
        }

        let mut result = SubmissionResult::default();
        for write in plan.writes() {
            if let (Some(key), Some(id)) = (write.id_key, progress.get(write.entity)) {
                result.ids.insert(key.to_string(), id.to_string());
            }
        }
        Ok(result)
    }
}
