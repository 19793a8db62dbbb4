//! Concrete wizards: their steps, payload shapes, and submission plans.

pub mod campaign;
pub mod event;

use serde::{Deserialize, Serialize};

use crate::auth::AuthSession;
use crate::error::SubmissionError;
use crate::submission::SubmissionPlan;
use crate::wizard::session::StepData;
use crate::wizard::step::{StepModel, StepRegistry};

pub use campaign::CampaignWorkflow;
pub use event::EventWorkflow;

/// Every step payload any workflow can hold, tagged by step.
///
/// Serialized as `{"step": "campaign_planning", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", content = "data", rename_all = "snake_case")]
pub enum StepPayload {
    CampaignPlanning(campaign::Planning),
    CampaignAudience(campaign::Audience),
    CampaignCreative(campaign::Creative),
    CampaignSchedule(campaign::Schedule),
    EventDetails(event::Details),
    EventTicketing(event::Ticketing),
    EventPromotion(event::Promotion),
}

impl StepPayload {
    /// Id of the step this payload belongs to.
    pub fn step_id(&self) -> &'static str {
        match self {
            Self::CampaignPlanning(_) => campaign::Planning::DESCRIPTOR.id,
            Self::CampaignAudience(_) => campaign::Audience::DESCRIPTOR.id,
            Self::CampaignCreative(_) => campaign::Creative::DESCRIPTOR.id,
            Self::CampaignSchedule(_) => campaign::Schedule::DESCRIPTOR.id,
            Self::EventDetails(_) => event::Details::DESCRIPTOR.id,
            Self::EventTicketing(_) => event::Ticketing::DESCRIPTOR.id,
            Self::EventPromotion(_) => event::Promotion::DESCRIPTOR.id,
        }
    }
}

/// A wizard type: its ordered steps and how its aggregate is persisted.
pub trait Workflow: Send + Sync + 'static {
    /// Wizard type, e.g. `campaign`. Drafts are keyed by it.
    fn kind(&self) -> &'static str;

    fn steps(&self) -> &StepRegistry;

    /// Derive the ordered backend writes for a validated aggregate.
    ///
    /// Root preconditions are checked here, so a failing plan issues no write.
    fn plan(&self, data: &StepData, session: &AuthSession)
    -> Result<SubmissionPlan, SubmissionError>;
}

/// Typed view of one step in the aggregate.
pub fn step<T: StepModel>(data: &StepData) -> Option<&T> {
    data.get(T::DESCRIPTOR.id).and_then(T::peek)
}

/// Build a `RawFields` map from field name / text pairs.
pub(crate) fn raw_fields<const N: usize>(pairs: [(&str, String); N]) -> crate::form::RawFields {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
