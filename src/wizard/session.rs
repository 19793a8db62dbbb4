//! The in-progress run of a wizard and its serializable draft form.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::workflows::StepPayload;

/// Step aggregate keyed by step id, in the order steps were first filled.
pub type StepData = IndexMap<String, StepPayload>;

/// Entities already written by earlier submission attempts.
///
/// Keyed by logical entity name (`campaign`, `audience_segment`, ...); the
/// value is the backend id of the row written for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubmissionProgress {
    written: IndexMap<String, String>,
}

impl SubmissionProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity: &str) -> Option<&str> {
        self.written.get(entity).map(String::as_str)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.written.contains_key(entity)
    }

    pub fn record(&mut self, entity: impl Into<String>, id: impl Into<String>) {
        self.written.insert(entity.into(), id.into());
    }

    pub fn is_empty(&self) -> bool {
        self.written.is_empty()
    }

    pub fn len(&self) -> usize {
        self.written.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.written.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// State owned by one wizard controller; this is exactly what a draft stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSession {
    pub current_step_index: usize,
    pub step_data: StepData,
    #[serde(default)]
    pub is_valid_by_step: IndexMap<String, bool>,
    #[serde(default, skip_serializing_if = "SubmissionProgress::is_empty")]
    pub progress: SubmissionProgress,
}

impl WizardSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validity reported for a step; unreported steps are not valid.
    pub fn is_step_valid(&self, step_id: &str) -> bool {
        self.is_valid_by_step.get(step_id).copied().unwrap_or(false)
    }

    pub fn set_step_valid(&mut self, step_id: &str, is_valid: bool) {
        self.is_valid_by_step.insert(step_id.to_string(), is_valid);
    }

    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::workflows::campaign::{Audience, CampaignStatus, Planning};
    use crate::wizard::step::StepModel;

    fn sample() -> WizardSession {
        let mut session = WizardSession::new();
        session.current_step_index = 1;
        session.step_data.insert(
            "audience".into(),
            Audience {
                segment_name: "Families".into(),
                size: 500,
                filters: Some(json!({"region": "EU"})),
            }
            .wrap(),
        );
        session.step_data.insert(
            "planning".into(),
            Planning {
                name: "Summer Promo".into(),
                status: CampaignStatus::Draft,
                ..Default::default()
            }
            .wrap(),
        );
        session.set_step_valid("planning", true);
        session
    }

    #[test]
    fn draft_round_trip_is_verbatim() {
        let session = sample();
        let restored = WizardSession::from_json(session.to_json().unwrap()).unwrap();
        assert_eq!(restored, session);
        assert_eq!(restored.current_step_index, 1);
        let keys: Vec<&String> = restored.step_data.keys().collect();
        assert_eq!(keys, ["audience", "planning"], "insertion order kept");
    }

    #[test]
    fn json_shape_is_tagged_by_step() {
        let json = sample().to_json().unwrap();
        assert_eq!(json["currentStepIndex"], 1);
        assert_eq!(json["stepData"]["planning"]["step"], "campaign_planning");
        assert_eq!(json["stepData"]["planning"]["data"]["name"], "Summer Promo");
        assert!(json.get("progress").is_none(), "empty progress is omitted");
    }

    #[test]
    fn validity_defaults_to_false() {
        let session = sample();
        assert!(session.is_step_valid("planning"));
        assert!(!session.is_step_valid("audience"));
    }

    #[test]
    fn progress_survives_round_trip() {
        let mut session = sample();
        session.progress.record("campaign", "c1");
        let restored = WizardSession::from_json(session.to_json().unwrap()).unwrap();
        assert_eq!(restored.progress.get("campaign"), Some("c1"));
        assert_eq!(restored.progress.len(), 1);
    }

    #[test]
    fn old_drafts_without_optional_fields_load() {
        let restored = WizardSession::from_json(json!({
            "currentStepIndex": 0,
            "stepData": {}
        }))
        .unwrap();
        assert!(restored.is_valid_by_step.is_empty());
        assert!(restored.progress.is_empty());
    }
}
