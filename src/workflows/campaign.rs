//! Marketing campaign wizard.
//!
//! Steps: planning → audience → creative → schedule. Only planning is
//! required; it produces the root `campaign` row and every other entity
//! hangs off it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::AuthSession;
use crate::error::{SubmissionError, WizardError};
use crate::form::{FieldKind, FieldSpec, FieldValues, RawFields, StepSchema};
use crate::submission::{EntityWrite, SubmissionPlan};
use crate::wizard::session::StepData;
use crate::wizard::step::{FormStep, StepDescriptor, StepModel, StepRegistry, StepRenderer};

use super::{StepPayload, Workflow, raw_fields, step};

const CAMPAIGN: &str = "campaign";
const AUDIENCE_SEGMENT: &str = "audience_segment";
const CAMPAIGN_DESIGN: &str = "campaign_design";
const CAMPAIGN_INSTANCE: &str = "campaign_instance";

// ── Choice enums ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Scheduled,
    Active,
}

impl CampaignStatus {
    pub const CHOICES: &'static [&'static str] = &["draft", "scheduled", "active"];
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Active => write!(f, "active"),
        }
    }
}

impl FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "active" => Ok(Self::Active),
            other => Err(format!("unknown campaign status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[default]
    Hero,
    Grid,
    Story,
}

impl Layout {
    pub const CHOICES: &'static [&'static str] = &["hero", "grid", "story"];
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hero => write!(f, "hero"),
            Self::Grid => write!(f, "grid"),
            Self::Story => write!(f, "story"),
        }
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hero" => Ok(Self::Hero),
            "grid" => Ok(Self::Grid),
            "story" => Ok(Self::Story),
            other => Err(format!("unknown layout: {other}")),
        }
    }
}

// ── Steps ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Planning {
    pub name: String,
    pub status: CampaignStatus,
    pub budget: Option<Decimal>,
    #[serde(default)]
    pub goals: Vec<String>,
}

impl StepModel for Planning {
    const DESCRIPTOR: StepDescriptor = StepDescriptor {
        id: "planning",
        title: "Campaign planning",
        description: "Name the campaign and set its budget and goals.",
        required: true,
    };

    fn schema() -> StepSchema {
        StepSchema::new(vec![
            FieldSpec::text("name", "Campaign name").required(),
            FieldSpec::new("status", "Status", FieldKind::Choice(CampaignStatus::CHOICES))
                .required()
                .with_default("draft"),
            FieldSpec::new(
                "budget",
                "Budget",
                FieldKind::Decimal {
                    min: Some(Decimal::ZERO),
                },
            ),
            FieldSpec::new("goals", "Goals (comma-separated)", FieldKind::List),
        ])
    }

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            name: fields.text("name").unwrap_or_default(),
            status: fields
                .text("status")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            budget: fields.decimal("budget"),
            goals: fields.list("goals"),
        }
    }

    fn to_raw(&self) -> RawFields {
        raw_fields([
            ("name", self.name.clone()),
            ("status", self.status.to_string()),
            ("budget", self.budget.map(|b| b.to_string()).unwrap_or_default()),
            ("goals", self.goals.join(", ")),
        ])
    }

    fn wrap(self) -> StepPayload {
        StepPayload::CampaignPlanning(self)
    }

    fn peek(payload: &StepPayload) -> Option<&Self> {
        match payload {
            StepPayload::CampaignPlanning(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Audience {
    pub segment_name: String,
    pub size: i64,
    pub filters: Option<Value>,
}

impl StepModel for Audience {
    const DESCRIPTOR: StepDescriptor = StepDescriptor {
        id: "audience",
        title: "Audience",
        description: "Who the campaign targets.",
        required: false,
    };

    fn schema() -> StepSchema {
        StepSchema::new(vec![
            FieldSpec::text("segmentName", "Segment name").required(),
            FieldSpec::new(
                "size",
                "Estimated size",
                FieldKind::Integer {
                    min: Some(0),
                    max: None,
                },
            )
            .required(),
            FieldSpec::new("filters", "Filters (JSON)", FieldKind::Json),
        ])
    }

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            segment_name: fields.text("segmentName").unwrap_or_default(),
            size: fields.integer("size").unwrap_or_default(),
            filters: fields.json("filters"),
        }
    }

    fn to_raw(&self) -> RawFields {
        raw_fields([
            ("segmentName", self.segment_name.clone()),
            ("size", self.size.to_string()),
            (
                "filters",
                self.filters
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_default(),
            ),
        ])
    }

    fn wrap(self) -> StepPayload {
        StepPayload::CampaignAudience(self)
    }

    fn peek(payload: &StepPayload) -> Option<&Self> {
        match payload {
            StepPayload::CampaignAudience(a) => Some(a),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Creative {
    pub design_name: String,
    pub layout: Layout,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl StepModel for Creative {
    const DESCRIPTOR: StepDescriptor = StepDescriptor {
        id: "creative",
        title: "Creative",
        description: "The design the campaign ships with.",
        required: false,
    };

    fn schema() -> StepSchema {
        StepSchema::new(vec![
            FieldSpec::text("designName", "Design name").required(),
            FieldSpec::new("layout", "Layout", FieldKind::Choice(Layout::CHOICES))
                .required()
                .with_default("hero"),
            FieldSpec::new("tags", "Tags (comma-separated)", FieldKind::List),
        ])
    }

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            design_name: fields.text("designName").unwrap_or_default(),
            layout: fields
                .text("layout")
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            tags: fields.list("tags"),
        }
    }

    fn to_raw(&self) -> RawFields {
        raw_fields([
            ("designName", self.design_name.clone()),
            ("layout", self.layout.to_string()),
            ("tags", self.tags.join(", ")),
        ])
    }

    fn wrap(self) -> StepPayload {
        StepPayload::CampaignCreative(self)
    }

    fn peek(payload: &StepPayload) -> Option<&Self> {
        match payload {
            StepPayload::CampaignCreative(c) => Some(c),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub launch_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub channels: Vec<String>,
}

impl StepModel for Schedule {
    const DESCRIPTOR: StepDescriptor = StepDescriptor {
        id: "schedule",
        title: "Schedule",
        description: "When and where the campaign runs.",
        required: false,
    };

    fn schema() -> StepSchema {
        StepSchema::new(vec![
            FieldSpec::new("launchDate", "Launch date (YYYY-MM-DD)", FieldKind::Date),
            FieldSpec::new("endDate", "End date (YYYY-MM-DD)", FieldKind::Date),
            FieldSpec::new("channels", "Channels (comma-separated)", FieldKind::List),
        ])
    }

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            launch_date: fields.date("launchDate"),
            end_date: fields.date("endDate"),
            channels: fields.list("channels"),
        }
    }

    fn to_raw(&self) -> RawFields {
        let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        raw_fields([
            ("launchDate", date(self.launch_date)),
            ("endDate", date(self.end_date)),
            ("channels", self.channels.join(", ")),
        ])
    }

    fn wrap(self) -> StepPayload {
        StepPayload::CampaignSchedule(self)
    }

    fn peek(payload: &StepPayload) -> Option<&Self> {
        match payload {
            StepPayload::CampaignSchedule(s) => Some(s),
            _ => None,
        }
    }
}

// ── Backend rows ────────────────────────────────────────────────────

#[derive(Serialize)]
struct CampaignRow<'a> {
    name: &'a str,
    status: CampaignStatus,
    budget: Option<Decimal>,
    goals: &'a [String],
    created_by: &'a str,
}

#[derive(Serialize)]
struct SegmentRow<'a> {
    segment_name: &'a str,
    size: i64,
    filters: Option<&'a Value>,
    created_by: &'a str,
}

#[derive(Serialize)]
struct DesignRow<'a> {
    design_name: &'a str,
    layout: Layout,
    tags: &'a [String],
    created_by: &'a str,
}

#[derive(Serialize)]
struct InstanceRow<'a> {
    launch_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    channels: &'a [String],
    status: CampaignStatus,
    created_by: &'a str,
}

// ── Workflow ────────────────────────────────────────────────────────

pub struct CampaignWorkflow {
    steps: StepRegistry,
}

impl CampaignWorkflow {
    pub fn new() -> Result<Self, WizardError> {
        let steps: Vec<Arc<dyn StepRenderer>> = vec![
            Arc::new(FormStep::<Planning>::new()),
            Arc::new(FormStep::<Audience>::new()),
            Arc::new(FormStep::<Creative>::new()),
            Arc::new(FormStep::<Schedule>::new()),
        ];
        Ok(Self {
            steps: StepRegistry::new(steps)?,
        })
    }
}

impl Workflow for CampaignWorkflow {
    fn kind(&self) -> &'static str {
        "campaign"
    }

    fn steps(&self) -> &StepRegistry {
        &self.steps
    }

    fn plan(
        &self,
        data: &StepData,
        session: &AuthSession,
    ) -> Result<SubmissionPlan, SubmissionError> {
        let planning = step::<Planning>(data).ok_or_else(|| {
            SubmissionError::Precondition("the planning step has not been filled in".into())
        })?;
        let name = planning.name.trim();
        if name.is_empty() {
            return Err(SubmissionError::Precondition(
                "a campaign name is required".into(),
            ));
        }
        let created_by = session.user_id.as_str();

        let mut plan = SubmissionPlan::new();
        plan.push(EntityWrite::insert(
            CAMPAIGN,
            "campaigns",
            "campaignId",
            CampaignRow {
                name,
                status: planning.status,
                budget: planning.budget,
                goals: &planning.goals,
                created_by,
            },
        )?);

        if let Some(audience) = step::<Audience>(data) {
            plan.push(
                EntityWrite::insert(
                    AUDIENCE_SEGMENT,
                    "audience_segments",
                    "audienceSegmentId",
                    SegmentRow {
                        segment_name: audience.segment_name.trim(),
                        size: audience.size,
                        filters: audience.filters.as_ref(),
                        created_by,
                    },
                )?
                .references("campaign_id", CAMPAIGN),
            );
        }

        if let Some(creative) = step::<Creative>(data) {
            plan.push(
                EntityWrite::insert(
                    CAMPAIGN_DESIGN,
                    "campaign_designs",
                    "designId",
                    DesignRow {
                        design_name: creative.design_name.trim(),
                        layout: creative.layout,
                        tags: &creative.tags,
                        created_by,
                    },
                )?
                .references("campaign_id", CAMPAIGN),
            );
        }

        if let Some(schedule) = step::<Schedule>(data) {
            plan.push(
                EntityWrite::insert(
                    CAMPAIGN_INSTANCE,
                    "campaign_instances",
                    "instanceId",
                    InstanceRow {
                        launch_date: schedule.launch_date,
                        end_date: schedule.end_date,
                        channels: &schedule.channels,
                        status: CampaignStatus::Scheduled,
                        created_by,
                    },
                )?
                .references("campaign_id", CAMPAIGN)
                .optionally_references("design_id", CAMPAIGN_DESIGN),
            );
            plan.push(
                EntityWrite::update(
                    "campaign_activation",
                    "campaigns",
                    CAMPAIGN,
                    serde_json::json!({}),
                )?
                .references("active_instance_id", CAMPAIGN_INSTANCE),
            );
        }

        Ok(plan)
    }
}
