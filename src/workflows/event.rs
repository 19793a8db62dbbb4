//! Event listing wizard: details → ticketing → promotion.

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

const EVENT: &str = "event";
const TICKET_TIER: &str = "ticket_tier";
const EVENT_PROMOTION: &str = "event_promotion";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Details {
    pub title: String,
    pub venue: String,
    pub starts_on: Option<NaiveDate>,
    pub ends_on: Option<NaiveDate>,
    pub capacity: Option<i64>,
    pub contact_email: Option<String>,
}

impl StepModel for Details {
    const DESCRIPTOR: StepDescriptor = StepDescriptor {
        id: "details",
        title: "Event details",
        description: "What, where and when.",
        required: true,
    };

    fn schema() -> StepSchema {
        StepSchema::new(vec![
            FieldSpec::text("title", "Title").required(),
            FieldSpec::text("venue", "Venue"),
            FieldSpec::new("startsOn", "Starts on (YYYY-MM-DD)", FieldKind::Date).required(),
            FieldSpec::new("endsOn", "Ends on (YYYY-MM-DD)", FieldKind::Date),
            FieldSpec::new(
                "capacity",
                "Capacity",
                FieldKind::Integer {
                    min: Some(1),
                    max: None,
                },
            ),
            FieldSpec::new("contactEmail", "Contact email", FieldKind::Email),
        ])
    }

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            title: fields.text("title").unwrap_or_default(),
            venue: fields.text("venue").unwrap_or_default(),
            starts_on: fields.date("startsOn"),
            ends_on: fields.date("endsOn"),
            capacity: fields.integer("capacity"),
            contact_email: fields.text("contactEmail"),
        }
    }

    fn to_raw(&self) -> RawFields {
        let date = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_default();
        raw_fields([
            ("title", self.title.clone()),
            ("venue", self.venue.clone()),
            ("startsOn", date(self.starts_on)),
            ("endsOn", date(self.ends_on)),
            (
                "capacity",
                self.capacity.map(|c| c.to_string()).unwrap_or_default(),
            ),
            ("contactEmail", self.contact_email.clone().unwrap_or_default()),
        ])
    }

    fn wrap(self) -> StepPayload {
        StepPayload::EventDetails(self)
    }

    fn peek(payload: &StepPayload) -> Option<&Self> {
        match payload {
            StepPayload::EventDetails(d) => Some(d),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticketing {
    pub tier_name: String,
    pub price: Decimal,
    pub quantity: Option<i64>,
    #[serde(default)]
    pub perks: Vec<String>,
}

impl StepModel for Ticketing {
    const DESCRIPTOR: StepDescriptor = StepDescriptor {
        id: "ticketing",
        title: "Ticketing",
        description: "The ticket tier on sale.",
        required: false,
    };

    fn schema() -> StepSchema {
        StepSchema::new(vec![
            FieldSpec::text("tierName", "Tier name").required(),
            FieldSpec::new(
                "price",
                "Price",
                FieldKind::Decimal {
                    min: Some(Decimal::ZERO),
                },
            )
            .required(),
            FieldSpec::new(
                "quantity",
                "Tickets available",
                FieldKind::Integer {
                    min: Some(1),
                    max: None,
                },
            ),
            FieldSpec::new("perks", "Perks (comma-separated)", FieldKind::List),
        ])
    }

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            tier_name: fields.text("tierName").unwrap_or_default(),
            price: fields.decimal("price").unwrap_or_default(),
            quantity: fields.integer("quantity"),
            perks: fields.list("perks"),
        }
    }

    fn to_raw(&self) -> RawFields {
        raw_fields([
            ("tierName", self.tier_name.clone()),
            ("price", self.price.to_string()),
            (
                "quantity",
                self.quantity.map(|q| q.to_string()).unwrap_or_default(),
            ),
            ("perks", self.perks.join(", ")),
        ])
    }

    fn wrap(self) -> StepPayload {
        StepPayload::EventTicketing(self)
    }

    fn peek(payload: &StepPayload) -> Option<&Self> {
        match payload {
            StepPayload::EventTicketing(t) => Some(t),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Promotion {
    pub headline: String,
    #[serde(default)]
    pub channels: Vec<String>,
    pub metadata: Option<Value>,
}

impl StepModel for Promotion {
    const DESCRIPTOR: StepDescriptor = StepDescriptor {
        id: "promotion",
        title: "Promotion",
        description: "How the event is announced.",
        required: false,
    };

    fn schema() -> StepSchema {
        StepSchema::new(vec![
            FieldSpec::text("headline", "Headline").required(),
            FieldSpec::new("channels", "Channels (comma-separated)", FieldKind::List),
            FieldSpec::new("metadata", "Metadata (JSON)", FieldKind::Json),
        ])
    }

    fn from_fields(fields: &FieldValues) -> Self {
        Self {
            headline: fields.text("headline").unwrap_or_default(),
            channels: fields.list("channels"),
            metadata: fields.json("metadata"),
        }
    }

    fn to_raw(&self) -> RawFields {
        raw_fields([
            ("headline", self.headline.clone()),
            ("channels", self.channels.join(", ")),
            (
                "metadata",
                self.metadata
                    .as_ref()
                    .map(Value::to_string)
                    .unwrap_or_default(),
            ),
        ])
    }

    fn wrap(self) -> StepPayload {
        StepPayload::EventPromotion(self)
    }

    fn peek(payload: &StepPayload) -> Option<&Self> {
        match payload {
            StepPayload::EventPromotion(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct EventRow<'a> {
    title: &'a str,
    venue: Option<&'a str>,
    starts_on: NaiveDate,
    ends_on: Option<NaiveDate>,
    capacity: Option<i64>,
    contact_email: Option<&'a str>,
    created_by: &'a str,
}

#[derive(Serialize)]
struct TierRow<'a> {
    name: &'a str,
    price: Decimal,
    quantity: Option<i64>,
    perks: &'a [String],
    created_by: &'a str,
}

#[derive(Serialize)]
struct PromotionRow<'a> {
    headline: &'a str,
    channels: &'a [String],
    metadata: Option<&'a Value>,
    created_by: &'a str,
}

pub struct EventWorkflow {
    steps: StepRegistry,
}

impl EventWorkflow {
    pub fn new() -> Result<Self, WizardError> {
        let steps: Vec<Arc<dyn StepRenderer>> = vec![
            Arc::new(FormStep::<Details>::new()),
            Arc::new(FormStep::<Ticketing>::new()),
            Arc::new(FormStep::<Promotion>::new()),
        ];
        Ok(Self {
            steps: StepRegistry::new(steps)?,
        })
    }
}

impl Workflow for EventWorkflow {
    fn kind(&self) -> &'static str {
        "event"
    }

    fn steps(&self) -> &StepRegistry {
        &self.steps
    }

    fn plan(
        &self,
        data: &StepData,
        session: &AuthSession,
    ) -> Result<SubmissionPlan, SubmissionError> {
        let details = step::<Details>(data).ok_or_else(|| {
            SubmissionError::Precondition("the event details step has not been filled in".into())
        })?;
        let title = details.title.trim();
        if title.is_empty() {
            return Err(SubmissionError::Precondition(
                "an event title is required".into(),
            ));
        }
        let starts_on = details.starts_on.ok_or_else(|| {
            SubmissionError::Precondition("an event start date is required".into())
        })?;
        let created_by = session.user_id.as_str();
        let venue = Some(details.venue.trim()).filter(|v| !v.is_empty());

        let mut plan = SubmissionPlan::new();
        plan.push(EntityWrite::insert(
            EVENT,
            "events",
            "eventId",
            EventRow {
                title,
                venue,
                starts_on,
                ends_on: details.ends_on,
                capacity: details.capacity,
                contact_email: details.contact_email.as_deref(),
                created_by,
            },
        )?);

        if let Some(ticketing) = step::<Ticketing>(data) {
            plan.push(
                EntityWrite::insert(
                    TICKET_TIER,
                    "ticket_tiers",
                    "ticketTierId",
                    TierRow {
                        name: ticketing.tier_name.trim(),
                        price: ticketing.price,
                        quantity: ticketing.quantity,
                        perks: &ticketing.perks,
                        created_by,
                    },
                )?
                .references("event_id", EVENT),
            );
        }

        if let Some(promotion) = step::<Promotion>(data) {
            plan.push(
                EntityWrite::insert(
                    EVENT_PROMOTION,
                    "event_promotions",
                    "promotionId",
                    PromotionRow {
                        headline: promotion.headline.trim(),
                        channels: &promotion.channels,
                        metadata: promotion.metadata.as_ref(),
                        created_by,
                    },
                )?
                .references("event_id", EVENT)
                .optionally_references("ticket_tier_id", TICKET_TIER),
            );
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use secrecy::SecretString;
    use serde_json::json;

    use super::*;
    use crate::form::FieldError;
    use crate::wizard::session::SubmissionProgress;

    fn session() -> AuthSession {
        AuthSession::new("host-1", SecretString::from("token"))
    }

    fn details() -> Details {
        Details {
            title: "Harbour Jazz Night".into(),
            venue: "Pier 4".into(),
            starts_on: NaiveDate::from_ymd_opt(2026, 9, 12),
            capacity: Some(200),
            ..Default::default()
        }
    }

    fn data(payloads: Vec<StepPayload>) -> StepData {
        payloads
            .into_iter()
            .map(|p| (p.step_id().to_string(), p))
            .collect()
    }

    #[test]
    fn plan_orders_event_before_children() {
        let workflow = EventWorkflow::new().unwrap();
        let aggregate = data(vec![
            Promotion {
                headline: "Live on the water".into(),
                channels: vec!["instagram".into()],
                metadata: Some(json!({"utm": "jazz"})),
            }
            .wrap(),
            details().wrap(),
            Ticketing {
                tier_name: "General".into(),
                price: dec!(25.00),
                quantity: Some(150),
                perks: vec![],
            }
            .wrap(),
        ]);

        let plan = workflow.plan(&aggregate, &session()).unwrap();
        assert_eq!(plan.entities(), ["event", "ticket_tier", "event_promotion"]);

        let event = &plan.writes()[0].row;
        assert_eq!(event["starts_on"], "2026-09-12");
        assert_eq!(event["venue"], "Pier 4");
        assert_eq!(event["contact_email"], Value::Null);
        assert_eq!(event["created_by"], "host-1");
        assert_eq!(plan.writes()[2].row["metadata"], json!({"utm": "jazz"}));
    }

    #[test]
    fn promotion_without_tier_writes_null_tier() {
        let workflow = EventWorkflow::new().unwrap();
        let aggregate = data(vec![
            details().wrap(),
            Promotion {
                headline: "Soon".into(),
                ..Default::default()
            }
            .wrap(),
        ]);
        let plan = workflow.plan(&aggregate, &session()).unwrap();
        assert_eq!(plan.entities(), ["event", "event_promotion"]);

        let mut progress = SubmissionProgress::new();
        progress.record("event", "e1");
        let row = plan.writes()[1].resolve(&progress).unwrap();
        assert_eq!(row["event_id"], "e1");
        assert_eq!(row["ticket_tier_id"], Value::Null);
    }

    #[test]
    fn missing_title_or_start_date_fails_before_planning() {
        let workflow = EventWorkflow::new().unwrap();

        let untitled = Details {
            title: String::new(),
            ..details()
        };
        assert!(matches!(
            workflow.plan(&data(vec![untitled.wrap()]), &session()),
            Err(SubmissionError::Precondition(_))
        ));

        let undated = Details {
            starts_on: None,
            ..details()
        };
        assert!(matches!(
            workflow.plan(&data(vec![undated.wrap()]), &session()),
            Err(SubmissionError::Precondition(_))
        ));
    }

    #[test]
    fn details_schema_checks_email_and_capacity() {
        let mut raw = details().to_raw();
        raw.insert("contactEmail".into(), "not-an-email".into());
        raw.insert("capacity".into(), "0".into());
        let errors = Details::schema().validate(&raw).unwrap_err();
        assert_eq!(errors.get("contactEmail"), Some(&FieldError::InvalidEmail));
        assert!(matches!(
            errors.get("capacity"),
            Some(FieldError::OutOfRange { .. })
        ));
    }

    #[test]
    fn unparseable_metadata_becomes_null() {
        let mut raw = Promotion::schema().default_raw();
        raw.insert("headline".into(), "Soon".into());
        raw.insert("metadata".into(), "{not json".into());
        let values = Promotion::schema().validate(&raw).unwrap();
        assert_eq!(Promotion::from_fields(&values).metadata, None);
    }
}
