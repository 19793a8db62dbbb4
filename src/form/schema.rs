//! Per-step field schemas: coercion from raw input and validation.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::NaiveDate;
use indexmap::IndexMap;
use regex::Regex;
use rust_decimal::Decimal;

/// Raw editing state of a step, field name → text as typed.
pub type RawFields = IndexMap<String, String>;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
});

/// Date format accepted and produced by `FieldKind::Date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// What a field holds and how raw text is coerced into it.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Text,
    Email,
    Integer { min: Option<i64>, max: Option<i64> },
    Decimal { min: Option<Decimal> },
    Choice(&'static [&'static str]),
    Date,
    /// Comma-separated input, stored as a list.
    List,
    /// Freeform JSON text, stored as a parsed value.
    Json,
}

/// A coerced field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Empty,
    Text(String),
    Integer(i64),
    Decimal(Decimal),
    Date(NaiveDate),
    List(Vec<String>),
    Json(serde_json::Value),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::List(items) => items.is_empty(),
            Self::Json(value) => value.is_null(),
            _ => false,
        }
    }
}

/// Why a field is invalid. Local to the form; never propagated as an error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("This field is required")]
    Required,

    #[error("Enter a number")]
    NotANumber,

    #[error("Must be between {min} and {max}")]
    OutOfRange { min: String, max: String },

    #[error("Choose one of: {}", .0.join(", "))]
    NotAChoice(Vec<String>),

    #[error("Use the YYYY-MM-DD date format")]
    InvalidDate,

    #[error("Enter a valid email address")]
    InvalidEmail,
}

/// One field of a step schema.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Raw text seeded into a fresh form.
    pub default: Option<&'static str>,
}

impl FieldSpec {
    pub fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label,
            kind,
            required: false,
            default: None,
        }
    }

    pub fn text(name: &'static str, label: &'static str) -> Self {
        Self::new(name, label, FieldKind::Text)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, raw: &'static str) -> Self {
        self.default = Some(raw);
        self
    }

    /// Coerce raw input. Blank input is `Empty`; `required` is checked separately.
    pub fn coerce(&self, raw: &str) -> Result<FieldValue, FieldError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(FieldValue::Empty);
        }

        match &self.kind {
            FieldKind::Text => Ok(FieldValue::Text(trimmed.to_string())),
            FieldKind::Email => {
                if EMAIL_RE.is_match(trimmed) {
                    Ok(FieldValue::Text(trimmed.to_string()))
                } else {
                    Err(FieldError::InvalidEmail)
                }
            }
            FieldKind::Integer { min, max } => {
                let (min, max) = (*min, *max);
                let n: i64 = trimmed.parse().map_err(|_| FieldError::NotANumber)?;
                let below = min.is_some_and(|m| n < m);
                let above = max.is_some_and(|m| n > m);
                if below || above {
                    return Err(FieldError::OutOfRange {
                        min: min.map_or_else(|| "-∞".to_string(), |m| m.to_string()),
                        max: max.map_or_else(|| "∞".to_string(), |m| m.to_string()),
                    });
                }
                Ok(FieldValue::Integer(n))
            }
            FieldKind::Decimal { min } => {
                let d = Decimal::from_str(trimmed).map_err(|_| FieldError::NotANumber)?;
                if let Some(m) = min
                    && d < *m
                {
                    return Err(FieldError::OutOfRange {
                        min: m.to_string(),
                        max: "∞".to_string(),
                    });
                }
                Ok(FieldValue::Decimal(d))
            }
            FieldKind::Choice(options) => {
                if options.contains(&trimmed) {
                    Ok(FieldValue::Text(trimmed.to_string()))
                } else {
                    Err(FieldError::NotAChoice(
                        options.iter().map(|o| o.to_string()).collect(),
                    ))
                }
            }
            FieldKind::Date => NaiveDate::parse_from_str(trimmed, DATE_FORMAT)
                .map(FieldValue::Date)
                .map_err(|_| FieldError::InvalidDate),
            FieldKind::List => Ok(FieldValue::List(split_list(trimmed))),
            FieldKind::Json => match serde_json::from_str(trimmed) {
                Ok(value) => Ok(FieldValue::Json(value)),
                Err(e) => {
                    tracing::warn!(
                        field = self.name,
                        error = %e,
                        "Unparseable JSON field; storing null"
                    );
                    Ok(FieldValue::Json(serde_json::Value::Null))
                }
            },
        }
    }

    /// Check constraints that apply to an already-coerced value.
    pub fn check(&self, value: &FieldValue) -> Result<(), FieldError> {
        if self.required && value.is_empty() {
            return Err(FieldError::Required);
        }
        Ok(())
    }
}

/// Split comma-separated input into trimmed, non-blank items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Coerced values of a step, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues(IndexMap<String, FieldValue>);

impl FieldValues {
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    /// Non-blank text (also covers `Choice` and `Email` fields).
    pub fn text(&self, name: &str) -> Option<String> {
        match self.0.get(name) {
            Some(FieldValue::Text(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.0.get(name) {
            Some(FieldValue::Integer(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn decimal(&self, name: &str) -> Option<Decimal> {
        match self.0.get(name) {
            Some(FieldValue::Decimal(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.0.get(name) {
            Some(FieldValue::Date(d)) => Some(*d),
            _ => None,
        }
    }

    pub fn list(&self, name: &str) -> Vec<String> {
        match self.0.get(name) {
            Some(FieldValue::List(items)) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// Parsed JSON, `None` for blank or unparseable input.
    pub fn json(&self, name: &str) -> Option<serde_json::Value> {
        match self.0.get(name) {
            Some(FieldValue::Json(v)) if !v.is_null() => Some(v.clone()),
            _ => None,
        }
    }
}

/// Ordered field list for one step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepSchema {
    fields: Vec<FieldSpec>,
}

impl StepSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Raw state of a fresh form: each field's default, or blank.
    pub fn default_raw(&self) -> RawFields {
        self.fields
            .iter()
            .map(|f| (f.name.to_string(), f.default.unwrap_or_default().to_string()))
            .collect()
    }

    /// Synchronous validation of a whole step. Missing raw fields count as blank.
    pub fn validate(&self, raw: &RawFields) -> Result<FieldValues, IndexMap<String, FieldError>> {
        let mut values = FieldValues::new();
        let mut errors = IndexMap::new();

        for spec in &self.fields {
            let input = raw.get(spec.name).map(String::as_str).unwrap_or_default();
            match spec.coerce(input).and_then(|v| spec.check(&v).map(|_| v)) {
                Ok(value) => values.insert(spec.name, value),
                Err(e) => {
                    errors.insert(spec.name.to_string(), e);
                }
            }
        }

        if errors.is_empty() {
            Ok(values)
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> RawFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn blank_input_is_empty_not_an_error() {
        let spec = FieldSpec::new("size", "Size", FieldKind::Integer { min: None, max: None });
        assert_eq!(spec.coerce("   ").unwrap(), FieldValue::Empty);
    }

    #[test]
    fn required_rejects_empty_values() {
        let spec = FieldSpec::text("name", "Name").required();
        assert_eq!(spec.check(&FieldValue::Empty), Err(FieldError::Required));
        assert_eq!(spec.check(&FieldValue::List(vec![])), Err(FieldError::Required));
        assert!(spec.check(&FieldValue::Text("x".into())).is_ok());
    }

    #[test]
    fn integer_coercion_and_bounds() {
        let spec = FieldSpec::new(
            "size",
            "Size",
            FieldKind::Integer {
                min: Some(0),
                max: Some(1000),
            },
        );
        assert_eq!(spec.coerce(" 500 ").unwrap(), FieldValue::Integer(500));
        assert_eq!(spec.coerce("five hundred"), Err(FieldError::NotANumber));
        assert!(matches!(
            spec.coerce("-1"),
            Err(FieldError::OutOfRange { .. })
        ));
        assert!(matches!(
            spec.coerce("1001"),
            Err(FieldError::OutOfRange { .. })
        ));
    }

    #[test]
    fn decimal_coercion_respects_minimum() {
        let spec = FieldSpec::new(
            "budget",
            "Budget",
            FieldKind::Decimal {
                min: Some(Decimal::ZERO),
            },
        );
        assert_eq!(
            spec.coerce("1250.50").unwrap(),
            FieldValue::Decimal(dec!(1250.50))
        );
        assert!(matches!(
            spec.coerce("-3"),
            Err(FieldError::OutOfRange { .. })
        ));
        assert_eq!(spec.coerce("12,50"), Err(FieldError::NotANumber));
    }

    #[test]
    fn choice_requires_membership() {
        let spec = FieldSpec::new("status", "Status", FieldKind::Choice(&["draft", "active"]));
        assert_eq!(spec.coerce("active").unwrap(), FieldValue::Text("active".into()));
        assert!(matches!(spec.coerce("archived"), Err(FieldError::NotAChoice(_))));
    }

    #[test]
    fn date_parsing() {
        let spec = FieldSpec::new("launch", "Launch", FieldKind::Date);
        assert_eq!(
            spec.coerce("2026-07-01").unwrap(),
            FieldValue::Date(NaiveDate::from_ymd_opt(2026, 7, 1).unwrap())
        );
        assert_eq!(spec.coerce("07/01/2026"), Err(FieldError::InvalidDate));
        assert_eq!(spec.coerce("").unwrap(), FieldValue::Empty);
    }

    #[test]
    fn list_splits_commas_and_drops_blanks() {
        let spec = FieldSpec::new("tags", "Tags", FieldKind::List);
        assert_eq!(
            spec.coerce("beach, family ,, sun").unwrap(),
            FieldValue::List(vec!["beach".into(), "family".into(), "sun".into()])
        );
    }

    #[test]
    fn bad_json_falls_back_to_null() {
        let spec = FieldSpec::new("filters", "Filters", FieldKind::Json);
        assert_eq!(
            spec.coerce(r#"{"age": [30, 50]}"#).unwrap(),
            FieldValue::Json(json!({"age": [30, 50]}))
        );
        assert_eq!(
            spec.coerce("{not json").unwrap(),
            FieldValue::Json(serde_json::Value::Null)
        );
    }

    #[test]
    fn email_pattern() {
        let spec = FieldSpec::new("contact", "Contact", FieldKind::Email);
        assert!(spec.coerce("host@wayfare.example").is_ok());
        assert_eq!(spec.coerce("host@"), Err(FieldError::InvalidEmail));
    }

    #[test]
    fn validate_reports_every_failing_field() {
        let schema = StepSchema::new(vec![
            FieldSpec::text("name", "Name").required(),
            FieldSpec::new("size", "Size", FieldKind::Integer { min: None, max: None }),
            FieldSpec::new("tags", "Tags", FieldKind::List),
        ]);

        let errors = schema.validate(&raw(&[("size", "abc")])).unwrap_err();
        assert_eq!(errors.get("name"), Some(&FieldError::Required));
        assert_eq!(errors.get("size"), Some(&FieldError::NotANumber));
        assert!(!errors.contains_key("tags"));

        let values = schema
            .validate(&raw(&[("name", "Summer"), ("size", "3"), ("tags", "a,b")]))
            .unwrap();
        assert_eq!(values.text("name").as_deref(), Some("Summer"));
        assert_eq!(values.integer("size"), Some(3));
        assert_eq!(values.list("tags"), vec!["a", "b"]);
    }

    #[test]
    fn default_raw_uses_field_defaults() {
        let schema = StepSchema::new(vec![
            FieldSpec::text("name", "Name"),
            FieldSpec::new("status", "Status", FieldKind::Choice(&["draft"])).with_default("draft"),
        ]);
        let raw = schema.default_raw();
        assert_eq!(raw["name"], "");
        assert_eq!(raw["status"], "draft");
    }
}
