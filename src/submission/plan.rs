//! Submission plans: the ordered backend writes a workflow derives from its
//! step aggregate.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::SubmissionError;
use crate::wizard::session::SubmissionProgress;

/// Row payload as sent to the backend.
pub type Row = Map<String, Value>;

/// How a planned entity is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Create a row; the backend returns its id.
    Insert,
    /// Patch the row already written for `target`.
    Update { target: &'static str },
}

/// A column filled from the id of another entity in the same submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignRef {
    pub column: &'static str,
    pub entity: &'static str,
    /// Required references fail the run when unresolved; optional ones are
    /// written as `null`.
    pub required: bool,
}

/// One planned write.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityWrite {
    /// Logical entity name, used in errors and progress tracking.
    pub entity: &'static str,
    pub table: &'static str,
    /// Key under which the created id is reported, e.g. `campaignId`.
    pub id_key: Option<&'static str>,
    pub op: WriteOp,
    pub row: Row,
    pub refs: Vec<ForeignRef>,
}

impl EntityWrite {
    pub fn insert(
        entity: &'static str,
        table: &'static str,
        id_key: &'static str,
        row: impl Serialize,
    ) -> Result<Self, SubmissionError> {
        Ok(Self {
            entity,
            table,
            id_key: Some(id_key),
            op: WriteOp::Insert,
            row: to_row(entity, row)?,
            refs: Vec::new(),
        })
    }

    pub fn update(
        entity: &'static str,
        table: &'static str,
        target: &'static str,
        patch: impl Serialize,
    ) -> Result<Self, SubmissionError> {
        Ok(Self {
            entity,
            table,
            id_key: None,
            op: WriteOp::Update { target },
            row: to_row(entity, patch)?,
            refs: Vec::new(),
        })
    }

    pub fn references(mut self, column: &'static str, entity: &'static str) -> Self {
        self.refs.push(ForeignRef {
            column,
            entity,
            required: true,
        });
        self
    }

    pub fn optionally_references(mut self, column: &'static str, entity: &'static str) -> Self {
        self.refs.push(ForeignRef {
            column,
            entity,
            required: false,
        });
        self
    }

    /// Entities that must exist before this write can run.
    fn requirements(&self) -> impl Iterator<Item = &'static str> + '_ {
        let target = match self.op {
            WriteOp::Update { target } => Some(target),
            WriteOp::Insert => None,
        };
        self.refs
            .iter()
            .filter(|r| r.required)
            .map(|r| r.entity)
            .chain(target)
    }

    /// Row with references resolved from `progress`.
    pub fn resolve(&self, progress: &SubmissionProgress) -> Result<Row, SubmissionError> {
        let mut row = self.row.clone();
        for r in &self.refs {
            match progress.get(r.entity) {
                Some(id) => {
                    row.insert(r.column.to_string(), Value::String(id.to_string()));
                }
                None if !r.required => {
                    row.insert(r.column.to_string(), Value::Null);
                }
                None => {
                    return Err(SubmissionError::MissingDependency {
                        entity: self.entity.to_string(),
                        depends_on: r.entity.to_string(),
                    });
                }
            }
        }
        Ok(row)
    }
}

fn to_row(entity: &str, value: impl Serialize) -> Result<Row, SubmissionError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(SubmissionError::Serialization {
            entity: entity.to_string(),
            reason: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(SubmissionError::Serialization {
            entity: entity.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Ordered writes for one submission. Order is dependency order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmissionPlan {
    writes: Vec<EntityWrite>,
}

impl SubmissionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: EntityWrite) {
        self.writes.push(write);
    }

    pub fn writes(&self) -> &[EntityWrite] {
        &self.writes
    }

    pub fn entities(&self) -> Vec<&'static str> {
        self.writes.iter().map(|w| w.entity).collect()
    }

    /// Check that every required dependency is written earlier in the plan
    /// or by a previous attempt. Runs before any write is issued.
    pub fn validate(&self, progress: &SubmissionProgress) -> Result<(), SubmissionError> {
        let mut available: HashSet<&str> = progress.iter().map(|(entity, _)| entity).collect();
        for write in &self.writes {
            for needed in write.requirements() {
                if !available.contains(needed) {
                    return Err(SubmissionError::MissingDependency {
                        entity: write.entity.to_string(),
                        depends_on: needed.to_string(),
                    });
                }
            }
            available.insert(write.entity);
        }
        Ok(())
    }
}

/// Ids created by a submission, keyed by `id_key` (e.g. `campaignId`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmissionResult {
    pub ids: IndexMap<String, String>,
}

impl SubmissionResult {
    pub fn id(&self, key: &str) -> Option<&str> {
        self.ids.get(key).map(String::as_str)
    }
}
