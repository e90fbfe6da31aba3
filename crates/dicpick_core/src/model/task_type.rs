//! Task type record: a recurring category of work across a date range.

use super::date_range::DateRange;
use super::event::{EventId, TagId};
use super::{validate_name, ModelValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type TaskTypeId = Uuid;

const TASK_TYPE_NAME_MAX_CHARS: usize = 40;

/// Defaults in `num_people`, `score` and `tags` seed every task of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskType {
    pub id: TaskTypeId,
    pub event_id: EventId,
    pub name: String,
    pub date_range: DateRange,
    pub num_people: u32,
    pub score: i64,
    pub tags: BTreeSet<TagId>,
}

impl TaskType {
    pub fn new(
        event_id: EventId,
        name: impl Into<String>,
        date_range: DateRange,
        num_people: u32,
        score: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            name: name.into(),
            date_range,
            num_people,
            score,
            tags: BTreeSet::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_name("task type name", &self.name, TASK_TYPE_NAME_MAX_CHARS)
    }
}
