//! Participant record.
//!
//! # Invariants
//! - `do_not_assign_with` never contains the participant itself.
//! - The conflict list is stored as entered; readers treat it as symmetric.

use super::date_range::DateRange;
use super::event::{EventId, TagId};
use super::{validate_name, ModelValidationError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type ParticipantId = Uuid;

const PARTICIPANT_NAME_MAX_CHARS: usize = 60;

/// Someone who can be assigned tasks during an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub event_id: EventId,
    pub name: String,
    /// Dates on which this participant is around and can work.
    pub date_range: DateRange,
    pub tags: BTreeSet<TagId>,
    /// Score earned through out-of-band contributions.
    pub initial_score: i64,
    pub do_not_assign_with: BTreeSet<ParticipantId>,
}

impl Participant {
    pub fn new(event_id: EventId, name: impl Into<String>, date_range: DateRange) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            name: name.into(),
            date_range,
            tags: BTreeSet::new(),
            initial_score: 0,
            do_not_assign_with: BTreeSet::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_name("participant name", &self.name, PARTICIPANT_NAME_MAX_CHARS)?;
        if self.do_not_assign_with.contains(&self.id) {
            return Err(ModelValidationError::SelfConflict);
        }
        Ok(())
    }
}
