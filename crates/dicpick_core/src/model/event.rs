//! Event and tag records.
//!
//! # Invariants
//! - `slug` is URL-safe: 1 to 10 chars of `[A-Za-z0-9_-]`.
//! - Tag names are unique within one event (enforced by storage).

use super::date_range::DateRange;
use super::{validate_name, ModelValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EventId = Uuid;
pub type TagId = Uuid;

const EVENT_NAME_MAX_CHARS: usize = 40;
const TAG_NAME_MAX_CHARS: usize = 20;

static SLUG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,10}$").expect("valid slug regex"));

/// One scheduling universe, e.g. a camp's presence at one festival.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub slug: String,
    pub date_range: DateRange,
}

impl Event {
    pub fn new(name: impl Into<String>, slug: impl Into<String>, date_range: DateRange) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slug.into(),
            date_range,
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_name("event name", &self.name, EVENT_NAME_MAX_CHARS)?;
        if !SLUG_RE.is_match(&self.slug) {
            return Err(ModelValidationError::InvalidSlug(self.slug.clone()));
        }
        Ok(())
    }
}

/// Eligibility token scoped to one event, e.g. `chef` or `early-arriver`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub event_id: EventId,
    pub name: String,
}

impl Tag {
    pub fn new(event_id: EventId, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_id,
            name: name.into().trim().to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        validate_name("tag name", &self.name, TAG_NAME_MAX_CHARS)
    }
}
