//! Domain model for events, participants, task types and tasks.
//!
//! # Responsibility
//! - Define the records the scheduling store persists and the engine reads.
//! - Validate field-level invariants before anything reaches storage.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Date ranges are inclusive and never inverted.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod date_range;
pub mod event;
pub mod participant;
pub mod task;
pub mod task_type;

/// Field-level validation failure raised before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    /// `start` is after `end`.
    InvertedDateRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
    /// A required name is blank after trim.
    BlankName(&'static str),
    /// Name exceeds the per-entity length limit.
    NameTooLong { field: &'static str, max_chars: usize },
    /// Event slug is empty, too long or contains non-URL-safe characters.
    InvalidSlug(String),
    /// A participant lists itself in its own conflict list.
    SelfConflict,
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvertedDateRange { start, end } => {
                write!(f, "date range start {start} is after end {end}")
            }
            Self::BlankName(field) => write!(f, "{field} must not be blank"),
            Self::NameTooLong { field, max_chars } => {
                write!(f, "{field} must be at most {max_chars} characters")
            }
            Self::InvalidSlug(slug) => write!(f, "invalid event slug `{slug}`"),
            Self::SelfConflict => write!(f, "participant cannot conflict with itself"),
        }
    }
}

impl Error for ModelValidationError {}

pub(crate) fn validate_name(
    field: &'static str,
    value: &str,
    max_chars: usize,
) -> Result<(), ModelValidationError> {
    if value.trim().is_empty() {
        return Err(ModelValidationError::BlankName(field));
    }
    if value.chars().count() > max_chars {
        return Err(ModelValidationError::NameTooLong { field, max_chars });
    }
    Ok(())
}
