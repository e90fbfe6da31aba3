//! Core scheduling logic for dicpick.
//! Owns the storage schema, the assignment engine and task-type propagation.

pub mod assign;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use assign::options::{AssignMode, AssignOptions};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::date_range::DateRange;
pub use model::event::{Event, EventId, Tag, TagId};
pub use model::participant::{Participant, ParticipantId};
pub use model::task::{Assignment, Task, TaskId};
pub use model::task_type::{TaskType, TaskTypeId};
pub use model::ModelValidationError;
pub use repo::event_repo::ParticipantScore;
pub use repo::schedule_repo::TaskSelector;
pub use repo::{RepoError, RepoResult};
pub use service::assignment_service::{AssignError, AssignReport, AssignmentService};
pub use service::propagation::PropagationSummary;
pub use service::task_type_service::{TaskTypeService, TaskTypeServiceError};

/// Health-check probe used by the CLI.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
