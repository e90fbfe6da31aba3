//! Run options for the assignment engine.

use serde::{Deserialize, Serialize};

/// How the engine reacts to a slot nobody can fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignMode {
    /// Record the task as unassignable and keep going.
    #[default]
    Lenient,
    /// Abort the whole run; nothing is written.
    Strict,
}

/// Caller-facing knobs for one assignment run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignOptions {
    /// Seed for the score tie-break. `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub mode: AssignMode,
}

impl AssignOptions {
    pub fn seeded(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    pub fn strict(mut self) -> Self {
        self.mode = AssignMode::Strict;
        self
    }
}
