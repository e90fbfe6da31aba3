//! Per-task-type buckets of participants keyed by how many tasks of that
//! type they already hold.
//!
//! The engine always drains lower buckets first, which spreads each task
//! type across as many different participants as eligibility allows.

use super::snapshot::TaskTypeCount;
use super::EngineError;
use crate::model::participant::ParticipantId;
use crate::model::task_type::TaskTypeId;
use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};

type Buckets = BTreeMap<u32, HashSet<ParticipantId>>;

#[derive(Debug, Clone, Default)]
pub struct FairnessIndex {
    buckets: HashMap<TaskTypeId, Buckets>,
    counts: HashMap<(TaskTypeId, ParticipantId), u32>,
}

impl FairnessIndex {
    /// Seeds bucket 0 of every task type with every participant, then moves
    /// participants up according to `existing` counts.
    ///
    /// Counts for task types or participants outside this run are ignored.
    pub fn initialize(
        task_types: impl IntoIterator<Item = TaskTypeId>,
        participants: &[ParticipantId],
        existing: &[TaskTypeCount],
    ) -> Self {
        let mut index = Self::default();
        for task_type_id in task_types {
            let mut bucket_zero = HashSet::with_capacity(participants.len());
            for &participant_id in participants {
                bucket_zero.insert(participant_id);
                index.counts.insert((task_type_id, participant_id), 0);
            }
            index
                .buckets
                .insert(task_type_id, BTreeMap::from([(0, bucket_zero)]));
        }

        for entry in existing {
            if entry.count == 0 {
                continue;
            }
            let key = (entry.task_type_id, entry.participant_id);
            let Some(current) = index.counts.get_mut(&key) else {
                debug!(
                    "event=fairness_seed module=assign status=skipped task_type_id={} participant_id={}",
                    entry.task_type_id, entry.participant_id
                );
                continue;
            };
            let previous = *current;
            *current = entry.count;
            if let Some(buckets) = index.buckets.get_mut(&entry.task_type_id) {
                move_between(buckets, entry.participant_id, previous, entry.count);
            }
        }

        index
    }

    /// Non-empty `(count, pool)` pairs for one task type, ascending by count.
    ///
    /// Unknown task types yield nothing. Order inside a pool is unspecified.
    pub fn candidates_by_count(
        &self,
        task_type_id: TaskTypeId,
    ) -> impl Iterator<Item = (u32, &HashSet<ParticipantId>)> + '_ {
        self.buckets
            .get(&task_type_id)
            .into_iter()
            .flat_map(|buckets| buckets.iter())
            .filter(|(_, pool)| !pool.is_empty())
            .map(|(count, pool)| (*count, pool))
    }

    #[cfg(test)]
    pub fn count_of(&self, task_type_id: TaskTypeId, participant_id: ParticipantId) -> Option<u32> {
        self.counts.get(&(task_type_id, participant_id)).copied()
    }

    /// Moves `participant_id` from bucket `n` to `n + 1` and returns `n + 1`.
    pub fn promote(
        &mut self,
        task_type_id: TaskTypeId,
        participant_id: ParticipantId,
    ) -> Result<u32, EngineError> {
        let untracked = || EngineError::UntrackedParticipant {
            task_type_id,
            participant_id,
        };
        let count = self
            .counts
            .get_mut(&(task_type_id, participant_id))
            .ok_or_else(untracked)?;
        let buckets = self.buckets.get_mut(&task_type_id).ok_or_else(untracked)?;

        let previous = *count;
        *count = previous + 1;
        move_between(buckets, participant_id, previous, previous + 1);
        Ok(previous + 1)
    }
}

fn move_between(buckets: &mut Buckets, participant_id: ParticipantId, from: u32, to: u32) {
    if let Some(pool) = buckets.get_mut(&from) {
        pool.remove(&participant_id);
    }
    buckets.entry(to).or_default().insert(participant_id);
}
