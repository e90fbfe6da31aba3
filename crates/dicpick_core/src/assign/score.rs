//! Running score per participant, used to break diversity ties toward the
//! participant who has earned the least so far.

use super::snapshot::CandidateProfile;
use crate::model::participant::ParticipantId;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ScoreTracker {
    scores: HashMap<ParticipantId, i64>,
}

impl ScoreTracker {
    /// Starts every participant at `initial_score + sum(assigned task scores)`.
    pub fn initialize<'a>(participants: impl IntoIterator<Item = &'a CandidateProfile>) -> Self {
        Self {
            scores: participants
                .into_iter()
                .map(|profile| (profile.id, profile.assigned_score))
                .collect(),
        }
    }

    /// Unknown participants score 0.
    pub fn score_of(&self, participant_id: ParticipantId) -> i64 {
        self.scores.get(&participant_id).copied().unwrap_or(0)
    }

    /// All candidates sharing the minimal score, in input order.
    pub fn lowest_among(&self, candidates: &[ParticipantId]) -> Vec<ParticipantId> {
        let Some(min) = candidates.iter().map(|id| self.score_of(*id)).min() else {
            return Vec::new();
        };
        candidates
            .iter()
            .copied()
            .filter(|id| self.score_of(*id) == min)
            .collect()
    }

    pub fn credit(&mut self, participant_id: ParticipantId, amount: i64) {
        *self.scores.entry(participant_id).or_insert(0) += amount;
    }
}
