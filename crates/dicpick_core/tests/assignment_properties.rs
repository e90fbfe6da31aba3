mod common;

use common::{range, Fixture};
use dicpick_core::repo::event_repo::{EventRepository, SqliteEventRepository};
use dicpick_core::{Participant, ParticipantId, TagId, TaskSelector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeSet, HashMap, HashSet};

const RUNS: u64 = 40;

/// Builds a random event: 2-6 tags, 3-9 participants, 1-3 task types.
fn random_fixture(rng: &mut StdRng) -> Fixture {
    let mut fixture = Fixture::new();
    let tags: Vec<TagId> = (0..rng.gen_range(2..=6))
        .map(|i| fixture.tag(&format!("tag{i}")))
        .collect();

    let mut people = Vec::new();
    for i in 0..rng.gen_range(3..=9) {
        let start = rng.gen_range(1..=10);
        let end = rng.gen_range(start..=14);
        let own_tags: Vec<TagId> = tags
            .iter()
            .copied()
            .filter(|_| rng.gen_bool(0.4))
            .collect();
        people.push(fixture.participant_with(
            &format!("p{i}"),
            range(start, end),
            &own_tags,
            rng.gen_range(0..5),
        ));
    }
    for who in &people {
        let others: Vec<ParticipantId> = people
            .iter()
            .copied()
            .filter(|other| other != who && rng.gen_bool(0.15))
            .collect();
        fixture.conflict(*who, &others);
    }

    for i in 0..rng.gen_range(1..=3) {
        let start = rng.gen_range(1..=10);
        let end = rng.gen_range(start..=14);
        let required: Vec<TagId> = tags
            .iter()
            .copied()
            .filter(|_| rng.gen_bool(0.2))
            .collect();
        fixture.task_type(
            &format!("type{i}"),
            range(start, end),
            rng.gen_range(1..=3),
            rng.gen_range(1..=4),
            &required,
        );
    }
    fixture
}

fn participants_by_id(fixture: &Fixture) -> HashMap<ParticipantId, Participant> {
    SqliteEventRepository::try_new(&fixture.conn)
        .unwrap()
        .list_participants(fixture.event.id)
        .unwrap()
        .into_iter()
        .map(|participant| (participant.id, participant))
        .collect()
}

fn conflicts(people: &HashMap<ParticipantId, Participant>, a: ParticipantId, b: ParticipantId) -> bool {
    people[&a].do_not_assign_with.contains(&b) || people[&b].do_not_assign_with.contains(&a)
}

#[test]
fn random_runs_respect_capacity_and_eligibility() {
    for seed in 0..RUNS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut fixture = random_fixture(&mut rng);
        let report = fixture.run(&TaskSelector::all(), seed);
        let people = participants_by_id(&fixture);

        let mut dates_taken: HashSet<(ParticipantId, chrono::NaiveDate)> = HashSet::new();
        for task in fixture.all_tasks() {
            assert!(
                task.assignees.len() as u32 <= task.num_people,
                "seed {seed}: task {} overfilled",
                task.id
            );
            let full = task.assignees.len() as u32 == task.num_people;
            assert_eq!(
                !full,
                report.unassignable.contains(&task.id),
                "seed {seed}: unassignable set disagrees with task {}",
                task.id
            );

            for assignment in &task.assignees {
                let who = &people[&assignment.participant_id];
                assert!(
                    dates_taken.insert((who.id, task.date)),
                    "seed {seed}: {} double-booked on {}",
                    who.name,
                    task.date
                );
                assert!(who.date_range.contains(task.date), "seed {seed}: out of range");
                assert!(
                    task.tags.is_empty() || !task.tags.is_disjoint(&who.tags),
                    "seed {seed}: no matching tag"
                );
                assert!(!task.do_not_assign_to.contains(&who.id));
                for other in &task.assignees {
                    if other.participant_id != who.id {
                        assert!(
                            !conflicts(&people, who.id, other.participant_id),
                            "seed {seed}: conflicting pair on task {}",
                            task.id
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn second_run_finds_nothing_left_to_do() {
    for seed in 0..RUNS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut fixture = random_fixture(&mut rng);
        let first = fixture.run(&TaskSelector::all(), seed);
        let rows = fixture.assignment_count();
        assert_eq!(rows as usize, first.assignments.len());

        let second = fixture.run(&TaskSelector::all(), seed + 1000);
        assert!(second.assignments.is_empty(), "seed {seed}: rerun assigned more");
        assert_eq!(second.unassignable, first.unassignable);
        assert_eq!(fixture.assignment_count(), rows);
    }
}

#[test]
fn type_counts_stay_balanced_without_constraints() {
    for seed in 0..RUNS {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut fixture = Fixture::new();
        let people: Vec<ParticipantId> = (0..rng.gen_range(2..=5))
            .map(|i| fixture.participant(&format!("p{i}")))
            .collect();
        let days = rng.gen_range(people.len() as u32..=14);
        let task_type = fixture.task_type("Dishes", range(1, days), 1, 1, &[]);
        fixture.run(&TaskSelector::by_task_type(task_type.id), seed);

        let mut counts: HashMap<ParticipantId, usize> =
            people.iter().map(|id| (*id, 0)).collect();
        for task in fixture.all_tasks() {
            for assignment in task.assignees {
                *counts.get_mut(&assignment.participant_id).unwrap() += 1;
            }
        }
        let spread: BTreeSet<usize> = counts.values().copied().collect();
        let min = *spread.iter().next().unwrap();
        let max = *spread.iter().next_back().unwrap();
        assert!(max - min <= 1, "seed {seed}: counts {counts:?}");
    }
}
