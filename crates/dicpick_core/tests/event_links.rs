mod common;

use common::{day, range, Fixture};
use dicpick_core::repo::event_repo::EventRepository;
use dicpick_core::repo::task_repo::{SqliteTaskRepository, TaskRepository};
use dicpick_core::{Participant, RepoError, Tag, TaskSelector};
use std::collections::BTreeSet;
use uuid::Uuid;

fn is_conflict<T: std::fmt::Debug>(result: Result<T, RepoError>) -> bool {
    matches!(result, Err(RepoError::Conflict(_)))
}

#[test]
fn task_tags_must_come_from_the_task_event() {
    let mut fixture = Fixture::new();
    let chef = fixture.tag("chef");
    fixture.task_type("Cook", range(1, 1), 1, 1, &[chef]);
    let away = fixture.other_event("other16");
    let foreign = Tag::new(away.id, "chef");
    fixture.events().create_tag(&foreign).unwrap();

    let task = fixture.all_tasks().remove(0);
    let tasks = SqliteTaskRepository::try_new(&fixture.conn).unwrap();
    assert!(is_conflict(
        tasks.set_task_tags(task.id, &BTreeSet::from([chef, foreign.id]))
    ));
    assert!(matches!(
        tasks.set_task_tags(task.id, &BTreeSet::from([Uuid::new_v4()])),
        Err(RepoError::NotFound { entity: "tag", .. })
    ));
    assert_eq!(fixture.all_tasks()[0].tags, BTreeSet::from([chef]));
}

#[test]
fn task_exclusions_must_come_from_the_task_event() {
    let mut fixture = Fixture::new();
    let local = fixture.participant("Local");
    fixture.task_type("Bar", range(2, 2), 1, 1, &[]);
    let away = fixture.other_event("other16");
    let stranger = Participant::new(away.id, "Stranger", range(1, 31));
    fixture.events().create_participant(&stranger).unwrap();

    let task = fixture.all_tasks().remove(0);
    let tasks = SqliteTaskRepository::try_new(&fixture.conn).unwrap();
    assert!(is_conflict(
        tasks.set_task_exclusions(task.id, &BTreeSet::from([local, stranger.id]))
    ));
    assert!(fixture.all_tasks()[0].do_not_assign_to.is_empty());

    tasks
        .set_task_exclusions(task.id, &BTreeSet::from([local]))
        .unwrap();
    assert_eq!(
        fixture.all_tasks()[0].do_not_assign_to,
        BTreeSet::from([local])
    );
}

#[test]
fn new_participants_only_link_to_their_own_event() {
    let fixture = Fixture::new();
    let local = fixture.participant("Local");
    let away = fixture.other_event("other16");
    let foreign_tag = Tag::new(away.id, "returner");
    let stranger = Participant::new(away.id, "Stranger", range(1, 31));
    fixture.events().create_tag(&foreign_tag).unwrap();
    fixture.events().create_participant(&stranger).unwrap();

    let mut tagged = Participant::new(fixture.event.id, "Tagged", range(1, 31));
    tagged.tags.insert(foreign_tag.id);
    assert!(is_conflict(fixture.events().create_participant(&tagged)));

    let mut wary = Participant::new(fixture.event.id, "Wary", range(1, 31));
    wary.do_not_assign_with = BTreeSet::from([local, stranger.id]);
    assert!(is_conflict(fixture.events().create_participant(&wary)));

    let names: Vec<String> = fixture
        .events()
        .list_participants(fixture.event.id)
        .unwrap()
        .into_iter()
        .map(|participant| participant.name)
        .collect();
    assert_eq!(names, vec!["Local".to_string()]);
}

#[test]
fn rejected_foreign_tag_keeps_the_task_unassignable() {
    let mut fixture = Fixture::new();
    let chef = fixture.tag("chef");
    let pat = fixture.participant("Pat");
    fixture.task_type("Dinner Chef", range(5, 5), 1, 2, &[chef]);
    let away = fixture.other_event("other16");
    let foreign = Tag::new(away.id, "chef");
    fixture.events().create_tag(&foreign).unwrap();

    assert!(is_conflict(
        fixture
            .events()
            .set_participant_tags(pat, &BTreeSet::from([foreign.id]))
    ));
    let stored = fixture.events().get_participant(pat).unwrap().unwrap();
    assert!(stored.tags.is_empty());

    let report = fixture.run(&TaskSelector::by_date(day(5)), 1);
    assert_eq!(report.unassignable.len(), 1);
    assert!(report.assignments.is_empty());
}

#[test]
fn conflicts_only_name_participants_of_the_same_event() {
    let fixture = Fixture::new();
    let first = fixture.participant("First");
    let second = fixture.participant("Second");
    let away = fixture.other_event("other16");
    let stranger = Participant::new(away.id, "Stranger", range(1, 31));
    fixture.events().create_participant(&stranger).unwrap();

    assert!(is_conflict(
        fixture
            .events()
            .set_participant_conflicts(first, &BTreeSet::from([second, stranger.id]))
    ));
    assert!(matches!(
        fixture
            .events()
            .set_participant_conflicts(Uuid::new_v4(), &BTreeSet::from([first])),
        Err(RepoError::NotFound {
            entity: "participant",
            ..
        })
    ));

    fixture.conflict(first, &[second]);
    let stored = fixture.events().get_participant(first).unwrap().unwrap();
    assert_eq!(stored.do_not_assign_with, BTreeSet::from([second]));
}

#[test]
fn scores_add_task_points_to_the_initial_score() {
    let mut fixture = Fixture::new();
    let alice = fixture.participant_with("Alice", range(1, 31), &[], 5);
    let bob = fixture.participant_with("Bob", range(1, 31), &[], 0);
    let carol = fixture.participant_with("Carol", range(20, 31), &[], 1);
    fixture.task_type("Gate", range(1, 2), 1, 3, &[]);
    let away = fixture.other_event("other16");
    fixture
        .events()
        .create_participant(&Participant::new(away.id, "Stranger", range(1, 31)))
        .unwrap();

    let day_one = fixture.tasks(&TaskSelector::by_date(day(1))).remove(0);
    fixture.assign_manually(&day_one, alice);
    fixture.run(&TaskSelector::all(), 8);

    let scores = fixture
        .events()
        .list_participant_scores(fixture.event.id)
        .unwrap();
    let rows: Vec<_> = scores
        .iter()
        .map(|score| {
            (
                score.participant_id,
                score.initial_score,
                score.task_score,
                score.total_score,
                score.num_tasks,
            )
        })
        .collect();
    assert_eq!(
        rows,
        vec![(alice, 5, 3, 8, 1), (bob, 0, 3, 3, 1), (carol, 1, 0, 1, 0)]
    );
    assert_eq!(scores[0].name, "Alice");
}
