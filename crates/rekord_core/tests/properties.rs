//! Property tests over random operation sequences.

use proptest::prelude::*;
use rekord_codec::{FieldType, Value};
use rekord_core::{Database, RecordId, Revisioned, RevisionId, TableSchema};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
enum Op {
    Insert(u8),
    Remove(usize),
    Begin,
    Commit,
    Rollback,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u8..8).prop_map(Op::Insert),
        2 => any::<usize>().prop_map(Op::Remove),
        1 => Just(Op::Begin),
        1 => Just(Op::Commit),
        1 => Just(Op::Rollback),
    ]
}

fn open() -> Database {
    Database::builder()
        .table(
            TableSchema::builder("persons")
                .unique("name", FieldType::Text)
                .field("age", FieldType::Integer)
                .build()
                .unwrap(),
        )
        .open_in_memory()
        .unwrap()
}

fn row(name: u8) -> Vec<Value> {
    vec![Value::from(format!("p{name}")), Value::Integer(i64::from(name))]
}

/// Runs `ops`, ignoring operations the engine rejects, and returns every
/// id handed out.
fn run(db: &Database, ops: &[Op]) -> Vec<RecordId> {
    let persons = db.table("persons").unwrap();
    let mut ids = Vec::new();
    for op in ops {
        match op {
            Op::Insert(name) => {
                if let Ok(id) = persons.insert(row(*name)) {
                    ids.push(id);
                }
            }
            Op::Remove(pick) => {
                if !ids.is_empty() {
                    let _ = persons.remove(ids[pick % ids.len()]);
                }
            }
            Op::Begin => {
                db.begin().unwrap();
            }
            Op::Commit => {
                let _ = db.commit();
            }
            Op::Rollback => {
                let _ = db.rollback();
            }
        }
    }
    ids
}

fn live_ids(db: &Database, revision: RevisionId) -> Vec<RecordId> {
    db.table("persons")
        .unwrap()
        .items_at(revision)
        .unwrap()
        .iter()
        .map(|r| r.id())
        .collect()
}

proptest! {
    #[test]
    fn ids_strictly_increase(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let db = open();
        let ids = run(&db, &ops);
        prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn past_revisions_are_reconstructible(ops in prop::collection::vec(op_strategy(), 0..64)) {
        let db = open();
        let persons = db.table("persons").unwrap();
        let mut snapshots: BTreeMap<RevisionId, Vec<RecordId>> = BTreeMap::new();
        snapshots.insert(RevisionId::ZERO, Vec::new());

        for op in &ops {
            run(&db, std::slice::from_ref(op));
            let revision = db.current_revision_id();
            let live = live_ids(&db, revision);
            if let Some(seen) = snapshots.get(&revision) {
                // pending work never shows up in committed scans
                prop_assert_eq!(seen, &live);
            } else {
                snapshots.insert(revision, live);
            }
        }
        while db.transaction_depth() > 0 {
            db.rollback().unwrap();
        }

        for (revision, expected) in &snapshots {
            prop_assert_eq!(&live_ids(&db, *revision), expected);
        }
        let all = persons.all_items().unwrap().iter().count() as u64;
        prop_assert_eq!(all, persons.count_all_records().unwrap());
    }

    #[test]
    fn rollback_restores_committed_view(
        setup in prop::collection::vec(0u8..8, 0..8),
        ops in prop::collection::vec(op_strategy(), 0..32),
    ) {
        let db = open();
        let persons = db.table("persons").unwrap();
        for name in setup {
            let _ = persons.insert(row(name));
        }

        let revision = db.current_revision_id();
        let before = live_ids(&db, revision);
        let count = persons.count_all_records().unwrap();

        db.begin().unwrap();
        let filtered: Vec<Op> = ops
            .into_iter()
            .filter(|op| !matches!(op, Op::Begin | Op::Commit | Op::Rollback))
            .collect();
        run(&db, &filtered);
        db.rollback().unwrap();

        prop_assert_eq!(db.current_revision_id(), revision);
        prop_assert_eq!(live_ids(&db, revision), before);
        prop_assert_eq!(persons.count_all_records().unwrap(), count);

        // every unique value held by a live record is still taken, every
        // other one is free
        for name in 0u8..8 {
            let held = persons
                .find_unique("name", &Value::from(format!("p{name}")))
                .unwrap()
                .is_some();
            let result = persons.insert(row(name));
            prop_assert_eq!(result.is_err(), held);
        }
    }
}
