//! Integration tests for kinship-store
//!
//! These tests exercise the SQLite store through the `RelationshipStore` trait.

use kinship_domain::traits::RelationshipStore;
use kinship_domain::{
    Edge, FieldConflict, Gender, MergeRequest, MergeStatus, Person, PersonId, PersonUpdate,
    RelationshipKind, UserId,
};
use kinship_store::{SqliteStore, StoreError};
use std::collections::BTreeMap;

fn person(store: &mut SqliteStore, name: &str, gender: Gender) -> PersonId {
    let person = Person::new(PersonId::new(), name, gender);
    store.insert_person(&person).unwrap();
    person.id
}

fn link(store: &mut SqliteStore, from: PersonId, to: PersonId, kind: RelationshipKind) {
    let edge = Edge::new(from, to, kind, Some(UserId::from("user-1")), 1000).unwrap();
    store.add_relationship(&edge).unwrap();
}

#[test]
fn test_store_initialization() {
    let store = SqliteStore::new(":memory:");
    assert!(store.is_ok(), "Store should initialize successfully");
}

#[test]
fn test_insert_and_batch_get_persons() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let mut asha = Person::new(PersonId::new(), "Asha", Gender::Female);
    asha.city = Some("Kochi".to_string());
    asha.created_by = Some(UserId::from("user-1"));
    asha.created_at = 1000;
    store.insert_person(&asha).unwrap();
    let ravi = person(&mut store, "Ravi", Gender::Male);

    let found = store
        .get_persons_by_ids(&[asha.id, ravi, PersonId::new()])
        .unwrap();
    assert_eq!(found.len(), 2, "Missing ids are silently absent");

    let stored = found.iter().find(|p| p.id == asha.id).unwrap();
    assert_eq!(stored, &asha);

    assert!(store.get_persons_by_ids(&[]).unwrap().is_empty());
}

#[test]
fn test_duplicate_person_rejected() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let asha = Person::new(PersonId::new(), "Asha", Gender::Female);
    store.insert_person(&asha).unwrap();

    let result = store.insert_person(&asha);
    assert!(matches!(result, Err(StoreError::Duplicate(_))));
}

#[test]
fn test_batch_reads_span_chunks() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let root = person(&mut store, "Root", Gender::Male);

    let mut children = Vec::new();
    for i in 0..(kinship_store::MAX_BATCH + 20) {
        let child = person(&mut store, &format!("Child {}", i), Gender::Other);
        link(&mut store, root, child, RelationshipKind::FatherOf);
        children.push(child);
    }

    assert_eq!(store.get_persons_by_ids(&children).unwrap().len(), children.len());
    assert_eq!(store.get_edges_by_target_ids(&children).unwrap().len(), children.len());
    assert_eq!(store.get_edges_by_source_ids(&[root]).unwrap().len(), children.len());
}

#[test]
fn test_edges_by_source_and_target() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let father = person(&mut store, "Father", Gender::Male);
    let son = person(&mut store, "Son", Gender::Male);
    link(&mut store, father, son, RelationshipKind::FatherOf);

    let outgoing = store.get_edges_by_source_ids(&[father]).unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].kind, RelationshipKind::FatherOf);
    assert_eq!(outgoing[0].to, son);
    assert_eq!(outgoing[0].created_by, Some(UserId::from("user-1")));

    let incoming = store.get_edges_by_target_ids(&[son]).unwrap();
    assert_eq!(incoming, outgoing);
    assert!(store.get_edges_by_source_ids(&[son]).unwrap().is_empty());
}

#[test]
fn test_self_and_duplicate_edges_rejected() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let a = person(&mut store, "A", Gender::Male);
    let b = person(&mut store, "B", Gender::Female);

    let self_edge = Edge {
        from: a,
        to: a,
        kind: RelationshipKind::SpouseOf,
        created_by: None,
        created_at: 0,
    };
    assert!(matches!(
        store.add_relationship(&self_edge),
        Err(StoreError::SelfReference(_))
    ));

    link(&mut store, a, b, RelationshipKind::SpouseOf);
    let again = Edge::new(a, b, RelationshipKind::SpouseOf, None, 0).unwrap();
    assert!(matches!(store.add_relationship(&again), Err(StoreError::Duplicate(_))));
}

#[test]
fn test_remove_relationship_deletes_inverse() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let mother = person(&mut store, "Mother", Gender::Female);
    let daughter = person(&mut store, "Daughter", Gender::Female);
    link(&mut store, mother, daughter, RelationshipKind::MotherOf);
    link(&mut store, daughter, mother, RelationshipKind::ChildOf);

    let removed = store.remove_relationship(daughter, mother).unwrap();
    assert_eq!(removed, 2);
    assert!(store.get_edges_by_source_ids(&[mother, daughter]).unwrap().is_empty());
}

#[test]
fn test_find_person_by_phone_excludes_own_records() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let mut mine = Person::new(PersonId::new(), "Mine", Gender::Male);
    mine.phone = Some("+919876543210".to_string());
    mine.created_by = Some(UserId::from("user-2"));
    mine.created_at = 5;
    store.insert_person(&mine).unwrap();

    let mut theirs = Person::new(PersonId::new(), "Theirs", Gender::Male);
    theirs.phone = Some("+919876543210".to_string());
    theirs.created_by = Some(UserId::from("user-1"));
    theirs.created_at = 10;
    store.insert_person(&theirs).unwrap();

    let found = store
        .find_person_by_phone("+919876543210", &UserId::from("user-2"))
        .unwrap()
        .unwrap();
    assert_eq!(found.id, theirs.id);

    // Earliest created match wins when several users have the number
    let found = store
        .find_person_by_phone("+919876543210", &UserId::from("user-3"))
        .unwrap()
        .unwrap();
    assert_eq!(found.id, mine.id);

    assert!(store
        .find_person_by_phone("+911111111111", &UserId::from("user-2"))
        .unwrap()
        .is_none());
}

#[test]
fn test_get_person_by_auth_user() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let mut me = Person::new(PersonId::new(), "Me", Gender::Female);
    me.auth_user = Some(UserId::from("auth-7"));
    store.insert_person(&me).unwrap();

    let found = store.get_person_by_auth_user(&UserId::from("auth-7")).unwrap();
    assert_eq!(found.map(|p| p.id), Some(me.id));
    assert!(store
        .get_person_by_auth_user(&UserId::from("nobody"))
        .unwrap()
        .is_none());
}

fn merge_request(target: PersonId, matched: PersonId) -> MergeRequest {
    let mut conflicts = BTreeMap::new();
    conflicts.insert(
        "name".to_string(),
        FieldConflict {
            target: "Ravi".to_string(),
            matched: "Ravi K".to_string(),
        },
    );
    MergeRequest::new(UserId::from("user-2"), target, matched, conflicts, 100)
}

#[test]
fn test_merge_request_round_trip() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let target = person(&mut store, "Ravi", Gender::Male);
    let matched = person(&mut store, "Ravi K", Gender::Male);

    let request = merge_request(target, matched);
    store.create_merge_request(&request).unwrap();

    let loaded = store.get_merge_request(request.id).unwrap().unwrap();
    assert_eq!(loaded, request);
}

#[test]
fn test_pending_merge_requests_by_requester_or_owner() {
    let mut store = SqliteStore::new(":memory:").unwrap();

    let mut target = Person::new(PersonId::new(), "Ravi", Gender::Male);
    target.created_by = Some(UserId::from("user-1"));
    store.insert_person(&target).unwrap();
    let matched = person(&mut store, "Ravi K", Gender::Male);

    let request = merge_request(target.id, matched);
    store.create_merge_request(&request).unwrap();

    assert_eq!(store.pending_merge_requests(&UserId::from("user-2")).unwrap().len(), 1);
    assert_eq!(store.pending_merge_requests(&UserId::from("user-1")).unwrap().len(), 1);
    assert!(store
        .pending_merge_requests(&UserId::from("user-3"))
        .unwrap()
        .is_empty());
}

#[test]
fn test_transaction_commits_merge_steps() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let target = person(&mut store, "Ravi", Gender::Male);
    let matched = person(&mut store, "Ravi K", Gender::Male);
    let father = person(&mut store, "Father", Gender::Male);
    let sister = person(&mut store, "Sister", Gender::Female);
    link(&mut store, father, matched, RelationshipKind::FatherOf);
    link(&mut store, father, target, RelationshipKind::FatherOf);
    link(&mut store, sister, matched, RelationshipKind::SiblingOf);
    link(&mut store, matched, target, RelationshipKind::SiblingOf);

    let request = merge_request(target, matched);
    store.create_merge_request(&request).unwrap();

    let moved = store
        .transaction(|tx| -> Result<usize, StoreError> {
            let update = PersonUpdate {
                city: Some("Pune".to_string()),
                ..Default::default()
            };
            tx.update_person(target, &update)?;
            let moved = tx.reassign_edge_endpoint(matched, target)?;
            tx.delete_person(matched)?;
            tx.set_merge_status(request.id, MergeStatus::Approved, &UserId::from("user-1"), 200)?;
            Ok(moved)
        })
        .unwrap();

    // Only the sibling edge moves: the father edge duplicates and the twin edge collapses
    assert_eq!(moved, 1);

    let edges = store.get_edges_by_target_ids(&[target]).unwrap();
    assert_eq!(edges.len(), 2);
    assert!(edges.iter().any(|e| e.from == sister && e.kind == RelationshipKind::SiblingOf));
    assert!(store.get_persons_by_ids(&[matched]).unwrap().is_empty());
    assert!(store.get_edges_by_target_ids(&[matched]).unwrap().is_empty());

    let survivor = &store.get_persons_by_ids(&[target]).unwrap()[0];
    assert_eq!(survivor.city.as_deref(), Some("Pune"));

    let resolved = store.get_merge_request(request.id).unwrap().unwrap();
    assert_eq!(resolved.status, MergeStatus::Approved);
    assert_eq!(resolved.resolved_by, Some(UserId::from("user-1")));
    assert_eq!(resolved.resolved_at, Some(200));
}

#[test]
fn test_transaction_rolls_back_when_reassignment_fails() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let target = person(&mut store, "Ravi", Gender::Male);
    let matched = person(&mut store, "Ravi K", Gender::Male);
    let mother = person(&mut store, "Mother", Gender::Female);
    link(&mut store, mother, matched, RelationshipKind::MotherOf);

    let request = merge_request(target, matched);
    store.create_merge_request(&request).unwrap();

    store
        .connection()
        .execute_batch(
            "CREATE TRIGGER fail_reassign BEFORE UPDATE ON relationships
             BEGIN SELECT RAISE(ABORT, 'reassignment failed'); END;",
        )
        .unwrap();

    let result = store.transaction(|tx| -> Result<(), StoreError> {
        tx.update_person(
            target,
            &PersonUpdate {
                name: Some("Changed".to_string()),
                ..Default::default()
            },
        )?;
        tx.reassign_edge_endpoint(matched, target)?;
        tx.delete_person(matched)?;
        tx.set_merge_status(request.id, MergeStatus::Approved, &UserId::from("user-1"), 200)?;
        Ok(())
    });
    assert!(matches!(result, Err(StoreError::Database(_))));

    let persons = store.get_persons_by_ids(&[target, matched]).unwrap();
    assert_eq!(persons.len(), 2, "No person is deleted");
    assert!(persons.iter().all(|p| p.name != "Changed"), "Update rolled back");

    let edges = store.get_edges_by_target_ids(&[matched]).unwrap();
    assert_eq!(edges.len(), 1);

    let pending = store.get_merge_request(request.id).unwrap().unwrap();
    assert_eq!(pending.status, MergeStatus::Pending);
}

#[test]
fn test_update_missing_person_fails() {
    let mut store = SqliteStore::new(":memory:").unwrap();
    let result = store.transaction(|tx| -> Result<(), StoreError> {
        tx.update_person(PersonId::new(), &PersonUpdate::default())
    });
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[test]
fn test_file_backed_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kinship.db");

    let id = {
        let mut store = SqliteStore::new(&path).unwrap();
        person(&mut store, "Persisted", Gender::Other)
    };

    let store = SqliteStore::new(&path).unwrap();
    let found = store.get_persons_by_ids(&[id]).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, "Persisted");
}
