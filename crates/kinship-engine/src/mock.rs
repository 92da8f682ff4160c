//! In-memory store for unit tests

use kinship_domain::traits::{MergeWriter, RelationshipStore};
use kinship_domain::{
    Edge, Gender, MergeRequest, MergeRequestId, MergeStatus, Person, PersonId, PersonUpdate,
    RelationshipKind, UserId,
};
use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
pub(crate) struct MockError(String);

impl fmt::Display for MockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mock store: {}", self.0)
    }
}

/// Store with sequential ids, call counting and failure injection
#[derive(Default)]
pub(crate) struct MockStore {
    next_id: u128,
    persons: BTreeMap<PersonId, Person>,
    edges: Vec<Edge>,
    requests: BTreeMap<MergeRequestId, MergeRequest>,
    calls: Cell<usize>,
    fail_reads: bool,
    fail_reassign: bool,
    read_delay: Option<Duration>,
}

impl MockStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a person; ids increase with insertion order
    pub(crate) fn add(&mut self, name: &str, gender: Gender) -> PersonId {
        self.next_id += 1;
        let person = Person::new(PersonId::from_value(self.next_id), name, gender);
        let id = person.id;
        self.persons.insert(id, person);
        id
    }

    pub(crate) fn person_mut(&mut self, id: PersonId) -> &mut Person {
        self.persons.get_mut(&id).expect("person exists")
    }

    pub(crate) fn link(&mut self, from: PersonId, to: PersonId, kind: RelationshipKind) {
        let edge = Edge::new(from, to, kind, None, 0).expect("valid edge");
        self.edges.push(edge);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.get()
    }

    pub(crate) fn fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }

    pub(crate) fn fail_reassign(&mut self, fail: bool) {
        self.fail_reassign = fail;
    }

    /// Sleep for `delay` on every read
    pub(crate) fn slow_reads(&mut self, delay: Duration) {
        self.read_delay = Some(delay);
    }

    pub(crate) fn has_person(&self, id: PersonId) -> bool {
        self.persons.contains_key(&id)
    }

    pub(crate) fn edges(&self) -> &[Edge] {
        &self.edges
    }

    fn read(&self) -> Result<(), MockError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(delay) = self.read_delay {
            thread::sleep(delay);
        }
        if self.fail_reads {
            return Err(MockError("read failed".to_string()));
        }
        Ok(())
    }
}

impl RelationshipStore for MockStore {
    type Error = MockError;

    fn get_persons_by_ids(&self, ids: &[PersonId]) -> Result<Vec<Person>, Self::Error> {
        self.read()?;
        Ok(ids
            .iter()
            .filter_map(|id| self.persons.get(id).cloned())
            .collect())
    }

    fn get_edges_by_source_ids(&self, ids: &[PersonId]) -> Result<Vec<Edge>, Self::Error> {
        self.read()?;
        Ok(self
            .edges
            .iter()
            .filter(|e| ids.contains(&e.from))
            .cloned()
            .collect())
    }

    fn get_edges_by_target_ids(&self, ids: &[PersonId]) -> Result<Vec<Edge>, Self::Error> {
        self.read()?;
        Ok(self
            .edges
            .iter()
            .filter(|e| ids.contains(&e.to))
            .cloned()
            .collect())
    }

    fn get_person_by_auth_user(&self, user: &UserId) -> Result<Option<Person>, Self::Error> {
        self.read()?;
        Ok(self
            .persons
            .values()
            .find(|p| p.auth_user.as_ref() == Some(user))
            .cloned())
    }

    fn find_person_by_phone(
        &self,
        phone: &str,
        excluding: &UserId,
    ) -> Result<Option<Person>, Self::Error> {
        self.read()?;
        Ok(self
            .persons
            .values()
            .find(|p| p.phone.as_deref() == Some(phone) && p.created_by.as_ref() != Some(excluding))
            .cloned())
    }

    fn insert_person(&mut self, person: &Person) -> Result<(), Self::Error> {
        if self.persons.contains_key(&person.id) {
            return Err(MockError(format!("duplicate person {}", person.id)));
        }
        self.persons.insert(person.id, person.clone());
        Ok(())
    }

    fn add_relationship(&mut self, edge: &Edge) -> Result<(), Self::Error> {
        self.edges.push(edge.clone());
        Ok(())
    }

    fn remove_relationship(&mut self, a: PersonId, b: PersonId) -> Result<usize, Self::Error> {
        let before = self.edges.len();
        self.edges.retain(|e| !e.connects(a, b));
        Ok(before - self.edges.len())
    }

    fn create_merge_request(&mut self, request: &MergeRequest) -> Result<(), Self::Error> {
        self.requests.insert(request.id, request.clone());
        Ok(())
    }

    fn get_merge_request(&self, id: MergeRequestId) -> Result<Option<MergeRequest>, Self::Error> {
        self.read()?;
        Ok(self.requests.get(&id).cloned())
    }

    fn pending_merge_requests(&self, user: &UserId) -> Result<Vec<MergeRequest>, Self::Error> {
        self.read()?;
        Ok(self
            .requests
            .values()
            .filter(|r| r.is_pending())
            .filter(|r| {
                &r.requester == user
                    || self.persons.get(&r.target_person).is_some_and(|p| {
                        p.created_by.as_ref() == Some(user) || p.auth_user.as_ref() == Some(user)
                    })
            })
            .cloned()
            .collect())
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn MergeWriter<Error = Self::Error>) -> Result<T, E>,
        E: From<Self::Error>,
    {
        let snapshot = (
            self.persons.clone(),
            self.edges.clone(),
            self.requests.clone(),
        );

        let mut writer = MockWriter {
            persons: &mut self.persons,
            edges: &mut self.edges,
            requests: &mut self.requests,
            fail_reassign: self.fail_reassign,
        };

        let result = f(&mut writer);
        if result.is_err() {
            (self.persons, self.edges, self.requests) = snapshot;
        }
        result
    }
}

struct MockWriter<'a> {
    persons: &'a mut BTreeMap<PersonId, Person>,
    edges: &'a mut Vec<Edge>,
    requests: &'a mut BTreeMap<MergeRequestId, MergeRequest>,
    fail_reassign: bool,
}

impl MergeWriter for MockWriter<'_> {
    type Error = MockError;

    fn person(&self, id: PersonId) -> Result<Option<Person>, Self::Error> {
        Ok(self.persons.get(&id).cloned())
    }

    fn merge_request(&self, id: MergeRequestId) -> Result<Option<MergeRequest>, Self::Error> {
        Ok(self.requests.get(&id).cloned())
    }

    fn update_person(&mut self, id: PersonId, update: &PersonUpdate) -> Result<(), Self::Error> {
        let person = self
            .persons
            .get_mut(&id)
            .ok_or_else(|| MockError(format!("no person {}", id)))?;
        person.apply(update);
        Ok(())
    }

    fn reassign_edge_endpoint(
        &mut self,
        old: PersonId,
        new: PersonId,
    ) -> Result<usize, Self::Error> {
        if self.fail_reassign {
            return Err(MockError("reassign failed".to_string()));
        }

        self.edges.retain(|e| !e.connects(old, new));
        let mut moved = 0;
        let mut kept: Vec<Edge> = Vec::with_capacity(self.edges.len());
        for mut edge in self.edges.drain(..) {
            let was_moved = edge.from == old || edge.to == old;
            if edge.from == old {
                edge.from = new;
            }
            if edge.to == old {
                edge.to = new;
            }
            let duplicate = kept
                .iter()
                .any(|k| k.from == edge.from && k.to == edge.to && k.kind == edge.kind);
            if !duplicate {
                moved += usize::from(was_moved);
                kept.push(edge);
            }
        }
        *self.edges = kept;
        Ok(moved)
    }

    fn delete_person(&mut self, id: PersonId) -> Result<(), Self::Error> {
        self.persons
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| MockError(format!("no person {}", id)))
    }

    fn set_merge_status(
        &mut self,
        id: MergeRequestId,
        status: MergeStatus,
        resolved_by: &UserId,
        resolved_at: u64,
    ) -> Result<(), Self::Error> {
        let request = self
            .requests
            .get_mut(&id)
            .ok_or_else(|| MockError(format!("no merge request {}", id)))?;
        request.status = status;
        request.resolved_by = Some(resolved_by.clone());
        request.resolved_at = Some(resolved_at);
        Ok(())
    }
}
