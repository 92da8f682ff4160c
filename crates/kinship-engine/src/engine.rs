//! Facade over the traversal and merge operations
//!
//! [`KinshipEngine`] owns one store handle and a validated configuration. Concurrent
//! callers each hold their own engine over their own store handle.

use crate::traversal::store_error;
use crate::{
    CircleQuery, CircleResult, CircleSearch, Connection, ConnectionFinder, EngineConfig,
    FamilyTree, KinshipError, MergeDetector, MergeOutcome, Result, TreeBuilder,
};
use kinship_domain::traits::RelationshipStore;
use kinship_domain::{
    is_valid_phone, normalize_phone, Edge, MergeRequest, MergeRequestId, Person, PersonId,
    PersonUpdate, UserId,
};
use std::collections::HashMap;
use std::fmt::Display;
use tracing::debug;

/// Name reported for path members with no person record
pub const UNKNOWN_NAME: &str = "Unknown";

/// Kinship graph operations over a relationship store
pub struct KinshipEngine<S> {
    store: S,
    config: EngineConfig,
    merges: MergeDetector,
}

impl<S> KinshipEngine<S>
where
    S: RelationshipStore,
    S::Error: Display,
{
    /// Create an engine, rejecting an inconsistent configuration
    pub fn new(store: S, config: EngineConfig) -> Result<Self> {
        config.validate().map_err(KinshipError::Config)?;
        Ok(Self {
            store,
            config,
            merges: MergeDetector::new(),
        })
    }

    /// Create an engine with the default configuration
    pub fn with_defaults(store: S) -> Self {
        Self {
            store,
            config: EngineConfig::default(),
            merges: MergeDetector::new(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Underlying store, mutably
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Consume the engine and return its store
    pub fn into_store(self) -> S {
        self.store
    }

    /// Connected component of `root`
    pub fn tree(&self, root: PersonId) -> Result<FamilyTree> {
        TreeBuilder::new(&self.config).build(&self.store, root)
    }

    /// Persons within a hop radius of `root` that pass the query's filters
    pub fn search(&self, root: PersonId, query: &CircleQuery) -> Result<CircleResult> {
        CircleSearch::new(&self.config).search(&self.store, root, query)
    }

    /// Shortest relationship paths between two persons using the configured limits
    pub fn connect(&self, a: PersonId, b: PersonId) -> Result<Option<Connection>> {
        ConnectionFinder::new(&self.config).find(&self.store, a, b)
    }

    /// Shortest relationship paths with explicit depth and path limits
    pub fn connect_with(
        &self,
        a: PersonId,
        b: PersonId,
        max_depth: usize,
        max_paths: usize,
    ) -> Result<Option<Connection>> {
        ConnectionFinder::new(&self.config)
            .with_limits(max_depth, max_paths)
            .find(&self.store, a, b)
    }

    /// Tree of the person linked to an account, `None` when the account has no profile
    pub fn tree_for_user(&self, user: &UserId) -> Result<Option<FamilyTree>> {
        match self.profile(user)? {
            Some(person) => self.tree(person.id).map(Some),
            None => Ok(None),
        }
    }

    /// Circle search around the person linked to an account
    pub fn search_for_user(
        &self,
        user: &UserId,
        query: &CircleQuery,
    ) -> Result<Option<CircleResult>> {
        match self.profile(user)? {
            Some(person) => self.search(person.id, query).map(Some),
            None => Ok(None),
        }
    }

    fn profile(&self, user: &UserId) -> Result<Option<Person>> {
        let person = self
            .store
            .get_person_by_auth_user(user)
            .map_err(store_error)?;
        if person.is_none() {
            debug!("No profile linked to user {}", user);
        }
        Ok(person)
    }

    /// Names of the persons on a path, in path order
    pub fn path_names(&self, path: &[PersonId]) -> Result<Vec<String>> {
        if path.is_empty() {
            return Ok(Vec::new());
        }

        let names: HashMap<PersonId, String> = self
            .store
            .get_persons_by_ids(path)
            .map_err(store_error)?
            .into_iter()
            .map(|p| (p.id, p.name))
            .collect();

        Ok(path
            .iter()
            .map(|id| {
                names
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_NAME.to_string())
            })
            .collect())
    }

    /// Store a new person and raise a merge request if they duplicate another
    ///
    /// The phone number is stored in canonical form so later lookups match it
    /// however either side wrote it.
    pub fn add_person(
        &mut self,
        person: &Person,
        requester: &UserId,
    ) -> Result<Option<MergeRequest>> {
        let mut person = person.clone();
        person.phone = match person.phone.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let phone = normalize_phone(raw);
                if !is_valid_phone(&phone) {
                    return Err(KinshipError::InvalidArgument(format!(
                        "invalid phone number {:?}",
                        raw
                    )));
                }
                Some(phone)
            }
        };

        self.store.insert_person(&person).map_err(store_error)?;
        self.merges
            .on_person_created(&mut self.store, &person, requester)
    }

    /// Store a relationship
    pub fn add_relationship(&mut self, edge: &Edge) -> Result<()> {
        self.store.add_relationship(edge).map_err(store_error)
    }

    /// Remove every relationship between two persons, in both directions
    pub fn remove_relationship(&mut self, a: PersonId, b: PersonId) -> Result<usize> {
        self.store.remove_relationship(a, b).map_err(store_error)
    }

    /// Approve a pending merge request
    pub fn approve_merge(
        &mut self,
        id: MergeRequestId,
        resolved_by: &UserId,
        resolved_fields: Option<&PersonUpdate>,
    ) -> Result<MergeOutcome> {
        self.merges
            .approve(&mut self.store, id, resolved_by, resolved_fields)
    }

    /// Reject a pending merge request
    pub fn reject_merge(&mut self, id: MergeRequestId, resolved_by: &UserId) -> Result<()> {
        self.merges.reject(&mut self.store, id, resolved_by)
    }

    /// Pending merge requests visible to a user
    pub fn pending_merges(&self, user: &UserId) -> Result<Vec<MergeRequest>> {
        self.merges.pending_for_user(&self.store, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockStore;
    use kinship_domain::{Gender, RelationshipKind};

    #[test]
    fn test_invalid_config_rejected() {
        let config = EngineConfig {
            max_paths: 0,
            ..Default::default()
        };
        let result = KinshipEngine::new(MockStore::new(), config);
        assert!(matches!(result, Err(KinshipError::Config(_))));
    }

    #[test]
    fn test_path_names_marks_missing() {
        let mut store = MockStore::new();
        let a = store.add("Asha", Gender::Female);
        let b = store.add("Bala", Gender::Male);
        let engine = KinshipEngine::with_defaults(store);

        let names = engine.path_names(&[b, PersonId::new(), a]).unwrap();
        assert_eq!(names, vec!["Bala", "Unknown", "Asha"]);
        assert_eq!(engine.store().calls(), 1);
    }

    #[test]
    fn test_tree_for_user() {
        let mut store = MockStore::new();
        let me = store.add("Me", Gender::Other);
        let sister = store.add("Sister", Gender::Female);
        store.link(sister, me, RelationshipKind::SiblingOf);
        store.person_mut(me).auth_user = Some(UserId::from("auth-me"));
        let engine = KinshipEngine::with_defaults(store);

        let tree = engine
            .tree_for_user(&UserId::from("auth-me"))
            .unwrap()
            .unwrap();
        assert_eq!(tree.root, me);
        assert_eq!(tree.persons.len(), 2);

        assert!(engine
            .tree_for_user(&UserId::from("nobody"))
            .unwrap()
            .is_none());
        assert!(engine
            .search_for_user(&UserId::from("nobody"), &CircleQuery::within(2))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_add_person_detects_duplicate() {
        let mut store = MockStore::new();
        let existing = store.add("Ravi", Gender::Male);
        store.person_mut(existing).phone = Some("+919876543210".to_string());
        store.person_mut(existing).created_by = Some(UserId::from("user-1"));
        let mut engine = KinshipEngine::with_defaults(store);

        let mut newcomer = Person::new(PersonId::new(), "Ravi", Gender::Male);
        newcomer.phone = Some("+919876543210".to_string());
        newcomer.created_by = Some(UserId::from("user-2"));

        let request = engine
            .add_person(&newcomer, &UserId::from("user-2"))
            .unwrap()
            .unwrap();
        assert_eq!(request.target_person, existing);
        assert_eq!(request.matched_person, newcomer.id);
        assert!(request.field_conflicts.is_empty());

        let outcome = engine
            .approve_merge(request.id, &UserId::from("user-1"), None)
            .unwrap();
        assert_eq!(outcome.absorbed, newcomer.id);
        assert!(!engine.store().has_person(newcomer.id));
    }

    #[test]
    fn test_remove_relationship_both_directions() {
        let mut store = MockStore::new();
        let a = store.add("A", Gender::Male);
        let b = store.add("B", Gender::Female);
        store.link(a, b, RelationshipKind::SpouseOf);
        store.link(b, a, RelationshipKind::SpouseOf);
        let mut engine = KinshipEngine::with_defaults(store);

        assert_eq!(engine.remove_relationship(b, a).unwrap(), 2);
        let connection = engine.connect(a, b).unwrap().unwrap();
        assert!(!connection.connected);
    }

    #[test]
    fn test_add_person_stores_canonical_phone() {
        let mut engine = KinshipEngine::with_defaults(MockStore::new());
        let mut person = Person::new(PersonId::new(), "Ravi", Gender::Male);
        person.phone = Some("098765 43210".to_string());

        assert!(engine
            .add_person(&person, &UserId::from("user-1"))
            .unwrap()
            .is_none());
        let stored = engine.store().get_persons_by_ids(&[person.id]).unwrap();
        assert_eq!(stored[0].phone.as_deref(), Some("+919876543210"));
    }

    #[test]
    fn test_add_person_rejects_invalid_phone() {
        let mut engine = KinshipEngine::with_defaults(MockStore::new());
        let mut person = Person::new(PersonId::new(), "Ravi", Gender::Male);
        person.phone = Some("12".to_string());

        let result = engine.add_person(&person, &UserId::from("user-1"));
        assert!(matches!(result, Err(KinshipError::InvalidArgument(_))));
        assert!(!engine.store().has_person(person.id));
    }

    #[test]
    fn test_add_person_blank_phone_cleared() {
        let mut engine = KinshipEngine::with_defaults(MockStore::new());
        let mut person = Person::new(PersonId::new(), "Ravi", Gender::Male);
        person.phone = Some("  ".to_string());

        engine.add_person(&person, &UserId::from("user-1")).unwrap();
        let stored = engine.store().get_persons_by_ids(&[person.id]).unwrap();
        assert_eq!(stored[0].phone, None);
    }
}
