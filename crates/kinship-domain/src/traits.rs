//! Trait definitions for external interactions
//!
//! These traits define the boundary between the traversal engine and persistence.
//! Implementations live in other crates (`kinship-store` ships a SQLite one).

use crate::{
    Edge, MergeRequest, MergeRequestId, MergeStatus, Person, PersonId, PersonUpdate, UserId,
};

/// Trait for reading and writing the kinship graph
///
/// All graph reads are batched by id set so a traversal issues a bounded number of
/// calls per hop. Missing ids are silently absent from batch results.
///
/// Edges may be stored in one direction only. Callers that need both directions read
/// by source *and* by target and synthesize the inverse themselves.
pub trait RelationshipStore {
    /// Error type for store operations
    type Error;

    /// Get every person whose id is in `ids`
    fn get_persons_by_ids(&self, ids: &[PersonId]) -> Result<Vec<Person>, Self::Error>;

    /// Get every stored edge whose source is in `ids`
    fn get_edges_by_source_ids(&self, ids: &[PersonId]) -> Result<Vec<Edge>, Self::Error>;

    /// Get every stored edge whose target is in `ids`
    fn get_edges_by_target_ids(&self, ids: &[PersonId]) -> Result<Vec<Edge>, Self::Error>;

    /// Get the person linked to an authenticated user
    fn get_person_by_auth_user(&self, user: &UserId) -> Result<Option<Person>, Self::Error>;

    /// Find a person with the given normalized phone not created by `excluding`
    ///
    /// Returns the earliest created match only.
    fn find_person_by_phone(
        &self,
        phone: &str,
        excluding: &UserId,
    ) -> Result<Option<Person>, Self::Error>;

    /// Insert a new person record
    fn insert_person(&mut self, person: &Person) -> Result<(), Self::Error>;

    /// Store a relationship edge
    fn add_relationship(&mut self, edge: &Edge) -> Result<(), Self::Error>;

    /// Remove every edge between two persons, in both directions
    ///
    /// Returns the number of rows removed.
    fn remove_relationship(&mut self, a: PersonId, b: PersonId) -> Result<usize, Self::Error>;

    /// Persist a new merge request
    fn create_merge_request(&mut self, request: &MergeRequest) -> Result<(), Self::Error>;

    /// Get a merge request by ID
    fn get_merge_request(&self, id: MergeRequestId) -> Result<Option<MergeRequest>, Self::Error>;

    /// Pending merge requests a user may act on
    ///
    /// A user may act on requests they raised and on requests whose target person they
    /// created or are linked to.
    fn pending_merge_requests(&self, user: &UserId) -> Result<Vec<MergeRequest>, Self::Error>;

    /// Run `f` inside a transaction
    ///
    /// Everything `f` wrote is committed when it returns `Ok` and rolled back when it
    /// returns `Err`.
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn MergeWriter<Error = Self::Error>) -> Result<T, E>,
        E: From<Self::Error>;
}

/// Writes available inside a store transaction
///
/// Implemented by the infrastructure layer (kinship-store)
pub trait MergeWriter {
    /// Error type for store operations
    type Error;

    /// Read a person inside the transaction
    fn person(&self, id: PersonId) -> Result<Option<Person>, Self::Error>;

    /// Read a merge request inside the transaction
    fn merge_request(&self, id: MergeRequestId) -> Result<Option<MergeRequest>, Self::Error>;

    /// Apply a partial update to a person
    fn update_person(&mut self, id: PersonId, update: &PersonUpdate) -> Result<(), Self::Error>;

    /// Re-point every edge referencing `old` to `new`
    ///
    /// Edges between `old` and `new` are dropped, as are edges that would duplicate an
    /// existing one. Returns the number of edges re-pointed.
    fn reassign_edge_endpoint(
        &mut self,
        old: PersonId,
        new: PersonId,
    ) -> Result<usize, Self::Error>;

    /// Delete a person record
    fn delete_person(&mut self, id: PersonId) -> Result<(), Self::Error>;

    /// Move a merge request to a resolved status
    fn set_merge_status(
        &mut self,
        id: MergeRequestId,
        status: MergeStatus,
        resolved_by: &UserId,
        resolved_at: u64,
    ) -> Result<(), Self::Error>;
}
