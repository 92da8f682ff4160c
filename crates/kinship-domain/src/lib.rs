//! Kinship Domain Layer
//!
//! This crate contains the domain model of the kinship graph and the pure relationship
//! calculator. It performs no I/O: persistence is reached through the traits in
//! [`traits`], implemented by other crates.
//!
//! ## Key Concepts
//!
//! - **Person**: a vertex of the graph, identified by a UUIDv7 [`PersonId`]
//! - **Edge**: a directed, typed relationship (`from` is the `kind` of `to`)
//! - **Path step**: a relationship kind read in the direction of travel
//! - **Relationship result**: natural-language label, category and similarity for a path
//! - **Merge request**: a proposal to absorb a duplicate person into another
//!
//! ## Architecture
//!
//! - Only `uuid` and `serde` as dependencies
//! - Pure business logic only
//! - Trait definitions for the relationship store

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod calculator;
pub mod merge;
pub mod person;
pub mod phone;
pub mod relationship;
pub mod traits;

// Re-exports for convenience
pub use calculator::{
    calculate_relationship, match_cousin, CousinDegree, RelationshipCategory, RelationshipResult,
};
pub use merge::{FieldConflict, MergeRequest, MergeRequestId, MergeStatus};
pub use person::{Gender, MaritalStatus, Person, PersonId, PersonUpdate, UserId};
pub use phone::{is_valid_phone, normalize_phone};
pub use relationship::{Edge, Lineage, RelationshipKind};
pub use traits::{MergeWriter, RelationshipStore};
