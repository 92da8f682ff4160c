//! Kinship Engine
//!
//! Graph traversal and record merging over a family relationship store.
//!
//! # Overview
//!
//! The engine answers four kinds of question about a kinship graph:
//! - **Family tree**: every person connected to a root, by batched breadth-first search
//! - **Circle search**: persons within a hop radius of a root, filtered by attributes
//! - **Connection**: the shortest relationship paths between two persons, found by
//!   bidirectional search and described in plain words ("paternal grandfather")
//! - **Duplicates**: persons sharing a phone number, resolved through merge requests
//!   that are approved atomically
//!
//! # Architecture
//!
//! Persistence is reached only through [`kinship_domain::traits::RelationshipStore`].
//! Every traversal fetches a whole frontier per store call, so round-trips grow with
//! the number of hops rather than the number of persons. All traversal state is local
//! to one call; operations are synchronous and block only on the store.
//!
//! | Limit | Default | Setting |
//! |-------|---------|---------|
//! | Connection depth | 20 hops | `max_connection_depth` |
//! | Paths returned | 3 | `max_paths` |
//! | Common ancestors | 5 | `max_common_ancestors` |
//! | Circle radius | 3 hops (cap 10) | `default_circle_depth`, `max_circle_depth` |
//! | Traversal deadline | none | `traversal_timeout_ms` |
//!
//! # Usage
//!
//! ```no_run
//! use kinship_engine::{CircleQuery, EngineConfig, KinshipEngine, PersonFilter};
//! use kinship_domain::PersonId;
//! use kinship_store::SqliteStore;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteStore::new("kinship.db")?;
//! let engine = KinshipEngine::new(store, EngineConfig::default())?;
//!
//! let me = PersonId::from_string("0192f1c4-7b3a-7cde-8f00-000000000001")?;
//! let cousin = PersonId::from_string("0192f1c4-7b3a-7cde-8f00-000000000002")?;
//!
//! if let Some(connection) = engine.connect(me, cousin)? {
//!     for path in &connection.paths {
//!         println!("{}: {:?}", path.relationship.description, engine.path_names(&path.path)?);
//!     }
//! }
//!
//! let query = CircleQuery::within(2).with(PersonFilter::Occupation("doctor".into()));
//! let doctors = engine.search(me, &query)?;
//! println!("{} doctors within two hops", doctors.matches.len());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod circle;
pub mod config;
pub mod connection;
pub mod engine;
pub mod error;
pub mod merge;
pub mod tree;

mod traversal;

#[cfg(test)]
mod mock;

pub use circle::{CircleMatch, CircleQuery, CircleResult, CircleSearch, PersonFilter};
pub use config::EngineConfig;
pub use connection::{
    CommonAncestor, Connection, ConnectionFinder, ConnectionPath, SearchStatistics,
};
pub use engine::{KinshipEngine, UNKNOWN_NAME};
pub use error::{KinshipError, Result};
pub use merge::{MergeDetector, MergeOutcome};
pub use tree::{FamilyTree, TreeBuilder};
