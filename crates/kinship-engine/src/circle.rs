//! Hop-bounded search with attribute filters
//!
//! Runs the same batched breadth-first search as the tree builder but stops after a
//! fixed number of hops. Filters are applied to each round's persons after the round
//! has been expanded, so a person that fails the filters still connects the persons
//! behind them.

use crate::traversal::{oriented, BatchLoader, Deadline};
use crate::{EngineConfig, KinshipError, Result};
use kinship_domain::traits::RelationshipStore;
use kinship_domain::{Gender, MaritalStatus, Person, PersonId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;
use std::time::Duration;
use tracing::debug;

/// One predicate over a person's attributes
///
/// Text predicates are case-insensitive substring matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum PersonFilter {
    /// Free text matching name or occupation
    Text(String),
    /// Name contains
    Name(String),
    /// Occupation contains
    Occupation(String),
    /// City, state or community contains
    Location(String),
    /// Exact marital status
    MaritalStatus(MaritalStatus),
    /// Exact gender
    Gender(Gender),
    /// Living or deceased
    Alive(bool),
}

impl PersonFilter {
    /// Whether `person` satisfies this predicate
    pub fn matches(&self, person: &Person) -> bool {
        match self {
            PersonFilter::Text(query) => {
                contains(&person.name, query)
                    || person.occupation.as_deref().is_some_and(|o| contains(o, query))
            }
            PersonFilter::Name(name) => contains(&person.name, name),
            PersonFilter::Occupation(occupation) => person
                .occupation
                .as_deref()
                .is_some_and(|o| contains(o, occupation)),
            PersonFilter::Location(location) => {
                person.locations().any(|field| contains(field, location))
            }
            PersonFilter::MaritalStatus(status) => person.marital_status == *status,
            PersonFilter::Gender(gender) => person.gender == *gender,
            PersonFilter::Alive(alive) => person.is_alive == *alive,
        }
    }
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Search parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircleQuery {
    /// Hop radius; the configured default when `None`
    pub max_depth: Option<usize>,

    /// Predicates that must all hold
    pub filters: Vec<PersonFilter>,
}

impl CircleQuery {
    /// Query with a hop radius and no filters
    pub fn within(max_depth: usize) -> Self {
        Self {
            max_depth: Some(max_depth),
            filters: Vec::new(),
        }
    }

    /// Add a predicate
    pub fn with(mut self, filter: PersonFilter) -> Self {
        self.filters.push(filter);
        self
    }

    fn accepts(&self, person: &Person) -> bool {
        self.filters.iter().all(|f| f.matches(person))
    }
}

/// A person found within the circle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleMatch {
    /// The person
    pub person: Person,

    /// Minimum hop distance from the root
    pub depth: usize,

    /// One shortest path of person ids from the root to this person
    pub path: Vec<PersonId>,
}

/// Result of a circle search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircleResult {
    /// Search root
    pub root: PersonId,

    /// Hop radius used
    pub max_depth: usize,

    /// Matches ordered by depth, then person id
    pub matches: Vec<CircleMatch>,

    /// Persons reached before filtering, root excluded
    pub total_reached: usize,
}

/// Finds persons within a hop radius of a root
pub struct CircleSearch {
    default_depth: usize,
    depth_cap: usize,
    timeout: Option<Duration>,
}

impl CircleSearch {
    /// Create a search using the configured depth limits and deadline
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_depth: config.default_circle_depth,
            depth_cap: config.max_circle_depth,
            timeout: config.traversal_timeout(),
        }
    }

    /// Search around `root`
    ///
    /// A missing root yields no matches.
    pub fn search<S>(&self, store: &S, root: PersonId, query: &CircleQuery) -> Result<CircleResult>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        let max_depth = query.max_depth.unwrap_or(self.default_depth);
        if max_depth == 0 || max_depth > self.depth_cap {
            return Err(KinshipError::InvalidArgument(format!(
                "circle depth must be between 1 and {}, got {}",
                self.depth_cap, max_depth
            )));
        }

        let deadline = Deadline::new(self.timeout);
        let mut loader = BatchLoader::new(store);

        let mut result = CircleResult {
            root,
            max_depth,
            matches: Vec::new(),
            total_reached: 0,
        };
        // First-discovery predecessor of every reached person
        let mut via: HashMap<PersonId, PersonId> = HashMap::new();
        let mut visited: HashSet<PersonId> = HashSet::from([root]);
        let mut frontier = vec![root];

        for depth in 0..=max_depth {
            if frontier.is_empty() {
                break;
            }
            deadline.check()?;

            let mut found = loader.persons(&frontier)?;
            found.sort_by_key(|p| p.id);
            let live: Vec<PersonId> = found.iter().map(|p| p.id).collect();

            if depth > 0 {
                result.total_reached += found.len();
                for person in found {
                    if query.accepts(&person) {
                        let path = witness_path(&via, root, person.id);
                        result.matches.push(CircleMatch {
                            person,
                            depth,
                            path,
                        });
                    }
                }
            }

            if depth == max_depth {
                break;
            }

            let live_set: HashSet<PersonId> = live.iter().copied().collect();
            let edges = loader.edges_touching(&live)?;

            let mut next: BTreeMap<PersonId, PersonId> = BTreeMap::new();
            for (current, neighbour, _) in oriented(&edges, &live_set) {
                if visited.contains(&neighbour) {
                    continue;
                }
                next.entry(neighbour)
                    .and_modify(|prev| *prev = (*prev).min(current))
                    .or_insert(current);
            }

            debug!(
                "Circle round {}: {} persons, {} new",
                depth,
                live.len(),
                next.len()
            );

            frontier = next.keys().copied().collect();
            for (neighbour, predecessor) in next {
                visited.insert(neighbour);
                via.insert(neighbour, predecessor);
            }
        }

        Ok(result)
    }
}

fn witness_path(
    via: &HashMap<PersonId, PersonId>,
    root: PersonId,
    target: PersonId,
) -> Vec<PersonId> {
    let mut path = vec![target];
    let mut current = target;
    while current != root {
        match via.get(&current) {
            Some(&previous) => {
                path.push(previous);
                current = previous;
            }
            None => break,
        }
    }
    path.reverse();
    path
}
