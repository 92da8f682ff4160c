//! Connected-component retrieval by batched breadth-first search

use crate::traversal::{oriented, BatchLoader, Deadline};
use crate::{EngineConfig, Result};
use kinship_domain::traits::RelationshipStore;
use kinship_domain::{Edge, Gender, Person, PersonId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, warn};

/// Every person connected to a root, with their relationships
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilyTree {
    /// Person the tree was built from
    pub root: PersonId,

    /// Persons in discovery order (by hop distance, then id)
    pub persons: Vec<Person>,

    /// Relationships of each person, oriented from that person
    pub edges_by_person: BTreeMap<PersonId, Vec<Edge>>,

    /// Number of breadth-first rounds run
    pub rounds: usize,
}

impl FamilyTree {
    fn empty(root: PersonId) -> Self {
        Self {
            root,
            persons: Vec::new(),
            edges_by_person: BTreeMap::new(),
            rounds: 0,
        }
    }

    /// True when the root does not exist
    pub fn is_empty(&self) -> bool {
        self.persons.is_empty()
    }

    /// Look up a person in the tree
    pub fn person(&self, id: PersonId) -> Option<&Person> {
        self.persons.iter().find(|p| p.id == id)
    }

    /// Relationships of one person, oriented from them
    pub fn edges_of(&self, id: PersonId) -> &[Edge] {
        self.edges_by_person.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Builds the connected component of a person
///
/// Each round issues one person fetch and two edge fetches for the whole frontier, so
/// store round-trips grow with the number of hops rather than the number of persons.
pub struct TreeBuilder {
    timeout: Option<Duration>,
}

impl TreeBuilder {
    /// Create a builder using the configured deadline
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            timeout: config.traversal_timeout(),
        }
    }

    /// Build the tree rooted at `root`
    ///
    /// A missing root yields an empty tree. Edges pointing at missing persons are
    /// skipped.
    pub fn build<S>(&self, store: &S, root: PersonId) -> Result<FamilyTree>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        let deadline = Deadline::new(self.timeout);
        let mut loader = BatchLoader::new(store);

        let mut tree = FamilyTree::empty(root);
        let mut visited: HashSet<PersonId> = HashSet::from([root]);
        let mut frontier = vec![root];
        // (edge, synthesized) per person
        let mut oriented_edges: HashMap<PersonId, Vec<(Edge, bool)>> = HashMap::new();

        while !frontier.is_empty() {
            deadline.check()?;

            let mut found = loader.persons(&frontier)?;
            found.sort_by_key(|p| p.id);
            if found.len() < frontier.len() {
                let present: HashSet<PersonId> = found.iter().map(|p| p.id).collect();
                for missing in frontier.iter().filter(|id| !present.contains(id)) {
                    if *missing != root {
                        warn!("Skipping edge to missing person {}", missing);
                    }
                }
            }
            if found.is_empty() {
                break;
            }

            let genders: HashMap<PersonId, Gender> =
                found.iter().map(|p| (p.id, p.gender)).collect();
            let live: Vec<PersonId> = found.iter().map(|p| p.id).collect();
            let live_set: HashSet<PersonId> = live.iter().copied().collect();
            tree.persons.extend(found);
            tree.rounds += 1;

            let edges = loader.edges_touching(&live)?;
            let mut next = BTreeSet::new();

            for (current, neighbour, edge) in oriented(&edges, &live_set) {
                let entry = oriented_edges.entry(current).or_default();
                if edge.from == current {
                    entry.push((edge.clone(), false));
                } else {
                    let gender = genders.get(&current).copied().unwrap_or_default();
                    entry.push((edge.inverse(gender), true));
                }

                if visited.insert(neighbour) {
                    next.insert(neighbour);
                }
            }

            debug!(
                "Tree round {}: {} persons, {} edges, {} new",
                tree.rounds,
                live.len(),
                edges.len(),
                next.len()
            );
            frontier = next.into_iter().collect();
        }

        let members: HashSet<PersonId> = tree.persons.iter().map(|p| p.id).collect();
        for (person, edges) in oriented_edges {
            let edges = dedup_oriented(edges, &members);
            if !edges.is_empty() {
                tree.edges_by_person.insert(person, edges);
            }
        }

        Ok(tree)
    }
}

/// Keep one edge per neighbour and relationship family, preferring stored edges
fn dedup_oriented(mut edges: Vec<(Edge, bool)>, members: &HashSet<PersonId>) -> Vec<Edge> {
    edges.sort_by(|(a, a_synth), (b, b_synth)| {
        a_synth
            .cmp(b_synth)
            .then(a.to.cmp(&b.to))
            .then(a.kind.cmp(&b.kind))
    });

    let mut kept: Vec<Edge> = Vec::with_capacity(edges.len());
    for (edge, _) in edges {
        if !members.contains(&edge.to) {
            continue;
        }
        let duplicate = kept
            .iter()
            .any(|k| k.to == edge.to && k.kind.same_family(&edge.kind));
        if !duplicate {
            kept.push(edge);
        }
    }

    kept.sort_by(|a, b| a.to.cmp(&b.to).then(a.kind.cmp(&b.kind)));
    kept
}
