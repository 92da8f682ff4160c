//! Shortest relationship paths between two persons
//!
//! # Algorithm
//!
//! Bidirectional breadth-first search. Each side keeps a distance map and a parent map
//! listing every equally short predecessor of a person. A round expands the side with
//! the smaller frontier (the shallower side on a tie, then the side of `A`), fetching
//! edges stored in either direction for the whole frontier in one batch.
//!
//! Persons newly reached by one side that the other side has already visited are
//! meeting points. The search stops as soon as no further round can produce a path
//! shorter than or equal to the best meeting found, or the depth limit is reached.
//!
//! Paths are rebuilt with an explicit stack from each meeting point back to both
//! endpoints, walking predecessors in ascending id order and stopping after
//! `max_paths` halves per side.
//!
//! Each path is labelled step by step and handed to the relationship calculator.

use crate::traversal::{oriented, BatchLoader, Deadline};
use crate::{EngineConfig, KinshipError, Result};
use kinship_domain::traits::RelationshipStore;
use kinship_domain::{
    calculate_relationship, Edge, Gender, Lineage, PersonId, RelationshipKind, RelationshipResult,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt::Display;
use std::time::Duration;
use tracing::{debug, warn};

/// One relationship path between the two endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPath {
    /// Person ids from `A` to `B`
    pub path: Vec<PersonId>,

    /// Label of each step: what the next person is to the previous one
    pub relationships: Vec<RelationshipKind>,

    /// Number of steps
    pub depth: usize,

    /// How `A` is related to `B`
    pub relationship: RelationshipResult,
}

/// A person both endpoints descend from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonAncestor {
    /// The ancestor
    pub person: PersonId,

    /// Generations between `A` and the ancestor
    pub distance_from_a: usize,

    /// Generations between `B` and the ancestor
    pub distance_from_b: usize,
}

/// Counters describing one search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatistics {
    /// Length of the shortest path, if any
    pub shortest_distance: Option<usize>,

    /// Paths returned
    pub paths_found: usize,

    /// Persons visited by either side
    pub nodes_explored: usize,

    /// Expansion rounds run
    pub rounds: usize,

    /// Store round-trips
    pub store_calls: usize,

    /// Meeting points at the shortest distance
    pub meeting_points: usize,
}

/// Result of a connection search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// Whether any path was found within the depth limit
    pub connected: bool,

    /// Shortest paths, at most `max_paths`
    pub paths: Vec<ConnectionPath>,

    /// Closest shared ancestors
    pub common_ancestors: Vec<CommonAncestor>,

    /// Search counters
    pub statistics: SearchStatistics,
}

/// Predecessor of a person on one side of the search
#[derive(Debug, Clone)]
struct Link {
    via: PersonId,
    edge: Edge,
}

/// Search state grown from one endpoint
struct Side {
    start: PersonId,
    dist: HashMap<PersonId, usize>,
    parents: HashMap<PersonId, Vec<Link>>,
    frontier: Vec<PersonId>,
    depth: usize,
    // Persons reached from `start` by parent steps only
    ascend_only: HashSet<PersonId>,
    genders: HashMap<PersonId, Gender>,
}

impl Side {
    fn new(start: PersonId, gender: Gender) -> Self {
        Self {
            start,
            dist: HashMap::from([(start, 0)]),
            parents: HashMap::new(),
            frontier: vec![start],
            depth: 0,
            ascend_only: HashSet::from([start]),
            genders: HashMap::from([(start, gender)]),
        }
    }

    /// Expand the frontier by one hop; returns newly reached persons the other side has seen
    fn expand<S>(
        &mut self,
        loader: &mut BatchLoader<'_, S>,
        other: &Side,
    ) -> Result<Vec<PersonId>>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        let edges = loader.edges_touching(&self.frontier)?;
        let frontier_set: HashSet<PersonId> = self.frontier.iter().copied().collect();
        let next_depth = self.depth + 1;
        let mut reached = BTreeSet::new();

        for (current, neighbour, edge) in oriented(&edges, &frontier_set) {
            match self.dist.get(&neighbour) {
                None => {
                    self.dist.insert(neighbour, next_depth);
                    reached.insert(neighbour);
                }
                Some(&d) if d == next_depth => {}
                Some(_) => continue,
            }

            let links = self.parents.entry(neighbour).or_default();
            match links.iter_mut().find(|l| l.via == current) {
                // Prefer a father/mother edge over a generic parent edge for the same pair
                Some(link) if is_more_specific(&edge.kind, &link.edge.kind) => {
                    link.edge = edge.clone();
                }
                Some(_) => {}
                None => links.push(Link {
                    via: current,
                    edge: edge.clone(),
                }),
            }

            let ascends = edge
                .step_from(current, Gender::Other)
                .is_some_and(|kind| kind.lineage() == Lineage::Ascend);
            if ascends && self.ascend_only.contains(&current) {
                self.ascend_only.insert(neighbour);
            }
        }

        // Edge endpoints with no person record are not traversed
        if !reached.is_empty() {
            let ids: Vec<PersonId> = reached.iter().copied().collect();
            for person in loader.persons(&ids)? {
                self.genders.insert(person.id, person.gender);
            }
            let missing: Vec<PersonId> = ids
                .into_iter()
                .filter(|id| !self.genders.contains_key(id))
                .collect();
            for id in missing {
                warn!("Skipping edge to missing person {}", id);
                reached.remove(&id);
                self.dist.remove(&id);
                self.parents.remove(&id);
                self.ascend_only.remove(&id);
            }
        }

        self.frontier = reached.iter().copied().collect();
        self.depth = next_depth;

        Ok(reached
            .into_iter()
            .filter(|id| other.dist.contains_key(id))
            .collect())
    }

    /// Up to `cap` shortest walks from `start` to `to`, as (persons, edges)
    fn half_paths(&self, to: PersonId, cap: usize) -> Vec<(Vec<PersonId>, Vec<Edge>)> {
        let mut results = Vec::new();
        // Trails are built from `to` back towards `start`
        let mut stack: Vec<(PersonId, Vec<PersonId>, Vec<Edge>)> =
            vec![(to, vec![to], Vec::new())];

        while let Some((node, persons, edges)) = stack.pop() {
            if results.len() >= cap {
                break;
            }
            if node == self.start {
                let mut persons = persons;
                let mut edges = edges;
                persons.reverse();
                edges.reverse();
                results.push((persons, edges));
                continue;
            }

            let mut links: Vec<&Link> = self
                .parents
                .get(&node)
                .map(|l| l.iter().collect())
                .unwrap_or_default();
            links.sort_by_key(|l| l.via);
            // Pushed in reverse so the smallest id is walked first
            for link in links.into_iter().rev() {
                let mut persons = persons.clone();
                let mut edges = edges.clone();
                persons.push(link.via);
                edges.push(link.edge.clone());
                stack.push((link.via, persons, edges));
            }
        }

        results
    }
}

fn is_more_specific(candidate: &RelationshipKind, current: &RelationshipKind) -> bool {
    candidate.implied_gender().is_some() && current.implied_gender().is_none()
}

/// Finds shortest relationship paths between two persons
pub struct ConnectionFinder {
    max_depth: usize,
    max_paths: usize,
    max_common_ancestors: usize,
    timeout: Option<Duration>,
}

impl ConnectionFinder {
    /// Create a finder using the configured limits
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_depth: config.max_connection_depth,
            max_paths: config.max_paths,
            max_common_ancestors: config.max_common_ancestors,
            timeout: config.traversal_timeout(),
        }
    }

    /// Override the depth and path limits for one search
    pub fn with_limits(mut self, max_depth: usize, max_paths: usize) -> Self {
        self.max_depth = max_depth;
        self.max_paths = max_paths;
        self
    }

    /// Find how `a` and `b` are connected
    ///
    /// Returns `None` when either person does not exist. A search that finds no path
    /// within the depth limit returns a result with `connected == false`.
    pub fn find<S>(&self, store: &S, a: PersonId, b: PersonId) -> Result<Option<Connection>>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        if self.max_depth == 0 {
            return Err(KinshipError::InvalidArgument(
                "max_depth must be at least 1".to_string(),
            ));
        }
        if self.max_paths == 0 {
            return Err(KinshipError::InvalidArgument(
                "max_paths must be at least 1".to_string(),
            ));
        }

        let deadline = Deadline::new(self.timeout);
        let mut loader = BatchLoader::new(store);

        let endpoints = loader.persons(&[a, b])?;
        let gender_of = |id: PersonId| endpoints.iter().find(|p| p.id == id).map(|p| p.gender);
        let (Some(gender_a), Some(gender_b)) = (gender_of(a), gender_of(b)) else {
            return Ok(None);
        };

        if a == b {
            return Ok(Some(Connection {
                connected: true,
                paths: vec![ConnectionPath {
                    path: vec![a],
                    relationships: Vec::new(),
                    depth: 0,
                    relationship: calculate_relationship(&[], gender_a, gender_a),
                }],
                common_ancestors: Vec::new(),
                statistics: SearchStatistics {
                    shortest_distance: Some(0),
                    paths_found: 1,
                    nodes_explored: 1,
                    rounds: 0,
                    store_calls: loader.calls(),
                    meeting_points: 1,
                },
            }));
        }

        let mut side_a = Side::new(a, gender_a);
        let mut side_b = Side::new(b, gender_b);
        let mut best: Option<usize> = None;
        let mut meetings: BTreeSet<PersonId> = BTreeSet::new();
        let mut rounds = 0;

        while !side_a.frontier.is_empty() && !side_b.frontier.is_empty() {
            let next_total = side_a.depth + side_b.depth + 1;
            if next_total > self.max_depth || best.is_some_and(|best| next_total > best) {
                break;
            }
            deadline.check()?;

            let expand_a =
                (side_a.frontier.len(), side_a.depth) <= (side_b.frontier.len(), side_b.depth);
            let met = if expand_a {
                side_a.expand(&mut loader, &side_b)?
            } else {
                side_b.expand(&mut loader, &side_a)?
            };
            rounds += 1;

            for meeting in met {
                let total = side_a.dist[&meeting] + side_b.dist[&meeting];
                if best.map_or(true, |best| total < best) {
                    best = Some(total);
                    meetings.clear();
                }
                if best == Some(total) {
                    meetings.insert(meeting);
                }
            }

            debug!(
                "Connection round {}: depth {}+{}, frontiers {}/{}, best {:?}",
                rounds,
                side_a.depth,
                side_b.depth,
                side_a.frontier.len(),
                side_b.frontier.len(),
                best
            );
        }

        let mut statistics = SearchStatistics {
            shortest_distance: best,
            paths_found: 0,
            nodes_explored: side_a
                .dist
                .keys()
                .chain(side_b.dist.keys())
                .collect::<HashSet<_>>()
                .len(),
            rounds,
            store_calls: 0,
            meeting_points: meetings.len(),
        };

        if meetings.is_empty() {
            statistics.store_calls = loader.calls();
            return Ok(Some(Connection {
                connected: false,
                paths: Vec::new(),
                common_ancestors: Vec::new(),
                statistics,
            }));
        }

        let walks = self.combine(&side_a, &side_b, &meetings);

        // Every person on a path was fetched by the side that reached them
        let gender = |id: &PersonId| {
            side_a
                .genders
                .get(id)
                .or_else(|| side_b.genders.get(id))
                .copied()
                .unwrap_or_default()
        };

        let paths: Vec<ConnectionPath> = walks
            .into_iter()
            .map(|(persons, edges)| label_path(persons, edges, &gender))
            .collect();

        let common_ancestors = self.common_ancestors(&side_a, &side_b, &paths);

        statistics.paths_found = paths.len();
        statistics.store_calls = loader.calls();

        Ok(Some(Connection {
            connected: true,
            paths,
            common_ancestors,
            statistics,
        }))
    }

    /// Join half paths through each meeting point
    fn combine(
        &self,
        side_a: &Side,
        side_b: &Side,
        meetings: &BTreeSet<PersonId>,
    ) -> Vec<(Vec<PersonId>, Vec<Edge>)> {
        let mut seen: HashSet<Vec<PersonId>> = HashSet::new();
        let mut walks = Vec::new();

        'meetings: for &meeting in meetings {
            let from_a = side_a.half_paths(meeting, self.max_paths);
            let from_b = side_b.half_paths(meeting, self.max_paths);

            for (persons_a, edges_a) in &from_a {
                for (persons_b, edges_b) in &from_b {
                    let mut persons = persons_a.clone();
                    persons.extend(persons_b.iter().rev().skip(1));
                    let mut edges = edges_a.clone();
                    edges.extend(edges_b.iter().rev().cloned());

                    if seen.insert(persons.clone()) {
                        walks.push((persons, edges));
                    }
                    if walks.len() >= self.max_paths {
                        break 'meetings;
                    }
                }
            }
        }

        walks.sort_by_key(|(persons, _)| persons.len());
        walks
    }

    /// Shared ancestors seen by both sides or at the peak of a path
    fn common_ancestors(
        &self,
        side_a: &Side,
        side_b: &Side,
        paths: &[ConnectionPath],
    ) -> Vec<CommonAncestor> {
        let mut found: BTreeMap<PersonId, (usize, usize)> = BTreeMap::new();
        let mut offer = |person: PersonId, from_a: usize, from_b: usize| {
            let entry = found.entry(person).or_insert((from_a, from_b));
            if from_a + from_b < entry.0 + entry.1 {
                *entry = (from_a, from_b);
            }
        };

        for person in side_a.ascend_only.intersection(&side_b.ascend_only) {
            if *person != side_a.start && *person != side_b.start {
                offer(*person, side_a.dist[person], side_b.dist[person]);
            }
        }

        for path in paths {
            if let Some(peak) = ascend_then_descend_peak(&path.relationships) {
                offer(path.path[peak], peak, path.depth - peak);
            }
        }

        let mut ancestors: Vec<CommonAncestor> = found
            .into_iter()
            .map(|(person, (distance_from_a, distance_from_b))| CommonAncestor {
                person,
                distance_from_a,
                distance_from_b,
            })
            .collect();
        ancestors.sort_by_key(|c| (c.distance_from_a + c.distance_from_b, c.person));
        ancestors.truncate(self.max_common_ancestors);
        ancestors
    }
}

/// Index of the person where a path stops climbing and starts descending
fn ascend_then_descend_peak(steps: &[RelationshipKind]) -> Option<usize> {
    let peak = steps
        .iter()
        .take_while(|kind| kind.lineage() == Lineage::Ascend)
        .count();
    let descends = steps[peak..]
        .iter()
        .all(|kind| kind.lineage() == Lineage::Descend);

    (peak > 0 && peak < steps.len() && descends).then_some(peak)
}

fn label_path(
    persons: Vec<PersonId>,
    edges: Vec<Edge>,
    gender: &impl Fn(&PersonId) -> Gender,
) -> ConnectionPath {
    let steps = persons.windows(2).zip(&edges);

    let relationships: Vec<RelationshipKind> = steps
        .clone()
        .filter_map(|(pair, edge)| edge.step_from(pair[0], gender(&pair[1])))
        .collect();

    // Walked from B back to A, so the description is of A as seen from B
    let reversed: Vec<RelationshipKind> = steps
        .rev()
        .filter_map(|(pair, edge)| edge.step_from(pair[1], gender(&pair[0])))
        .collect();

    let start = persons[0];
    let end = persons[persons.len() - 1];
    let relationship = calculate_relationship(&reversed, gender(&end), gender(&start));

    ConnectionPath {
        depth: edges.len(),
        path: persons,
        relationships,
        relationship,
    }
}
