//! Batched store access shared by the traversals

use crate::{KinshipError, Result};
use kinship_domain::traits::RelationshipStore;
use kinship_domain::{Edge, Person, PersonId};
use std::collections::HashSet;
use std::fmt::Display;
use std::time::{Duration, Instant};

/// Map a store error into the engine taxonomy
pub(crate) fn store_error<E: Display>(e: E) -> KinshipError {
    KinshipError::Store(e.to_string())
}

/// Counts store round-trips made by one traversal
pub(crate) struct BatchLoader<'a, S> {
    store: &'a S,
    calls: usize,
}

impl<'a, S> BatchLoader<'a, S>
where
    S: RelationshipStore,
    S::Error: Display,
{
    pub(crate) fn new(store: &'a S) -> Self {
        Self { store, calls: 0 }
    }

    /// Store calls issued so far
    pub(crate) fn calls(&self) -> usize {
        self.calls
    }

    pub(crate) fn persons(&mut self, ids: &[PersonId]) -> Result<Vec<Person>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.calls += 1;
        self.store.get_persons_by_ids(ids).map_err(store_error)
    }

    /// Every stored edge with at least one endpoint in `ids`, each edge once
    ///
    /// Issues one call by source and one by target.
    pub(crate) fn edges_touching(&mut self, ids: &[PersonId]) -> Result<Vec<Edge>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        self.calls += 2;
        let mut edges = self.store.get_edges_by_source_ids(ids).map_err(store_error)?;
        let incoming = self.store.get_edges_by_target_ids(ids).map_err(store_error)?;

        // Edges with both ends in the set came back from both calls
        let sources: HashSet<PersonId> = ids.iter().copied().collect();
        edges.extend(incoming.into_iter().filter(|e| !sources.contains(&e.from)));

        Ok(edges)
    }
}

/// Each edge seen from the endpoints that are in `set`
///
/// Yields `(current, neighbour, edge)`; an edge with both endpoints in the set is
/// yielded once per endpoint.
pub(crate) fn oriented<'e>(
    edges: &'e [Edge],
    set: &'e HashSet<PersonId>,
) -> impl Iterator<Item = (PersonId, PersonId, &'e Edge)> + 'e {
    edges.iter().flat_map(move |edge| {
        let forward = set.contains(&edge.from).then_some((edge.from, edge.to, edge));
        let backward = set.contains(&edge.to).then_some((edge.to, edge.from, edge));
        forward.into_iter().chain(backward)
    })
}

/// Wall-clock budget for one traversal, checked between rounds
pub(crate) struct Deadline {
    started: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    pub(crate) fn new(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
        }
    }

    pub(crate) fn check(&self) -> Result<()> {
        match self.limit {
            Some(limit) if self.started.elapsed() > limit => {
                Err(KinshipError::Timeout(limit.as_millis() as u64))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinship_domain::RelationshipKind;

    fn edge(from: u128, to: u128) -> Edge {
        Edge::new(
            PersonId::from_value(from),
            PersonId::from_value(to),
            RelationshipKind::SiblingOf,
            None,
            0,
        )
        .unwrap()
    }

    #[test]
    fn test_oriented_yields_both_ends_in_set() {
        let edges = vec![edge(1, 2), edge(3, 1), edge(4, 5)];
        let set: HashSet<PersonId> = [1, 2].into_iter().map(PersonId::from_value).collect();

        let pairs: Vec<(u128, u128)> = oriented(&edges, &set)
            .map(|(current, neighbour, _)| (current.value(), neighbour.value()))
            .collect();
        assert_eq!(pairs, vec![(1, 2), (2, 1), (1, 3)]);
    }

    #[test]
    fn test_deadline_without_limit_never_expires() {
        assert!(Deadline::new(None).check().is_ok());
    }

    #[test]
    fn test_expired_deadline() {
        let deadline = Deadline {
            started: Instant::now() - Duration::from_millis(50),
            limit: Some(Duration::from_millis(10)),
        };
        assert_eq!(deadline.check(), Err(KinshipError::Timeout(10)));
    }
}
