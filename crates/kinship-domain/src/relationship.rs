//! Relationship module - typed, directed edges between persons

use super::{Gender, PersonId, UserId};
use serde::{Deserialize, Serialize};

/// Type of a relationship edge
///
/// A stored edge `(from, to, kind)` reads "`from` is the `kind` of `to`":
/// `(a, b, FatherOf)` means `a` is the father of `b`.
///
/// When a kind labels a step along a path it describes the person reached by the step
/// relative to the previous person, so a `FatherOf` step climbs one generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipKind {
    /// Father of
    FatherOf,

    /// Mother of
    MotherOf,

    /// Parent of, gender unspecified
    ParentOf,

    /// Child of
    ChildOf,

    /// Spouse of
    SpouseOf,

    /// Sibling of
    SiblingOf,
}

/// How a path step moves through the generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lineage {
    /// To a parent
    Ascend,
    /// To a child
    Descend,
    /// To a spouse
    Marriage,
    /// To a sibling
    Sibling,
}

impl RelationshipKind {
    /// Get the kind name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::FatherOf => "FATHER_OF",
            RelationshipKind::MotherOf => "MOTHER_OF",
            RelationshipKind::ParentOf => "PARENT_OF",
            RelationshipKind::ChildOf => "CHILD_OF",
            RelationshipKind::SpouseOf => "SPOUSE_OF",
            RelationshipKind::SiblingOf => "SIBLING_OF",
        }
    }

    /// Parse a kind from its stored name
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "FATHER_OF" => Some(RelationshipKind::FatherOf),
            "MOTHER_OF" => Some(RelationshipKind::MotherOf),
            "PARENT_OF" => Some(RelationshipKind::ParentOf),
            "CHILD_OF" => Some(RelationshipKind::ChildOf),
            "SPOUSE_OF" => Some(RelationshipKind::SpouseOf),
            "SIBLING_OF" => Some(RelationshipKind::SiblingOf),
            _ => None,
        }
    }

    /// True for the three parent variants
    pub fn is_parent(&self) -> bool {
        matches!(
            self,
            RelationshipKind::FatherOf | RelationshipKind::MotherOf | RelationshipKind::ParentOf
        )
    }

    /// Classify this kind as a path step
    pub fn lineage(&self) -> Lineage {
        match self {
            RelationshipKind::FatherOf | RelationshipKind::MotherOf | RelationshipKind::ParentOf => {
                Lineage::Ascend
            }
            RelationshipKind::ChildOf => Lineage::Descend,
            RelationshipKind::SpouseOf => Lineage::Marriage,
            RelationshipKind::SiblingOf => Lineage::Sibling,
        }
    }

    /// The semantic inverse of this kind
    ///
    /// Parent variants all invert to `ChildOf`. `ChildOf` inverts to the generic
    /// `ParentOf`; use [`RelationshipKind::for_gender`] to recover a variant.
    pub fn inverse(&self) -> Self {
        match self {
            RelationshipKind::FatherOf | RelationshipKind::MotherOf | RelationshipKind::ParentOf => {
                RelationshipKind::ChildOf
            }
            RelationshipKind::ChildOf => RelationshipKind::ParentOf,
            RelationshipKind::SpouseOf => RelationshipKind::SpouseOf,
            RelationshipKind::SiblingOf => RelationshipKind::SiblingOf,
        }
    }

    /// Narrow a generic `ParentOf` to the father/mother variant for the given gender
    ///
    /// Every other kind, including already specific parent variants, is returned unchanged.
    pub fn for_gender(&self, gender: Gender) -> Self {
        match (self, gender) {
            (RelationshipKind::ParentOf, Gender::Male) => RelationshipKind::FatherOf,
            (RelationshipKind::ParentOf, Gender::Female) => RelationshipKind::MotherOf,
            (kind, _) => *kind,
        }
    }

    /// Gender implied by the kind itself, if any
    pub fn implied_gender(&self) -> Option<Gender> {
        match self {
            RelationshipKind::FatherOf => Some(Gender::Male),
            RelationshipKind::MotherOf => Some(Gender::Female),
            _ => None,
        }
    }

    /// Whether two kinds describe the same relationship up to parent variant
    pub fn same_family(&self, other: &Self) -> bool {
        (self.is_parent() && other.is_parent()) || self == other
    }
}

impl std::str::FromStr for RelationshipKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid relationship kind: {}", s))
    }
}

/// A directed, typed relationship edge between two persons
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source person
    pub from: PersonId,

    /// Target person
    pub to: PersonId,

    /// Type of relationship (`from` is the `kind` of `to`)
    pub kind: RelationshipKind,

    /// User who linked the two persons
    pub created_by: Option<UserId>,

    /// When the edge was created (seconds since Unix epoch)
    pub created_at: u64,
}

impl Edge {
    /// Create a new edge
    ///
    /// Returns an error for a self-referencing edge.
    pub fn new(
        from: PersonId,
        to: PersonId,
        kind: RelationshipKind,
        created_by: Option<UserId>,
        created_at: u64,
    ) -> Result<Self, String> {
        if from == to {
            return Err(format!("Person {} cannot be related to themselves", from));
        }

        Ok(Self {
            from,
            to,
            kind,
            created_by,
            created_at,
        })
    }

    /// The endpoint opposite to `id`, if `id` is an endpoint of this edge
    pub fn other_end(&self, id: PersonId) -> Option<PersonId> {
        if self.from == id {
            Some(self.to)
        } else if self.to == id {
            Some(self.from)
        } else {
            None
        }
    }

    /// Whether this edge connects `a` and `b` in either direction
    pub fn connects(&self, a: PersonId, b: PersonId) -> bool {
        (self.from == a && self.to == b) || (self.from == b && self.to == a)
    }

    /// The synthesized inverse edge
    ///
    /// `from_gender` is the gender of this edge's *target*, which becomes the source of
    /// the inverse and decides the parent variant when inverting `ChildOf`.
    pub fn inverse(&self, from_gender: Gender) -> Self {
        Self {
            from: self.to,
            to: self.from,
            kind: self.kind.inverse().for_gender(from_gender),
            created_by: self.created_by.clone(),
            created_at: self.created_at,
        }
    }

    /// Label of the step from `current` across this edge, as seen by the calculator
    ///
    /// The label states what the person on the far side is to `current`.
    /// `far_gender` narrows a generic parent label. Returns `None` when `current`
    /// is not an endpoint.
    pub fn step_from(&self, current: PersonId, far_gender: Gender) -> Option<RelationshipKind> {
        let kind = if self.to == current {
            // Far side is the source: it is `kind` of current
            self.kind
        } else if self.from == current {
            self.kind.inverse()
        } else {
            return None;
        };
        Some(kind.for_gender(far_gender))
    }
}
