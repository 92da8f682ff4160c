//! Merge request module - duplicate person records awaiting resolution

use super::{PersonId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Unique identifier for a merge request based on UUIDv7
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MergeRequestId(u128);

impl MergeRequestId {
    /// Generate a new UUIDv7-based MergeRequestId
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a MergeRequestId from a raw u128 value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a MergeRequestId from its UUID string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid merge request id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for MergeRequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MergeRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl From<MergeRequestId> for String {
    fn from(id: MergeRequestId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for MergeRequestId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_string(&s)
    }
}

/// Lifecycle state of a merge request
///
/// `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStatus {
    /// Awaiting a decision
    #[default]
    Pending,
    /// Matched record absorbed into the target
    Approved,
    /// Dismissed without changes
    Rejected,
}

impl MergeStatus {
    /// Get the status name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStatus::Pending => "pending",
            MergeStatus::Approved => "approved",
            MergeStatus::Rejected => "rejected",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(MergeStatus::Pending),
            "approved" => Some(MergeStatus::Approved),
            "rejected" => Some(MergeStatus::Rejected),
            _ => None,
        }
    }

    /// Whether no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MergeStatus::Pending)
    }
}

/// Differing values of one attribute on the two records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldConflict {
    /// Value on the surviving record
    pub target: String,
    /// Value on the record to be absorbed
    pub matched: String,
}

/// A pending or resolved proposal to merge two person records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Unique identifier
    pub id: MergeRequestId,

    /// User whose action produced the duplicate
    pub requester: UserId,

    /// Person that survives the merge
    pub target_person: PersonId,

    /// Person absorbed into the target and deleted on approval
    pub matched_person: PersonId,

    /// Attribute conflicts keyed by field name
    pub field_conflicts: BTreeMap<String, FieldConflict>,

    /// Current status
    pub status: MergeStatus,

    /// User who approved or rejected the request
    pub resolved_by: Option<UserId>,

    /// When the request was resolved (seconds since Unix epoch)
    pub resolved_at: Option<u64>,

    /// When the request was created (seconds since Unix epoch)
    pub created_at: u64,
}

impl MergeRequest {
    /// Create a pending merge request
    pub fn new(
        requester: UserId,
        target_person: PersonId,
        matched_person: PersonId,
        field_conflicts: BTreeMap<String, FieldConflict>,
        created_at: u64,
    ) -> Self {
        Self {
            id: MergeRequestId::new(),
            requester,
            target_person,
            matched_person,
            field_conflicts,
            status: MergeStatus::Pending,
            resolved_by: None,
            resolved_at: None,
            created_at,
        }
    }

    /// Whether the request still awaits a decision
    pub fn is_pending(&self) -> bool {
        self.status == MergeStatus::Pending
    }
}
