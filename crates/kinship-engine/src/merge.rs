//! Duplicate detection and transactional merge of person records

use crate::traversal::store_error;
use crate::{KinshipError, Result};
use kinship_domain::traits::RelationshipStore;
use kinship_domain::{
    normalize_phone, FieldConflict, MergeRequest, MergeRequestId, MergeStatus, Person, PersonId,
    PersonUpdate, UserId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Current timestamp in seconds since Unix epoch
fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Failure inside a merge transaction
enum MergeAbort<E> {
    Store(E),
    Rejected(KinshipError),
}

impl<E> From<E> for MergeAbort<E> {
    fn from(e: E) -> Self {
        MergeAbort::Store(e)
    }
}

impl<E: Display> MergeAbort<E> {
    fn into_error(self) -> KinshipError {
        match self {
            MergeAbort::Store(e) => store_error(e),
            MergeAbort::Rejected(e) => e,
        }
    }
}

/// What an approved merge did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// The approved request
    pub request: MergeRequestId,

    /// Surviving person
    pub target: PersonId,

    /// Deleted person
    pub absorbed: PersonId,

    /// Edges re-pointed from the absorbed person to the target
    pub edges_reassigned: usize,
}

/// Finds duplicate persons by phone number and resolves merge requests
///
/// # Examples
///
/// ```no_run
/// use kinship_engine::MergeDetector;
/// use kinship_domain::{Gender, Person, PersonId, UserId};
/// use kinship_store::SqliteStore;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut store = SqliteStore::new("kinship.db")?;
/// let mut person = Person::new(PersonId::new(), "Ravi", Gender::Male);
/// person.phone = Some("+919876543210".to_string());
///
/// let requester = UserId::from("user-2");
/// let detector = MergeDetector::new();
/// if let Some(request) = detector.on_person_created(&mut store, &person, &requester)? {
///     println!("{} conflicting fields", request.field_conflicts.len());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MergeDetector;

impl MergeDetector {
    /// Create a detector
    pub fn new() -> Self {
        Self
    }

    /// Find a person with the same phone number created by another user
    ///
    /// The number is normalized first. Only the first match is returned.
    pub fn detect_by_phone<S>(
        &self,
        store: &S,
        phone: &str,
        excluding: &UserId,
    ) -> Result<Option<Person>>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        let normalized = normalize_phone(phone);
        store
            .find_person_by_phone(&normalized, excluding)
            .map_err(store_error)
    }

    /// Fields on which both records have differing, non-empty values
    pub fn conflicts(&self, target: &Person, matched: &Person) -> BTreeMap<String, FieldConflict> {
        let fields: [(&str, Option<String>, Option<String>); 8] = [
            ("name", Some(target.name.clone()), Some(matched.name.clone())),
            (
                "date_of_birth",
                target.date_of_birth.clone(),
                matched.date_of_birth.clone(),
            ),
            (
                "gender",
                Some(target.gender.as_str().to_string()),
                Some(matched.gender.as_str().to_string()),
            ),
            ("occupation", target.occupation.clone(), matched.occupation.clone()),
            ("community", target.community.clone(), matched.community.clone()),
            ("city", target.city.clone(), matched.city.clone()),
            ("state", target.state.clone(), matched.state.clone()),
            (
                "marital_status",
                Some(target.marital_status.as_str().to_string()),
                Some(matched.marital_status.as_str().to_string()),
            ),
        ];

        fields
            .into_iter()
            .filter_map(|(field, target, matched)| match (target, matched) {
                (Some(t), Some(m)) if !t.is_empty() && !m.is_empty() && t != m => Some((
                    field.to_string(),
                    FieldConflict {
                        target: t,
                        matched: m,
                    },
                )),
                _ => None,
            })
            .collect()
    }

    /// Persist a pending merge request
    pub fn create_merge_request<S>(
        &self,
        store: &mut S,
        requester: &UserId,
        target: &Person,
        matched: &Person,
    ) -> Result<MergeRequest>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        if target.id == matched.id {
            return Err(KinshipError::InvalidArgument(format!(
                "person {} cannot be merged into itself",
                target.id
            )));
        }

        let request = MergeRequest::new(
            requester.clone(),
            target.id,
            matched.id,
            self.conflicts(target, matched),
            current_timestamp(),
        );
        store.create_merge_request(&request).map_err(store_error)?;

        info!(
            "Created merge request {}: {} into {} ({} conflicts)",
            request.id,
            matched.id,
            target.id,
            request.field_conflicts.len()
        );
        Ok(request)
    }

    /// Check a newly created person for a duplicate and raise a merge request
    ///
    /// The existing person is the merge target; the new person would be absorbed.
    pub fn on_person_created<S>(
        &self,
        store: &mut S,
        person: &Person,
        requester: &UserId,
    ) -> Result<Option<MergeRequest>>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        let Some(phone) = person.phone.as_deref().filter(|p| !p.is_empty()) else {
            return Ok(None);
        };

        let existing = self
            .detect_by_phone(store, phone, requester)?
            .filter(|existing| existing.id != person.id);

        match existing {
            Some(existing) => self
                .create_merge_request(store, requester, &existing, person)
                .map(Some),
            None => {
                debug!("No duplicate found for person {}", person.id);
                Ok(None)
            }
        }
    }

    /// Approve a pending request, absorbing the matched person into the target
    ///
    /// Runs in one store transaction: resolved fields are applied to the target, every
    /// edge of the matched person is re-pointed to the target, the matched person's
    /// account link moves to the target, the matched person is deleted and the request
    /// is marked approved. Any failure leaves the store unchanged.
    pub fn approve<S>(
        &self,
        store: &mut S,
        id: MergeRequestId,
        resolved_by: &UserId,
        resolved_fields: Option<&PersonUpdate>,
    ) -> Result<MergeOutcome>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        let resolved_at = current_timestamp();

        let outcome = store
            .transaction(|tx| -> std::result::Result<MergeOutcome, MergeAbort<S::Error>> {
                let request = tx
                    .merge_request(id)?
                    .ok_or_else(|| MergeAbort::Rejected(not_found(id)))?;
                if request.status.is_terminal() {
                    return Err(MergeAbort::Rejected(not_pending(&request)));
                }

                let target = request.target_person;
                let matched = tx.person(request.matched_person)?.ok_or_else(|| {
                    MergeAbort::Rejected(KinshipError::NotFound(format!(
                        "person {}",
                        request.matched_person
                    )))
                })?;
                if tx.person(target)?.is_none() {
                    return Err(MergeAbort::Rejected(KinshipError::NotFound(format!(
                        "person {}",
                        target
                    ))));
                }

                if let Some(fields) = resolved_fields.filter(|f| !f.is_empty()) {
                    tx.update_person(target, fields)?;
                }

                let edges_reassigned = tx.reassign_edge_endpoint(matched.id, target)?;

                if let Some(auth_user) = &matched.auth_user {
                    let link = PersonUpdate {
                        auth_user: Some(auth_user.clone()),
                        verified: Some(true),
                        ..Default::default()
                    };
                    tx.update_person(target, &link)?;
                }

                tx.delete_person(matched.id)?;
                tx.set_merge_status(id, MergeStatus::Approved, resolved_by, resolved_at)?;

                Ok(MergeOutcome {
                    request: id,
                    target,
                    absorbed: matched.id,
                    edges_reassigned,
                })
            })
            .map_err(MergeAbort::into_error)?;

        info!(
            "Approved merge request {}: {} absorbed into {}, {} edges moved",
            id, outcome.absorbed, outcome.target, outcome.edges_reassigned
        );
        Ok(outcome)
    }

    /// Reject a pending request without touching either person
    pub fn reject<S>(&self, store: &mut S, id: MergeRequestId, resolved_by: &UserId) -> Result<()>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        let resolved_at = current_timestamp();

        store
            .transaction(|tx| -> std::result::Result<(), MergeAbort<S::Error>> {
                let request = tx
                    .merge_request(id)?
                    .ok_or_else(|| MergeAbort::Rejected(not_found(id)))?;
                if request.status.is_terminal() {
                    return Err(MergeAbort::Rejected(not_pending(&request)));
                }
                tx.set_merge_status(id, MergeStatus::Rejected, resolved_by, resolved_at)?;
                Ok(())
            })
            .map_err(MergeAbort::into_error)?;

        info!("Rejected merge request {}", id);
        Ok(())
    }

    /// Pending requests the user raised or whose target person they own
    pub fn pending_for_user<S>(&self, store: &S, user: &UserId) -> Result<Vec<MergeRequest>>
    where
        S: RelationshipStore,
        S::Error: Display,
    {
        store.pending_merge_requests(user).map_err(store_error)
    }
}

fn not_found(id: MergeRequestId) -> KinshipError {
    KinshipError::NotFound(format!("merge request {}", id))
}

fn not_pending(request: &MergeRequest) -> KinshipError {
    KinshipError::Conflict(format!(
        "merge request {} is {}",
        request.id,
        request.status.as_str()
    ))
}
