//! Kinship Storage Layer
//!
//! Implements the `RelationshipStore` trait on SQLite.
//!
//! # Architecture
//!
//! - `persons`, `relationships` and `merge_requests` tables (see `schema.sql`)
//! - Ids stored as 16-byte big-endian blobs so blob order matches id order
//! - Batch reads use chunked `IN (...)` queries
//! - Merge approval runs inside a rusqlite transaction
//!
//! # Examples
//!
//! ```no_run
//! use kinship_store::SqliteStore;
//!
//! let store = SqliteStore::new(":memory:").unwrap();
//! // Store is now ready for graph operations
//! ```

#![warn(missing_docs)]

use kinship_domain::traits::{MergeWriter, RelationshipStore};
use kinship_domain::{
    Edge, Gender, MaritalStatus, MergeRequest, MergeRequestId, MergeStatus, Person, PersonId,
    PersonUpdate, RelationshipKind, UserId,
};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Maximum number of ids bound into a single `IN (...)` clause
pub const MAX_BATCH: usize = 500;

const PERSON_COLUMNS: &str = "id, name, gender, date_of_birth, date_of_death, is_alive, phone, \
     email, photo_url, occupation, community, city, state, marital_status, wedding_date, \
     created_by, auth_user, verified, created_at, updated_at";

const EDGE_COLUMNS: &str = "from_person_id, to_person_id, kind, created_by, created_at";

const MERGE_COLUMNS: &str = "id, requester, target_person_id, matched_person_id, \
     field_conflicts, status, resolved_by, resolved_at, created_at";

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid data format
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Record already exists
    #[error("Duplicate: {0}")]
    Duplicate(String),

    /// Edge from a person to themselves
    #[error("Self-referencing relationship on {0}")]
    SelfReference(PersonId),
}

/// SQLite-based implementation of RelationshipStore
///
/// # Thread Safety
///
/// SQLite connections are not thread-safe. Each concurrent caller should open its own
/// SqliteStore on the same database file.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create a new SqliteStore with the given database path
    ///
    /// Use `:memory:` for an in-memory database (useful for testing).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use kinship_store::SqliteStore;
    ///
    /// let store = SqliteStore::new("kinship.db").unwrap();
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Initialize the database schema
    fn initialize_schema(&mut self) -> Result<(), StoreError> {
        let schema = include_str!("schema.sql");
        self.conn.execute_batch(schema)?;
        Ok(())
    }

    /// Borrow the underlying connection for diagnostics
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn id_to_bytes(value: u128) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

fn bytes_to_id(bytes: &[u8]) -> Result<u128, StoreError> {
    let arr: [u8; 16] = bytes.try_into().map_err(|_| {
        StoreError::InvalidData(format!("Expected 16 bytes for id, got {}", bytes.len()))
    })?;
    Ok(u128::from_be_bytes(arr))
}

fn conversion_error(idx: usize, ty: Type, err: StoreError) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn person_id_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<PersonId> {
    let bytes: Vec<u8> = row.get(idx)?;
    bytes_to_id(&bytes)
        .map(PersonId::from_value)
        .map_err(|e| conversion_error(idx, Type::Blob, e))
}

fn text_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: fn(&str) -> Option<T>,
    what: &str,
) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    parse(&text).ok_or_else(|| {
        conversion_error(
            idx,
            Type::Text,
            StoreError::InvalidData(format!("Unknown {}: {}", what, text)),
        )
    })
}

fn person_from_row(row: &Row<'_>) -> rusqlite::Result<Person> {
    Ok(Person {
        id: person_id_column(row, 0)?,
        name: row.get(1)?,
        gender: text_column(row, 2, Gender::parse, "gender")?,
        date_of_birth: row.get(3)?,
        date_of_death: row.get(4)?,
        is_alive: row.get(5)?,
        phone: row.get(6)?,
        email: row.get(7)?,
        photo_url: row.get(8)?,
        occupation: row.get(9)?,
        community: row.get(10)?,
        city: row.get(11)?,
        state: row.get(12)?,
        marital_status: text_column(row, 13, MaritalStatus::parse, "marital status")?,
        wedding_date: row.get(14)?,
        created_by: row.get::<_, Option<String>>(15)?.map(UserId::new),
        auth_user: row.get::<_, Option<String>>(16)?.map(UserId::new),
        verified: row.get(17)?,
        created_at: row.get::<_, i64>(18)? as u64,
        updated_at: row.get::<_, i64>(19)? as u64,
    })
}

fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    Ok(Edge {
        from: person_id_column(row, 0)?,
        to: person_id_column(row, 1)?,
        kind: text_column(row, 2, RelationshipKind::parse, "relationship kind")?,
        created_by: row.get::<_, Option<String>>(3)?.map(UserId::new),
        created_at: row.get::<_, i64>(4)? as u64,
    })
}

fn merge_request_from_row(row: &Row<'_>) -> rusqlite::Result<MergeRequest> {
    let id_bytes: Vec<u8> = row.get(0)?;
    let id = bytes_to_id(&id_bytes)
        .map(MergeRequestId::from_value)
        .map_err(|e| conversion_error(0, Type::Blob, e))?;

    let conflicts: String = row.get(4)?;
    let field_conflicts = serde_json::from_str(&conflicts).map_err(|e| {
        conversion_error(4, Type::Text, StoreError::InvalidData(e.to_string()))
    })?;

    Ok(MergeRequest {
        id,
        requester: UserId::new(row.get::<_, String>(1)?),
        target_person: person_id_column(row, 2)?,
        matched_person: person_id_column(row, 3)?,
        field_conflicts,
        status: text_column(row, 5, MergeStatus::parse, "merge status")?,
        resolved_by: row.get::<_, Option<String>>(6)?.map(UserId::new),
        resolved_at: row.get::<_, Option<i64>>(7)?.map(|t| t as u64),
        created_at: row.get::<_, i64>(8)? as u64,
    })
}

/// Run `sql` once per chunk of `ids`, substituting `{ids}` with the placeholders
fn query_by_ids<T>(
    conn: &Connection,
    sql: &str,
    ids: &[PersonId],
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StoreError> {
    let mut ids = ids.to_vec();
    ids.sort();
    ids.dedup();

    let mut results = Vec::new();
    for chunk in ids.chunks(MAX_BATCH) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let mut stmt = conn.prepare(&sql.replace("{ids}", &placeholders))?;
        let params = chunk.iter().map(|id| id_to_bytes(id.value()));
        let rows = stmt.query_map(params_from_iter(params), map)?;
        for row in rows {
            results.push(row?);
        }
    }

    Ok(results)
}

fn read_person(conn: &Connection, id: PersonId) -> Result<Option<Person>, StoreError> {
    let person = conn
        .query_row(
            &format!("SELECT {} FROM persons WHERE id = ?1", PERSON_COLUMNS),
            params![id_to_bytes(id.value())],
            person_from_row,
        )
        .optional()?;
    Ok(person)
}

fn read_merge_request(
    conn: &Connection,
    id: MergeRequestId,
) -> Result<Option<MergeRequest>, StoreError> {
    let request = conn
        .query_row(
            &format!("SELECT {} FROM merge_requests WHERE id = ?1", MERGE_COLUMNS),
            params![id_to_bytes(id.value())],
            merge_request_from_row,
        )
        .optional()?;
    Ok(request)
}

impl RelationshipStore for SqliteStore {
    type Error = StoreError;

    fn get_persons_by_ids(&self, ids: &[PersonId]) -> Result<Vec<Person>, Self::Error> {
        query_by_ids(
            &self.conn,
            &format!("SELECT {} FROM persons WHERE id IN ({{ids}})", PERSON_COLUMNS),
            ids,
            person_from_row,
        )
    }

    fn get_edges_by_source_ids(&self, ids: &[PersonId]) -> Result<Vec<Edge>, Self::Error> {
        query_by_ids(
            &self.conn,
            &format!(
                "SELECT {} FROM relationships WHERE from_person_id IN ({{ids}})",
                EDGE_COLUMNS
            ),
            ids,
            edge_from_row,
        )
    }

    fn get_edges_by_target_ids(&self, ids: &[PersonId]) -> Result<Vec<Edge>, Self::Error> {
        query_by_ids(
            &self.conn,
            &format!(
                "SELECT {} FROM relationships WHERE to_person_id IN ({{ids}})",
                EDGE_COLUMNS
            ),
            ids,
            edge_from_row,
        )
    }

    fn get_person_by_auth_user(&self, user: &UserId) -> Result<Option<Person>, Self::Error> {
        let person = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM persons WHERE auth_user = ?1 ORDER BY created_at, id LIMIT 1",
                    PERSON_COLUMNS
                ),
                params![user.as_str()],
                person_from_row,
            )
            .optional()?;
        Ok(person)
    }

    fn find_person_by_phone(
        &self,
        phone: &str,
        excluding: &UserId,
    ) -> Result<Option<Person>, Self::Error> {
        let person = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM persons
                     WHERE phone = ?1 AND (created_by IS NULL OR created_by <> ?2)
                     ORDER BY created_at, id LIMIT 1",
                    PERSON_COLUMNS
                ),
                params![phone, excluding.as_str()],
                person_from_row,
            )
            .optional()?;
        Ok(person)
    }

    fn insert_person(&mut self, person: &Person) -> Result<(), Self::Error> {
        let id_bytes = id_to_bytes(person.id.value());

        let exists = self
            .conn
            .query_row("SELECT 1 FROM persons WHERE id = ?1", params![&id_bytes], |_| Ok(true))
            .optional()?
            .unwrap_or(false);
        if exists {
            return Err(StoreError::Duplicate(format!("person {}", person.id)));
        }

        self.conn.execute(
            &format!(
                "INSERT INTO persons ({}) VALUES
                 (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                  ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
                PERSON_COLUMNS
            ),
            params![
                &id_bytes,
                &person.name,
                person.gender.as_str(),
                &person.date_of_birth,
                &person.date_of_death,
                person.is_alive,
                &person.phone,
                &person.email,
                &person.photo_url,
                &person.occupation,
                &person.community,
                &person.city,
                &person.state,
                person.marital_status.as_str(),
                &person.wedding_date,
                person.created_by.as_ref().map(UserId::as_str),
                person.auth_user.as_ref().map(UserId::as_str),
                person.verified,
                person.created_at as i64,
                person.updated_at as i64,
            ],
        )?;

        Ok(())
    }

    fn add_relationship(&mut self, edge: &Edge) -> Result<(), Self::Error> {
        if edge.from == edge.to {
            return Err(StoreError::SelfReference(edge.from));
        }

        let inserted = self.conn.execute(
            &format!(
                "INSERT OR IGNORE INTO relationships ({}) VALUES (?1, ?2, ?3, ?4, ?5)",
                EDGE_COLUMNS
            ),
            params![
                id_to_bytes(edge.from.value()),
                id_to_bytes(edge.to.value()),
                edge.kind.as_str(),
                edge.created_by.as_ref().map(UserId::as_str),
                edge.created_at as i64,
            ],
        )?;

        if inserted == 0 {
            return Err(StoreError::Duplicate(format!(
                "{} {} {}",
                edge.from,
                edge.kind.as_str(),
                edge.to
            )));
        }

        Ok(())
    }

    fn remove_relationship(&mut self, a: PersonId, b: PersonId) -> Result<usize, Self::Error> {
        let removed = self.conn.execute(
            "DELETE FROM relationships
             WHERE (from_person_id = ?1 AND to_person_id = ?2)
                OR (from_person_id = ?2 AND to_person_id = ?1)",
            params![id_to_bytes(a.value()), id_to_bytes(b.value())],
        )?;
        debug!("Removed {} relationship rows between {} and {}", removed, a, b);
        Ok(removed)
    }

    fn create_merge_request(&mut self, request: &MergeRequest) -> Result<(), Self::Error> {
        let conflicts = serde_json::to_string(&request.field_conflicts)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        self.conn.execute(
            &format!(
                "INSERT INTO merge_requests ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                MERGE_COLUMNS
            ),
            params![
                id_to_bytes(request.id.value()),
                request.requester.as_str(),
                id_to_bytes(request.target_person.value()),
                id_to_bytes(request.matched_person.value()),
                conflicts,
                request.status.as_str(),
                request.resolved_by.as_ref().map(UserId::as_str),
                request.resolved_at.map(|t| t as i64),
                request.created_at as i64,
            ],
        )?;

        Ok(())
    }

    fn get_merge_request(&self, id: MergeRequestId) -> Result<Option<MergeRequest>, Self::Error> {
        read_merge_request(&self.conn, id)
    }

    fn pending_merge_requests(&self, user: &UserId) -> Result<Vec<MergeRequest>, Self::Error> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM merge_requests
             WHERE status = 'pending'
               AND (requester = ?1
                    OR target_person_id IN
                       (SELECT id FROM persons WHERE created_by = ?1 OR auth_user = ?1))
             ORDER BY created_at, id",
            MERGE_COLUMNS
        ))?;

        let requests = stmt
            .query_map(params![user.as_str()], merge_request_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(requests)
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn MergeWriter<Error = Self::Error>) -> Result<T, E>,
        E: From<Self::Error>,
    {
        let tx = self.conn.transaction().map_err(StoreError::from)?;
        let mut writer = TxWriter { conn: &tx };

        // Dropping `tx` on the error path rolls back
        let value = f(&mut writer)?;

        tx.commit().map_err(StoreError::from)?;
        Ok(value)
    }
}

/// Writer bound to an open transaction
struct TxWriter<'a> {
    conn: &'a Connection,
}

impl MergeWriter for TxWriter<'_> {
    type Error = StoreError;

    fn person(&self, id: PersonId) -> Result<Option<Person>, Self::Error> {
        read_person(self.conn, id)
    }

    fn merge_request(&self, id: MergeRequestId) -> Result<Option<MergeRequest>, Self::Error> {
        read_merge_request(self.conn, id)
    }

    fn update_person(&mut self, id: PersonId, update: &PersonUpdate) -> Result<(), Self::Error> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(name) = &update.name {
            sets.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(gender) = update.gender {
            sets.push("gender = ?");
            values.push(Box::new(gender.as_str()));
        }
        if let Some(dob) = &update.date_of_birth {
            sets.push("date_of_birth = ?");
            values.push(Box::new(dob.clone()));
        }
        if let Some(phone) = &update.phone {
            sets.push("phone = ?");
            values.push(Box::new(phone.clone()));
        }
        if let Some(email) = &update.email {
            sets.push("email = ?");
            values.push(Box::new(email.clone()));
        }
        if let Some(occupation) = &update.occupation {
            sets.push("occupation = ?");
            values.push(Box::new(occupation.clone()));
        }
        if let Some(community) = &update.community {
            sets.push("community = ?");
            values.push(Box::new(community.clone()));
        }
        if let Some(city) = &update.city {
            sets.push("city = ?");
            values.push(Box::new(city.clone()));
        }
        if let Some(state) = &update.state {
            sets.push("state = ?");
            values.push(Box::new(state.clone()));
        }
        if let Some(status) = update.marital_status {
            sets.push("marital_status = ?");
            values.push(Box::new(status.as_str()));
        }
        if let Some(auth_user) = &update.auth_user {
            sets.push("auth_user = ?");
            values.push(Box::new(auth_user.as_str().to_string()));
        }
        if let Some(verified) = update.verified {
            sets.push("verified = ?");
            values.push(Box::new(verified));
        }
        sets.push("updated_at = CAST(strftime('%s', 'now') AS INTEGER)");
        values.push(Box::new(id_to_bytes(id.value())));

        let sql = format!("UPDATE persons SET {} WHERE id = ?", sets.join(", "));
        let param_refs: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();

        let changed = self.conn.execute(&sql, &param_refs[..])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("person {}", id)));
        }

        Ok(())
    }

    fn reassign_edge_endpoint(
        &mut self,
        old: PersonId,
        new: PersonId,
    ) -> Result<usize, Self::Error> {
        let old_bytes = id_to_bytes(old.value());
        let new_bytes = id_to_bytes(new.value());

        // Edges between the two would become self-edges
        self.conn.execute(
            "DELETE FROM relationships
             WHERE (from_person_id = ?1 AND to_person_id = ?2)
                OR (from_person_id = ?2 AND to_person_id = ?1)",
            params![&old_bytes, &new_bytes],
        )?;

        let outgoing = self.conn.execute(
            "UPDATE OR IGNORE relationships SET from_person_id = ?2 WHERE from_person_id = ?1",
            params![&old_bytes, &new_bytes],
        )?;
        let incoming = self.conn.execute(
            "UPDATE OR IGNORE relationships SET to_person_id = ?2 WHERE to_person_id = ?1",
            params![&old_bytes, &new_bytes],
        )?;

        // Rows left behind duplicated an edge the target already had
        let duplicates = self.conn.execute(
            "DELETE FROM relationships WHERE from_person_id = ?1 OR to_person_id = ?1",
            params![&old_bytes],
        )?;

        debug!(
            "Reassigned {} edges from {} to {} ({} duplicates dropped)",
            outgoing + incoming,
            old,
            new,
            duplicates
        );

        Ok(outgoing + incoming)
    }

    fn delete_person(&mut self, id: PersonId) -> Result<(), Self::Error> {
        let deleted = self.conn.execute(
            "DELETE FROM persons WHERE id = ?1",
            params![id_to_bytes(id.value())],
        )?;
        if deleted == 0 {
            return Err(StoreError::NotFound(format!("person {}", id)));
        }
        Ok(())
    }

    fn set_merge_status(
        &mut self,
        id: MergeRequestId,
        status: MergeStatus,
        resolved_by: &UserId,
        resolved_at: u64,
    ) -> Result<(), Self::Error> {
        let changed = self.conn.execute(
            "UPDATE merge_requests SET status = ?2, resolved_by = ?3, resolved_at = ?4
             WHERE id = ?1",
            params![
                id_to_bytes(id.value()),
                status.as_str(),
                resolved_by.as_str(),
                resolved_at as i64
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("merge request {}", id)));
        }
        Ok(())
    }
}
