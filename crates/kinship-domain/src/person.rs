//! Person module - the vertices of the kinship graph

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a person based on UUIDv7
///
/// Ordering follows the underlying `u128`, which is also the lexical order of the
/// hyphenated string form. Traversals rely on this for deterministic tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PersonId(u128);

impl PersonId {
    /// Generate a new UUIDv7-based PersonId
    ///
    /// # Examples
    ///
    /// ```
    /// use kinship_domain::PersonId;
    ///
    /// let id = PersonId::new();
    /// assert!(id.value() > 0);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Create a PersonId from a raw u128 value
    ///
    /// This is primarily for storage layer deserialization and tests.
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Parse a PersonId from its UUID string form
    ///
    /// # Examples
    ///
    /// ```
    /// use kinship_domain::PersonId;
    ///
    /// let id = PersonId::new();
    /// let parsed = PersonId::from_string(&id.to_string()).unwrap();
    /// assert_eq!(id, parsed);
    /// ```
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid person id: {}", e))
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for PersonId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

impl From<PersonId> for String {
    fn from(id: PersonId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for PersonId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_string(&s)
    }
}

/// Identifier of an authenticated application user
///
/// Users are owned by the authentication collaborator; this core only compares them.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wrap an externally issued user id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Gender of a person, used to pick gendered kinship terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    /// Male
    Male,
    /// Female
    Female,
    /// Other or unspecified
    #[default]
    Other,
}

impl Gender {
    /// Get the gender name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
        }
    }

    /// Parse a gender from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "male" => Some(Gender::Male),
            "female" => Some(Gender::Female),
            "other" => Some(Gender::Other),
            _ => None,
        }
    }

    /// Pick one of three terms by gender
    pub fn pick<'a>(&self, male: &'a str, female: &'a str, neutral: &'a str) -> &'a str {
        match self {
            Gender::Male => male,
            Gender::Female => female,
            Gender::Other => neutral,
        }
    }
}

/// Marital status of a person
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaritalStatus {
    /// Never married
    #[default]
    Single,
    /// Currently married
    Married,
    /// Divorced
    Divorced,
    /// Widowed
    Widowed,
}

impl MaritalStatus {
    /// Get the status name as stored
    pub fn as_str(&self) -> &'static str {
        match self {
            MaritalStatus::Single => "single",
            MaritalStatus::Married => "married",
            MaritalStatus::Divorced => "divorced",
            MaritalStatus::Widowed => "widowed",
        }
    }

    /// Parse a marital status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "single" => Some(MaritalStatus::Single),
            "married" => Some(MaritalStatus::Married),
            "divorced" => Some(MaritalStatus::Divorced),
            "widowed" => Some(MaritalStatus::Widowed),
            _ => None,
        }
    }
}

impl std::str::FromStr for MaritalStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid marital status: {}", s))
    }
}

/// A person record
///
/// Identity (`id`) never changes. Attributes are owned by the relationship store and
/// are only rewritten by this core while approving a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier
    pub id: PersonId,

    /// Display name
    pub name: String,

    /// Gender
    pub gender: Gender,

    /// Date of birth (ISO-8601 date)
    pub date_of_birth: Option<String>,

    /// Date of death (ISO-8601 date)
    pub date_of_death: Option<String>,

    /// Whether the person is alive
    pub is_alive: bool,

    /// Phone number, normalized to E.164
    pub phone: Option<String>,

    /// Email address
    pub email: Option<String>,

    /// Photo URL
    pub photo_url: Option<String>,

    /// Occupation
    pub occupation: Option<String>,

    /// Community
    pub community: Option<String>,

    /// City
    pub city: Option<String>,

    /// State or region
    pub state: Option<String>,

    /// Marital status
    pub marital_status: MaritalStatus,

    /// Wedding date (ISO-8601 date)
    pub wedding_date: Option<String>,

    /// User who created this record
    pub created_by: Option<UserId>,

    /// Authenticated user this record represents, if claimed
    pub auth_user: Option<UserId>,

    /// Whether the linked user verified this record
    pub verified: bool,

    /// Creation timestamp (seconds since Unix epoch)
    pub created_at: u64,

    /// Last update timestamp (seconds since Unix epoch)
    pub updated_at: u64,
}

impl Person {
    /// Create a living, unverified person with only the required attributes set
    pub fn new(id: PersonId, name: impl Into<String>, gender: Gender) -> Self {
        Self {
            id,
            name: name.into(),
            gender,
            date_of_birth: None,
            date_of_death: None,
            is_alive: true,
            phone: None,
            email: None,
            photo_url: None,
            occupation: None,
            community: None,
            city: None,
            state: None,
            marital_status: MaritalStatus::Single,
            wedding_date: None,
            created_by: None,
            auth_user: None,
            verified: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Location fields that are present, in city, state, community order
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        [&self.city, &self.state, &self.community]
            .into_iter()
            .filter_map(|field| field.as_deref())
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, update: &PersonUpdate) {
        if let Some(name) = &update.name {
            self.name = name.clone();
        }
        if let Some(gender) = update.gender {
            self.gender = gender;
        }
        if let Some(dob) = &update.date_of_birth {
            self.date_of_birth = Some(dob.clone());
        }
        if let Some(phone) = &update.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(email) = &update.email {
            self.email = Some(email.clone());
        }
        if let Some(occupation) = &update.occupation {
            self.occupation = Some(occupation.clone());
        }
        if let Some(community) = &update.community {
            self.community = Some(community.clone());
        }
        if let Some(city) = &update.city {
            self.city = Some(city.clone());
        }
        if let Some(state) = &update.state {
            self.state = Some(state.clone());
        }
        if let Some(status) = update.marital_status {
            self.marital_status = status;
        }
        if let Some(auth_user) = &update.auth_user {
            self.auth_user = Some(auth_user.clone());
        }
        if let Some(verified) = update.verified {
            self.verified = verified;
        }
    }
}

/// Partial update of a person's mutable attributes
///
/// `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonUpdate {
    /// New name
    pub name: Option<String>,
    /// New gender
    pub gender: Option<Gender>,
    /// New date of birth
    pub date_of_birth: Option<String>,
    /// New phone number (already normalized)
    pub phone: Option<String>,
    /// New email
    pub email: Option<String>,
    /// New occupation
    pub occupation: Option<String>,
    /// New community
    pub community: Option<String>,
    /// New city
    pub city: Option<String>,
    /// New state
    pub state: Option<String>,
    /// New marital status
    pub marital_status: Option<MaritalStatus>,
    /// Link to an authenticated user
    pub auth_user: Option<UserId>,
    /// Verification flag
    pub verified: Option<bool>,
}

impl PersonUpdate {
    /// True when the update changes nothing
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
