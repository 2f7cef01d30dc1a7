//! Duplicate detection ahead of profile creation
//!
//! Equality here is exactly the equality of the profiles UNIQUE constraint:
//! case-sensitive, untrimmed, with a missing company compared as ''.

use serde::{Deserialize, Serialize};
use crate::Result;
use crate::models::{NewProfile, Profile};
use crate::storage::SqliteStore;

/// The identifying triple of a prospective profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: Option<String>,
}

impl DuplicateCandidate {
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>, company: Option<&str>) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            company: company.map(str::to_string),
        }
    }

    /// Company as stored in the table
    pub fn company_key(&self) -> &str {
        self.company.as_deref().unwrap_or("")
    }
}

impl From<&NewProfile> for DuplicateCandidate {
    fn from(profile: &NewProfile) -> Self {
        Self {
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            company: profile.company.clone(),
        }
    }
}

/// Result of a checked insert
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    Inserted(i64),
    Duplicate(Profile),
}

/// Look up an existing profile with the same (first_name, last_name, company)
pub fn find_duplicate(store: &SqliteStore, candidate: &DuplicateCandidate) -> Result<Option<Profile>> {
    // `=` on TEXT uses the BINARY collation, same as the UNIQUE index
    let row = store.query_one(
        "SELECT id, first_name, last_name, company, email, phone, address, role, status, notes, created_at
         FROM profiles
         WHERE first_name = ?1 AND last_name = ?2 AND company = ?3",
        &[
            candidate.first_name.clone().into(),
            candidate.last_name.clone().into(),
            candidate.company_key().into(),
        ],
    )?;
    row.map(|r| Profile::from_row(&r)).transpose()
}

impl SqliteStore {
    /// Insert a profile unless an equivalent one already exists.
    ///
    /// A concurrent insert between the check and the write still surfaces as
    /// `ConstraintViolation` from the store.
    pub fn insert_profile_checked(&self, profile: &NewProfile) -> Result<InsertOutcome> {
        if let Some(existing) = find_duplicate(self, &DuplicateCandidate::from(profile))? {
            tracing::debug!("Profile {} already exists as id {}", existing.display_name(), existing.id);
            return Ok(InsertOutcome::Duplicate(existing));
        }
        self.insert_profile(profile).map(InsertOutcome::Inserted)
    }
}
