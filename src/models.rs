//! Record types - profiles, their interaction log, and auxiliary records
//!
//! - `Profile`: a person or organization tracked by the CRM
//! - `Contact`: one logged touchpoint against a profile
//! - `ScheduledContact`: a planned future touchpoint
//! - `Product`: something a profile can be linked to

use crate::{Error, Result};
use crate::storage::Row;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A stored profile.
///
/// `company` is never NULL: an absent company is stored as the empty string,
/// which is also what the uniqueness constraint compares.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub company: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: Option<String>,
    /// Open label such as "Lead", "Customer" or "Inactive"
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
}

impl Profile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: required_i64(row, "id")?,
            first_name: required_string(row, "first_name")?,
            last_name: required_string(row, "last_name")?,
            company: row.get_string("company").unwrap_or_default(),
            email: row.get_string("email"),
            phone: row.get_string("phone"),
            address: row.get_string("address"),
            role: row.get_string("role"),
            status: required_string(row, "status")?,
            notes: row.get_string("notes"),
            created_at: required_string(row, "created_at")?,
        })
    }
}

/// Fields for creating a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProfile {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub status: String,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewProfile {
    /// Create a profile with only the required fields
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            status: status.into(),
            ..Default::default()
        }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Field-level profile update. `None` leaves a field untouched.
///
/// Optional fields use `Some(None)` to clear them back to NULL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company: Option<String>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub role: Option<Option<String>>,
    pub status: Option<String>,
    pub notes: Option<Option<String>>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A logged interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub profile_id: i64,
    /// Caller-supplied date or timestamp of the interaction
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: String,
    pub value_eur: f64,
    pub created_at: String,
}

impl Contact {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: required_i64(row, "id")?,
            profile_id: required_i64(row, "profile_id")?,
            date: required_string(row, "date")?,
            kind: required_string(row, "type")?,
            details: required_string(row, "details")?,
            value_eur: row.get_f64("value_eur").unwrap_or(0.0),
            created_at: required_string(row, "created_at")?,
        })
    }
}

/// Fields for logging an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewContact {
    pub profile_id: i64,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub details: String,
    /// Stored as 0 when omitted
    #[serde(default)]
    pub value_eur: Option<f64>,
}

impl NewContact {
    pub fn new(
        profile_id: i64,
        date: impl Into<String>,
        kind: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            profile_id,
            date: date.into(),
            kind: kind.into(),
            details: details.into(),
            value_eur: None,
        }
    }

    pub fn with_value(mut self, value_eur: f64) -> Self {
        self.value_eur = Some(value_eur);
        self
    }
}

/// Direction for date-ordered listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "asc" | "ascending" | "oldest" => Ok(SortOrder::Asc),
            "desc" | "descending" | "newest" => Ok(SortOrder::Desc),
            _ => Err(Error::InvalidRequest(format!("Unknown sort order: {}", s))),
        }
    }
}

/// A planned future interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledContact {
    pub id: i64,
    pub profile_id: i64,
    pub date_time: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub reminder: Option<String>,
    pub details: Option<String>,
    pub value_eur: f64,
    pub completed: bool,
    pub created_at: String,
}

impl ScheduledContact {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: required_i64(row, "id")?,
            profile_id: required_i64(row, "profile_id")?,
            date_time: required_string(row, "date_time")?,
            kind: required_string(row, "type")?,
            reminder: row.get_string("reminder"),
            details: row.get_string("details"),
            value_eur: row.get_f64("value_eur").unwrap_or(0.0),
            completed: row.get_i64("completed").unwrap_or(0) != 0,
            created_at: required_string(row, "created_at")?,
        })
    }
}

/// Fields for scheduling an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewScheduledContact {
    pub profile_id: i64,
    pub date_time: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reminder: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub value_eur: Option<f64>,
}

/// A product profiles can be linked to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl Product {
    pub(crate) fn from_row(row: &Row) -> Result<Self> {
        Ok(Self {
            id: required_i64(row, "id")?,
            name: required_string(row, "name")?,
            description: row.get_string("description"),
            created_at: required_string(row, "created_at")?,
        })
    }
}

fn required_i64(row: &Row, column: &str) -> Result<i64> {
    row.get_i64(column)
        .ok_or_else(|| Error::SyntaxOrBinding(format!("column {column} missing or not an integer")))
}

fn required_string(row: &Row, column: &str) -> Result<String> {
    row.get_string(column)
        .ok_or_else(|| Error::SyntaxOrBinding(format!("column {column} missing or not text")))
}
