//! Typed record operations built on the statement surface

use super::sqlite::{Execution, SqliteStore};
use super::value::Value;
use crate::models::{
    Contact, NewContact, NewProfile, NewScheduledContact, Product, Profile, ProfileUpdate,
    ScheduledContact, SortOrder,
};
use crate::Result;

const PROFILE_COLUMNS: &str =
    "id, first_name, last_name, company, email, phone, address, role, status, notes, created_at";
const CONTACT_COLUMNS: &str = "id, profile_id, date, type, details, value_eur, created_at";
const SCHEDULED_COLUMNS: &str =
    "id, profile_id, date_time, type, reminder, details, value_eur, completed, created_at";

impl SqliteStore {
    // ========== Profile Operations ==========

    /// Insert a profile and return its id.
    ///
    /// Fails with `ConstraintViolation` when the (first_name, last_name,
    /// company) triple is already taken.
    pub fn insert_profile(&self, profile: &NewProfile) -> Result<i64> {
        let exec = self.execute(
            r#"
            INSERT INTO profiles (first_name, last_name, company, email, phone, address, role, status, notes)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            &[
                profile.first_name.clone().into(),
                profile.last_name.clone().into(),
                profile.company.clone().unwrap_or_default().into(),
                profile.email.clone().into(),
                profile.phone.clone().into(),
                profile.address.clone().into(),
                profile.role.clone().into(),
                profile.status.clone().into(),
                profile.notes.clone().into(),
            ],
        )?;
        tracing::debug!("Inserted profile {}", exec.last_insert_id);
        Ok(exec.last_insert_id)
    }

    /// Get a profile by id
    pub fn get_profile(&self, id: i64) -> Result<Option<Profile>> {
        self.query_one(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1"),
            &[id.into()],
        )?
        .map(|row| Profile::from_row(&row))
        .transpose()
    }

    /// All profiles, newest first
    pub fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.query_all(
            &format!("SELECT {PROFILE_COLUMNS} FROM profiles ORDER BY created_at DESC, id DESC"),
            &[],
        )?
        .iter()
        .map(Profile::from_row)
        .collect()
    }

    /// Case-insensitive substring search over name, company, email and status
    pub fn search_profiles(&self, term: &str) -> Result<Vec<Profile>> {
        let pattern = format!("%{}%", escape_like(&term.trim().to_lowercase()));
        self.query_all(
            &format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles
                 WHERE LOWER(first_name) LIKE ?1 ESCAPE '\\'
                    OR LOWER(last_name) LIKE ?1 ESCAPE '\\'
                    OR LOWER(company) LIKE ?1 ESCAPE '\\'
                    OR LOWER(email) LIKE ?1 ESCAPE '\\'
                    OR LOWER(status) LIKE ?1 ESCAPE '\\'
                 ORDER BY created_at DESC, id DESC"
            ),
            &[pattern.into()],
        )?
        .iter()
        .map(Profile::from_row)
        .collect()
    }

    /// Apply a field-level update. Returns rows affected (0 when the id is unknown).
    pub fn update_profile(&self, id: i64, update: &ProfileUpdate) -> Result<usize> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut params: Vec<Value> = Vec::new();

        let mut set = |column: &'static str, value: Value| {
            assignments.push(column);
            params.push(value);
        };
        if let Some(v) = &update.first_name {
            set("first_name", v.clone().into());
        }
        if let Some(v) = &update.last_name {
            set("last_name", v.clone().into());
        }
        if let Some(v) = &update.company {
            set("company", v.clone().into());
        }
        if let Some(v) = &update.email {
            set("email", v.clone().into());
        }
        if let Some(v) = &update.phone {
            set("phone", v.clone().into());
        }
        if let Some(v) = &update.address {
            set("address", v.clone().into());
        }
        if let Some(v) = &update.role {
            set("role", v.clone().into());
        }
        if let Some(v) = &update.status {
            set("status", v.clone().into());
        }
        if let Some(v) = &update.notes {
            set("notes", v.clone().into());
        }

        if assignments.is_empty() {
            return Ok(0);
        }

        let set_clause = assignments
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        params.push(id.into());
        let sql = format!("UPDATE profiles SET {set_clause} WHERE id = ?{}", params.len());

        Ok(self.execute(&sql, &params)?.rows_affected)
    }

    /// Delete a profile by id.
    ///
    /// Foreign keys are enforced, so a profile that still has contacts,
    /// scheduled contacts or product links is not deleted and the call fails
    /// with `ConstraintViolation`. Use `delete_profile_cascade` to remove
    /// dependents as well.
    pub fn delete_profile(&self, id: i64) -> Result<usize> {
        Ok(self.execute("DELETE FROM profiles WHERE id = ?1", &[id.into()])?.rows_affected)
    }

    /// Delete a profile together with everything that references it, atomically
    pub fn delete_profile_cascade(&self, id: i64) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            for table in ["contacts", "scheduled_contacts", "profile_products"] {
                tx.execute(&format!("DELETE FROM {table} WHERE profile_id = ?1"), [id])?;
            }
            let deleted = tx.execute("DELETE FROM profiles WHERE id = ?1", [id])?;
            tx.commit()?;
            Ok(deleted)
        })
    }

    // ========== Contact Operations ==========

    /// Log an interaction against a profile and return its id.
    ///
    /// Rejected as a whole (never truncated) when details is empty or longer
    /// than 300 characters, or when the profile does not exist.
    pub fn insert_contact(&self, contact: &NewContact) -> Result<i64> {
        let exec = self.execute(
            "INSERT INTO contacts (profile_id, date, type, details, value_eur) VALUES (?1, ?2, ?3, ?4, ?5)",
            &[
                contact.profile_id.into(),
                contact.date.clone().into(),
                contact.kind.clone().into(),
                contact.details.clone().into(),
                contact.value_eur.unwrap_or(0.0).into(),
            ],
        )?;
        Ok(exec.last_insert_id)
    }

    /// Get a contact by id
    pub fn get_contact(&self, id: i64) -> Result<Option<Contact>> {
        self.query_one(
            &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
            &[id.into()],
        )?
        .map(|row| Contact::from_row(&row))
        .transpose()
    }

    /// Contact history of a profile ordered by date, then creation time.
    ///
    /// Both keys (and the id, for same-instant inserts) follow `order`, so
    /// descending puts the most recently logged of two same-date contacts first.
    pub fn contacts_for_profile(&self, profile_id: i64, order: SortOrder) -> Result<Vec<Contact>> {
        let dir = order.as_sql();
        self.query_all(
            &format!(
                "SELECT {CONTACT_COLUMNS} FROM contacts WHERE profile_id = ?1
                 ORDER BY date {dir}, created_at {dir}, id {dir}"
            ),
            &[profile_id.into()],
        )?
        .iter()
        .map(Contact::from_row)
        .collect()
    }

    /// Sum of `value_eur` over a profile's contacts
    pub fn total_value_for_profile(&self, profile_id: i64) -> Result<f64> {
        let row = self.query_one(
            "SELECT COALESCE(SUM(value_eur), 0) AS total FROM contacts WHERE profile_id = ?1",
            &[profile_id.into()],
        )?;
        Ok(row.and_then(|r| r.get_f64("total")).unwrap_or(0.0))
    }

    /// Remove every logged contact
    pub fn clear_contacts(&self) -> Result<usize> {
        Ok(self.execute("DELETE FROM contacts", &[])?.rows_affected)
    }

    // ========== Scheduled Contact Operations ==========

    pub fn schedule_contact(&self, scheduled: &NewScheduledContact) -> Result<i64> {
        let exec = self.execute(
            r#"
            INSERT INTO scheduled_contacts (profile_id, date_time, type, reminder, details, value_eur)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            &[
                scheduled.profile_id.into(),
                scheduled.date_time.clone().into(),
                scheduled.kind.clone().into(),
                scheduled.reminder.clone().into(),
                scheduled.details.clone().into(),
                scheduled.value_eur.unwrap_or(0.0).into(),
            ],
        )?;
        Ok(exec.last_insert_id)
    }

    /// Not-yet-completed scheduled contacts of a profile, soonest first
    pub fn pending_scheduled_contacts(&self, profile_id: i64) -> Result<Vec<ScheduledContact>> {
        self.query_all(
            &format!(
                "SELECT {SCHEDULED_COLUMNS} FROM scheduled_contacts
                 WHERE profile_id = ?1 AND completed = 0
                 ORDER BY date_time ASC, id ASC"
            ),
            &[profile_id.into()],
        )?
        .iter()
        .map(ScheduledContact::from_row)
        .collect()
    }

    pub fn complete_scheduled_contact(&self, id: i64) -> Result<usize> {
        Ok(self
            .execute("UPDATE scheduled_contacts SET completed = 1 WHERE id = ?1", &[id.into()])?
            .rows_affected)
    }

    // ========== Product Operations ==========

    pub fn insert_product(&self, name: &str, description: Option<&str>) -> Result<i64> {
        let exec = self.execute(
            "INSERT INTO products (name, description) VALUES (?1, ?2)",
            &[name.into(), description.into()],
        )?;
        Ok(exec.last_insert_id)
    }

    /// Link a product to a profile. Linking the same pair twice is a
    /// constraint violation.
    pub fn link_product(&self, profile_id: i64, product_id: i64) -> Result<Execution> {
        self.execute(
            "INSERT INTO profile_products (profile_id, product_id) VALUES (?1, ?2)",
            &[profile_id.into(), product_id.into()],
        )
    }

    pub fn products_for_profile(&self, profile_id: i64) -> Result<Vec<Product>> {
        self.query_all(
            "SELECT p.id, p.name, p.description, p.created_at
             FROM products p JOIN profile_products pp ON pp.product_id = p.id
             WHERE pp.profile_id = ?1
             ORDER BY p.name",
            &[profile_id.into()],
        )?
        .iter()
        .map(Product::from_row)
        .collect()
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
