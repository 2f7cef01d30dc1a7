//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - profiles(first_name, last_name, company, ..., status) unique on the name triple
//! - contacts(profile_id, date, type, details, value_eur)
//! - scheduled_contacts(profile_id, date_time, type, reminder, completed)
//! - products(name, description) and profile_products(profile_id, product_id)

pub mod schema;
pub mod sqlite;
pub mod value;
pub mod records;

pub use sqlite::{SqliteStore, Execution, DbStats};
pub use value::{Row, Value};
