//! Database schema definitions

/// Session pragmas applied before any table is touched.
/// `foreign_keys` is per-connection in SQLite, so this runs on every open.
pub const SESSION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;";

/// Journal mode for file-backed databases (readers proceed during a write)
pub const WAL_PRAGMA: &str = "PRAGMA journal_mode = WAL";

/// Maximum length of a contact's details text
pub const MAX_DETAILS_LEN: usize = 300;

/// SQL to create the profiles table.
/// `company` is NOT NULL so the uniqueness triple never compares NULLs.
pub const CREATE_PROFILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL CHECK (length(first_name) > 0),
    last_name TEXT NOT NULL CHECK (length(last_name) > 0),
    company TEXT NOT NULL DEFAULT '',
    email TEXT,
    phone TEXT,
    address TEXT,
    role TEXT,
    status TEXT NOT NULL CHECK (length(status) > 0),
    notes TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
    UNIQUE (first_name, last_name, company)
)
"#;

/// SQL to create the contacts (interaction log) table
pub const CREATE_CONTACTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id INTEGER NOT NULL REFERENCES profiles(id),
    date TEXT NOT NULL,
    type TEXT NOT NULL,
    details TEXT NOT NULL CHECK (length(details) BETWEEN 1 AND 300),
    value_eur REAL NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
)
"#;

/// SQL to create the scheduled (future) contacts table
pub const CREATE_SCHEDULED_CONTACTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS scheduled_contacts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    profile_id INTEGER NOT NULL REFERENCES profiles(id),
    date_time TEXT NOT NULL,
    type TEXT NOT NULL,
    reminder TEXT,
    details TEXT CHECK (details IS NULL OR length(details) <= 300),
    value_eur REAL NOT NULL DEFAULT 0,
    completed INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
)
"#;

/// SQL to create the products table
pub const CREATE_PRODUCTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK (length(name) > 0),
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
)
"#;

/// SQL to create the profile <-> product association table
pub const CREATE_PROFILE_PRODUCTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS profile_products (
    profile_id INTEGER NOT NULL REFERENCES profiles(id),
    product_id INTEGER NOT NULL REFERENCES products(id),
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
    PRIMARY KEY (profile_id, product_id)
)
"#;

/// SQL to create indexes
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_contacts_profile_date ON contacts(profile_id, date)",
    "CREATE INDEX IF NOT EXISTS idx_scheduled_profile ON scheduled_contacts(profile_id)",
    "CREATE INDEX IF NOT EXISTS idx_profiles_created ON profiles(created_at)",
];

/// created_at is write-once
pub const CREATE_TRIGGERS: &[&str] = &[
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_profiles_created_at_immutable
    BEFORE UPDATE OF created_at ON profiles
    WHEN NEW.created_at IS NOT OLD.created_at
    BEGIN
        SELECT RAISE(ABORT, 'profiles.created_at is immutable');
    END
    "#,
    r#"
    CREATE TRIGGER IF NOT EXISTS trg_contacts_created_at_immutable
    BEFORE UPDATE OF created_at ON contacts
    WHEN NEW.created_at IS NOT OLD.created_at
    BEGIN
        SELECT RAISE(ABORT, 'contacts.created_at is immutable');
    END
    "#,
];

/// Tables whose rows belong to the user (dump and stats order, parents first)
pub const USER_TABLES: &[&str] = &[
    "profiles",
    "contacts",
    "scheduled_contacts",
    "products",
    "profile_products",
];

/// All schema creation statements
pub fn all_schema_statements() -> Vec<&'static str> {
    let mut stmts = vec![
        CREATE_PROFILES_TABLE,
        CREATE_CONTACTS_TABLE,
        CREATE_SCHEDULED_CONTACTS_TABLE,
        CREATE_PRODUCTS_TABLE,
        CREATE_PROFILE_PRODUCTS_TABLE,
    ];
    stmts.extend(CREATE_INDEXES.iter().copied());
    stmts.extend(CREATE_TRIGGERS.iter().copied());
    stmts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_are_conditional() {
        for stmt in all_schema_statements() {
            assert!(stmt.contains("IF NOT EXISTS"), "unconditional: {stmt}");
        }
    }

    #[test]
    fn test_details_limit_matches_check() {
        assert!(CREATE_CONTACTS_TABLE.contains(&format!("BETWEEN 1 AND {MAX_DETAILS_LEN}")));
    }
}
