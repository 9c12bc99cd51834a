//! Database schema definitions
//!
//! Table and column names shared by both store backends, plus the DDL each
//! backend runs during setup. Every statement is `IF NOT EXISTS` so setup can
//! be repeated safely.

/// Open-events table schema
pub mod email_opens {
    /// Table name
    pub const TABLE: &str = "email_opens";
    /// Primary key column
    pub const ID: &str = "id";
    /// Tracking identifier from the pixel URL
    pub const EMAIL_ID: &str = "email_id";
    /// Label derived from the identifier
    pub const LABEL: &str = "label";
    /// Server-assigned open timestamp
    pub const OPENED_AT: &str = "opened_at";
    /// Client address (forwarded-for or peer)
    pub const IP_ADDRESS: &str = "ip_address";
    /// Client `User-Agent` header
    pub const USER_AGENT: &str = "user_agent";
}

/// Contact submissions table schema
pub mod contact_submissions {
    /// Table name
    pub const TABLE: &str = "contact_submissions";
    /// Primary key column
    pub const ID: &str = "id";
    /// Contact person's name
    pub const CONTACT_NAME: &str = "contact_name";
    /// Contact person's email address
    pub const CONTACT_EMAIL: &str = "contact_email";
    /// Organization or institution
    pub const ORGANIZATION: &str = "organization";
    /// Phone number
    pub const PHONE: &str = "phone";
    /// Preferred day for follow-up
    pub const PREFERRED_DAY: &str = "preferred_day";
    /// Preferred time window for follow-up
    pub const PREFERRED_WINDOW: &str = "preferred_window";
    /// Server-assigned submission timestamp
    pub const SUBMITTED_AT: &str = "submitted_at";
}

/// SQLite DDL.
pub const SQLITE_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS email_opens (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    email_id TEXT NOT NULL,
    label TEXT NOT NULL,
    opened_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    ip_address TEXT NOT NULL DEFAULT '',
    user_agent TEXT NOT NULL DEFAULT ''
);
CREATE INDEX IF NOT EXISTS idx_email_opens_opened_at ON email_opens (opened_at);

CREATE TABLE IF NOT EXISTS contact_submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    contact_name TEXT,
    contact_email TEXT,
    organization TEXT,
    phone TEXT,
    preferred_day TEXT,
    preferred_window TEXT,
    submitted_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
);
";

/// PostgreSQL DDL, one statement per entry (the extended query protocol
/// rejects multi-statement strings).
pub const POSTGRES_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS email_opens (
        id BIGSERIAL PRIMARY KEY,
        email_id TEXT NOT NULL,
        label TEXT NOT NULL,
        opened_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        ip_address TEXT NOT NULL DEFAULT '',
        user_agent TEXT NOT NULL DEFAULT ''
    )",
    "CREATE INDEX IF NOT EXISTS idx_email_opens_opened_at ON email_opens (opened_at)",
    "CREATE TABLE IF NOT EXISTS contact_submissions (
        id BIGSERIAL PRIMARY KEY,
        contact_name TEXT,
        contact_email TEXT,
        organization TEXT,
        phone TEXT,
        preferred_day TEXT,
        preferred_window TEXT,
        submitted_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )",
];
