//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
-- Master customer profile table
CREATE TABLE IF NOT EXISTS customers (
    mcp_id TEXT PRIMARY KEY,
    customer_name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT NOT NULL,
    credit_limit REAL NOT NULL,
    kyc_date TEXT NOT NULL,
    status TEXT NOT NULL,
    region TEXT NOT NULL DEFAULT '',
    industry TEXT NOT NULL DEFAULT '',
    country TEXT NOT NULL DEFAULT '',
    zip_code TEXT NOT NULL DEFAULT '',
    subscription_plan TEXT NOT NULL,
    signup_date TEXT NOT NULL DEFAULT '',
    last_login TEXT NOT NULL DEFAULT '',
    total_transactions INTEGER NOT NULL DEFAULT 0,
    total_spent REAL NOT NULL DEFAULT 0,
    preferred_category TEXT NOT NULL DEFAULT '',
    loyalty_points INTEGER NOT NULL DEFAULT 0,
    data TEXT
);

-- Indexes for common lookups
CREATE INDEX IF NOT EXISTS idx_customers_status ON customers(status);
CREATE INDEX IF NOT EXISTS idx_customers_region ON customers(region);
"#;
