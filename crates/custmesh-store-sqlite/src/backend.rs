//! SQLite customer store implementation.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use custmesh_protocols::customer::{Customer, CustomerStatus, SubscriptionPlan};
use custmesh_protocols::error::StoreError;
use custmesh_protocols::store::{apply_update, CustomerStore};
use custmesh_protocols::types::Metadata;

use crate::schema::init_schema;

#[cfg(test)]
#[path = "backend_tests.rs"]
mod tests;

const COLUMNS: &str = "mcp_id, customer_name, email, phone, credit_limit, kyc_date, status, \
     region, industry, country, zip_code, subscription_plan, signup_date, last_login, \
     total_transactions, total_spent, preferred_category, loyalty_points, data";

/// SQLite-backed customer store.
pub struct SqliteCustomerStore {
    conn: Connection,
}

impl SqliteCustomerStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        conn.call(|conn| init_schema(conn))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(Self { conn })
    }

    /// Create a new file-backed database.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        info!(path = %path.display(), "opening customer database");
        let conn = Connection::open(path)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        conn.call(|conn| init_schema(conn))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(Self { conn })
    }
}

fn row_to_customer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Customer> {
    let parse_failure = |idx: usize, message: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            message.into(),
        )
    };

    let status_str: String = row.get(6)?;
    let status = CustomerStatus::parse(&status_str)
        .ok_or_else(|| parse_failure(6, format!("unknown status: {status_str}")))?;
    let plan_str: String = row.get(11)?;
    let subscription_plan = SubscriptionPlan::parse(&plan_str)
        .ok_or_else(|| parse_failure(11, format!("unknown subscription plan: {plan_str}")))?;
    let data_str: Option<String> = row.get(18)?;
    let data = match data_str {
        Some(text) => Some(
            serde_json::from_str::<Metadata>(&text)
                .map_err(|e| parse_failure(18, e.to_string()))?,
        ),
        None => None,
    };

    Ok(Customer {
        mcp_id: row.get(0)?,
        customer_name: row.get(1)?,
        email: row.get(2)?,
        phone: row.get(3)?,
        credit_limit: row.get(4)?,
        kyc_date: row.get(5)?,
        status,
        region: row.get(7)?,
        industry: row.get(8)?,
        country: row.get(9)?,
        zip_code: row.get(10)?,
        subscription_plan,
        signup_date: row.get(12)?,
        last_login: row.get(13)?,
        total_transactions: row.get(14)?,
        total_spent: row.get(15)?,
        preferred_category: row.get(16)?,
        loyalty_points: row.get(17)?,
        data,
    })
}

fn query_customer(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<Customer>> {
    let mut stmt =
        conn.prepare(&format!("SELECT {COLUMNS} FROM customers WHERE mcp_id = ?1"))?;
    match stmt.query_row([id], row_to_customer) {
        Ok(customer) => Ok(Some(customer)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e),
    }
}

fn write_customer(conn: &rusqlite::Connection, customer: &Customer) -> rusqlite::Result<usize> {
    let data = customer
        .data
        .as_ref()
        .map(|d| serde_json::to_string(d).unwrap_or_else(|_| "{}".to_string()));
    conn.execute(
        "UPDATE customers SET customer_name = ?1, email = ?2, phone = ?3, credit_limit = ?4, \
         kyc_date = ?5, status = ?6, region = ?7, industry = ?8, country = ?9, zip_code = ?10, \
         subscription_plan = ?11, signup_date = ?12, last_login = ?13, \
         total_transactions = ?14, total_spent = ?15, preferred_category = ?16, \
         loyalty_points = ?17, data = ?18 WHERE mcp_id = ?19",
        params![
            customer.customer_name,
            customer.email,
            customer.phone,
            customer.credit_limit,
            customer.kyc_date,
            customer.status.as_str(),
            customer.region,
            customer.industry,
            customer.country,
            customer.zip_code,
            customer.subscription_plan.as_str(),
            customer.signup_date,
            customer.last_login,
            customer.total_transactions,
            customer.total_spent,
            customer.preferred_category,
            customer.loyalty_points,
            data,
            customer.mcp_id,
        ],
    )
}

#[async_trait]
impl CustomerStore for SqliteCustomerStore {
    async fn fetch(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| Ok(query_customer(conn, &id)?))
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn insert(&self, customer: Customer) -> Result<(), StoreError> {
        let data = customer
            .data
            .as_ref()
            .map(|d| serde_json::to_string(d).unwrap_or_else(|_| "{}".to_string()));
        self.conn
            .call(move |conn| {
                conn.execute(
                    &format!(
                        "INSERT INTO customers ({COLUMNS}) VALUES \
                         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, \
                         ?16, ?17, ?18, ?19)"
                    ),
                    params![
                        customer.mcp_id,
                        customer.customer_name,
                        customer.email,
                        customer.phone,
                        customer.credit_limit,
                        customer.kyc_date,
                        customer.status.as_str(),
                        customer.region,
                        customer.industry,
                        customer.country,
                        customer.zip_code,
                        customer.subscription_plan.as_str(),
                        customer.signup_date,
                        customer.last_login,
                        customer.total_transactions,
                        customer.total_spent,
                        customer.preferred_category,
                        customer.loyalty_points,
                        data,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn update_fields(&self, id: &str, fields: Metadata) -> Result<(), StoreError> {
        let id = id.to_string();
        debug!(customer_id = id, fields = fields.len(), "updating customer row");
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                // Read-modify-write inside one transaction; the field
                // map is revalidated against the row before anything is
                // written.
                let mut customer = match query_customer(&tx, &id)? {
                    Some(customer) => customer,
                    None => return Ok(Err(StoreError::NotFound(id.clone()))),
                };
                if let Err(e) = apply_update(&mut customer, &fields) {
                    return Ok(Err(e));
                }
                write_customer(&tx, &customer)?;

                tx.commit()?;
                Ok(Ok(()))
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        self.conn
            .call(move |conn| {
                let affected = conn.execute("DELETE FROM customers WHERE mcp_id = ?1", [&id])?;
                Ok(affected > 0)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }

    async fn list(&self, limit: usize) -> Result<Vec<Customer>, StoreError> {
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM customers ORDER BY mcp_id LIMIT ?1"
                ))?;
                let customers = stmt
                    .query_map([limit as i64], row_to_customer)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(customers)
            })
            .await
            .map_err(|e| StoreError::Query(e.to_string()))
    }
}
