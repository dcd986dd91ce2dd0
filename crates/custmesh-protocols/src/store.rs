//! Persistence collaborator contract.
//!
//! The engine and the executor agent only ever talk to customer storage
//! through [`CustomerStore`]. Each operation is one atomic unit of work;
//! backends commit or roll back internally.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::customer::{Customer, CustomerStatus, SubscriptionPlan};
use crate::error::StoreError;
use crate::types::Metadata;

/// Trait for customer persistence.
#[async_trait]
pub trait CustomerStore: Send + Sync {
    /// Fetch one customer by identifier.
    async fn fetch(&self, id: &str) -> Result<Option<Customer>, StoreError>;

    /// Insert a new customer record.
    async fn insert(&self, customer: Customer) -> Result<(), StoreError>;

    /// Apply a field map to an existing customer as a single transaction.
    ///
    /// Values must already be coerced to the column kinds from
    /// [`Customer::MUTABLE_FIELDS`]. Fails with [`StoreError::NotFound`]
    /// when the identifier matches no row.
    async fn update_fields(&self, id: &str, fields: Metadata) -> Result<(), StoreError>;

    /// Delete a customer by identifier. Returns whether a row existed.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Bounded list query.
    async fn list(&self, limit: usize) -> Result<Vec<Customer>, StoreError>;
}

/// Apply a coerced field map to a customer value.
///
/// Shared by in-memory backends; SQL backends translate the map to an
/// UPDATE statement instead.
pub fn apply_update(customer: &mut Customer, fields: &Metadata) -> Result<(), StoreError> {
    let bad = |field: &str, value: &serde_json::Value| {
        StoreError::Query(format!("invalid value for {field}: {value}"))
    };

    for (field, value) in fields {
        match field.as_str() {
            "customer_name" | "email" | "phone" | "kyc_date" | "region" | "industry"
            | "country" | "zip_code" | "signup_date" | "last_login" | "preferred_category" => {
                let text = value.as_str().ok_or_else(|| bad(field, value))?.to_string();
                match field.as_str() {
                    "customer_name" => customer.customer_name = text,
                    "email" => customer.email = text,
                    "phone" => customer.phone = text,
                    "kyc_date" => customer.kyc_date = text,
                    "region" => customer.region = text,
                    "industry" => customer.industry = text,
                    "country" => customer.country = text,
                    "zip_code" => customer.zip_code = text,
                    "signup_date" => customer.signup_date = text,
                    "last_login" => customer.last_login = text,
                    "preferred_category" => customer.preferred_category = text,
                    _ => unreachable!(),
                }
            }
            "credit_limit" => {
                customer.credit_limit = value.as_f64().ok_or_else(|| bad(field, value))?;
            }
            "total_spent" => {
                customer.total_spent = value.as_f64().ok_or_else(|| bad(field, value))?;
            }
            "total_transactions" => {
                customer.total_transactions = value.as_i64().ok_or_else(|| bad(field, value))?;
            }
            "loyalty_points" => {
                customer.loyalty_points = value.as_i64().ok_or_else(|| bad(field, value))?;
            }
            "status" => {
                let text = value.as_str().ok_or_else(|| bad(field, value))?;
                customer.status = CustomerStatus::parse(text).ok_or_else(|| bad(field, value))?;
            }
            "subscription_plan" => {
                let text = value.as_str().ok_or_else(|| bad(field, value))?;
                customer.subscription_plan =
                    SubscriptionPlan::parse(text).ok_or_else(|| bad(field, value))?;
            }
            "data" => {
                let map: Metadata =
                    serde_json::from_value(value.clone()).map_err(|_| bad(field, value))?;
                customer.data = Some(map);
            }
            other => {
                return Err(StoreError::Query(format!("unknown column: {other}")));
            }
        }
    }
    Ok(())
}

/// In-memory customer store.
pub struct MemoryCustomerStore {
    customers: RwLock<HashMap<String, Customer>>,
}

impl MemoryCustomerStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            customers: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCustomerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CustomerStore for MemoryCustomerStore {
    async fn fetch(&self, id: &str) -> Result<Option<Customer>, StoreError> {
        let customers = self.customers.read().await;
        Ok(customers.get(id).cloned())
    }

    async fn insert(&self, customer: Customer) -> Result<(), StoreError> {
        let mut customers = self.customers.write().await;
        customers.insert(customer.mcp_id.clone(), customer);
        Ok(())
    }

    async fn update_fields(&self, id: &str, fields: Metadata) -> Result<(), StoreError> {
        let mut customers = self.customers.write().await;
        let customer = customers
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        // All-or-nothing: stage on a copy, swap in only on full success.
        let mut staged = customer.clone();
        apply_update(&mut staged, &fields)?;
        *customer = staged;
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut customers = self.customers.write().await;
        Ok(customers.remove(id).is_some())
    }

    async fn list(&self, limit: usize) -> Result<Vec<Customer>, StoreError> {
        let customers = self.customers.read().await;
        Ok(customers.values().take(limit).cloned().collect())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
