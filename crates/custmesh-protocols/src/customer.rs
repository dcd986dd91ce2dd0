//! Customer-record entity.
//!
//! The master customer profile the executor agent mutates. The field
//! table drives the executor's typed coercion: every payload key that
//! names a mutable column is coerced to that column's kind before it is
//! handed to the store.

use serde::{Deserialize, Serialize};

use crate::types::Metadata;

/// Customer account status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Suspended,
}

impl CustomerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerStatus::Active => "active",
            CustomerStatus::Inactive => "inactive",
            CustomerStatus::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(CustomerStatus::Active),
            "inactive" => Some(CustomerStatus::Inactive),
            "suspended" => Some(CustomerStatus::Suspended),
            _ => None,
        }
    }
}

/// Available subscription plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionPlan {
    Basic,
    Standard,
    Premium,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Basic => "Basic",
            SubscriptionPlan::Standard => "Standard",
            SubscriptionPlan::Premium => "Premium",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Basic" => Some(SubscriptionPlan::Basic),
            "Standard" => Some(SubscriptionPlan::Standard),
            "Premium" => Some(SubscriptionPlan::Premium),
            _ => None,
        }
    }
}

/// Storage kind of a customer column, used for payload coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerFieldKind {
    Text,
    Integer,
    Float,
    /// Free-form structured data; accepted as an object or a
    /// string-encoded JSON document.
    Json,
}

/// Complete customer profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Unique customer identifier. Immutable.
    pub mcp_id: String,
    pub customer_name: String,
    pub email: String,
    pub phone: String,
    pub credit_limit: f64,
    pub kyc_date: String,
    pub status: CustomerStatus,
    pub region: String,
    pub industry: String,
    pub country: String,
    pub zip_code: String,
    pub subscription_plan: SubscriptionPlan,
    pub signup_date: String,
    pub last_login: String,
    pub total_transactions: i64,
    pub total_spent: f64,
    pub preferred_category: String,
    pub loyalty_points: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Metadata>,
}

impl Customer {
    /// Mutable columns and their kinds. `mcp_id` is deliberately absent.
    pub const MUTABLE_FIELDS: &'static [(&'static str, CustomerFieldKind)] = &[
        ("customer_name", CustomerFieldKind::Text),
        ("email", CustomerFieldKind::Text),
        ("phone", CustomerFieldKind::Text),
        ("credit_limit", CustomerFieldKind::Float),
        ("kyc_date", CustomerFieldKind::Text),
        ("status", CustomerFieldKind::Text),
        ("region", CustomerFieldKind::Text),
        ("industry", CustomerFieldKind::Text),
        ("country", CustomerFieldKind::Text),
        ("zip_code", CustomerFieldKind::Text),
        ("subscription_plan", CustomerFieldKind::Text),
        ("signup_date", CustomerFieldKind::Text),
        ("last_login", CustomerFieldKind::Text),
        ("total_transactions", CustomerFieldKind::Integer),
        ("total_spent", CustomerFieldKind::Float),
        ("preferred_category", CustomerFieldKind::Text),
        ("loyalty_points", CustomerFieldKind::Integer),
        ("data", CustomerFieldKind::Json),
    ];

    /// Kind of a mutable column, `None` for unknown or immutable names.
    pub fn field_kind(name: &str) -> Option<CustomerFieldKind> {
        Self::MUTABLE_FIELDS
            .iter()
            .find(|(field, _)| *field == name)
            .map(|(_, kind)| *kind)
    }
}
