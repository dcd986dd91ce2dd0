//! Common utility types.

use std::collections::HashMap;

/// Unique identifier type.
pub type Id = String;

/// Free-form parameter/metadata map type.
pub type Metadata = HashMap<String, serde_json::Value>;
