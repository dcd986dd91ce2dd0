//! SQLite customer store backend for custmesh.
//!
//! Persistent implementation of the `CustomerStore` trait.

mod backend;
mod schema;

pub use backend::SqliteCustomerStore;
