//! # Domain Layer
//!
//! Documents, query results, collection snapshots and the error taxonomy
//! shared by every backend adapter.

mod error;
pub mod models;

pub use error::*;
pub use models::*;
