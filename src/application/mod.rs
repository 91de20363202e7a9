//! # Application Layer
//!
//! The store contract, the embedding collaborator, and the use cases built
//! on top of them.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
