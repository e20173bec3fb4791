//! Configuration module
//!
//! Loading and validation of the gate configuration: timing windows,
//! burst settings, zone placement, and the endpoints the gate and the
//! refresh collaborator talk to.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{ConfigLoader, LoadResult, LoaderOptions};
pub use schema::*;
pub use validation::{ValidationResult, Validator};
