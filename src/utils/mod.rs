//! Shared validation helpers

pub mod validation;

pub use validation::{NumericValidator, RequestValidator, ValidatedRequest};
