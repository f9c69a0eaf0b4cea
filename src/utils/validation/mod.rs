//! Input validation

pub mod numeric;
pub mod request;

pub use numeric::NumericValidator;
pub use request::{RequestValidator, ValidatedRequest};
