//! Numeric validation utilities
//!
//! Provides safe numeric conversions for the geometry math of the compositor,
//! so a pathological dimension surfaces as an error instead of a wrapped cast.

use crate::error::{ComposeError, Result};

/// Validator for numeric operations and conversions
pub struct NumericValidator;

impl NumericValidator {
    /// Safely convert f64 to u32 with bounds checking (truncates toward zero)
    pub fn validate_f64_to_u32(value: f64) -> Result<u32> {
        if !value.is_finite() {
            return Err(ComposeError::decode(format!(
                "Cannot convert non-finite value {} to u32",
                value
            )));
        }

        if value < 0.0 {
            return Err(ComposeError::decode(format!(
                "Cannot convert negative value {} to u32",
                value
            )));
        }

        if value > f64::from(u32::MAX) {
            return Err(ComposeError::decode(format!(
                "Value {} exceeds u32::MAX ({})",
                value,
                u32::MAX
            )));
        }

        Ok(value as u32)
    }

    /// Round half away from zero into an i64 pixel coordinate
    pub fn round_to_i64(value: f64) -> Result<i64> {
        if !value.is_finite() || value.abs() > 9.0e15 {
            return Err(ComposeError::decode(format!(
                "Coordinate {} is not representable",
                value
            )));
        }
        Ok(value.round() as i64)
    }

    /// Validate and clamp a value to a range
    pub fn clamp_to_range<T>(value: T, min: T, max: T) -> T
    where
        T: PartialOrd + Copy,
    {
        if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        }
    }

    /// Safely multiply two u32 values checking for overflow
    pub fn safe_multiply_u32(a: u32, b: u32) -> Result<u32> {
        a.checked_mul(b)
            .ok_or_else(|| ComposeError::decode(format!("Multiplication overflow: {} * {}", a, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_f64_to_u32() {
        assert_eq!(NumericValidator::validate_f64_to_u32(0.0).unwrap(), 0);
        assert_eq!(NumericValidator::validate_f64_to_u32(614.4).unwrap(), 614);
        assert_eq!(NumericValidator::validate_f64_to_u32(614.99).unwrap(), 614);

        assert!(NumericValidator::validate_f64_to_u32(-1.0).is_err());
        assert!(NumericValidator::validate_f64_to_u32(f64::NAN).is_err());
        assert!(NumericValidator::validate_f64_to_u32(f64::INFINITY).is_err());
        assert!(NumericValidator::validate_f64_to_u32(5.0e10).is_err());
    }

    #[test]
    fn test_round_to_i64() {
        assert_eq!(NumericValidator::round_to_i64(2.5).unwrap(), 3);
        assert_eq!(NumericValidator::round_to_i64(-2.5).unwrap(), -3);
        assert_eq!(NumericValidator::round_to_i64(10.2).unwrap(), 10);
        assert!(NumericValidator::round_to_i64(f64::NAN).is_err());
    }

    #[test]
    fn test_clamp_to_range() {
        assert_eq!(NumericValidator::clamp_to_range(50, 0, 100), 50);
        assert_eq!(NumericValidator::clamp_to_range(-10, 0, 100), 0);
        assert_eq!(NumericValidator::clamp_to_range(150.0, 0.0, 100.0), 100.0);
    }

    #[test]
    fn test_safe_multiply() {
        assert_eq!(NumericValidator::safe_multiply_u32(100, 200).unwrap(), 20000);
        assert!(NumericValidator::safe_multiply_u32(u32::MAX, 2).is_err());
    }
}
