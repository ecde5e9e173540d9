//! Input validation utilities
//!
//! This module provides common validation functions for command-line parameters
//! and file paths with consistent error messages.
//!
//! All validation functions use structured error types from [`crate::errors`] to provide
//! rich contextual information when validation fails.

use crate::errors::{Result, VarsumError};
use std::fmt::Display;
use std::path::Path;

/// Validate that a file exists
///
/// # Arguments
/// * `path` - Path to validate
/// * `description` - Human-readable description of the file (e.g., "Input VCF")
///
/// # Errors
/// Returns an error if the file does not exist
///
/// # Example
/// ```
/// use varsum_lib::validation::validate_file_exists;
///
/// let result = validate_file_exists("/nonexistent/file.vcf.gz", "Input VCF");
/// assert!(result.is_err());
/// ```
pub fn validate_file_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.exists() {
        return Err(VarsumError::InvalidInput {
            location: path_ref.display().to_string(),
            reason: format!("{description} does not exist"),
        });
    }
    Ok(())
}

/// Validate that a directory exists
///
/// # Errors
/// Returns an error if the path does not exist or is not a directory
pub fn validate_directory_exists<P: AsRef<Path>>(path: P, description: &str) -> Result<()> {
    let path_ref = path.as_ref();
    if !path_ref.is_dir() {
        return Err(VarsumError::InvalidInput {
            location: path_ref.display().to_string(),
            reason: format!("{description} is not an existing directory"),
        });
    }
    Ok(())
}

/// Validate that a value is positive (> 0)
///
/// # Arguments
/// * `value` - Value to validate
/// * `name` - Name of the parameter for error messages
///
/// # Errors
/// Returns an error if the value is not positive
///
/// # Example
/// ```
/// use varsum_lib::validation::validate_positive;
///
/// validate_positive(10, "stride").unwrap();
///
/// let result = validate_positive(0, "stride");
/// assert!(result.is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_positive<T: Ord + Display + Default>(value: T, name: &str) -> Result<()> {
    if value <= T::default() {
        return Err(VarsumError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Must be positive (> 0), got: {value}"),
        });
    }
    Ok(())
}

/// Validate that max >= min for optional max values
///
/// # Errors
/// Returns an error if max < min
///
/// # Example
/// ```
/// use varsum_lib::validation::validate_min_max;
///
/// validate_min_max(1, Some(10), "window-start", "window-end").unwrap();
/// validate_min_max(1, None, "window-start", "window-end").unwrap();
///
/// let result = validate_min_max(10, Some(5), "window-start", "window-end");
/// assert!(result.is_err());
/// ```
#[allow(clippy::needless_pass_by_value)]
pub fn validate_min_max<T: Ord + Display>(
    min_val: T,
    max_val: Option<T>,
    min_name: &str,
    max_name: &str,
) -> Result<()> {
    if let Some(max) = max_val {
        if max < min_val {
            return Err(VarsumError::InvalidParameter {
                parameter: max_name.to_string(),
                reason: format!("{max_name} ({max}) must be >= {min_name} ({min_val})"),
            });
        }
    }
    Ok(())
}

/// Validate that a BGZF compression level is in the valid range [1, 12]
///
/// # Errors
/// Returns an error if the level is not in [1, 12]
///
/// # Example
/// ```
/// use varsum_lib::validation::validate_compression_level;
///
/// validate_compression_level(6, "compression-level").unwrap();
///
/// let result = validate_compression_level(0, "compression-level");
/// assert!(result.is_err());
/// ```
pub fn validate_compression_level(level: u32, name: &str) -> Result<()> {
    if !(1..=12).contains(&level) {
        return Err(VarsumError::InvalidParameter {
            parameter: name.to_string(),
            reason: format!("Compression level must be between 1 and 12, got: {level}"),
        });
    }
    Ok(())
}
