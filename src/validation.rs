//! Validation for file names
//!
//! Names are stored in a fixed 28-byte buffer, NUL padded, so the rules are:
//! - Non-empty
//! - At most 28 bytes
//! - No NUL bytes (they would truncate the stored name)

use crate::error::{FsError, Result};
use crate::layout::MAX_NAME_LEN;
use std::fmt;

/// A validated file name
///
/// # Examples
///
/// ```
/// use flatfs::validation::FileName;
///
/// let name = FileName::new("notes.txt").unwrap();
/// assert_eq!(name.as_str(), "notes.txt");
///
/// assert!(FileName::new("").is_err());
/// assert!(FileName::new("this-name-is-far-too-long-for-a-record").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileName(String);

impl FileName {
    /// Create a new validated name
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the name is empty, longer than 28 bytes,
    /// or contains a NUL byte.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate_name(&name)?;
        Ok(FileName(name))
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(FsError::InvalidArgument(
                "file name cannot be empty".to_string(),
            ));
        }

        if name.len() > MAX_NAME_LEN {
            return Err(FsError::InvalidArgument(format!(
                "file name too long ({} bytes, max {})",
                name.len(),
                MAX_NAME_LEN
            )));
        }

        if name.contains('\0') {
            return Err(FsError::InvalidArgument(
                "file name cannot contain NUL bytes".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert to String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl AsRef<str> for FileName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(FileName::new("a").is_ok());
        assert!(FileName::new("a.txt").is_ok());
        assert!(FileName::new("file_255.txt").is_ok());
        assert!(FileName::new("With Spaces And CAPS").is_ok());
    }

    #[test]
    fn test_boundary_length() {
        let exact = "x".repeat(MAX_NAME_LEN);
        assert!(FileName::new(exact).is_ok());

        let over = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            FileName::new(over),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_name() {
        assert!(matches!(
            FileName::new(""),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_nul_byte() {
        assert!(matches!(
            FileName::new("bad\0name"),
            Err(FsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_length_counts_bytes() {
        // 10 two-byte characters = 20 bytes: fits
        assert!(FileName::new("é".repeat(10)).is_ok());
        // 15 two-byte characters = 30 bytes: too long
        assert!(FileName::new("é".repeat(15)).is_err());
    }

    #[test]
    fn test_display() {
        let name = FileName::new("report.bin").unwrap();
        assert_eq!(name.to_string(), "report.bin");
        assert_eq!(name.into_string(), "report.bin");
    }
}
