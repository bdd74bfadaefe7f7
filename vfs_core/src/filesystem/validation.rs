use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::error::AppError;
use crate::models::Policy;

const MAX_NAME_LENGTH: usize = 255;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("File name is empty")]
    EmptyName,

    #[error("File name too long: {length} bytes (max: {max_length})")]
    NameTooLong { length: usize, max_length: usize },

    #[error("Invalid file name: {name:?}")]
    InvalidName { name: String },

    #[error("File too large: {size} bytes (max: {max_size} bytes)")]
    FileTooLarge { size: u64, max_size: u64 },

    #[error("File extension {extension:?} is not allowed (allowed: {allowed:?})")]
    ExtensionNotAllowed { extension: String, allowed: Vec<String> },
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::ValidationFailed(err.to_string())
    }
}

/// Upload checks derived from a storage policy.
#[derive(Debug, Clone, Default)]
pub struct UploadValidator {
    /// 0 means unlimited.
    max_size: u64,
    /// Lowercase, without the dot. Empty allows every extension.
    allowed_extensions: HashSet<String>,
}

impl UploadValidator {
    pub fn new(max_size: u64, allowed_extensions: &[String]) -> Self {
        Self {
            max_size,
            allowed_extensions: allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
        }
    }

    pub fn for_policy(policy: &Policy) -> Self {
        Self::new(policy.max_size, &policy.allowed_extensions)
    }

    pub fn validate(&self, name: &str, size: u64) -> Result<(), ValidationError> {
        Self::validate_name(name)?;
        self.validate_size(size)?;
        self.validate_extension(name)
    }

    pub fn validate_name(name: &str) -> Result<(), ValidationError> {
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        if name.len() > MAX_NAME_LENGTH {
            return Err(ValidationError::NameTooLong {
                length: name.len(),
                max_length: MAX_NAME_LENGTH,
            });
        }

        if name == "." || name == ".." || name.contains(['/', '\\', '\0']) {
            return Err(ValidationError::InvalidName {
                name: name.to_string(),
            });
        }

        Ok(())
    }

    /// Largest accepted upload, `None` when unlimited.
    pub fn max_size(&self) -> Option<u64> {
        (self.max_size > 0).then_some(self.max_size)
    }

    pub fn validate_size(&self, size: u64) -> Result<(), ValidationError> {
        if self.max_size > 0 && size > self.max_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max_size: self.max_size,
            });
        }
        Ok(())
    }

    fn validate_extension(&self, name: &str) -> Result<(), ValidationError> {
        if self.allowed_extensions.is_empty() {
            return Ok(());
        }

        let extension = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_lowercase();

        if !self.allowed_extensions.contains(&extension) {
            let mut allowed: Vec<String> = self.allowed_extensions.iter().cloned().collect();
            allowed.sort();
            return Err(ValidationError::ExtensionNotAllowed { extension, allowed });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPolicy;

    #[test]
    fn test_name_rules() {
        assert!(UploadValidator::validate_name("report.pdf").is_ok());
        assert_eq!(UploadValidator::validate_name(""), Err(ValidationError::EmptyName));
        assert!(matches!(
            UploadValidator::validate_name(&"a".repeat(256)),
            Err(ValidationError::NameTooLong { length: 256, .. })
        ));

        for name in [".", "..", "a/b", "a\\b", "nul\0"] {
            assert!(
                matches!(UploadValidator::validate_name(name), Err(ValidationError::InvalidName { .. })),
                "{:?} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_policy_limits() {
        let policy = NewPolicy::local("disk", "uploads")
            .with_max_size(10)
            .with_allowed_extensions(&["txt", "PNG"])
            .into_policy(1);
        let validator = UploadValidator::for_policy(&policy);

        assert!(validator.validate("notes.TXT", 10).is_ok());
        assert!(validator.validate("image.png", 1).is_ok());
        assert_eq!(
            validator.validate("notes.txt", 11),
            Err(ValidationError::FileTooLarge { size: 11, max_size: 10 })
        );
        assert!(matches!(
            validator.validate("archive.zip", 1),
            Err(ValidationError::ExtensionNotAllowed { .. })
        ));
        assert!(matches!(
            validator.validate("Makefile", 1),
            Err(ValidationError::ExtensionNotAllowed { .. })
        ));
    }

    #[test]
    fn test_unrestricted_policy() {
        let validator = UploadValidator::default();
        assert_eq!(validator.max_size(), None);
        assert!(validator.validate("anything.bin", u64::MAX).is_ok());
    }

    #[test]
    fn test_into_app_error() {
        let err: AppError = ValidationError::EmptyName.into();
        assert_eq!(err.kind(), "validation_failed");
    }
}
