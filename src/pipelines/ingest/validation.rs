// SPDX-License-Identifier: GPL-3.0-only

//! Batch and per-file admission checks
//!
//! Count and aggregate size are checked for the whole batch (all or nothing)
//! through store reservations. Type and size are checked per file here and
//! only reject the offending file.

use crate::config::BatchConstraints;
use crate::errors::IngestError;
use crate::media::IncomingFile;

/// Per-file validator built from the batch constraints
pub struct FileValidator<'a> {
    constraints: &'a BatchConstraints,
}

impl<'a> FileValidator<'a> {
    pub fn new(constraints: &'a BatchConstraints) -> Self {
        Self { constraints }
    }

    /// Validate one file: type first, then size
    pub fn validate(&self, file: &IncomingFile) -> Result<(), IngestError> {
        self.validate_type(file)?;
        self.validate_size(file)
    }

    /// Declared type must match an accepted pattern
    pub fn validate_type(&self, file: &IncomingFile) -> Result<(), IngestError> {
        if !self.constraints.accepts(&file.content_type) {
            return Err(IngestError::InvalidType {
                name: file.name.clone(),
                content_type: file.content_type.clone(),
            });
        }
        Ok(())
    }

    /// File must not exceed the single-file cap
    pub fn validate_size(&self, file: &IncomingFile) -> Result<(), IngestError> {
        let max = self.constraints.max_single_file_bytes;
        if file.size() > max {
            return Err(IngestError::FileTooLarge {
                name: file.name.clone(),
                size: file.size(),
                max,
            });
        }
        Ok(())
    }
}

/// Combined declared size of a batch
pub fn batch_bytes(files: &[IncomingFile]) -> u64 {
    files.iter().map(IncomingFile::size).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaOrigin;

    fn file(name: &str, content_type: &str, size: usize) -> IncomingFile {
        IncomingFile::new(name, content_type, vec![0u8; size], MediaOrigin::Picked)
    }

    #[test]
    fn test_type_checked_before_size() {
        let constraints = BatchConstraints {
            max_single_file_bytes: 4,
            max_total_bytes: 100,
            ..BatchConstraints::default()
        };
        let validator = FileValidator::new(&constraints);

        assert!(validator.validate(&file("a.png", "image/png", 4)).is_ok());
        assert!(matches!(
            validator.validate(&file("b.gif", "image/gif", 10)),
            Err(IngestError::InvalidType { .. })
        ));
        assert!(matches!(
            validator.validate(&file("c.mp4", "video/mp4", 5)),
            Err(IngestError::FileTooLarge { size: 5, max: 4, .. })
        ));
    }

    #[test]
    fn test_batch_bytes() {
        assert_eq!(batch_bytes(&[file("a", "x/y", 3), file("b", "x/y", 4)]), 7);
        assert_eq!(batch_bytes(&[]), 0);
    }
}
