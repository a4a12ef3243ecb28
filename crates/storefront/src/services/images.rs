//! Uploaded image files.

use super::ServiceError;

/// An image received from a multipart form.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl ImageUpload {
    #[must_use]
    pub fn new(file_name: Option<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name,
            content_type: content_type.into(),
            bytes,
        }
    }

    /// Reject empty files, non-images and files above `max_bytes`.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Invalid` or `ServiceError::TooLarge`.
    pub fn validate(&self, max_bytes: usize) -> Result<(), ServiceError> {
        if self.bytes.is_empty() {
            return Err(ServiceError::Invalid("uploaded file is empty".into()));
        }
        if !self.content_type.starts_with("image/") {
            return Err(ServiceError::Invalid(format!(
                "expected an image, got {}",
                self.content_type
            )));
        }
        if self.bytes.len() > max_bytes {
            return Err(ServiceError::TooLarge {
                size: self.bytes.len(),
                max: max_bytes,
            });
        }
        Ok(())
    }
}

/// Validate every upload in `uploads`.
///
/// # Errors
///
/// Returns the first validation failure.
pub fn validate_all<'a, I>(uploads: I, max_bytes: usize) -> Result<(), ServiceError>
where
    I: IntoIterator<Item = &'a ImageUpload>,
{
    uploads
        .into_iter()
        .try_for_each(|upload| upload.validate(max_bytes))
}
