//! Multipart form reading for avatar and product image uploads.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;

use crate::error::AppError;
use crate::services::images::ImageUpload;

/// Images accepted in one request (featured image plus other images).
pub const MAX_IMAGES_PER_REQUEST: usize = 9;

/// Room for the text fields of a form.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Request body limit for routes accepting up to
/// [`MAX_IMAGES_PER_REQUEST`] images of `max_upload_bytes` each.
#[must_use]
pub const fn body_limit(max_upload_bytes: usize) -> usize {
    max_upload_bytes
        .saturating_mul(MAX_IMAGES_PER_REQUEST)
        .saturating_add(FORM_OVERHEAD_BYTES)
}

fn multipart_error(err: &MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body too large".into())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

/// A fully read multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    texts: HashMap<String, Vec<String>>,
    files: HashMap<String, Vec<ImageUpload>>,
}

impl UploadForm {
    /// Read every field. Fields with a file name are files; empty file
    /// inputs are skipped.
    ///
    /// # Errors
    ///
    /// 400 for malformed bodies or too many files, 413 when the body limit
    /// is exceeded.
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        let mut file_count = 0;

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| multipart_error(&e))?
        {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_owned);
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_owned();

            if file_name.is_some() {
                let bytes = field.bytes().await.map_err(|e| multipart_error(&e))?;
                if bytes.is_empty() {
                    continue;
                }
                file_count += 1;
                if file_count > MAX_IMAGES_PER_REQUEST {
                    return Err(AppError::BadRequest(format!(
                        "At most {MAX_IMAGES_PER_REQUEST} images per request"
                    )));
                }
                form.files.entry(name).or_default().push(ImageUpload::new(
                    file_name,
                    content_type,
                    bytes.to_vec(),
                ));
            } else {
                let text = field.text().await.map_err(|e| multipart_error(&e))?;
                form.texts.entry(name).or_default().push(text);
            }
        }
        Ok(form)
    }

    /// First value of a text field.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.texts
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Every value of a repeated text field.
    #[must_use]
    pub fn texts(&self, name: &str) -> &[String] {
        self.texts.get(name).map_or(&[], Vec::as_slice)
    }

    /// Remove and return the first file of a field.
    pub fn take_file(&mut self, name: &str) -> Option<ImageUpload> {
        let files = self.files.get_mut(name)?;
        (!files.is_empty()).then(|| files.remove(0))
    }

    /// Remove and return every file of a field.
    pub fn take_files(&mut self, name: &str) -> Vec<ImageUpload> {
        self.files.remove(name).unwrap_or_default()
    }
}
