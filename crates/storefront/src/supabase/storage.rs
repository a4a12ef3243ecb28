//! Storage uploads and public URLs.

use reqwest::Method;
use reqwest::header::CONTENT_TYPE;
use tracing::instrument;
use url::Url;

use super::{SupabaseClient, SupabaseError};

impl SupabaseClient {
    /// Upload `bytes` to `bucket/path`. With `upsert` an existing object is replaced.
    ///
    /// Returns the object's public URL.
    ///
    /// # Errors
    ///
    /// Returns `SupabaseError::Conflict` if the object exists and `upsert`
    /// is false, or another error if the request fails.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        upsert: bool,
    ) -> Result<Url, SupabaseError> {
        let url = self.object_url("storage/v1/object/", bucket, path)?;
        self.send(
            self.request(Method::POST, url)
                .header(CONTENT_TYPE, content_type)
                .header("x-upsert", if upsert { "true" } else { "false" })
                .header("cache-control", "max-age=3600")
                .body(bytes),
        )
        .await?;
        self.public_url(bucket, path)
    }

    /// Public URL of an object in a public bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket or path do not form a valid URL.
    pub fn public_url(&self, bucket: &str, path: &str) -> Result<Url, SupabaseError> {
        self.object_url("storage/v1/object/public/", bucket, path)
    }

    fn object_url(&self, prefix: &str, bucket: &str, path: &str) -> Result<Url, SupabaseError> {
        let mut url = self.endpoint(prefix)?;
        url.path_segments_mut()
            .map_err(|()| SupabaseError::InvalidRequest("base URL cannot hold a path".into()))?
            .pop_if_empty()
            .push(bucket)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}
