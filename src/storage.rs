use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use std::path::Path;

use crate::models::Bucket;

const DEFAULT_EXTENSION: &str = "jpg";

#[derive(Deserialize)]
struct StorageErrorBody {
    message: String,
}

#[derive(Serialize)]
struct RemoveBody<'a> {
    prefixes: [&'a str; 1],
}

/// Client for the hosted object store that holds uploaded photos.
pub struct StorageClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl StorageClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        Ok(HeaderMap::from_iter([
            (header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", self.api_key))?),
            (HeaderName::from_static("apikey"), HeaderValue::from_str(&self.api_key)?),
        ]))
    }

    /// Where an uploaded object can be fetched without credentials.
    pub fn public_url(&self, bucket: Bucket, path: &str) -> String {
        format!("{}/storage/v1/object/public/{bucket}/{path}", self.base_url)
    }

    /// Uploads the image at `file` into `bucket` under the user's folder.
    ///
    /// Never overwrites an existing object. Returns the public URL of the upload.
    pub async fn upload(&self, file: &Path, bucket: Bucket, user_id: i64) -> Result<String> {
        log::info!("[upload] Uploading {} to bucket {bucket}", file.display());

        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("Could not read photo: {}", file.display()))?;

        let extension = file_extension(file);
        let path = object_name(user_id, &extension, chrono::Utc::now().timestamp_millis(), rand::random());

        let mut headers = self.headers()?;
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_str(&format!("image/{extension}"))?);
        headers.insert(HeaderName::from_static("x-upsert"), HeaderValue::from_static("false"));

        let response = self.client
            .post(format!("{}/storage/v1/object/{bucket}/{path}", self.base_url))
            .headers(headers)
            .body(bytes)
            .send()
            .await
            .inspect_err(|err| log::error!("[upload] Error uploading image: {err}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StorageErrorBody>()
                .await
                .map_or_else(|_| status.to_string(), |body| body.message);
            log::error!("[upload] Error uploading image: {message}");
            return Err(anyhow!("Upload to {bucket} failed ({status}): {message}"));
        }

        let url = self.public_url(bucket, &path);
        log::info!("[upload] Image uploaded successfully: {url}");
        Ok(url)
    }

    /// Deletes the object behind a public `url` from `bucket`.
    ///
    /// A URL that doesn't point into `bucket` is logged and ignored.
    pub async fn delete(&self, url: &str, bucket: Bucket) -> Result<()> {
        let Some(path) = object_path(url, bucket) else {
            log::error!("[delete] Invalid URL format: {url}");
            return Ok(());
        };

        let response = self.client
            .delete(format!("{}/storage/v1/object/{bucket}", self.base_url))
            .headers(self.headers()?)
            .json(&RemoveBody { prefixes: [path] })
            .send()
            .await
            .inspect_err(|err| log::error!("[delete] Error deleting image: {err}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .json::<StorageErrorBody>()
                .await
                .map_or_else(|_| status.to_string(), |body| body.message);
            log::error!("[delete] Error deleting image: {message}");
            return Err(anyhow!("Deleting from {bucket} failed ({status}): {message}"));
        }

        log::info!("[delete] Image deleted successfully: {path}");
        Ok(())
    }
}

/// Lowercased extension of `file`, or `jpg` if it has none.
fn file_extension(file: &Path) -> String {
    file.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .unwrap_or(DEFAULT_EXTENSION)
        .to_ascii_lowercase()
}

/// `<user_id>/<millis>-<nonce>.<extension>`
pub fn object_name(user_id: i64, extension: &str, millis: i64, nonce: u16) -> String {
    format!("{user_id}/{millis}-{nonce:04x}.{extension}")
}

/// The object path inside `bucket` that a public URL refers to.
pub fn object_path(url: &str, bucket: Bucket) -> Option<&str> {
    url.split_once(&format!("/{bucket}/"))
        .map(|(_, path)| path)
        .filter(|path| !path.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_names_live_in_the_user_folder() {
        assert_eq!(object_name(42, "png", 1_700_000_000_000, 0xbeef), "42/1700000000000-beef.png");
        assert_eq!(object_name(7, "jpg", 5, 1), "7/5-0001.jpg");
    }

    #[test]
    fn extension_defaults_to_jpg() {
        assert_eq!(file_extension(Path::new("photos/couch.png")), "png");
        assert_eq!(file_extension(Path::new("photos/COUCH.PNG")), "png");
        assert_eq!(file_extension(Path::new("photos/couch")), "jpg");
    }

    #[test]
    fn public_urls_point_into_the_bucket() {
        let client = StorageClient::new("https://store.example.com/", "key");
        let url = client.public_url(Bucket::HazardPhotos, "42/1-0001.jpg");

        assert_eq!(url, "https://store.example.com/storage/v1/object/public/hazard-photos/42/1-0001.jpg");
        assert_eq!(object_path(&url, Bucket::HazardPhotos), Some("42/1-0001.jpg"));
    }

    #[test]
    fn foreign_urls_have_no_object_path() {
        let url = "https://store.example.com/storage/v1/object/public/avatars/42/1-0001.jpg";
        assert_eq!(object_path(url, Bucket::PlantPhotos), None);
        assert_eq!(object_path("https://store.example.com/plant-photos/", Bucket::PlantPhotos), None);
    }
}
