//! Brand catalogue and bucket access.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;

use super::SupabaseClient;
use crate::backend::ImageStorage;
use crate::error::BackendError;
use crate::models::{Brand, StorageObject};

const BRAND_COLUMNS: &str = "id,brand_name,brand_normalized,logo_url,is_active,company_id";
const LIST_LIMIT: u32 = 1000;

#[derive(Deserialize)]
struct BucketRow {
    name: String,
}

#[derive(Deserialize)]
struct SignedUrl {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Percent-encode each segment of an object path, keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ImageStorage for SupabaseClient {
    async fn list_brands(&self, company_id: &str) -> Result<Vec<Brand>, BackendError> {
        let request = self
            .request(Method::GET, "/rest/v1/brands")
            .query(&[
                ("select", BRAND_COLUMNS.to_string()),
                ("is_active", "eq.true".to_string()),
                ("company_id", format!("eq.{}", company_id)),
                ("order", "brand_name.asc".to_string()),
            ]);
        self.send_json(request).await
    }

    async fn list_buckets(&self) -> Result<Vec<String>, BackendError> {
        let request = self.request(Method::GET, "/storage/v1/bucket");
        let rows: Vec<BucketRow> = self.send_json(request).await?;
        Ok(rows.into_iter().map(|b| b.name).collect())
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<StorageObject>, BackendError> {
        let path = format!("/storage/v1/object/list/{}", urlencoding::encode(bucket));
        let request = self.request(Method::POST, &path).json(&serde_json::json!({
            "prefix": "",
            "limit": LIST_LIMIT,
            "offset": 0,
            "sortBy": { "column": "created_at", "order": "desc" },
        }));
        self.send_json(request).await
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.url(),
            urlencoding::encode(bucket),
            encode_path(path)
        )
    }

    async fn signed_url(
        &self,
        bucket: &str,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, BackendError> {
        let endpoint = format!(
            "/storage/v1/object/sign/{}/{}",
            urlencoding::encode(bucket),
            encode_path(path)
        );
        let request = self
            .request(Method::POST, &endpoint)
            .json(&serde_json::json!({ "expiresIn": expires_in_secs }));
        let signed: SignedUrl = self.send_json(request).await?;
        Ok(format!("{}/storage/v1{}", self.url(), signed.signed_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_url_encodes_bucket_and_path() {
        let client = SupabaseClient::new("customer", "https://x.example", "key").unwrap();
        assert_eq!(
            client.public_url("My Brand", "spring 2025/hero.jpg"),
            "https://x.example/storage/v1/object/public/My%20Brand/spring%202025/hero.jpg"
        );
    }
}
