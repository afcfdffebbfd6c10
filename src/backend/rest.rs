use std::time::Duration;

use reqwest::{RequestBuilder, Response};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::backend::models::{patch_columns, ProductRow};
use crate::config::{HTTP_TIMEOUT_SECS, PRODUCTS_TABLE};
use crate::error::{AppError, Result};
use crate::images;
use crate::types::{ListingStatus, Product, ProductPatch};

/// Hosted backend: a PostgREST table for records plus an object-storage bucket
/// that hands out public URLs (Supabase-compatible endpoints).
pub struct RestBackend {
    client: reqwest::Client,
    base: Url,
    base_url: String,
    anon_key: String,
    bucket: String,
}

impl RestBackend {
    pub fn new(base_url: &str, anon_key: &str, bucket: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        let base = Url::parse(base_url)
            .map_err(|e| AppError::Config(format!("invalid backend URL '{base_url}': {e}")))?;
        Ok(Self {
            client,
            base,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Storage path of one of this bucket's public URLs.
    pub fn object_path(&self, public_url: &str) -> Option<String> {
        images::object_path_from_public_url(public_url, &self.base, &self.bucket)
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, PRODUCTS_TABLE)
    }

    pub fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    /// All records, optionally filtered by status, newest first.
    pub async fn list(&self, status: Option<ListingStatus>) -> Result<Vec<Product>> {
        let mut query = vec![
            ("select", "*".to_string()),
            ("order", "updated_at.desc".to_string()),
        ];
        if let Some(s) = status {
            query.push(("status", format!("eq.{}", s.as_str())));
        }

        let resp = self
            .authed(self.client.get(self.table_url()))
            .query(&query)
            .send()
            .await?;
        let rows: Vec<ProductRow> = check(resp).await?.json().await?;
        debug!(count = rows.len(), "fetched product rows");
        Ok(rows.into_iter().map(ProductRow::into_product).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Product>> {
        let resp = self
            .authed(self.client.get(self.table_url()))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{id}"))])
            .send()
            .await?;
        let rows: Vec<ProductRow> = check(resp).await?.json().await?;
        Ok(rows.into_iter().next().map(ProductRow::into_product))
    }

    pub async fn insert(&self, products: &[Product]) -> Result<()> {
        if products.is_empty() {
            return Ok(());
        }
        let rows: Vec<ProductRow> = products.iter().map(ProductRow::from_product).collect();
        let resp = self
            .authed(self.client.post(self.table_url()))
            .header("Prefer", "return=minimal")
            .json(&rows)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Applies a partial update and returns the stored record.
    pub async fn update(&self, id: Uuid, patch: &ProductPatch) -> Result<Product> {
        let columns = patch_columns(patch);
        if columns.is_empty() {
            return self
                .get(id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("product {id}")));
        }
        let resp = self
            .authed(self.client.patch(self.table_url()))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&columns)
            .send()
            .await?;
        let rows: Vec<ProductRow> = check(resp).await?.json().await?;
        rows.into_iter()
            .next()
            .map(ProductRow::into_product)
            .ok_or_else(|| AppError::NotFound(format!("product {id}")))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let resp = self
            .authed(self.client.delete(self.table_url()))
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    /// Stores an object under `path` (no upsert) and returns its public URL.
    pub async fn upload_object(&self, path: &str, content_type: &str, bytes: Vec<u8>) -> Result<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path);
        let resp = self
            .authed(self.client.post(url))
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        check(resp).await?;
        Ok(self.public_url(path))
    }

    pub async fn delete_object(&self, path: &str) -> Result<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let resp = self
            .authed(self.client.delete(url))
            .json(&serde_json::json!({ "prefixes": [path] }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

/// Turns a non-success response into `AppError::Upstream`, keeping the
/// backend's own message when it sent one.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = upstream_message(&body).unwrap_or_else(|| {
        if body.is_empty() {
            status.to_string()
        } else {
            body.clone()
        }
    });
    warn!(status = status.as_u16(), "backend request failed: {message}");
    Err(AppError::Upstream { status: status.as_u16(), message })
}

fn upstream_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "error", "msg"]
        .iter()
        .find_map(|k| v.get(*k).and_then(|m| m.as_str()))
        .map(str::to_string)
}
