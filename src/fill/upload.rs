use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{HTTP_TIMEOUT_SECS, MAX_IMAGES_PER_PRODUCT};
use crate::error::{AppError, Result};
use crate::images::{is_network_url, kind_from_url};
use crate::page::DroppedFile;

/// Where image bytes come from during a fill.
#[allow(async_fn_in_trait)]
pub trait ImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Fetches images over HTTP(S).
#[derive(Clone)]
pub struct HttpImageSource {
    client: reqwest::Client,
}

impl HttpImageSource {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }
}

impl ImageSource for HttpImageSource {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: format!("image fetch failed for {url} (HTTP {})", status.as_u16()),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

/// Image refs a fill may use: the first ten entries, of which only network
/// URLs can be fetched.
pub fn fetchable_refs(images: &[String]) -> Vec<&str> {
    images
        .iter()
        .take(MAX_IMAGES_PER_PRODUCT)
        .map(String::as_str)
        .filter(|u| is_network_url(u))
        .collect()
}

/// Fetches what it can and turns it into files named `image{n}.{ext}`.
/// Failed fetches are skipped.
pub async fn prepare_files<S: ImageSource>(source: &S, images: &[String]) -> Vec<DroppedFile> {
    let mut files = Vec::new();
    for url in fetchable_refs(images) {
        match source.fetch(url).await {
            Ok(data) if !data.is_empty() => {
                let kind = kind_from_url(url);
                files.push(DroppedFile {
                    name: format!("image{}.{}", files.len() + 1, kind.ext),
                    mime: kind.mime.to_string(),
                    data,
                });
            }
            Ok(_) => debug!(%url, "skipping empty image"),
            Err(e) => warn!(%url, "skipping image: {e}"),
        }
    }
    files
}
