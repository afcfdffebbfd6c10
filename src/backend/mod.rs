//! Product persistence. The dashboard is the only writer; the assistant reads
//! through `GET /api/products`.

pub mod memory;
pub mod models;
pub mod rest;
pub mod sqlite;

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{BackendConfig, MAX_IMAGES_PER_PRODUCT};
use crate::error::{AppError, Result};
use crate::images;
use crate::types::{ListingStatus, Product, ProductPatch};

pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use sqlite::SqliteBackend;

/// Where records and image objects live.
pub enum Store {
    Rest(RestBackend),
    Sqlite(SqliteBackend),
    Memory(Arc<MemoryBackend>),
}

/// A configured store plus the URL scheme its images are published under.
pub struct Backend {
    store: Store,
    /// Base of locally served image URLs (`{base}/images/{path}`); unused for REST.
    public_base: Url,
}

impl Backend {
    /// Builds the backend named by the config. `None` when nothing is configured.
    pub async fn from_config(cfg: &BackendConfig, public_base_url: &str) -> Result<Option<Self>> {
        let store = match cfg {
            BackendConfig::Rest { url, anon_key, bucket } => {
                info!("Using hosted backend at {url} (bucket {bucket})");
                Store::Rest(RestBackend::new(url, anon_key, bucket)?)
            }
            BackendConfig::Sqlite { db_path } => Store::Sqlite(SqliteBackend::open(db_path).await?),
            BackendConfig::Memory => {
                warn!("Using in-memory backend; records are lost on restart");
                Store::Memory(MemoryBackend::new())
            }
            BackendConfig::None => return Ok(None),
        };
        Self::new(store, public_base_url).map(Some)
    }

    pub fn new(store: Store, public_base_url: &str) -> Result<Self> {
        let public_base = Url::parse(public_base_url).map_err(|e| {
            AppError::Config(format!("PUBLIC_BASE_URL '{public_base_url}' is not a URL: {e}"))
        })?;
        Ok(Self { store, public_base })
    }

    /// Records filtered by status (all when `None`), newest first.
    pub async fn list(&self, status: Option<ListingStatus>) -> Result<Vec<Product>> {
        match &self.store {
            Store::Rest(b) => b.list(status).await,
            Store::Sqlite(b) => b.list(status).await,
            Store::Memory(b) => Ok(b.list(status)),
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Product> {
        let found = match &self.store {
            Store::Rest(b) => b.get(id).await?,
            Store::Sqlite(b) => b.get(id).await?,
            Store::Memory(b) => b.get(id),
        };
        found.ok_or_else(|| AppError::NotFound(format!("product {id}")))
    }

    pub async fn insert(&self, products: &[Product]) -> Result<()> {
        for p in products {
            p.validate().map_err(AppError::BadRequest)?;
        }
        match &self.store {
            Store::Rest(b) => b.insert(products).await?,
            Store::Sqlite(b) => b.insert(products).await?,
            Store::Memory(b) => b.insert(products),
        }
        info!(count = products.len(), "inserted products");
        Ok(())
    }

    /// Inline edit. Stamps `updated_at` with the current time and checks the
    /// record invariants before writing.
    pub async fn update(&self, id: Uuid, patch: &ProductPatch) -> Result<Product> {
        let mut patch = patch.clone();
        patch.updated_at = Some(Utc::now());

        let mut current = self.get(id).await?;
        patch.apply(&mut current);
        current.validate().map_err(AppError::BadRequest)?;

        let stored = match &self.store {
            Store::Rest(b) => b.update(id, &patch).await?,
            Store::Sqlite(b) => {
                if !b.replace(&current).await? {
                    return Err(AppError::NotFound(format!("product {id}")));
                }
                current
            }
            Store::Memory(b) => {
                if !b.replace(&current) {
                    return Err(AppError::NotFound(format!("product {id}")));
                }
                current
            }
        };
        Ok(stored)
    }

    /// Deletes the record and any image objects this backend stored for it.
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let product = self.get(id).await?;
        match &self.store {
            Store::Rest(b) => b.delete(id).await?,
            Store::Sqlite(b) => b.delete(id).await?,
            Store::Memory(b) => b.delete(id),
        }
        for url in &product.images {
            self.remove_object(id, url).await;
        }
        info!(product_id = %id, "deleted product");
        Ok(())
    }

    /// Uploads an image and appends its public URL to the product.
    pub async fn attach_image(&self, id: Uuid, filename: &str, bytes: Vec<u8>) -> Result<Product> {
        if bytes.is_empty() {
            return Err(AppError::BadRequest("image body is empty".to_string()));
        }
        let product = self.get(id).await?;
        if product.images.len() >= MAX_IMAGES_PER_PRODUCT {
            return Err(AppError::BadRequest(format!(
                "product already has {MAX_IMAGES_PER_PRODUCT} images"
            )));
        }

        let (path, kind) = images::storage_path(id, filename);
        let url = match &self.store {
            Store::Rest(b) => b.upload_object(&path, kind.mime, bytes).await?,
            Store::Sqlite(b) => {
                b.put_object(&path, kind.mime, bytes).await?;
                self.local_url(&path)
            }
            Store::Memory(b) => {
                b.put_object(&path, kind.mime, bytes);
                self.local_url(&path)
            }
        };
        info!(product_id = %id, %url, "uploaded image");

        let mut images = product.images;
        images.push(url);
        self.update(id, &ProductPatch { images: Some(images), ..Default::default() })
            .await
    }

    /// Removes an image URL from the product, deleting the stored object when
    /// it belongs to this backend. Foreign URLs are only detached.
    pub async fn detach_image(&self, id: Uuid, url: &str) -> Result<Product> {
        let product = self.get(id).await?;
        if !product.images.iter().any(|u| u == url) {
            return Err(AppError::NotFound(format!("image {url} on product {id}")));
        }

        self.remove_object(id, url).await;

        let images: Vec<String> = product.images.into_iter().filter(|u| u != url).collect();
        self.update(id, &ProductPatch { images: Some(images), ..Default::default() })
            .await
    }

    /// Bulk upload: attaches the file to the product its name matches.
    pub async fn attach_by_filename(&self, filename: &str, bytes: Vec<u8>) -> Result<Product> {
        let key = images::filename_key(filename);
        let products = self.list(None).await?;
        let target = images::match_product(&products, &key).ok_or_else(|| {
            AppError::BadRequest(format!(
                "no product name matches '{key}' (name files like <product>-1.jpg)"
            ))
        })?;
        self.attach_image(target.id, filename, bytes).await
    }

    /// Bytes of a locally stored image. The hosted backend serves its own objects.
    pub async fn read_object(&self, path: &str) -> Result<Option<(String, Vec<u8>)>> {
        match &self.store {
            Store::Rest(_) => Ok(None),
            Store::Sqlite(b) => b.get_object(path).await,
            Store::Memory(b) => Ok(b.get_object(path)),
        }
    }

    fn local_url(&self, path: &str) -> String {
        format!("{}/images/{}", self.public_base.as_str().trim_end_matches('/'), path)
    }

    /// Deletes the stored object behind `url` if this backend owns it.
    /// Failures are logged; the record edit goes ahead.
    async fn remove_object(&self, id: Uuid, url: &str) {
        let Some(path) = self.object_path(url) else {
            return;
        };
        let removed = match &self.store {
            Store::Rest(b) => b.delete_object(&path).await,
            Store::Sqlite(b) => b.delete_object(&path).await,
            Store::Memory(b) => {
                b.delete_object(&path);
                Ok(())
            }
        };
        if let Err(e) = removed {
            warn!(product_id = %id, "could not delete stored image {path}: {e}");
        }
    }

    fn object_path(&self, url: &str) -> Option<String> {
        match &self.store {
            Store::Rest(b) => b.object_path(url),
            Store::Sqlite(_) | Store::Memory(_) => {
                images::object_path_under(url, &self.public_base, "images/")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_backend() -> (Backend, Arc<MemoryBackend>) {
        let mem = MemoryBackend::new();
        (
            Backend::new(Store::Memory(Arc::clone(&mem)), "http://localhost:3000/").unwrap(),
            mem,
        )
    }

    fn named(name: &str) -> Product {
        let mut p = Product::empty();
        p.name = name.to_string();
        p
    }

    #[tokio::test]
    async fn update_stamps_timestamp_and_validates() {
        let (backend, _) = memory_backend();
        let p = named("chair");
        let before = p.updated_at;
        backend.insert(std::slice::from_ref(&p)).await.unwrap();

        let updated = backend
            .update(p.id, &ProductPatch { price: Some(900), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.price, 900);
        assert!(updated.updated_at >= before);

        let err = backend
            .update(p.id, &ProductPatch { closing_time: Some(30), ..Default::default() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = backend.update(Uuid::new_v4(), &ProductPatch::default()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn attach_and_detach_local_image() {
        let (backend, mem) = memory_backend();
        let p = named("chair");
        backend.insert(std::slice::from_ref(&p)).await.unwrap();

        let with_image = backend.attach_image(p.id, "front.png", vec![9, 9]).await.unwrap();
        assert_eq!(with_image.images.len(), 1);
        let url = with_image.images[0].clone();
        assert!(url.starts_with(&format!("http://localhost:3000/images/{}/", p.id)));
        assert!(url.ends_with(".png"));

        let path = backend.object_path(&url).unwrap();
        assert_eq!(mem.get_object(&path).unwrap().0, "image/png");

        let without = backend.detach_image(p.id, &url).await.unwrap();
        assert!(without.images.is_empty());
        assert!(mem.get_object(&path).is_none());
    }

    #[tokio::test]
    async fn attach_rejects_eleventh_image() {
        let (backend, _) = memory_backend();
        let mut p = named("lamp");
        p.images = (0..10).map(|i| format!("https://cdn/{i}.jpg")).collect();
        backend.insert(std::slice::from_ref(&p)).await.unwrap();

        let err = backend.attach_image(p.id, "x.jpg", vec![1]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn foreign_urls_are_only_detached() {
        let (backend, _) = memory_backend();
        let mut p = named("lamp");
        p.images = vec!["https://elsewhere.example/a.jpg".to_string()];
        backend.insert(std::slice::from_ref(&p)).await.unwrap();

        assert!(backend.object_path(&p.images[0]).is_none());
        let after = backend.detach_image(p.id, "https://elsewhere.example/a.jpg").await.unwrap();
        assert!(after.images.is_empty());
    }

    #[tokio::test]
    async fn lookalike_local_urls_keep_their_objects() {
        let (backend, mem) = memory_backend();
        let p = named("lamp");
        backend.insert(std::slice::from_ref(&p)).await.unwrap();
        let stored = backend.attach_image(p.id, "a.jpg", vec![1]).await.unwrap();
        let path = backend.object_path(&stored.images[0]).unwrap();

        let other_port = format!("http://localhost:3001/images/{path}");
        assert!(backend.object_path(&other_port).is_none());
        backend
            .update(p.id, &ProductPatch { images: Some(vec![other_port.clone()]), ..Default::default() })
            .await
            .unwrap();
        backend.detach_image(p.id, &other_port).await.unwrap();
        assert!(mem.get_object(&path).is_some());

        assert!(Backend::new(Store::Memory(mem), "/dashboard").is_err());
    }

    #[tokio::test]
    async fn delete_removes_record_and_owned_objects() {
        let (backend, mem) = memory_backend();
        let mut p = named("desk");
        p.images = vec!["https://elsewhere.example/a.jpg".to_string()];
        backend.insert(std::slice::from_ref(&p)).await.unwrap();
        let stored = backend.attach_image(p.id, "top.jpg", vec![4]).await.unwrap();
        let path = backend.object_path(&stored.images[1]).unwrap();

        backend.delete(p.id).await.unwrap();
        assert!(mem.get(p.id).is_none());
        assert!(mem.get_object(&path).is_none());

        let err = backend.delete(p.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn bulk_upload_matches_by_filename() {
        let (backend, _) = memory_backend();
        let chair = named("木製の椅子");
        let desk = named("机");
        backend.insert(&[chair.clone(), desk.clone()]).await.unwrap();

        let updated = backend.attach_by_filename("椅子-2.jpg", vec![1, 2]).await.unwrap();
        assert_eq!(updated.id, chair.id);
        assert_eq!(updated.images.len(), 1);

        let err = backend.attach_by_filename("棚_1.jpg", vec![1]).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
