use std::cmp::Reverse;
use std::sync::Arc;

use dashmap::DashMap;
use uuid::Uuid;

use crate::types::{ListingStatus, Product};

#[derive(Debug, Clone)]
struct StoredObject {
    content_type: String,
    data: Vec<u8>,
}

/// Process-local backend. Used for demos (`BACKEND=memory`) and route tests.
pub struct MemoryBackend {
    /// product id → record
    products: DashMap<Uuid, Product>,
    /// object path → image bytes
    objects: DashMap<String, StoredObject>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn list(&self, status: Option<ListingStatus>) -> Vec<Product> {
        let mut out: Vec<Product> = self
            .products
            .iter()
            .filter(|e| status.map_or(true, |s| e.value().status == s))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|p| Reverse(p.updated_at));
        out
    }

    pub fn get(&self, id: Uuid) -> Option<Product> {
        self.products.get(&id).map(|e| e.value().clone())
    }

    pub fn insert(&self, products: &[Product]) {
        for p in products {
            self.products.insert(p.id, p.clone());
        }
    }

    /// Overwrites an existing record. Returns false when the id is unknown.
    pub fn replace(&self, p: &Product) -> bool {
        match self.products.get_mut(&p.id) {
            Some(mut entry) => {
                *entry = p.clone();
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, id: Uuid) {
        self.products.remove(&id);
    }

    pub fn put_object(&self, path: &str, content_type: &str, data: Vec<u8>) {
        self.objects.insert(
            path.to_string(),
            StoredObject { content_type: content_type.to_string(), data },
        );
    }

    pub fn get_object(&self, path: &str) -> Option<(String, Vec<u8>)> {
        self.objects
            .get(path)
            .map(|o| (o.content_type.clone(), o.data.clone()))
    }

    pub fn delete_object(&self, path: &str) {
        self.objects.remove(path);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            products: DashMap::new(),
            objects: DashMap::new(),
        }
    }
}
