//! Row shapes as stored by the backends (snake_case columns) and their
//! conversion to and from the external `Product` record.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{
    HandlingTime, ListingStatus, Product, ProductPatch, SalesMode, ShippingPayer,
};

/// `products` row as returned by the hosted REST backend. Every column except
/// the id may be null on older rows; missing values fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub salesmode: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closing_ymd: Option<NaiveDate>,
    #[serde(default)]
    pub closing_time: Option<i64>,
    #[serde(default)]
    pub shipping: Option<String>,
    #[serde(default)]
    pub shipschedule: Option<String>,
    #[serde(default)]
    pub loc_cd: Option<String>,
    #[serde(default)]
    pub ship_method: Option<String>,
}

impl ProductRow {
    pub fn from_product(p: &Product) -> Self {
        Self {
            id: p.id,
            name: Some(p.name.clone()),
            price: Some(p.price as f64),
            condition: Some(p.condition.clone()),
            description: Some(p.description.clone()),
            salesmode: Some(p.salesmode.as_str().to_string()),
            status: Some(p.status.as_str().to_string()),
            images: Some(p.images.clone()),
            updated_at: Some(p.updated_at),
            closing_ymd: p.closing_ymd,
            closing_time: p.closing_time.map(i64::from),
            shipping: p.shipping.map(|s| s.as_str().to_string()),
            shipschedule: p.shipschedule.map(|s| s.code().to_string()),
            loc_cd: p.loc_cd.clone(),
            ship_method: p.ship_method.clone(),
        }
    }

    pub fn into_product(self) -> Product {
        Product {
            id: self.id,
            name: self.name.unwrap_or_default(),
            price: self.price.filter(|v| v.is_finite() && *v > 0.0).map_or(0, |v| v as u64),
            condition: self.condition.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            salesmode: self
                .salesmode
                .as_deref()
                .and_then(SalesMode::parse)
                .unwrap_or_default(),
            status: self
                .status
                .as_deref()
                .and_then(ListingStatus::parse)
                .unwrap_or_default(),
            images: self.images.unwrap_or_default(),
            updated_at: self.updated_at.unwrap_or_else(Utc::now),
            closing_ymd: self.closing_ymd,
            closing_time: self
                .closing_time
                .and_then(|h| u8::try_from(h).ok())
                .filter(|h| *h <= 23),
            shipping: self.shipping.as_deref().and_then(ShippingPayer::parse),
            shipschedule: self.shipschedule.as_deref().and_then(HandlingTime::from_code),
            loc_cd: self.loc_cd.filter(|s| !s.is_empty()),
            ship_method: self.ship_method.filter(|s| !s.is_empty()),
        }
    }
}

/// Column/value pairs for a partial update. Only fields present in the patch appear.
pub fn patch_columns(patch: &ProductPatch) -> serde_json::Map<String, serde_json::Value> {
    use serde_json::Value;

    let mut row = serde_json::Map::new();
    if let Some(v) = &patch.name {
        row.insert("name".into(), Value::from(v.clone()));
    }
    if let Some(v) = patch.price {
        row.insert("price".into(), Value::from(v));
    }
    if let Some(v) = &patch.condition {
        row.insert("condition".into(), Value::from(v.clone()));
    }
    if let Some(v) = &patch.description {
        row.insert("description".into(), Value::from(v.clone()));
    }
    if let Some(v) = patch.salesmode {
        row.insert("salesmode".into(), Value::from(v.as_str()));
    }
    if let Some(v) = patch.status {
        row.insert("status".into(), Value::from(v.as_str()));
    }
    if let Some(v) = &patch.images {
        row.insert("images".into(), Value::from(v.clone()));
    }
    if let Some(v) = patch.closing_ymd {
        row.insert("closing_ymd".into(), Value::from(v.format("%Y-%m-%d").to_string()));
    }
    if let Some(v) = patch.closing_time {
        row.insert("closing_time".into(), Value::from(v));
    }
    if let Some(v) = patch.shipping {
        row.insert("shipping".into(), Value::from(v.as_str()));
    }
    if let Some(v) = patch.shipschedule {
        row.insert("shipschedule".into(), Value::from(v.code()));
    }
    if let Some(v) = &patch.loc_cd {
        row.insert("loc_cd".into(), Value::from(v.clone()));
    }
    if let Some(v) = &patch.ship_method {
        row.insert("ship_method".into(), Value::from(v.clone()));
    }
    if let Some(v) = patch.updated_at {
        row.insert("updated_at".into(), Value::from(v.to_rfc3339()));
    }
    row
}

/// `products` row in the local SQLite schema (`migrations/`). Images are kept
/// as a JSON array in a text column.
#[derive(Debug, sqlx::FromRow)]
pub struct StoredProductRow {
    pub id: String,
    pub name: String,
    pub price: i64,
    pub condition: String,
    pub description: String,
    pub salesmode: String,
    pub status: String,
    pub images: String,
    pub updated_at: String,
    pub closing_ymd: Option<String>,
    pub closing_time: Option<i64>,
    pub shipping: Option<String>,
    pub shipschedule: Option<String>,
    pub loc_cd: Option<String>,
    pub ship_method: Option<String>,
}

impl StoredProductRow {
    /// Rows that no longer parse (bad id, bad image JSON) are reported as `None`.
    pub fn into_product(self) -> Option<Product> {
        let row = ProductRow {
            id: Uuid::parse_str(&self.id).ok()?,
            name: Some(self.name),
            price: Some(self.price as f64),
            condition: Some(self.condition),
            description: Some(self.description),
            salesmode: Some(self.salesmode),
            status: Some(self.status),
            images: Some(serde_json::from_str(&self.images).ok()?),
            updated_at: DateTime::parse_from_rfc3339(&self.updated_at)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            closing_ymd: self
                .closing_ymd
                .and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            closing_time: self.closing_time,
            shipping: self.shipping,
            shipschedule: self.shipschedule,
            loc_cd: self.loc_cd,
            ship_method: self.ship_method,
        };
        Some(row.into_product())
    }
}
