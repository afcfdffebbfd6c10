use std::str::FromStr;

use chrono::SecondsFormat;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::models::StoredProductRow;
use crate::error::Result;
use crate::types::{ListingStatus, Product};

/// Local backend: records and image objects in one SQLite database.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    pub async fn open(db_path: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{db_path}"))?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database ready at {db_path}");
        Ok(Self { pool })
    }

    /// Throwaway database; a single connection so every query sees the same memory.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn list(&self, status: Option<ListingStatus>) -> Result<Vec<Product>> {
        let rows: Vec<StoredProductRow> = match status {
            Some(s) => {
                sqlx::query_as(
                    "SELECT * FROM products WHERE status = ? ORDER BY updated_at DESC",
                )
                .bind(s.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM products ORDER BY updated_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows.into_iter().filter_map(into_product_logged).collect())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Product>> {
        let row: Option<StoredProductRow> = sqlx::query_as("SELECT * FROM products WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(into_product_logged))
    }

    pub async fn insert(&self, products: &[Product]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for p in products {
            sqlx::query(
                r#"
                INSERT INTO products (
                    id, name, price, condition, description, salesmode, status, images,
                    updated_at, closing_ymd, closing_time, shipping, shipschedule, loc_cd, ship_method
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(p.id.to_string())
            .bind(&p.name)
            .bind(price_column(p.price))
            .bind(&p.condition)
            .bind(&p.description)
            .bind(p.salesmode.as_str())
            .bind(p.status.as_str())
            .bind(serde_json::to_string(&p.images)?)
            .bind(timestamp_column(p))
            .bind(p.closing_ymd.map(|d| d.format("%Y-%m-%d").to_string()))
            .bind(p.closing_time.map(i64::from))
            .bind(p.shipping.map(|s| s.as_str()))
            .bind(p.shipschedule.map(|s| s.code()))
            .bind(p.loc_cd.as_deref())
            .bind(p.ship_method.as_deref())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Overwrites every column of an existing record.
    pub async fn replace(&self, p: &Product) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?, price = ?, condition = ?, description = ?, salesmode = ?, status = ?,
                images = ?, updated_at = ?, closing_ymd = ?, closing_time = ?, shipping = ?,
                shipschedule = ?, loc_cd = ?, ship_method = ?
            WHERE id = ?
            "#,
        )
        .bind(&p.name)
        .bind(price_column(p.price))
        .bind(&p.condition)
        .bind(&p.description)
        .bind(p.salesmode.as_str())
        .bind(p.status.as_str())
        .bind(serde_json::to_string(&p.images)?)
        .bind(timestamp_column(p))
        .bind(p.closing_ymd.map(|d| d.format("%Y-%m-%d").to_string()))
        .bind(p.closing_time.map(i64::from))
        .bind(p.shipping.map(|s| s.as_str()))
        .bind(p.shipschedule.map(|s| s.code()))
        .bind(p.loc_cd.as_deref())
        .bind(p.ship_method.as_deref())
        .bind(p.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn put_object(&self, path: &str, content_type: &str, data: Vec<u8>) -> Result<()> {
        sqlx::query("INSERT INTO image_objects (path, content_type, data) VALUES (?, ?, ?)")
            .bind(path)
            .bind(content_type)
            .bind(data)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_object(&self, path: &str) -> Result<Option<(String, Vec<u8>)>> {
        let row = sqlx::query("SELECT content_type, data FROM image_objects WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(r) => Ok(Some((r.try_get("content_type")?, r.try_get("data")?))),
            None => Ok(None),
        }
    }

    pub async fn delete_object(&self, path: &str) -> Result<()> {
        sqlx::query("DELETE FROM image_objects WHERE path = ?")
            .bind(path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn into_product_logged(row: StoredProductRow) -> Option<Product> {
    let id = row.id.clone();
    let product = row.into_product();
    if product.is_none() {
        warn!(product_id = %id, "skipping unreadable product row");
    }
    product
}

fn price_column(price: u64) -> i64 {
    i64::try_from(price).unwrap_or(i64::MAX)
}

/// Fixed-width RFC 3339 so `ORDER BY updated_at` sorts chronologically.
fn timestamp_column(p: &Product) -> String {
    p.updated_at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::types::SalesMode;

    fn product(name: &str, status: ListingStatus, age_secs: i64) -> Product {
        let mut p = Product::empty();
        p.name = name.to_string();
        p.status = status;
        p.updated_at = Utc::now() - Duration::seconds(age_secs);
        p
    }

    #[tokio::test]
    async fn list_filters_by_status_newest_first() {
        let db = SqliteBackend::in_memory().await.unwrap();
        db.insert(&[
            product("old", ListingStatus::NotListed, 300),
            product("sold", ListingStatus::Listed, 10),
            product("new", ListingStatus::NotListed, 5),
        ])
        .await
        .unwrap();

        let unlisted = db.list(Some(ListingStatus::NotListed)).await.unwrap();
        let names: Vec<_> = unlisted.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["new", "old"]);

        assert_eq!(db.list(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn replace_round_trips_all_columns() {
        let db = SqliteBackend::in_memory().await.unwrap();
        let mut p = product("lamp", ListingStatus::NotListed, 0);
        db.insert(std::slice::from_ref(&p)).await.unwrap();

        p.salesmode = SalesMode::BuyNow;
        p.closing_time = Some(23);
        p.images = vec!["https://x/1.jpg".to_string()];
        assert!(db.replace(&p).await.unwrap());

        let stored = db.get(p.id).await.unwrap().unwrap();
        assert_eq!(stored, p);

        let mut missing = Product::empty();
        missing.name = "ghost".to_string();
        assert!(!db.replace(&missing).await.unwrap());
    }

    #[tokio::test]
    async fn objects_store_and_delete() {
        let db = SqliteBackend::in_memory().await.unwrap();
        db.put_object("p/1.jpg", "image/jpeg", vec![1, 2, 3]).await.unwrap();
        let (mime, data) = db.get_object("p/1.jpg").await.unwrap().unwrap();
        assert_eq!(mime, "image/jpeg");
        assert_eq!(data, vec![1, 2, 3]);

        db.delete_object("p/1.jpg").await.unwrap();
        assert!(db.get_object("p/1.jpg").await.unwrap().is_none());
    }
}
