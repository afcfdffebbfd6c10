//! CSV import for the dashboard.
//!
//! Header driven: each product field accepts its internal name, a capitalized
//! variant, or the Japanese display name used by exported spreadsheets.
//! Unknown columns are ignored and blank cells fall back to per-field defaults.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use tracing::debug;

use crate::error::{AppError, Result};
use crate::types::{HandlingTime, ListingStatus, Product, SalesMode, ShippingPayer};

/// Header candidates per field, in lookup priority order.
const NAME: &[&str] = &["商品名", "name", "Name"];
const PRICE: &[&str] = &["価格", "price", "Price"];
const CONDITION: &[&str] = &["商品の状態", "condition", "Condition"];
const DESCRIPTION: &[&str] = &["説明", "description", "Description"];
const STATUS: &[&str] = &["ステータス", "status", "Status"];
const SALES_MODE: &[&str] = &["販売形式", "salesmode", "SalesMode"];
const CLOSING_DATE: &[&str] = &["終了日", "closingYMD", "ClosingYMD"];
const CLOSING_HOUR: &[&str] = &["終了時刻", "closingTime", "ClosingTime"];
const SHIPPING: &[&str] = &["送料負担", "shipping", "Shipping"];
const SCHEDULE: &[&str] = &["発送までの日数", "shipschedule", "Shipschedule"];
const REGION: &[&str] = &["発送元", "locCd", "LocCd"];
const SHIP_METHOD: &[&str] = &["配送方法", "shipMethod", "ShipMethod"];

/// Parses a CSV document into fresh `not_listed`-by-default products.
pub fn parse_products(bytes: &[u8]) -> Result<Vec<Product>> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| AppError::BadRequest("CSV must be UTF-8 encoded".to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let columns: HashMap<String, usize> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| (h.to_string(), i))
        .collect();
    if columns.is_empty() {
        return Err(AppError::BadRequest("CSV has no header row".to_string()));
    }

    let mut products = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let row = Row { columns: &columns, record: &record };
        products.push(product_from_row(&row));
    }

    debug!(rows = products.len(), "parsed CSV import");
    Ok(products)
}

struct Row<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a csv::StringRecord,
}

impl Row<'_> {
    /// First non-blank cell among the candidate headers.
    fn get(&self, keys: &[&str]) -> &str {
        keys.iter()
            .filter_map(|k| self.columns.get(*k))
            .filter_map(|&i| self.record.get(i))
            .map(str::trim)
            .find(|v| !v.is_empty())
            .unwrap_or("")
    }

    fn opt(&self, keys: &[&str]) -> Option<String> {
        Some(self.get(keys)).filter(|v| !v.is_empty()).map(str::to_string)
    }
}

fn product_from_row(row: &Row<'_>) -> Product {
    Product {
        name: row.get(NAME).to_string(),
        price: parse_price(row.get(PRICE)),
        condition: row.get(CONDITION).to_string(),
        description: row.get(DESCRIPTION).to_string(),
        salesmode: parse_sales_mode(row.get(SALES_MODE)),
        status: parse_status(row.get(STATUS)),
        closing_ymd: parse_date(row.get(CLOSING_DATE)),
        closing_time: parse_hour(row.get(CLOSING_HOUR)),
        shipping: Some(parse_shipping(row.get(SHIPPING))),
        shipschedule: Some(parse_schedule(row.get(SCHEDULE))),
        loc_cd: row.opt(REGION),
        ship_method: row.opt(SHIP_METHOD),
        updated_at: Utc::now(),
        ..Product::empty()
    }
}

/// Leading integer, ignoring thousands separators and a yen sign. Anything
/// unparsable or negative becomes 0.
fn parse_price(raw: &str) -> u64 {
    let cleaned: String = raw
        .trim()
        .trim_start_matches(['¥', '￥'])
        .trim_end_matches('円')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let digits: String = cleaned.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

fn parse_status(raw: &str) -> ListingStatus {
    match raw.to_lowercase().as_str() {
        "listed" | "出品済み" => ListingStatus::Listed,
        _ => ListingStatus::NotListed,
    }
}

fn parse_sales_mode(raw: &str) -> SalesMode {
    match raw.to_lowercase().as_str() {
        "buynow" | "fixed" | "フリマ" | "定額" | "フリマ（定額）" => SalesMode::BuyNow,
        _ => SalesMode::Auction,
    }
}

fn parse_shipping(raw: &str) -> ShippingPayer {
    match raw.to_lowercase().as_str() {
        "buyer" | "落札者" => ShippingPayer::Buyer,
        _ => ShippingPayer::Seller,
    }
}

fn parse_schedule(raw: &str) -> HandlingTime {
    match raw {
        "7" | "2〜3日" => HandlingTime::TwoToThreeDays,
        "2" | "3〜7日" => HandlingTime::ThreeToSevenDays,
        _ => HandlingTime::OneToTwoDays,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y/%m/%d"))
        .ok()
}

fn parse_hour(raw: &str) -> Option<u8> {
    raw.parse::<u8>().ok().filter(|h| *h <= 23)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
