use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MAX_IMAGES_PER_PRODUCT;

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// One marketplace listing as exchanged between the dashboard and the assistant.
/// Serialized in the external camelCase shape served by `GET /api/products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: u64,
    #[serde(default)]
    pub condition: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub salesmode: SalesMode,
    #[serde(default)]
    pub status: ListingStatus,
    #[serde(default)]
    pub images: Vec<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "closingYMD", default, skip_serializing_if = "Option::is_none")]
    pub closing_ymd: Option<NaiveDate>,
    /// Hour of day, 0-23.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_time: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingPayer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipschedule: Option<HandlingTime>,
    /// Prefecture code "1".."47", or "48" for overseas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc_cd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ship_method: Option<String>,
}

impl Product {
    /// A blank record with a fresh id, the way CSV rows and manual adds start out.
    pub fn empty() -> Self {
        Self {
            id: Uuid::new_v4(),
            name: String::new(),
            price: 0,
            condition: String::new(),
            description: String::new(),
            salesmode: SalesMode::Auction,
            status: ListingStatus::NotListed,
            images: Vec::new(),
            updated_at: Utc::now(),
            closing_ymd: None,
            closing_time: None,
            shipping: None,
            shipschedule: None,
            loc_cd: None,
            ship_method: None,
        }
    }

    /// Checks the record-level invariants. Returns a human-readable reason on violation.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.images.len() > MAX_IMAGES_PER_PRODUCT {
            return Err(format!(
                "a product can hold at most {MAX_IMAGES_PER_PRODUCT} images (got {})",
                self.images.len()
            ));
        }
        if let Some(hour) = self.closing_time {
            if hour > 23 {
                return Err(format!("closing hour must be 0-23 (got {hour})"));
            }
        }
        Ok(())
    }
}

/// Partial update for inline edits. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salesmode: Option<SalesMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(rename = "closingYMD", skip_serializing_if = "Option::is_none")]
    pub closing_ymd: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_time: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<ShippingPayer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipschedule: Option<HandlingTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loc_cd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ship_method: Option<String>,
    /// Set by the dashboard on every edit; clients normally leave it out.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the patch onto an existing record in place.
    pub fn apply(&self, p: &mut Product) {
        if let Some(v) = &self.name {
            p.name = v.clone();
        }
        if let Some(v) = self.price {
            p.price = v;
        }
        if let Some(v) = &self.condition {
            p.condition = v.clone();
        }
        if let Some(v) = &self.description {
            p.description = v.clone();
        }
        if let Some(v) = self.salesmode {
            p.salesmode = v;
        }
        if let Some(v) = self.status {
            p.status = v;
        }
        if let Some(v) = &self.images {
            p.images = v.clone();
        }
        if let Some(v) = self.closing_ymd {
            p.closing_ymd = Some(v);
        }
        if let Some(v) = self.closing_time {
            p.closing_time = Some(v);
        }
        if let Some(v) = self.shipping {
            p.shipping = Some(v);
        }
        if let Some(v) = self.shipschedule {
            p.shipschedule = Some(v);
        }
        if let Some(v) = &self.loc_cd {
            p.loc_cd = Some(v.clone());
        }
        if let Some(v) = &self.ship_method {
            p.ship_method = Some(v.clone());
        }
        if let Some(v) = self.updated_at {
            p.updated_at = v;
        }
    }
}

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    #[default]
    NotListed,
    Listed,
}

impl ListingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ListingStatus::NotListed => "not_listed",
            ListingStatus::Listed => "listed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "not_listed" => Some(ListingStatus::NotListed),
            "listed" => Some(ListingStatus::Listed),
            _ => None,
        }
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Auction vs. fixed price. Decides which price input the host page shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalesMode {
    #[default]
    Auction,
    #[serde(rename = "buynow")]
    BuyNow,
}

impl SalesMode {
    /// Radio value used by the host page.
    pub fn as_str(self) -> &'static str {
        match self {
            SalesMode::Auction => "auction",
            SalesMode::BuyNow => "buynow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auction" => Some(SalesMode::Auction),
            "buynow" => Some(SalesMode::BuyNow),
            _ => None,
        }
    }
}

impl std::fmt::Display for SalesMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShippingPayer {
    Seller,
    Buyer,
}

impl ShippingPayer {
    pub fn as_str(self) -> &'static str {
        match self {
            ShippingPayer::Seller => "seller",
            ShippingPayer::Buyer => "buyer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "seller" => Some(ShippingPayer::Seller),
            "buyer" => Some(ShippingPayer::Buyer),
            _ => None,
        }
    }
}

/// Handling-time bucket. The host page encodes the buckets as "1", "7" and "2".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandlingTime {
    /// 1-2 days
    #[serde(rename = "1")]
    OneToTwoDays,
    /// 2-3 days
    #[serde(rename = "7")]
    TwoToThreeDays,
    /// 3-7 days
    #[serde(rename = "2")]
    ThreeToSevenDays,
}

impl HandlingTime {
    pub fn code(self) -> &'static str {
        match self {
            HandlingTime::OneToTwoDays => "1",
            HandlingTime::TwoToThreeDays => "7",
            HandlingTime::ThreeToSevenDays => "2",
        }
    }

    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "1" => Some(HandlingTime::OneToTwoDays),
            "7" => Some(HandlingTime::TwoToThreeDays),
            "2" => Some(HandlingTime::ThreeToSevenDays),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Fill report
// ---------------------------------------------------------------------------

/// Semantic host-page fields the filler attempts, in attempt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormField {
    SalesMode,
    Name,
    Price,
    Description,
    Condition,
    ClosingDate,
    ClosingHour,
    ShippingPayer,
    HandlingTime,
    Region,
    ShipMethod,
    Images,
}

impl FormField {
    /// Label shown to the user in fill feedback.
    pub fn label(self) -> &'static str {
        match self {
            FormField::SalesMode => "sales mode",
            FormField::Name => "name",
            FormField::Price => "price",
            FormField::Description => "description",
            FormField::Condition => "condition",
            FormField::ClosingDate => "closing date",
            FormField::ClosingHour => "closing hour",
            FormField::ShippingPayer => "shipping payer",
            FormField::HandlingTime => "handling time",
            FormField::Region => "region",
            FormField::ShipMethod => "shipping method",
            FormField::Images => "images",
        }
    }
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Outcome of one fill pass: which fields were written and which were not.
/// Used for user feedback only; nothing retries off it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillReport {
    pub filled: Vec<String>,
    pub failed: Vec<String>,
}

impl FillReport {
    /// Records one attempt. A field is recorded once; a later outcome for the
    /// same field replaces the earlier one so the two lists stay disjoint.
    pub fn record(&mut self, field: FormField, ok: bool) {
        let label = field.label().to_string();
        self.filled.retain(|f| *f != label);
        self.failed.retain(|f| *f != label);
        if ok {
            self.filled.push(label);
        } else {
            self.failed.push(label);
        }
    }

    pub fn contains(&self, field: FormField) -> bool {
        let label = field.label();
        self.filled.iter().chain(self.failed.iter()).any(|f| f == label)
    }

    pub fn is_filled(&self, field: FormField) -> bool {
        self.filled.iter().any(|f| f == field.label())
    }

    pub fn is_failed(&self, field: FormField) -> bool {
        self.failed.iter().any(|f| f == field.label())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
