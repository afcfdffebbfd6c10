//! Assistant side of the dashboard API, plus the status lines it shows.

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::messaging::{Response, TransportError};
use crate::types::Product;

/// Shown when the helper could not be loaded into the listing tab.
pub const RELOAD_PAGE_MESSAGE: &str =
    "Could not load the helper on the listing page. Reload the listing page (F5), then select the product again.";

/// Shown when the resend after injecting still got no answer.
pub const RETRY_FAILED_MESSAGE: &str = "Filling the form failed. Reload the page and try again.";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cannot reach the dashboard API at {url}: {hint}")]
    Connect { url: String, hint: String },

    #[error("the dashboard API did not answer with JSON")]
    NotJson,

    /// 503 from the dashboard: it runs without a backend.
    #[error("{0}")]
    NotConfigured(String),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("unexpected response from the dashboard API")]
    NotArray,

    #[error("malformed product record: {0}")]
    Invalid(String),
}

const NOT_CONFIGURED_DEFAULT: &str = "The dashboard API is unavailable (no backend configured).";

/// `GET {api_url}/api/products`: unlisted products, newest first.
pub async fn fetch_products(client: &reqwest::Client, api_url: &str) -> Result<Vec<Product>, FetchError> {
    let base = api_url.trim_end_matches('/');
    let url = format!("{base}/api/products");

    let resp = client.get(&url).send().await.map_err(|e| {
        debug!(%url, "dashboard request failed: {e}");
        FetchError::Connect { url: url.clone(), hint: connect_hint(base).to_string() }
    })?;
    let status = resp.status();
    let text = resp.text().await.map_err(|e| FetchError::Connect {
        url: url.clone(),
        hint: e.to_string(),
    })?;

    let data: Option<Value> = if text.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str(&text).map_err(|_| FetchError::NotJson)?)
    };

    if !status.is_success() {
        let body_error = data
            .as_ref()
            .and_then(|d| d.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if status.as_u16() == 503 {
            let detail = body_error.unwrap_or_else(|| NOT_CONFIGURED_DEFAULT.to_string());
            return Err(FetchError::NotConfigured(detail));
        }
        return Err(FetchError::Status {
            status: status.as_u16(),
            message: body_error.unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        });
    }

    match data {
        Some(Value::Array(items)) => items
            .into_iter()
            .map(|v| serde_json::from_value::<Product>(v).map_err(|e| FetchError::Invalid(e.to_string())))
            .collect(),
        _ => Err(FetchError::NotArray),
    }
}

fn connect_hint(base: &str) -> &'static str {
    let local = Url::parse(base)
        .ok()
        .and_then(|u| u.host_str().map(|h| matches!(h, "localhost" | "127.0.0.1" | "[::1]")))
        .unwrap_or(false);
    if local {
        "check that the dashboard server is running"
    } else {
        "check the network and the API URL"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Info,
    Success,
    Error,
}

/// One status line for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub tone: Tone,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self { tone: Tone::Info, text: text.into() }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self { tone: Tone::Success, text: text.into() }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { tone: Tone::Error, text: text.into() }
    }
}

pub fn list_notice(result: &Result<Vec<Product>, FetchError>) -> Notice {
    match result {
        Ok(products) if products.is_empty() => Notice::info("no unlisted products"),
        Ok(products) => Notice::info(format!("{} unlisted products", products.len())),
        Err(e) => Notice::error(e.to_string()),
    }
}

/// The fill only goes to tabs on the host's listing pages: same origin as
/// `prefix`, with a path under the prefix path.
pub fn check_host_tab(url: Option<&str>, prefix: &str) -> Result<(), Notice> {
    let Some(url) = url else {
        return Err(Notice::error("cannot read the current tab"));
    };
    let on_host = match (Url::parse(url), Url::parse(prefix)) {
        (Ok(tab), Ok(host)) => tab.origin() == host.origin() && tab.path().starts_with(host.path()),
        _ => false,
    };
    if on_host {
        Ok(())
    } else {
        Err(Notice::error(
            "Open the listing page on the auction site, then select a product.",
        ))
    }
}

/// Maps the outcome of a delivered request to what the user sees.
pub fn delivery_notice(result: &Result<Response, TransportError>) -> Notice {
    match result {
        Ok(Response::Filled { report, .. }) => {
            if report.failed.is_empty() {
                Notice::success(format!("form filled ({} fields)", report.filled.len()))
            } else {
                Notice::success(format!(
                    "form filled ({} fields); not found: {}",
                    report.filled.len(),
                    report.failed.join(", ")
                ))
            }
        }
        Ok(Response::Scanned { elements, url, .. }) => {
            Notice::info(format!("{} form elements on {url}", elements.len()))
        }
        Ok(Response::Failed { error, .. }) => Notice::error(format!("error: {error}")),
        Err(TransportError::InjectFailed(e)) => {
            warn!("helper injection failed: {e}");
            Notice::error(RELOAD_PAGE_MESSAGE)
        }
        Err(TransportError::RetryFailed(e)) => {
            warn!("resend after injection failed: {e}");
            Notice::error(RETRY_FAILED_MESSAGE)
        }
        Err(e) => Notice::error(format!("send error: {e}")),
    }
}

pub fn display_name(product: &Product) -> &str {
    if product.name.trim().is_empty() {
        "(untitled)"
    } else {
        &product.name
    }
}

/// `¥12,800 · 目立った傷や汚れなし`
pub fn product_meta(product: &Product) -> String {
    let condition = if product.condition.trim().is_empty() { "—" } else { product.condition.as_str() };
    format!("¥{} · {condition}", group_thousands(product.price))
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
