use listing_assist::messaging::{Response, TransportError};
use listing_assist::page::ScannedElement;
use listing_assist::popup::{self, FetchError, Notice};
use listing_assist::types::Product;

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

/// What the right-hand pane shows.
#[derive(Debug, Clone, PartialEq)]
pub enum DetailView {
    /// Image URLs of the selected product.
    Images,
    /// Result of the last form scan.
    Scan { url: String, elements: Vec<ScannedElement> },
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub products: Vec<Product>,
    pub notice: Option<Notice>,
    pub detail: DetailView,
    pub browser_connected: bool,
    pub api_url: String,
}

impl AppState {
    pub fn new(api_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            products: Vec::new(),
            notice: None,
            detail: DetailView::Images,
            browser_connected: false,
            api_url,
        }
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let result = popup::fetch_products(client, &self.api_url).await;
        self.apply_fetch(result);
    }

    /// A failed fetch clears the list so stale records cannot be sent.
    pub fn apply_fetch(&mut self, result: Result<Vec<Product>, FetchError>) {
        self.notice = Some(popup::list_notice(&result));
        match result {
            Ok(products) => {
                self.products = products;
                self.status = ConnectionStatus::Connected;
            }
            Err(e) => {
                self.products.clear();
                self.status = ConnectionStatus::Error(e.to_string());
            }
        }
    }

    pub fn apply_delivery(&mut self, result: Result<Response, TransportError>) {
        self.notice = Some(popup::delivery_notice(&result));
        if let Ok(Response::Scanned { elements, url, .. }) = result {
            self.detail = DetailView::Scan { url, elements };
        }
    }

    pub fn product(&self, selected: Option<usize>) -> Option<&Product> {
        selected.and_then(|i| self.products.get(i))
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Cuts on character boundaries; product names are mostly multi-byte.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
