//! Request/response protocol between the assistant and the page-side handler.
//!
//! Two requests exist: `FILL_FORM { product }` and `SCAN_FORM {}`. The handler
//! never lets a page error escape; it answers `{ ok: false, error }` instead.
//! When the handler is not loaded in the tab, the sender injects it once and
//! resends after a short delay.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fill::{FillOptions, Filler, ImageSource};
use crate::page::{HostPage, ScannedElement};
use crate::types::{FillReport, Product};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    #[serde(rename = "FILL_FORM")]
    FillForm { product: Product },
    #[serde(rename = "SCAN_FORM")]
    ScanForm {},
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Filled { ok: bool, report: FillReport },
    Scanned { ok: bool, elements: Vec<ScannedElement>, url: String },
    Failed { ok: bool, error: String },
}

impl Response {
    pub fn filled(report: FillReport) -> Self {
        Response::Filled { ok: true, report }
    }

    pub fn scanned(elements: Vec<ScannedElement>, url: String) -> Self {
        Response::Scanned { ok: true, elements, url }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Response::Failed { ok: false, error: error.into() }
    }

    pub fn is_ok(&self) -> bool {
        match self {
            Response::Filled { ok, .. } | Response::Scanned { ok, .. } | Response::Failed { ok, .. } => *ok,
        }
    }
}

/// Page-side handler: owns the page and answers requests against it.
pub struct ContentScript<P, S> {
    page: P,
    images: S,
    options: FillOptions,
}

impl<P: HostPage, S: ImageSource> ContentScript<P, S> {
    pub fn new(page: P, images: S, options: FillOptions) -> Self {
        Self { page, images, options }
    }

    pub fn page(&self) -> &P {
        &self.page
    }

    pub fn page_mut(&mut self) -> &mut P {
        &mut self.page
    }

    pub fn into_page(self) -> P {
        self.page
    }

    pub async fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::FillForm { product } => {
                let mut filler = Filler::new(&mut self.page, &self.images, self.options.clone());
                match filler.fill(&product).await {
                    Ok(report) => Response::filled(report),
                    Err(e) => {
                        warn!(product_id = %product.id, "fill aborted: {e}");
                        Response::failed(e.to_string())
                    }
                }
            }
            Request::ScanForm {} => match self.scan().await {
                Ok((elements, url)) => Response::scanned(elements, url),
                Err(e) => {
                    warn!("scan failed: {e}");
                    Response::failed(e.to_string())
                }
            },
        }
    }

    /// Entry point for untyped messages; anything unrecognized gets an error reply.
    pub async fn handle_value(&mut self, raw: Value) -> Response {
        match serde_json::from_value::<Request>(raw) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                debug!("rejecting message: {e}");
                Response::failed("invalid message")
            }
        }
    }

    async fn scan(&self) -> crate::page::PageResult<(Vec<ScannedElement>, String)> {
        let elements = self.page.scan().await?;
        let url = self.page.url().await?;
        Ok((elements, url))
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    /// No handler is listening in the tab.
    #[error("receiving end does not exist")]
    ReceiverMissing,

    #[error("could not load the page helper: {0}")]
    InjectFailed(String),

    /// Still no answer after injecting and resending.
    #[error("no response after re-injecting the page helper: {0}")]
    RetryFailed(String),

    #[error("messaging error: {0}")]
    Channel(String),
}

/// How the assistant reaches the page-side handler.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&mut self, request: &Request) -> Result<Response, TransportError>;

    /// Loads the handler into the tab.
    async fn inject(&mut self) -> Result<(), TransportError>;
}

/// Sends once; on `ReceiverMissing` injects the handler, waits `delay`, and
/// sends exactly once more. Other errors are returned as they are.
pub async fn send_with_reinject<T: Transport>(
    transport: &mut T,
    request: &Request,
    delay: Duration,
) -> Result<Response, TransportError> {
    match transport.send(request).await {
        Err(TransportError::ReceiverMissing) => {
            info!("page helper missing, injecting and resending");
            transport.inject().await?;
            tokio::time::sleep(delay).await;
            transport
                .send(request)
                .await
                .map_err(|e| TransportError::RetryFailed(e.to_string()))
        }
        other => other,
    }
}

/// Transport that runs the handler in-process against a page. A page whose
/// helper is not loaded reports `ReceiverMissing`, like an unanswered message.
pub struct PageTransport<P, S> {
    script: ContentScript<P, S>,
}

impl<P: HostPage, S: ImageSource> PageTransport<P, S> {
    pub fn new(script: ContentScript<P, S>) -> Self {
        Self { script }
    }

    pub fn script(&self) -> &ContentScript<P, S> {
        &self.script
    }

    pub fn into_script(self) -> ContentScript<P, S> {
        self.script
    }
}

impl<P: HostPage, S: ImageSource> Transport for PageTransport<P, S> {
    async fn send(&mut self, request: &Request) -> Result<Response, TransportError> {
        let loaded = self
            .script
            .page()
            .helper_loaded()
            .await
            .map_err(|e| TransportError::Channel(e.to_string()))?;
        if !loaded {
            return Err(TransportError::ReceiverMissing);
        }
        Ok(self.script.handle(request.clone()).await)
    }

    async fn inject(&mut self) -> Result<(), TransportError> {
        self.script
            .page_mut()
            .install_helper()
            .await
            .map_err(|e| TransportError::InjectFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::fill::upload::tests::StubImages;
    use crate::page::memory::Element;
    use crate::page::MemoryPage;
    use crate::types::FormField;

    fn options() -> FillOptions {
        FillOptions { settle: Duration::ZERO, now: None }
    }

    fn title_page() -> MemoryPage {
        let mut page = MemoryPage::new("https://auctions.yahoo.co.jp/sell/jp/show/submit");
        page.add(Element::new("input").name("Title"));
        page
    }

    fn product() -> Product {
        let mut p = Product::empty();
        p.name = "椅子".to_string();
        p
    }

    #[test]
    fn wire_shapes() {
        let req = serde_json::to_value(Request::ScanForm {}).unwrap();
        assert_eq!(req, json!({ "type": "SCAN_FORM" }));

        let fill: Request = serde_json::from_value(json!({
            "type": "FILL_FORM",
            "product": serde_json::to_value(product()).unwrap(),
        }))
        .unwrap();
        assert!(matches!(fill, Request::FillForm { .. }));

        let resp = serde_json::to_value(Response::failed("boom")).unwrap();
        assert_eq!(resp, json!({ "ok": false, "error": "boom" }));

        let report = FillReport { filled: vec!["name".into()], failed: vec!["price".into()] };
        let resp = serde_json::to_value(Response::filled(report)).unwrap();
        assert_eq!(resp, json!({ "ok": true, "report": { "filled": ["name"], "failed": ["price"] } }));
    }

    #[tokio::test]
    async fn fill_request_returns_report() {
        let mut script = ContentScript::new(title_page(), StubImages::default(), options());
        let resp = script.handle(Request::FillForm { product: product() }).await;
        match resp {
            Response::Filled { ok, report } => {
                assert!(ok);
                assert!(report.is_filled(FormField::Name));
                assert!(report.is_failed(FormField::Price));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn page_errors_become_error_responses() {
        let page = MemoryPage::new("https://auctions.yahoo.co.jp/sell").broken();
        let mut script = ContentScript::new(page, StubImages::default(), options());

        let resp = script.handle(Request::FillForm { product: product() }).await;
        assert!(!resp.is_ok());
        assert!(matches!(resp, Response::Failed { ref error, .. } if error.contains("Cannot read")));

        let resp = script.handle(Request::ScanForm {}).await;
        assert!(!resp.is_ok());
    }

    #[tokio::test]
    async fn scan_request_lists_elements_and_url() {
        let mut script = ContentScript::new(title_page(), StubImages::default(), options());
        match script.handle(Request::ScanForm {}).await {
            Response::Scanned { ok, elements, url } => {
                assert!(ok);
                assert_eq!(elements.len(), 1);
                assert_eq!(elements[0].name, "Title");
                assert_eq!(url, "https://auctions.yahoo.co.jp/sell/jp/show/submit");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_messages_are_rejected() {
        let mut script = ContentScript::new(title_page(), StubImages::default(), options());
        let resp = script.handle_value(json!({ "type": "FILL_FORM" })).await;
        assert_eq!(resp, Response::failed("invalid message"));
        let resp = script.handle_value(json!({ "type": "PING" })).await;
        assert_eq!(resp, Response::failed("invalid message"));
    }

    #[tokio::test]
    async fn missing_handler_is_injected_once_then_resent() {
        let page = title_page().without_helper();
        let script = ContentScript::new(page, StubImages::default(), options());
        let mut transport = PageTransport::new(script);
        let request = Request::FillForm { product: product() };

        assert!(matches!(
            transport.send(&request).await,
            Err(TransportError::ReceiverMissing)
        ));
        let resp = send_with_reinject(&mut transport, &request, Duration::ZERO).await.unwrap();
        assert!(resp.is_ok());
        assert!(transport.script().page().helper_loaded().await.unwrap());
    }

    /// Transport whose handler never comes up; counts calls.
    struct DeadTransport {
        sends: usize,
        injects: usize,
        inject_fails: bool,
    }

    impl Transport for DeadTransport {
        async fn send(&mut self, _request: &Request) -> Result<Response, TransportError> {
            self.sends += 1;
            Err(TransportError::ReceiverMissing)
        }

        async fn inject(&mut self) -> Result<(), TransportError> {
            self.injects += 1;
            if self.inject_fails {
                Err(TransportError::InjectFailed("no permission".into()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn retry_happens_exactly_once() {
        let mut t = DeadTransport { sends: 0, injects: 0, inject_fails: false };
        let err = send_with_reinject(&mut t, &Request::ScanForm {}, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::RetryFailed(_)));
        assert_eq!((t.sends, t.injects), (2, 1));

        let mut t = DeadTransport { sends: 0, injects: 0, inject_fails: true };
        let err = send_with_reinject(&mut t, &Request::ScanForm {}, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::InjectFailed(_)));
        assert_eq!((t.sends, t.injects), (1, 1));
    }

    struct FlakyChannel;

    impl Transport for FlakyChannel {
        async fn send(&mut self, _request: &Request) -> Result<Response, TransportError> {
            Err(TransportError::Channel("tab closed".into()))
        }

        async fn inject(&mut self) -> Result<(), TransportError> {
            panic!("must not inject for other errors");
        }
    }

    #[tokio::test]
    async fn other_errors_surface_directly() {
        let err = send_with_reinject(&mut FlakyChannel, &Request::ScanForm {}, Duration::ZERO)
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Channel(_)));
    }
}
