//! Access to the marketplace listing page the assistant fills.
//!
//! The fill engine never touches a browser directly; it talks to a
//! [`HostPage`]. [`webdriver::WebDriverPage`] drives a real tab through
//! WebDriver plus an injected helper script, [`memory::MemoryPage`] is a small
//! in-process DOM used in tests and demos.

pub mod memory;
pub mod selector;
pub mod webdriver;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryPage;
pub use webdriver::WebDriverPage;

/// Handle to an element resolved on the current page. Only valid until the
/// page navigates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u32);

/// Attributes the filler inspects before committing a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementInfo {
    pub tag: String,
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub value: String,
    pub checked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: String,
    /// Trimmed visible text.
    pub label: String,
}

/// One form control reported by the diagnostic scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedElement {
    pub tag: String,
    pub name: String,
    pub id: String,
    #[serde(rename = "type")]
    pub input_type: String,
    pub placeholder: String,
    /// Closest enclosing `<label>` or `label[for=id]`, trimmed, at most 30 chars.
    pub label: String,
}

/// A synthesized file handed to the page's drop target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFile {
    pub name: String,
    pub mime: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum PageError {
    /// The helper script is not loaded in the tab (fresh navigation or never injected).
    #[error("page helper is not loaded")]
    NotInjected,

    #[error("invalid selector '{0}'")]
    InvalidSelector(String),

    /// Handle from before a navigation or from another page.
    #[error("unknown element {0:?}")]
    UnknownElement(ElementId),

    #[error("WebDriver error: {0}")]
    Driver(String),

    #[error("page script error: {0}")]
    Script(String),
}

pub type PageResult<T> = std::result::Result<T, PageError>;

/// Operations the fill engine needs from a live page.
///
/// Each `commit_*` call emits the notifications the host page's scripts
/// listen for, not just a property write.
#[allow(async_fn_in_trait)]
pub trait HostPage {
    /// First element matching a CSS selector, in document order.
    async fn query(&self, selector: &str) -> PageResult<Option<ElementId>>;

    async fn info(&self, el: ElementId) -> PageResult<ElementInfo>;

    /// Rendered box has non-zero width and height.
    async fn is_visible(&self, el: ElementId) -> PageResult<bool>;

    /// Computed `display` is not `none`.
    async fn is_displayed(&self, el: ElementId) -> PageResult<bool>;

    async fn options(&self, el: ElementId) -> PageResult<Vec<SelectOption>>;

    /// Scrolls into view, focuses, clears `readonly`/`disabled`, sets the value,
    /// then fires `input`, `change` and an `insertText` InputEvent.
    async fn commit_text(&mut self, el: ElementId, value: &str) -> PageResult<()>;

    /// Sets a select's value and fires `change`.
    async fn commit_select(&mut self, el: ElementId, value: &str) -> PageResult<()>;

    async fn click(&mut self, el: ElementId) -> PageResult<()>;

    /// Replaces the body of an editor iframe with `html` and fires `input` and
    /// `keyup` on it. Returns false when the frame has no reachable body.
    async fn commit_rich_text(&mut self, frame: ElementId, html: &str) -> PageResult<bool>;

    /// Dispatches one `dragenter`, `dragover`, `drop` sequence carrying `files`.
    async fn drop_files(&mut self, target: ElementId, files: &[DroppedFile]) -> PageResult<()>;

    async fn scan(&self) -> PageResult<Vec<ScannedElement>>;

    async fn url(&self) -> PageResult<String>;

    /// Whether the helper that answers fill requests is loaded in the tab.
    async fn helper_loaded(&self) -> PageResult<bool>;

    async fn install_helper(&mut self) -> PageResult<()>;
}

/// Truncates label text the way the scan reports it.
pub(crate) fn scan_label(raw: &str) -> String {
    raw.trim().chars().take(30).collect()
}

/// Default `type` reported by the scan when the attribute is absent.
pub(crate) fn default_scan_type(tag: &str) -> &'static str {
    match tag {
        "textarea" => "textarea",
        "select" => "select",
        _ => "text",
    }
}
