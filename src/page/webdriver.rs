use base64::Engine;
use fantoccini::{Client, ClientBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{
    DroppedFile, ElementId, ElementInfo, HostPage, PageError, PageResult, ScannedElement,
    SelectOption,
};

const HELPER_JS: &str = include_str!("../../assets/assist.js");

/// Returned by the call shim when the helper is absent from the document.
const MISSING: &str = "__missing__";

const CALL_JS: &str = "const a = window.__listingAssist; \
     if (!a) { return '__missing__'; } \
     return a[arguments[0]].apply(null, arguments[1]);";

/// A browser tab driven over WebDriver. The user opens the listing page in
/// this session; element work happens inside the injected helper script.
pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    pub async fn connect(webdriver_url: &str) -> PageResult<Self> {
        debug!("Connecting to WebDriver at {webdriver_url}");
        let client = ClientBuilder::native()
            .connect(webdriver_url)
            .await
            .map_err(|e| PageError::Driver(e.to_string()))?;
        info!("WebDriver session started");
        Ok(Self { client })
    }

    pub async fn goto(&self, url: &str) -> PageResult<()> {
        self.client
            .goto(url)
            .await
            .map_err(|e| PageError::Driver(e.to_string()))
    }

    pub async fn close(self) -> PageResult<()> {
        self.client
            .close()
            .await
            .map_err(|e| PageError::Driver(e.to_string()))
    }

    async fn call(&self, method: &str, args: Vec<Value>) -> PageResult<Value> {
        let result = self
            .client
            .execute(CALL_JS, vec![json!(method), Value::Array(args)])
            .await
            .map_err(|e| PageError::Script(e.to_string()))?;
        if result.as_str() == Some(MISSING) {
            return Err(PageError::NotInjected);
        }
        Ok(result)
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, args: Vec<Value>) -> PageResult<T> {
        let v = self.call(method, args).await?;
        serde_json::from_value(v)
            .map_err(|e| PageError::Script(format!("unexpected {method} result: {e}")))
    }
}

impl HostPage for WebDriverPage {
    async fn query(&self, selector: &str) -> PageResult<Option<ElementId>> {
        let idx: Option<u32> = self.call_as("query", vec![json!(selector)]).await?;
        Ok(idx.map(ElementId))
    }

    async fn info(&self, el: ElementId) -> PageResult<ElementInfo> {
        self.call_as("info", vec![json!(el.0)]).await
    }

    async fn is_visible(&self, el: ElementId) -> PageResult<bool> {
        self.call_as("visible", vec![json!(el.0)]).await
    }

    async fn is_displayed(&self, el: ElementId) -> PageResult<bool> {
        self.call_as("displayed", vec![json!(el.0)]).await
    }

    async fn options(&self, el: ElementId) -> PageResult<Vec<SelectOption>> {
        self.call_as("options", vec![json!(el.0)]).await
    }

    async fn commit_text(&mut self, el: ElementId, value: &str) -> PageResult<()> {
        self.call("commitText", vec![json!(el.0), json!(value)]).await?;
        Ok(())
    }

    async fn commit_select(&mut self, el: ElementId, value: &str) -> PageResult<()> {
        self.call("commitSelect", vec![json!(el.0), json!(value)]).await?;
        Ok(())
    }

    async fn click(&mut self, el: ElementId) -> PageResult<()> {
        self.call("click", vec![json!(el.0)]).await?;
        Ok(())
    }

    async fn commit_rich_text(&mut self, frame: ElementId, html: &str) -> PageResult<bool> {
        self.call_as("richText", vec![json!(frame.0), json!(html)]).await
    }

    async fn drop_files(&mut self, target: ElementId, files: &[DroppedFile]) -> PageResult<()> {
        let payload: Vec<Value> = files
            .iter()
            .map(|f| {
                json!({
                    "name": f.name,
                    "mime": f.mime,
                    "data": base64::engine::general_purpose::STANDARD.encode(&f.data),
                })
            })
            .collect();
        self.call("drop", vec![json!(target.0), Value::Array(payload)]).await?;
        Ok(())
    }

    async fn scan(&self) -> PageResult<Vec<ScannedElement>> {
        self.call_as("scan", vec![]).await
    }

    async fn url(&self) -> PageResult<String> {
        let url = self
            .client
            .current_url()
            .await
            .map_err(|e| PageError::Driver(e.to_string()))?;
        Ok(url.to_string())
    }

    async fn helper_loaded(&self) -> PageResult<bool> {
        let v = self
            .client
            .execute("return !!window.__listingAssist;", vec![])
            .await
            .map_err(|e| PageError::Driver(e.to_string()))?;
        Ok(v.as_bool().unwrap_or(false))
    }

    async fn install_helper(&mut self) -> PageResult<()> {
        self.client
            .execute(HELPER_JS, vec![])
            .await
            .map_err(|e| PageError::Script(e.to_string()))?;
        debug!("page helper installed");
        Ok(())
    }
}
