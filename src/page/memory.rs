use std::collections::BTreeMap;

use super::selector::{Matchable, Selector};
use super::{
    default_scan_type, scan_label, DroppedFile, ElementId, ElementInfo, HostPage, PageError,
    PageResult, ScannedElement, SelectOption,
};

/// One node of the in-memory document.
#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    value: String,
    checked: bool,
    /// Non-zero rendered box (before ancestors are considered).
    sized: bool,
    /// Computed `display` is not `none`.
    displayed: bool,
    parent: Option<usize>,
    options: Vec<SelectOption>,
    /// Body markup of an iframe whose document is reachable.
    frame_body: Option<String>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            text: String::new(),
            value: String::new(),
            checked: false,
            sized: true,
            displayed: true,
            parent: None,
            options: Vec::new(),
            frame_body: None,
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn id(self, id: &str) -> Self {
        self.with_attr("id", id)
    }

    pub fn name(self, name: &str) -> Self {
        self.with_attr("name", name)
    }

    pub fn input_type(self, t: &str) -> Self {
        self.with_attr("type", t)
    }

    /// Sets both the `value` attribute and the current value.
    pub fn value(mut self, v: &str) -> Self {
        self.value = v.to_string();
        self.with_attr("value", v)
    }

    pub fn text(mut self, t: &str) -> Self {
        self.text = t.to_string();
        self
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    /// Present in the document but rendered with a zero-size box.
    pub fn zero_size(mut self) -> Self {
        self.sized = false;
        self
    }

    /// `display: none`.
    pub fn display_none(mut self) -> Self {
        self.displayed = false;
        self
    }

    pub fn option(mut self, value: &str, label: &str) -> Self {
        self.options.push(SelectOption {
            value: value.to_string(),
            label: label.trim().to_string(),
        });
        self
    }

    /// An iframe whose document body can be edited.
    pub fn editable_frame(mut self) -> Self {
        self.frame_body = Some(String::new());
        self
    }

    pub fn inside(mut self, parent: ElementId) -> Self {
        self.parent = Some(parent.0 as usize);
        self
    }
}

impl Matchable for Element {
    fn tag(&self) -> &str {
        &self.tag
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }
}

/// Notification recorded by the in-memory page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageEvent {
    pub target: ElementId,
    pub kind: &'static str,
}

/// In-process stand-in for a host page. Records every notification so tests
/// can assert what the host page's scripts would have observed.
#[derive(Debug, Clone)]
pub struct MemoryPage {
    url: String,
    elements: Vec<Element>,
    events: Vec<PageEvent>,
    drops: Vec<(ElementId, Vec<DroppedFile>)>,
    helper_loaded: bool,
    /// Makes every access fail with a script error, like a page that throws mid-fill.
    broken: bool,
}

impl MemoryPage {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            elements: Vec::new(),
            events: Vec::new(),
            drops: Vec::new(),
            helper_loaded: true,
            broken: false,
        }
    }

    /// A page whose helper has not been injected yet.
    pub fn without_helper(mut self) -> Self {
        self.helper_loaded = false;
        self
    }

    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn add(&mut self, el: Element) -> ElementId {
        self.elements.push(el);
        ElementId((self.elements.len() - 1) as u32)
    }

    /// Simulates a navigation: the helper is gone until re-injected.
    pub fn navigate(&mut self, url: &str) {
        self.url = url.to_string();
        self.helper_loaded = false;
    }

    pub fn value_of(&self, el: ElementId) -> Option<&str> {
        self.get(el).ok().map(|e| e.value.as_str())
    }

    pub fn is_checked(&self, el: ElementId) -> bool {
        self.get(el).map(|e| e.checked).unwrap_or(false)
    }

    pub fn frame_html(&self, el: ElementId) -> Option<&str> {
        self.get(el).ok().and_then(|e| e.frame_body.as_deref())
    }

    pub fn events(&self) -> &[PageEvent] {
        &self.events
    }

    pub fn events_on(&self, el: ElementId) -> Vec<&'static str> {
        self.events.iter().filter(|e| e.target == el).map(|e| e.kind).collect()
    }

    pub fn drops(&self) -> &[(ElementId, Vec<DroppedFile>)] {
        &self.drops
    }

    fn check(&self) -> PageResult<()> {
        if self.broken {
            return Err(PageError::Script("Cannot read properties of null".to_string()));
        }
        Ok(())
    }

    fn get(&self, el: ElementId) -> PageResult<&Element> {
        self.elements
            .get(el.0 as usize)
            .ok_or(PageError::UnknownElement(el))
    }

    fn get_mut(&mut self, el: ElementId) -> PageResult<&mut Element> {
        self.elements
            .get_mut(el.0 as usize)
            .ok_or(PageError::UnknownElement(el))
    }

    fn emit(&mut self, target: ElementId, kinds: &[&'static str]) {
        self.events
            .extend(kinds.iter().map(|&kind| PageEvent { target, kind }));
    }

    /// Zero box when the element or any ancestor is not displayed.
    fn rendered(&self, idx: usize) -> bool {
        let mut cur = Some(idx);
        while let Some(i) = cur {
            match self.elements.get(i) {
                Some(e) if e.displayed => cur = e.parent,
                _ => return false,
            }
        }
        true
    }

    fn label_for(&self, idx: usize) -> String {
        let mut cur = self.elements.get(idx).and_then(|e| e.parent);
        while let Some(i) = cur {
            match self.elements.get(i) {
                Some(e) if e.tag == "label" => return e.text.clone(),
                Some(e) => cur = e.parent,
                None => break,
            }
        }
        let id = self.elements.get(idx).and_then(|e| e.attr("id")).unwrap_or("");
        if id.is_empty() {
            return String::new();
        }
        self.elements
            .iter()
            .find(|e| e.tag == "label" && e.attr("for") == Some(id))
            .map(|e| e.text.clone())
            .unwrap_or_default()
    }
}

impl HostPage for MemoryPage {
    async fn query(&self, selector: &str) -> PageResult<Option<ElementId>> {
        self.check()?;
        let sel = Selector::parse(selector)?;
        Ok(self
            .elements
            .iter()
            .position(|e| sel.matches(e))
            .map(|i| ElementId(i as u32)))
    }

    async fn info(&self, el: ElementId) -> PageResult<ElementInfo> {
        self.check()?;
        let e = self.get(el)?;
        Ok(ElementInfo {
            tag: e.tag.clone(),
            name: e.attr("name").unwrap_or("").to_string(),
            id: e.attr("id").unwrap_or("").to_string(),
            input_type: e.attr("type").unwrap_or("").to_string(),
            value: e.value.clone(),
            checked: e.checked,
        })
    }

    async fn is_visible(&self, el: ElementId) -> PageResult<bool> {
        self.check()?;
        Ok(self.get(el)?.sized && self.rendered(el.0 as usize))
    }

    async fn is_displayed(&self, el: ElementId) -> PageResult<bool> {
        self.check()?;
        Ok(self.get(el)?.displayed)
    }

    async fn options(&self, el: ElementId) -> PageResult<Vec<SelectOption>> {
        self.check()?;
        Ok(self.get(el)?.options.clone())
    }

    async fn commit_text(&mut self, el: ElementId, value: &str) -> PageResult<()> {
        self.check()?;
        let e = self.get_mut(el)?;
        if e.tag != "input" && e.tag != "textarea" {
            return Err(PageError::Script(format!("<{}> is not a text control", e.tag)));
        }
        e.attrs.remove("readonly");
        e.attrs.remove("disabled");
        e.value = value.to_string();
        self.emit(el, &["focus", "input", "change", "insertText"]);
        Ok(())
    }

    async fn commit_select(&mut self, el: ElementId, value: &str) -> PageResult<()> {
        self.check()?;
        let e = self.get_mut(el)?;
        if e.tag != "select" {
            return Err(PageError::Script(format!("<{}> is not a select", e.tag)));
        }
        e.value = value.to_string();
        self.emit(el, &["focus", "change"]);
        Ok(())
    }

    async fn click(&mut self, el: ElementId) -> PageResult<()> {
        self.check()?;
        let e = self.get(el)?;
        let is_radio = e.tag == "input" && e.attr("type") == Some("radio");
        let group = e.attr("name").map(str::to_string);

        if is_radio {
            if let Some(group) = group {
                for other in self.elements.iter_mut() {
                    if other.attr("type") == Some("radio") && other.attr("name") == Some(group.as_str()) {
                        other.checked = false;
                    }
                }
            }
            self.get_mut(el)?.checked = true;
            self.emit(el, &["click", "input", "change"]);
        } else {
            let e = self.get_mut(el)?;
            if e.attr("type") == Some("checkbox") {
                e.checked = !e.checked;
            }
            self.emit(el, &["click"]);
        }
        Ok(())
    }

    async fn commit_rich_text(&mut self, frame: ElementId, html: &str) -> PageResult<bool> {
        self.check()?;
        let Some(body) = self.get_mut(frame)?.frame_body.as_mut() else {
            return Ok(false);
        };
        *body = html.to_string();
        self.emit(frame, &["focus", "input", "keyup"]);
        Ok(true)
    }

    async fn drop_files(&mut self, target: ElementId, files: &[DroppedFile]) -> PageResult<()> {
        self.check()?;
        self.get(target)?;
        self.emit(target, &["dragenter", "dragover", "drop"]);
        self.drops.push((target, files.to_vec()));
        Ok(())
    }

    async fn scan(&self) -> PageResult<Vec<ScannedElement>> {
        self.check()?;
        let mut out = Vec::new();
        for (idx, e) in self.elements.iter().enumerate() {
            if !matches!(e.tag.as_str(), "input" | "textarea" | "select") {
                continue;
            }
            let name = e.attr("name").unwrap_or("").to_string();
            let id = e.attr("id").unwrap_or("").to_string();
            if name.is_empty() && id.is_empty() {
                continue;
            }
            out.push(ScannedElement {
                tag: e.tag.clone(),
                input_type: e
                    .attr("type")
                    .filter(|t| !t.is_empty())
                    .unwrap_or(default_scan_type(&e.tag))
                    .to_string(),
                placeholder: e.attr("placeholder").unwrap_or("").to_string(),
                label: scan_label(&self.label_for(idx)),
                name,
                id,
            });
        }
        Ok(out)
    }

    async fn url(&self) -> PageResult<String> {
        Ok(self.url.clone())
    }

    async fn helper_loaded(&self) -> PageResult<bool> {
        Ok(self.helper_loaded)
    }

    async fn install_helper(&mut self) -> PageResult<()> {
        self.helper_loaded = true;
        Ok(())
    }
}
