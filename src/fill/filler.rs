use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tracing::{debug, info, warn};

use crate::config::SETTLE_DELAY_MS;
use crate::fill::matching::{closing_schedule, condition_code, date_option, fuzzy_option};
use crate::fill::selectors::{self, Candidate};
use crate::fill::upload::{prepare_files, ImageSource};
use crate::page::{ElementId, HostPage, PageResult};
use crate::types::{FillReport, FormField, Product, SalesMode};

#[derive(Debug, Clone)]
pub struct FillOptions {
    /// Pause after each commit so the host page's scripts can react.
    pub settle: Duration,
    /// Clock for the default closing time; local time when `None`.
    pub now: Option<NaiveDateTime>,
}

impl Default for FillOptions {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(SETTLE_DELAY_MS),
            now: None,
        }
    }
}

/// One fill pass over a host page.
///
/// Every field is attempted and recorded on its own; a field that cannot be
/// located is a report entry, not an error. Only a page access error stops
/// the pass.
pub struct Filler<'a, P, S> {
    page: &'a mut P,
    images: &'a S,
    options: FillOptions,
}

impl<'a, P: HostPage, S: ImageSource> Filler<'a, P, S> {
    pub fn new(page: &'a mut P, images: &'a S, options: FillOptions) -> Self {
        Self { page, images, options }
    }

    pub async fn fill(&mut self, product: &Product) -> PageResult<FillReport> {
        let mut report = FillReport::default();

        // Sales mode decides which price input the page shows.
        let ok = self
            .choose_radio(selectors::SALES_MODE_RADIO, product.salesmode.as_str())
            .await?;
        record(&mut report, FormField::SalesMode, ok);

        let ok = self.fill_text(selectors::NAME, &product.name).await?;
        record(&mut report, FormField::Name, ok);

        let ok = self
            .fill_text(
                selectors::price_candidates(product.salesmode),
                &product.price.to_string(),
            )
            .await?;
        record(&mut report, FormField::Price, ok);

        let ok = self.fill_description(&product.description).await?;
        record(&mut report, FormField::Description, ok);

        let ok = self
            .fill_select(selectors::CONDITION, &condition_code(&product.condition))
            .await?;
        record(&mut report, FormField::Condition, ok);

        if product.salesmode == SalesMode::Auction {
            let now = self.options.now.unwrap_or_else(|| Local::now().naive_local());
            let schedule = closing_schedule(product, now);

            let ok = self.fill_date(&schedule.date_value()).await?;
            record(&mut report, FormField::ClosingDate, ok);

            let ok = self
                .fill_select(selectors::CLOSING_HOUR, &schedule.hour.to_string())
                .await?;
            record(&mut report, FormField::ClosingHour, ok);
        }

        if let Some(payer) = product.shipping {
            let ok = self.choose_radio(selectors::SHIPPING_RADIO, payer.as_str()).await?;
            record(&mut report, FormField::ShippingPayer, ok);
        }
        if let Some(schedule) = product.shipschedule {
            let ok = self.fill_select(selectors::HANDLING_TIME, schedule.code()).await?;
            record(&mut report, FormField::HandlingTime, ok);
        }
        if let Some(region) = non_empty(product.loc_cd.as_deref()) {
            let ok = self.fill_select(selectors::REGION, region).await?;
            record(&mut report, FormField::Region, ok);
        }
        if let Some(method) = non_empty(product.ship_method.as_deref()) {
            let ok = self.fill_select(selectors::SHIP_METHOD, method).await?;
            record(&mut report, FormField::ShipMethod, ok);
        }

        if !product.images.is_empty() {
            let ok = self.fill_images(&product.images).await?;
            record(&mut report, FormField::Images, ok);
        }

        info!(
            product_id = %product.id,
            filled = report.filled.len(),
            failed = report.failed.len(),
            "fill pass complete"
        );
        Ok(report)
    }

    async fn resolve(&self, candidates: &[Candidate]) -> PageResult<Option<ElementId>> {
        for c in candidates {
            let Some(el) = self.page.query(c.selector).await? else {
                continue;
            };
            if c.require_visible && !self.page.is_visible(el).await? {
                debug!(selector = c.selector, "candidate present but not visible");
                continue;
            }
            return Ok(Some(el));
        }
        Ok(None)
    }

    async fn settle(&self) {
        if !self.options.settle.is_zero() {
            tokio::time::sleep(self.options.settle).await;
        }
    }

    async fn fill_text(&mut self, candidates: &[Candidate], value: &str) -> PageResult<bool> {
        let Some(el) = self.resolve(candidates).await? else {
            return Ok(false);
        };
        self.page.commit_text(el, value.trim()).await?;
        self.settle().await;
        Ok(true)
    }

    /// Already-selected radios count as filled without a click.
    async fn choose_radio(&mut self, name: &str, value: &str) -> PageResult<bool> {
        let Some(el) = self.page.query(&selectors::radio(name, value)).await? else {
            return Ok(false);
        };
        if self.page.info(el).await?.checked {
            return Ok(true);
        }
        self.page.click(el).await?;
        self.settle().await;
        Ok(true)
    }

    async fn fill_select(&mut self, candidates: &[Candidate], wanted: &str) -> PageResult<bool> {
        if wanted.trim().is_empty() {
            return Ok(false);
        }
        let Some(el) = self.resolve(candidates).await? else {
            return Ok(false);
        };
        let options = self.page.options(el).await?;
        let Some(choice) = fuzzy_option(&options, wanted) else {
            debug!(%wanted, "no matching option");
            return Ok(false);
        };
        self.page.commit_select(el, &choice.value).await?;
        Ok(true)
    }

    async fn fill_date(&mut self, wanted: &str) -> PageResult<bool> {
        let Some(el) = self.resolve(selectors::CLOSING_DATE).await? else {
            return Ok(false);
        };
        let options = self.page.options(el).await?;
        let Some(choice) = date_option(&options, wanted) else {
            return Ok(false);
        };
        self.page.commit_select(el, &choice.value).await?;
        Ok(true)
    }

    /// Writes whichever description editor is active: the textarea while the
    /// plain-text panel is displayed, otherwise the rich editor frame, with the
    /// textarea as a last resort.
    async fn fill_description(&mut self, text: &str) -> PageResult<bool> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(false);
        }

        let textarea = self.page.query(selectors::DESCRIPTION_TEXTAREA).await?;
        let text_mode = match self.page.query(selectors::TEXT_MODE_PANEL).await? {
            Some(panel) => self.page.is_displayed(panel).await?,
            None => false,
        };

        if let (true, Some(el)) = (text_mode, textarea) {
            self.page.commit_text(el, text).await?;
            self.settle().await;
            return Ok(true);
        }

        if let Some(frame) = self.page.query(selectors::RICH_EDITOR_FRAME).await? {
            if self.page.commit_rich_text(frame, &text_to_html(text)).await? {
                self.settle().await;
                return Ok(true);
            }
        }

        if let Some(el) = textarea {
            self.page.commit_text(el, text).await?;
            self.settle().await;
            return Ok(true);
        }
        Ok(false)
    }

    async fn fill_images(&mut self, images: &[String]) -> PageResult<bool> {
        let Some(target) = self.resolve(selectors::DROP_TARGET).await? else {
            warn!("no image drop target on page");
            return Ok(false);
        };
        let files = prepare_files(self.images, images).await;
        if files.is_empty() {
            warn!(requested = images.len(), "no images could be prepared");
            return Ok(false);
        }
        self.page.drop_files(target, &files).await?;
        self.settle().await;
        info!(count = files.len(), "dropped images onto page");
        Ok(true)
    }
}

fn record(report: &mut FillReport, field: FormField, ok: bool) {
    if !ok {
        debug!(%field, "field not filled");
    }
    report.record(field, ok);
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}

/// Plain text to editor markup: escaped, newlines as `<br>`.
pub fn text_to_html(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('\n', "<br>")
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::fill::upload::tests::StubImages;
    use crate::page::memory::Element;
    use crate::page::MemoryPage;
    use crate::types::{HandlingTime, ShippingPayer};

    struct Ids {
        auction: ElementId,
        buynow: ElementId,
        title: ElementId,
        start_price: ElementId,
        buynow_price: ElementId,
        textarea: ElementId,
        frame: ElementId,
        condition: ElementId,
        closing_date: ElementId,
        closing_hour: ElementId,
        ship_buyer: ElementId,
        schedule: ElementId,
        region: ElementId,
        method: ElementId,
        drop: ElementId,
    }

    fn fixed_now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(22, 40, 0).unwrap()
    }

    fn options() -> FillOptions {
        FillOptions { settle: Duration::ZERO, now: Some(fixed_now()) }
    }

    /// A listing page laid out like the host's, text mode active.
    fn host_page() -> (MemoryPage, Ids) {
        let mut page = MemoryPage::new("https://auctions.yahoo.co.jp/sell/jp/show/submit");
        let radio = |value: &str| {
            Element::new("input").input_type("radio").name("salesmode").value(value)
        };
        let auction = page.add(radio("auction").checked());
        let buynow = page.add(radio("buynow"));
        let title = page.add(Element::new("input").name("Title").id("fleaTitleForm"));
        let start_price = page.add(Element::new("input").id("auc_StartPrice").name("StartPrice"));
        let buynow_price =
            page.add(Element::new("input").id("auc_BidOrBuyPrice_buynow").name("BidOrBuyPrice"));
        let text_mode = page.add(Element::new("div").id("textMode"));
        let textarea = page.add(
            Element::new("textarea").id("fleaDescription").name("Description_plain_work").inside(text_mode),
        );
        let frame = page.add(Element::new("iframe").id("rteEditorComposition0").editable_frame());
        let condition = page.add(
            Element::new("select")
                .name("istatus")
                .option("", "選択してください")
                .option("new", "未使用")
                .option("used10", "未使用に近い")
                .option("used20", "目立った傷や汚れなし")
                .option("used40", "やや傷や汚れあり")
                .option("used60", "傷や汚れあり")
                .option("used80", "全体的に状態が悪い"),
        );
        let mut dates = Element::new("select").name("ClosingYMD");
        for day in 17..=23 {
            let v = format!("2026-10-{day}");
            dates = dates.option(&v, &format!("10月{day}日"));
        }
        let closing_date = page.add(dates);
        let mut hours = Element::new("select").name("ClosingTime");
        for h in 0..24 {
            hours = hours.option(&h.to_string(), &format!("{h}時台"));
        }
        let closing_hour = page.add(hours);
        page.add(Element::new("input").input_type("radio").name("shipping").value("seller").checked());
        let ship_buyer = page.add(Element::new("input").input_type("radio").name("shipping").value("buyer"));
        let schedule = page.add(
            Element::new("select")
                .name("shipschedule")
                .option("1", "1～2日で発送")
                .option("7", "2～3日で発送")
                .option("2", "3～7日で発送"),
        );
        let region = page.add(
            Element::new("select")
                .name("loc_cd")
                .option("", "選択")
                .option("1", "北海道")
                .option("13", "東京都")
                .option("48", "海外"),
        );
        let method = page.add(
            Element::new("select")
                .name("shipmethod")
                .option("yupack", "ゆうパック")
                .option("nekopos", "ネコポス"),
        );
        let drop = page.add(Element::new("div").id("dropArea"));

        let ids = Ids {
            auction,
            buynow,
            title,
            start_price,
            buynow_price,
            textarea,
            frame,
            condition,
            closing_date,
            closing_hour,
            ship_buyer,
            schedule,
            region,
            method,
            drop,
        };
        (page, ids)
    }

    fn chair() -> Product {
        let mut p = Product::empty();
        p.name = "椅子".to_string();
        p.price = 1500;
        p.condition = "未使用に近い".to_string();
        p.description = "木製の椅子です。\n傷なし".to_string();
        p
    }

    async fn run(page: &mut MemoryPage, images: &StubImages, product: &Product) -> FillReport {
        Filler::new(page, images, options()).fill(product).await.unwrap()
    }

    fn assert_disjoint(report: &FillReport) {
        for f in &report.filled {
            assert!(!report.failed.contains(f), "{f} in both lists");
        }
        let mut all: Vec<_> = report.filled.iter().chain(report.failed.iter()).collect();
        let total = all.len();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), total, "a field was recorded twice");
    }

    #[tokio::test]
    async fn full_auction_fill() {
        let (mut page, ids) = host_page();
        let mut product = chair();
        product.shipping = Some(ShippingPayer::Buyer);
        product.shipschedule = Some(HandlingTime::TwoToThreeDays);
        product.loc_cd = Some("13".to_string());
        product.ship_method = Some("ネコポス".to_string());

        let report = run(&mut page, &StubImages::default(), &product).await;

        assert!(report.failed.is_empty(), "failed: {:?}", report.failed);
        assert_eq!(
            report.filled,
            vec![
                "sales mode", "name", "price", "description", "condition", "closing date",
                "closing hour", "shipping payer", "handling time", "region", "shipping method",
            ]
        );
        assert_disjoint(&report);

        assert_eq!(page.value_of(ids.title), Some("椅子"));
        assert_eq!(page.value_of(ids.start_price), Some("1500"));
        assert_eq!(page.value_of(ids.buynow_price), Some(""));
        assert_eq!(page.value_of(ids.textarea), Some("木製の椅子です。\n傷なし"));
        assert_eq!(page.value_of(ids.condition), Some("used10"));
        assert_eq!(page.value_of(ids.closing_date), Some("2026-10-18"));
        assert_eq!(page.value_of(ids.closing_hour), Some("22"));
        assert!(page.is_checked(ids.ship_buyer));
        assert_eq!(page.value_of(ids.schedule), Some("7"));
        assert_eq!(page.value_of(ids.region), Some("13"));
        assert_eq!(page.value_of(ids.method), Some("nekopos"));
        assert_eq!(page.frame_html(ids.frame), Some(""), "rich editor untouched in text mode");
        assert_eq!(page.events_on(ids.title), vec!["focus", "input", "change", "insertText"]);
    }

    #[tokio::test]
    async fn checked_sales_mode_is_not_clicked() {
        let (mut page, ids) = host_page();
        let report = run(&mut page, &StubImages::default(), &chair()).await;
        assert!(report.is_filled(FormField::SalesMode));
        assert!(page.events_on(ids.auction).is_empty());
        assert!(page.events_on(ids.buynow).is_empty());
    }

    #[tokio::test]
    async fn buynow_prefers_fixed_price_input_and_skips_closing() {
        let (mut page, ids) = host_page();
        let mut product = chair();
        product.salesmode = SalesMode::BuyNow;

        let report = run(&mut page, &StubImages::default(), &product).await;

        assert!(page.is_checked(ids.buynow));
        assert!(!page.is_checked(ids.auction));
        assert_eq!(page.events_on(ids.buynow), vec!["click", "input", "change"]);
        assert_eq!(page.value_of(ids.buynow_price), Some("1500"));
        assert_eq!(page.value_of(ids.start_price), Some(""));
        assert!(!report.contains(FormField::ClosingDate));
        assert!(!report.contains(FormField::ClosingHour));
        assert_eq!(page.value_of(ids.closing_date), Some(""));
    }

    #[tokio::test]
    async fn price_skips_invisible_candidates() {
        let mut page = MemoryPage::new("https://auctions.yahoo.co.jp/sell");
        let hidden = page.add(Element::new("input").id("auc_BidOrBuyPrice_buynow").zero_size());
        let fallback = page.add(Element::new("input").name("BidOrBuyPrice"));
        let mut product = chair();
        product.salesmode = SalesMode::BuyNow;

        let report = run(&mut page, &StubImages::default(), &product).await;
        assert!(report.is_filled(FormField::Price));
        assert_eq!(page.value_of(hidden), Some(""));
        assert_eq!(page.value_of(fallback), Some("1500"));
    }

    #[tokio::test]
    async fn price_fails_when_only_hidden_inputs_exist() {
        let mut page = MemoryPage::new("https://auctions.yahoo.co.jp/sell");
        let wrap = page.add(Element::new("div").display_none());
        page.add(Element::new("input").id("auc_StartPrice").inside(wrap));

        let report = run(&mut page, &StubImages::default(), &chair()).await;
        assert!(report.is_failed(FormField::Price));
    }

    #[tokio::test]
    async fn rich_editor_used_when_text_mode_hidden() {
        let mut page = MemoryPage::new("https://auctions.yahoo.co.jp/sell");
        let panel = page.add(Element::new("div").id("textMode").display_none());
        let textarea = page.add(Element::new("textarea").id("fleaDescription").inside(panel));
        let frame = page.add(Element::new("iframe").id("rteEditorComposition0").editable_frame());
        let mut product = chair();
        product.description = "1行目\n<b>2行目</b>".to_string();

        let report = run(&mut page, &StubImages::default(), &product).await;
        assert!(report.is_filled(FormField::Description));
        assert_eq!(page.frame_html(frame), Some("1行目<br>&lt;b&gt;2行目&lt;/b&gt;"));
        assert_eq!(page.events_on(frame), vec!["focus", "input", "keyup"]);
        assert_eq!(page.value_of(textarea), Some(""));
    }

    #[tokio::test]
    async fn textarea_is_last_resort_for_description() {
        let mut page = MemoryPage::new("https://auctions.yahoo.co.jp/sell");
        let textarea = page.add(Element::new("textarea").name("Description_plain_work"));
        page.add(Element::new("iframe").id("rteEditorComposition0"));

        let report = run(&mut page, &StubImages::default(), &chair()).await;
        assert!(report.is_filled(FormField::Description));
        assert_eq!(page.value_of(textarea), Some("木製の椅子です。\n傷なし"));
    }

    #[tokio::test]
    async fn empty_description_fails() {
        let (mut page, _) = host_page();
        let mut product = chair();
        product.description = "  \n ".to_string();
        let report = run(&mut page, &StubImages::default(), &product).await;
        assert!(report.is_failed(FormField::Description));
    }

    #[tokio::test]
    async fn missing_fields_do_not_abort_the_pass() {
        let mut page = MemoryPage::new("https://auctions.yahoo.co.jp/sell");
        let mut product = chair();
        product.shipping = Some(ShippingPayer::Seller);

        let report = run(&mut page, &StubImages::default(), &product).await;
        assert!(report.filled.is_empty());
        assert_eq!(report.failed.len(), 8);
        assert!(report.is_failed(FormField::ShippingPayer));
        assert_disjoint(&report);
    }

    #[tokio::test]
    async fn unknown_condition_passes_through_to_select() {
        let (mut page, ids) = host_page();
        let mut product = chair();
        product.condition = "used60".to_string();
        run(&mut page, &StubImages::default(), &product).await;
        assert_eq!(page.value_of(ids.condition), Some("used60"));

        product.condition = "美品".to_string();
        let report = run(&mut page, &StubImages::default(), &product).await;
        assert!(report.is_failed(FormField::Condition));
    }

    #[tokio::test]
    async fn page_errors_abort_the_pass() {
        let mut page = MemoryPage::new("https://auctions.yahoo.co.jp/sell").broken();
        let result = Filler::new(&mut page, &StubImages::default(), options())
            .fill(&chair())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn zero_images_leave_no_report_entry() {
        let (mut page, ids) = host_page();
        let report = run(&mut page, &StubImages::default(), &chair()).await;
        assert!(!report.contains(FormField::Images));
        assert!(page.drops().is_empty());
        assert!(page.events_on(ids.drop).is_empty());
    }

    #[tokio::test]
    async fn only_first_ten_images_are_fetched_and_dropped_once() {
        let (mut page, ids) = host_page();
        let urls: Vec<String> = (0..12).map(|i| format!("https://cdn.test/{i}.png")).collect();
        let refs: Vec<&str> = urls.iter().map(String::as_str).collect();
        let stub = StubImages::serving(&refs);
        let mut product = chair();
        product.images = urls.clone();

        let report = run(&mut page, &stub, &product).await;

        assert!(report.is_filled(FormField::Images));
        assert_eq!(stub.requested(), urls[..10].to_vec());
        assert_eq!(page.drops().len(), 1);
        let (target, files) = &page.drops()[0];
        assert_eq!(*target, ids.drop);
        assert_eq!(files.len(), 10);
        assert_eq!(files[9].name, "image10.png");
        assert_eq!(page.events_on(ids.drop), vec!["dragenter", "dragover", "drop"]);
    }

    #[tokio::test]
    async fn images_fail_when_none_prepared() {
        let (mut page, _) = host_page();
        let mut product = chair();
        product.images = vec![
            "https://cdn.test/gone.jpg".to_string(),
            "blob:https://dashboard/1".to_string(),
        ];
        let stub = StubImages::default();

        let report = run(&mut page, &stub, &product).await;
        assert!(report.is_failed(FormField::Images));
        assert_eq!(stub.requested(), vec!["https://cdn.test/gone.jpg"]);
        assert!(page.drops().is_empty());
    }

    #[tokio::test]
    async fn images_fail_without_drop_target() {
        let mut page = MemoryPage::new("https://auctions.yahoo.co.jp/sell");
        let stub = StubImages::serving(&["https://cdn.test/a.jpg"]);
        let mut product = chair();
        product.images = vec!["https://cdn.test/a.jpg".to_string()];

        let report = run(&mut page, &stub, &product).await;
        assert!(report.is_failed(FormField::Images));
    }

    #[test]
    fn html_conversion() {
        assert_eq!(text_to_html("a\r\nb\nc"), "a<br>b<br>c");
        assert_eq!(text_to_html("x & y"), "x &amp; y");
    }
}
