//! Where each field lives on the host listing page.
//!
//! Candidates are tried in order and the first acceptable element wins. When
//! the host markup changes, this table is the only place to update; the scan
//! operation lists the page's current names and ids.

use crate::types::SalesMode;

/// One way of locating a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub selector: &'static str,
    /// Accept only when the element has a non-zero rendered box.
    pub require_visible: bool,
}

const fn any(selector: &'static str) -> Candidate {
    Candidate { selector, require_visible: false }
}

const fn shown(selector: &'static str) -> Candidate {
    Candidate { selector, require_visible: true }
}

pub const SALES_MODE_RADIO: &str = "salesmode";
pub const SHIPPING_RADIO: &str = "shipping";

pub const NAME: &[Candidate] = &[any("input[name='Title']"), any("#fleaTitleForm")];

/// Fixed-price inputs first; the start-price inputs stay as a fallback.
pub const PRICE_BUYNOW: &[Candidate] = &[
    shown("#auc_BidOrBuyPrice_buynow"),
    shown("input[name='BidOrBuyPrice']"),
    shown("#auc_BidOrBuyPrice"),
    shown("#auc_StartPrice"),
    shown("input[name='StartPrice']"),
];

pub const PRICE_AUCTION: &[Candidate] = &[
    shown("#auc_StartPrice"),
    shown("input[name='StartPrice']"),
    shown("#auc_BidOrBuyPrice"),
    shown("#auc_BidOrBuyPrice_buynow"),
    shown("input[name='BidOrBuyPrice']"),
];

pub fn price_candidates(mode: SalesMode) -> &'static [Candidate] {
    match mode {
        SalesMode::BuyNow => PRICE_BUYNOW,
        SalesMode::Auction => PRICE_AUCTION,
    }
}

/// Container shown while the description editor is in plain-text mode.
pub const TEXT_MODE_PANEL: &str = "#textMode";
pub const DESCRIPTION_TEXTAREA: &str =
    "textarea#fleaDescription, textarea[name='Description_plain_work']";
pub const RICH_EDITOR_FRAME: &str = "#rteEditorComposition0";

pub const CONDITION: &[Candidate] = &[any("select[name='istatus']")];
pub const CLOSING_DATE: &[Candidate] = &[any("select[name='ClosingYMD']")];
pub const CLOSING_HOUR: &[Candidate] = &[any("select[name='ClosingTime']")];
pub const HANDLING_TIME: &[Candidate] = &[any("select[name='shipschedule']")];
pub const REGION: &[Candidate] = &[any("select[name='loc_cd']")];
pub const SHIP_METHOD: &[Candidate] = &[
    any("select[name='shipmethod']"),
    any("select[name='shipping_method']"),
];

/// Image upload area that accepts dropped files.
pub const DROP_TARGET: &[Candidate] = &[
    any("#dropArea"),
    any("[data-drop-target]"),
    any(".ImageUpload__drop"),
    any("input[type='file'][multiple]"),
    any("input[type='file']"),
];

/// Radio with the given group name and value.
pub fn radio(name: &str, value: &str) -> String {
    format!("input[type='radio'][name='{name}'][value='{value}']")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::selector::Selector;

    #[test]
    fn every_selector_parses() {
        let tables = [
            NAME, PRICE_BUYNOW, PRICE_AUCTION, CONDITION, CLOSING_DATE, CLOSING_HOUR,
            HANDLING_TIME, REGION, SHIP_METHOD, DROP_TARGET,
        ];
        for c in tables.iter().flat_map(|t| t.iter()) {
            assert!(Selector::parse(c.selector).is_ok(), "{}", c.selector);
        }
        for s in [TEXT_MODE_PANEL, DESCRIPTION_TEXTAREA, RICH_EDITOR_FRAME] {
            assert!(Selector::parse(s).is_ok(), "{s}");
        }
        assert!(Selector::parse(&radio(SALES_MODE_RADIO, "buynow")).is_ok());
    }

    #[test]
    fn price_preference_follows_sales_mode() {
        assert_eq!(price_candidates(SalesMode::BuyNow)[0].selector, "#auc_BidOrBuyPrice_buynow");
        assert_eq!(price_candidates(SalesMode::Auction)[0].selector, "#auc_StartPrice");
        assert!(PRICE_BUYNOW.iter().chain(PRICE_AUCTION).all(|c| c.require_visible));
    }
}
