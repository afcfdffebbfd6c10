//! Value heuristics: condition codes, fuzzy option matching and the auction
//! closing schedule.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};

use crate::config::DEFAULT_CLOSING_OFFSET_HOURS;
use crate::page::SelectOption;
use crate::types::Product;

/// Condition labels and the host codes they map to.
pub const CONDITION_CODES: &[(&str, &str)] = &[
    ("新品", "new"),
    ("未使用", "new"),
    ("新品、未使用", "new"),
    ("未使用に近い", "used10"),
    ("目立った傷や汚れなし", "used20"),
    ("やや傷や汚れあり", "used40"),
    ("傷や汚れあり", "used60"),
    ("全体的に状態が悪い", "used80"),
    ("ジャンク", "used80"),
    ("中古", "used20"),
];

/// Maps a free-text condition to a host code by substring containment in
/// either direction. When several labels match, the one closest in length to
/// the input wins (ties keep table order), so "未使用に近い" resolves to
/// `used10` rather than to its prefix "未使用". Unmatched input passes through.
pub fn condition_code(condition: &str) -> String {
    let c = condition.trim();
    if c.is_empty() {
        return String::new();
    }
    CONDITION_CODES
        .iter()
        .filter(|(label, _)| c.contains(label) || label.contains(c))
        .min_by_key(|(label, _)| label.chars().count().abs_diff(c.chars().count()))
        .map(|(_, code)| code.to_string())
        .unwrap_or_else(|| c.to_string())
}

/// Picks the option for `wanted`: an exact value or label match first, then
/// the first option (document order) whose value or label contains or is
/// contained in it. Placeholder options with an empty value never match.
pub fn fuzzy_option<'a>(options: &'a [SelectOption], wanted: &str) -> Option<&'a SelectOption> {
    let w = wanted.trim();
    if w.is_empty() {
        return None;
    }
    let real = || options.iter().filter(|o| !o.value.trim().is_empty());

    real()
        .find(|o| o.value.trim() == w || o.label == w)
        .or_else(|| {
            real().find(|o| {
                let v = o.value.trim();
                v.contains(w) || w.contains(v) || (!o.label.is_empty() && (o.label.contains(w) || w.contains(o.label.as_str())))
            })
        })
}

/// Date select fallback: first option whose value sorts at or after the
/// request, else the last option.
pub fn date_option<'a>(options: &'a [SelectOption], wanted: &str) -> Option<&'a SelectOption> {
    fuzzy_option(options, wanted).or_else(|| {
        let real: Vec<&SelectOption> = options.iter().filter(|o| !o.value.trim().is_empty()).collect();
        real.iter()
            .find(|o| o.value.trim() >= wanted)
            .or_else(|| real.last())
            .copied()
    })
}

/// Closing date and hour the fill pass requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosingSchedule {
    pub date: NaiveDate,
    pub hour: u8,
}

impl ClosingSchedule {
    /// Value format of the host's date select.
    pub fn date_value(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// Explicit values where the product has them; otherwise the parts of
/// `now + 48h`. An explicit hour wins over the derived one.
pub fn closing_schedule(product: &Product, now: NaiveDateTime) -> ClosingSchedule {
    let default = now + Duration::hours(DEFAULT_CLOSING_OFFSET_HOURS);
    ClosingSchedule {
        date: product.closing_ymd.unwrap_or(default.date()),
        hour: product.closing_time.unwrap_or(default.hour() as u8),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(pairs: &[(&str, &str)]) -> Vec<SelectOption> {
        pairs
            .iter()
            .map(|(v, l)| SelectOption { value: v.to_string(), label: l.to_string() })
            .collect()
    }

    #[test]
    fn condition_table_entries_map_to_their_codes() {
        for (label, code) in CONDITION_CODES {
            assert_eq!(condition_code(label), *code, "{label}");
        }
    }

    #[test]
    fn condition_containment_both_directions() {
        assert_eq!(condition_code("未使用に近い（箱なし）"), "used10");
        assert_eq!(condition_code("中古品"), "used20");
        assert_eq!(condition_code("ジャンク品"), "used80");
        assert_eq!(condition_code("目立った傷"), "used20");
        assert_eq!(condition_code(" 新品 "), "new");
    }

    #[test]
    fn unmatched_condition_passes_through() {
        assert_eq!(condition_code("used40"), "used40");
        assert_eq!(condition_code("美品"), "美品");
        assert_eq!(condition_code(""), "");
    }

    #[test]
    fn fuzzy_prefers_exact_over_containment() {
        let regions = opts(&[("", "選択してください"), ("1", "北海道"), ("13", "東京都"), ("48", "海外")]);
        assert_eq!(fuzzy_option(&regions, "13").unwrap().label, "東京都");
        assert_eq!(fuzzy_option(&regions, "1").unwrap().label, "北海道");
        assert_eq!(fuzzy_option(&regions, "東京").unwrap().value, "13");
        assert!(fuzzy_option(&regions, "大阪").is_none());
        assert!(fuzzy_option(&regions, "").is_none());
    }

    #[test]
    fn fuzzy_matches_label_containing_value() {
        let conditions = opts(&[("new", "未使用"), ("used10", "未使用に近い"), ("used20", "目立った傷や汚れなし")]);
        assert_eq!(fuzzy_option(&conditions, "used20").unwrap().value, "used20");
        assert_eq!(fuzzy_option(&conditions, "傷や汚れなし").unwrap().value, "used20");
    }

    #[test]
    fn date_falls_back_to_next_or_last_option() {
        let dates = opts(&[("2026-10-17", "10月17日"), ("2026-10-18", "10月18日"), ("2026-10-20", "10月20日")]);
        assert_eq!(date_option(&dates, "2026-10-18").unwrap().value, "2026-10-18");
        assert_eq!(date_option(&dates, "2026-10-19").unwrap().value, "2026-10-20");
        assert_eq!(date_option(&dates, "2026-12-01").unwrap().value, "2026-10-20");
        assert_eq!(date_option(&dates, "2026-01-01").unwrap().value, "2026-10-17");
        assert!(date_option(&[], "2026-01-01").is_none());
    }

    #[test]
    fn closing_default_is_now_plus_48h() {
        let now = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap().and_hms_opt(22, 40, 0).unwrap();
        let p = Product::empty();
        let s = closing_schedule(&p, now);
        assert_eq!(s.date, NaiveDate::from_ymd_opt(2026, 10, 18).unwrap());
        assert_eq!(s.hour, 22);
        assert_eq!(s.date_value(), "2026-10-18");
    }

    #[test]
    fn explicit_hour_wins_over_default() {
        let now = NaiveDate::from_ymd_opt(2026, 12, 30).unwrap().and_hms_opt(23, 5, 0).unwrap();
        let mut p = Product::empty();
        p.closing_time = Some(9);
        let s = closing_schedule(&p, now);
        assert_eq!(s.date, NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
        assert_eq!(s.hour, 9);

        p.closing_ymd = NaiveDate::from_ymd_opt(2027, 2, 3);
        assert_eq!(closing_schedule(&p, now).date, NaiveDate::from_ymd_opt(2027, 2, 3).unwrap());
    }
}
