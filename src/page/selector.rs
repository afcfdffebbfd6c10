//! Compound CSS selectors for the in-memory page.
//!
//! Supported: tag names, `#id`, `.class`, `[attr]`, `[attr=value]` with single,
//! double or no quotes, and comma-separated groups. Combinators are not; the
//! fill tables only use compound selectors.

use super::{PageError, PageResult};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// `(name, expected value)`; `None` means presence only.
    pub attrs: Vec<(String, Option<String>)>,
}

/// A selector list: matches when any group matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    pub groups: Vec<Compound>,
}

/// What a selector needs to know about an element.
pub trait Matchable {
    fn tag(&self) -> &str;
    fn attr(&self, name: &str) -> Option<&str>;
}

impl Selector {
    pub fn parse(input: &str) -> PageResult<Self> {
        let invalid = || PageError::InvalidSelector(input.to_string());
        let mut groups = Vec::new();
        for part in input.split(',') {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid());
            }
            groups.push(parse_compound(part).ok_or_else(invalid)?);
        }
        Ok(Self { groups })
    }

    pub fn matches<M: Matchable + ?Sized>(&self, el: &M) -> bool {
        self.groups.iter().any(|g| g.matches(el))
    }
}

impl Compound {
    pub fn matches<M: Matchable + ?Sized>(&self, el: &M) -> bool {
        if let Some(tag) = &self.tag {
            if !el.tag().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if el.attr("id") != Some(id.as_str()) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let have: Vec<&str> = el.attr("class").unwrap_or("").split_whitespace().collect();
            if !self.classes.iter().all(|c| have.contains(&c.as_str())) {
                return false;
            }
        }
        self.attrs.iter().all(|(name, expected)| match (el.attr(name), expected) {
            (Some(_), None) => true,
            (Some(actual), Some(want)) => actual == want,
            (None, _) => false,
        })
    }
}

fn parse_compound(s: &str) -> Option<Compound> {
    let mut out = Compound::default();
    let chars: Vec<char> = s.chars().collect();
    let mut i = 0;

    let ident = |i: &mut usize| -> Option<String> {
        let start = *i;
        while *i < chars.len() && is_ident_char(chars[*i]) {
            *i += 1;
        }
        (*i > start).then(|| chars[start..*i].iter().collect())
    };

    if i < chars.len() && is_ident_char(chars[i]) {
        out.tag = Some(ident(&mut i)?.to_ascii_lowercase());
    } else if i < chars.len() && chars[i] == '*' {
        i += 1;
    }

    while i < chars.len() {
        match chars[i] {
            '#' => {
                i += 1;
                out.id = Some(ident(&mut i)?);
            }
            '.' => {
                i += 1;
                out.classes.push(ident(&mut i)?);
            }
            '[' => {
                i += 1;
                let name = ident(&mut i)?;
                let value = if chars.get(i) == Some(&'=') {
                    i += 1;
                    Some(attr_value(&chars, &mut i)?)
                } else {
                    None
                };
                if chars.get(i) != Some(&']') {
                    return None;
                }
                i += 1;
                out.attrs.push((name, value));
            }
            _ => return None,
        }
    }
    Some(out)
}

fn attr_value(chars: &[char], i: &mut usize) -> Option<String> {
    match chars.get(*i) {
        Some(&q) if q == '\'' || q == '"' => {
            *i += 1;
            let start = *i;
            while *i < chars.len() && chars[*i] != q {
                *i += 1;
            }
            if *i >= chars.len() {
                return None;
            }
            let v = chars[start..*i].iter().collect();
            *i += 1;
            Some(v)
        }
        _ => {
            let start = *i;
            while *i < chars.len() && chars[*i] != ']' {
                *i += 1;
            }
            let v: String = chars[start..*i].iter().collect();
            (!v.is_empty()).then_some(v)
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}
