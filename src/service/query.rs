//! Filter sets, page requests and pagination metadata derived from query parameters.

use crate::sanitize;
use serde::Serialize;
use std::collections::BTreeMap;

/// Query keys that control paging and never become filters.
pub const RESERVED_KEYS: [&str; 4] = ["page", "per_page", "order_by", "order"];

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;
/// Largest page whose offset still fits a signed 64-bit OFFSET at any page size.
pub const MAX_PAGE: u64 = i64::MAX as u64 / MAX_PER_PAGE;

/// Equality constraints. Keys are sanitized identifiers; values are raw
/// (already cleaned) query strings, coerced per column when bound.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSet {
    entries: BTreeMap<String, String>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from query pairs: reserved keys and `id` are skipped, empty values
    /// ignored, keys sanitized. Later duplicates overwrite earlier ones.
    pub fn from_query(params: &[(String, String)]) -> Self {
        let mut set = FilterSet::new();
        for (k, v) in params {
            if RESERVED_KEYS.contains(&k.as_str()) || k == "id" || v.is_empty() {
                continue;
            }
            set.insert(k, v);
        }
        set
    }

    /// Insert with a sanitized key. Keys that sanitize to nothing are dropped.
    pub fn insert(&mut self, key: &str, value: &str) {
        let key = sanitize::field_name(key);
        if !key.is_empty() {
            self.entries.insert(key, value.to_string());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.entries.clone()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything but a case-insensitive "desc" is ascending.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
    /// Sanitized column name; empty means "primary key".
    pub order_by: String,
    pub order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
            order_by: String::new(),
            order: SortOrder::Asc,
        }
    }
}

impl PageRequest {
    /// Invalid values clamp to defaults rather than failing.
    pub fn from_query(params: &[(String, String)]) -> Self {
        let mut req = PageRequest::default();
        for (k, v) in params {
            match k.as_str() {
                "page" => {
                    req.page = match v.trim().parse::<u64>() {
                        Ok(n) if (1..=MAX_PAGE).contains(&n) => n,
                        _ => DEFAULT_PAGE,
                    }
                }
                "per_page" => {
                    req.per_page = match v.trim().parse::<i64>() {
                        Ok(n) if (1..=MAX_PER_PAGE as i64).contains(&n) => n as u64,
                        _ => DEFAULT_PER_PAGE,
                    }
                }
                "order_by" => req.order_by = sanitize::field_name(v),
                "order" => req.order = SortOrder::parse(v),
                _ => {}
            }
        }
        req
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// Pagination block returned with list responses.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
    pub next_page: Option<u64>,
    pub prev_page: Option<u64>,
}

impl Pagination {
    pub fn new(page: &PageRequest, total: u64) -> Self {
        let total_pages = total.div_ceil(page.per_page);
        let has_next = page.page < total_pages;
        let has_prev = page.page > 1;
        Pagination {
            current_page: page.page,
            per_page: page.per_page,
            total,
            total_pages,
            has_next,
            has_prev,
            next_page: has_next.then(|| page.page + 1),
            prev_page: has_prev.then(|| page.page - 1),
        }
    }
}
