// SPDX-License-Identifier: MPL-2.0

//! Parameters of list requests, as received over HTTP.

use crate::feed::pagination::PaginationMode;
use crate::network::SiteId;
use once_cell::sync::Lazy;
use regex::Regex;

static TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>?").unwrap());
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static PERCENT_OCTETS: Lazy<Regex> = Lazy::new(|| Regex::new(r"%[a-fA-F0-9]{2}").unwrap());

/// Strip markup and collapse whitespace in free text
pub fn sanitize_text(raw: &str) -> String {
    let text = TAGS.replace_all(raw, "");
    let text = PERCENT_OCTETS.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Map the UI filter list onto the personal tri-state: only `members` selects
/// personal blogs, any other single filter selects group sites, anything else
/// disables the filter
pub fn personal_filter(filters: &[String]) -> Option<bool> {
    match filters {
        [only] => Some(only == "members"),
        _ => None,
    }
}

fn split_filters(raw: &str) -> Vec<String> {
    sanitize_text(raw)
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_int(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "on" | "yes"
    )
}

/// Body of an asynchronous load-more request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadMoreRequest {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub is_refresh: bool,
    pub pagination: Option<PaginationMode>,
    /// Pagination base URL template
    pub base: Option<String>,
    pub search: Option<String>,
    pub filters: Vec<String>,
    pub token: Option<String>,
}

/// A pagination base is a same-origin path or an absolute http(s) URL
fn valid_base(raw: &str) -> bool {
    if raw.starts_with('/') {
        return !raw.starts_with("//")
            && !raw.starts_with("/\\")
            && !raw.contains(char::is_whitespace);
    }
    url::Url::parse(raw).is_ok_and(|url| matches!(url.scheme(), "http" | "https"))
}

impl LoadMoreRequest {
    /// Parse a form-encoded body. Empty and malformed values are treated as
    /// absent.
    pub fn parse(body: &str) -> Self {
        let mut request = Self::default();

        for (key, value) in url::form_urlencoded::parse(body.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            match key.as_ref() {
                "page" => request.page = parse_int(&value),
                "per_page" => request.per_page = parse_int(&value),
                "is_refresh" => request.is_refresh = parse_bool(&value),
                "pagination" => request.pagination = Some(PaginationMode::parse(&sanitize_text(&value))),
                "base" => request.base = valid_base(&value).then(|| value.to_string()),
                "search" => request.search = Some(sanitize_text(&value)),
                "filters" => request.filters = split_filters(&value),
                "ajax_nonce" => request.token = Some(value.to_string()),
                _ => {}
            }
        }

        request
    }

    /// Encode as a form body
    pub fn to_form(&self) -> String {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        if let Some(page) = self.page {
            form.append_pair("page", &page.to_string());
        }
        if let Some(per_page) = self.per_page {
            form.append_pair("per_page", &per_page.to_string());
        }
        form.append_pair("is_refresh", if self.is_refresh { "true" } else { "false" });
        if let Some(mode) = self.pagination {
            form.append_pair("pagination", mode.as_str());
        }
        if let Some(base) = &self.base {
            form.append_pair("base", base);
        }
        if let Some(search) = &self.search {
            form.append_pair("search", search);
        }
        if !self.filters.is_empty() {
            form.append_pair("filters", &self.filters.join(","));
        }
        if let Some(token) = &self.token {
            form.append_pair("ajax_nonce", token);
        }
        form.finish()
    }

    /// Fill values the body left out from the page's query string
    pub fn with_query_vars(mut self, vars: &QueryVars, page_var: &str) -> Self {
        if self.page.is_none() {
            self.page = vars.page(page_var);
        }
        if self.filters.is_empty() {
            self.filters = vars.filters.clone();
        }
        self
    }
}

/// Query string of a synchronously rendered page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryVars {
    /// Search text (`q`)
    pub search: String,
    /// Search page (`pq`)
    pub search_page: Option<u32>,
    /// Publications page (`pp`)
    pub pubs_page: Option<u32>,
    /// Filters (`f`)
    pub filters: Vec<String>,
    pub per_page: Option<u32>,
    pub pagination: Option<PaginationMode>,
    pub max_pages: Option<u32>,
    /// Site the page is rendered on
    pub site: Option<SiteId>,
}

impl QueryVars {
    pub fn parse(query: &str) -> Self {
        let mut vars = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            match key.as_ref() {
                "q" => vars.search = sanitize_text(&value),
                "pq" => vars.search_page = parse_int(&value),
                "pp" => vars.pubs_page = parse_int(&value),
                "f" => vars.filters = split_filters(&value),
                "per_page" => vars.per_page = parse_int(&value),
                "pagination" => vars.pagination = Some(PaginationMode::parse(&value)),
                "max_pages" => vars.max_pages = parse_int(&value),
                "site" => vars.site = value.trim().parse().ok(),
                _ => {}
            }
        }

        vars
    }

    /// Page number for a page variable, floored at 1
    pub fn page(&self, var: &str) -> Option<u32> {
        match var {
            "pq" => self.search_page,
            "pp" => self.pubs_page,
            _ => None,
        }
        .map(|p| p.max(1))
    }
}
