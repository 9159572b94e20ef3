// SPDX-License-Identifier: MPL-2.0

//! Pagination strategies and numbered page links.

use serde::{Deserialize, Serialize};

/// Smallest page size used for infinite scroll
pub const MIN_INFINITE_PER_PAGE: u32 = 10;

/// Placeholder in a base URL replaced by the page query
pub const BASE_PLACEHOLDER: &str = "%_%";

const NUMBER_PLACEHOLDER: &str = "%#%";

/// How a list advances between pages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationMode {
    /// Next page loads when the control scrolls into view
    #[default]
    Infinite,
    /// Next page loads when the control is clicked
    More,
    /// Numbered links, one page per full load
    Pages,
}

impl PaginationMode {
    /// Unknown strategies fall back to infinite scroll
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "more" => PaginationMode::More,
            "pages" => PaginationMode::Pages,
            _ => PaginationMode::Infinite,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PaginationMode::Infinite => "infinite",
            PaginationMode::More => "more",
            PaginationMode::Pages => "pages",
        }
    }

    /// Page size actually used for a requested size
    pub fn per_page(self, requested: u32) -> u32 {
        match self {
            PaginationMode::Infinite => requested.max(MIN_INFINITE_PER_PAGE),
            _ => requested,
        }
    }
}

/// One entry of a numbered pagination bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageLink {
    Prev(String),
    Page { number: u32, url: String },
    Current(u32),
    Dots,
    Next(String),
}

/// Build the URL of page `number` from a base template.
///
/// `%_%` in the base becomes `?{var}=N`, or nothing for page 1. Extra query
/// arguments appended to the base with `&` are kept.
pub fn page_url(base: &str, var: &str, number: u32) -> String {
    let format = if number == 1 {
        String::new()
    } else {
        format!("?{}={}", var, NUMBER_PLACEHOLDER)
    };
    let url = base
        .replace(BASE_PLACEHOLDER, &format)
        .replace(NUMBER_PLACEHOLDER, &number.to_string());

    match (url.find('?'), url.find('&')) {
        (None, Some(amp)) => format!("{}?{}", &url[..amp], &url[amp + 1..]),
        _ => url,
    }
}

/// End and middle window sizes, and whether every page is listed
fn window(total: u32, current: u32) -> (u32, u32, bool) {
    let mut end = 1;
    let mut mid = 2;
    if current + 2 >= total || current < 3 {
        end = 3;
    }
    if current == 3 || current + 2 == total {
        end = 1;
        mid = 2;
    }
    (end, mid, total <= 7)
}

/// Numbered links for `total` pages with `current` selected.
/// Returns nothing when there is at most one page.
pub fn page_links(total: u32, current: u32, base: &str, var: &str) -> Vec<PageLink> {
    if total <= 1 {
        return Vec::new();
    }
    let current = current.clamp(1, total);
    let (end, mid, show_all) = window(total, current);

    let mut links = Vec::new();
    if current > 1 {
        links.push(PageLink::Prev(page_url(base, var, current - 1)));
    }

    let mut dots = false;
    for n in 1..=total {
        if n == current {
            links.push(PageLink::Current(n));
            dots = true;
        } else if show_all
            || n <= end
            || (n + mid >= current && n <= current + mid)
            || n > total.saturating_sub(end)
        {
            links.push(PageLink::Page {
                number: n,
                url: page_url(base, var, n),
            });
            dots = true;
        } else if dots {
            links.push(PageLink::Dots);
            dots = false;
        }
    }

    if current < total {
        links.push(PageLink::Next(page_url(base, var, current + 1)));
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbers(links: &[PageLink]) -> String {
        links
            .iter()
            .filter_map(|l| match l {
                PageLink::Page { number, .. } => Some(number.to_string()),
                PageLink::Current(n) => Some(format!("[{n}]")),
                PageLink::Dots => Some("…".to_string()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[test]
    fn test_mode_parse_and_page_size() {
        assert_eq!(PaginationMode::parse("pages"), PaginationMode::Pages);
        assert_eq!(PaginationMode::parse("more"), PaginationMode::More);
        assert_eq!(PaginationMode::parse("sideways"), PaginationMode::Infinite);
        assert_eq!(PaginationMode::Infinite.per_page(5), 10);
        assert_eq!(PaginationMode::Infinite.per_page(25), 25);
        assert_eq!(PaginationMode::Pages.per_page(5), 5);
    }

    #[test]
    fn test_page_url() {
        let base = "https://c.test/community/%_%";
        assert_eq!(page_url(base, "pq", 1), "https://c.test/community/");
        assert_eq!(page_url(base, "pq", 3), "https://c.test/community/?pq=3");
        assert_eq!(
            page_url("https://c.test/community/%_%&q=bio", "pq", 2),
            "https://c.test/community/?pq=2&q=bio"
        );
        assert_eq!(
            page_url("https://c.test/community/%_%&q=bio", "pq", 1),
            "https://c.test/community/?q=bio"
        );
    }

    #[test]
    fn test_single_page_has_no_links() {
        assert!(page_links(0, 1, "%_%", "pp").is_empty());
        assert!(page_links(1, 1, "%_%", "pp").is_empty());
    }

    #[test]
    fn test_short_ranges_show_all() {
        let links = page_links(7, 4, "%_%", "pp");
        assert_eq!(numbers(&links), "1 2 3 [4] 5 6 7");
        assert_eq!(links.first(), Some(&PageLink::Prev("?pp=3".to_string())));
        assert_eq!(links.last(), Some(&PageLink::Next("?pp=5".to_string())));
    }

    #[test]
    fn test_windows_on_long_ranges() {
        assert_eq!(numbers(&page_links(20, 1, "%_%", "pp")), "[1] 2 3 … 18 19 20");
        assert_eq!(numbers(&page_links(20, 3, "%_%", "pp")), "1 2 [3] 4 5 … 20");
        assert_eq!(numbers(&page_links(20, 10, "%_%", "pp")), "1 … 8 9 [10] 11 12 … 20");
        assert_eq!(numbers(&page_links(20, 18, "%_%", "pp")), "1 … 16 17 [18] 19 20");
        assert_eq!(numbers(&page_links(20, 20, "%_%", "pp")), "1 2 3 … 18 19 [20]");
    }

    #[test]
    fn test_prev_next_presence() {
        let first = page_links(10, 1, "%_%", "pq");
        assert!(!first.iter().any(|l| matches!(l, PageLink::Prev(_))));
        assert!(first.iter().any(|l| matches!(l, PageLink::Next(_))));

        let last = page_links(10, 10, "%_%", "pq");
        assert!(last.iter().any(|l| matches!(l, PageLink::Prev(_))));
        assert!(!last.iter().any(|l| matches!(l, PageLink::Next(_))));

        // Out of range pages are clamped
        let past = page_links(10, 30, "%_%", "pq");
        assert!(past.contains(&PageLink::Current(10)));
    }
}
