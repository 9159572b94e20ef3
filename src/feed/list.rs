// SPDX-License-Identifier: MPL-2.0

//! Client-side state of one paged list.
//!
//! Models what the browser keeps per list: the page cursor, the rendered
//! fragments, the total page count read from the last paging block, and
//! whether the load-more control is visible. Requests are fire-and-forget;
//! whichever response completes last wins.

use crate::feed::FeedResponse;
use crate::feed::pagination::PaginationMode;
use crate::feed::request::LoadMoreRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Rendered,
}

#[derive(Debug, Clone)]
pub struct ListState {
    mode: PaginationMode,
    /// Search lists replace their content in `pages` mode
    replaces_content: bool,
    page: u32,
    per_page: u32,
    base: String,
    phase: Phase,
    refreshing: bool,
    control_visible: bool,
    items: Vec<String>,
    /// Total pages from the paging block currently in the content
    paging_total: Option<u32>,
    focus: Option<usize>,
}

impl ListState {
    pub fn new(mode: PaginationMode, page: u32, per_page: u32, base: impl Into<String>) -> Self {
        Self {
            mode,
            replaces_content: false,
            page: page.max(1),
            per_page,
            base: base.into(),
            phase: Phase::Idle,
            refreshing: false,
            control_visible: false,
            items: Vec::new(),
            paging_total: None,
            focus: None,
        }
    }

    /// Lists of search results are replaced, not extended, in `pages` mode
    pub fn for_search(mut self) -> Self {
        self.replaces_content = self.mode == PaginationMode::Pages;
        self
    }

    /// Take the synchronously rendered first response
    pub fn load_initial(&mut self, response: &FeedResponse) {
        self.append(response);
        self.control_visible = self.total_pages() > 1;
        self.phase = Phase::Rendered;
    }

    /// The load-more control was clicked
    pub fn click_more(&mut self) -> Option<LoadMoreRequest> {
        if self.mode != PaginationMode::More {
            return None;
        }
        Some(self.start_load())
    }

    /// The load-more control scrolled into view
    pub fn control_in_view(&mut self) -> Option<LoadMoreRequest> {
        if self.mode != PaginationMode::Infinite || self.refreshing || !self.control_visible {
            return None;
        }
        Some(self.start_load())
    }

    /// Restart from page 1
    pub fn refresh(&mut self) -> LoadMoreRequest {
        self.refreshing = true;
        self.page = 1;
        if !self.replaces_content {
            self.items.clear();
            self.paging_total = None;
        }
        if self.mode != PaginationMode::Pages {
            self.control_visible = true;
        }
        self.start_load()
    }

    fn start_load(&mut self) -> LoadMoreRequest {
        self.phase = Phase::Loading;
        LoadMoreRequest {
            page: Some(self.next_page()),
            per_page: Some(self.per_page),
            is_refresh: self.refreshing,
            pagination: Some(self.mode),
            base: Some(self.base.clone()),
            ..LoadMoreRequest::default()
        }
    }

    fn next_page(&self) -> u32 {
        if self.refreshing { 1 } else { self.page.saturating_add(1) }
    }

    /// Apply the response to a request issued for `requested` page
    pub fn complete(&mut self, requested: u32, response: &FeedResponse) {
        self.focus = None;
        if !matches!(response, FeedResponse::NoMoreData) {
            if self.replaces_content {
                self.items.clear();
                self.paging_total = None;
            }
            let first_new = self.items.len();
            self.append(response);
            if self.mode == PaginationMode::More && first_new < self.items.len() && first_new > 0 {
                self.focus = Some(first_new);
            }
        }

        if self.mode != PaginationMode::Pages {
            self.page = requested;
        }
        self.refreshing = false;
        self.phase = Phase::Rendered;

        if matches!(response, FeedResponse::NoMoreData) || requested.saturating_add(1) > self.total_pages() {
            self.control_visible = false;
        }
    }

    fn append(&mut self, response: &FeedResponse) {
        match response {
            FeedResponse::Page { html, total_pages } => {
                self.items.push(html.clone());
                if total_pages.is_some() {
                    self.paging_total = *total_pages;
                }
            }
            FeedResponse::NoResults(html) | FeedResponse::Unavailable(html) => {
                self.items.push(html.clone())
            }
            FeedResponse::NoMoreData => {}
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total_pages(&self) -> u32 {
        self.paging_total.unwrap_or(0)
    }

    pub fn control_visible(&self) -> bool {
        self.control_visible
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing
    }

    /// Rendered fragments, oldest first
    pub fn items(&self) -> &[String] {
        &self.items
    }

    /// Index of the fragment to focus after a "more" load
    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn html(&self) -> String {
        self.items.concat()
    }
}
