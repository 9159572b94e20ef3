// SPDX-License-Identifier: MPL-2.0

//! Paged read path over the site directory and the community mirror.

pub mod list;
pub mod pagination;
pub mod render;
pub mod request;

pub use list::{ListState, Phase};
pub use pagination::{PageLink, PaginationMode};
pub use request::{LoadMoreRequest, QueryVars};

use crate::config::{MAIN_SITE_ID, MAX_PER_PAGE};
use crate::mirror::PostMirror;
use crate::network::{Network, NetworkError, PostStatus, SiteId, SiteScope, UserId, Visibility};
use crate::search::{self, SearchError, SearchFilter, SearchResults, SortField, SortOrder};
use crate::state::CommunitySettings;
use crate::store::{MirrorPost, MirrorStore, PublicationQuery, StoreDb, StoreError};
use render::PublicationView;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("invalid security token sent")]
    InvalidToken,
    #[error(transparent)]
    Search(#[from] SearchError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// The two list surfaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Search,
    Publications,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Surface::Search => "community search",
            Surface::Publications => "recent activity",
        }
    }

    /// Query variable carrying the page number
    pub fn page_var(self) -> &'static str {
        match self {
            Surface::Search => "pq",
            Surface::Publications => "pp",
        }
    }

    fn dom_key(self) -> &'static str {
        match self {
            Surface::Search => "search",
            Surface::Publications => "pubs",
        }
    }
}

/// Where a list request comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Synchronous first render
    Initial,
    /// Asynchronous next page
    Background,
    /// Asynchronous reload from page 1
    Refresh,
}

impl RequestKind {
    pub fn for_async(is_refresh: bool) -> Self {
        if is_refresh {
            RequestKind::Refresh
        } else {
            RequestKind::Background
        }
    }

    fn renders_paging(self) -> bool {
        self != RequestKind::Background
    }

    fn empty_response(self) -> FeedResponse {
        match self {
            RequestKind::Background => FeedResponse::NoMoreData,
            _ => FeedResponse::NoResults(render::no_results()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedResponse {
    /// Rendered items; `total_pages` is set when a paging block was included
    Page {
        html: String,
        total_pages: Option<u32>,
    },
    NoResults(String),
    /// The surface is not offered on the requesting site
    Unavailable(String),
    /// Empty background load
    NoMoreData,
}

impl FeedResponse {
    /// Response body as sent to the client
    pub fn body(&self) -> &str {
        match self {
            FeedResponse::Page { html, .. } => html,
            FeedResponse::NoResults(html) | FeedResponse::Unavailable(html) => html,
            FeedResponse::NoMoreData => "0",
        }
    }
}

/// Who is reading the activity feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Anonymous,
    Member(UserId),
}

impl Viewer {
    fn statuses(self) -> Vec<PostStatus> {
        match self {
            Viewer::Anonymous => vec![PostStatus::Publish],
            Viewer::Member(_) => vec![PostStatus::Publish, PostStatus::Private],
        }
    }

    fn visibilities(self) -> Vec<Visibility> {
        match self {
            Viewer::Anonymous => vec![Visibility::World],
            Viewer::Member(_) => vec![Visibility::World, Visibility::Campus],
        }
    }
}

/// Defaults of a surface, used where a request leaves a value out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceOptions {
    pub per_page: u32,
    pub pagination: PaginationMode,
    /// Cap on reported pages; 0 = unlimited
    pub max_pages: u32,
}

impl SurfaceOptions {
    pub fn search() -> Self {
        Self {
            per_page: 5,
            pagination: PaginationMode::Pages,
            max_pages: 0,
        }
    }

    pub fn publications() -> Self {
        Self {
            per_page: 10,
            pagination: PaginationMode::Infinite,
            max_pages: 100,
        }
    }

    /// Pagination mode and page size for a request, capped at
    /// [`MAX_PER_PAGE`]
    fn resolve(&self, request: &LoadMoreRequest) -> (PaginationMode, u32) {
        let mode = request.pagination.unwrap_or(self.pagination);
        let per_page = request
            .per_page
            .filter(|&n| n > 0)
            .unwrap_or(self.per_page);
        (mode, mode.per_page(per_page).min(MAX_PER_PAGE))
    }
}

/// One page of the activity feed
#[derive(Debug, Clone)]
pub struct PublicationPage {
    pub posts: Vec<MirrorPost>,
    pub total: u64,
    /// Page count after applying `max_pages`
    pub page_count: u32,
}

pub struct Feed<'a> {
    settings: &'a CommunitySettings,
    db: &'a StoreDb,
    network: &'a dyn Network,
}

impl<'a> Feed<'a> {
    pub fn new(settings: &'a CommunitySettings, db: &'a StoreDb, network: &'a dyn Network) -> Self {
        Self {
            settings,
            db,
            network,
        }
    }

    /// Surfaces are offered on the community site and the main site only
    pub fn is_available(&self, site: SiteId) -> bool {
        site == MAIN_SITE_ID || self.settings.community_site() == Some(site)
    }

    /// Reject asynchronous requests without the shared token
    pub fn check_token(&self, token: Option<&str>) -> Result<(), FeedError> {
        let expected = self.settings.request_token.as_str();
        match token {
            Some(token) if !expected.is_empty() && token == expected => Ok(()),
            _ => Err(FeedError::InvalidToken),
        }
    }

    /// Directory search, sorted by name
    pub fn search(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
        filters: &[String],
    ) -> Result<SearchResults, FeedError> {
        let filter = SearchFilter::new(per_page)?
            .text(query)
            .personal(request::personal_filter(filters))
            .sort(Some(SortField::BlogName), SortOrder::Asc)
            .page(page);
        Ok(search::search(self.db, filter)?)
    }

    /// Mirror posts visible to `viewer`, most recently modified first
    pub fn list_publications(
        &self,
        page: u32,
        per_page: u32,
        max_pages: u32,
        viewer: Viewer,
    ) -> Result<PublicationPage, FeedError> {
        let Some(community) = self.settings.community_site() else {
            tracing::warn!("no community site configured, activity feed is empty");
            return Ok(PublicationPage {
                posts: Vec::new(),
                total: 0,
                page_count: 0,
            });
        };

        let scope = SiteScope::enter(self.network, community)?;
        let query = PublicationQuery {
            statuses: viewer.statuses(),
            visibilities: viewer.visibilities(),
            page: page.max(1),
            per_page,
        };
        let (posts, total) = MirrorStore::new(self.db).page(&scope, &query)?;

        let mut page_count = search::page_count(total, per_page);
        if max_pages > 0 && max_pages <= page_count {
            page_count = max_pages;
        }

        Ok(PublicationPage {
            posts,
            total,
            page_count,
        })
    }

    /// Rendered page of search results
    pub fn search_page(
        &self,
        request: &LoadMoreRequest,
        options: &SurfaceOptions,
        kind: RequestKind,
    ) -> Result<FeedResponse, FeedError> {
        let (mode, per_page) = options.resolve(request);
        let page = request.page.unwrap_or(1).max(1);
        let query = request.search.as_deref().unwrap_or("");

        let results = self.search(query, page, per_page, &request.filters)?;
        tracing::debug!(
            query,
            page,
            per_page,
            total = results.total,
            ?kind,
            "search page requested"
        );
        if results.rows.is_empty() {
            return Ok(kind.empty_response());
        }

        let html: String = results.rows.iter().map(render::site_result).collect();
        Ok(self.with_paging(html, Surface::Search, results.page_count, page, mode, request, kind))
    }

    /// Rendered page of the activity feed
    pub fn publications_page(
        &self,
        request: &LoadMoreRequest,
        options: &SurfaceOptions,
        viewer: Viewer,
        kind: RequestKind,
    ) -> Result<FeedResponse, FeedError> {
        let (mode, per_page) = options.resolve(request);
        let page = request.page.unwrap_or(1).max(1);

        let result = self.list_publications(page, per_page, options.max_pages, viewer)?;
        tracing::debug!(page, per_page, total = result.total, ?viewer, ?kind, "publications page requested");
        if result.posts.is_empty() {
            return Ok(kind.empty_response());
        }

        let mirror = PostMirror::new(self.settings, self.db, self.network);
        let html: String = result
            .posts
            .iter()
            .map(|post| render::publication(&self.publication_view(&mirror, post)))
            .collect();
        Ok(self.with_paging(html, Surface::Publications, result.page_count, page, mode, request, kind))
    }

    /// Fragment shown on sites that do not offer `surface`
    pub fn unavailable(&self, surface: Surface) -> FeedResponse {
        FeedResponse::Unavailable(render::unavailable(surface))
    }

    #[allow(clippy::too_many_arguments)]
    fn with_paging(
        &self,
        mut html: String,
        surface: Surface,
        total_pages: u32,
        page: u32,
        mode: PaginationMode,
        request: &LoadMoreRequest,
        kind: RequestKind,
    ) -> FeedResponse {
        if !kind.renders_paging() || total_pages <= 1 {
            return FeedResponse::Page {
                html,
                total_pages: None,
            };
        }

        let base = request
            .base
            .as_deref()
            .unwrap_or(pagination::BASE_PLACEHOLDER);
        let links = pagination::page_links(total_pages, page, base, surface.page_var());
        html.push_str(&render::paging_block(surface, total_pages, mode, &links));
        FeedResponse::Page {
            html,
            total_pages: Some(total_pages),
        }
    }

    fn publication_view<'p>(&self, mirror: &PostMirror<'_>, post: &'p MirrorPost) -> PublicationView<'p> {
        let (site_name, site_url) = SiteScope::enter(self.network, post.origin_site_id)
            .ok()
            .and_then(|scope| self.network.site_info(&scope).ok())
            .map(|info| (info.name, info.url.unwrap_or_default()))
            .unwrap_or_default();

        PublicationView {
            post,
            site_name,
            site_url,
            permalink: mirror.permalink_for(post),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexer::{ReindexTarget, SiteIndexer};
    use crate::network::{MemoryNetwork, OriginPost, SaveRequest, SiteInfo, User};
    use chrono::NaiveDate;

    const BLOG: SiteId = 2;
    const COMMUNITY: SiteId = 5;
    const AUTHOR: UserId = 7;

    fn settings() -> CommunitySettings {
        CommunitySettings {
            community_site: COMMUNITY,
            request_token: "secret".to_string(),
            ..CommunitySettings::default()
        }
    }

    fn network() -> MemoryNetwork {
        let net = MemoryNetwork::with_sites(&[1]);
        for (id, name, personal) in [
            (BLOG, "Jo's Blog", true),
            (3, "Alpha Lab", false),
            (4, "Alpha Journal", true),
            (COMMUNITY, "Commons", false),
        ] {
            net.put_site(
                SiteInfo {
                    id,
                    name: name.to_string(),
                    description: String::new(),
                    url: Some(format!("https://s{id}.test")),
                    personal,
                    admin_email: String::new(),
                    gmt_offset: 0,
                },
                None,
            );
        }
        net.put_user(User {
            id: AUTHOR,
            email: "jo@campus.test".to_string(),
            display_name: None,
            editor_of: Vec::new(),
            super_admin: false,
        });
        net
    }

    fn publish(net: &MemoryNetwork, mirror: &PostMirror<'_>, id: u64, visibility: Visibility) {
        let at = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, id as u32 % 60, 0)
            .unwrap();
        let post = OriginPost {
            id,
            post_type: "post".to_string(),
            status: PostStatus::Publish,
            title: format!("Post {id}"),
            content: String::new(),
            excerpt: String::new(),
            author: AUTHOR,
            date: at,
            date_gmt: Some(at),
            modified: at,
            modified_gmt: Some(at),
            is_revision: false,
            is_autosave: false,
            visibility,
            groups: Vec::new(),
            share: None,
        };
        net.put_post(BLOG, post.clone()).unwrap();
        let request = SaveRequest {
            user_id: AUTHOR,
            share: Some("1".to_string()),
            action: None,
        };
        mirror.on_post_saved(BLOG, &post, &request).unwrap();
    }

    #[test]
    fn test_page_size_resolution() {
        let options = SurfaceOptions::search();
        let resolve = |per_page, pagination| {
            options.resolve(&LoadMoreRequest {
                per_page,
                pagination,
                ..LoadMoreRequest::default()
            })
        };

        assert_eq!(resolve(None, None), (PaginationMode::Pages, 5));
        assert_eq!(resolve(Some(0), None), (PaginationMode::Pages, 5));
        assert_eq!(resolve(Some(3), Some(PaginationMode::Infinite)), (PaginationMode::Infinite, 10));
        assert_eq!(resolve(Some(u32::MAX), None), (PaginationMode::Pages, MAX_PER_PAGE));
        assert_eq!(
            resolve(Some(u32::MAX), Some(PaginationMode::Infinite)),
            (PaginationMode::Infinite, MAX_PER_PAGE)
        );
    }

    #[test]
    fn test_huge_page_numbers_are_past_the_end() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let settings = settings();
        SiteIndexer::new(&db, &net).reindex(ReindexTarget::All).unwrap();
        let mirror = PostMirror::new(&settings, &db, &net);
        publish(&net, &mirror, 1, Visibility::World);

        let feed = Feed::new(&settings, &db, &net);
        let request = LoadMoreRequest {
            page: Some(u32::MAX),
            per_page: Some(u32::MAX),
            search: Some("alpha".to_string()),
            ..LoadMoreRequest::default()
        };

        assert_eq!(
            feed.search_page(&request, &SurfaceOptions::search(), RequestKind::Background)
                .unwrap(),
            FeedResponse::NoMoreData
        );
        let response = feed
            .publications_page(
                &request,
                &SurfaceOptions::publications(),
                Viewer::Anonymous,
                RequestKind::Initial,
            )
            .unwrap();
        assert!(response.body().contains("No results found"));
    }

    #[test]
    fn test_availability_and_token() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let settings = settings();
        let feed = Feed::new(&settings, &db, &net);

        assert!(feed.is_available(1));
        assert!(feed.is_available(COMMUNITY));
        assert!(!feed.is_available(BLOG));
        assert!(matches!(feed.unavailable(Surface::Search), FeedResponse::Unavailable(_)));

        assert!(feed.check_token(Some("secret")).is_ok());
        assert!(matches!(feed.check_token(Some("nope")), Err(FeedError::InvalidToken)));
        assert!(matches!(feed.check_token(None), Err(FeedError::InvalidToken)));

        let open = CommunitySettings::default();
        let feed = Feed::new(&open, &db, &net);
        assert!(matches!(feed.check_token(Some("")), Err(FeedError::InvalidToken)));
    }

    #[test]
    fn test_search_page_kinds() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let settings = settings();
        SiteIndexer::new(&db, &net).reindex(ReindexTarget::All).unwrap();
        let feed = Feed::new(&settings, &db, &net);
        let options = SurfaceOptions::search();

        let request = LoadMoreRequest {
            search: Some("alpha".to_string()),
            per_page: Some(1),
            ..LoadMoreRequest::default()
        };
        let FeedResponse::Page { html, total_pages } =
            feed.search_page(&request, &options, RequestKind::Initial).unwrap()
        else {
            panic!("expected a page");
        };
        assert_eq!(total_pages, Some(2));
        // Sorted by name: "Alpha Journal" first
        assert!(html.contains("Alpha Journal"));
        assert!(html.contains(r#"class="commons-pagination" data-total-pages="2""#));

        let background = LoadMoreRequest {
            page: Some(2),
            ..request.clone()
        };
        let FeedResponse::Page { html, total_pages } =
            feed.search_page(&background, &options, RequestKind::Background).unwrap()
        else {
            panic!("expected a page");
        };
        assert_eq!(total_pages, None);
        assert!(html.contains("Alpha Lab"));
        assert!(!html.contains("data-total-pages"));

        let members = LoadMoreRequest {
            filters: vec!["members".to_string()],
            ..request.clone()
        };
        let FeedResponse::Page { html, total_pages } =
            feed.search_page(&members, &options, RequestKind::Initial).unwrap()
        else {
            panic!("expected a page");
        };
        assert!(html.contains("Alpha Journal"));
        assert_eq!(total_pages, None);
    }

    #[test]
    fn test_empty_search_by_kind() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let settings = settings();
        let feed = Feed::new(&settings, &db, &net);
        let options = SurfaceOptions::search();
        let request = LoadMoreRequest {
            search: Some("nothing".to_string()),
            ..LoadMoreRequest::default()
        };

        assert_eq!(
            feed.search_page(&request, &options, RequestKind::Background).unwrap(),
            FeedResponse::NoMoreData
        );
        assert_eq!(FeedResponse::NoMoreData.body(), "0");
        for kind in [RequestKind::Initial, RequestKind::Refresh] {
            let response = feed.search_page(&request, &options, kind).unwrap();
            assert!(response.body().contains("No results found"));
        }
    }

    #[test]
    fn test_publications_scope_by_viewer() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let settings = settings();
        let mirror = PostMirror::new(&settings, &db, &net);
        publish(&net, &mirror, 1, Visibility::World);
        publish(&net, &mirror, 2, Visibility::Campus);
        publish(&net, &mirror, 3, Visibility::World);

        let feed = Feed::new(&settings, &db, &net);
        let public = feed.list_publications(1, 10, 0, Viewer::Anonymous).unwrap();
        let ids: Vec<_> = public.posts.iter().map(|p| p.origin_post_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(public.total, 2);

        let members = feed.list_publications(1, 10, 0, Viewer::Member(AUTHOR)).unwrap();
        let ids: Vec<_> = members.posts.iter().map(|p| p.origin_post_id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert_eq!(net.current_site(), 1);
    }

    #[test]
    fn test_max_pages_clamps_page_count() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let settings = settings();
        let mirror = PostMirror::new(&settings, &db, &net);
        for id in 1..=6 {
            publish(&net, &mirror, id, Visibility::World);
        }

        let feed = Feed::new(&settings, &db, &net);
        assert_eq!(feed.list_publications(1, 1, 0, Viewer::Anonymous).unwrap().page_count, 6);
        assert_eq!(feed.list_publications(1, 1, 4, Viewer::Anonymous).unwrap().page_count, 4);
        assert_eq!(feed.list_publications(1, 1, 9, Viewer::Anonymous).unwrap().page_count, 6);
    }

    #[test]
    fn test_publication_fragment() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let settings = settings();
        let mirror = PostMirror::new(&settings, &db, &net);
        publish(&net, &mirror, 1, Visibility::World);

        let feed = Feed::new(&settings, &db, &net);
        let response = feed
            .publications_page(
                &LoadMoreRequest::default(),
                &SurfaceOptions::publications(),
                Viewer::Anonymous,
                RequestKind::Initial,
            )
            .unwrap();
        let body = response.body();
        assert!(body.contains("Jo&#039;s Blog"));
        assert!(body.contains(r#"<a href="https://s2.test/?p=1">Post 1</a>"#));
        assert!(!body.contains("data-total-pages"));
    }

    #[test]
    fn test_list_against_feed() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let settings = settings();
        let mirror = PostMirror::new(&settings, &db, &net);
        for id in 1..=25 {
            publish(&net, &mirror, id, Visibility::World);
        }

        let feed = Feed::new(&settings, &db, &net);
        let options = SurfaceOptions::publications();
        let mut list = ListState::new(PaginationMode::Infinite, 1, 10, "https://c.test/%_%");

        let initial = feed
            .publications_page(&LoadMoreRequest::default(), &options, Viewer::Anonymous, RequestKind::Initial)
            .unwrap();
        list.load_initial(&initial);
        assert_eq!(list.total_pages(), 3);
        assert!(list.control_visible());

        while let Some(request) = list.control_in_view() {
            let response = feed
                .publications_page(&request, &options, Viewer::Anonymous, RequestKind::for_async(request.is_refresh))
                .unwrap();
            list.complete(request.page.unwrap_or(1), &response);
        }
        assert_eq!(list.page(), 3);
        assert_eq!(list.html().matches("commons-list__item").count(), 25);

        // Everything unshared: a refresh now finds nothing
        let scope = SiteScope::enter(&net, COMMUNITY).unwrap();
        let store = MirrorStore::new(&db);
        store.delete_oldest(&scope, 100).unwrap();
        drop(scope);

        let request = list.refresh();
        let response = feed
            .publications_page(&request, &options, Viewer::Anonymous, RequestKind::for_async(request.is_refresh))
            .unwrap();
        list.complete(1, &response);
        assert!(list.html().contains("No results found"));
        assert!(!list.control_visible());
    }
}
