// SPDX-License-Identifier: MPL-2.0

//! HTTP adapter.
//!
//! Serves the two list surfaces synchronously (`GET /search`,
//! `GET /publications`) and asynchronously (`POST /load-more/search`,
//! `POST /load-more/pubs`), and accepts host lifecycle events as JSON on
//! `POST /events`.

use crate::app::Community;
use crate::config::MAIN_SITE_ID;
use crate::events::PlatformEvent;
use crate::feed::pagination::BASE_PLACEHOLDER;
use crate::feed::{
    FeedError, LoadMoreRequest, QueryVars, RequestKind, Surface, SurfaceOptions, Viewer,
};
use crate::network::{MemoryNetwork, Network, NetworkError, SiteRecord, SiteScope};
use serde::Serialize;
use std::io::Read;
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server};

/// Largest request body read
const MAX_BODY: u64 = 1 << 20;

/// Header carrying the authenticated user id, set by the fronting proxy
pub const VIEWER_HEADER: &str = "X-Authenticated-User";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("failed to bind {0}")]
    Bind(String),
    #[error("invalid security token sent")]
    InvalidToken,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid event payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Feed(FeedError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FeedError> for ServerError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::InvalidToken => ServerError::InvalidToken,
            other => ServerError::Feed(other),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ServerError {
    /// Status code and JSON body for this error
    fn reply(&self) -> Reply {
        let (status, error, message) = match self {
            Self::InvalidToken => (400, "invalid_token", Some("Invalid security token sent.".to_string())),
            Self::BadRequest(msg) => (400, "bad_request", Some(msg.clone())),
            Self::Payload(err) => (400, "bad_request", Some(err.to_string())),
            Self::Network(err) => (400, "bad_request", Some(err.to_string())),
            Self::NotFound(msg) => (404, "not_found", Some(msg.clone())),
            Self::Bind(_) | Self::Feed(_) | Self::Io(_) => {
                tracing::error!(error = %self, "internal server error");
                (500, "internal_error", Some("An internal error occurred".to_string()))
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            message,
        };
        Reply::json(status, &body)
    }
}

/// Transport-independent view of an incoming request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub path: String,
    pub query: String,
    pub viewer: Viewer,
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: Method, url: &str) -> Self {
        let (path, query) = url.split_once('?').unwrap_or((url, ""));
        Self {
            method,
            path: path.to_string(),
            query: query.to_string(),
            viewer: Viewer::Anonymous,
            body: String::new(),
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_viewer(mut self, viewer: Viewer) -> Self {
        self.viewer = viewer;
        self
    }

    fn read(request: &mut tiny_http::Request) -> Result<Self, ServerError> {
        let viewer = request
            .headers()
            .iter()
            .find(|h| h.field.equiv(VIEWER_HEADER))
            .and_then(|h| h.value.as_str().trim().parse().ok())
            .map_or(Viewer::Anonymous, Viewer::Member);

        let mut body = String::new();
        request
            .as_reader()
            .take(MAX_BODY)
            .read_to_string(&mut body)?;

        Ok(Self::new(request.method().clone(), request.url())
            .with_viewer(viewer)
            .with_body(body))
    }
}

/// Response before it is handed to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl Reply {
    fn html(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            content_type: "text/html; charset=UTF-8",
            body: body.into(),
        }
    }

    fn json(status: u16, body: &impl Serialize) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: serde_json::to_string(body).unwrap_or_default(),
        }
    }

    fn into_response(self) -> Response<std::io::Cursor<Vec<u8>>> {
        let response = Response::from_string(self.body).with_status_code(self.status);
        match Header::from_bytes(&b"Content-Type"[..], self.content_type.as_bytes()) {
            Ok(header) => response.with_header(header),
            Err(()) => response,
        }
    }
}

/// Serve requests on `addr` until the listener shuts down
pub fn serve(app: &Community<MemoryNetwork>, addr: &str) -> Result<(), ServerError> {
    let server = Server::http(addr).map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;
    tracing::info!(addr, "starting server");

    for mut request in server.incoming_requests() {
        let reply = match HttpRequest::read(&mut request) {
            Ok(http) => handle(app, &http),
            Err(e) => e.reply(),
        };
        tracing::info!(
            method = %request.method(),
            path = request.url(),
            status = reply.status,
            "http_request"
        );
        if let Err(e) = request.respond(reply.into_response()) {
            tracing::warn!("failed to send response: {}", e);
        }
    }

    Ok(())
}

/// Route one request
pub fn handle(app: &Community<MemoryNetwork>, request: &HttpRequest) -> Reply {
    let result = match (&request.method, request.path.as_str()) {
        (Method::Post, "/load-more/search") => load_more(app, request, Surface::Search),
        (Method::Post, "/load-more/pubs") => load_more(app, request, Surface::Publications),
        (Method::Get, "/search") => initial(app, request, Surface::Search),
        (Method::Get, "/publications") => initial(app, request, Surface::Publications),
        (Method::Post, "/events") => apply_event(app, &request.body),
        (method, path) => Err(ServerError::NotFound(format!("{method} {path}"))),
    };

    result.unwrap_or_else(|e| e.reply())
}

fn load_more(
    app: &Community<MemoryNetwork>,
    request: &HttpRequest,
    surface: Surface,
) -> Result<Reply, ServerError> {
    let feed = app.feed();
    let load = LoadMoreRequest::parse(&request.body);
    feed.check_token(load.token.as_deref())?;

    let kind = RequestKind::for_async(load.is_refresh);
    let response = match surface {
        Surface::Search => feed.search_page(&load, &SurfaceOptions::search(), kind)?,
        Surface::Publications => {
            feed.publications_page(&load, &SurfaceOptions::publications(), request.viewer, kind)?
        }
    };
    Ok(Reply::html(response.body()))
}

fn initial(
    app: &Community<MemoryNetwork>,
    request: &HttpRequest,
    surface: Surface,
) -> Result<Reply, ServerError> {
    let feed = app.feed();
    let vars = QueryVars::parse(&request.query);

    if !feed.is_available(vars.site.unwrap_or(MAIN_SITE_ID)) {
        return Ok(Reply::html(feed.unavailable(surface).body()));
    }

    let load = LoadMoreRequest {
        per_page: vars.per_page,
        pagination: vars.pagination,
        base: Some(page_base(&request.path, surface, &vars)),
        search: Some(vars.search.clone()),
        ..LoadMoreRequest::default()
    }
    .with_query_vars(&vars, surface.page_var());

    let response = match surface {
        Surface::Search => {
            // Nothing is listed until a search is submitted with a filter
            if vars.search.is_empty() || vars.filters.is_empty() {
                return Ok(Reply::html(""));
            }
            feed.search_page(&load, &SurfaceOptions::search(), RequestKind::Initial)?
        }
        Surface::Publications => {
            let mut options = SurfaceOptions::publications();
            if let Some(max_pages) = vars.max_pages {
                options.max_pages = max_pages;
            }
            feed.publications_page(&load, &options, request.viewer, RequestKind::Initial)?
        }
    };
    Ok(Reply::html(response.body()))
}

/// Pagination base for a page, keeping the arguments that select its content
fn page_base(path: &str, surface: Surface, vars: &QueryVars) -> String {
    let mut extra = url::form_urlencoded::Serializer::new(String::new());
    if surface == Surface::Search {
        if !vars.search.is_empty() {
            extra.append_pair("q", &vars.search);
        }
        if !vars.filters.is_empty() {
            extra.append_pair("f", &vars.filters.join(","));
        }
    }
    if let Some(site) = vars.site {
        extra.append_pair("site", &site.to_string());
    }

    match extra.finish() {
        args if args.is_empty() => format!("{path}{BASE_PLACEHOLDER}"),
        args => format!("{path}{BASE_PLACEHOLDER}&{args}"),
    }
}

#[derive(Debug, Serialize)]
struct EventAck {
    event: &'static str,
    ok: bool,
}

/// Apply a host event: bring the in-memory host up to date, then notify the
/// sinks. Removals reach the host only after the sinks ran.
fn apply_event(app: &Community<MemoryNetwork>, body: &str) -> Result<Reply, ServerError> {
    if body.trim().is_empty() {
        return Err(ServerError::BadRequest("empty event body".to_string()));
    }
    let mut value: serde_json::Value = serde_json::from_str(body)?;
    let record = value
        .as_object_mut()
        .and_then(|fields| fields.remove("site_record"))
        .map(serde_json::from_value::<SiteRecord>)
        .transpose()?;
    let event: PlatformEvent = serde_json::from_value(value)?;
    let network = app.network();

    if let Some(record) = record {
        let site = record.info.id;
        network.put_site(record.info, record.semester);
        for post in record.posts {
            network.put_post(site, post)?;
        }
    }

    match &event {
        PlatformEvent::PostSaved { site, post, .. } => {
            let mut post = post.clone();
            if post.share.is_none() {
                let scope = SiteScope::enter(network, *site)?;
                post.share = network.share_flag(&scope, post.id);
            }
            network.put_post(*site, post)?;
        }
        PlatformEvent::SiteInitialized { site } | PlatformEvent::SiteUpdated { site }
            if !network.site_exists(*site) =>
        {
            return Err(NetworkError::UnknownSite(*site).into());
        }
        _ => {}
    }

    app.dispatch(&event);

    match &event {
        PlatformEvent::PostDeleted { site, post_id } => network.remove_post(*site, *post_id),
        PlatformEvent::SiteDeleted { site } => network.remove_site(*site),
        _ => {}
    }

    Ok(Reply::json(
        200,
        &EventAck {
            event: event.name(),
            ok: true,
        },
    ))
}
