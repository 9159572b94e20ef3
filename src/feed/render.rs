// SPDX-License-Identifier: MPL-2.0

//! HTML fragments served to the list surfaces.

use crate::feed::Surface;
use crate::feed::pagination::{PageLink, PaginationMode};
use crate::network::Visibility;
use crate::store::{MirrorPost, SiteRow};
use std::fmt::Write;

/// Escape text for use in HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// One directory search result
pub fn site_result(site: &SiteRow) -> String {
    let icon = if site.blog_personal { "members" } else { "groups" };
    let url = escape_html(&site.blog_url);

    let mut html = String::new();
    let _ = write!(
        html,
        r#"<div class="commons-result" tabindex="-1" id="commons-site_{id}">
<a href="{url}" target="_blank" class="commons-result__link">
<div class="commons-result__site"><span class="commons-result__icon commons-result__icon-{icon}" aria-hidden="true"></span><span class="commons-result__url">{url}</span></div>
<h3 class="commons-result__title">{name}</h3>
</a>
<div class="commons-result__desc">"#,
        id = site.id,
        url = url,
        icon = icon,
        name = escape_html(&site.blog_name),
    );
    if let Some(semester) = site.semester {
        let _ = write!(
            html,
            r#"<span class="commons-result__semester">Semester {} • </span>"#,
            semester
        );
    }
    let _ = write!(html, "{}</div>\n</div>\n", escape_html(&site.blog_desc));
    html
}

/// A mirror post together with what is known about its origin
#[derive(Debug, Clone)]
pub struct PublicationView<'a> {
    pub post: &'a MirrorPost,
    pub site_name: String,
    pub site_url: String,
    pub permalink: Option<String>,
}

/// One activity feed entry
pub fn publication(view: &PublicationView<'_>) -> String {
    let post = view.post;
    let modified_utc = post.modified_gmt.unwrap_or(post.modified);
    let visibility = match post.visibility {
        Some(Visibility::Campus) => "Campus",
        _ => "Public",
    };

    let mut html = String::new();
    let _ = write!(
        html,
        r#"<div class="commons-list__item" tabindex="-1" id="commons-pub_{id}">
<a href="{site_url}" class="commons-list__site" title="{site_name}">{site_name}</a>
<div class="commons-list__pub">
<div class="commons-list__top"><time class="commons-list__time" datetime="{datetime}">{date}</time> • <span class="commons-visibility"><span class="commons-lbl">Visibility </span><span class="commons-val">{visibility}</span></span></div>
<h3 class="commons-list__title"><a href="{permalink}">{title}</a></h3>
<div class="commons-list__meta">"#,
        id = post.id,
        site_url = escape_html(&view.site_url),
        site_name = escape_html(&view.site_name),
        datetime = modified_utc.format("%Y-%m-%dT%H:%M:%S+00:00"),
        date = post.modified.format("%Y-%m-%d"),
        visibility = visibility,
        permalink = escape_html(view.permalink.as_deref().unwrap_or("#")),
        title = escape_html(&post.title),
    );

    // Classroom links are rendered and escaped when the mirror is written
    if !post.classrooms.is_empty() {
        let _ = write!(html, "Posted in {}", post.classrooms.join(", "));
    }
    html.push_str("</div>\n</div>\n</div>\n");
    html
}

pub fn no_results() -> String {
    r#"<div class="alert alert-info"><p>No results found</p></div>"#.to_string()
}

/// Shown instead of a surface on sites where it is not offered
pub fn unavailable(surface: Surface) -> String {
    format!(
        r#"<div class="alert alert-warning"><p>Sorry, the <strong>{}</strong> list is not available on this site.</p></div>"#,
        surface.as_str()
    )
}

/// Paging block closing a fragment. The list reads its total page count
/// from `data-total-pages`; only `pages` mode shows the links.
pub fn paging_block(
    surface: Surface,
    total_pages: u32,
    mode: PaginationMode,
    links: &[PageLink],
) -> String {
    if total_pages <= 1 {
        return String::new();
    }
    let class = match mode {
        PaginationMode::Pages => "commons-pagination",
        _ => "commons-hidden",
    };
    format!(
        "<div id=\"commons-load-more-{}-paging\" class=\"{}\" data-total-pages=\"{}\">\n{}</div>\n",
        surface.dom_key(),
        class,
        total_pages,
        page_links(links)
    )
}

/// Numbered navigation with disabled placeholders for a missing
/// previous or next link
pub fn page_links(links: &[PageLink]) -> String {
    if links.is_empty() {
        return String::new();
    }

    let mut html = String::from(
        "<nav class=\"pagination-nav\" aria-label=\"Navigation\">\n<ul class=\"pagination\">\n",
    );

    if !links.iter().any(|l| matches!(l, PageLink::Prev(_))) {
        html.push_str("<li class=\"page-item\"><span class=\"page-link text-muted\">Previous</span></li>\n");
    }

    for link in links {
        let _ = match link {
            PageLink::Prev(url) => writeln!(
                html,
                r#"<li class="page-item"><a class="prev page-link" href="{}">Previous</a></li>"#,
                escape_html(url)
            ),
            PageLink::Next(url) => writeln!(
                html,
                r#"<li class="page-item"><a class="next page-link" href="{}">Next</a></li>"#,
                escape_html(url)
            ),
            PageLink::Page { number, url } => writeln!(
                html,
                r#"<li class="page-item"><a class="page-link" href="{}"><span class="sr-only">Page </span>{}</a></li>"#,
                escape_html(url),
                number
            ),
            PageLink::Current(number) => writeln!(
                html,
                r#"<li class="page-item active"><span aria-current="page" class="page-link current"><span class="sr-only">Page </span>{}</span></li>"#,
                number
            ),
            PageLink::Dots => writeln!(
                html,
                r#"<li class="page-item"><span class="page-link dots">&hellip;</span></li>"#
            ),
        };
    }

    if !links.iter().any(|l| matches!(l, PageLink::Next(_))) {
        html.push_str("<li class=\"page-item\"><span class=\"page-link text-muted\">Next</span></li>\n");
    }

    html.push_str("</ul>\n</nav>\n");
    html
}
