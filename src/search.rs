// SPDX-License-Identifier: MPL-2.0

//! Site directory search.
//!
//! Filters are bound as SQL parameters; the only text spliced into the query
//! is the sort column and direction, both taken from closed enums. LIKE
//! wildcards typed by the user are escaped so they match literally.

use crate::store::{SiteIndexStore, SiteRow, StoreDb, StoreError, page_offset};
use once_cell::unsync::OnceCell;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("page size must be at least 1")]
    InvalidPageSize,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Columns the directory may be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    BlogId,
    BlogName,
    BlogDesc,
    BlogUrl,
    BlogPersonal,
    Semester,
}

impl SortField {
    /// Only known column names are accepted
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "blog_id" => SortField::BlogId,
            "blog_name" => SortField::BlogName,
            "blog_desc" => SortField::BlogDesc,
            "blog_url" => SortField::BlogUrl,
            "blog_personal" => SortField::BlogPersonal,
            "semester" => SortField::Semester,
            _ => return None,
        })
    }

    fn column(self) -> &'static str {
        match self {
            SortField::BlogId => "blog_id",
            SortField::BlogName => "blog_name",
            SortField::BlogDesc => "blog_desc",
            SortField::BlogUrl => "blog_url",
            SortField::BlogPersonal => "blog_personal",
            SortField::Semester => "semester",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Anything other than "desc" sorts ascending
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("desc") {
            SortOrder::Desc
        } else {
            SortOrder::Asc
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Validated search parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    text: Option<String>,
    personal: Option<bool>,
    sort: Option<SortField>,
    order: SortOrder,
    page: u32,
    per_page: u32,
}

impl SearchFilter {
    pub fn new(per_page: u32) -> Result<Self, SearchError> {
        if per_page == 0 {
            return Err(SearchError::InvalidPageSize);
        }

        Ok(Self {
            text: None,
            personal: None,
            sort: None,
            order: SortOrder::Asc,
            page: 1,
            per_page,
        })
    }

    /// Substring to look for; blank text disables the text filter
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.text = (!text.trim().is_empty()).then_some(text);
        self
    }

    /// `None` matches both personal and group sites
    pub fn personal(mut self, personal: Option<bool>) -> Self {
        self.personal = personal;
        self
    }

    pub fn sort(mut self, field: Option<SortField>, order: SortOrder) -> Self {
        self.sort = field;
        self.order = order;
        self
    }

    /// Sort by raw request values; unknown fields leave results unsorted
    pub fn sort_by(self, field: &str, order: &str) -> Self {
        self.sort(SortField::parse(field), SortOrder::parse(order))
    }

    /// 1-based; 0 is treated as 1
    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn current_page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// WHERE clause and its bound values
    fn where_clause(&self) -> (String, Vec<Value>) {
        let mut sql = String::from("WHERE 1 = 1");
        let mut values = Vec::new();

        if let Some(text) = &self.text {
            sql.push_str(
                r#"
                AND (s.blog_name LIKE ? ESCAPE '\'
                    OR s.blog_desc LIKE ? ESCAPE '\'
                    OR s.blog_url LIKE ? ESCAPE '\'
                    OR CAST(s.semester AS TEXT) LIKE ? ESCAPE '\')
                "#,
            );
            let pattern = format!("%{}%", escape_like(text));
            for _ in 0..4 {
                values.push(Value::Text(pattern.clone()));
            }
        }

        if let Some(personal) = self.personal {
            sql.push_str(" AND s.blog_personal = ?");
            values.push(Value::Integer(personal as i64));
        }

        (sql, values)
    }

    fn order_clause(&self) -> String {
        match self.sort {
            Some(field) => format!(
                "ORDER BY s.{} {}, s.id ASC",
                field.column(),
                self.order.keyword()
            ),
            None => String::new(),
        }
    }
}

/// Escape LIKE metacharacters so user text matches literally
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Number of pages needed for `total` rows; 0 when there are none
pub fn page_count(total: u64, per_page: u32) -> u32 {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page as u64) as u32
}

/// One executed search. The page is fetched on construction; the total is
/// counted on first request and then reused.
pub struct SiteSearch<'a> {
    db: &'a StoreDb,
    filter: SearchFilter,
    sites: Vec<SiteRow>,
    total: OnceCell<u64>,
}

impl<'a> SiteSearch<'a> {
    pub fn run(db: &'a StoreDb, filter: SearchFilter) -> Result<Self, SearchError> {
        let (where_sql, mut values) = filter.where_clause();
        let Some(offset) = page_offset(filter.page, filter.per_page) else {
            tracing::debug!(page = filter.page, per_page = filter.per_page, "page beyond range");
            return Ok(Self {
                db,
                filter,
                sites: Vec::new(),
                total: OnceCell::new(),
            });
        };
        values.push(Value::Integer(filter.per_page as i64));
        values.push(Value::Integer(offset));

        let sql = format!(
            r#"
            SELECT s.id, s.blog_id, s.blog_name, s.blog_desc, s.blog_url, s.blog_personal, s.semester
            FROM sites_search AS s
            {}
            {}
            LIMIT ? OFFSET ?
            "#,
            where_sql,
            filter.order_clause()
        );

        let sites = {
            let conn = db.conn();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values.iter()), SiteIndexStore::row_to_site)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tracing::debug!(
            page = filter.page,
            per_page = filter.per_page,
            found = sites.len(),
            "site search executed"
        );

        Ok(Self {
            db,
            filter,
            sites,
            total: OnceCell::new(),
        })
    }

    pub fn sites(&self) -> &[SiteRow] {
        &self.sites
    }

    pub fn filter(&self) -> &SearchFilter {
        &self.filter
    }

    /// Total rows matching the filter, across all pages
    pub fn total(&self) -> Result<u64, SearchError> {
        self.total
            .get_or_try_init(|| {
                let (where_sql, values) = self.filter.where_clause();
                let sql = format!("SELECT COUNT(*) FROM sites_search AS s {}", where_sql);
                let conn = self.db.conn();
                let count: i64 =
                    conn.query_row(&sql, params_from_iter(values.iter()), |row| row.get(0))?;
                Ok::<_, SearchError>(count as u64)
            })
            .copied()
    }

    pub fn page_count(&self) -> Result<u32, SearchError> {
        Ok(page_count(self.total()?, self.filter.per_page))
    }

    pub fn into_results(self) -> Result<SearchResults, SearchError> {
        let total = self.total()?;
        let page_count = page_count(total, self.filter.per_page);
        Ok(SearchResults {
            rows: self.sites,
            total,
            page_count,
        })
    }
}

#[derive(Debug, Clone)]
pub struct SearchResults {
    pub rows: Vec<SiteRow>,
    pub total: u64,
    pub page_count: u32,
}

/// Run a search and count its matches
pub fn search(db: &StoreDb, filter: SearchFilter) -> Result<SearchResults, SearchError> {
    SiteSearch::run(db, filter)?.into_results()
}
