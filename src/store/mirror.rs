// SPDX-License-Identifier: MPL-2.0

use crate::config::MIRROR_POST_TYPE;
use crate::network::{
    DATETIME_FORMAT, PostId, PostStatus, SiteId, SiteScope, UserId, Visibility,
};
use crate::store::{StoreDb, StoreError, page_offset};
use chrono::NaiveDateTime;
use rusqlite::types::{Type, Value};
use rusqlite::{OptionalExtension, params, params_from_iter};

/// Metadata keys stored alongside each mirror post
pub mod meta_keys {
    pub const ORIGIN_POST_ID: &str = "origin_post_id";
    pub const ORIGIN_SITE_ID: &str = "origin_site_id";
    /// JSON array of rendered classroom links
    pub const CLASSROOMS: &str = "classrooms";
    pub const VISIBILITY: &str = "visibility";
}

/// Values written for a mirror post. Body and excerpt are always blank.
#[derive(Debug, Clone)]
pub struct MirrorDraft {
    pub origin_site_id: SiteId,
    pub origin_post_id: PostId,
    pub status: PostStatus,
    pub author_id: UserId,
    pub title: String,
    pub date: NaiveDateTime,
    pub date_gmt: Option<NaiveDateTime>,
    pub modified: NaiveDateTime,
    pub modified_gmt: Option<NaiveDateTime>,
    pub classrooms: Vec<String>,
    pub visibility: Visibility,
}

/// A stored mirror post
#[derive(Debug, Clone)]
pub struct MirrorPost {
    pub id: i64,
    pub origin_site_id: SiteId,
    pub origin_post_id: PostId,
    pub post_type: String,
    pub status: PostStatus,
    pub author_id: UserId,
    pub title: String,
    pub content: String,
    pub excerpt: String,
    pub date: NaiveDateTime,
    pub date_gmt: Option<NaiveDateTime>,
    pub modified: NaiveDateTime,
    pub modified_gmt: Option<NaiveDateTime>,
    pub classrooms: Vec<String>,
    pub visibility: Option<Visibility>,
}

/// Filter and window for listing publications, newest first
#[derive(Debug, Clone)]
pub struct PublicationQuery {
    pub statuses: Vec<PostStatus>,
    pub visibilities: Vec<Visibility>,
    /// 1-based
    pub page: u32,
    pub per_page: u32,
}

const SELECT_COLUMNS: &str = r#"
    p.id, p.origin_site_id, p.origin_post_id, p.post_type, p.status, p.author_id,
    p.title, p.content, p.excerpt,
    p.post_date, p.post_date_gmt, p.post_modified, p.post_modified_gmt
"#;

/// Store operations for mirror posts. Every call is bound to the community
/// site through the scope it receives.
pub struct MirrorStore<'a> {
    db: &'a StoreDb,
}

impl<'a> MirrorStore<'a> {
    pub fn new(db: &'a StoreDb) -> Self {
        Self { db }
    }

    /// Mirror id for an origin post, if one exists
    pub fn find_by_origin(
        &self,
        scope: &SiteScope<'_>,
        origin_site: SiteId,
        origin_post: PostId,
    ) -> Result<Option<i64>, StoreError> {
        let conn = self.db.conn();

        let id = conn
            .query_row(
                r#"
                SELECT id FROM mirror_posts
                WHERE site_id = ? AND origin_site_id = ? AND origin_post_id = ?
                ORDER BY id ASC
                LIMIT 1
                "#,
                params![
                    scope.site_id() as i64,
                    origin_site as i64,
                    origin_post as i64
                ],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id)
    }

    /// Insert a new mirror post with its metadata, returning the new id
    pub fn insert(&self, scope: &SiteScope<'_>, draft: &MirrorDraft) -> Result<i64, StoreError> {
        let classrooms_json = serde_json::to_string(&draft.classrooms)?;

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO mirror_posts (
                site_id, origin_site_id, origin_post_id, post_type, status, author_id,
                title, content, excerpt,
                post_date, post_date_gmt, post_modified, post_modified_gmt
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, '', '', ?8, ?9, ?10, ?11)
            "#,
            params![
                scope.site_id() as i64,
                draft.origin_site_id as i64,
                draft.origin_post_id as i64,
                MIRROR_POST_TYPE,
                draft.status.as_str(),
                draft.author_id as i64,
                draft.title,
                format_datetime(&draft.date),
                draft.date_gmt.as_ref().map(format_datetime),
                format_datetime(&draft.modified),
                draft.modified_gmt.as_ref().map(format_datetime),
            ],
        )?;
        let id = tx.last_insert_rowid();

        Self::write_meta(&tx, id, draft, &classrooms_json)?;

        tx.commit()?;
        Ok(id)
    }

    /// Overwrite an existing mirror post in place
    pub fn update(
        &self,
        scope: &SiteScope<'_>,
        id: i64,
        draft: &MirrorDraft,
    ) -> Result<(), StoreError> {
        let classrooms_json = serde_json::to_string(&draft.classrooms)?;

        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let changed = tx.execute(
            r#"
            UPDATE mirror_posts SET
                status = ?1,
                author_id = ?2,
                title = ?3,
                content = '',
                excerpt = '',
                post_date = ?4,
                post_date_gmt = ?5,
                post_modified = ?6,
                post_modified_gmt = ?7
            WHERE id = ?8 AND site_id = ?9
            "#,
            params![
                draft.status.as_str(),
                draft.author_id as i64,
                draft.title,
                format_datetime(&draft.date),
                draft.date_gmt.as_ref().map(format_datetime),
                format_datetime(&draft.modified),
                draft.modified_gmt.as_ref().map(format_datetime),
                id,
                scope.site_id() as i64,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }

        Self::write_meta(&tx, id, draft, &classrooms_json)?;

        tx.commit()?;
        Ok(())
    }

    /// Delete a mirror post and its metadata. Returns false if it was already gone.
    pub fn delete(&self, scope: &SiteScope<'_>, id: i64) -> Result<bool, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        tx.execute(
            r#"
            DELETE FROM mirror_meta
            WHERE mirror_id IN (SELECT id FROM mirror_posts WHERE id = ?1 AND site_id = ?2)
            "#,
            params![id, scope.site_id() as i64],
        )?;
        let removed = tx.execute(
            "DELETE FROM mirror_posts WHERE id = ? AND site_id = ?",
            params![id, scope.site_id() as i64],
        )?;

        tx.commit()?;
        Ok(removed > 0)
    }

    pub fn get(&self, scope: &SiteScope<'_>, id: i64) -> Result<MirrorPost, StoreError> {
        let conn = self.db.conn();

        let query = format!(
            "SELECT {} FROM mirror_posts p WHERE p.id = ? AND p.site_id = ?",
            SELECT_COLUMNS
        );
        let mut post = conn
            .query_row(&query, params![id, scope.site_id() as i64], Self::row_to_post)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Database(other),
            })?;

        Self::load_meta(&conn, &mut post)?;
        Ok(post)
    }

    /// Number of mirror posts on the community site
    pub fn count(&self, scope: &SiteScope<'_>) -> Result<u64, StoreError> {
        let conn = self.db.conn();

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM mirror_posts WHERE site_id = ?",
            [scope.site_id() as i64],
            |row| row.get(0),
        )?;

        Ok(count as u64)
    }

    /// Delete up to `limit` of the least recently modified mirror posts
    pub fn delete_oldest(&self, scope: &SiteScope<'_>, limit: u32) -> Result<usize, StoreError> {
        let mut conn = self.db.conn();
        let tx = conn.transaction()?;

        let ids: Vec<i64> = {
            let mut stmt = tx.prepare(
                r#"
                SELECT id FROM mirror_posts
                WHERE site_id = ?
                ORDER BY COALESCE(post_modified_gmt, post_modified) ASC, id ASC
                LIMIT ?
                "#,
            )?;
            let rows = stmt.query_map(params![scope.site_id() as i64, limit as i64], |row| {
                row.get(0)
            })?;
            rows.collect::<Result<_, _>>()?
        };

        for id in &ids {
            tx.execute("DELETE FROM mirror_meta WHERE mirror_id = ?", [id])?;
            tx.execute("DELETE FROM mirror_posts WHERE id = ?", [id])?;
        }

        tx.commit()?;
        Ok(ids.len())
    }

    /// One page of publications plus the total number of matches
    pub fn page(
        &self,
        scope: &SiteScope<'_>,
        query: &PublicationQuery,
    ) -> Result<(Vec<MirrorPost>, u64), StoreError> {
        if query.statuses.is_empty() || query.visibilities.is_empty() || query.per_page == 0 {
            return Ok((Vec::new(), 0));
        }

        let conn = self.db.conn();

        let status_marks = vec!["?"; query.statuses.len()].join(", ");
        let visibility_marks = vec!["?"; query.visibilities.len()].join(", ");
        let from_where = format!(
            r#"
            FROM mirror_posts p
            JOIN mirror_meta v ON v.mirror_id = p.id AND v.meta_key = '{}'
            WHERE p.site_id = ? AND p.status IN ({}) AND v.meta_value IN ({})
            "#,
            meta_keys::VISIBILITY,
            status_marks,
            visibility_marks
        );

        let mut values: Vec<Value> = vec![Value::Integer(scope.site_id() as i64)];
        values.extend(
            query
                .statuses
                .iter()
                .map(|s| Value::Text(s.as_str().to_string())),
        );
        values.extend(
            query
                .visibilities
                .iter()
                .map(|v| Value::Text(v.as_str().to_string())),
        );

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) {}", from_where),
            params_from_iter(values.iter()),
            |row| row.get(0),
        )?;

        let Some(offset) = page_offset(query.page, query.per_page) else {
            return Ok((Vec::new(), total as u64));
        };
        values.push(Value::Integer(query.per_page as i64));
        values.push(Value::Integer(offset));

        let sql = format!(
            r#"
            SELECT {} {}
            ORDER BY COALESCE(p.post_modified_gmt, p.post_modified) DESC, p.id DESC
            LIMIT ? OFFSET ?
            "#,
            SELECT_COLUMNS, from_where
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(values.iter()))?;

        let mut posts = Vec::new();
        while let Some(row) = rows.next()? {
            posts.push(Self::row_to_post(row)?);
        }
        drop(rows);

        for post in &mut posts {
            Self::load_meta(&conn, post)?;
        }

        Ok((posts, total as u64))
    }

    fn write_meta(
        tx: &rusqlite::Transaction,
        id: i64,
        draft: &MirrorDraft,
        classrooms_json: &str,
    ) -> Result<(), StoreError> {
        let entries = [
            (meta_keys::ORIGIN_POST_ID, draft.origin_post_id.to_string()),
            (meta_keys::ORIGIN_SITE_ID, draft.origin_site_id.to_string()),
            (meta_keys::CLASSROOMS, classrooms_json.to_string()),
            (meta_keys::VISIBILITY, draft.visibility.as_str().to_string()),
        ];

        for (key, value) in entries {
            tx.execute(
                r#"
                INSERT INTO mirror_meta (mirror_id, meta_key, meta_value)
                VALUES (?1, ?2, ?3)
                ON CONFLICT(mirror_id, meta_key) DO UPDATE SET
                    meta_value = excluded.meta_value
                "#,
                params![id, key, value],
            )?;
        }

        Ok(())
    }

    fn load_meta(conn: &rusqlite::Connection, post: &mut MirrorPost) -> Result<(), StoreError> {
        let mut stmt =
            conn.prepare("SELECT meta_key, meta_value FROM mirror_meta WHERE mirror_id = ?")?;
        let mut rows = stmt.query([post.id])?;

        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let value: String = row.get(1)?;
            match key.as_str() {
                meta_keys::CLASSROOMS => {
                    // Blank entries can be left behind by older writers
                    let links: Vec<String> = serde_json::from_str(&value)?;
                    post.classrooms = links.into_iter().filter(|l| !l.is_empty()).collect();
                }
                meta_keys::VISIBILITY => post.visibility = Some(Visibility::parse(&value)),
                _ => {}
            }
        }

        Ok(())
    }

    /// Convert a database row to a MirrorPost (metadata not loaded)
    fn row_to_post(row: &rusqlite::Row) -> Result<MirrorPost, rusqlite::Error> {
        let status: String = row.get(4)?;
        let status = PostStatus::parse(&status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                4,
                Type::Text,
                format!("unknown post status {status:?}").into(),
            )
        })?;

        Ok(MirrorPost {
            id: row.get(0)?,
            origin_site_id: row.get::<_, i64>(1)? as SiteId,
            origin_post_id: row.get::<_, i64>(2)? as PostId,
            post_type: row.get(3)?,
            status,
            author_id: row.get::<_, i64>(5)? as UserId,
            title: row.get(6)?,
            content: row.get(7)?,
            excerpt: row.get(8)?,
            date: parse_datetime(row, 9)?,
            date_gmt: parse_datetime_opt(row, 10)?,
            modified: parse_datetime(row, 11)?,
            modified_gmt: parse_datetime_opt(row, 12)?,
            classrooms: Vec::new(),
            visibility: None,
        })
    }
}

fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

fn parse_datetime(row: &rusqlite::Row, idx: usize) -> Result<NaiveDateTime, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_datetime_opt(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<NaiveDateTime>, rusqlite::Error> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| {
        NaiveDateTime::parse_from_str(&raw, DATETIME_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}
