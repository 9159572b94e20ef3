// SPDX-License-Identifier: MPL-2.0

use crate::network::SiteId;
use crate::store::{StoreDb, StoreError};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;

/// One row of the site directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteRow {
    /// Row id; 0 for rows not yet stored
    pub id: i64,
    pub blog_id: SiteId,
    pub blog_name: String,
    pub blog_desc: String,
    pub blog_url: String,
    pub blog_personal: bool,
    pub semester: Option<u32>,
}

/// Store operations for the site directory
pub struct SiteIndexStore<'a> {
    db: &'a StoreDb,
}

impl<'a> SiteIndexStore<'a> {
    pub fn new(db: &'a StoreDb) -> Self {
        Self { db }
    }

    /// Row id indexed for a site, if any
    pub fn find_id(&self, blog_id: SiteId) -> Result<Option<i64>, StoreError> {
        let conn = self.db.conn();

        let id = conn
            .query_row(
                "SELECT id FROM sites_search WHERE blog_id = ? ORDER BY id ASC LIMIT 1",
                [blog_id as i64],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id)
    }

    pub fn insert(&self, row: &SiteRow) -> Result<i64, StoreError> {
        let conn = self.db.conn();

        conn.execute(
            r#"
            INSERT INTO sites_search (
                blog_id, blog_name, blog_desc, blog_url, blog_personal, semester
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                row.blog_id as i64,
                row.blog_name,
                row.blog_desc,
                row.blog_url,
                row.blog_personal as i32,
                row.semester,
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Update the row matching both `id` and `row.blog_id`.
    /// Returns false when no such row exists any more.
    pub fn update(&self, id: i64, row: &SiteRow) -> Result<bool, StoreError> {
        let conn = self.db.conn();

        let changed = conn.execute(
            r#"
            UPDATE sites_search SET
                blog_name = ?1,
                blog_desc = ?2,
                blog_url = ?3,
                blog_personal = ?4,
                semester = ?5
            WHERE id = ?6 AND blog_id = ?7
            "#,
            params![
                row.blog_name,
                row.blog_desc,
                row.blog_url,
                row.blog_personal as i32,
                row.semester,
                id,
                row.blog_id as i64,
            ],
        )?;

        Ok(changed > 0)
    }

    /// Remove every row for a site
    pub fn delete_site(&self, blog_id: SiteId) -> Result<usize, StoreError> {
        let conn = self.db.conn();
        let removed = conn.execute("DELETE FROM sites_search WHERE blog_id = ?", [blog_id as i64])?;
        Ok(removed)
    }

    pub fn get(&self, blog_id: SiteId) -> Result<SiteRow, StoreError> {
        let conn = self.db.conn();

        conn.query_row(
            r#"
            SELECT id, blog_id, blog_name, blog_desc, blog_url, blog_personal, semester
            FROM sites_search
            WHERE blog_id = ?
            ORDER BY id ASC
            LIMIT 1
            "#,
            [blog_id as i64],
            Self::row_to_site,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
            other => StoreError::Database(other),
        })
    }

    pub fn count(&self) -> Result<usize, StoreError> {
        let conn = self.db.conn();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sites_search", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Convert a database row to a SiteRow.
    /// Expects id, blog_id, blog_name, blog_desc, blog_url, blog_personal, semester.
    pub(crate) fn row_to_site(row: &rusqlite::Row) -> Result<SiteRow, rusqlite::Error> {
        Ok(SiteRow {
            id: row.get(0)?,
            blog_id: row.get::<_, i64>(1)? as SiteId,
            blog_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            blog_desc: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            blog_url: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
            blog_personal: row.get::<_, i64>(5)? != 0,
            semester: row.get(6)?,
        })
    }
}
