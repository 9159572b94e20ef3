// SPDX-License-Identifier: MPL-2.0

mod db;
mod mirror;
mod schema;
mod sites;

pub use db::StoreDb;
pub use mirror::{MirrorDraft, MirrorPost, MirrorStore, PublicationQuery, meta_keys};
pub use sites::{SiteIndexStore, SiteRow};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found")]
    NotFound,
    #[error("database path error: {0}")]
    Path(String),
}

/// Row offset of a 1-based page; `None` when it lies beyond any table
pub fn page_offset(page: u32, per_page: u32) -> Option<i64> {
    (page.max(1) as i64 - 1).checked_mul(per_page as i64)
}
