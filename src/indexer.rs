// SPDX-License-Identifier: MPL-2.0

//! Keeps the site directory in step with the network.

use crate::config::REINDEX_OPTIONS;
use crate::events::EventSink;
use crate::network::{Network, NetworkError, SiteId, SiteScope};
use crate::store::{SiteIndexStore, SiteRow, StoreDb, StoreError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Which sites to reindex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexTarget {
    Site(SiteId),
    All,
}

/// Result of a reindex run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexReport {
    pub inserted: Vec<SiteId>,
    pub updated: Vec<SiteId>,
    /// Sites without a home URL yet
    pub skipped: Vec<SiteId>,
    /// Sites that could not be indexed during a full run
    pub failed: Vec<SiteId>,
}

impl ReindexReport {
    pub fn total(&self) -> usize {
        self.inserted.len() + self.updated.len()
    }

    fn record(&mut self, site: SiteId, write: RowWrite) {
        match write {
            RowWrite::Inserted => self.inserted.push(site),
            RowWrite::Updated => self.updated.push(site),
            RowWrite::Skipped => self.skipped.push(site),
        }
    }
}

enum RowWrite {
    Inserted,
    Updated,
    Skipped,
}

pub struct SiteIndexer<'a> {
    db: &'a StoreDb,
    network: &'a dyn Network,
}

impl<'a> SiteIndexer<'a> {
    pub fn new(db: &'a StoreDb, network: &'a dyn Network) -> Self {
        Self { db, network }
    }

    /// Reindex one site or every site.
    ///
    /// A single site propagates its error. A full run logs a failing site,
    /// records it in [`ReindexReport::failed`] and moves on.
    pub fn reindex(&self, target: ReindexTarget) -> Result<ReindexReport, IndexError> {
        let mut report = ReindexReport::default();
        match target {
            ReindexTarget::Site(site) => {
                let write = self.index_site(site)?;
                report.record(site, write);
            }
            ReindexTarget::All => {
                for site in self.network.site_ids() {
                    match self.index_site(site) {
                        Ok(write) => report.record(site, write),
                        Err(e) => {
                            tracing::error!(site, "failed to index site: {}", e);
                            report.failed.push(site);
                        }
                    }
                }
            }
        }

        tracing::info!(
            inserted = report.inserted.len(),
            updated = report.updated.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "reindexed sites"
        );
        Ok(report)
    }

    /// Remove a site from the directory
    pub fn remove(&self, site: SiteId) -> Result<usize, IndexError> {
        let removed = SiteIndexStore::new(self.db).delete_site(site)?;
        tracing::info!(site, removed, "removed site from directory");
        Ok(removed)
    }

    fn index_site(&self, site: SiteId) -> Result<RowWrite, IndexError> {
        let Some(mut row) = self.build_row(site)? else {
            tracing::debug!(site, "site has no home url yet, skipping");
            return Ok(RowWrite::Skipped);
        };

        let store = SiteIndexStore::new(self.db);
        match store.find_id(site)? {
            None => {
                row.id = store.insert(&row)?;
                tracing::debug!(site, row = row.id, "indexed new site");
                Ok(RowWrite::Inserted)
            }
            Some(id) => {
                row.id = id;
                if !store.update(id, &row)? {
                    tracing::warn!(site, row = id, "directory row vanished during update");
                }
                Ok(RowWrite::Updated)
            }
        }
    }

    fn build_row(&self, site: SiteId) -> Result<Option<SiteRow>, IndexError> {
        let scope = SiteScope::enter(self.network, site)?;
        let info = self.network.site_info(&scope)?;

        let Some(url) = info.url.filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };

        let semester = if info.personal {
            None
        } else {
            self.network.classroom_semester(site)
        };

        Ok(Some(SiteRow {
            id: 0,
            blog_id: site,
            blog_name: info.name,
            blog_desc: info.description,
            blog_url: url,
            blog_personal: info.personal,
            semester,
        }))
    }

    fn reindex_logged(&self, site: SiteId, event: &str) {
        if let Err(e) = self.reindex(ReindexTarget::Site(site)) {
            tracing::error!(site, event, "failed to reindex site: {}", e);
        }
    }
}

impl EventSink for SiteIndexer<'_> {
    fn site_initialized(&self, site: SiteId) {
        self.reindex_logged(site, "site_initialized");
    }

    fn site_updated(&self, site: SiteId) {
        self.reindex_logged(site, "site_updated");
    }

    fn site_deleted(&self, site: SiteId) {
        if let Err(e) = self.remove(site) {
            tracing::error!(site, "failed to remove site from directory: {}", e);
        }
    }

    fn option_updated(&self, option: &str) {
        if REINDEX_OPTIONS.contains(&option) {
            self.reindex_logged(self.network.current_site(), "option_updated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{MemoryNetwork, PostId, SiteInfo, User, UserId};

    fn info(id: SiteId, name: &str, url: Option<&str>, personal: bool) -> SiteInfo {
        SiteInfo {
            id,
            name: name.to_string(),
            description: format!("About {name}"),
            url: url.map(str::to_string),
            personal,
            admin_email: String::new(),
            gmt_offset: 0,
        }
    }

    fn network() -> MemoryNetwork {
        let net = MemoryNetwork::with_sites(&[1]);
        net.put_site(info(2, "Jo's Blog", Some("https://jo.test"), true), Some(20231));
        net.put_site(info(3, "Biology 101", Some("https://bio.test"), false), Some(20241));
        net.put_site(info(4, "Pending", None, false), None);
        net.put_site(info(5, "Art Club", Some("https://art.test"), false), None);
        net
    }

    #[test]
    fn test_reindex_all_is_idempotent() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let indexer = SiteIndexer::new(&db, &net);

        let first = indexer.reindex(ReindexTarget::All).unwrap();
        assert_eq!(first.inserted, vec![1, 2, 3, 5]);
        assert_eq!(first.skipped, vec![4]);

        let store = SiteIndexStore::new(&db);
        let before: Vec<_> = [1, 2, 3, 5].iter().map(|&s| store.get(s).unwrap()).collect();

        let second = indexer.reindex(ReindexTarget::All).unwrap();
        assert!(second.inserted.is_empty());
        assert_eq!(second.updated, vec![1, 2, 3, 5]);
        assert_eq!(store.count().unwrap(), 4);

        let after: Vec<_> = [1, 2, 3, 5].iter().map(|&s| store.get(s).unwrap()).collect();
        assert_eq!(before, after);
        assert_eq!(net.current_site(), 1);
    }

    #[test]
    fn test_semester_only_for_classrooms() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let indexer = SiteIndexer::new(&db, &net);
        indexer.reindex(ReindexTarget::All).unwrap();

        let store = SiteIndexStore::new(&db);
        let blog = store.get(2).unwrap();
        assert!(blog.blog_personal);
        assert_eq!(blog.semester, None);

        let class = store.get(3).unwrap();
        assert!(!class.blog_personal);
        assert_eq!(class.semester, Some(20241));
        assert_eq!(class.blog_desc, "About Biology 101");
        assert_eq!(class.blog_url, "https://bio.test");

        assert_eq!(store.get(5).unwrap().semester, None);
    }

    #[test]
    fn test_site_events() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let indexer = SiteIndexer::new(&db, &net);
        let store = SiteIndexStore::new(&db);

        indexer.site_initialized(3);
        assert_eq!(store.get(3).unwrap().blog_name, "Biology 101");

        net.put_site(info(3, "Biology 102", Some("https://bio.test"), false), Some(20242));
        indexer.site_updated(3);
        let row = store.get(3).unwrap();
        assert_eq!(row.blog_name, "Biology 102");
        assert_eq!(row.semester, Some(20242));
        assert_eq!(store.count().unwrap(), 1);

        indexer.site_deleted(3);
        assert_eq!(store.count().unwrap(), 0);
        // Deleting again, or an unknown site, is harmless
        indexer.site_deleted(3);
        indexer.site_updated(42);
    }

    #[test]
    fn test_option_updates_reindex_current_site() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let indexer = SiteIndexer::new(&db, &net);
        let store = SiteIndexStore::new(&db);

        {
            let _scope = SiteScope::enter(&net, 5).unwrap();
            indexer.option_updated("posts_per_page");
            assert_eq!(store.count().unwrap(), 0);

            indexer.option_updated("blogname");
            assert_eq!(store.get(5).unwrap().blog_name, "Art Club");
        }
        assert_eq!(net.current_site(), 1);
    }

    #[test]
    fn test_unprovisioned_site_becomes_indexed() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let indexer = SiteIndexer::new(&db, &net);

        let report = indexer.reindex(ReindexTarget::Site(4)).unwrap();
        assert_eq!(report.skipped, vec![4]);
        assert_eq!(report.total(), 0);

        net.put_site(info(4, "Pending", Some("https://pending.test"), false), None);
        let report = indexer.reindex(ReindexTarget::Site(4)).unwrap();
        assert_eq!(report.inserted, vec![4]);
    }

    #[test]
    fn test_unknown_site_is_an_error() {
        let net = network();
        let db = StoreDb::open_in_memory().unwrap();
        let indexer = SiteIndexer::new(&db, &net);

        assert!(matches!(
            indexer.reindex(ReindexTarget::Site(42)),
            Err(IndexError::Network(NetworkError::UnknownSite(42)))
        ));
        assert_eq!(net.current_site(), 1);
    }

    /// Lists a site the host no longer knows about
    struct StaleListing {
        inner: MemoryNetwork,
        ghost: SiteId,
    }

    impl Network for StaleListing {
        fn current_site(&self) -> SiteId {
            self.inner.current_site()
        }
        fn set_current_site(&self, site: SiteId) {
            self.inner.set_current_site(site)
        }
        fn site_exists(&self, site: SiteId) -> bool {
            self.inner.site_exists(site)
        }
        fn site_ids(&self) -> Vec<SiteId> {
            let mut ids = self.inner.site_ids();
            ids.insert(1, self.ghost);
            ids
        }
        fn site_info(&self, scope: &SiteScope<'_>) -> Result<SiteInfo, NetworkError> {
            self.inner.site_info(scope)
        }
        fn classroom_semester(&self, site: SiteId) -> Option<u32> {
            self.inner.classroom_semester(site)
        }
        fn user(&self, id: UserId) -> Option<User> {
            self.inner.user(id)
        }
        fn can_edit_post(&self, user: UserId, scope: &SiteScope<'_>, post: PostId) -> bool {
            self.inner.can_edit_post(user, scope, post)
        }
        fn share_flag(&self, scope: &SiteScope<'_>, post: PostId) -> Option<u32> {
            self.inner.share_flag(scope, post)
        }
        fn set_share_flag(
            &self,
            scope: &SiteScope<'_>,
            post: PostId,
            value: u32,
        ) -> Result<(), NetworkError> {
            self.inner.set_share_flag(scope, post, value)
        }
        fn set_user_share_default(&self, user: UserId, value: u32) -> Result<(), NetworkError> {
            self.inner.set_user_share_default(user, value)
        }
        fn permalink(&self, scope: &SiteScope<'_>, post: PostId) -> Option<String> {
            self.inner.permalink(scope, post)
        }
        fn edit_link(&self, scope: &SiteScope<'_>, post: PostId) -> Option<String> {
            self.inner.edit_link(scope, post)
        }
    }

    #[test]
    fn test_full_run_continues_past_failing_site() {
        let net = StaleListing {
            inner: network(),
            ghost: 42,
        };
        let db = StoreDb::open_in_memory().unwrap();
        let indexer = SiteIndexer::new(&db, &net);

        let report = indexer.reindex(ReindexTarget::All).unwrap();
        assert_eq!(report.failed, vec![42]);
        assert_eq!(report.inserted, vec![1, 2, 3, 5]);
        assert_eq!(report.skipped, vec![4]);
        assert_eq!(SiteIndexStore::new(&db).count().unwrap(), 4);
        assert_eq!(net.current_site(), 1);
    }
}
