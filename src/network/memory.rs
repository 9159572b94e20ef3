// SPDX-License-Identifier: MPL-2.0

//! In-memory host network, loaded from a JSON snapshot.
//!
//! Backs the binary when no richer host adapter is wired in, and every test
//! that needs sites, users or origin posts.

use crate::config::MAIN_SITE_ID;
use crate::network::{
    Network, NetworkError, OriginPost, PostId, SiteId, SiteInfo, SiteScope, User, UserId,
};
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;

/// One member site together with the data it owns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    #[serde(flatten)]
    pub info: SiteInfo,
    /// Row in the classroom table, for classroom sites
    #[serde(default)]
    pub semester: Option<u32>,
    #[serde(default)]
    pub posts: Vec<OriginPost>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    #[serde(default)]
    pub sites: Vec<SiteRecord>,
    #[serde(default)]
    pub users: Vec<User>,
}

pub struct MemoryNetwork {
    current: Cell<SiteId>,
    state: RefCell<NetworkSnapshot>,
    share_defaults: RefCell<HashMap<UserId, u32>>,
}

impl MemoryNetwork {
    pub fn new(snapshot: NetworkSnapshot) -> Self {
        Self {
            current: Cell::new(MAIN_SITE_ID),
            state: RefCell::new(snapshot),
            share_defaults: RefCell::new(HashMap::new()),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, NetworkError> {
        let raw = std::fs::read_to_string(path)?;
        let snapshot: NetworkSnapshot = serde_json::from_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            sites = snapshot.sites.len(),
            users = snapshot.users.len(),
            "loaded network snapshot"
        );
        Ok(Self::new(snapshot))
    }

    /// Bare sites named "Site N" at https://sN.example.test/
    pub fn with_sites(ids: &[SiteId]) -> Self {
        let sites = ids
            .iter()
            .map(|&id| SiteRecord {
                info: SiteInfo {
                    id,
                    name: format!("Site {id}"),
                    description: String::new(),
                    url: Some(format!("https://s{id}.example.test")),
                    personal: false,
                    admin_email: format!("admin{id}@example.test"),
                    gmt_offset: 0,
                },
                semester: None,
                posts: Vec::new(),
            })
            .collect();

        Self::new(NetworkSnapshot {
            sites,
            users: Vec::new(),
        })
    }

    /// Insert or replace a site's metadata, keeping its posts
    pub fn put_site(&self, info: SiteInfo, semester: Option<u32>) {
        let mut state = self.state.borrow_mut();
        match state.sites.iter_mut().find(|s| s.info.id == info.id) {
            Some(site) => {
                site.info = info;
                site.semester = semester;
            }
            None => {
                state.sites.push(SiteRecord {
                    info,
                    semester,
                    posts: Vec::new(),
                });
                state.sites.sort_by_key(|s| s.info.id);
            }
        }
    }

    pub fn remove_site(&self, site: SiteId) {
        self.state.borrow_mut().sites.retain(|s| s.info.id != site);
    }

    pub fn put_user(&self, user: User) {
        let mut state = self.state.borrow_mut();
        state.users.retain(|u| u.id != user.id);
        state.users.push(user);
    }

    /// Insert or replace an origin post
    pub fn put_post(&self, site: SiteId, post: OriginPost) -> Result<(), NetworkError> {
        let mut state = self.state.borrow_mut();
        let record = state
            .sites
            .iter_mut()
            .find(|s| s.info.id == site)
            .ok_or(NetworkError::UnknownSite(site))?;
        record.posts.retain(|p| p.id != post.id);
        record.posts.push(post);
        Ok(())
    }

    pub fn remove_post(&self, site: SiteId, post: PostId) {
        if let Some(record) = self
            .state
            .borrow_mut()
            .sites
            .iter_mut()
            .find(|s| s.info.id == site)
        {
            record.posts.retain(|p| p.id != post);
        }
    }

    pub fn post(&self, site: SiteId, post: PostId) -> Option<OriginPost> {
        self.state
            .borrow()
            .sites
            .iter()
            .find(|s| s.info.id == site)?
            .posts
            .iter()
            .find(|p| p.id == post)
            .cloned()
    }

    pub fn user_share_default(&self, user: UserId) -> Option<u32> {
        self.share_defaults.borrow().get(&user).copied()
    }

    fn with_site<T>(&self, site: SiteId, f: impl FnOnce(&SiteRecord) -> T) -> Option<T> {
        self.state
            .borrow()
            .sites
            .iter()
            .find(|s| s.info.id == site)
            .map(f)
    }

    fn home_url(&self, site: SiteId) -> Option<String> {
        self.with_site(site, |s| s.info.url.clone()).flatten()
    }
}

impl Network for MemoryNetwork {
    fn current_site(&self) -> SiteId {
        self.current.get()
    }

    fn set_current_site(&self, site: SiteId) {
        self.current.set(site);
    }

    fn site_exists(&self, site: SiteId) -> bool {
        self.with_site(site, |_| ()).is_some()
    }

    fn site_ids(&self) -> Vec<SiteId> {
        let mut ids: Vec<_> = self.state.borrow().sites.iter().map(|s| s.info.id).collect();
        ids.sort_unstable();
        ids
    }

    fn site_info(&self, scope: &SiteScope<'_>) -> Result<SiteInfo, NetworkError> {
        debug_assert_eq!(self.current_site(), scope.site_id());
        self.with_site(scope.site_id(), |s| s.info.clone())
            .ok_or(NetworkError::UnknownSite(scope.site_id()))
    }

    fn classroom_semester(&self, site: SiteId) -> Option<u32> {
        self.with_site(site, |s| s.semester).flatten()
    }

    fn user(&self, id: UserId) -> Option<User> {
        self.state.borrow().users.iter().find(|u| u.id == id).cloned()
    }

    fn can_edit_post(&self, user: UserId, scope: &SiteScope<'_>, post: PostId) -> bool {
        let Some(user) = self.user(user) else {
            return false;
        };
        if user.super_admin {
            return true;
        }
        if user.editor_of.contains(&scope.site_id()) {
            return true;
        }
        // Authors may edit their own posts
        self.post(scope.site_id(), post)
            .is_some_and(|p| p.author == user.id)
    }

    fn share_flag(&self, scope: &SiteScope<'_>, post: PostId) -> Option<u32> {
        self.post(scope.site_id(), post).and_then(|p| p.share)
    }

    fn set_share_flag(
        &self,
        scope: &SiteScope<'_>,
        post: PostId,
        value: u32,
    ) -> Result<(), NetworkError> {
        let site = scope.site_id();
        let mut state = self.state.borrow_mut();
        let post = state
            .sites
            .iter_mut()
            .find(|s| s.info.id == site)
            .and_then(|s| s.posts.iter_mut().find(|p| p.id == post))
            .ok_or(NetworkError::UnknownPost(site, post))?;
        post.share = Some(value);
        Ok(())
    }

    fn set_user_share_default(&self, user: UserId, value: u32) -> Result<(), NetworkError> {
        if self.user(user).is_none() {
            return Err(NetworkError::UnknownUser(user));
        }
        self.share_defaults.borrow_mut().insert(user, value);
        Ok(())
    }

    fn permalink(&self, scope: &SiteScope<'_>, post: PostId) -> Option<String> {
        self.post(scope.site_id(), post)?;
        let home = self.home_url(scope.site_id())?;
        Some(format!("{}/?p={}", home.trim_end_matches('/'), post))
    }

    fn edit_link(&self, scope: &SiteScope<'_>, post: PostId) -> Option<String> {
        self.post(scope.site_id(), post)?;
        let home = self.home_url(scope.site_id())?;
        Some(format!(
            "{}/wp-admin/post.php?post={}&action=edit",
            home.trim_end_matches('/'),
            post
        ))
    }
}
