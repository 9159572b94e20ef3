// SPDX-License-Identifier: MPL-2.0

//! Post mirror engine.
//!
//! Copies shared posts from personal blogs onto the community site. Only the
//! title and metadata travel; body and excerpt stay on the origin site.

use crate::config::{ALLOWED_POST_TYPES, DEFAULT_ACTIVITY_LIMIT, RETENTION_BATCH, SHARED};
use crate::events::EventSink;
use crate::feed::render::escape_html;
use crate::network::{
    Network, NetworkError, OriginPost, PostId, PostStatus, SaveRequest, SiteId, SiteScope,
};
use crate::state::CommunitySettings;
use crate::store::{MirrorDraft, MirrorPost, MirrorStore, StoreDb, StoreError};
use chrono::{Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a save was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Revision,
    Autosave,
    AutoDraft,
    NoCapability,
    Heartbeat,
    PostType,
    NotPersonalSite,
    NotConfigured,
}

/// What a lifecycle hook did to the mirror
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOutcome {
    Skipped(SkipReason),
    /// Mirror removed (or already absent); carries the removed id
    Removed(Option<i64>),
    Inserted(i64),
    Updated(i64),
}

pub struct PostMirror<'a> {
    settings: &'a CommunitySettings,
    db: &'a StoreDb,
    network: &'a dyn Network,
}

impl<'a> PostMirror<'a> {
    pub fn new(settings: &'a CommunitySettings, db: &'a StoreDb, network: &'a dyn Network) -> Self {
        Self {
            settings,
            db,
            network,
        }
    }

    /// Handle a post save on `site`
    pub fn on_post_saved(
        &self,
        site: SiteId,
        post: &OriginPost,
        request: &SaveRequest,
    ) -> Result<MirrorOutcome, MirrorError> {
        if post.is_revision {
            return Ok(MirrorOutcome::Skipped(SkipReason::Revision));
        }
        if post.is_autosave {
            return Ok(MirrorOutcome::Skipped(SkipReason::Autosave));
        }
        if post.status == PostStatus::AutoDraft {
            return Ok(MirrorOutcome::Skipped(SkipReason::AutoDraft));
        }

        let origin = SiteScope::enter(self.network, site)?;

        if !self.network.can_edit_post(request.user_id, &origin, post.id) {
            return Ok(MirrorOutcome::Skipped(SkipReason::NoCapability));
        }
        if request.is_heartbeat() {
            return Ok(MirrorOutcome::Skipped(SkipReason::Heartbeat));
        }
        if !ALLOWED_POST_TYPES.contains(&post.post_type.as_str()) {
            return Ok(MirrorOutcome::Skipped(SkipReason::PostType));
        }

        let info = self.network.site_info(&origin)?;
        if !info.personal {
            return Ok(MirrorOutcome::Skipped(SkipReason::NotPersonalSite));
        }

        let Some(community) = self.settings.community_site() else {
            tracing::warn!(site, post = post.id, "no community site configured, not mirroring");
            return Ok(MirrorOutcome::Skipped(SkipReason::NotConfigured));
        };

        let submitted = request.share_value();
        if let Some(value) = submitted {
            self.network.set_share_flag(&origin, post.id, value)?;
        }

        let blacklisted = self
            .network
            .user(request.user_id)
            .is_some_and(|u| self.settings.is_blacklisted(&u.email));
        if blacklisted {
            drop(origin);
            tracing::info!(site, post = post.id, "author is blacklisted, removing mirror");
            return self.remove(community, site, post.id);
        }

        if let Some(value) = submitted {
            self.network.set_user_share_default(request.user_id, value)?;
        }

        let share = submitted
            .or_else(|| self.network.share_flag(&origin, post.id))
            .unwrap_or(0);
        drop(origin);

        if share != SHARED {
            return self.remove(community, site, post.id);
        }
        if !post.visibility.is_shareable() {
            tracing::debug!(
                site,
                post = post.id,
                visibility = post.visibility.as_str(),
                "visibility not shareable, removing mirror"
            );
            return self.remove(community, site, post.id);
        }

        self.upsert(community, site, info.gmt_offset, post)
    }

    /// Handle a post deletion on `site`
    pub fn on_post_deleted(&self, site: SiteId, post: PostId) -> Result<MirrorOutcome, MirrorError> {
        let personal = {
            let origin = SiteScope::enter(self.network, site)?;
            self.network.site_info(&origin)?.personal
        };
        if !personal {
            return Ok(MirrorOutcome::Skipped(SkipReason::NotPersonalSite));
        }

        let Some(community) = self.settings.community_site() else {
            tracing::warn!(site, post, "no community site configured, nothing to remove");
            return Ok(MirrorOutcome::Skipped(SkipReason::NotConfigured));
        };

        self.remove(community, site, post)
    }

    /// Origin edit link for a mirror post, if its origin can still be resolved
    pub fn edit_link_for(&self, mirror_id: i64) -> Result<Option<String>, MirrorError> {
        let Some(community) = self.settings.community_site() else {
            return Ok(None);
        };

        let mirror = {
            let scope = SiteScope::enter(self.network, community)?;
            match MirrorStore::new(self.db).get(&scope, mirror_id) {
                Ok(post) => post,
                Err(StoreError::NotFound) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        };

        Ok(self.origin_link(&mirror, |net, scope, post| net.edit_link(scope, post)))
    }

    /// Origin permalink for a mirror post
    pub fn permalink_for(&self, mirror: &MirrorPost) -> Option<String> {
        self.origin_link(mirror, |net, scope, post| net.permalink(scope, post))
    }

    fn origin_link(
        &self,
        mirror: &MirrorPost,
        link: impl FnOnce(&dyn Network, &SiteScope<'_>, PostId) -> Option<String>,
    ) -> Option<String> {
        if mirror.origin_site_id == 0 || mirror.origin_post_id == 0 {
            return None;
        }
        let scope = SiteScope::enter(self.network, mirror.origin_site_id).ok()?;
        link(self.network, &scope, mirror.origin_post_id)
    }

    /// Delete the mirror of an origin post, if any
    fn remove(
        &self,
        community: SiteId,
        origin_site: SiteId,
        origin_post: PostId,
    ) -> Result<MirrorOutcome, MirrorError> {
        let scope = SiteScope::enter(self.network, community)?;
        let store = MirrorStore::new(self.db);

        let Some(id) = store.find_by_origin(&scope, origin_site, origin_post)? else {
            return Ok(MirrorOutcome::Removed(None));
        };

        store.delete(&scope, id)?;
        tracing::info!(community, origin_site, origin_post, mirror = id, "removed mirror post");
        Ok(MirrorOutcome::Removed(Some(id)))
    }

    fn upsert(
        &self,
        community: SiteId,
        origin_site: SiteId,
        origin_offset: i32,
        post: &OriginPost,
    ) -> Result<MirrorOutcome, MirrorError> {
        let classrooms = self.group_links(&post.groups);

        let scope = SiteScope::enter(self.network, community)?;
        let community_offset = self.network.site_info(&scope)?.gmt_offset;

        let (date, date_gmt) =
            to_community_time(post.date, post.date_gmt, origin_offset, community_offset);
        let (modified, modified_gmt) =
            to_community_time(post.modified, post.modified_gmt, origin_offset, community_offset);

        let draft = MirrorDraft {
            origin_site_id: origin_site,
            origin_post_id: post.id,
            status: post.status,
            author_id: post.author,
            title: post.title.clone(),
            date,
            date_gmt: Some(date_gmt),
            modified,
            modified_gmt: Some(modified_gmt),
            classrooms,
            visibility: post.visibility,
        };

        let store = MirrorStore::new(self.db);
        match store.find_by_origin(&scope, origin_site, post.id)? {
            Some(id) => {
                store.update(&scope, id, &draft)?;
                tracing::info!(community, origin_site, origin_post = post.id, mirror = id, "updated mirror post");
                Ok(MirrorOutcome::Updated(id))
            }
            None => {
                let id = store.insert(&scope, &draft)?;
                tracing::info!(community, origin_site, origin_post = post.id, mirror = id, "inserted mirror post");
                self.enforce_retention(&scope)?;
                Ok(MirrorOutcome::Inserted(id))
            }
        }
    }

    /// Trim the mirror to the activity limit, oldest first, in bounded
    /// batches. Returns the size of each batch deleted.
    pub fn enforce_retention(&self, scope: &SiteScope<'_>) -> Result<Vec<usize>, MirrorError> {
        let cap = match self.settings.activity_limit {
            0 => DEFAULT_ACTIVITY_LIMIT,
            n => n,
        } as u64;
        let store = MirrorStore::new(self.db);

        let mut batches = Vec::new();
        loop {
            let count = store.count(scope)?;
            if count <= cap {
                break;
            }
            let batch = (count - cap).min(RETENTION_BATCH as u64) as u32;
            let deleted = store.delete_oldest(scope, batch)?;
            if deleted == 0 {
                break;
            }
            batches.push(deleted);
        }

        if !batches.is_empty() {
            tracing::info!(
                site = scope.site_id(),
                cap,
                deleted = batches.iter().sum::<usize>(),
                "enforced mirror retention"
            );
        }
        Ok(batches)
    }

    /// Rendered links to the classroom sites a post was published to.
    /// Groups that no longer exist or have no name are left out.
    fn group_links(&self, groups: &[SiteId]) -> Vec<String> {
        groups
            .iter()
            .filter_map(|&group| {
                let scope = SiteScope::enter(self.network, group).ok()?;
                let info = self.network.site_info(&scope).ok()?;
                if info.name.trim().is_empty() {
                    return None;
                }
                let url = info.url.unwrap_or_default();
                Some(format!(
                    "<a href=\"{}\">{}</a>",
                    escape_html(&url),
                    escape_html(&info.name)
                ))
            })
            .collect()
    }
}

impl EventSink for PostMirror<'_> {
    fn post_saved(&self, site: SiteId, post: &OriginPost, _is_update: bool, request: &SaveRequest) {
        match self.on_post_saved(site, post, request) {
            Ok(outcome) => tracing::debug!(site, post = post.id, ?outcome, "post save handled"),
            Err(e) => tracing::error!(site, post = post.id, "failed to mirror post: {}", e),
        }
    }

    fn post_deleted(&self, site: SiteId, post: PostId) {
        match self.on_post_deleted(site, post) {
            Ok(outcome) => tracing::debug!(site, post, ?outcome, "post delete handled"),
            Err(e) => tracing::error!(site, post, "failed to remove mirror: {}", e),
        }
    }
}

/// Convert an origin timestamp into community local time.
/// Returns (community local, GMT). A missing GMT value is derived from the
/// origin local time and offset.
fn to_community_time(
    local: NaiveDateTime,
    gmt: Option<NaiveDateTime>,
    origin_offset: i32,
    community_offset: i32,
) -> (NaiveDateTime, NaiveDateTime) {
    let gmt = gmt.unwrap_or_else(|| local - Duration::seconds(origin_offset as i64));
    let community = FixedOffset::east_opt(community_offset).unwrap_or_else(|| Utc.fix());
    (community.from_utc_datetime(&gmt).naive_local(), gmt)
}
