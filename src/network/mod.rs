// SPDX-License-Identifier: MPL-2.0

//! The hosting multisite platform, seen only through the [`Network`] trait.

mod memory;
mod scope;
mod types;

pub use memory::{MemoryNetwork, NetworkSnapshot, SiteRecord};
pub use scope::SiteScope;
pub use types::{
    DATETIME_FORMAT, OriginPost, PostId, PostStatus, SaveRequest, SiteId, SiteInfo, User, UserId,
    Visibility,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("unknown site {0}")]
    UnknownSite(SiteId),
    #[error("unknown post {1} on site {0}")]
    UnknownPost(SiteId, PostId),
    #[error("unknown user {0}")]
    UnknownUser(UserId),
    #[error("failed to read network snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid network snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Host platform adapter.
///
/// Methods taking a [`SiteScope`] read or write data owned by that site and
/// must only be called while the scope is alive.
pub trait Network {
    /// Site the host currently considers current
    fn current_site(&self) -> SiteId;

    /// Raw context switch; use [`SiteScope::enter`] instead
    fn set_current_site(&self, site: SiteId);

    fn site_exists(&self, site: SiteId) -> bool;

    /// All member sites, ascending
    fn site_ids(&self) -> Vec<SiteId>;

    fn site_info(&self, scope: &SiteScope<'_>) -> Result<SiteInfo, NetworkError>;

    /// Semester of a classroom site, from the network-wide classroom table
    fn classroom_semester(&self, site: SiteId) -> Option<u32>;

    fn user(&self, id: UserId) -> Option<User>;

    fn can_edit_post(&self, user: UserId, scope: &SiteScope<'_>, post: PostId) -> bool;

    fn share_flag(&self, scope: &SiteScope<'_>, post: PostId) -> Option<u32>;

    fn set_share_flag(
        &self,
        scope: &SiteScope<'_>,
        post: PostId,
        value: u32,
    ) -> Result<(), NetworkError>;

    /// Remember the user's preferred default for the share checkbox
    fn set_user_share_default(&self, user: UserId, value: u32) -> Result<(), NetworkError>;

    fn permalink(&self, scope: &SiteScope<'_>, post: PostId) -> Option<String>;

    fn edit_link(&self, scope: &SiteScope<'_>, post: PostId) -> Option<String>;
}
