// SPDX-License-Identifier: MPL-2.0

use crate::network::SiteId;

pub const APP_ID: &str = "campus-commons";
pub const APP_NAME: &str = "Campus Commons";

#[cfg(feature = "devel")]
pub const IS_DEVEL: bool = true;
#[cfg(not(feature = "devel"))]
pub const IS_DEVEL: bool = false;

/// Network main site; read surfaces are also available here
pub const MAIN_SITE_ID: SiteId = 1;

/// Content type given to mirror posts on the community site
pub const MIRROR_POST_TYPE: &str = "community";

/// Origin content types that may be mirrored
pub const ALLOWED_POST_TYPES: &[&str] = &["post"];

/// Default retention cap for mirror posts
pub const DEFAULT_ACTIVITY_LIMIT: u32 = 10_000;

/// Lowest retention cap accepted from the settings form
pub const MIN_ACTIVITY_LIMIT: u32 = 200;

/// Rows deleted per retention pass
pub const RETENTION_BATCH: u32 = 100;

/// Largest page size a list request may ask for
pub const MAX_PER_PAGE: u32 = 100;

/// Site options whose change triggers a reindex of the current site
pub const REINDEX_OPTIONS: &[&str] = &["home", "siteurl", "blogtitle", "blogname", "blogdescription"];

/// Share flag value that opts a post into the community mirror
pub const SHARED: u32 = 1;

/// Process configuration for the HTTP adapter.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address, e.g. "127.0.0.1:8090"
    pub bind_addr: String,
    /// SQLite database holding the mirror and the site index
    pub database_path: Option<std::path::PathBuf>,
    /// JSON snapshot of the host network
    pub network_path: Option<std::path::PathBuf>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// - `COMMONS_BIND_ADDR` (default "127.0.0.1:8090")
    /// - `COMMONS_DATABASE` (default: platform data dir)
    /// - `COMMONS_NETWORK` (default: none, an empty network)
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("COMMONS_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8090".to_string());
        let database_path = std::env::var_os("COMMONS_DATABASE").map(Into::into);
        let network_path = std::env::var_os("COMMONS_NETWORK").map(Into::into);

        tracing::info!(
            bind_addr = %bind_addr,
            database = ?database_path,
            network = ?network_path,
            devel = IS_DEVEL,
            "server configuration loaded"
        );

        Self {
            bind_addr,
            database_path,
            network_path,
        }
    }
}
