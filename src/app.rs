// SPDX-License-Identifier: MPL-2.0

//! Application context tying settings, the store and the host together.

use crate::events::{EventSink, PlatformEvent};
use crate::feed::Feed;
use crate::indexer::SiteIndexer;
use crate::mirror::PostMirror;
use crate::network::{Network, SiteScope};
use crate::state::CommunitySettings;
use crate::store::StoreDb;

pub struct Community<N: Network> {
    settings: CommunitySettings,
    db: StoreDb,
    network: N,
}

impl<N: Network> Community<N> {
    pub fn new(settings: CommunitySettings, db: StoreDb, network: N) -> Self {
        tracing::info!(
            community_site = settings.community_site,
            activity_limit = settings.activity_limit,
            blacklisted = settings.blacklist.len(),
            "community context ready"
        );
        Self {
            settings,
            db,
            network,
        }
    }

    pub fn settings(&self) -> &CommunitySettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: CommunitySettings) {
        self.settings = settings;
    }

    pub fn db(&self) -> &StoreDb {
        &self.db
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn mirror(&self) -> PostMirror<'_> {
        PostMirror::new(&self.settings, &self.db, &self.network)
    }

    pub fn indexer(&self) -> SiteIndexer<'_> {
        SiteIndexer::new(&self.db, &self.network)
    }

    pub fn feed(&self) -> Feed<'_> {
        Feed::new(&self.settings, &self.db, &self.network)
    }

    /// Deliver a host event to every sink
    pub fn dispatch(&self, event: &PlatformEvent) {
        tracing::debug!(event = event.name(), "dispatching platform event");

        // Options belong to a site; make it current while the sinks run
        let _scope = match event {
            PlatformEvent::OptionUpdated {
                site: Some(site), ..
            } => match SiteScope::enter(&self.network, *site) {
                Ok(scope) => Some(scope),
                Err(e) => {
                    tracing::warn!(site, "ignoring option update: {}", e);
                    return;
                }
            },
            _ => None,
        };

        let mirror = self.mirror();
        let indexer = self.indexer();
        let sinks: [&dyn EventSink; 2] = [&mirror, &indexer];
        for sink in sinks {
            event.deliver(sink);
        }
    }
}
