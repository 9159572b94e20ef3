// SPDX-License-Identifier: MPL-2.0

//! Lifecycle events delivered by the host platform.

use crate::network::{OriginPost, PostId, SaveRequest, SiteId};
use serde::{Deserialize, Serialize};

/// Receiver of host lifecycle events.
///
/// Handlers return nothing: a sink logs its own failures and never aborts the
/// host operation that triggered it. Every method defaults to a no-op so a
/// sink only implements the events it cares about.
pub trait EventSink {
    fn post_saved(&self, _site: SiteId, _post: &OriginPost, _is_update: bool, _request: &SaveRequest) {
    }

    fn post_deleted(&self, _site: SiteId, _post: PostId) {}

    fn site_initialized(&self, _site: SiteId) {}

    fn site_updated(&self, _site: SiteId) {}

    fn site_deleted(&self, _site: SiteId) {}

    /// An option changed on whichever site is current
    fn option_updated(&self, _option: &str) {}
}

/// Serialized form of a host event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlatformEvent {
    PostSaved {
        site: SiteId,
        post: OriginPost,
        #[serde(default)]
        is_update: bool,
        #[serde(default)]
        request: SaveRequest,
    },
    PostDeleted {
        site: SiteId,
        post_id: PostId,
    },
    SiteInitialized {
        site: SiteId,
    },
    SiteUpdated {
        site: SiteId,
    },
    SiteDeleted {
        site: SiteId,
    },
    OptionUpdated {
        /// Site the option belongs to; the current site when absent
        #[serde(default)]
        site: Option<SiteId>,
        option: String,
    },
}

impl PlatformEvent {
    pub fn name(&self) -> &'static str {
        match self {
            PlatformEvent::PostSaved { .. } => "post_saved",
            PlatformEvent::PostDeleted { .. } => "post_deleted",
            PlatformEvent::SiteInitialized { .. } => "site_initialized",
            PlatformEvent::SiteUpdated { .. } => "site_updated",
            PlatformEvent::SiteDeleted { .. } => "site_deleted",
            PlatformEvent::OptionUpdated { .. } => "option_updated",
        }
    }

    /// Deliver this event to a sink
    pub fn deliver(&self, sink: &dyn EventSink) {
        match self {
            PlatformEvent::PostSaved {
                site,
                post,
                is_update,
                request,
            } => sink.post_saved(*site, post, *is_update, request),
            PlatformEvent::PostDeleted { site, post_id } => sink.post_deleted(*site, *post_id),
            PlatformEvent::SiteInitialized { site } => sink.site_initialized(*site),
            PlatformEvent::SiteUpdated { site } => sink.site_updated(*site),
            PlatformEvent::SiteDeleted { site } => sink.site_deleted(*site),
            PlatformEvent::OptionUpdated { option, .. } => sink.option_updated(option),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        seen: RefCell<Vec<String>>,
    }

    impl EventSink for Recorder {
        fn site_deleted(&self, site: SiteId) {
            self.seen.borrow_mut().push(format!("deleted {site}"));
        }

        fn option_updated(&self, option: &str) {
            self.seen.borrow_mut().push(format!("option {option}"));
        }
    }

    #[test]
    fn test_parse_tagged_events() {
        let event: PlatformEvent =
            serde_json::from_str(r#"{"event": "option_updated", "option": "blogname"}"#).unwrap();
        assert!(matches!(
            &event,
            PlatformEvent::OptionUpdated { site: None, option } if option == "blogname"
        ));

        let event: PlatformEvent =
            serde_json::from_str(r#"{"event": "post_deleted", "site": 4, "post_id": 12}"#).unwrap();
        assert_eq!(event.name(), "post_deleted");
    }

    #[test]
    fn test_unhandled_events_are_ignored() {
        let recorder = Recorder::default();
        PlatformEvent::SiteUpdated { site: 3 }.deliver(&recorder);
        PlatformEvent::SiteDeleted { site: 3 }.deliver(&recorder);
        PlatformEvent::OptionUpdated {
            site: None,
            option: "home".to_string(),
        }
        .deliver(&recorder);

        assert_eq!(*recorder.seen.borrow(), vec!["deleted 3", "option home"]);
    }
}
