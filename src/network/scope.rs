// SPDX-License-Identifier: MPL-2.0

//! Scoped site switching.
//!
//! Every read or write that belongs to a specific site goes through a
//! [`SiteScope`]. Entering a scope makes the site current on the host; dropping
//! it restores whatever site was current before, on every exit path including
//! `?` early returns and panics unwinding through the caller.

use crate::network::{Network, NetworkError, SiteId};

pub struct SiteScope<'a> {
    network: &'a dyn Network,
    site: SiteId,
    previous: SiteId,
}

impl<'a> SiteScope<'a> {
    /// Switch the host to `site` until the returned guard is dropped
    pub fn enter(network: &'a dyn Network, site: SiteId) -> Result<Self, NetworkError> {
        if !network.site_exists(site) {
            return Err(NetworkError::UnknownSite(site));
        }

        let previous = network.current_site();
        network.set_current_site(site);
        tracing::trace!(site, previous, "entered site scope");

        Ok(Self {
            network,
            site,
            previous,
        })
    }

    pub fn site_id(&self) -> SiteId {
        self.site
    }

    pub fn network(&self) -> &'a dyn Network {
        self.network
    }
}

impl Drop for SiteScope<'_> {
    fn drop(&mut self) {
        self.network.set_current_site(self.previous);
        tracing::trace!(site = self.site, restored = self.previous, "left site scope");
    }
}

impl std::fmt::Debug for SiteScope<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteScope")
            .field("site", &self.site)
            .field("previous", &self.previous)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryNetwork;

    #[test]
    fn test_restores_on_drop() {
        let net = MemoryNetwork::with_sites(&[1, 2, 3]);
        assert_eq!(net.current_site(), 1);
        {
            let outer = SiteScope::enter(&net, 2).unwrap();
            assert_eq!(net.current_site(), 2);
            {
                let inner = SiteScope::enter(&net, 3).unwrap();
                assert_eq!(inner.site_id(), 3);
                assert_eq!(net.current_site(), 3);
            }
            assert_eq!(net.current_site(), 2);
            assert_eq!(outer.site_id(), 2);
        }
        assert_eq!(net.current_site(), 1);
    }

    #[test]
    fn test_unknown_site_leaves_context() {
        let net = MemoryNetwork::with_sites(&[1]);
        let err = SiteScope::enter(&net, 9).unwrap_err();
        assert!(matches!(err, NetworkError::UnknownSite(9)));
        assert_eq!(net.current_site(), 1);
    }

    #[test]
    fn test_restores_on_early_return() {
        fn lookup(net: &MemoryNetwork) -> Result<(), NetworkError> {
            let _scope = SiteScope::enter(net, 2)?;
            Err(NetworkError::UnknownPost(2, 99))
        }

        let net = MemoryNetwork::with_sites(&[1, 2]);
        assert!(lookup(&net).is_err());
        assert_eq!(net.current_site(), 1);
    }
}
