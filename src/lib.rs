// SPDX-License-Identifier: MPL-2.0

//! Community layer for a campus multisite network.
//!
//! Mirrors shared posts from personal blogs onto a community site, keeps a
//! searchable directory of member sites, and serves both as paged lists.

pub mod app;
pub mod config;
pub mod events;
pub mod feed;
pub mod indexer;
pub mod mirror;
pub mod network;
pub mod search;
pub mod server;
pub mod state;
pub mod store;

pub use app::Community;
