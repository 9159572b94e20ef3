// SPDX-License-Identifier: MPL-2.0

use anyhow::Context;
use campus_commons::config::{APP_ID, APP_NAME, MAIN_SITE_ID, ServerConfig};
use campus_commons::indexer::ReindexTarget;
use campus_commons::network::MemoryNetwork;
use campus_commons::state::CommunitySettings;
use campus_commons::store::StoreDb;
use campus_commons::{Community, server};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Community mirror and site directory for a campus multisite network.
#[derive(Parser, Debug)]
#[command(name = APP_ID, version, long_about = None)]
struct Args {
    /// Settings file (default: platform config dir)
    #[arg(long, env = "COMMONS_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the list surfaces and accept host events
    Serve,
    /// Rebuild the site directory from the host network
    Reindex {
        /// Only this site
        #[arg(long)]
        site: Option<u64>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::info!("{} {}", APP_NAME, env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::from_env();
    let settings = match &args.settings {
        Some(path) => CommunitySettings::load_from(path),
        None => CommunitySettings::load(),
    };

    let db = match &config.database_path {
        Some(path) => StoreDb::open(path),
        None => StoreDb::open_default(),
    }
    .context("failed to open community database")?;

    let network = match &config.network_path {
        Some(path) => MemoryNetwork::from_path(path).context("failed to load network snapshot")?,
        None => {
            tracing::warn!("no network snapshot configured, starting with the main site only");
            MemoryNetwork::with_sites(&[MAIN_SITE_ID])
        }
    };

    let app = Community::new(settings, db, network);

    match args.command {
        Command::Serve => server::serve(&app, &config.bind_addr)?,
        Command::Reindex { site } => {
            let target = site.map_or(ReindexTarget::All, ReindexTarget::Site);
            let report = app.indexer().reindex(target)?;
            println!(
                "indexed {} sites ({} new, {} updated, {} skipped, {} failed)",
                report.total(),
                report.inserted.len(),
                report.updated.len(),
                report.skipped.len(),
                report.failed.len()
            );
        }
    }

    Ok(())
}
