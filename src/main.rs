//! Spotshare - parking-spot and location sharing client core
//!
//! Module structure:
//! - `domain/` - Core value types (spots, locations, geo, errors)
//! - `io/` - External interfaces (hosted REST backend, in-memory backend)
//! - `services/` - Policy stores and map surface
//! - `infra/` - Configuration

use clap::Parser;
use spotshare::domain::types::{Coordinate, Identity, UserId};
use spotshare::infra::Config;
use spotshare::io::{
    Geolocator, IdentityProvider, LiveFeed, LocationRepository, MemoryBackend, RestBackend,
    StaticGeolocator, TierOracle,
};
use spotshare::services::{LocationStore, MapView, SpotStore};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Spotshare - parking-spot sharing client core
#[derive(Parser, Debug)]
#[command(name = "spotshare", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to the CONFIG_FILE
    /// environment variable, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Run against the in-memory backend instead of the hosted service
    #[arg(long)]
    local: bool,

    /// Email for hosted-backend sign-in
    #[arg(long)]
    email: Option<String>,

    /// Password for hosted-backend sign-in
    #[arg(long)]
    password: Option<String>,
}

struct Collaborators {
    repo: Arc<dyn LocationRepository>,
    feed: Arc<dyn LiveFeed>,
    identity: Arc<dyn IdentityProvider>,
    tier: Arc<dyn TierOracle>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging with configurable level via RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!("spotshare starting");

    let args = Args::parse();
    let config_path = match args.config {
        Some(ref path) => path.clone(),
        None => Config::resolve_config_path(&[]),
    };
    let config = Config::load_from_path(&config_path);

    info!(
        config_file = %config.config_file(),
        backend_url = %config.backend_url(),
        release_delay_ms = %config.release_delay_ms(),
        default_radius_km = %config.default_radius_km(),
        local = %args.local,
        "config_loaded"
    );

    let collaborators = if args.local {
        let backend = Arc::new(MemoryBackend::new());
        backend.set_identity(Some(Identity {
            id: UserId("local-user".to_string()),
            email: Some("local@spotshare.dev".to_string()),
        }));
        Collaborators {
            repo: backend.clone(),
            feed: backend.clone(),
            identity: backend.clone(),
            tier: backend,
        }
    } else {
        let backend = RestBackend::new(&config)?;
        if let (Some(email), Some(password)) = (&args.email, &args.password) {
            backend.sign_in(email, password).await?;
            if let Err(e) = backend.refresh_tier().await {
                warn!(error = %e, "tier_refresh_failed");
            }
        } else {
            warn!("no credentials given; sharing will be rejected as unauthenticated");
        }
        let backend = Arc::new(backend);
        Collaborators {
            repo: backend.clone(),
            feed: backend.clone(),
            identity: backend.clone(),
            tier: backend,
        }
    };

    let geolocator: Arc<dyn Geolocator> = Arc::new(StaticGeolocator::new(Coordinate::new(
        config.device_latitude(),
        config.device_longitude(),
    )));

    let spot_store = Arc::new(SpotStore::new(&config, collaborators.tier));
    let location_store = Arc::new(LocationStore::new(
        collaborators.repo,
        collaborators.feed,
        collaborators.identity,
    ));
    let map = MapView::new(&config, spot_store.clone(), location_store.clone(), geolocator);

    location_store.subscribe().await?;

    match map.refresh_position().await {
        Ok(fix) => {
            if let Err(e) = location_store.share_location(fix).await {
                warn!(error = %e, "location_share_failed");
            }
        }
        Err(e) => warn!(error = %e, "geolocation_unavailable"),
    }

    // Periodic snapshot until Ctrl+C
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                info!(
                    visible_spots = map.visible_markers().len(),
                    shared_locations = map.shared_markers().len(),
                    "snapshot"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown_signal_received");
                break;
            }
        }
    }

    location_store.unsubscribe();
    info!("spotshare shutdown complete");
    Ok(())
}
