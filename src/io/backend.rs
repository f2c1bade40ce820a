//! Collaborator traits consumed by the stores
//!
//! The stores never talk to the hosted service directly; they hold
//! trait objects for each narrow capability so the policy layer can be
//! tested in isolation.

use crate::domain::errors::{Error, GeoFailure};
use crate::domain::types::{
    Coordinate, Identity, NewSharedLocation, SharedLocation, SubscriptionTier,
};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Row-store access for the shared-locations collection
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Persist a new shared location; the store assigns id and timestamp
    async fn insert(&self, row: NewSharedLocation) -> Result<SharedLocation, Error>;

    /// Bulk fetch of all rows, newest first
    async fn fetch_all_newest_first(&self) -> Result<Vec<SharedLocation>, Error>;
}

/// Insertion event pushed by the live feed
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Inserted(SharedLocation),
}

/// Handle to an open live feed channel. Delivery is at-least-once with
/// no ordering guarantee relative to a concurrent bulk fetch. Dropping
/// the handle closes the upstream subscription.
pub struct FeedHandle {
    events: mpsc::Receiver<FeedEvent>,
}

impl FeedHandle {
    pub fn new(events: mpsc::Receiver<FeedEvent>) -> Self {
        Self { events }
    }

    /// Next pushed event; `None` once the upstream channel is gone
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }
}

/// Push-based delivery of insertion events from the row store
#[async_trait]
pub trait LiveFeed: Send + Sync {
    async fn subscribe(&self) -> Result<FeedHandle, Error>;
}

/// Read of the cached authentication state
pub trait IdentityProvider: Send + Sync {
    fn current_identity(&self) -> Option<Identity>;
}

/// Read-only billing-tier capability. `None` means the oracle is
/// unavailable; callers must treat that as the free tier so visibility
/// is never silently over-granted.
pub trait TierOracle: Send + Sync {
    fn current_tier(&self) -> Option<SubscriptionTier>;
}

/// One-shot device position acquisition
#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn current_position(&self) -> Result<Coordinate, Error>;
}

/// Geolocator reporting a fixed position, standing in for a real
/// device fix when running headless
pub struct StaticGeolocator {
    position: Option<Coordinate>,
}

impl StaticGeolocator {
    pub fn new(position: Coordinate) -> Self {
        Self { position: Some(position) }
    }

    /// A geolocator with no fix, behaving like a denied permission
    pub fn denied() -> Self {
        Self { position: None }
    }
}

#[async_trait]
impl Geolocator for StaticGeolocator {
    async fn current_position(&self) -> Result<Coordinate, Error> {
        self.position.ok_or(Error::Geolocation(GeoFailure::PermissionDenied))
    }
}
