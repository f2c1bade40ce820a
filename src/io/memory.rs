//! In-memory backend implementing every collaborator seam
//!
//! Backs the integration tests and the binary's `--local` mode: rows
//! live in a Vec, the live feed is a broadcast channel bridged to each
//! subscriber, and identity/tier/position are settable from the
//! outside.

use crate::domain::errors::{Error, GeoFailure};
use crate::domain::types::{
    Coordinate, Identity, LocationId, NewSharedLocation, SharedLocation, SubscriptionTier,
    new_uuid_v7,
};
use crate::io::backend::{
    FeedEvent, FeedHandle, Geolocator, IdentityProvider, LiveFeed, LocationRepository, TierOracle,
};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

const FEED_CHANNEL_CAPACITY: usize = 64;

pub struct MemoryBackend {
    /// Rows, newest first
    rows: Mutex<Vec<SharedLocation>>,
    feed_tx: broadcast::Sender<SharedLocation>,
    identity: Mutex<Option<Identity>>,
    tier: Mutex<Option<SubscriptionTier>>,
    position: Mutex<Option<Coordinate>>,
    geo_failure: Mutex<Option<GeoFailure>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        let (feed_tx, _) = broadcast::channel(FEED_CHANNEL_CAPACITY);
        Self {
            rows: Mutex::new(Vec::new()),
            feed_tx,
            identity: Mutex::new(None),
            tier: Mutex::new(None),
            position: Mutex::new(None),
            geo_failure: Mutex::new(None),
        }
    }

    pub fn set_identity(&self, identity: Option<Identity>) {
        *self.identity.lock() = identity;
    }

    pub fn set_tier(&self, tier: Option<SubscriptionTier>) {
        *self.tier.lock() = tier;
    }

    pub fn set_position(&self, position: Coordinate) {
        *self.position.lock() = Some(position);
    }

    /// Make the next geolocation attempts fail with the given reason
    pub fn fail_geolocation(&self, failure: GeoFailure) {
        *self.geo_failure.lock() = Some(failure);
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocationRepository for MemoryBackend {
    async fn insert(&self, row: NewSharedLocation) -> Result<SharedLocation, Error> {
        let stored = SharedLocation {
            id: LocationId(new_uuid_v7()),
            owner: row.owner,
            latitude: row.latitude,
            longitude: row.longitude,
            owner_email: row.owner_email,
            shared_at: Utc::now(),
        };
        self.rows.lock().insert(0, stored.clone());

        // No subscribers is fine; the row is still persisted
        let _ = self.feed_tx.send(stored.clone());
        debug!(location_id = %stored.id, "memory_row_inserted");
        Ok(stored)
    }

    async fn fetch_all_newest_first(&self) -> Result<Vec<SharedLocation>, Error> {
        Ok(self.rows.lock().clone())
    }
}

#[async_trait]
impl LiveFeed for MemoryBackend {
    async fn subscribe(&self) -> Result<FeedHandle, Error> {
        let mut upstream = self.feed_tx.subscribe();
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);

        // Bridge ends when the handle (receiver) is dropped or the
        // backend itself goes away
        tokio::spawn(async move {
            loop {
                match upstream.recv().await {
                    Ok(row) => {
                        if tx.send(FeedEvent::Inserted(row)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "memory_feed_lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(FeedHandle::new(rx))
    }
}

impl IdentityProvider for MemoryBackend {
    fn current_identity(&self) -> Option<Identity> {
        self.identity.lock().clone()
    }
}

impl TierOracle for MemoryBackend {
    fn current_tier(&self) -> Option<SubscriptionTier> {
        *self.tier.lock()
    }
}

#[async_trait]
impl Geolocator for MemoryBackend {
    async fn current_position(&self) -> Result<Coordinate, Error> {
        if let Some(failure) = *self.geo_failure.lock() {
            return Err(Error::Geolocation(failure));
        }
        self.position
            .lock()
            .ok_or(Error::Geolocation(GeoFailure::PermissionDenied))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::UserId;

    fn new_row(owner: &str, lat: f64, lon: f64) -> NewSharedLocation {
        NewSharedLocation {
            owner: UserId(owner.to_string()),
            latitude: lat,
            longitude: lon,
            owner_email: None,
        }
    }

    #[tokio::test]
    async fn test_insert_then_fetch_newest_first() {
        let backend = MemoryBackend::new();
        let first = backend.insert(new_row("u-1", 1.0, 1.0)).await.unwrap();
        let second = backend.insert(new_row("u-1", 2.0, 2.0)).await.unwrap();

        let rows = backend.fetch_all_newest_first().await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, second.id);
        assert_eq!(rows[1].id, first.id);
    }

    #[tokio::test]
    async fn test_feed_delivers_inserts() {
        let backend = MemoryBackend::new();
        let mut handle = backend.subscribe().await.unwrap();

        let stored = backend.insert(new_row("u-1", 1.0, 1.0)).await.unwrap();

        let FeedEvent::Inserted(row) = handle.next_event().await.unwrap();
        assert_eq!(row.id, stored.id);
    }

    #[tokio::test]
    async fn test_geolocation_failure_injection() {
        let backend = MemoryBackend::new();
        backend.set_position(Coordinate::new(0.0, 0.0));
        backend.fail_geolocation(GeoFailure::Timeout);

        match backend.current_position().await {
            Err(Error::Geolocation(GeoFailure::Timeout)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
