//! Live location sharing over the backend feed
//!
//! The feed is the single source of truth: a successful share is not
//! appended locally, it comes back through the live channel like every
//! other observer sees it. `locations` therefore reflects exactly what
//! the feed (plus one bulk fetch) has confirmed.

use crate::domain::errors::Error;
use crate::domain::types::{Coordinate, NewSharedLocation, SharedLocation};
use crate::io::backend::{FeedEvent, IdentityProvider, LiveFeed, LocationRepository};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct LiveChannel {
    /// Drain task moving feed events into the store; owns the feed
    /// handle, so aborting it also closes the upstream channel
    drain: JoinHandle<()>,
}

struct LocationState {
    /// Confirmed shared locations, newest first
    locations: Vec<SharedLocation>,
    channel: Option<LiveChannel>,
}

/// Owns the shared-locations cache exclusively; consumers read
/// snapshots only.
pub struct LocationStore {
    inner: Arc<Mutex<LocationState>>,
    repo: Arc<dyn LocationRepository>,
    feed: Arc<dyn LiveFeed>,
    identity: Arc<dyn IdentityProvider>,
}

impl LocationStore {
    pub fn new(
        repo: Arc<dyn LocationRepository>,
        feed: Arc<dyn LiveFeed>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LocationState { locations: Vec::new(), channel: None })),
            repo,
            feed,
            identity,
        }
    }

    /// Share the current device position. Requires an authenticated
    /// identity; the persisted record propagates back through the live
    /// feed rather than being appended here.
    pub async fn share_location(&self, coordinate: Coordinate) -> Result<SharedLocation, Error> {
        let identity = self.identity.current_identity().ok_or(Error::Unauthenticated)?;

        let row = NewSharedLocation {
            owner: identity.id,
            latitude: coordinate.latitude,
            longitude: coordinate.longitude,
            owner_email: identity.email,
        };
        let stored = self.repo.insert(row).await?;
        info!(location_id = %stored.id, "location_shared");
        Ok(stored)
    }

    /// Open the live channel and load the current rows. Any prior
    /// subscription is torn down first, so calling this repeatedly
    /// never leaks duplicate channels. The channel is opened before
    /// the bulk fetch; events landing during the fetch sit in the
    /// channel and are applied (deduplicated by id) afterwards.
    pub async fn subscribe(&self) -> Result<(), Error> {
        self.unsubscribe();

        let mut handle = self.feed.subscribe().await?;
        let rows = self.repo.fetch_all_newest_first().await?;
        info!(count = rows.len(), "locations_loaded");

        // The fetched rows must land before the drain task applies
        // anything buffered, so the lock is held across the spawn
        let mut state = self.inner.lock();
        state.locations = rows;
        let inner = Arc::clone(&self.inner);
        let drain = tokio::spawn(async move {
            while let Some(FeedEvent::Inserted(row)) = handle.next_event().await {
                let mut state = inner.lock();
                if apply_insert(&mut state.locations, row) {
                    debug!(count = state.locations.len(), "location_received");
                }
            }
        });
        state.channel = Some(LiveChannel { drain });
        Ok(())
    }

    /// Tear down the live channel; no-op when not subscribed
    pub fn unsubscribe(&self) {
        if let Some(channel) = self.inner.lock().channel.take() {
            channel.drain.abort();
            info!("feed_unsubscribed");
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.inner.lock().channel.is_some()
    }

    /// Snapshot of confirmed locations, newest first
    pub fn locations(&self) -> Vec<SharedLocation> {
        self.inner.lock().locations.clone()
    }
}

impl Drop for LocationStore {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

/// Prepend a feed-delivered row unless its id is already present.
/// Returns whether the row was applied. The at-least-once feed can
/// replay rows the bulk fetch already returned; dedup by id closes
/// that race.
fn apply_insert(locations: &mut Vec<SharedLocation>, row: SharedLocation) -> bool {
    if locations.iter().any(|existing| existing.id == row.id) {
        debug!(location_id = %row.id, "feed_duplicate_dropped");
        return false;
    }
    locations.insert(0, row);
    true
}
