//! Spot visibility store with tier-gated release delay
//!
//! Spots shared by premium accounts are visible to everyone at once.
//! Spots shared by free accounts sit in a delayed container for a
//! grace window and are promoted into the visible list by a cancelable
//! timer task. The visibility snapshot never contains a delayed spot
//! whose release time is still in the future.

use crate::domain::types::{Coordinate, DelayedSpot, ParkingSpot, SpotId, SubscriptionTier};
use crate::infra::config::Config;
use crate::io::backend::TierOracle;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

struct SpotState {
    /// Visible spots, newest first
    spots: Vec<ParkingSpot>,
    /// Spots waiting out the free-tier grace window
    delayed: Vec<DelayedSpot>,
    /// Pending promotion timers by spot id
    timers: FxHashMap<SpotId, JoinHandle<()>>,
    selected_distance_km: f64,
    user_location: Option<Coordinate>,
    selected_spot: Option<ParkingSpot>,
}

/// Owns the spot containers exclusively; consumers read snapshots only.
/// Must be used from within a Tokio runtime (promotions are spawned
/// timer tasks).
pub struct SpotStore {
    inner: Arc<Mutex<SpotState>>,
    tier: Arc<dyn TierOracle>,
    release_delay: Duration,
}

impl SpotStore {
    pub fn new(config: &Config, tier: Arc<dyn TierOracle>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SpotState {
                spots: Vec::new(),
                delayed: Vec::new(),
                timers: FxHashMap::default(),
                selected_distance_km: config.default_radius_km(),
                user_location: None,
                selected_spot: None,
            })),
            tier,
            release_delay: Duration::from_millis(config.release_delay_ms()),
        }
    }

    /// Accept a newly shared spot. Premium tier releases it instantly;
    /// free tier (or an unavailable oracle) holds it for the grace
    /// window before promotion.
    pub fn add_spot(&self, spot: ParkingSpot) {
        let tier = self.tier.current_tier().unwrap_or(SubscriptionTier::Free);

        match tier {
            SubscriptionTier::Premium => {
                let id = spot.id.clone();
                let mut state = self.inner.lock();
                purge_id(&mut state, &id);
                debug!(spot_id = %id, "spot_visible_immediately");
                state.spots.insert(0, spot);
            }
            SubscriptionTier::Free => {
                let id = spot.id.clone();
                let available_at = Instant::now() + self.release_delay;
                let mut state = self.inner.lock();
                purge_id(&mut state, &id);

                debug!(
                    spot_id = %id,
                    delay_ms = self.release_delay.as_millis() as u64,
                    "spot_release_delayed"
                );
                state.delayed.push(DelayedSpot { spot, available_at });

                let handle =
                    tokio::spawn(promote_after(Arc::clone(&self.inner), id.clone(), available_at));
                state.timers.insert(id, handle);
            }
        }
    }

    /// Remove a spot from both containers and cancel any pending
    /// promotion. Silent when the id is unknown.
    pub fn remove_spot(&self, id: &SpotId) {
        let mut state = self.inner.lock();
        purge_id(&mut state, id);
        if state.selected_spot.as_ref().map(|s| &s.id) == Some(id) {
            state.selected_spot = None;
        }
    }

    /// Visibility snapshot, recomputed per call. Premium readers see
    /// the visible list verbatim; free readers additionally see any
    /// delayed spot whose window has elapsed. Always a fresh Vec; not
    /// distance-filtered at this layer.
    pub fn visible_spots(&self) -> Vec<ParkingSpot> {
        let tier = self.tier.current_tier().unwrap_or(SubscriptionTier::Free);
        let state = self.inner.lock();

        match tier {
            SubscriptionTier::Premium => state.spots.clone(),
            SubscriptionTier::Free => {
                let now = Instant::now();
                state
                    .spots
                    .iter()
                    .cloned()
                    .chain(
                        state
                            .delayed
                            .iter()
                            .filter(|delayed| delayed.available_at <= now)
                            .map(|delayed| delayed.spot.clone()),
                    )
                    .collect()
            }
        }
    }

    /// Set the map filter radius. Non-finite or non-positive values
    /// are rejected and the previous radius kept.
    pub fn set_selected_distance(&self, km: f64) {
        if !km.is_finite() || km <= 0.0 {
            warn!(km, "invalid_filter_radius_ignored");
            return;
        }
        self.inner.lock().selected_distance_km = km;
    }

    pub fn selected_distance_km(&self) -> f64 {
        self.inner.lock().selected_distance_km
    }

    pub fn set_user_location(&self, coordinate: Coordinate) {
        self.inner.lock().user_location = Some(coordinate);
    }

    pub fn user_location(&self) -> Option<Coordinate> {
        self.inner.lock().user_location
    }

    pub fn set_selected_spot(&self, spot: Option<ParkingSpot>) {
        self.inner.lock().selected_spot = spot;
    }

    pub fn selected_spot(&self) -> Option<ParkingSpot> {
        self.inner.lock().selected_spot.clone()
    }

    /// Number of spots waiting out the grace window
    pub fn delayed_count(&self) -> usize {
        self.inner.lock().delayed.len()
    }
}

impl Drop for SpotStore {
    fn drop(&mut self) {
        // No dangling promotion timers past store teardown
        for (_, handle) in self.inner.lock().timers.drain() {
            handle.abort();
        }
    }
}

/// Promotion task: after the window elapses, move the spot from the
/// delayed container to the front of the visible list. A spot removed
/// in the meantime is gone from `delayed`, making this a no-op - a
/// removed spot is never resurrected.
/// Drop every trace of an id: both containers and any pending timer.
/// Keeps the invariant that an id lives in at most one container with
/// at most one timer, also across re-adds.
fn purge_id(state: &mut SpotState, id: &SpotId) {
    state.spots.retain(|spot| &spot.id != id);
    state.delayed.retain(|delayed| &delayed.spot.id != id);
    if let Some(handle) = state.timers.remove(id) {
        handle.abort();
        debug!(spot_id = %id, "spot_promotion_canceled");
    }
}

async fn promote_after(inner: Arc<Mutex<SpotState>>, id: SpotId, available_at: Instant) {
    tokio::time::sleep_until(available_at).await;

    let mut state = inner.lock();
    state.timers.remove(&id);
    if let Some(idx) = state.delayed.iter().position(|delayed| delayed.spot.id == id) {
        let delayed = state.delayed.remove(idx);
        debug!(spot_id = %id, "spot_released");
        state.spots.insert(0, delayed.spot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{SpotSize, UserId};
    use tokio::time::advance;

    struct FixedTier(Option<SubscriptionTier>);

    impl TierOracle for FixedTier {
        fn current_tier(&self) -> Option<SubscriptionTier> {
            self.0
        }
    }

    fn store_with_tier(tier: Option<SubscriptionTier>) -> SpotStore {
        SpotStore::new(&Config::default(), Arc::new(FixedTier(tier)))
    }

    fn spot_at(lat: f64, lon: f64) -> ParkingSpot {
        ParkingSpot::new(
            UserId("u-1".to_string()),
            Coordinate::new(lat, lon),
            SpotSize::Standard,
            false,
        )
    }

    fn millis(ms: u64) -> Duration {
        Duration::from_millis(ms)
    }

    #[tokio::test(start_paused = true)]
    async fn test_premium_spot_visible_immediately() {
        let store = store_with_tier(Some(SubscriptionTier::Premium));
        let spot = spot_at(0.0, 0.0);
        let id = spot.id.clone();

        store.add_spot(spot);

        let visible = store.visible_spots();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, id);
        assert_eq!(store.delayed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_premium_inserts_newest_first() {
        let store = store_with_tier(Some(SubscriptionTier::Premium));
        let first = spot_at(0.0, 0.0);
        let second = spot_at(1.0, 1.0);
        let second_id = second.id.clone();

        store.add_spot(first);
        store.add_spot(second);

        assert_eq!(store.visible_spots()[0].id, second_id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_free_spot_hidden_until_window_elapses() {
        let store = store_with_tier(Some(SubscriptionTier::Free));
        // Free user at (0,0) shares a spot at (0,0.01)
        store.add_spot(spot_at(0.0, 0.01));

        advance(millis(59_999)).await;
        assert!(store.visible_spots().is_empty());

        advance(millis(1)).await;
        assert_eq!(store.visible_spots().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readded_spot_restarts_window_and_surfaces_once() {
        let store = store_with_tier(Some(SubscriptionTier::Free));
        let spot = spot_at(0.0, 0.0);
        let id = spot.id.clone();

        store.add_spot(spot.clone());
        advance(millis(10_000)).await;
        store.add_spot(spot);

        // Only the second add's window counts
        advance(millis(59_999)).await;
        assert!(store.visible_spots().is_empty());

        advance(millis(1)).await;
        tokio::task::yield_now().await;

        let visible = store.visible_spots();
        assert_eq!(visible.iter().filter(|s| s.id == id).count(), 1);
        assert_eq!(store.delayed_count(), 0);

        // The first add's timer must not fire late and re-release
        advance(millis(60_000)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.visible_spots().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_then_readded_spot_is_hidden_again() {
        let store = store_with_tier(Some(SubscriptionTier::Free));
        let spot = spot_at(0.0, 0.0);

        store.add_spot(spot.clone());
        advance(millis(60_000)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.visible_spots().len(), 1);

        // Re-adding an already released id pulls it back behind the window
        store.add_spot(spot);
        assert!(store.visible_spots().is_empty());

        advance(millis(60_000)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.visible_spots().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_spot_appears_exactly_once() {
        let store = store_with_tier(Some(SubscriptionTier::Free));
        let spot = spot_at(0.0, 0.0);
        let id = spot.id.clone();
        store.add_spot(spot);

        // Past the window, with the promotion timer given a chance to run
        advance(millis(60_001)).await;
        tokio::task::yield_now().await;

        let visible = store.visible_spots();
        assert_eq!(visible.iter().filter(|s| s.id == id).count(), 1);
        assert_eq!(store.delayed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_before_release_prevents_promotion() {
        let store = store_with_tier(Some(SubscriptionTier::Free));
        let spot = spot_at(0.0, 0.0);
        let id = spot.id.clone();
        store.add_spot(spot);

        advance(millis(30_000)).await;
        store.remove_spot(&id);

        advance(millis(60_000)).await;
        tokio::task::yield_now().await;

        assert!(store.visible_spots().is_empty());
        assert_eq!(store.delayed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_unknown_id_is_silent() {
        let store = store_with_tier(Some(SubscriptionTier::Premium));
        store.remove_spot(&SpotId("nope".to_string()));
        assert!(store.visible_spots().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_oracle_unavailable_defaults_to_delayed_release() {
        let store = store_with_tier(None);
        store.add_spot(spot_at(0.0, 0.0));

        assert!(store.visible_spots().is_empty());
        assert_eq!(store.delayed_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_is_a_fresh_container() {
        let store = store_with_tier(Some(SubscriptionTier::Premium));
        store.add_spot(spot_at(0.0, 0.0));

        let mut snapshot = store.visible_spots();
        snapshot.clear();

        assert_eq!(store.visible_spots().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_radius_rejected() {
        let store = store_with_tier(Some(SubscriptionTier::Free));
        assert_eq!(store.selected_distance_km(), 1.0);

        store.set_selected_distance(0.0);
        store.set_selected_distance(-2.0);
        store.set_selected_distance(f64::NAN);
        assert_eq!(store.selected_distance_km(), 1.0);

        store.set_selected_distance(2.5);
        assert_eq!(store.selected_distance_km(), 2.5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_clears_selection() {
        let store = store_with_tier(Some(SubscriptionTier::Premium));
        let spot = spot_at(0.0, 0.0);
        let id = spot.id.clone();
        store.add_spot(spot.clone());
        store.set_selected_spot(Some(spot));

        store.remove_spot(&id);
        assert!(store.selected_spot().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_delay_window() {
        let config = Config::default().with_release_delay_ms(5_000);
        let store = SpotStore::new(&config, Arc::new(FixedTier(Some(SubscriptionTier::Free))));
        store.add_spot(spot_at(0.0, 0.0));

        advance(millis(4_999)).await;
        assert!(store.visible_spots().is_empty());
        advance(millis(1)).await;
        assert_eq!(store.visible_spots().len(), 1);
    }
}
