//! End-to-end store flows over the in-memory backend
//!
//! Exercises the full path the presentation layer drives: subscribe,
//! share, feed delivery, tier-gated visibility, and distance-filtered
//! markers.

use spotshare::domain::types::{
    Coordinate, Identity, ParkingSpot, SpotSize, SubscriptionTier, UserId,
};
use spotshare::infra::Config;
use spotshare::io::MemoryBackend;
use spotshare::services::{LocationStore, MapView, SpotStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;

fn backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_identity(Some(Identity {
        id: UserId("u-1".to_string()),
        email: Some("u-1@example.is".to_string()),
    }));
    backend
}

fn build_stores(backend: &Arc<MemoryBackend>) -> (Arc<SpotStore>, Arc<LocationStore>, MapView) {
    let config = Config::default();
    let spots = Arc::new(SpotStore::new(&config, backend.clone()));
    let locations =
        Arc::new(LocationStore::new(backend.clone(), backend.clone(), backend.clone()));
    let map = MapView::new(&config, spots.clone(), locations.clone(), backend.clone());
    (spots, locations, map)
}

fn spot_at(lat: f64, lon: f64) -> ParkingSpot {
    ParkingSpot::new(
        UserId("u-1".to_string()),
        Coordinate::new(lat, lon),
        SpotSize::Standard,
        false,
    )
}

/// Let spawned feed tasks drain on the current-thread runtime
async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_share_propagates_through_feed_to_all_observers() {
    let backend = backend();
    let (_, sharer, _) = build_stores(&backend);
    let (_, observer, _) = build_stores(&backend);

    sharer.subscribe().await.unwrap();
    observer.subscribe().await.unwrap();

    let stored = sharer.share_location(Coordinate::new(64.14, -21.94)).await.unwrap();
    settle().await;

    // Both the sharer and the observer learn about it from the feed
    assert_eq!(sharer.locations(), vec![stored.clone()]);
    assert_eq!(observer.locations(), vec![stored]);
}

#[tokio::test]
async fn test_late_subscriber_catches_up_via_bulk_fetch() {
    let backend = backend();
    let (_, early, _) = build_stores(&backend);

    early.subscribe().await.unwrap();
    let l1 = early.share_location(Coordinate::new(1.0, 1.0)).await.unwrap();
    let l2 = early.share_location(Coordinate::new(2.0, 2.0)).await.unwrap();
    settle().await;

    let (_, late, _) = build_stores(&backend);
    late.subscribe().await.unwrap();

    assert_eq!(late.locations(), vec![l2, l1]);
}

#[tokio::test(start_paused = true)]
async fn test_free_tier_spot_released_after_window() {
    let backend = backend();
    backend.set_tier(Some(SubscriptionTier::Free));
    backend.set_position(Coordinate::new(0.0, 0.0));
    let (spots, _, map) = build_stores(&backend);

    map.refresh_position().await.unwrap();
    spots.add_spot(spot_at(0.0, 0.005));

    assert!(map.visible_markers().is_empty());

    advance(Duration::from_millis(60_000)).await;
    tokio::task::yield_now().await;

    let markers = map.visible_markers();
    assert_eq!(markers.len(), 1);
    assert!(markers[0].distance_km.unwrap() < 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_premium_tier_spot_visible_in_same_turn() {
    let backend = backend();
    backend.set_tier(Some(SubscriptionTier::Premium));
    backend.set_position(Coordinate::new(0.0, 0.0));
    let (spots, _, map) = build_stores(&backend);

    map.refresh_position().await.unwrap();
    spots.add_spot(spot_at(0.0, 0.0));

    assert_eq!(map.visible_markers().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_removed_spot_never_surfaces() {
    let backend = backend();
    backend.set_tier(Some(SubscriptionTier::Free));
    let (spots, _, _) = build_stores(&backend);

    let spot = spot_at(0.0, 0.0);
    let id = spot.id.clone();
    spots.add_spot(spot);

    advance(Duration::from_millis(10_000)).await;
    spots.remove_spot(&id);

    advance(Duration::from_millis(120_000)).await;
    tokio::task::yield_now().await;

    assert!(spots.visible_spots().is_empty());
}

#[tokio::test]
async fn test_teardown_then_resubscribe() {
    let backend = backend();
    let (_, store, _) = build_stores(&backend);

    store.subscribe().await.unwrap();
    store.unsubscribe();

    let missed = store.share_location(Coordinate::new(1.0, 1.0)).await.unwrap();
    settle().await;
    assert!(store.locations().is_empty());

    // Resubscribing recovers the missed row from the bulk fetch
    store.subscribe().await.unwrap();
    assert_eq!(store.locations(), vec![missed]);
}
