//! IO modules - external collaborator interfaces
//!
//! This module contains the seams to every external system:
//! - `backend` - collaborator traits (row store, live feed, identity, tier, geolocation)
//! - `rest` - hosted-service backend over its REST dialect
//! - `memory` - in-memory backend for tests and local runs

pub mod backend;
pub mod memory;
pub mod rest;

// Re-export commonly used types
pub use backend::{
    FeedEvent, FeedHandle, Geolocator, IdentityProvider, LiveFeed, LocationRepository,
    StaticGeolocator, TierOracle,
};
pub use memory::MemoryBackend;
pub use rest::RestBackend;
