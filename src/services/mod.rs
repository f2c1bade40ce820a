//! Services - the policy stores and map surface
//!
//! This module contains the core state management:
//! - `spot_store` - tier-gated spot visibility with delayed release
//! - `location_store` - live location sharing over the backend feed
//! - `map_view` - map presentation surface consuming both stores

pub mod location_store;
pub mod map_view;
pub mod spot_store;

// Re-export commonly used types
pub use location_store::LocationStore;
pub use map_view::{MapView, SpotMarker};
pub use spot_store::SpotStore;
