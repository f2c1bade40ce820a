//! Domain models - core value types, geo math, and error taxonomy
//!
//! This module contains the canonical data types used throughout the system:
//! - `ParkingSpot` / `DelayedSpot` - shared spots and their tier-gated release state
//! - `SharedLocation` - a live location shared by a user
//! - `Coordinate` - WGS84 position value
//! - `SubscriptionTier` / `Identity` - account state read from external collaborators
//! - `geo` - haversine great-circle distance
//! - `errors` - failure taxonomy surfaced to callers

pub mod errors;
pub mod geo;
pub mod types;

// Re-export commonly used types at module level
pub use errors::{Error, GeoFailure};
pub use types::{Coordinate, ParkingSpot, SharedLocation, SubscriptionTier};
