//! Shared types for the spot-sharing core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

/// Generate a new UUIDv7 (time-sortable)
pub fn new_uuid_v7() -> String {
    Uuid::now_v7().to_string()
}

/// Newtype wrapper for parking spot IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpotId(pub String);

impl std::fmt::Display for SpotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for shared location IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub String);

impl std::fmt::Display for LocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Newtype wrapper for user IDs to provide type safety
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// WGS84 position. Range validation is the caller's responsibility;
/// `is_valid` is provided for upstream checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both components are finite and within WGS84 bounds
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Parking spot size category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpotSize {
    Compact,
    Standard,
    Large,
}

impl SpotSize {
    pub fn as_str(&self) -> &str {
        match self {
            SpotSize::Compact => "compact",
            SpotSize::Standard => "standard",
            SpotSize::Large => "large",
        }
    }
}

/// A parking spot shared by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingSpot {
    pub id: SpotId,
    pub owner: UserId,
    pub coordinate: Coordinate,
    pub size: SpotSize,
    pub accessible: bool,
    pub created_at: DateTime<Utc>,
}

impl ParkingSpot {
    pub fn new(owner: UserId, coordinate: Coordinate, size: SpotSize, accessible: bool) -> Self {
        Self {
            id: SpotId(new_uuid_v7()),
            owner,
            coordinate,
            size,
            accessible,
            created_at: Utc::now(),
        }
    }
}

/// A spot withheld from the visibility snapshot until `available_at`.
/// Exists only between creation and promotion; a spot id is never in
/// both the visible and delayed containers at once.
#[derive(Debug, Clone)]
pub struct DelayedSpot {
    pub spot: ParkingSpot,
    pub available_at: Instant,
}

/// A live location shared by a user. Field names follow the hosted
/// service's row columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedLocation {
    pub id: LocationId,
    #[serde(rename = "user_id")]
    pub owner: UserId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "user_email", default, skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
    pub shared_at: DateTime<Utc>,
}

impl SharedLocation {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// Insert payload for a shared location; id and timestamp are assigned
/// by the row store.
#[derive(Debug, Clone, Serialize)]
pub struct NewSharedLocation {
    #[serde(rename = "user_id")]
    pub owner: UserId,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(rename = "user_email", skip_serializing_if = "Option::is_none")]
    pub owner_email: Option<String>,
}

/// Billing tier read from the subscription oracle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Premium,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Premium => "premium",
        }
    }
}

impl std::str::FromStr for SubscriptionTier {
    type Err = std::convert::Infallible;

    // Anything unrecognized reads as free: the strict default
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "premium" => SubscriptionTier::Premium,
            _ => SubscriptionTier::Free,
        })
    }
}

/// Authenticated identity used to stamp ownership on shared records
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    pub id: UserId,
    pub email: Option<String>,
}
