//! Map presentation surface
//!
//! Thin consumer of the two stores plus device geolocation. Rendering
//! itself is external; this layer produces the marker sets and the
//! navigation URL, and is where distance filtering happens.

use crate::domain::errors::{Error, GeoFailure};
use crate::domain::geo::distance_km;
use crate::domain::types::{Coordinate, ParkingSpot, SharedLocation};
use crate::infra::config::Config;
use crate::io::backend::Geolocator;
use crate::services::location_store::LocationStore;
use crate::services::spot_store::SpotStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// A spot ready to render, with the distance used for its label. The
/// label and the filter share one distance implementation.
#[derive(Debug, Clone)]
pub struct SpotMarker {
    pub spot: ParkingSpot,
    pub distance_km: Option<f64>,
}

pub struct MapView {
    spots: Arc<SpotStore>,
    locations: Arc<LocationStore>,
    geolocator: Arc<dyn Geolocator>,
    geolocation_timeout: Duration,
}

impl MapView {
    pub fn new(
        config: &Config,
        spots: Arc<SpotStore>,
        locations: Arc<LocationStore>,
        geolocator: Arc<dyn Geolocator>,
    ) -> Self {
        Self {
            spots,
            locations,
            geolocator,
            geolocation_timeout: Duration::from_millis(config.geolocation_timeout_ms()),
        }
    }

    /// One-shot device position acquisition with a timeout. A fix is
    /// written into the spot store for the distance filter.
    pub async fn refresh_position(&self) -> Result<Coordinate, Error> {
        let fix = tokio::time::timeout(self.geolocation_timeout, self.geolocator.current_position())
            .await
            .map_err(|_| Error::Geolocation(GeoFailure::Timeout))??;

        info!(latitude = fix.latitude, longitude = fix.longitude, "position_acquired");
        self.spots.set_user_location(fix);
        Ok(fix)
    }

    /// Spot markers within the selected radius of the current fix.
    /// Without a fix the visibility snapshot is shown unfiltered.
    pub fn visible_markers(&self) -> Vec<SpotMarker> {
        let visible = self.spots.visible_spots();

        let Some(here) = self.spots.user_location() else {
            return visible
                .into_iter()
                .map(|spot| SpotMarker { spot, distance_km: None })
                .collect();
        };

        let radius = self.spots.selected_distance_km();
        visible
            .into_iter()
            .filter_map(|spot| {
                let d = distance_km(here, spot.coordinate);
                (d <= radius).then_some(SpotMarker { spot, distance_km: Some(d) })
            })
            .collect()
    }

    /// Snapshot of shared locations for rendering
    pub fn shared_markers(&self) -> Vec<SharedLocation> {
        self.locations.locations()
    }

    /// Record the selection and build the external navigation URL from
    /// the current fix to the spot; `None` without a fix.
    pub fn navigate_to(&self, spot: &ParkingSpot) -> Option<String> {
        self.spots.set_selected_spot(Some(spot.clone()));
        let here = self.spots.user_location()?;
        Some(format!(
            "https://www.google.com/maps/dir/{},{}/{},{}",
            here.latitude, here.longitude, spot.coordinate.latitude, spot.coordinate.longitude
        ))
    }
}
