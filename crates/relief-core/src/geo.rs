/// Geo ranker: great-circle distance and a linear travel-time estimate.
///
/// `eta_minutes` assumes straight-line travel at a constant configured speed.
/// It ignores roads, terrain, and traffic and is only a rough ordering aid.
use tracing::debug;

use crate::error::CoreError;
use crate::model::{Coordinate, RankedResult, ResourceRecord};

/// Mean Earth radius used for the spherical model.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub const DEFAULT_ASSUMED_SPEED_KMH: f64 = 40.0;

/// Haversine distance in kilometres.
pub fn haversine_km(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_KM * c
}

/// Reject references outside [-90, 90] x [-180, 180] or non-finite.
///
/// Unlike dataset rows, (0, 0) is an acceptable reference point.
pub fn validate_reference(latitude: f64, longitude: f64) -> Result<Coordinate, CoreError> {
    let reference = Coordinate::new(latitude, longitude);
    if reference.in_bounds() {
        Ok(reference)
    } else {
        Err(CoreError::InvalidReferenceLocation {
            latitude,
            longitude,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct GeoRanker {
    assumed_speed_kmh: f64,
}

impl GeoRanker {
    pub fn new(assumed_speed_kmh: f64) -> Self {
        Self { assumed_speed_kmh }
    }

    pub fn assumed_speed_kmh(&self) -> f64 {
        self.assumed_speed_kmh
    }

    pub fn eta_minutes(&self, distance_km: f64) -> f64 {
        distance_km / self.assumed_speed_kmh * 60.0
    }

    /// Rank `records` by ascending distance from `reference`.
    ///
    /// The sort is stable, so records at equal distance keep their input order.
    pub fn rank<'a, I>(&self, reference: Coordinate, records: I) -> Result<Vec<RankedResult<'a>>, CoreError>
    where
        I: IntoIterator<Item = &'a ResourceRecord>,
    {
        let reference = validate_reference(reference.latitude, reference.longitude)?;

        let mut ranked: Vec<RankedResult<'a>> = records
            .into_iter()
            .map(|record| {
                let distance_km = haversine_km(reference, record.coordinate());
                RankedResult {
                    record,
                    distance_km,
                    eta_minutes: self.eta_minutes(distance_km),
                }
            })
            .collect();
        ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        debug!(
            results = ranked.len(),
            latitude = reference.latitude,
            longitude = reference.longitude,
            "resources ranked"
        );
        Ok(ranked)
    }
}

impl Default for GeoRanker {
    fn default() -> Self {
        Self::new(DEFAULT_ASSUMED_SPEED_KMH)
    }
}
