//! Station proximity ranking.

use haversine::{Location, Units, distance};

use crate::model::Station;

/// Latitude/longitude in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<&Station> for GeoPoint {
    fn from(station: &Station) -> Self {
        Self::new(station.latitude, station.longitude)
    }
}

/// A station together with its distance from the reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedStation {
    pub station: Station,
    pub distance_km: f64,
}

/// Great-circle distance in kilometres (Earth radius 6371 km).
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    distance(
        Location {
            latitude: a.latitude,
            longitude: a.longitude,
        },
        Location {
            latitude: b.latitude,
            longitude: b.longitude,
        },
        Units::Kilometers,
    )
}

/// Rank stations by distance from `reference`, nearest first.
///
/// The sort is stable, so equidistant stations keep their input order.
pub fn rank_stations(reference: GeoPoint, stations: &[Station]) -> Vec<RankedStation> {
    let mut ranked: Vec<RankedStation> = stations
        .iter()
        .map(|station| RankedStation {
            distance_km: haversine_km(reference, GeoPoint::from(station)),
            station: station.clone(),
        })
        .collect();

    ranked.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));
    ranked
}
