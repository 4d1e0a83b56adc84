use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::operator::OperatorProfile;

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeoError {
    #[error("malformed coordinates {0:?}: expected \"lat,lon\"")]
    MalformedCoordinates(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl FromStr for GeoPoint {
    type Err = GeoError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let malformed = || GeoError::MalformedCoordinates(raw.to_string());

        let mut parts = raw.split(',');
        let (Some(lat), Some(lng), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };

        let lat: f64 = lat.trim().parse().map_err(|_| malformed())?;
        let lng: f64 = lng.trim().parse().map_err(|_| malformed())?;

        if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
            return Err(malformed());
        }

        Ok(GeoPoint { lat, lng })
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

/// Returns the candidates that offer `service` and whose service radius
/// covers the order location (inclusive). Candidates without coordinates or
/// radius are ignored; candidates with unparsable coordinates are skipped
/// with a warning. Result order carries no meaning.
pub fn find_eligible<'a>(
    order_coordinates: &str,
    service: &str,
    candidates: &'a [OperatorProfile],
) -> Result<Vec<&'a OperatorProfile>, GeoError> {
    let origin: GeoPoint = order_coordinates.parse()?;

    let eligible = candidates
        .iter()
        .filter(|profile| profile.offers(service))
        .filter(|profile| {
            let (Some(raw), Some(radius_km)) = (profile.coordinates.as_deref(), profile.radius_km)
            else {
                return false;
            };

            match raw.parse::<GeoPoint>() {
                Ok(location) => haversine_km(&origin, &location) <= radius_km,
                Err(err) => {
                    warn!(operator_id = %profile.id, error = %err, "skipping operator");
                    false
                }
            }
        })
        .collect();

    Ok(eligible)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use uuid::Uuid;

    use super::{find_eligible, haversine_km, GeoError, GeoPoint};
    use crate::models::operator::OperatorProfile;

    const WARSAW: &str = "52.2297,21.0122";

    fn operator(coordinates: Option<&str>, radius_km: Option<f64>, services: &[&str]) -> OperatorProfile {
        OperatorProfile {
            id: Uuid::new_v4(),
            name: "op".to_string(),
            email: "op@example.com".to_string(),
            coordinates: coordinates.map(str::to_string),
            radius_km,
            services: services.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: 53.5511,
            lng: 9.9937,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london: GeoPoint = "51.5074,-0.1278".parse().unwrap();
        let paris: GeoPoint = "48.8566, 2.3522".parse().unwrap();
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn parses_with_whitespace_and_rejects_garbage() {
        let point: GeoPoint = " 52.22 , 21.01 ".parse().unwrap();
        assert_eq!(point.lat, 52.22);
        assert_eq!(point.lng, 21.01);

        for raw in ["", "52.22", "52.22,21.01,3", "north,east", "95.0,10.0", "NaN,1"] {
            assert!(raw.parse::<GeoPoint>().is_err(), "{raw:?} should not parse");
        }
    }

    #[test]
    fn operator_within_radius_and_category_is_eligible() {
        let nearby = operator(Some("52.2200,21.0100"), Some(20.0), &["mapping"]);
        let candidates = vec![nearby.clone()];

        let eligible = find_eligible(WARSAW, "mapping", &candidates).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, nearby.id);
    }

    #[test]
    fn operator_outside_radius_is_not_eligible() {
        // The two points are roughly 1.09 km apart.
        let candidates = vec![operator(Some("52.2200,21.0100"), Some(1.0), &["mapping"])];
        assert!(find_eligible(WARSAW, "mapping", &candidates).unwrap().is_empty());
    }

    #[test]
    fn radius_comparison_is_inclusive() {
        let origin: GeoPoint = WARSAW.parse().unwrap();
        let location: GeoPoint = "52.2200,21.0100".parse().unwrap();
        let exact = haversine_km(&origin, &location);

        let candidates = vec![operator(Some("52.2200,21.0100"), Some(exact), &["mapping"])];
        assert_eq!(find_eligible(WARSAW, "mapping", &candidates).unwrap().len(), 1);
    }

    #[test]
    fn category_must_match_exactly() {
        let candidates = vec![operator(Some("52.2200,21.0100"), Some(20.0), &["inspection"])];
        assert!(find_eligible(WARSAW, "mapping", &candidates).unwrap().is_empty());
    }

    #[test]
    fn profiles_missing_location_or_radius_do_not_participate() {
        let candidates = vec![
            operator(None, Some(500.0), &["mapping"]),
            operator(Some("52.2200,21.0100"), None, &["mapping"]),
        ];
        assert!(find_eligible(WARSAW, "mapping", &candidates).unwrap().is_empty());
    }

    #[test]
    fn malformed_operator_is_skipped_not_fatal() {
        let good = operator(Some("52.2200,21.0100"), Some(20.0), &["mapping"]);
        let candidates = vec![operator(Some("somewhere"), Some(20.0), &["mapping"]), good.clone()];

        let eligible = find_eligible(WARSAW, "mapping", &candidates).unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].id, good.id);
    }

    #[test]
    fn malformed_order_coordinates_signal_an_error() {
        let candidates = vec![operator(Some("52.2200,21.0100"), Some(20.0), &["mapping"])];
        let err = find_eligible("52.2297;21.0122", "mapping", &candidates).unwrap_err();
        assert!(matches!(err, GeoError::MalformedCoordinates(_)));
    }
}
