//! Validated geographic coordinates and distance math.

use serde::{Deserialize, Serialize};

use crate::protocol::ProtocolError;

/// Mean Earth radius in kilometers (IUGG).
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic point with an optional horizontal accuracy in meters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Horizontal accuracy in meters, if the client reported one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

impl GeoPoint {
    /// Create a point without an accuracy estimate.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: None,
        }
    }

    /// Validate coordinate ranges.
    ///
    /// Latitude must be within ±90°, longitude within ±180°, and accuracy
    /// (when present) finite and non-negative. NaN fails every comparison,
    /// so non-finite values are rejected by the same checks.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(ProtocolError::OutOfRange {
                field: "latitude",
                value: self.latitude,
            });
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(ProtocolError::OutOfRange {
                field: "longitude",
                value: self.longitude,
            });
        }
        if let Some(acc) = self.accuracy {
            if !acc.is_finite() || acc < 0.0 {
                return Err(ProtocolError::OutOfRange {
                    field: "accuracy",
                    value: acc,
                });
            }
        }
        Ok(())
    }

    /// Great-circle distance to another point in kilometers (Haversine).
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Degrees of latitude spanned by `radius_km` (for bounding-box prefilters).
pub fn latitude_delta_deg(radius_km: f64) -> f64 {
    radius_km / 111.0
}

/// Degrees of longitude spanned by `radius_km` at the given latitude.
///
/// The cosine term shrinks toward the poles; it is clamped so a query at
/// extreme latitudes degrades to a wide box rather than dividing by zero.
pub fn longitude_delta_deg(radius_km: f64, at_latitude: f64) -> f64 {
    let cos = at_latitude.to_radians().cos().max(0.01);
    radius_km / (111.0 * cos)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn valid_point_passes() {
        let p = GeoPoint::new(-1.2921, 36.8219);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn latitude_out_of_range_rejected() {
        let p = GeoPoint::new(91.0, 0.0);
        assert_matches!(
            p.validate(),
            Err(ProtocolError::OutOfRange {
                field: "latitude",
                ..
            })
        );
    }

    #[test]
    fn longitude_out_of_range_rejected() {
        let p = GeoPoint::new(0.0, -180.5);
        assert_matches!(
            p.validate(),
            Err(ProtocolError::OutOfRange {
                field: "longitude",
                ..
            })
        );
    }

    #[test]
    fn nan_latitude_rejected() {
        let p = GeoPoint::new(f64::NAN, 0.0);
        assert!(p.validate().is_err());
    }

    #[test]
    fn negative_accuracy_rejected() {
        let p = GeoPoint {
            latitude: 0.0,
            longitude: 0.0,
            accuracy: Some(-1.0),
        };
        assert_matches!(
            p.validate(),
            Err(ProtocolError::OutOfRange {
                field: "accuracy",
                ..
            })
        );
    }

    #[test]
    fn boundary_coordinates_accepted() {
        assert!(GeoPoint::new(90.0, 180.0).validate().is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).validate().is_ok());
    }

    #[test]
    fn distance_to_self_is_zero() {
        let p = GeoPoint::new(-1.2921, 36.8219);
        assert!(p.distance_km(&p) < 1e-9);
    }

    #[test]
    fn distance_nairobi_to_mombasa() {
        // Nairobi CBD to Mombasa is roughly 440 km.
        let nairobi = GeoPoint::new(-1.2921, 36.8219);
        let mombasa = GeoPoint::new(-4.0435, 39.6682);
        let d = nairobi.distance_km(&mombasa);
        assert!((430.0..460.0).contains(&d), "got {d}");
    }

    #[test]
    fn distance_is_symmetric() {
        let a = GeoPoint::new(10.0, 20.0);
        let b = GeoPoint::new(-5.0, 50.0);
        assert!((a.distance_km(&b) - b.distance_km(&a)).abs() < 1e-9);
    }

    #[test]
    fn longitude_delta_grows_toward_poles() {
        let at_equator = longitude_delta_deg(10.0, 0.0);
        let at_60 = longitude_delta_deg(10.0, 60.0);
        assert!(at_60 > at_equator);
    }

    #[test]
    fn latitude_delta_roughly_one_degree_per_111km() {
        let d = latitude_delta_deg(111.0);
        assert!((d - 1.0).abs() < 1e-9);
    }

    #[test]
    fn serde_omits_missing_accuracy() {
        let p = GeoPoint::new(1.0, 2.0);
        let json = serde_json::to_value(&p).unwrap();
        assert!(json.get("accuracy").is_none());
    }
}
