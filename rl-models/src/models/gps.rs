//! GPS position models.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both axes differ by less than `epsilon` degrees.
    pub fn within(&self, other: &Coordinate, epsilon: f64) -> bool {
        (self.latitude - other.latitude).abs() < epsilon
            && (self.longitude - other.longitude).abs() < epsilon
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Position report received from the other party of a ride.
///
/// Covers `driver_gps`, `passenger_gps` and `driver_location_update`
/// frames, which use slightly different field names for the sender and the
/// coordinates. A frame may carry several spellings at once; `userId` wins
/// over `driverId` over `passengerId`, and the long coordinate names win
/// over `lat`/`lng`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawGpsUpdate")]
pub struct GpsUpdate {
    pub user_id: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: Option<i64>,
    pub ride_id: Option<String>,
}

/// Wire shape with every accepted spelling kept apart.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGpsUpdate {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    driver_id: Option<String>,
    #[serde(default)]
    passenger_id: Option<String>,
    #[serde(default)]
    latitude: Option<f64>,
    #[serde(default)]
    longitude: Option<f64>,
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lng: Option<f64>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    ride_id: Option<String>,
}

impl TryFrom<RawGpsUpdate> for GpsUpdate {
    type Error = String;

    fn try_from(raw: RawGpsUpdate) -> Result<Self, Self::Error> {
        let latitude = raw.latitude.or(raw.lat).ok_or("missing latitude")?;
        let longitude = raw.longitude.or(raw.lng).ok_or("missing longitude")?;
        Ok(Self {
            user_id: raw.user_id.or(raw.driver_id).or(raw.passenger_id),
            latitude,
            longitude,
            timestamp: raw.timestamp,
            ride_id: raw.ride_id,
        })
    }
}

impl GpsUpdate {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_epsilon() {
        let a = Coordinate::new(6.5244, 3.3792);
        let b = Coordinate::new(6.524405, 3.379195);
        assert!(a.within(&b, 0.00001));
        let c = Coordinate::new(6.5246, 3.3792);
        assert!(!a.within(&c, 0.00001));
    }

    #[test]
    fn test_validity() {
        assert!(Coordinate::new(0.0, 0.0).is_valid());
        assert!(!Coordinate::new(91.0, 0.0).is_valid());
        assert!(!Coordinate::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_frame_with_every_spelling_parses() {
        let update: GpsUpdate = serde_json::from_value(serde_json::json!({
            "type": "driver_location_update",
            "userId": "d-4",
            "driverId": "d-9",
            "latitude": 1.5,
            "lat": 9.0,
            "longitude": 2.5,
            "lng": 9.0,
        }))
        .unwrap();
        assert_eq!(update.user_id.as_deref(), Some("d-4"));
        assert_eq!(update.coordinate(), Coordinate::new(1.5, 2.5));
    }

    #[test]
    fn test_missing_coordinates_rejected() {
        let result = serde_json::from_value::<GpsUpdate>(serde_json::json!({
            "type": "driver_gps",
            "driverId": "d-4",
            "lat": 1.5,
        }));
        assert!(result.unwrap_err().to_string().contains("missing longitude"));
    }

    #[test]
    fn test_location_update_aliases() {
        let update: GpsUpdate = serde_json::from_value(serde_json::json!({
            "type": "driver_location_update",
            "driverId": "d-4",
            "lat": 1.5,
            "lng": 2.5,
        }))
        .unwrap();
        assert_eq!(update.user_id.as_deref(), Some("d-4"));
        assert_eq!(update.coordinate(), Coordinate::new(1.5, 2.5));
        assert_eq!(update.timestamp, None);
    }
}
