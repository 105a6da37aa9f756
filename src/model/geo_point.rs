use std::cmp::Ordering;

use crate::error::{invalid_argument, StateResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> StateResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(invalid_argument("Latitude must be between -90 and 90 degrees."));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(invalid_argument("Longitude must be between -180 and 180 degrees."));
        }
        Ok(Self { latitude, longitude })
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Orders by latitude first, then longitude.
    pub fn compare(&self, other: &GeoPoint) -> Option<Ordering> {
        match self.latitude.partial_cmp(&other.latitude)? {
            Ordering::Equal => self.longitude.partial_cmp(&other.longitude),
            ordering => Some(ordering),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_coordinates() {
        let point = GeoPoint::new(10.0, 20.0).unwrap();
        assert_eq!(point.latitude(), 10.0);
        assert_eq!(point.longitude(), 20.0);
    }

    #[test]
    fn invalid_latitude() {
        let err = GeoPoint::new(100.0, 0.0).unwrap_err();
        assert_eq!(err.code_str(), "state/invalid-argument");
    }

    #[test]
    fn compares_latitude_before_longitude() {
        let south_east = GeoPoint::new(-10.0, 100.0).unwrap();
        let north_west = GeoPoint::new(10.0, -100.0).unwrap();
        assert_eq!(south_east.compare(&north_west), Some(Ordering::Less));

        let same_lat = GeoPoint::new(-10.0, 120.0).unwrap();
        assert_eq!(south_east.compare(&same_lat), Some(Ordering::Less));
        assert_eq!(same_lat.compare(&same_lat), Some(Ordering::Equal));
    }

    #[test]
    fn nan_is_rejected() {
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }
}
