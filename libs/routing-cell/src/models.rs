use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn in_range(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// A simulated route between two points: interpolated waypoints along the
/// straight-line segment, total distance, and the estimated travel time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePlan {
    pub waypoints: Vec<GeoPoint>,
    pub distance_km: f64,
    pub eta_seconds: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SpeedProfile {
    pub urban_kmh: f64,
    pub emergency_kmh: f64,
}

impl SpeedProfile {
    pub fn speed_for(&self, emergency: bool) -> f64 {
        if emergency {
            self.emergency_kmh
        } else {
            self.urban_kmh
        }
    }
}

impl Default for SpeedProfile {
    fn default() -> Self {
        Self {
            urban_kmh: 40.0,
            emergency_kmh: 80.0,
        }
    }
}
