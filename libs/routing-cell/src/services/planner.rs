use tracing::debug;

use crate::{GeoPoint, RoutePlan, RoutingError, SpeedProfile};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Spacing between interpolated waypoints, in kilometers.
const WAYPOINT_SPACING_KM: f64 = 0.5;

/// Upper bound on interpolated waypoints for a single plan.
const MAX_WAYPOINTS: usize = 128;

/// Computes simulated routes and arrival estimates for dispatch orders.
///
/// Routes are straight-line segments sampled at a fixed spacing; travel time
/// comes from the configured speed profile. This is a simulation for the
/// dispatch screens, not road routing.
#[derive(Debug, Clone)]
pub struct RoutePlanner {
    profile: SpeedProfile,
}

impl RoutePlanner {
    pub fn new(profile: SpeedProfile) -> Result<Self, RoutingError> {
        if profile.urban_kmh <= 0.0 || profile.emergency_kmh <= 0.0 {
            return Err(RoutingError::InvalidSpeed(format!(
                "speeds must be positive, got urban {} / emergency {}",
                profile.urban_kmh, profile.emergency_kmh
            )));
        }
        Ok(Self { profile })
    }

    pub fn plan_route(
        &self,
        from: GeoPoint,
        to: GeoPoint,
        emergency: bool,
    ) -> Result<RoutePlan, RoutingError> {
        for point in [from, to] {
            if !point.in_range() {
                return Err(RoutingError::InvalidCoordinates {
                    lat: point.lat,
                    lng: point.lng,
                });
            }
        }

        let distance_km = haversine_km(from, to);
        let speed_kmh = self.profile.speed_for(emergency);
        let eta_seconds = eta_seconds(distance_km, speed_kmh);
        let waypoints = interpolate(from, to, distance_km);

        debug!(
            "Planned route: {:.2} km, {} waypoints, eta {}s (emergency: {})",
            distance_km,
            waypoints.len(),
            eta_seconds,
            emergency
        );

        Ok(RoutePlan {
            waypoints,
            distance_km,
            eta_seconds,
        })
    }

    pub fn profile(&self) -> SpeedProfile {
        self.profile
    }
}

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

pub fn eta_seconds(distance_km: f64, speed_kmh: f64) -> u64 {
    (distance_km / speed_kmh * 3600.0).round() as u64
}

fn interpolate(from: GeoPoint, to: GeoPoint, distance_km: f64) -> Vec<GeoPoint> {
    let segments = ((distance_km / WAYPOINT_SPACING_KM).ceil() as usize)
        .clamp(1, MAX_WAYPOINTS - 1);

    let mut waypoints = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let t = i as f64 / segments as f64;
        waypoints.push(GeoPoint::new(
            from.lat + (to.lat - from.lat) * t,
            from.lng + (to.lng - from.lng) * t,
        ));
    }
    waypoints
}
