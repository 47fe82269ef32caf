use assert_matches::assert_matches;

use routing_cell::services::planner::{eta_seconds, haversine_km};
use routing_cell::{GeoPoint, RoutePlanner, RoutingError, SpeedProfile};

// Mexico City landmarks used as fixed fixtures.
const ZOCALO: GeoPoint = GeoPoint {
    lat: 19.4326,
    lng: -99.1332,
};
const HOSPITAL_ABC: GeoPoint = GeoPoint {
    lat: 19.3985,
    lng: -99.2033,
};

#[test]
fn test_haversine_matches_known_distance() {
    // Zocalo to Hospital ABC Observatorio is roughly 8.3 km great-circle.
    let distance = haversine_km(ZOCALO, HOSPITAL_ABC);
    assert!(
        (distance - 8.3).abs() < 0.3,
        "Expected ~8.3 km, got {:.3}",
        distance
    );
}

#[test]
fn test_haversine_is_zero_for_identical_points() {
    assert!(haversine_km(ZOCALO, ZOCALO) < 1e-9);
}

#[test]
fn test_haversine_is_symmetric() {
    let ab = haversine_km(ZOCALO, HOSPITAL_ABC);
    let ba = haversine_km(HOSPITAL_ABC, ZOCALO);
    assert!((ab - ba).abs() < 1e-9, "Distance should not depend on direction");
}

#[test]
fn test_eta_scales_with_speed() {
    assert_eq!(eta_seconds(40.0, 40.0), 3600);
    assert_eq!(eta_seconds(40.0, 80.0), 1800);
    assert_eq!(eta_seconds(0.0, 40.0), 0);
}

#[test]
fn test_plan_route_starts_and_ends_at_requested_points() {
    let planner = RoutePlanner::new(SpeedProfile::default()).unwrap();
    let plan = planner.plan_route(ZOCALO, HOSPITAL_ABC, false).unwrap();

    let first = plan.waypoints.first().expect("route should have waypoints");
    let last = plan.waypoints.last().expect("route should have waypoints");

    assert_eq!(*first, ZOCALO, "Route must start at the origin");
    assert_eq!(*last, HOSPITAL_ABC, "Route must end at the destination");
    assert!(plan.waypoints.len() >= 2, "Route needs at least both endpoints");
    assert!(plan.waypoints.len() <= 128, "Waypoint count must stay capped");
}

#[test]
fn test_plan_route_waypoints_are_monotonic_along_segment() {
    let planner = RoutePlanner::new(SpeedProfile::default()).unwrap();
    let plan = planner.plan_route(ZOCALO, HOSPITAL_ABC, true).unwrap();

    // Latitude decreases monotonically from Zocalo towards the hospital.
    for pair in plan.waypoints.windows(2) {
        assert!(
            pair[1].lat <= pair[0].lat + 1e-12,
            "Waypoints should progress towards the destination"
        );
    }
}

#[test]
fn test_emergency_eta_never_exceeds_urban_eta() {
    let planner = RoutePlanner::new(SpeedProfile::default()).unwrap();
    let urban = planner.plan_route(ZOCALO, HOSPITAL_ABC, false).unwrap();
    let emergency = planner.plan_route(ZOCALO, HOSPITAL_ABC, true).unwrap();

    assert!(
        emergency.eta_seconds <= urban.eta_seconds,
        "Emergency profile must not be slower than urban"
    );
    assert!(
        (emergency.distance_km - urban.distance_km).abs() < 1e-9,
        "Distance does not depend on the profile"
    );
}

#[test]
fn test_plan_route_rejects_out_of_range_coordinates() {
    let planner = RoutePlanner::new(SpeedProfile::default()).unwrap();
    let bad = GeoPoint::new(91.0, -99.1);

    let result = planner.plan_route(bad, ZOCALO, false);
    assert_matches!(result, Err(RoutingError::InvalidCoordinates { .. }));

    let result = planner.plan_route(ZOCALO, GeoPoint::new(19.4, 181.0), false);
    assert_matches!(result, Err(RoutingError::InvalidCoordinates { .. }));
}

#[test]
fn test_planner_rejects_non_positive_speeds() {
    let profile = SpeedProfile {
        urban_kmh: 0.0,
        emergency_kmh: 80.0,
    };
    assert_matches!(RoutePlanner::new(profile), Err(RoutingError::InvalidSpeed(_)));
}

#[test]
fn test_long_route_respects_waypoint_cap() {
    let planner = RoutePlanner::new(SpeedProfile::default()).unwrap();
    // Mexico City to Guadalajara, ~460 km: far more than 128 spacing steps.
    let guadalajara = GeoPoint::new(20.6597, -103.3496);
    let plan = planner.plan_route(ZOCALO, guadalajara, true).unwrap();

    assert!(plan.waypoints.len() <= 128, "Cap must hold on long routes");
    assert_eq!(*plan.waypoints.last().unwrap(), guadalajara);
}
