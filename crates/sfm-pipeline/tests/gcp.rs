//! Ground-control-point triangulation and constraint assembly.

use nalgebra::UnitQuaternion;
use sfm_core::{
    Camera, GcpObservation, GroundControlPoint, Map, Pose, RigCamera, Vec3,
};
use sfm_optim::BundleAdjuster;
use sfm_pipeline::{add_gcp_to_bundle, detect_alignment_constraints, triangulate_gcp, BundleConfig};

/// Two shots with a 0.5 m baseline along x, both looking down +z.
fn stereo_scene() -> Map {
    let mut map = Map::default();
    map.create_camera(Camera::perspective("cam", 0.9));
    map.create_rig_camera(RigCamera {
        id: "rc".to_string(),
        pose: Pose::identity(),
    });
    map.create_rig_instance("ri0", Pose::identity());
    map.create_rig_instance(
        "ri1",
        Pose::from_parts(UnitQuaternion::identity(), Vec3::new(-0.5, 0.0, 0.0)),
    );
    map.create_shot("s0", "cam", "rc", "ri0").unwrap();
    map.create_shot("s1", "cam", "rc", "ri1").unwrap();
    map
}

fn observe(map: &Map, shot_id: &str, point: &Vec3) -> GcpObservation {
    let pose = map.shot_pose(shot_id).unwrap();
    let camera = map.camera("cam").unwrap();
    GcpObservation {
        shot_id: shot_id.to_string(),
        projection: camera.project(&pose.transform(point)).unwrap(),
    }
}

#[test]
fn converging_observations_triangulate() {
    let map = stereo_scene();
    let target = Vec3::new(0.1, -0.05, 2.0);
    let mut gcp = GroundControlPoint::new("g1");
    gcp.observations = vec![observe(&map, "s0", &target), observe(&map, "s1", &target)];

    let result = triangulate_gcp(&map, &gcp).unwrap();
    assert!((result - target).norm() < 1e-6, "triangulated {result}");
}

#[test]
fn fewer_than_two_valid_observations_fail() {
    let map = stereo_scene();
    let target = Vec3::new(0.1, -0.05, 2.0);
    let mut gcp = GroundControlPoint::new("g1");
    gcp.observations = vec![
        observe(&map, "s0", &target),
        GcpObservation {
            shot_id: "ghost".to_string(),
            projection: sfm_core::Vec2::zeros(),
        },
    ];
    assert!(triangulate_gcp(&map, &gcp).is_none());
}

#[test]
fn near_parallel_rays_fail() {
    // Both shots at the same pose: identical bearings, zero divergence.
    let mut map = Map::default();
    map.create_camera(Camera::perspective("cam", 0.9));
    map.create_rig_camera(RigCamera {
        id: "rc".to_string(),
        pose: Pose::identity(),
    });
    map.create_rig_instance("ri0", Pose::identity());
    map.create_rig_instance("ri1", Pose::identity());
    map.create_shot("s0", "cam", "rc", "ri0").unwrap();
    map.create_shot("s1", "cam", "rc", "ri1").unwrap();

    let target = Vec3::new(0.1, -0.05, 2.0);
    let mut gcp = GroundControlPoint::new("g1");
    gcp.observations = vec![observe(&map, "s0", &target), observe(&map, "s1", &target)];
    assert!(triangulate_gcp(&map, &gcp).is_none());
}

#[test]
fn observations_on_absent_shots_add_no_terms() {
    let map = stereo_scene();
    let target = Vec3::new(0.1, -0.05, 2.0);
    let mut gcp = GroundControlPoint::new("g1");
    gcp.observations = vec![
        observe(&map, "s0", &target),
        observe(&map, "s1", &target),
        GcpObservation {
            shot_id: "ghost".to_string(),
            projection: sfm_core::Vec2::zeros(),
        },
    ];

    let mut adjuster = BundleAdjuster::new();
    let config = BundleConfig::default();
    let added = add_gcp_to_bundle(&mut adjuster, &map, &[gcp], &config);
    assert_eq!(added, 2);
    assert_eq!(adjuster.num_projection_terms(), 2);
}

#[test]
fn point_without_coordinates_is_skipped_silently() {
    let map = stereo_scene();
    let mut gcp = GroundControlPoint::new("g1");
    // One observation: no triangulation, and no geodetic fallback.
    gcp.observations = vec![observe(&map, "s0", &Vec3::new(0.1, 0.0, 2.0))];

    let mut adjuster = BundleAdjuster::new();
    let config = BundleConfig::default();
    let added = add_gcp_to_bundle(&mut adjuster, &map, &[gcp], &config);
    assert_eq!(added, 0);
    assert_eq!(adjuster.num_projection_terms(), 0);
}

#[test]
fn alignment_detection_without_data_returns_orientation_prior() {
    use sfm_pipeline::AlignMethod;

    let map = stereo_scene();
    let config = BundleConfig {
        bundle_use_gps: true,
        bundle_use_gcp: true,
        ..Default::default()
    };
    // No GPS measurements and no usable GCPs: fewer than 3 correspondences.
    assert_eq!(
        detect_alignment_constraints(&map, &config, &[]),
        AlignMethod::OrientationPrior
    );
}
