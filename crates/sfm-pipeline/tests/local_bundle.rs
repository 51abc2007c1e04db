//! Windowed bundle adjustment on a synthetic chain scene.

use std::collections::HashMap;

use nalgebra::UnitQuaternion;
use sfm_core::{
    Camera, CameraId, Map, Observation, Pose, RigCamera, RigCameraId, Vec3,
};
use sfm_pipeline::{bundle_local, BundleConfig};

/// A chain of shots with self-consistent observations: every pixel is the
/// exact projection of its landmark, so the solve starts at the optimum.
fn consistent_chain(
    num_shots: usize,
    common_points: usize,
) -> (Map, HashMap<CameraId, Camera>, HashMap<RigCameraId, Pose>) {
    let mut map = Map::default();
    let camera = Camera::perspective("cam", 0.9);
    map.create_camera(camera.clone());
    map.create_rig_camera(RigCamera {
        id: "rc".to_string(),
        pose: Pose::identity(),
    });
    for i in 0..num_shots {
        map.create_rig_instance(
            format!("ri{i}"),
            Pose::from_parts(
                UnitQuaternion::identity(),
                Vec3::new(-0.3 * i as f64, 0.0, 0.0),
            ),
        );
        map.create_shot(format!("s{i}"), "cam", "rc", format!("ri{i}"))
            .unwrap();
    }
    for i in 0..num_shots - 1 {
        for j in 0..common_points {
            let id = format!("lm{i}_{j}");
            let position = Vec3::new(
                0.3 * i as f64 + 0.15,
                -0.2 + j as f64 * 0.02,
                2.0 + (j % 5) as f64 * 0.1,
            );
            map.create_landmark(&id, position);
            for shot in [format!("s{i}"), format!("s{}", i + 1)] {
                let pose = map.shot_pose(&shot).unwrap();
                let pixel = camera.project(&pose.transform(&position)).unwrap();
                map.add_observation(&shot, &id, Observation::new(pixel, 0.004))
                    .unwrap();
            }
        }
    }
    let camera_priors = HashMap::from([("cam".to_string(), camera)]);
    let rig_camera_priors = HashMap::from([("rc".to_string(), Pose::identity())]);
    (map, camera_priors, rig_camera_priors)
}

#[test]
fn windowed_bundle_refines_only_instances_and_points() {
    let (mut map, camera_priors, rig_camera_priors) = consistent_chain(4, 20);
    let config = BundleConfig {
        local_bundle_radius: 2,
        local_bundle_min_common_points: 10,
        local_bundle_max_shots: 10,
        bundle_use_gps: false,
        ..Default::default()
    };

    let camera_before = map.camera("cam").unwrap().clone();
    let rig_camera_before = map.rig_camera("rc").unwrap().pose;

    let (point_ids, report) = bundle_local(
        &mut map,
        &camera_priors,
        &rig_camera_priors,
        &[],
        &"s1".to_string(),
        &config,
    )
    .unwrap();

    // Cameras and rig cameras were fixed and stay untouched.
    assert_eq!(map.camera("cam").unwrap(), &camera_before);
    assert_eq!(map.rig_camera("rc").unwrap().pose, rig_camera_before);

    assert_eq!(report.num_interior_images, 3);
    assert_eq!(report.num_boundary_images, 1);
    assert_eq!(report.num_other_images, 0);
    assert_eq!(report.num_points, 60);
    // 100 interior observations plus 20 boundary anchors.
    assert_eq!(report.num_reprojections, 120);
    assert!(!report.brief_report.is_empty());

    // Refined points are exactly the landmarks the interior observes.
    assert_eq!(point_ids.len(), 60);
    for point_id in &point_ids {
        assert!(map.landmark(point_id).is_some());
    }

    // Diagnostics were attached during writeback.
    let landmark = map.landmark("lm0_0").unwrap();
    assert!(landmark.reprojection_errors.contains_key("s0"));
    assert!(landmark.global_position.iter().all(|v| v.is_finite()));
}

#[test]
fn windowed_bundle_keeps_positions_of_a_consistent_scene() {
    let (mut map, camera_priors, rig_camera_priors) = consistent_chain(4, 20);
    let config = BundleConfig {
        local_bundle_radius: 2,
        local_bundle_min_common_points: 10,
        local_bundle_max_shots: 10,
        bundle_use_gps: false,
        ..Default::default()
    };

    let before = map.landmark("lm1_3").unwrap().global_position;
    bundle_local(
        &mut map,
        &camera_priors,
        &rig_camera_priors,
        &[],
        &"s1".to_string(),
        &config,
    )
    .unwrap();
    let after = map.landmark("lm1_3").unwrap().global_position;

    // The scene is already optimal; the solve must not wander off.
    assert!(
        (after - before).norm() < 1e-6,
        "consistent point moved by {}",
        (after - before).norm()
    );
}
