//! Global and pose-only bundle adjustment on synthetic scenes.

use std::collections::{HashMap, HashSet};

use nalgebra::UnitQuaternion;
use sfm_core::{
    Camera, CameraId, Map, Observation, Pose, RigCamera, RigCameraId, ShotMeasurements, Vec3,
};
use sfm_pipeline::{bundle, bundle_shot_poses, AlignMethod, BundleConfig, OrientationPrior};

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

fn with_gps(map: &mut Map) {
    let shot_ids: Vec<_> = map.shots().keys().cloned().collect();
    for shot_id in shot_ids {
        let origin = map.shot_pose(&shot_id).unwrap().origin();
        map.set_shot_measurements(
            &shot_id,
            ShotMeasurements {
                gps_position: Some(origin),
                gps_accuracy: Some(5.0),
            },
        )
        .unwrap();
    }
}

#[test]
fn global_bundle_writes_back_finite_entities() {
    let (mut map, camera_priors, rig_camera_priors) = consistent_chain(4, 20);
    with_gps(&mut map);
    let config = BundleConfig {
        align_method: AlignMethod::OrientationPrior,
        align_orientation_prior: OrientationPrior::Horizontal,
        optimize_camera_parameters: false,
        bundle_use_gps: true,
        bundle_max_iterations: 5,
        ..Default::default()
    };

    let camera_before = map.camera("cam").unwrap().clone();
    let report = bundle(&mut map, &camera_priors, &rig_camera_priors, &[], &config).unwrap();

    assert_eq!(report.num_images, 4);
    assert_eq!(report.num_points, 60);
    assert_eq!(report.num_reprojections, 120);
    assert!(!report.brief_report.is_empty());
    assert!(report.wall_times.run >= 0.0);

    // Cameras were fixed, so intrinsics stay as provided.
    assert_eq!(map.camera("cam").unwrap(), &camera_before);

    for instance in map.rig_instances().values() {
        assert!(instance.pose.is_finite());
    }
    for landmark in map.landmarks().values() {
        assert!(landmark.global_position.iter().all(|v| v.is_finite()));
    }
}

#[test]
fn non_positive_gps_accuracy_is_fatal() {
    let (mut map, camera_priors, rig_camera_priors) = consistent_chain(3, 20);
    with_gps(&mut map);
    map.set_shot_measurements(
        &"s0".to_string(),
        ShotMeasurements {
            gps_position: Some(Vec3::zeros()),
            gps_accuracy: Some(0.0),
        },
    )
    .unwrap();

    let config = BundleConfig {
        align_method: AlignMethod::OrientationPrior,
        bundle_use_gps: true,
        ..Default::default()
    };
    let err = bundle(&mut map, &camera_priors, &rig_camera_priors, &[], &config).unwrap_err();
    assert!(err.to_string().contains("s0"), "error names the shot: {err}");
}

#[test]
fn pose_only_bundle_touches_nothing_but_targeted_rigs() {
    let (mut map, camera_priors, rig_camera_priors) = consistent_chain(4, 20);
    let config = BundleConfig {
        bundle_use_gps: false,
        ..Default::default()
    };

    let instance_before = map.rig_instance("ri1").unwrap().pose;
    let landmark_before = map.landmark("lm0_0").unwrap().global_position;

    let targets: HashSet<_> = ["s1".to_string()].into();
    let report = bundle_shot_poses(&mut map, &targets, &camera_priors, &rig_camera_priors, &config)
        .unwrap();

    assert_eq!(report.num_images, 1);
    assert_eq!(report.num_points, 40);
    assert_eq!(report.num_reprojections, 40);

    // The targeted shot's rig is frozen by the containment rule and the
    // map is otherwise fixed, so nothing moves.
    assert_eq!(map.rig_instance("ri1").unwrap().pose, instance_before);
    assert_eq!(map.landmark("lm0_0").unwrap().global_position, landmark_before);
}
