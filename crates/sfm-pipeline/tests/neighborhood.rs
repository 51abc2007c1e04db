//! Neighborhood selection on synthetic observation graphs.

use std::collections::HashSet;

use sfm_core::{Camera, Map, Observation, Pose, RigCamera, Vec2};
use sfm_pipeline::shot_neighborhood;

/// A chain of shots, one rig instance each; consecutive shots share
/// `common_points` landmarks, non-consecutive shots share none.
fn chain_scene(num_shots: usize, common_points: usize) -> Map {
    let mut map = Map::default();
    map.create_camera(Camera::perspective("cam", 0.9));
    map.create_rig_camera(RigCamera {
        id: "rc".to_string(),
        pose: Pose::identity(),
    });
    for i in 0..num_shots {
        map.create_rig_instance(format!("ri{i}"), Pose::identity());
        map.create_shot(format!("s{i}"), "cam", "rc", format!("ri{i}"))
            .unwrap();
    }
    for i in 0..num_shots - 1 {
        for j in 0..common_points {
            let id = format!("lm{i}_{j}");
            map.create_landmark(&id, sfm_core::Vec3::new(i as f64, j as f64 * 0.01, 2.0));
            for shot in [format!("s{i}"), format!("s{}", i + 1)] {
                map.add_observation(&shot, &id, Observation::new(Vec2::zeros(), 0.004))
                    .unwrap();
            }
        }
    }
    map
}

fn ids(names: &[&str]) -> HashSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[test]
fn chain_neighborhood_matches_expected_layers() {
    let map = chain_scene(5, 20);
    let (interior, boundary) = shot_neighborhood(&map, &"s2".to_string(), 2, 10, 10);

    assert_eq!(interior, ids(&["s1", "s2", "s3"]));
    assert_eq!(boundary, ids(&["s0", "s4"]));
}

#[test]
fn radius_one_returns_exactly_the_rig_group() {
    let map = chain_scene(5, 20);
    let (interior, _) = shot_neighborhood(&map, &"s2".to_string(), 1, usize::MAX, 10);
    assert_eq!(interior, ids(&["s2"]));
}

#[test]
fn interior_and_boundary_are_disjoint_and_connected() {
    let map = chain_scene(5, 20);
    let (interior, boundary) = shot_neighborhood(&map, &"s2".to_string(), 2, 10, 10);

    assert!(interior.is_disjoint(&boundary));
    for shot_id in &boundary {
        let shot = map.shot(shot_id).unwrap();
        let connected = shot
            .landmark_observations()
            .keys()
            .any(|landmark_id| {
                map.landmark(landmark_id)
                    .unwrap()
                    .observing_shots()
                    .any(|observer| interior.contains(observer))
            });
        assert!(connected, "boundary shot {shot_id} shares no landmark with the interior");
    }
}

#[test]
fn larger_interior_cap_never_shrinks_the_interior() {
    let map = chain_scene(5, 20);
    let (small, _) = shot_neighborhood(&map, &"s2".to_string(), 3, 10, 3);
    let (large, _) = shot_neighborhood(&map, &"s2".to_string(), 3, 10, 10);
    assert!(small.is_subset(&large));
}

#[test]
fn admitted_neighbors_pull_in_their_whole_rig_group() {
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
    map.create_shot("s2", "cam", "rc", "ri1").unwrap();

    // s0 and s1 share points; s2 only rides along through its rig.
    for j in 0..5 {
        let id = format!("lm{j}");
        map.create_landmark(&id, sfm_core::Vec3::new(0.0, j as f64 * 0.01, 2.0));
        for shot in ["s0", "s1"] {
            map.add_observation(&shot.to_string(), &id, Observation::new(Vec2::zeros(), 0.004))
                .unwrap();
        }
    }

    let (interior, _) = shot_neighborhood(&map, &"s0".to_string(), 2, 1, 10);
    assert!(interior.contains("s2"), "co-rig member should be pulled in");
}
