//! Bounded neighborhood selection on the shot/landmark observation graph.

use std::collections::{HashMap, HashSet};

use log::debug;
use sfm_core::{LandmarkId, Map, ShotId};

/// Effectively unbounded cap used for the boundary pass.
const MAX_BOUNDARY_SIZE: usize = 1_000_000;

/// Reconstructed shots near a given shot.
///
/// Returns `(interior, boundary)`:
/// - interior: shots at graph distance smaller than `radius`,
/// - boundary: shots sharing at least one landmark with the interior.
///
/// The central shot is at distance 0, together with its whole rig-instance
/// group. Shots at distance n + 1 share at least `min_common_points`
/// landmarks with shots at distance n. Expansion stops early once the
/// interior reaches `max_interior_size`.
pub fn shot_neighborhood(
    map: &Map,
    central_shot_id: &ShotId,
    radius: usize,
    min_common_points: usize,
    max_interior_size: usize,
) -> (HashSet<ShotId>, HashSet<ShotId>) {
    let mut interior: HashSet<ShotId> = HashSet::new();
    interior.insert(central_shot_id.clone());
    if let Some(shot) = map.shot(central_shot_id) {
        if let Some(instance) = map.rig_instance(&shot.rig_instance_id) {
            interior.extend(instance.shot_ids().cloned());
        }
    }

    let mut distance = 1;
    while distance < radius && interior.len() < max_interior_size {
        let remaining = max_interior_size - interior.len();
        let neighbors = direct_shot_neighbors(map, &interior, min_common_points, remaining);
        interior.extend(neighbors);
        distance += 1;
    }

    let boundary = direct_shot_neighbors(map, &interior, 1, MAX_BOUNDARY_SIZE);
    debug!(
        "neighborhood of {central_shot_id}: {} interior, {} boundary",
        interior.len(),
        boundary.len()
    );
    (interior, boundary)
}

/// Shots outside `shots` sharing landmarks with it, best-connected first.
///
/// Outside shots are ranked by how many of their observations fall on
/// landmarks seen from `shots`. The ranked list is walked until a shot
/// falls below `min_common_points` or `max_neighbors` entries have been
/// consumed; every admitted shot pulls in its whole rig-instance group, so
/// the result may exceed `max_neighbors`.
pub fn direct_shot_neighbors(
    map: &Map,
    shots: &HashSet<ShotId>,
    min_common_points: usize,
    max_neighbors: usize,
) -> HashSet<ShotId> {
    let mut points: HashSet<&LandmarkId> = HashSet::new();
    for shot_id in shots {
        if let Some(shot) = map.shot(shot_id) {
            points.extend(shot.landmark_observations().keys());
        }
    }

    let mut common_points: HashMap<&ShotId, usize> = HashMap::new();
    for landmark_id in points {
        if let Some(landmark) = map.landmark(landmark_id) {
            for shot_id in landmark.observing_shots() {
                if !shots.contains(shot_id) {
                    *common_points.entry(shot_id).or_default() += 1;
                }
            }
        }
    }

    let mut pairs: Vec<(&ShotId, usize)> = common_points.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1));

    let max_n = max_neighbors.min(pairs.len());
    let mut neighbors = HashSet::new();
    for (idx, (shot_id, count)) in pairs.into_iter().enumerate() {
        if count < min_common_points || idx >= max_n {
            break;
        }
        if let Some(shot) = map.shot(shot_id) {
            if let Some(instance) = map.rig_instance(&shot.rig_instance_id) {
                // Whole rig groups come along, minus anything already in
                // the query set, keeping the result disjoint from it.
                neighbors.extend(
                    instance
                        .shot_ids()
                        .filter(|member| !shots.contains(*member))
                        .cloned(),
                );
            }
        }
    }
    neighbors
}
