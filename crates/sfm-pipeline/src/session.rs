//! Shared bundle session assembly.
//!
//! The three orchestration modes differ mostly in their fixed/free policy;
//! the pieces they share live here so the policies stay explicit at each
//! call site instead of being re-derived in three slightly different loops.

use std::collections::{HashMap, HashSet};

use anyhow::{bail, Result};
use sfm_core::{Map, RigInstanceId, ShotId, Vec3};
use sfm_optim::BundleAdjuster;

/// Rig-instance fixing rule applied while adding instances.
///
/// The windowed and pose-only conventions are mechanically similar but
/// semantically inverse; they are kept as distinct variants so call sites
/// name the convention they mean and the two cannot silently drift apart.
#[derive(Debug, Clone, Copy)]
pub enum InstanceFixRule<'a> {
    /// Every instance stays free (global bundle).
    Never,
    /// Fixed when ANY member shot lies in the boundary set: boundary
    /// members anchor unrefined geometry, so their rig must not move
    /// (windowed bundle).
    AnyMemberIn(&'a HashSet<ShotId>),
    /// Fixed when the instance CONTAINS a targeted shot: targeted shots are
    /// being re-localized, so their rig must not move through other free
    /// members (pose-only bundle).
    ContainsTarget(&'a HashSet<ShotId>),
}

impl InstanceFixRule<'_> {
    /// Whether this member shot triggers fixing of its whole instance.
    ///
    /// Shots that trigger fixing never contribute to GPS averaging either.
    fn triggered_by(&self, shot_id: &ShotId) -> bool {
        match self {
            InstanceFixRule::Never => false,
            InstanceFixRule::AnyMemberIn(set) | InstanceFixRule::ContainsTarget(set) => {
                set.contains(shot_id)
            }
        }
    }
}

/// Policy applied by [`add_rig_instances`].
#[derive(Debug, Clone, Copy)]
pub struct InstanceSetupOptions<'a> {
    pub fix_rule: InstanceFixRule<'a>,
    pub use_gps: bool,
    /// Treat a non-positive GPS accuracy as a fatal configuration error.
    pub strict_gps_accuracy: bool,
}

/// Add rig instances with averaged per-instance GPS priors.
///
/// The GPS position and accuracy of contributing member shots are averaged
/// into one position prior per free instance; shots matching the fix rule
/// fix the whole instance and are excluded from the average.
pub fn add_rig_instances<'a>(
    adjuster: &mut BundleAdjuster,
    map: &Map,
    instance_ids: impl IntoIterator<Item = &'a RigInstanceId>,
    opts: &InstanceSetupOptions<'_>,
) -> Result<()> {
    for instance_id in instance_ids {
        let Some(instance) = map.rig_instance(instance_id) else {
            continue;
        };

        let mut shot_cameras = HashMap::new();
        let mut shot_rig_cameras = HashMap::new();
        let mut average_position = Vec3::zeros();
        let mut average_accuracy = 0.0;
        let mut gps_count = 0usize;
        let mut fix_instance = false;

        for (shot_id, rig_camera_id) in instance.shot_rig_cameras() {
            let Some(shot) = map.shot(shot_id) else {
                continue;
            };
            shot_cameras.insert(shot_id.clone(), shot.camera_id.clone());
            shot_rig_cameras.insert(shot_id.clone(), rig_camera_id.clone());

            if opts.fix_rule.triggered_by(shot_id) {
                fix_instance = true;
                continue;
            }
            if opts.use_gps {
                if let (Some(position), Some(accuracy)) =
                    (shot.measurements.gps_position, shot.measurements.gps_accuracy)
                {
                    if opts.strict_gps_accuracy && accuracy <= 0.0 {
                        bail!(
                            "shot {shot_id} has a GPS accuracy <= 0: {accuracy}; \
                             filter such values in the input parser"
                        );
                    }
                    average_position += position;
                    average_accuracy += accuracy;
                    gps_count += 1;
                }
            }
        }

        adjuster.add_rig_instance(
            instance_id,
            &instance.pose,
            &shot_cameras,
            &shot_rig_cameras,
            fix_instance,
        );

        // Averaged position priors only constrain moving instances.
        if !fix_instance && gps_count > 0 {
            let position = average_position / gps_count as f64;
            let accuracy = average_accuracy / gps_count as f64;
            adjuster.add_rig_instance_position_prior(
                instance_id,
                position,
                Vec3::from_element(accuracy),
            );
        }
    }
    Ok(())
}
