use tracing::{debug, warn};

use crate::{
    envelope::{AnimationFrame, PoseChannels},
    rig::{Bone, PoseAxis, Rig},
    timeline::ChannelPath,
    StreamError, StreamToggles,
};

/// Shape keys starting with this prefix drive breathing locally and are never
/// taken from the stream.
pub const BREATHING_PREFIX: &str = "Expressions_chestExpansion";

pub const HEAD_FACTOR: f32 = 0.95;
pub const NECK_FACTOR: f32 = 0.5;

/// Flags that shape how a frame is routed onto a rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingSettings {
    pub blendshapes: bool,
    pub rotation: bool,
    pub mirror: bool,
}

impl Default for MappingSettings {
    fn default() -> Self {
        Self::from(&StreamToggles::default())
    }
}

impl From<&StreamToggles> for MappingSettings {
    fn from(toggles: &StreamToggles) -> Self {
        Self {
            blendshapes: toggles.facial_configuration,
            rotation: toggles.rotate_head,
            mirror: toggles.mirror_head,
        }
    }
}

/// A channel write that reached the rig.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub channel: ChannelPath,
    pub value: f32,
}

/// Result of applying one frame to one target: what was written and what was
/// skipped along the way.
#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub mutations: Vec<Mutation>,
    pub skipped: Vec<StreamError>,
}

impl ApplyOutcome {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

/// Routes decoded frame channels onto rig shape keys and bones.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoseMapper {
    settings: MappingSettings,
}

impl PoseMapper {
    pub fn new(settings: MappingSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> MappingSettings {
        self.settings
    }

    /// Applies a frame to a target. Failures are isolated per shape key and
    /// per pose group; everything else still lands.
    pub fn apply(&self, frame: &AnimationFrame, target: &mut dyn Rig) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        if self.settings.blendshapes {
            match frame.blendshapes() {
                Some(weights) => {
                    for (name, &weight) in weights {
                        if name.starts_with(BREATHING_PREFIX) {
                            continue;
                        }
                        let value = weight as f32;
                        match target.set_shape_key(name, value) {
                            Ok(()) => outcome.mutations.push(Mutation {
                                channel: ChannelPath::ShapeKey(name.clone()),
                                value,
                            }),
                            Err(err) => {
                                warn!(object = %target.id(), channel = %name, "skipping shape key: {err}");
                                outcome.skipped.push(err);
                            }
                        }
                    }
                }
                None => debug!(object = %target.id(), "no blendshape data in received frame"),
            }
        } else {
            debug!(object = %target.id(), "no blendshape data in received frame");
        }

        if self.settings.rotation {
            match frame.pose() {
                Some(pose) => match self.apply_pose(pose, target) {
                    Ok(mutations) => outcome.mutations.extend(mutations),
                    Err(err) => {
                        warn!(object = %target.id(), "skipping head pose: {err}");
                        outcome.skipped.push(err);
                    }
                },
                None => debug!(object = %target.id(), "no pose data in received frame"),
            }
        } else {
            debug!(object = %target.id(), "no pose data in received frame");
        }

        outcome
    }

    /// Sign applied to an axis before damping. Yaw and roll are inverted for
    /// the rig convention and flipped again when mirroring.
    pub fn axis_sign(&self, axis: PoseAxis) -> f32 {
        if !axis.is_lateral() {
            return 1.0;
        }
        let mirror = if self.settings.mirror { -1.0 } else { 1.0 };
        -1.0 * mirror
    }

    fn apply_pose(
        &self,
        pose: &PoseChannels,
        target: &mut dyn Rig,
    ) -> crate::Result<Vec<Mutation>> {
        // Both bones must exist before any axis is touched.
        if let Some(bone) = Bone::ALL.into_iter().find(|bone| !target.has_bone(*bone)) {
            return Err(StreamError::MissingBone {
                target: target.id().to_string(),
                bone: bone.name().to_string(),
            });
        }
        for bone in Bone::ALL {
            target.ensure_euler(bone)?;
        }

        let mut mutations = Vec::with_capacity(6);
        for (axis, angle) in pose.iter() {
            let sign = self.axis_sign(axis);
            for (bone, factor) in [(Bone::Head, HEAD_FACTOR), (Bone::Neck, NECK_FACTOR)] {
                let value = (angle * f64::from(factor * sign)) as f32;
                target.set_bone_angle(bone, axis, value)?;
                mutations.push(Mutation {
                    channel: ChannelPath::BoneRotation { bone, axis },
                    value,
                });
            }
        }
        Ok(mutations)
    }
}
