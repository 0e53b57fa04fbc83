use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, StreamError};

/// Identifier of a target object in the host scene.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetId(pub String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two controllable bones driven by head pose data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bone {
    Head,
    Neck,
}

impl Bone {
    pub const ALL: [Bone; 2] = [Bone::Head, Bone::Neck];

    pub fn name(self) -> &'static str {
        match self {
            Bone::Head => "head",
            Bone::Neck => "neck",
        }
    }
}

/// Euler axis of a bone rotation, keyed on the wire as `pose_R{x,y,z}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoseAxis {
    Pitch,
    Yaw,
    Roll,
}

impl PoseAxis {
    pub const ALL: [PoseAxis; 3] = [PoseAxis::Pitch, PoseAxis::Yaw, PoseAxis::Roll];

    pub fn wire_key(self) -> &'static str {
        match self {
            PoseAxis::Pitch => "pose_Rx",
            PoseAxis::Yaw => "pose_Ry",
            PoseAxis::Roll => "pose_Rz",
        }
    }

    pub fn from_wire_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|axis| axis.wire_key() == key)
    }

    /// Index into an XYZ Euler triple.
    pub fn index(self) -> usize {
        match self {
            PoseAxis::Pitch => 0,
            PoseAxis::Yaw => 1,
            PoseAxis::Roll => 2,
        }
    }

    /// Axes with a left/right sense flip under mirroring.
    pub fn is_lateral(self) -> bool {
        !matches!(self, PoseAxis::Pitch)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RotationMode {
    #[default]
    Quaternion,
    EulerXyz,
}

/// Mutable view the streaming core needs on one rig instance.
pub trait Rig: fmt::Debug {
    fn id(&self) -> &TargetId;

    /// Writes a blendshape weight. Unknown names fail with
    /// [`StreamError::UnknownChannel`].
    fn set_shape_key(&mut self, name: &str, value: f32) -> Result<()>;

    fn shape_key(&self, name: &str) -> Option<f32>;

    fn has_bone(&self, bone: Bone) -> bool;

    /// Switches the bone to per-axis XYZ Euler rotation.
    fn ensure_euler(&mut self, bone: Bone) -> Result<()>;

    fn set_bone_angle(&mut self, bone: Bone, axis: PoseAxis, radians: f32) -> Result<()>;

    fn bone_angle(&self, bone: Bone, axis: PoseAxis) -> Option<f32>;
}

/// Serialisable description used to build a [`MorphRig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RigDescriptor {
    pub name: String,
    /// Declared shape keys. `None` accepts any channel name.
    #[serde(default)]
    pub shape_keys: Option<Vec<String>>,
    #[serde(default = "default_true")]
    pub head_neck_bones: bool,
}

fn default_true() -> bool {
    true
}

impl RigDescriptor {
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape_keys: None,
            head_neck_bones: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneState {
    pub mode: RotationMode,
    pub euler: [f32; 3],
}

/// In-memory rig with a shape-key table and optional head/neck bones.
#[derive(Debug, Clone)]
pub struct MorphRig {
    id: TargetId,
    shape_keys: HashMap<String, f32>,
    open_channels: bool,
    bones: HashMap<Bone, BoneState>,
}

impl MorphRig {
    pub fn new(descriptor: &RigDescriptor) -> Self {
        let shape_keys = descriptor
            .shape_keys
            .iter()
            .flatten()
            .map(|name| (name.clone(), 0.0))
            .collect();
        let bones = if descriptor.head_neck_bones {
            Bone::ALL
                .into_iter()
                .map(|bone| (bone, BoneState::default()))
                .collect()
        } else {
            HashMap::new()
        };
        Self {
            id: TargetId::new(descriptor.name.clone()),
            shape_keys,
            open_channels: descriptor.shape_keys.is_none(),
            bones,
        }
    }

    pub fn shape_keys(&self) -> &HashMap<String, f32> {
        &self.shape_keys
    }

    pub fn bone(&self, bone: Bone) -> Option<&BoneState> {
        self.bones.get(&bone)
    }

    fn bone_mut(&mut self, bone: Bone) -> Result<&mut BoneState> {
        let id = &self.id;
        self.bones
            .get_mut(&bone)
            .ok_or_else(|| StreamError::MissingBone {
                target: id.to_string(),
                bone: bone.name().to_string(),
            })
    }
}

impl Rig for MorphRig {
    fn id(&self) -> &TargetId {
        &self.id
    }

    fn set_shape_key(&mut self, name: &str, value: f32) -> Result<()> {
        match self.shape_keys.get_mut(name) {
            Some(slot) => *slot = value,
            None if self.open_channels => {
                self.shape_keys.insert(name.to_string(), value);
            }
            None => {
                return Err(StreamError::UnknownChannel {
                    target: self.id.to_string(),
                    channel: name.to_string(),
                })
            }
        }
        Ok(())
    }

    fn shape_key(&self, name: &str) -> Option<f32> {
        self.shape_keys.get(name).copied()
    }

    fn has_bone(&self, bone: Bone) -> bool {
        self.bones.contains_key(&bone)
    }

    fn ensure_euler(&mut self, bone: Bone) -> Result<()> {
        self.bone_mut(bone)?.mode = RotationMode::EulerXyz;
        Ok(())
    }

    fn set_bone_angle(&mut self, bone: Bone, axis: PoseAxis, radians: f32) -> Result<()> {
        self.bone_mut(bone)?.euler[axis.index()] = radians;
        Ok(())
    }

    fn bone_angle(&self, bone: Bone, axis: PoseAxis) -> Option<f32> {
        self.bones.get(&bone).map(|state| state.euler[axis.index()])
    }
}
