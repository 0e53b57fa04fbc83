use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rig::{Bone, PoseAxis, TargetId};

/// Host timeline as seen by the streaming core.
pub trait Timeline {
    /// Current playhead position, read once at connect time.
    fn current_frame(&self) -> i64;

    fn insert_keyframe(&mut self, record: KeyframeRecord);
}

/// Animatable channel on a target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelPath {
    ShapeKey(String),
    BoneRotation { bone: Bone, axis: PoseAxis },
}

impl fmt::Display for ChannelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelPath::ShapeKey(name) => write!(f, "key_blocks[\"{name}\"].value"),
            ChannelPath::BoneRotation { bone, axis } => write!(
                f,
                "pose.bones[\"{}\"].rotation_euler[{}]",
                bone.name(),
                axis.index()
            ),
        }
    }
}

/// One persisted channel value at an absolute timeline position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyframeRecord {
    pub target: TargetId,
    pub channel: ChannelPath,
    pub frame: i64,
    pub value: f32,
}

/// Timeline that keeps inserted keyframes in memory.
#[derive(Debug, Default, Clone)]
pub struct KeyframeLog {
    current_frame: i64,
    records: Vec<KeyframeRecord>,
}

impl KeyframeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at_frame(current_frame: i64) -> Self {
        Self {
            current_frame,
            records: Vec::new(),
        }
    }

    pub fn seek(&mut self, frame: i64) {
        self.current_frame = frame;
    }

    pub fn records(&self) -> &[KeyframeRecord] {
        &self.records
    }
}

impl Timeline for KeyframeLog {
    fn current_frame(&self) -> i64 {
        self.current_frame
    }

    fn insert_keyframe(&mut self, record: KeyframeRecord) {
        self.records.push(record);
    }
}
