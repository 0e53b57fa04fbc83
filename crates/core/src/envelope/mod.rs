//! Three-part wire envelope: topic, timestamp and a JSON payload.
//!
//! Topic and timestamp are carried through untouched. The payload holds the
//! relative frame index plus optional `blendshapes` and `pose` mappings.
//! Channel values keep the wire's `f64` precision until they reach a rig.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{rig::PoseAxis, Result, StreamError};

pub const ENVELOPE_PARTS: usize = 3;

/// Payload record as it travels on the wire. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub frame: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blendshapes: Option<BTreeMap<String, f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<BTreeMap<String, f64>>,
}

/// Per-axis head pose angles in radians. Absent axes stay `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoseChannels {
    angles: [Option<f64>; 3],
}

impl PoseChannels {
    pub fn get(&self, axis: PoseAxis) -> Option<f64> {
        self.angles[axis.index()]
    }

    pub fn set(&mut self, axis: PoseAxis, radians: f64) {
        self.angles[axis.index()] = Some(radians);
    }

    pub fn is_empty(&self) -> bool {
        self.angles.iter().all(Option::is_none)
    }

    /// Present axes in pitch, yaw, roll order.
    pub fn iter(&self) -> impl Iterator<Item = (PoseAxis, f64)> + '_ {
        PoseAxis::ALL
            .into_iter()
            .filter_map(|axis| self.get(axis).map(|angle| (axis, angle)))
    }
}

/// One decoded animation frame. Consumed once by the poll loop.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationFrame {
    pub topic: Vec<u8>,
    pub timestamp: Vec<u8>,
    pub frame_index: i64,
    pub blendshapes: Option<BTreeMap<String, f64>>,
    pub pose: Option<PoseChannels>,
}

impl AnimationFrame {
    /// Blendshape weights, treating an empty mapping as absent.
    pub fn blendshapes(&self) -> Option<&BTreeMap<String, f64>> {
        self.blendshapes.as_ref().filter(|map| !map.is_empty())
    }

    /// Pose angles, treating an empty mapping as absent.
    pub fn pose(&self) -> Option<&PoseChannels> {
        self.pose.as_ref().filter(|pose| !pose.is_empty())
    }
}

/// Decodes a multipart message into an [`AnimationFrame`].
pub fn decode(parts: &[Vec<u8>]) -> Result<AnimationFrame> {
    let [topic, timestamp, payload] = parts else {
        return Err(StreamError::MalformedEnvelope { parts: parts.len() });
    };
    let payload: Payload = serde_json::from_slice(payload)?;

    let pose = payload.pose.map(|entries| {
        let mut channels = PoseChannels::default();
        for (key, angle) in entries {
            match PoseAxis::from_wire_key(&key) {
                Some(axis) => channels.set(axis, angle),
                None => tracing::debug!(key = %key, "ignoring unknown pose key"),
            }
        }
        channels
    });

    Ok(AnimationFrame {
        topic: topic.clone(),
        timestamp: timestamp.clone(),
        frame_index: payload.frame,
        blendshapes: payload.blendshapes,
        pose,
    })
}

/// Builds the wire parts for a payload.
pub fn encode(topic: &[u8], timestamp: &[u8], payload: &Payload) -> Result<Vec<Vec<u8>>> {
    Ok(vec![
        topic.to_vec(),
        timestamp.to_vec(),
        serde_json::to_vec(payload)?,
    ])
}

impl From<&AnimationFrame> for Payload {
    fn from(frame: &AnimationFrame) -> Self {
        Self {
            frame: frame.frame_index,
            blendshapes: frame.blendshapes.clone(),
            pose: frame.pose.map(|pose| {
                pose.iter()
                    .map(|(axis, angle)| (axis.wire_key().to_string(), angle))
                    .collect()
            }),
        }
    }
}
