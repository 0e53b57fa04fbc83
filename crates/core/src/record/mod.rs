use serde::{Deserialize, Serialize};

use crate::{
    mapping::Mutation,
    rig::TargetId,
    timeline::{KeyframeRecord, Timeline},
};

/// Configuration options for the keyframe recorder.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingSettings {
    pub enabled: bool,
}

/// Persists applied mutations as keyframes on the host timeline.
#[derive(Debug, Default)]
pub struct Recorder {
    is_recording: bool,
    written: u64,
}

impl Recorder {
    pub fn new(settings: RecordingSettings) -> Self {
        Self {
            is_recording: settings.enabled,
            written: 0,
        }
    }

    pub fn start(&mut self) {
        self.is_recording = true;
    }

    pub fn stop(&mut self) {
        self.is_recording = false;
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    /// Number of keyframes written since creation.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Writes one keyframe per mutation at `anchor + frame_index`. Returns the
    /// number of keyframes inserted. A position outside the timeline range
    /// writes nothing.
    pub fn record<T>(
        &mut self,
        timeline: &mut T,
        target: &TargetId,
        anchor: i64,
        frame_index: i64,
        mutations: &[Mutation],
    ) -> usize
    where
        T: Timeline + ?Sized,
    {
        if !self.is_recording || mutations.is_empty() {
            return 0;
        }
        let Some(frame) = anchor.checked_add(frame_index) else {
            tracing::warn!(
                object = %target,
                anchor,
                frame_index,
                "keyframe position out of range, skipping frame"
            );
            return 0;
        };
        for mutation in mutations {
            timeline.insert_keyframe(KeyframeRecord {
                target: target.clone(),
                channel: mutation.channel.clone(),
                frame,
                value: mutation.value,
            });
        }
        self.written += mutations.len() as u64;
        tracing::debug!(object = %target, frame, count = mutations.len(), "inserted keyframes");
        mutations.len()
    }
}
