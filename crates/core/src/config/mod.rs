use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{Result, StreamError};

/// Top-level configuration structure for a streaming session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub subscriber: SubscriberConfig,
    pub toggles: StreamToggles,
    /// Delay between two polls of the subscriber, in milliseconds.
    pub poll_interval_ms: u64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            subscriber: SubscriberConfig::default(),
            toggles: StreamToggles::default(),
            poll_interval_ms: 1,
        }
    }
}

impl StreamConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|err| StreamError::Config(format!("{}: {err}", path.as_ref().display())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.subscriber.host.trim().is_empty() {
            return Err(StreamError::Config("subscriber host is empty".into()));
        }
        if self.subscriber.port == 0 {
            return Err(StreamError::Config("subscriber port must be non-zero".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(StreamError::Config("poll interval must be at least 1ms".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Address the subscriber socket binds to. Publishers connect to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriberConfig {
    pub host: String,
    pub port: u16,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5572,
        }
    }
}

impl SubscriberConfig {
    pub fn endpoint(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// Boolean switches read by the mapper, recorder and poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamToggles {
    /// Re-read the selected objects on every received frame.
    pub dynamic_targeting: bool,
    /// Apply blendshape weights.
    pub facial_configuration: bool,
    /// Apply head and neck rotations.
    pub rotate_head: bool,
    /// Invert yaw and roll as seen in a mirror.
    pub mirror_head: bool,
    /// Insert keyframes for every applied channel.
    pub keyframing: bool,
}

impl Default for StreamToggles {
    fn default() -> Self {
        Self {
            dynamic_targeting: true,
            facial_configuration: true,
            rotate_head: true,
            mirror_head: false,
            keyframing: false,
        }
    }
}
