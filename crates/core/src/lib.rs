//! Core library for Facestream.
//!
//! Streams per-frame facial animation (blendshape weights and head pose
//! angles) from a ZeroMQ publisher onto rigs owned by a host application.
//! Each module owns one piece of that path: the wire envelope, the mapping
//! onto shape keys and bones, optional keyframe recording, the session
//! lifecycle and the non-blocking poll loop that ties them together.

pub mod config;
pub mod driver;
pub mod envelope;
pub mod error;
pub mod mapping;
pub mod record;
pub mod rig;
pub mod scene;
pub mod session;
pub mod timeline;
pub mod transport;

pub use config::{StreamConfig, StreamToggles, SubscriberConfig};
pub use driver::{CooperativeLoop, DriverStats, PollDriver, Scheduler, Tick};
pub use envelope::{AnimationFrame, Payload, PoseChannels};
pub use error::{Result, StreamError};
pub use mapping::{ApplyOutcome, MappingSettings, Mutation, PoseMapper};
pub use record::{Recorder, RecordingSettings};
pub use rig::{Bone, MorphRig, PoseAxis, Rig, RigDescriptor, TargetId};
pub use scene::{Host, Scene, SceneGraph, StandaloneHost};
pub use session::{Disconnect, Session, Status};
pub use timeline::{ChannelPath, KeyframeLog, KeyframeRecord, Timeline};
pub use transport::{Connector, Subscriber, ZmqConnector};
