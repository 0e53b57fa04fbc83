/// Result alias that carries the custom [`StreamError`] type.
pub type Result<T> = std::result::Result<T, StreamError>;

/// Common error type for the core crate.
///
/// Most variants describe a failure that is local to one message, one channel
/// or one target. The poll loop logs those and keeps running; only the session
/// lifecycle decides when streaming stops.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The wire message did not consist of exactly topic, timestamp and payload.
    #[error("malformed envelope: expected 3 parts, got {parts}")]
    MalformedEnvelope { parts: usize },
    /// The payload part could not be parsed into the expected mapping shape.
    #[error("payload decode error: {0}")]
    PayloadDecode(#[from] serde_json::Error),
    /// A blendshape name that the target does not expose.
    #[error("target `{target}` has no shape key `{channel}`")]
    UnknownChannel { target: String, channel: String },
    /// The target lacks one of the head/neck bones.
    #[error("target `{target}` is missing bone `{bone}`")]
    MissingBone { target: String, bone: String },
    #[error("subscriber is already connected")]
    AlreadyConnected,
    #[error("subscriber endpoint is already closed")]
    EndpointAlreadyClosed,
    #[error("transport error: {0}")]
    Transport(#[from] zmq::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Message(String),
}

impl StreamError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// True for errors that only affect a single channel or target and
    /// therefore never stop the frame from being applied elsewhere.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Self::UnknownChannel { .. } | Self::MissingBone { .. }
        )
    }
}

impl From<&str> for StreamError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for StreamError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
