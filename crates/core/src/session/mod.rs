//! Connection lifecycle of a streaming session.
//!
//! `Session` owns the subscriber endpoint, the frame anchor and the target
//! snapshot in a single optional [`Connection`]. The session is connected
//! exactly when that connection exists, so the status can never disagree
//! with the socket it describes.

use std::fmt;

use tracing::{info, warn};

use crate::{
    driver::Scheduler,
    rig::TargetId,
    scene::{Host, SceneGraph},
    transport::{Connector, Subscriber},
    Result, StreamConfig, StreamError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Disconnected,
    Connected,
}

/// How a disconnect request ended. Every variant leaves the session
/// disconnected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// The endpoint was open and has been closed.
    Closed,
    /// A connection existed but its endpoint had already been invalidated.
    AlreadyClosed,
    /// Nothing to disconnect.
    NotConnected,
}

/// Outcome of one non-blocking receive attempt.
#[derive(Debug)]
pub enum Receive {
    /// There is no usable endpoint any more.
    Closed,
    /// Nothing ready, or a transient failure that was logged.
    Idle,
    Message(Vec<Vec<u8>>),
}

struct Connection {
    endpoint: String,
    subscriber: Box<dyn Subscriber>,
    anchor: i64,
    targets: Vec<TargetId>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint)
            .field("anchor", &self.anchor)
            .field("targets", &self.targets)
            .finish()
    }
}

#[derive(Debug)]
pub struct Session {
    config: StreamConfig,
    connection: Option<Connection>,
    last_message: Option<String>,
}

impl Session {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            connection: None,
            last_message: None,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn status(&self) -> Status {
        if self.connection.is_some() {
            Status::Connected
        } else {
            Status::Disconnected
        }
    }

    pub fn is_connected(&self) -> bool {
        self.status() == Status::Connected
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.connection.as_ref().map(|conn| conn.endpoint.as_str())
    }

    /// Timeline position captured at connect time.
    pub fn anchor(&self) -> Option<i64> {
        self.connection.as_ref().map(|conn| conn.anchor)
    }

    pub fn targets(&self) -> &[TargetId] {
        self.connection
            .as_ref()
            .map(|conn| conn.targets.as_slice())
            .unwrap_or_default()
    }

    /// Raw text of the most recently received payload.
    pub fn last_message(&self) -> Option<&str> {
        self.last_message.as_deref()
    }

    /// Opens the subscriber, anchors incoming frames to the host playhead,
    /// snapshots the selection and registers the poll loop.
    pub fn connect<H>(
        &mut self,
        connector: &mut dyn Connector,
        host: &H,
        scheduler: &mut dyn Scheduler,
    ) -> Result<()>
    where
        H: Host + ?Sized,
    {
        if self.is_connected() {
            info!("subscriber already connected, ignoring connect request");
            return Err(StreamError::AlreadyConnected);
        }

        let endpoint = self.config.subscriber.endpoint();
        info!(endpoint = %endpoint, "connecting subscriber socket");
        let subscriber = connector.open(&endpoint)?;

        let anchor = host.current_frame();
        let targets = host.selected_targets();
        info!(anchor, targets = targets.len(), "session connected");

        self.connection = Some(Connection {
            endpoint,
            subscriber,
            anchor,
            targets,
        });
        scheduler.register(self.config.poll_interval());
        Ok(())
    }

    /// Stops polling and closes the endpoint. Always ends disconnected.
    pub fn disconnect(&mut self, scheduler: &mut dyn Scheduler) -> Disconnect {
        if scheduler.is_registered() {
            scheduler.unregister();
        }

        let Some(mut connection) = self.connection.take() else {
            info!("subscriber socket was not active");
            return Disconnect::NotConnected;
        };

        match connection.subscriber.close() {
            Ok(()) => {
                info!(endpoint = %connection.endpoint, "subscriber socket closed");
                Disconnect::Closed
            }
            Err(StreamError::EndpointAlreadyClosed) => {
                info!(endpoint = %connection.endpoint, "subscriber socket was already closed");
                Disconnect::AlreadyClosed
            }
            Err(err) => {
                // The handle is dropped either way.
                warn!(endpoint = %connection.endpoint, "closing subscriber failed: {err}");
                Disconnect::Closed
            }
        }
    }

    /// Re-reads the host selection into the target snapshot.
    pub fn refresh_targets<H>(&mut self, host: &H)
    where
        H: SceneGraph + ?Sized,
    {
        if let Some(connection) = self.connection.as_mut() {
            connection.targets = host.selected_targets();
        }
    }

    /// Receives at most one message without blocking.
    ///
    /// An endpoint that turns out to be invalid ends the connection: the
    /// handle is the only source of truth for being connected.
    pub fn receive(&mut self) -> Receive {
        let Some(connection) = self.connection.as_mut() else {
            return Receive::Closed;
        };

        let ready = match connection.subscriber.poll_ready() {
            Ok(ready) => ready,
            Err(StreamError::EndpointAlreadyClosed) => {
                warn!(endpoint = %connection.endpoint, "subscriber endpoint vanished");
                self.connection = None;
                return Receive::Closed;
            }
            Err(err) => {
                warn!("subscriber poll failed: {err}");
                return Receive::Idle;
            }
        };
        if !ready {
            return Receive::Idle;
        }

        match connection.subscriber.recv_multipart() {
            Ok(parts) => {
                if let Some(payload) = parts.last() {
                    self.last_message = Some(String::from_utf8_lossy(payload).into_owned());
                }
                Receive::Message(parts)
            }
            Err(err) => {
                warn!("subscriber receive failed: {err}");
                Receive::Idle
            }
        }
    }
}
