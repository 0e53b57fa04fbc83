//! Subscriber endpoint seam and its ZeroMQ implementation.

use tracing::{debug, info};

use crate::{Result, StreamError};

/// Non-blocking multipart subscriber.
pub trait Subscriber {
    /// Zero-timeout readiness check.
    fn poll_ready(&mut self) -> Result<bool>;

    /// Receives one multipart message. Only called after `poll_ready` said yes.
    fn recv_multipart(&mut self) -> Result<Vec<Vec<u8>>>;

    /// Closes the endpoint. Closing twice yields
    /// [`StreamError::EndpointAlreadyClosed`].
    fn close(&mut self) -> Result<()>;
}

/// Opens subscriber endpoints for a session.
pub trait Connector {
    fn open(&mut self, endpoint: &str) -> Result<Box<dyn Subscriber>>;
}

/// Creates SUB sockets on a shared ZeroMQ context.
pub struct ZmqConnector {
    context: zmq::Context,
}

impl ZmqConnector {
    pub fn new() -> Self {
        Self {
            context: zmq::Context::new(),
        }
    }

    pub fn with_context(context: zmq::Context) -> Self {
        Self { context }
    }
}

impl Default for ZmqConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for ZmqConnector {
    /// Binds a SUB socket to `endpoint` and subscribes to every topic.
    /// Publishers connect to this address.
    fn open(&mut self, endpoint: &str) -> Result<Box<dyn Subscriber>> {
        let socket = self.context.socket(zmq::SUB)?;
        socket.set_linger(0)?;
        socket.bind(endpoint)?;
        socket.set_subscribe(b"")?;
        info!(endpoint, "subscriber bound, waiting for data");
        Ok(Box::new(ZmqSubscriber {
            socket: Some(socket),
        }))
    }
}

/// SUB socket owned by a session. `None` once closed.
pub struct ZmqSubscriber {
    socket: Option<zmq::Socket>,
}

impl ZmqSubscriber {
    fn socket(&self) -> Result<&zmq::Socket> {
        self.socket.as_ref().ok_or(StreamError::EndpointAlreadyClosed)
    }
}

impl Subscriber for ZmqSubscriber {
    fn poll_ready(&mut self) -> Result<bool> {
        let events = self.socket()?.poll(zmq::POLLIN, 0)?;
        Ok(events > 0)
    }

    fn recv_multipart(&mut self) -> Result<Vec<Vec<u8>>> {
        Ok(self.socket()?.recv_multipart(0)?)
    }

    fn close(&mut self) -> Result<()> {
        match self.socket.take() {
            // Dropping the socket closes it.
            Some(socket) => {
                drop(socket);
                debug!("subscriber socket closed");
                Ok(())
            }
            None => Err(StreamError::EndpointAlreadyClosed),
        }
    }
}

impl std::fmt::Debug for ZmqSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZmqSubscriber")
            .field("open", &self.socket.is_some())
            .finish()
    }
}
