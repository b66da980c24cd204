//! The outbound side of a connection, as seen by the engine.
//!
//! Registries, the matchmaking queue and the notification router never
//! touch sockets. They hold a [`ChannelHandle`] and call
//! [`Channel::send`], which must not block: the WebSocket implementation
//! only enqueues the frame for the connection's writer task.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::{ConnectionId, TransportError};

/// A capability to push text frames to one live connection.
pub trait Channel: Send + Sync + 'static {
    /// The connection this channel writes to.
    fn id(&self) -> ConnectionId;

    /// Queues `data` for delivery.
    ///
    /// An error means the connection is gone; callers should forget the
    /// channel rather than retry.
    fn send(&self, data: &[u8]) -> Result<(), TransportError>;

    /// Requests that the connection be closed after pending frames.
    fn close(&self) {}
}

/// Shared, type-erased channel.
pub type ChannelHandle = Arc<dyn Channel>;

/// An item in a connection's outbound queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A text frame to write.
    Frame(Vec<u8>),
    /// Close the connection.
    Close,
}

/// A [`Channel`] backed by an unbounded mpsc queue.
///
/// The receiving half is owned by whoever writes to the wire (the
/// WebSocket writer task, or a test asserting on what was sent).
#[derive(Debug, Clone)]
pub struct QueuedChannel {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Outgoing>,
}

impl QueuedChannel {
    /// Creates a channel with a fresh connection id and returns the
    /// receiving half of its queue.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        Self::with_id(ConnectionId::next())
    }

    /// Creates a channel for an existing connection id.
    pub fn with_id(
        id: ConnectionId,
    ) -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }

    /// Wraps this channel into a shareable handle.
    pub fn into_handle(self) -> ChannelHandle {
        Arc::new(self)
    }
}

impl Channel for QueuedChannel {
    fn id(&self) -> ConnectionId {
        self.id
    }

    fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        self.tx
            .send(Outgoing::Frame(data.to_vec()))
            .map_err(|_| TransportError::QueueClosed(self.id))
    }

    fn close(&self) {
        let _ = self.tx.send(Outgoing::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_open_queue_enqueues_frame() {
        let (chan, mut rx) = QueuedChannel::new();
        chan.send(b"hello").expect("queue is open");
        assert_eq!(rx.try_recv().unwrap(), Outgoing::Frame(b"hello".to_vec()));
    }

    #[test]
    fn test_send_dropped_receiver_returns_queue_closed() {
        let (chan, rx) = QueuedChannel::new();
        drop(rx);
        let err = chan.send(b"x").unwrap_err();
        assert!(matches!(err, TransportError::QueueClosed(id) if id == chan.id()));
    }

    #[test]
    fn test_close_enqueues_close_marker() {
        let (chan, mut rx) = QueuedChannel::with_id(ConnectionId::new(9));
        chan.close();
        assert_eq!(rx.try_recv().unwrap(), Outgoing::Close);
        assert_eq!(chan.id(), ConnectionId::new(9));
    }
}
