//! WebSocket transport implementation using `tokio-tungstenite`.
//!
//! [`WebSocketTransport::accept`] only takes the TCP stream off the
//! listener; the upgrade runs in [`PendingWebSocket::complete`], on the
//! connection's own task.
//!
//! Each upgraded socket is split in two: the read half stays with the
//! [`WebSocketConnection`] (polled by the connection's handler task) and
//! the write half is moved into a writer task that drains the
//! connection's [`QueuedChannel`]. Reads therefore never hold up writes.

use std::net::SocketAddr;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    ErrorResponse, Request, Response,
};

use crate::{
    ChannelHandle, Connection, ConnectionId, Handshake, Outgoing,
    QueuedChannel, Transport, TransportError,
};

type WsStream = WebSocketStream<TcpStream>;

/// A WebSocket-based [`Transport`] that listens for incoming connections.
pub struct WebSocketTransport {
    listener: TcpListener,
}

impl WebSocketTransport {
    /// Binds a new WebSocket transport to the given address.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "WebSocket transport listening");
        Ok(Self { listener })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Handshake = PendingWebSocket;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<Self::Handshake, Self::Error> {
        let (stream, addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::trace!(%addr, "accepted TCP stream");
        Ok(PendingWebSocket { stream, addr })
    }
}

/// A TCP stream that has not finished its WebSocket upgrade yet.
pub struct PendingWebSocket {
    stream: TcpStream,
    addr: SocketAddr,
}

impl PendingWebSocket {
    /// The remote peer's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Handshake for PendingWebSocket {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn complete(self) -> Result<Self::Connection, Self::Error> {
        let Self { stream, addr } = self;

        // The request path selects the endpoint (game, matchmaking, ...).
        let mut path = String::from("/");
        let ws = tokio_tungstenite::accept_hdr_async(
            stream,
            |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                path = req.uri().path().to_string();
                Ok(resp)
            },
        )
        .await
        .map_err(|e| {
            TransportError::AcceptFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                e,
            ))
        })?;

        let id = ConnectionId::next();
        tracing::debug!(%id, %addr, %path, "accepted WebSocket connection");

        let (sink, stream) = ws.split();
        let (channel, outbound) = QueuedChannel::with_id(id);
        tokio::spawn(write_loop(id, sink, outbound));

        Ok(WebSocketConnection {
            id,
            path,
            stream: Mutex::new(stream),
            channel: channel.into_handle(),
        })
    }
}

/// A single WebSocket connection.
pub struct WebSocketConnection {
    id: ConnectionId,
    path: String,
    stream: Mutex<SplitStream<WsStream>>,
    channel: ChannelHandle,
}

impl WebSocketConnection {
    /// The request path the client connected to, e.g. `/ws/matchmaking`.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    async fn recv(&self) -> Result<Option<Vec<u8>>, Self::Error> {
        let mut stream = self.stream.lock().await;
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_bytes().to_vec()));
                }
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(data.to_vec()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue, // ping/pong/frame
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(
                        std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            e,
                        ),
                    ));
                }
            }
        }
    }

    fn channel(&self) -> ChannelHandle {
        self.channel.clone()
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Drains the outbound queue into the socket until it is closed or a
/// write fails. Dropping the receiver makes every outstanding
/// [`ChannelHandle`] for this connection fail its next send.
async fn write_loop(
    id: ConnectionId,
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Outgoing>,
) {
    while let Some(item) = outbound.recv().await {
        match item {
            Outgoing::Frame(data) => {
                let text = String::from_utf8_lossy(&data).into_owned();
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    tracing::debug!(%id, error = %e, "write failed");
                    break;
                }
            }
            Outgoing::Close => break,
        }
    }
    let _ = sink.close().await;
    tracing::debug!(%id, "writer stopped");
}
