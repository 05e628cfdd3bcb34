//! WebSocket transport driver.
//!
//! Provides [`ConnectedTransport`], a channel pair bridging typed events
//! to a WebSocket connection. This is a thin I/O layer: all protocol
//! logic stays in the Sans-IO [`crate::SyncEngine`], whose `Open`,
//! `Emit`, and `Close` actions this driver executes.

use banter_proto::{ClientEvent, Envelope, ServerEvent};
use futures_util::{SinkExt as _, StreamExt as _};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Handle to a live WebSocket connection.
///
/// Events are sent and received via the channels; an internal task
/// handles the socket I/O. Channel closure signals connection loss: feed
/// `TransportDown` to the engine when `from_server` yields `None`.
#[derive(Debug)]
pub struct ConnectedTransport {
    /// Send events to the server.
    pub to_server: mpsc::Sender<ClientEvent>,
    /// Receive decoded events from the server.
    pub from_server: mpsc::Receiver<ServerEvent>,
    abort_handle: tokio::task::AbortHandle,
}

impl ConnectedTransport {
    /// Stop the connection task.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Connect to a Banter server over WebSocket.
pub async fn connect(url: &str) -> Result<ConnectedTransport, TransportError> {
    let (stream, _response) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(|e| TransportError::Connection(format!("connect failed: {e}")))?;

    let (to_server_tx, to_server_rx) = mpsc::channel::<ClientEvent>(32);
    let (from_server_tx, from_server_rx) = mpsc::channel::<ServerEvent>(32);

    let handle = tokio::spawn(run_connection(stream, to_server_rx, from_server_tx));

    Ok(ConnectedTransport {
        to_server: to_server_tx,
        from_server: from_server_rx,
        abort_handle: handle.abort_handle(),
    })
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Run the connection, bridging between channels and the socket.
async fn run_connection(
    stream: WsStream,
    mut to_server: mpsc::Receiver<ClientEvent>,
    from_server: mpsc::Sender<ServerEvent>,
) {
    let (mut sink, mut source) = stream.split();

    let recv_handle = tokio::spawn(async move {
        while let Some(message) = source.next().await {
            let message = match message {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!(error = %e, "socket read failed");
                    break;
                }
            };

            match message {
                Message::Text(text) => match decode_event(&text) {
                    // Dropping the channel send result: a closed receiver
                    // means the session is shutting down.
                    Ok(event) => {
                        if from_server.send(event).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "skipping undecodable event"),
                },
                Message::Close(_) => break,
                // Pings are answered by tungstenite itself.
                _ => {}
            }
        }
    });

    while let Some(event) = to_server.recv().await {
        match encode_event(&event) {
            Ok(text) => {
                if let Err(e) = sink.send(Message::Text(text)).await {
                    tracing::warn!(error = %e, "socket write failed");
                    break;
                }
            }
            Err(e) => tracing::warn!(error = %e, event = event.name(), "skipping unencodable event"),
        }
    }

    recv_handle.abort();
}

fn decode_event(text: &str) -> Result<ServerEvent, TransportError> {
    let envelope = Envelope::from_json(text)
        .map_err(|e| TransportError::Protocol(format!("envelope decode failed: {e}")))?;
    ServerEvent::from_envelope(envelope)
        .map_err(|e| TransportError::Protocol(format!("event decode failed: {e}")))
}

fn encode_event(event: &ClientEvent) -> Result<String, TransportError> {
    event
        .to_envelope()
        .to_json()
        .map_err(|e| TransportError::Protocol(format!("encode failed: {e}")))
}
