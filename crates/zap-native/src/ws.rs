//! WebSocket passthrough. This is deliberately outside the N<->S
//! [`zap_transport::Transport`] enum: the browser-facing socket is always a
//! plain TCP connection accepted by the HTTP listener, upgraded in place once
//! the handshake completes. Only the resulting `ws_connect`/`ws_message`/
//! `ws_close` events cross the IPC socket to the script side.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use sha1::{Digest, Sha1};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::{Role, WebSocketConfig};
use zap_http::ParsedRequest;
use zap_ipc::Multiplexer;
use zap_wire::{Envelope, KvPair};

use crate::metrics::Metrics;

/// The fixed GUID RFC 6455 defines for computing `Sec-WebSocket-Accept`.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// An event pushed from the script side to a specific open browser socket.
pub enum WsServerEvent {
    Send { data: Vec<u8>, binary: bool },
    Close { code: u16, reason: String },
}

/// Tracks the sender half for every currently-upgraded connection, so the
/// inbound IPC dispatch loop can route a `ws_send`/`ws_close` envelope by
/// `connection_id` without knowing anything about the underlying socket.
#[derive(Default)]
pub struct WsConnections {
    senders: DashMap<u64, mpsc::UnboundedSender<WsServerEvent>>,
}

impl WsConnections {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&self, connection_id: u64, event: WsServerEvent) {
        if let Some(tx) = self.senders.get(&connection_id) {
            let _ = tx.send(event);
        }
    }

    fn register(&self, connection_id: u64) -> mpsc::UnboundedReceiver<WsServerEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.insert(connection_id, tx);
        rx
    }

    fn remove(&self, connection_id: u64) {
        self.senders.remove(&connection_id);
    }
}

/// Whether a parsed request head carries the headers that mark it as a
/// WebSocket upgrade request.
pub fn is_upgrade_request(request: &ParsedRequest<'_>) -> bool {
    let upgrade = request.header("upgrade").map(|v| v.eq_ignore_ascii_case("websocket"));
    let connection_has_upgrade = request
        .header("connection")
        .map(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("upgrade")));
    upgrade.unwrap_or(false) && connection_has_upgrade.unwrap_or(false)
}

/// Compute the `Sec-WebSocket-Accept` header value for a given
/// `Sec-WebSocket-Key`, per RFC 6455 section 4.2.2.
pub fn accept_key(client_key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(client_key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Complete the handshake by writing the `101 Switching Protocols` response,
/// then hand the raw socket over to tokio-tungstenite and run the
/// bidirectional pump until either side closes.
pub async fn handle_upgrade(
    mut stream: TcpStream,
    request: &ParsedRequest<'_>,
    connection_id: u64,
    mux: Arc<Multiplexer>,
    connections: Arc<WsConnections>,
    metrics: Arc<Metrics>,
) -> std::io::Result<()> {
    let Some(client_key) = request.header("sec-websocket-key") else {
        return Err(std::io::Error::other("missing sec-websocket-key"));
    };
    let accept = accept_key(client_key);

    let response = format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\r\n"
    );
    tokio::io::AsyncWriteExt::write_all(&mut stream, response.as_bytes()).await?;

    let path = request.path_only.to_string();
    let headers = request
        .headers
        .iter()
        .map(|(k, v)| KvPair::new(*k, *v))
        .collect();

    let ws = WebSocketStream::from_raw_socket(
        stream,
        Role::Server,
        Some(WebSocketConfig::default()),
    )
    .await;

    let _ = mux.send(Envelope::WsConnect { connection_id, path, headers });
    metrics.ws_connected();

    let mut outbound = connections.register(connection_id);
    let (mut write, mut read) = ws.split();

    let pump = async {
        loop {
            tokio::select! {
                incoming = read.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            let _ = mux.send(Envelope::WsMessage {
                                connection_id,
                                data: text.as_bytes().to_vec(),
                                binary: false,
                            });
                        }
                        Some(Ok(Message::Binary(data))) => {
                            let _ = mux.send(Envelope::WsMessage {
                                connection_id,
                                data: data.to_vec(),
                                binary: true,
                            });
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (f.code.into(), f.reason.to_string()))
                                .unwrap_or((1000, String::new()));
                            let _ = mux.send(Envelope::WsClose { connection_id, code, reason });
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => {
                            let _ = mux.send(Envelope::WsClose {
                                connection_id,
                                code: 1006,
                                reason: "transport error".to_string(),
                            });
                            break;
                        }
                    }
                }
                event = outbound.recv() => {
                    match event {
                        Some(WsServerEvent::Send { data, binary }) => {
                            let message = if binary {
                                Message::Binary(data.into())
                            } else {
                                Message::Text(String::from_utf8_lossy(&data).into_owned().into())
                            };
                            if write.send(message).await.is_err() {
                                break;
                            }
                        }
                        Some(WsServerEvent::Close { code, reason }) => {
                            let frame = tokio_tungstenite::tungstenite::protocol::CloseFrame {
                                code: code.into(),
                                reason: reason.into(),
                            };
                            let _ = write.send(Message::Close(Some(frame))).await;
                            break;
                        }
                        None => break,
                    }
                }
            }
        }
    };

    pump.await;
    connections.remove(connection_id);
    metrics.ws_disconnected();
    Ok(())
}
