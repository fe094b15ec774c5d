use std::path::Path;

use tokio::net::UnixListener;
use tracing::info;
use zap_transport::{Transport, unlink_stale_socket};
use zap_wire::WireEncoding;

/// Bind the well-known socket path the native peer will dial back into.
/// Unlinks a stale file left behind by an unclean previous shutdown first.
pub fn bind(socket_path: &Path) -> std::io::Result<UnixListener> {
    unlink_stale_socket(socket_path)?;
    UnixListener::bind(socket_path)
}

/// Accept exactly one connection -- the native peer dialing in -- and wrap
/// it as the outgoing-binary `Transport` the multiplexer runs over.
pub async fn accept_one(listener: &UnixListener) -> std::io::Result<Transport> {
    let (stream, _addr) = listener.accept().await?;
    info!("native peer connected over the ipc socket");
    Ok(Transport::from_unix(stream, WireEncoding::Binary))
}
