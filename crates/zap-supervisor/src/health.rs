use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use zap_ipc::Multiplexer;

/// Probe liveness over the IPC socket with a `health_check` frame.
pub async fn probe_ipc(mux: &Multiplexer, timeout: Duration) -> bool {
    mux.health_check(timeout).await.is_ok()
}

/// Probe liveness over HTTP by issuing a bare-bones `GET` against
/// `health_check_path` and checking for a `200` status line. Deliberately
/// hand-rolled rather than pulling in a full HTTP client, since the
/// supervisor only ever needs this one request shape.
pub async fn probe_http(host: &str, port: u16, path: &str, timeout: Duration) -> bool {
    let probe = async {
        let mut stream = TcpStream::connect((host, port)).await.ok()?;
        let request = format!(
            "GET {path} HTTP/1.1\r\nHost: {host}\r\nConnection: close\r\n\r\n"
        );
        stream.write_all(request.as_bytes()).await.ok()?;

        let mut buf = [0u8; 32];
        let n = stream.read(&mut buf).await.ok()?;
        let line = std::str::from_utf8(&buf[..n]).ok()?;
        Some(line.starts_with("HTTP/1.1 200") || line.starts_with("HTTP/1.0 200"))
    };

    matches!(tokio::time::timeout(timeout, probe).await, Ok(Some(true)))
}
