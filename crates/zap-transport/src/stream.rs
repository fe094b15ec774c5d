//! Unix-domain-socket transport, with loopback TCP as a fallback on
//! platforms that don't have Unix sockets. Both speak the exact same frame
//! codec; only how the byte stream is obtained differs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::Mutex;
use zap_wire::{read_frame, write_frame, RawFrame, TransportError, WireEncoding};

use crate::backend::TransportBackend;

type BoxRead = Box<dyn AsyncRead + Unpin + Send>;
type BoxWrite = Box<dyn AsyncWrite + Unpin + Send>;

/// A Unix-socket or loopback-TCP byte stream, wrapped with the frame codec.
///
/// One reader task and one writer task own this connection; both directions
/// are serialized through their own `Mutex` so pipelined sends/receives
/// never interleave partial frames.
#[derive(Clone)]
pub struct StreamTransport {
    inner: Arc<Inner>,
}

struct Inner {
    reader: Mutex<BoxRead>,
    writer: Mutex<BoxWrite>,
    closed: AtomicBool,
    encoding: WireEncoding,
}

impl StreamTransport {
    pub fn from_unix(stream: UnixStream, encoding: WireEncoding) -> Self {
        let (r, w) = stream.into_split();
        Self::new(Box::new(r), Box::new(w), encoding)
    }

    pub fn from_tcp(stream: TcpStream, encoding: WireEncoding) -> Self {
        stream.set_nodelay(true).ok();
        let (r, w) = stream.into_split();
        Self::new(Box::new(r), Box::new(w), encoding)
    }

    fn new(reader: BoxRead, writer: BoxWrite, encoding: WireEncoding) -> Self {
        Self {
            inner: Arc::new(Inner {
                reader: Mutex::new(reader),
                writer: Mutex::new(writer),
                closed: AtomicBool::new(false),
                encoding,
            }),
        }
    }

    pub fn outgoing_encoding(&self) -> WireEncoding {
        self.inner.encoding
    }
}

impl TransportBackend for StreamTransport {
    async fn send_raw(&self, frame: RawFrame) -> Result<(), TransportError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let mut writer = self.inner.writer.lock().await;
        write_frame(&mut *writer, &frame.payload).await
    }

    async fn recv_raw(&self) -> Result<RawFrame, TransportError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let mut reader = self.inner.reader.lock().await;
        read_frame(&mut *reader).await
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unix_socket_round_trip() {
        let dir = tempdir();
        let path = dir.join("zap-test.sock");
        let listener = tokio::net::UnixListener::bind(&path).unwrap();

        let accept = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            StreamTransport::from_unix(stream, WireEncoding::Binary)
        });

        let client = StreamTransport::from_unix(
            UnixStream::connect(&path).await.unwrap(),
            WireEncoding::Binary,
        );
        let server = accept.await.unwrap();

        client
            .send_raw(RawFrame::binary(vec![9, 8, 7]))
            .await
            .unwrap();
        let got = server.recv_raw().await.unwrap();
        assert_eq!(got.payload, vec![9, 8, 7]);

        let _ = std::fs::remove_file(&path);
    }

    fn tempdir() -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("zap-transport-test-{}", std::process::id()));
        std::fs::create_dir_all(&p).unwrap();
        p
    }
}
