//! The `Transport` facade and the internal per-backend trait it dispatches to.

use zap_wire::{RawFrame, TransportError, WireEncoding};

/// Send/receive raw frames and report liveness. Implemented once per backend
/// (in-memory pair, Unix/TCP stream) and wrapped by [`Transport`].
pub(crate) trait TransportBackend: Send + Sync + 'static {
    async fn send_raw(&self, frame: RawFrame) -> Result<(), TransportError>;
    async fn recv_raw(&self) -> Result<RawFrame, TransportError>;
    fn close(&self);
    fn is_closed(&self) -> bool;
}

/// A single bidirectional IPC channel between N and S.
///
/// Every backend speaks the same `[len][payload]` frame codec from
/// `zap-wire`; only how those bytes get from one peer to the other differs.
/// The outgoing encoding (binary vs. text) is fixed per connection at
/// construction time, matching the "no mixed encodings per connection"
/// recommendation.
#[derive(Clone)]
pub enum Transport {
    #[cfg(feature = "mem")]
    Mem(crate::mem::MemTransport),
    #[cfg(feature = "stream")]
    Stream(crate::stream::StreamTransport),
}

impl Transport {
    /// Encoding this transport writes frames in.
    pub fn outgoing_encoding(&self) -> WireEncoding {
        match self {
            #[cfg(feature = "mem")]
            Transport::Mem(t) => t.outgoing_encoding(),
            #[cfg(feature = "stream")]
            Transport::Stream(t) => t.outgoing_encoding(),
        }
    }

    pub async fn send_raw(&self, frame: RawFrame) -> Result<(), TransportError> {
        match self {
            #[cfg(feature = "mem")]
            Transport::Mem(t) => TransportBackend::send_raw(t, frame).await,
            #[cfg(feature = "stream")]
            Transport::Stream(t) => TransportBackend::send_raw(t, frame).await,
        }
    }

    pub async fn recv_raw(&self) -> Result<RawFrame, TransportError> {
        match self {
            #[cfg(feature = "mem")]
            Transport::Mem(t) => TransportBackend::recv_raw(t).await,
            #[cfg(feature = "stream")]
            Transport::Stream(t) => TransportBackend::recv_raw(t).await,
        }
    }

    pub fn close(&self) {
        match self {
            #[cfg(feature = "mem")]
            Transport::Mem(t) => TransportBackend::close(t),
            #[cfg(feature = "stream")]
            Transport::Stream(t) => TransportBackend::close(t),
        }
    }

    pub fn is_closed(&self) -> bool {
        match self {
            #[cfg(feature = "mem")]
            Transport::Mem(t) => TransportBackend::is_closed(t),
            #[cfg(feature = "stream")]
            Transport::Stream(t) => TransportBackend::is_closed(t),
        }
    }

    #[cfg(feature = "mem")]
    pub fn mem_pair() -> (Self, Self) {
        let (a, b) = crate::mem::MemTransport::pair();
        (Transport::Mem(a), Transport::Mem(b))
    }

    #[cfg(feature = "stream")]
    pub fn from_unix(stream: tokio::net::UnixStream, encoding: WireEncoding) -> Self {
        Transport::Stream(crate::stream::StreamTransport::from_unix(stream, encoding))
    }

    #[cfg(feature = "stream")]
    pub fn from_tcp(stream: tokio::net::TcpStream, encoding: WireEncoding) -> Self {
        Transport::Stream(crate::stream::StreamTransport::from_tcp(stream, encoding))
    }
}
