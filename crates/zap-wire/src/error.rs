use thiserror::Error;

/// Errors raised while framing or transporting bytes between the two peers.
///
/// These never carry HTTP semantics themselves; the dispatcher is responsible
/// for translating a `TransportError` into a status code.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("frame of {len} bytes exceeds the {max} byte cap")]
    FrameTooLarge { len: u64, max: u64 },

    #[error("malformed frame payload: {0}")]
    Decode(String),

    #[error("transport closed")]
    Closed,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Clean EOF between frames, or a truncated frame on a clean shutdown, is
    /// reported as `Closed` rather than as a decode failure.
    pub fn is_closed(&self) -> bool {
        matches!(self, TransportError::Closed)
    }
}
