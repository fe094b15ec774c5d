//! Length-prefixed frame codec.
//!
//! A frame on the wire is `[4-byte big-endian length][payload]`. The payload
//! encoding is auto-detected by its first byte: `{` (`0x7B`) means text/JSON,
//! anything else means the binary packed form (postcard). There is no
//! handshake; each peer simply accepts both forms on read, and picks one
//! form to write for the lifetime of the connection.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::TransportError;

/// Maximum payload size for a single frame. Anything larger must be carried
/// as a sequence of `stream_chunk` envelopes instead.
pub const MAX_FRAME_LEN: u64 = 100 * 1024 * 1024;

const LEN_PREFIX_BYTES: usize = 4;
const TEXT_SNIFF_BYTE: u8 = b'{';

/// Which payload encoding a connection writes. Both peers always *read*
/// either form; this only controls what gets written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireEncoding {
    Binary,
    Text,
}

impl Default for WireEncoding {
    fn default() -> Self {
        WireEncoding::Binary
    }
}

/// The raw bytes of one frame's payload, tagged with the encoding it was
/// read in (or is about to be written in).
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub encoding: WireEncoding,
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn binary(payload: Vec<u8>) -> Self {
        Self {
            encoding: WireEncoding::Binary,
            payload,
        }
    }

    pub fn text(payload: Vec<u8>) -> Self {
        Self {
            encoding: WireEncoding::Text,
            payload,
        }
    }

    fn sniff(payload: &[u8]) -> WireEncoding {
        match payload.first() {
            Some(&TEXT_SNIFF_BYTE) => WireEncoding::Text,
            _ => WireEncoding::Binary,
        }
    }
}

/// Write a single frame to `writer`. Frame boundaries are never merged or
/// split by this call even if the peer pipelines several writes back to
/// back -- each call is exactly one `send`/`write_all` pair under the hood.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), TransportError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let len = payload.len() as u64;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }
    let mut header = [0u8; LEN_PREFIX_BYTES];
    header.copy_from_slice(&(len as u32).to_be_bytes());
    writer.write_all(&header).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Read a single frame from `reader`. A clean EOF while reading the length
/// prefix (zero bytes available) is `TransportError::Closed`; a truncated
/// frame (length prefix read, but payload cut short) is also `Closed`,
/// matching a mid-frame peer disconnect rather than a protocol violation.
pub async fn read_frame<R>(reader: &mut R) -> Result<RawFrame, TransportError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut header = [0u8; LEN_PREFIX_BYTES];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::Closed);
        }
        Err(e) => return Err(TransportError::Io(e)),
    }

    let len = u32::from_be_bytes(header) as u64;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::FrameTooLarge {
            len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len as usize];
    match reader.read_exact(&mut payload).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(TransportError::Closed);
        }
        Err(e) => return Err(TransportError::Io(e)),
    }

    let encoding = RawFrame::sniff(&payload);
    Ok(RawFrame { encoding, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_binary_frame() {
        let mut buf = Vec::new();
        write_frame(&mut buf, &[0x01, 0x02, 0x03]).await.unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.encoding, WireEncoding::Binary);
        assert_eq!(frame.payload, vec![0x01, 0x02, 0x03]);
    }

    #[tokio::test]
    async fn sniffs_text_frames_by_leading_brace() {
        let mut buf = Vec::new();
        write_frame(&mut buf, br#"{"type":"health_check"}"#)
            .await
            .unwrap();
        let mut cursor = std::io::Cursor::new(buf);
        let frame = read_frame(&mut cursor).await.unwrap();
        assert_eq!(frame.encoding, WireEncoding::Text);
    }

    #[tokio::test]
    async fn rejects_oversized_frames_on_write() {
        // Don't actually allocate 100MiB+1 bytes; fake a too-large claim by
        // writing the header directly with a bogus length and exercising the
        // reader's own bound check instead.
        let mut buf = Vec::new();
        buf.extend_from_slice(&((MAX_FRAME_LEN + 1) as u32).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[tokio::test]
    async fn clean_eof_before_any_bytes_is_closed_not_error() {
        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn truncated_payload_on_clean_close_is_closed_not_error() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&10u32.to_be_bytes());
        buf.extend_from_slice(b"short");
        let mut cursor = std::io::Cursor::new(buf);
        let err = read_frame(&mut cursor).await.unwrap_err();
        assert!(err.is_closed());
    }
}
