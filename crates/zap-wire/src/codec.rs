//! Encodes/decodes `Envelope` values to and from the raw frame bytes.

use crate::envelope::Envelope;
use crate::error::TransportError;
use crate::frame::{RawFrame, WireEncoding};

/// Serialize an envelope to the bytes of a single frame payload, honoring
/// the connection's chosen outgoing encoding.
pub fn encode_envelope(envelope: &Envelope, encoding: WireEncoding) -> Vec<u8> {
    match encoding {
        WireEncoding::Binary => {
            facet_postcard::to_vec(envelope).expect("envelope always encodes to postcard")
        }
        WireEncoding::Text => {
            facet_json::to_string(envelope)
                .expect("envelope always encodes to json")
                .into_bytes()
        }
    }
}

/// Decode a raw frame payload into an envelope, using whichever form the
/// sniffed encoding says it's in.
pub fn decode_envelope(frame: &RawFrame) -> Result<Envelope, TransportError> {
    match frame.encoding {
        WireEncoding::Binary => facet_postcard::from_slice(&frame.payload)
            .map_err(|e| TransportError::Decode(e.to_string())),
        WireEncoding::Text => {
            let text = std::str::from_utf8(&frame.payload)
                .map_err(|e| TransportError::Decode(e.to_string()))?;
            facet_json::from_str(text).map_err(|e| TransportError::Decode(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trip() {
        let env = Envelope::HealthCheck;
        let bytes = encode_envelope(&env, WireEncoding::Binary);
        let frame = RawFrame::binary(bytes);
        let decoded = decode_envelope(&frame).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn text_round_trip() {
        let env = Envelope::RpcError {
            request_id: 7,
            error_type: "NotFound".into(),
            error: "no such function".into(),
        };
        let bytes = encode_envelope(&env, WireEncoding::Text);
        let frame = RawFrame::text(bytes);
        let decoded = decode_envelope(&frame).unwrap();
        assert_eq!(decoded, env);
    }
}
