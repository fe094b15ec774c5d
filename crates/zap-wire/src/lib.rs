//! Wire-level types shared by the native (`N`) and script (`S`) peers:
//! the frame codec, and the envelope schema that rides inside each frame.

mod codec;
mod envelope;
mod error;
mod frame;

pub use codec::{decode_envelope, encode_envelope};
pub use envelope::{Envelope, HandlerResponsePayload, InvocationRequest, KvPair};
pub use error::TransportError;
pub use frame::{read_frame, write_frame, RawFrame, WireEncoding, MAX_FRAME_LEN};
