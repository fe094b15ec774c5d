//! Zero-copy parsing of the HTTP/1.1 request head. Every slice in a
//! [`ParsedRequest`] borrows from the buffer it was parsed from; nothing is
//! allocated beyond the small header/query/cookie vectors.

mod error;
mod request;

pub use error::ParseError;
pub use request::{MAX_HEADERS, ParsedRequest, parse_request_head};
