//! The envelope types that cross the IPC socket.
//!
//! These mirror the message schemas in the wire format section of the
//! protocol: one `Envelope` variant per frame `type`. Every variant is
//! (de)serializable both as postcard (binary, preferred) and as JSON (text,
//! fallback) through the same `Facet` derive -- the wire code picks the
//! format, these types don't know which one is in play.

use facet::Facet;

/// A single header/query/cookie key-value pair. Kept as an explicit struct
/// (rather than a tuple) because tuples don't play well with declarative
/// schema reflection across both postcard and JSON.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: String,
    pub value: String,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A decoded HTTP request, as it crosses the IPC boundary to a script
/// handler. Unlike the native-side zero-copy parse, everything here is
/// owned: it has to survive a trip through the frame codec.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub request_id: u64,
    pub method: String,
    /// Full path including the query string.
    pub path: String,
    /// Path with the query string stripped.
    pub path_only: String,
    pub query: Vec<KvPair>,
    pub params: Vec<KvPair>,
    pub headers: Vec<KvPair>,
    pub cookies: Vec<KvPair>,
    /// Body decoded as UTF-8 when possible; `None` for binary/non-UTF-8
    /// bodies, in which case `body_bytes` carries the raw payload.
    pub body: Option<String>,
    pub body_bytes: Option<Vec<u8>>,
}

/// The response a script handler hands back for a single invocation.
#[derive(Facet, Debug, Clone, PartialEq, Eq)]
pub struct HandlerResponsePayload {
    pub status: u16,
    pub headers: Vec<KvPair>,
    pub body: Vec<u8>,
}

/// One frame on the wire. `type` in the spec's JSON schemas corresponds to
/// the enum variant name (lower_snake_case on the wire via the facet JSON
/// tagging convention).
#[derive(Facet, Debug, Clone, PartialEq)]
#[repr(u8)]
pub enum Envelope {
    InvokeHandler {
        handler_id: String,
        request: InvocationRequest,
    },
    HandlerResponse {
        handler_id: String,
        request_id: u64,
        status: u16,
        headers: Vec<KvPair>,
        body: Vec<u8>,
    },
    Error {
        code: String,
        message: String,
    },
    HealthCheck,
    HealthCheckResponse,
    RpcCall {
        request_id: u64,
        function_name: String,
        params: Vec<u8>,
    },
    RpcResponse {
        request_id: u64,
        result: Vec<u8>,
    },
    RpcError {
        request_id: u64,
        error_type: String,
        error: String,
    },
    StreamStart {
        stream_id: u64,
        status: u16,
        headers: Vec<KvPair>,
    },
    StreamChunk {
        stream_id: u64,
        data: Vec<u8>,
    },
    StreamEnd {
        stream_id: u64,
        /// Set when the stream ended because the client disconnected rather
        /// than because the producer finished normally.
        cancelled: bool,
    },
    WsConnect {
        connection_id: u64,
        path: String,
        headers: Vec<KvPair>,
    },
    WsMessage {
        connection_id: u64,
        data: Vec<u8>,
        binary: bool,
    },
    WsSend {
        connection_id: u64,
        data: Vec<u8>,
        binary: bool,
    },
    WsClose {
        connection_id: u64,
        code: u16,
        reason: String,
    },
    /// Sent by N when it observes the client HTTP connection disconnect
    /// while an `invoke_handler` call or stream is still in flight. One-way:
    /// the script side stops producing, it doesn't reply.
    CancelInvocation {
        request_id: u64,
    },
}

impl Envelope {
    /// The `request_id`/`stream_id`/`connection_id` this envelope correlates
    /// against, where applicable. Used by the multiplexer to route frames
    /// without a separate dispatch table per variant.
    pub fn correlation_id(&self) -> Option<u64> {
        match self {
            Envelope::HandlerResponse { request_id, .. }
            | Envelope::RpcCall { request_id, .. }
            | Envelope::RpcResponse { request_id, .. }
            | Envelope::RpcError { request_id, .. } => Some(*request_id),
            Envelope::StreamStart { stream_id, .. }
            | Envelope::StreamChunk { stream_id, .. }
            | Envelope::StreamEnd { stream_id, .. } => Some(*stream_id),
            Envelope::WsConnect { connection_id, .. }
            | Envelope::WsMessage { connection_id, .. }
            | Envelope::WsSend { connection_id, .. }
            | Envelope::WsClose { connection_id, .. } => Some(*connection_id),
            Envelope::InvokeHandler { request, .. } => Some(request.request_id),
            Envelope::CancelInvocation { request_id } => Some(*request_id),
            Envelope::Error { .. } | Envelope::HealthCheck | Envelope::HealthCheckResponse => None,
        }
    }
}
