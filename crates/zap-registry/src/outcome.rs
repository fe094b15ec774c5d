use std::future::Future;
use std::pin::Pin;

use futures_core::Stream;
use zap_wire::{InvocationRequest, KvPair};

use crate::error::HandlerError;

/// A single `{status, headers, body}` passed through unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// One item of a streaming response body.
pub type Chunk = Vec<u8>;

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, HandlerError>> + Send>>;

/// The shape a handler's return value takes, before normalization into a
/// `handler_response` (or `stream_start`/`stream_chunk`/`stream_end` run).
pub enum HandlerOutcome {
    /// A plain value, serialized as `application/json`.
    Value(serde_json::Value),
    /// A bare string, served as `text/plain`.
    Text(String),
    /// An explicit `{status, headers, body}`, passed straight through.
    Shaped(ShapedResponse),
    /// A lazy finite sequence of chunks with a status/headers prelude.
    Stream {
        status: u16,
        headers: Vec<(String, String)>,
        chunks: ChunkStream,
    },
}

impl HandlerOutcome {
    pub(crate) fn into_response(self) -> Result<ShapedResponse, HandlerError> {
        match self {
            HandlerOutcome::Value(value) => {
                let body = serde_json::to_vec(&value).map_err(|_| HandlerError::InvalidResponseShape)?;
                Ok(ShapedResponse {
                    status: 200,
                    headers: vec![("content-type".to_string(), "application/json".to_string())],
                    body,
                })
            }
            HandlerOutcome::Text(text) => Ok(ShapedResponse {
                status: 200,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: text.into_bytes(),
            }),
            HandlerOutcome::Shaped(shaped) => Ok(shaped),
            HandlerOutcome::Stream { .. } => Err(HandlerError::InvalidResponseShape),
        }
    }
}

pub(crate) fn kv_pairs(pairs: &[(String, String)]) -> Vec<KvPair> {
    pairs
        .iter()
        .map(|(k, v)| KvPair::new(k.clone(), v.clone()))
        .collect()
}

type HandlerFuture = Pin<Box<dyn Future<Output = Result<HandlerOutcome, HandlerError>> + Send>>;

/// An opaque script-side callable. The registry never reasons about a
/// handler's internal signature; it only awaits this one entry point.
pub trait Handler: Send + Sync {
    fn call(&self, request: InvocationRequest) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(InvocationRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<HandlerOutcome, HandlerError>> + Send + 'static,
{
    fn call(&self, request: InvocationRequest) -> HandlerFuture {
        Box::pin((self)(request))
    }
}

/// Callbacks for a WebSocket-kind route. Mirrors the native side's
/// connection lifecycle: connect, inbound message, close, and a catch-all
/// for connection-level errors.
pub trait WsCallbacks: Send + Sync {
    fn on_connect(&self, connection_id: u64, path: &str, headers: &[(String, String)]);
    fn on_message(&self, connection_id: u64, data: &[u8], binary: bool);
    fn on_close(&self, connection_id: u64, code: u16, reason: &str);
    /// Fired ahead of `on_close` for a connection-level error -- a transport
    /// read failure rather than a clean client-initiated close frame.
    fn on_error(&self, connection_id: u64, message: &str);
}
