//! Wires a script-side [`HandlerRegistry`] and a native-side [`Multiplexer`]
//! together over an in-memory [`Transport`] pair, running the script event
//! loop as a background task so integration tests can drive the native side
//! exactly as `zap-native` would: `mux.call(InvokeHandler { .. })` and
//! inspect what comes back.

use std::sync::Arc;
use std::time::Duration;

use zap_ipc::{IpcError, IpcResponse, Multiplexer};
use zap_registry::HandlerRegistry;
use zap_transport::Transport;
use zap_wire::{Envelope, InvocationRequest};

/// Default timeout used by [`Harness::invoke`], generous enough that a slow
/// CI runner doesn't produce a flaky [`IpcError::Timeout`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Harness {
    pub native_mux: Arc<Multiplexer>,
    pub registry: Arc<HandlerRegistry>,
    script_mux: Arc<Multiplexer>,
}

impl Harness {
    /// Spin up the pair and start draining the script side's inbound
    /// channel, dispatching every `invoke_handler`/`ws_*` envelope against
    /// `registry`.
    pub fn spawn(registry: HandlerRegistry) -> Self {
        let (native_transport, script_transport) = Transport::mem_pair();
        let native_mux = Arc::new(Multiplexer::spawn(native_transport));
        let script_mux = Arc::new(Multiplexer::spawn(script_transport));
        let registry = Arc::new(registry);

        tokio::spawn(zap_script::drive_inbound(script_mux.clone(), registry.clone()));

        Self { native_mux, registry, script_mux }
    }

    /// Call a handler by id as `zap-native` would for a script-kind route,
    /// returning the decoded status/headers/body on a unary response.
    pub async fn invoke(
        &self,
        handler_id: &str,
        request: InvocationRequest,
    ) -> Result<(u16, Vec<(String, String)>, Vec<u8>), IpcError> {
        let envelope = Envelope::InvokeHandler { handler_id: handler_id.to_string(), request };
        match self.native_mux.call(envelope, DEFAULT_TIMEOUT).await? {
            IpcResponse::Unary(Envelope::HandlerResponse { status, headers, body, .. }) => {
                Ok((status, headers.into_iter().map(|kv| (kv.key, kv.value)).collect(), body))
            }
            IpcResponse::Unary(other) => {
                Err(IpcError::PeerError {
                    code: "unexpected_response".to_string(),
                    message: format!("{other:?}"),
                })
            }
            IpcResponse::Stream { .. } => Err(IpcError::PeerError {
                code: "unexpected_stream".to_string(),
                message: "invoke() does not drain streaming responses, use invoke_stream".to_string(),
            }),
        }
    }

    /// Call a streaming handler, returning the `stream_start` status/headers
    /// plus every `stream_chunk` payload concatenated in arrival order.
    pub async fn invoke_stream(
        &self,
        handler_id: &str,
        request: InvocationRequest,
    ) -> Result<(u16, Vec<(String, String)>, Vec<u8>), IpcError> {
        let envelope = Envelope::InvokeHandler { handler_id: handler_id.to_string(), request };
        match self.native_mux.call(envelope, DEFAULT_TIMEOUT).await? {
            IpcResponse::Stream { start, mut chunks } => {
                let Envelope::StreamStart { status, headers, .. } = start else {
                    unreachable!("IpcResponse::Stream always carries a StreamStart");
                };
                let mut body = Vec::new();
                while let Some(envelope) = chunks.recv().await {
                    match envelope {
                        Envelope::StreamChunk { data, .. } => body.extend_from_slice(&data),
                        Envelope::StreamEnd { .. } => break,
                        _ => {}
                    }
                }
                Ok((status, headers.into_iter().map(|kv| (kv.key, kv.value)).collect(), body))
            }
            IpcResponse::Unary(other) => Err(IpcError::PeerError {
                code: "unexpected_unary".to_string(),
                message: format!("{other:?}"),
            }),
        }
    }

    pub fn shutdown(&self) {
        self.native_mux.shutdown();
        self.script_mux.shutdown();
    }
}

/// Build a bare-bones [`InvocationRequest`] for tests that don't care about
/// headers, query params or cookies.
pub fn blank_request(request_id: u64, method: &str, path: &str) -> InvocationRequest {
    InvocationRequest {
        request_id,
        method: method.to_string(),
        path: path.to_string(),
        path_only: path.to_string(),
        query: vec![],
        params: vec![],
        headers: vec![],
        cookies: vec![],
        body: None,
        body_bytes: None,
    }
}
