use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use zap_ipc::Multiplexer;
use zap_router::RouteTable;
use zap_wire::{Envelope, KvPair};

use crate::error::HandlerError;
use crate::outcome::{Handler, WsCallbacks, kv_pairs};

/// The pseudo HTTP method WebSocket-kind routes are compiled under, so they
/// can share the same radix tree machinery as ordinary routes.
pub const WS_METHOD: &str = "WS";

/// The synthetic close code N sends on a transport-level read failure (see
/// `zap-native`'s WS pump), as opposed to a client-initiated close frame.
/// Used to decide whether `on_error` fires ahead of `on_close`.
const TRANSPORT_ERROR_CLOSE_CODE: u16 = 1006;

/// Script-side registry: `handler_id -> callable` for ordinary invocations,
/// plus a disjoint `handler_id -> websocket callbacks` map. Rebuilt after a
/// full reload; read from the single event loop that also owns the pending
/// maps, so no internal locking beyond the sharded maps themselves.
pub struct HandlerRegistry {
    handlers: DashMap<String, Arc<dyn Handler>>,
    ws_handlers: DashMap<String, Arc<dyn WsCallbacks>>,
    ws_routes: Option<RouteTable>,
    /// Which `handler_id` owns a live connection, so `ws_message`/`ws_close`
    /// don't need to re-run route matching.
    ws_connections: DashMap<u64, String>,
    /// Cancellation flags for in-flight streams, keyed by `stream_id`.
    /// Set by [`HandlerRegistry::cancel_invocation`] when N reports the
    /// client disconnected; polled by `run_stream` between chunks.
    cancellations: DashMap<u64, Arc<AtomicBool>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: DashMap::new(),
            ws_handlers: DashMap::new(),
            ws_routes: None,
            ws_connections: DashMap::new(),
            cancellations: DashMap::new(),
        }
    }

    /// Handle a `cancel_invocation` frame from N: flag the matching
    /// in-flight stream so its producer loop stops at the next chunk
    /// boundary. A no-op if the invocation already finished or was never a
    /// stream (a plain unary handler has usually already returned by the
    /// time this arrives).
    pub fn cancel_invocation(&self, request_id: u64) {
        if let Some(flag) = self.cancellations.get(&request_id) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    pub fn register(&self, handler_id: impl Into<String>, handler: impl Handler + 'static) {
        self.handlers.insert(handler_id.into(), Arc::new(handler));
    }

    pub fn register_ws(&self, handler_id: impl Into<String>, callbacks: impl WsCallbacks + 'static) {
        self.ws_handlers.insert(handler_id.into(), Arc::new(callbacks));
    }

    /// Install the compiled table used to resolve a `ws_connect` path to a
    /// registered handler id. Built by the same configuration pass that
    /// compiles the native router's WS routes under [`WS_METHOD`].
    pub fn set_ws_routes(&mut self, table: RouteTable) {
        self.ws_routes = Some(table);
    }

    /// Handle one `invoke_handler` frame: run the matching callable and
    /// send back a `handler_response`, or drive a `stream_start` /
    /// `stream_chunk*` / `stream_end` run for a streaming outcome.
    pub async fn invoke(&self, envelope: Envelope, mux: &Multiplexer) {
        let (handler_id, request) = match envelope {
            Envelope::InvokeHandler { handler_id, request } => (handler_id, request),
            _ => return,
        };
        let request_id = request.request_id;

        let Some(handler) = self.handlers.get(&handler_id).map(|entry| entry.value().clone()) else {
            warn!(handler_id, "invoke_handler for unregistered handler");
            let _ = mux.send(error_response(request_id, &handler_id, HandlerError::NotFound(handler_id.clone())));
            return;
        };

        match handler.call(request).await {
            Ok(crate::outcome::HandlerOutcome::Stream { status, headers, chunks }) => {
                self.run_stream(request_id, status, headers, chunks, mux).await;
            }
            Ok(outcome) => match outcome.into_response() {
                Ok(shaped) => {
                    let _ = mux.send(Envelope::HandlerResponse {
                        handler_id: handler_id.clone(),
                        request_id,
                        status: shaped.status,
                        headers: kv_pairs(&shaped.headers),
                        body: shaped.body,
                    });
                }
                Err(e) => {
                    let _ = mux.send(error_response(request_id, &handler_id, e));
                }
            },
            Err(e) => {
                debug!(handler_id, error = %e, "handler execution failed");
                let _ = mux.send(error_response(request_id, &handler_id, e));
            }
        }
    }

    async fn run_stream(
        &self,
        stream_id: u64,
        status: u16,
        headers: Vec<(String, String)>,
        mut chunks: crate::outcome::ChunkStream,
        mux: &Multiplexer,
    ) {
        if mux
            .send(Envelope::StreamStart {
                stream_id,
                status,
                headers: kv_pairs(&headers),
            })
            .is_err()
        {
            return;
        }

        let cancel_flag = Arc::new(AtomicBool::new(false));
        self.cancellations.insert(stream_id, cancel_flag.clone());

        let mut cancelled = false;
        while let Some(item) = chunks.next().await {
            if cancel_flag.load(Ordering::Relaxed) {
                debug!(stream_id, "stream cancelled by client disconnect, stopping producer");
                cancelled = true;
                break;
            }
            match item {
                Ok(data) => {
                    if mux.send(Envelope::StreamChunk { stream_id, data }).is_err() {
                        cancelled = true;
                        break;
                    }
                }
                Err(e) => {
                    warn!(stream_id, error = %e, "stream producer errored mid-stream");
                    cancelled = true;
                    break;
                }
            }
        }

        self.cancellations.remove(&stream_id);
        let _ = mux.send(Envelope::StreamEnd { stream_id, cancelled });
    }

    /// Handle a `ws_connect` frame: resolve `path` against the WS route
    /// table, remember the connection, and notify the handler.
    pub fn ws_connect(&self, connection_id: u64, path: &str, headers: &[KvPair]) {
        let Some(table) = &self.ws_routes else {
            warn!("ws_connect received with no WS route table installed");
            return;
        };
        let Ok(hit) = table.lookup(WS_METHOD, path) else {
            warn!(path, "ws_connect for unmatched path");
            return;
        };
        let Some(callbacks) = self.ws_handlers.get(&hit.handler_id).map(|entry| entry.value().clone()) else {
            warn!(handler_id = %hit.handler_id, "ws route matched but no callbacks registered");
            return;
        };
        self.ws_connections.insert(connection_id, hit.handler_id.clone());
        let headers: Vec<(String, String)> = headers.iter().map(|kv| (kv.key.clone(), kv.value.clone())).collect();
        callbacks.on_connect(connection_id, path, &headers);
    }

    pub fn ws_message(&self, connection_id: u64, data: &[u8], binary: bool) {
        if let Some(callbacks) = self.ws_callbacks_for(connection_id) {
            callbacks.on_message(connection_id, data, binary);
        }
    }

    pub fn ws_close(&self, connection_id: u64, code: u16, reason: &str) {
        if let Some(callbacks) = self.ws_callbacks_for(connection_id) {
            if code == TRANSPORT_ERROR_CLOSE_CODE {
                callbacks.on_error(connection_id, reason);
            }
            callbacks.on_close(connection_id, code, reason);
        }
        self.ws_connections.remove(&connection_id);
    }

    fn ws_callbacks_for(&self, connection_id: u64) -> Option<Arc<dyn WsCallbacks>> {
        let handler_id = self.ws_connections.get(&connection_id)?.value().clone();
        self.ws_handlers.get(&handler_id).map(|entry| entry.value().clone())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn error_response(request_id: u64, handler_id: &str, err: HandlerError) -> Envelope {
    let status = match err {
        HandlerError::NotFound(_) => 404,
        HandlerError::Execution(_) => 500,
        HandlerError::InvalidResponseShape => 500,
    };
    Envelope::HandlerResponse {
        handler_id: handler_id.to_string(),
        request_id,
        status,
        headers: vec![KvPair::new("content-type", "text/plain")],
        body: err.to_string().into_bytes(),
    }
}
