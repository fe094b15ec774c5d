//! Per-connection dispatch loop: parse the request head, match it against
//! the compiled route tables, then either answer in-process (native handler,
//! health check), proxy to the script process over IPC, or upgrade to a
//! WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{error, warn};
use zap_config::MiddlewareConfig;
use zap_http::{ParseError, parse_request_head};
use zap_ipc::{IpcError, IpcResponse, Multiplexer};
use zap_router::RouteTable;
use zap_wire::{Envelope, InvocationRequest, KvPair};

use crate::metrics::Metrics;
use crate::middleware;
use crate::native_handlers::NativeHandlers;
use crate::response;
use crate::router_build::WS_METHOD;
use crate::ws::{self, WsConnections};

/// Shared, read-only state every accepted connection dispatches against.
pub struct ConnContext {
    pub http_table: RouteTable,
    pub ws_table: RouteTable,
    pub native_handlers: NativeHandlers,
    pub mux: Arc<Multiplexer>,
    pub middleware: MiddlewareConfig,
    pub max_request_body_size: usize,
    pub max_header_bytes: usize,
    pub request_timeout: Duration,
    pub ws_connections: Arc<WsConnections>,
    pub health_check_path: String,
    pub metrics_path: Option<String>,
    pub metrics: Arc<Metrics>,
}

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

fn next_request_id() -> u64 {
    NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)
}

pub async fn handle_connection(mut stream: TcpStream, ctx: Arc<ConnContext>) {
    let mut buf: Vec<u8> = Vec::with_capacity(4096);
    let mut chunk = [0u8; 4096];

    loop {
        let head_end = loop {
            match parse_request_head(&buf, ctx.max_header_bytes) {
                Ok(Some(_)) => break true,
                Ok(None) => {}
                Err(e) => {
                    let _ = write_parse_error(&mut stream, e).await;
                    return;
                }
            }
            match stream.read(&mut chunk).await {
                Ok(0) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!(error = %e, "connection read failed while waiting for headers");
                    return;
                }
            }
        };
        if !head_end {
            return;
        }

        let content_length = {
            let parsed = parse_request_head(&buf, ctx.max_header_bytes).unwrap().unwrap();
            parsed
                .header("content-length")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(0)
        };

        if content_length > ctx.max_request_body_size {
            let _ = response::write_response(&mut stream, 413, &[], b"payload too large", None).await;
            return;
        }

        let body_start = {
            let parsed = parse_request_head(&buf, ctx.max_header_bytes).unwrap().unwrap();
            parsed.body_range.start
        };
        while buf.len() < body_start + content_length {
            match stream.read(&mut chunk).await {
                Ok(0) => return,
                Ok(n) => buf.extend_from_slice(&chunk[..n]),
                Err(e) => {
                    warn!(error = %e, "connection read failed while waiting for body");
                    return;
                }
            }
        }

        let keep_alive = {
            let parsed = parse_request_head(&buf, ctx.max_header_bytes).unwrap().unwrap();
            let should_upgrade = ws::is_upgrade_request(&parsed);
            let connection_header_close = parsed
                .header("connection")
                .map(|v| v.eq_ignore_ascii_case("close"))
                .unwrap_or(false);

            if should_upgrade {
                let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
                if ctx.ws_table.lookup(WS_METHOD, parsed.path_only).is_ok() {
                    drop(parsed);
                    let parsed = parse_request_head(&buf, ctx.max_header_bytes).unwrap().unwrap();
                    let mux = ctx.mux.clone();
                    let connections = ctx.ws_connections.clone();
                    let metrics = ctx.metrics.clone();
                    if let Err(e) = ws::handle_upgrade(stream, &parsed, connection_id, mux, connections, metrics).await {
                        warn!(error = %e, "websocket upgrade failed");
                    }
                    return;
                } else {
                    drop(parsed);
                    let _ = response::write_response(&mut stream, 404, &[], b"not found", None).await;
                    return;
                }
            }

            let body_bytes = buf[body_start..body_start + content_length].to_vec();
            dispatch_http(&mut stream, &ctx, &parsed, &body_bytes).await;
            !connection_header_close
        };

        buf.drain(..body_start + content_length);
        if !keep_alive {
            return;
        }
    }
}

async fn dispatch_http(
    stream: &mut TcpStream,
    ctx: &ConnContext,
    request: &zap_http::ParsedRequest<'_>,
    body: &[u8],
) {
    let request_id = next_request_id();

    if request.path_only == ctx.health_check_path {
        ctx.metrics.record_response(200);
        let _ = response::write_response(stream, 200, &[], b"ok", Some(request_id)).await;
        return;
    }
    if ctx.metrics_path.as_deref() == Some(request.path_only) {
        ctx.metrics.record_response(200);
        let body = ctx.metrics.render();
        let headers = [("content-type".to_string(), "text/plain; version=0.0.4".to_string())];
        let _ = response::write_response(stream, 200, &headers, body.as_bytes(), Some(request_id)).await;
        return;
    }

    if let Some(headers) = middleware::cors_preflight(&ctx.middleware, request) {
        ctx.metrics.record_response(204);
        let _ = response::write_response(stream, 204, &headers, b"", Some(request_id)).await;
        return;
    }

    let route = match ctx.http_table.lookup(request.method, request.path_only) {
        Ok(route) => route,
        Err(zap_router::RoutingError::NotFound { .. }) => {
            ctx.metrics.record_response(404);
            let _ = response::write_response(stream, 404, &[], b"not found", Some(request_id)).await;
            return;
        }
        Err(zap_router::RoutingError::MethodNotAllowed { .. }) => {
            ctx.metrics.record_response(405);
            let _ = response::write_response(stream, 405, &[], b"method not allowed", Some(request_id)).await;
            return;
        }
        Err(e) => {
            error!(error = %e, "unexpected routing error");
            ctx.metrics.record_response(500);
            let _ = response::write_response(stream, 500, &[], b"internal error", Some(request_id)).await;
            return;
        }
    };

    if !route.is_script {
        let Some(handler) = ctx.native_handlers.get(&route.handler_id) else {
            error!(handler_id = %route.handler_id, "native route has no registered handler");
            ctx.metrics.record_response(500);
            let _ = response::write_response(stream, 500, &[], b"handler not registered", Some(request_id)).await;
            return;
        };
        let result = handler.call(request, body);
        let mut headers = result.headers;
        headers.extend(middleware::cors_response_headers(&ctx.middleware));
        middleware::log_request(&ctx.middleware, request.method, request.path_only, result.status, request_id);
        ctx.metrics.record_response(result.status);
        let _ = write_with_optional_compression(stream, result.status, headers, result.body, request, request_id, &ctx.middleware).await;
        return;
    }

    let invocation = InvocationRequest {
        request_id,
        method: request.method.to_string(),
        path: request.path.to_string(),
        path_only: request.path_only.to_string(),
        query: request.query.iter().map(|(k, v)| KvPair::new(*k, *v)).collect(),
        params: route.params.iter().map(|(k, v)| KvPair::new(k.clone(), v.clone())).collect(),
        headers: request.headers.iter().map(|(k, v)| KvPair::new(*k, *v)).collect(),
        cookies: request.cookies.iter().map(|(k, v)| KvPair::new(*k, *v)).collect(),
        body: std::str::from_utf8(body).ok().map(str::to_string),
        body_bytes: if std::str::from_utf8(body).is_ok() { None } else { Some(body.to_vec()) },
    };

    let envelope = Envelope::InvokeHandler {
        handler_id: route.handler_id.clone(),
        request: invocation,
    };

    let outcome = match call_with_disconnect_watch(stream, &ctx.mux, envelope, ctx.request_timeout, request_id).await {
        Some(outcome) => outcome,
        None => return,
    };

    match outcome {
        Ok(IpcResponse::Unary(Envelope::HandlerResponse { status, headers, body, .. })) => {
            let mut headers: Vec<(String, String)> = headers.into_iter().map(|kv| (kv.key, kv.value)).collect();
            headers.extend(middleware::cors_response_headers(&ctx.middleware));
            middleware::log_request(&ctx.middleware, request.method, request.path_only, status, request_id);
            ctx.metrics.record_response(status);
            let _ = write_with_optional_compression(stream, status, headers, body, request, request_id, &ctx.middleware).await;
        }
        Ok(IpcResponse::Unary(Envelope::Error { code, message })) => {
            error!(code, message, "script side reported an error");
            ctx.metrics.record_response(500);
            let _ = response::write_response(stream, 500, &[], message.as_bytes(), Some(request_id)).await;
        }
        Ok(IpcResponse::Unary(_)) => {
            error!("unexpected envelope kind answering invoke_handler");
            ctx.metrics.record_response(500);
            let _ = response::write_response(stream, 500, &[], b"internal error", Some(request_id)).await;
        }
        Ok(IpcResponse::Stream { start, chunks }) => {
            stream_response(stream, &ctx.mux, start, chunks, request_id, &ctx.metrics).await;
        }
        Err(IpcError::Timeout) => {
            ctx.metrics.record_response(504);
            let _ = response::write_response(stream, 504, &[], b"gateway timeout", Some(request_id)).await;
        }
        Err(IpcError::ChannelClosed) => {
            ctx.metrics.record_response(503);
            let _ = response::write_response(stream, 503, &[], b"script process unavailable", Some(request_id)).await;
        }
        Err(e) => {
            error!(error = %e, "ipc call failed");
            ctx.metrics.record_response(500);
            let _ = response::write_response(stream, 500, &[], b"internal error", Some(request_id)).await;
        }
    }
}

/// Race an `invoke_handler` call against the client socket going away.
/// Returns `None` if the client disconnected first, in which case the
/// in-flight call has already been cancelled locally and the script side
/// notified; the caller should write nothing more to `stream`.
async fn call_with_disconnect_watch(
    stream: &mut TcpStream,
    mux: &Multiplexer,
    envelope: Envelope,
    timeout: Duration,
    request_id: u64,
) -> Option<Result<IpcResponse, IpcError>> {
    let call = mux.call(envelope, timeout);
    tokio::pin!(call);
    let mut probe = [0u8; 1];
    loop {
        tokio::select! {
            result = &mut call => return Some(result),
            peeked = stream.peek(&mut probe) => {
                match peeked {
                    Ok(0) | Err(_) => {
                        warn!(request_id, "client disconnected with an invocation in flight, cancelling");
                        mux.cancel(request_id);
                        return None;
                    }
                    // A pipelined byte arriving before the response isn't a
                    // disconnect; stop racing and just await the call.
                    Ok(_) => return Some(call.await),
                }
            }
        }
    }
}

async fn stream_response(
    stream: &mut TcpStream,
    mux: &Multiplexer,
    start: Envelope,
    mut chunks: tokio::sync::mpsc::Receiver<Envelope>,
    request_id: u64,
    metrics: &Metrics,
) {
    let Envelope::StreamStart { status, headers, .. } = start else {
        return;
    };
    let headers: Vec<(String, String)> = headers.into_iter().map(|kv| (kv.key, kv.value)).collect();
    if response::write_chunked_head(stream, status, &headers, request_id).await.is_err() {
        return;
    }
    metrics.record_response(status);

    // Once the client sends something unexpected (it shouldn't, mid
    // response), stop racing peeks against every chunk: a peek that keeps
    // seeing the same buffered bytes would otherwise spin the select loop.
    let mut watch_for_disconnect = true;
    let mut probe = [0u8; 1];
    loop {
        let envelope = if watch_for_disconnect {
            tokio::select! {
                envelope = chunks.recv() => envelope,
                peeked = stream.peek(&mut probe) => {
                    match peeked {
                        Ok(0) | Err(_) => {
                            warn!(request_id, "client disconnected mid-stream, cancelling");
                            mux.cancel(request_id);
                            return;
                        }
                        Ok(_) => {
                            watch_for_disconnect = false;
                            continue;
                        }
                    }
                }
            }
        } else {
            chunks.recv().await
        };

        match envelope {
            Some(Envelope::StreamChunk { data, .. }) => {
                if response::write_chunk(stream, &data).await.is_err() {
                    mux.cancel(request_id);
                    return;
                }
            }
            Some(Envelope::StreamEnd { .. }) | None => break,
            Some(_) => {}
        }
    }
    let _ = response::write_last_chunk(stream).await;
}

async fn write_with_optional_compression(
    stream: &mut TcpStream,
    status: u16,
    mut headers: Vec<(String, String)>,
    body: Vec<u8>,
    request: &zap_http::ParsedRequest<'_>,
    request_id: u64,
    middleware: &MiddlewareConfig,
) -> std::io::Result<()> {
    let accept_encoding = request.header("accept-encoding");
    if let Some(compressed) = crate::middleware::maybe_compress(middleware, accept_encoding, &body) {
        headers.push(("content-encoding".to_string(), "gzip".to_string()));
        response::write_response(stream, status, &headers, &compressed, Some(request_id)).await
    } else {
        response::write_response(stream, status, &headers, &body, Some(request_id)).await
    }
}

async fn write_parse_error(stream: &mut TcpStream, err: ParseError) -> std::io::Result<()> {
    let status = err.status_code();
    response::write_response(stream, status, &[], err.to_string().as_bytes(), None).await?;
    stream.shutdown().await
}
