mod cli;
mod connection;
mod metrics;
mod middleware;
mod native_handlers;
mod response;
mod router_build;
mod ws;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use zap_config::Config;
use zap_ipc::Multiplexer;
use zap_rpc::{RpcDispatcher, RpcError, handle_rpc_call};
use zap_transport::Transport;
use zap_wire::{Envelope, WireEncoding};

use crate::connection::ConnContext;
use crate::metrics::Metrics;
use crate::native_handlers::NativeHandlers;
use crate::ws::{WsConnections, WsServerEvent};

/// Cap on the buffered request-head size, distinct from `httparse`'s own
/// per-request header count limit. Not currently exposed in the
/// configuration record, so a single generous constant stands in for it.
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// No native RPC functions ship with the core; an embedding application
/// wires its own dispatcher in where this type is constructed.
struct NoRpcFunctions;

impl RpcDispatcher for NoRpcFunctions {
    fn dispatch(&self, function_name: &str, _params: &[u8]) -> Result<Vec<u8>, RpcError> {
        Err(RpcError::NotFound(function_name.to_string()))
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = cli::Cli::parse();
    cli::init_tracing(cli.log_level.as_deref());

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, path = %cli.config.display(), "failed to load configuration");
            return std::process::ExitCode::from(2);
        }
    };
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(hostname) = cli.hostname.clone() {
        config.hostname = hostname;
    }

    let (http_table, ws_table) = match router_build::compile(&config) {
        Ok(tables) => tables,
        Err(e) => {
            error!(error = %e, "failed to compile route table");
            return std::process::ExitCode::from(2);
        }
    };

    let transport = match connect_to_script(&cli.socket).await {
        Ok(transport) => transport,
        Err(e) => {
            error!(error = %e, socket = %cli.socket.display(), "failed to connect to script process");
            return std::process::ExitCode::from(3);
        }
    };
    let mux = Arc::new(Multiplexer::spawn(transport));

    let ws_connections = Arc::new(WsConnections::new());
    spawn_inbound_loop(mux.clone(), ws_connections.clone());

    let listener = match TcpListener::bind((config.hostname.as_str(), config.port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, hostname = %config.hostname, port = config.port, "failed to bind listener");
            return std::process::ExitCode::from(4);
        }
    };
    info!(hostname = %config.hostname, port = config.port, "zap-native listening");

    let ctx = Arc::new(ConnContext {
        http_table,
        ws_table,
        native_handlers: NativeHandlers::new(),
        mux: mux.clone(),
        middleware: config.middleware.clone(),
        max_request_body_size: config.max_request_body_size as usize,
        max_header_bytes: MAX_HEADER_BYTES,
        request_timeout: Duration::from_secs(config.request_timeout_secs),
        ws_connections,
        health_check_path: config.health_check_path.clone(),
        metrics_path: config.metrics_path.clone(),
        metrics: Arc::new(Metrics::new()),
    });

    let mut shutdown = std::pin::pin!(shutdown_signal());
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let ctx = ctx.clone();
                        tokio::spawn(async move {
                            connection::handle_connection(stream, ctx).await;
                        });
                        let _ = peer;
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }
            _ = &mut shutdown => {
                info!("shutting down");
                mux.shutdown();
                break;
            }
        }
    }

    std::process::ExitCode::SUCCESS
}

async fn connect_to_script(socket_path: &std::path::Path) -> std::io::Result<Transport> {
    let stream = tokio::net::UnixStream::connect(socket_path).await?;
    Ok(Transport::from_unix(stream, WireEncoding::Binary))
}

/// Drain the multiplexer's inbound channel: everything arriving here was
/// initiated by the script side (reverse RPC calls, health checks, and
/// WebSocket pushes to a browser connection this process still owns).
fn spawn_inbound_loop(mux: Arc<Multiplexer>, ws_connections: Arc<WsConnections>) {
    tokio::spawn(async move {
        let mut inbound = mux.take_inbound();
        let dispatcher = NoRpcFunctions;
        while let Some(envelope) = inbound.recv().await {
            match envelope {
                Envelope::RpcCall { .. } => handle_rpc_call(envelope, &dispatcher, &mux),
                Envelope::HealthCheck => {
                    let _ = mux.send(Envelope::HealthCheckResponse);
                }
                Envelope::WsSend { connection_id, data, binary } => {
                    ws_connections.dispatch(connection_id, WsServerEvent::Send { data, binary });
                }
                Envelope::WsClose { connection_id, code, reason } => {
                    ws_connections.dispatch(connection_id, WsServerEvent::Close { code, reason });
                }
                other => {
                    warn!(?other, "unexpected envelope on native inbound channel");
                }
            }
        }
    });
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {}
        Err(e) => error!(error = %e, "failed to install ctrl-c handler"),
    }
}
