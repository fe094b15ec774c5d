use std::sync::Arc;

use tracing::{error, warn};
use zap_ipc::Multiplexer;
use zap_registry::HandlerRegistry;
use zap_wire::Envelope;

/// Drain peer-initiated envelopes forever: `invoke_handler` goes to the
/// registry, `ws_*` mirrors WebSocket lifecycle events, `health_check` gets
/// an immediate `health_check_response`. Returns once the multiplexer's
/// inbound channel closes (the transport went away).
pub async fn run(mux: Arc<Multiplexer>, registry: Arc<HandlerRegistry>) {
    let mut inbound = mux.take_inbound();
    while let Some(envelope) = inbound.recv().await {
        match envelope {
            invoke @ Envelope::InvokeHandler { .. } => {
                let mux = mux.clone();
                let registry = registry.clone();
                tokio::spawn(async move { registry.invoke(invoke, &mux).await });
            }
            Envelope::WsConnect { connection_id, path, headers } => {
                registry.ws_connect(connection_id, &path, &headers);
            }
            Envelope::WsMessage { connection_id, data, binary } => {
                registry.ws_message(connection_id, &data, binary);
            }
            Envelope::WsClose { connection_id, code, reason } => {
                registry.ws_close(connection_id, code, &reason);
            }
            Envelope::HealthCheck => {
                let _ = mux.send(Envelope::HealthCheckResponse);
            }
            Envelope::CancelInvocation { request_id } => {
                registry.cancel_invocation(request_id);
            }
            Envelope::Error { code, message } => {
                error!(code, message, "received terminal error frame from native peer");
            }
            other => {
                warn!(?other, "unexpected envelope on the script-side inbound channel");
            }
        }
    }
}
