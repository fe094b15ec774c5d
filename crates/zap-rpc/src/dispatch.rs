use zap_ipc::Multiplexer;
use zap_wire::Envelope;

use crate::error::RpcError;

/// The table of native functions an `rpc_call` may invoke, supplied by the
/// surrounding system at configuration time. The core never reasons about
/// individual function signatures; it only forwards raw params and results.
pub trait RpcDispatcher: Send + Sync {
    fn dispatch(&self, function_name: &str, params: &[u8]) -> Result<Vec<u8>, RpcError>;
}

/// Handle one inbound `rpc_call` frame: run it through `dispatcher` and
/// write back `rpc_response` or `rpc_error`.
pub fn handle_rpc_call(envelope: Envelope, dispatcher: &dyn RpcDispatcher, mux: &Multiplexer) {
    let Envelope::RpcCall { request_id, function_name, params } = envelope else {
        return;
    };

    let reply = match dispatcher.dispatch(&function_name, &params) {
        Ok(result) => Envelope::RpcResponse { request_id, result },
        Err(RpcError::NotFound(name)) => Envelope::RpcError {
            request_id,
            error_type: "NotFound".to_string(),
            error: format!("no such rpc function: {name}"),
        },
        Err(RpcError::Timeout) => Envelope::RpcError {
            request_id,
            error_type: "Timeout".to_string(),
            error: "rpc dispatch timed out".to_string(),
        },
        Err(RpcError::Execution { error_type, message }) => Envelope::RpcError {
            request_id,
            error_type,
            error: message,
        },
    };

    let _ = mux.send(reply);
}
