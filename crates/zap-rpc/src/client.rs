use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use zap_ipc::{IpcError, IpcResponse, Multiplexer};
use zap_wire::Envelope;

use crate::error::RpcError;

/// Script-side RPC client: the reverse direction of the multiplexer. Owns a
/// monotonically increasing `request_id` counter; the pending map itself
/// lives in the [`Multiplexer`] this wraps.
pub struct RpcClient {
    mux: Arc<Multiplexer>,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(mux: Arc<Multiplexer>) -> Self {
        Self {
            mux,
            next_id: AtomicU64::new(1),
        }
    }

    pub async fn call(
        &self,
        function_name: &str,
        params: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, RpcError> {
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope::RpcCall {
            request_id,
            function_name: function_name.to_string(),
            params,
        };

        match self.mux.call(envelope, timeout).await {
            Ok(IpcResponse::Unary(Envelope::RpcResponse { result, .. })) => Ok(result),
            Ok(IpcResponse::Unary(Envelope::RpcError { error_type, error, .. })) => {
                if error_type == "NotFound" {
                    Err(RpcError::NotFound(function_name.to_string()))
                } else {
                    Err(RpcError::Execution {
                        error_type,
                        message: error,
                    })
                }
            }
            Ok(_) => Err(RpcError::Execution {
                error_type: "UnexpectedResponse".to_string(),
                message: "peer replied with a non-rpc envelope".to_string(),
            }),
            Err(IpcError::Timeout) => Err(RpcError::Timeout),
            Err(IpcError::ChannelClosed) => Err(RpcError::Execution {
                error_type: "ChannelClosed".to_string(),
                message: "ipc transport closed while awaiting rpc response".to_string(),
            }),
            Err(IpcError::UnknownCorrelation(id)) => Err(RpcError::Execution {
                error_type: "UnknownCorrelation".to_string(),
                message: format!("no pending rpc call for id {id}"),
            }),
            Err(IpcError::PeerError { code, message }) => Err(RpcError::Execution {
                error_type: code,
                message,
            }),
        }
    }
}
