//! Reverse RPC: the script side initiates a call and the native side
//! resolves it against a locally supplied dispatch table. Shares the
//! multiplexer's pending map and correlation machinery with ordinary
//! invocations; this crate only adds the typed request/response shape.

mod client;
mod dispatch;
mod error;

pub use client::RpcClient;
pub use dispatch::{RpcDispatcher, handle_rpc_call};
pub use error::RpcError;

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use zap_ipc::Multiplexer;
    use zap_transport::Transport;

    use super::*;

    struct Echo;
    impl RpcDispatcher for Echo {
        fn dispatch(&self, function_name: &str, params: &[u8]) -> Result<Vec<u8>, RpcError> {
            if function_name == "echo" {
                Ok(params.to_vec())
            } else {
                Err(RpcError::NotFound(function_name.to_string()))
            }
        }
    }

    #[tokio::test]
    async fn round_trips_a_successful_call() {
        let (s_transport, n_transport) = Transport::mem_pair();
        let s_mux = Arc::new(Multiplexer::spawn(s_transport));
        let n_mux = Multiplexer::spawn(n_transport);
        let mut n_inbound = n_mux.take_inbound();

        let client = RpcClient::new(s_mux);
        let dispatcher = Echo;

        let call = tokio::spawn({
            let client_mux = client;
            async move { client_mux.call("echo", b"hi".to_vec(), Duration::from_secs(1)).await }
        });

        let envelope = n_inbound.recv().await.unwrap();
        handle_rpc_call(envelope, &dispatcher, &n_mux);

        assert_eq!(call.await.unwrap().unwrap(), b"hi".to_vec());
    }

    #[tokio::test]
    async fn unknown_function_name_becomes_not_found() {
        let (s_transport, n_transport) = Transport::mem_pair();
        let s_mux = Arc::new(Multiplexer::spawn(s_transport));
        let n_mux = Multiplexer::spawn(n_transport);
        let mut n_inbound = n_mux.take_inbound();

        let client = RpcClient::new(s_mux);
        let dispatcher = Echo;

        let call = tokio::spawn({
            let client_mux = client;
            async move { client_mux.call("missing", vec![], Duration::from_secs(1)).await }
        });

        let envelope = n_inbound.recv().await.unwrap();
        handle_rpc_call(envelope, &dispatcher, &n_mux);

        assert_eq!(call.await.unwrap().unwrap_err(), RpcError::NotFound("missing".to_string()));
    }
}
