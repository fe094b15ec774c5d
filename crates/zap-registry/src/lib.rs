//! The script-side handler registry: owns `handler_id -> callable` and
//! `handler_id -> websocket callbacks` maps, normalizes handler return
//! values into `handler_response`/`stream_*` frames, and resolves
//! WebSocket connections to their owning handler.

mod error;
mod outcome;
mod registry;

pub use error::HandlerError;
pub use outcome::{Chunk, ChunkStream, Handler, HandlerOutcome, ShapedResponse, WsCallbacks};
pub use registry::{HandlerRegistry, WS_METHOD};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use zap_ipc::{IpcResponse, Multiplexer};
    use zap_transport::Transport;
    use zap_wire::{Envelope, InvocationRequest};

    use super::*;

    fn blank_request(request_id: u64) -> InvocationRequest {
        InvocationRequest {
            request_id,
            method: "GET".into(),
            path: "/x".into(),
            path_only: "/x".into(),
            query: vec![],
            params: vec![],
            headers: vec![],
            cookies: vec![],
            body: None,
            body_bytes: None,
        }
    }

    #[tokio::test]
    async fn value_outcome_becomes_json_handler_response() {
        let (n, s) = Transport::mem_pair();
        let n = Multiplexer::spawn(n);
        let s = Multiplexer::spawn(s);

        let registry = HandlerRegistry::new();
        registry.register("h_user", |req: InvocationRequest| async move {
            Ok(HandlerOutcome::Value(serde_json::json!({"id": req.request_id})))
        });

        let invoke = Envelope::InvokeHandler {
            handler_id: "h_user".into(),
            request: blank_request(1),
        };

        let call = tokio::spawn({
            let n = n;
            async move { n.call(invoke, Duration::from_secs(1)).await }
        });

        let mut inbound = s.take_inbound();
        let envelope = inbound.recv().await.unwrap();
        registry.invoke(envelope, &s).await;

        match call.await.unwrap().unwrap() {
            IpcResponse::Unary(Envelope::HandlerResponse { status, body, .. }) => {
                assert_eq!(status, 200);
                assert_eq!(body, br#"{"id":1}"#);
            }
            _ => panic!("expected unary handler_response"),
        }
    }

    #[tokio::test]
    async fn unregistered_handler_yields_404() {
        let (n, s) = Transport::mem_pair();
        let n = Multiplexer::spawn(n);
        let s = Multiplexer::spawn(s);
        let registry = HandlerRegistry::new();

        let invoke = Envelope::InvokeHandler {
            handler_id: "missing".into(),
            request: blank_request(2),
        };
        let call = tokio::spawn({
            let n = n;
            async move { n.call(invoke, Duration::from_secs(1)).await }
        });

        let mut inbound = s.take_inbound();
        let envelope = inbound.recv().await.unwrap();
        registry.invoke(envelope, &s).await;

        match call.await.unwrap().unwrap() {
            IpcResponse::Unary(Envelope::HandlerResponse { status, .. }) => assert_eq!(status, 404),
            _ => panic!("expected unary handler_response"),
        }
    }
}
