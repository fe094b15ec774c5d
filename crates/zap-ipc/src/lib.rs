//! The bidirectional multiplexed channel between N and S: one reader task
//! and one writer task per connection, demultiplexing by envelope kind and
//! correlating responses to calls by `request_id`/`stream_id`.

mod error;
mod mux;
mod response;

pub use error::IpcError;
pub use mux::Multiplexer;
pub use response::IpcResponse;

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use zap_transport::Transport;
    use zap_wire::Envelope;

    use super::*;

    #[tokio::test]
    async fn call_resolves_to_the_matching_handler_response() {
        let (a, b) = Transport::mem_pair();
        let n = Multiplexer::spawn(a);
        let s = Multiplexer::spawn(b);
        let mut inbound = s.take_inbound();

        let call = tokio::spawn({
            let n = n;
            async move {
                n.call(
                    Envelope::InvokeHandler {
                        handler_id: "h".into(),
                        request: zap_wire::InvocationRequest {
                            request_id: 1,
                            method: "GET".into(),
                            path: "/x".into(),
                            path_only: "/x".into(),
                            query: vec![],
                            params: vec![],
                            headers: vec![],
                            cookies: vec![],
                            body: None,
                            body_bytes: None,
                        },
                    },
                    Duration::from_secs(1),
                )
                .await
            }
        });

        let invoke = inbound.recv().await.unwrap();
        let request_id = invoke.correlation_id().unwrap();
        s.send(Envelope::HandlerResponse {
            handler_id: "h".into(),
            request_id,
            status: 200,
            headers: vec![],
            body: b"ok".to_vec(),
        })
        .unwrap();

        let result = call.await.unwrap().unwrap();
        match result {
            IpcResponse::Unary(Envelope::HandlerResponse { status, body, .. }) => {
                assert_eq!(status, 200);
                assert_eq!(body, b"ok");
            }
            _ => panic!("expected a unary handler_response"),
        }
    }

    #[tokio::test]
    async fn call_times_out_when_no_response_arrives() {
        let (a, _b) = Transport::mem_pair();
        let n = Multiplexer::spawn(a);
        let err = n
            .call(Envelope::HealthCheck, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert_eq!(err, IpcError::Timeout);
    }

    #[tokio::test]
    async fn closing_the_transport_fails_pending_calls() {
        let (a, b) = Transport::mem_pair();
        let n = Multiplexer::spawn(a);
        drop(b);

        let err = n
            .call(
                Envelope::RpcCall {
                    request_id: 9,
                    function_name: "f".into(),
                    params: vec![],
                },
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert_eq!(err, IpcError::ChannelClosed);
    }
}
