//! In-process test harness for exercising the native/script split without a
//! real subprocess or socket: both sides run in the same process over
//! [`zap_transport::Transport::mem_pair`], so tests get the exact framing
//! and correlation behaviour of the real IPC path at the speed of a channel
//! send.

mod harness;

pub use harness::{DEFAULT_TIMEOUT, Harness, blank_request};

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use zap_registry::{HandlerOutcome, HandlerRegistry};

    use super::*;

    #[tokio::test]
    async fn round_trip_returns_handler_body() {
        let registry = HandlerRegistry::new();
        registry.register("echo", |req: zap_wire::InvocationRequest| async move {
            Ok(HandlerOutcome::Value(serde_json::json!({"path": req.path})))
        });

        let harness = Harness::spawn(registry);
        let (status, _headers, body) = harness
            .invoke("echo", blank_request(1, "GET", "/echo"))
            .await
            .expect("invoke should succeed");

        assert_eq!(status, 200);
        assert_eq!(body, br#"{"path":"/echo"}"#);
        harness.shutdown();
    }

    #[tokio::test]
    async fn concurrent_calls_do_not_cross_correlate() {
        let registry = HandlerRegistry::new();
        registry.register("id", |req: zap_wire::InvocationRequest| async move {
            Ok(HandlerOutcome::Value(serde_json::json!({"request_id": req.request_id})))
        });

        let harness = Harness::spawn(registry);
        let first = harness.invoke("id", blank_request(11, "GET", "/id"));
        let second = harness.invoke("id", blank_request(22, "GET", "/id"));
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first.unwrap().2, br#"{"request_id":11}"#);
        assert_eq!(second.unwrap().2, br#"{"request_id":22}"#);
        harness.shutdown();
    }

    #[tokio::test]
    async fn streaming_handler_preserves_chunk_order() {
        let registry = HandlerRegistry::new();
        registry.register("stream", |_req: zap_wire::InvocationRequest| async move {
            let chunks = vec![Ok(b"a".to_vec()), Ok(b"b".to_vec()), Ok(b"c".to_vec())];
            Ok(HandlerOutcome::Stream {
                status: 200,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                chunks: Box::pin(tokio_stream::iter(chunks)),
            })
        });

        let harness = Harness::spawn(registry);
        let (status, headers, body) = harness
            .invoke_stream("stream", blank_request(5, "GET", "/stream"))
            .await
            .expect("invoke_stream should succeed");

        assert_eq!(status, 200);
        assert!(headers.iter().any(|(k, v)| k == "content-type" && v == "text/plain"));
        assert_eq!(body, b"abc");
        harness.shutdown();
    }

    #[tokio::test]
    async fn unregistered_handler_surfaces_as_404() {
        let registry = HandlerRegistry::new();
        let harness = Harness::spawn(registry);

        let (status, _headers, _body) = harness
            .invoke("missing", blank_request(9, "GET", "/nope"))
            .await
            .expect("invoke transports the 404, it doesn't error the ipc call");

        assert_eq!(status, 404);
        harness.shutdown();
    }

    #[tokio::test]
    async fn shutdown_is_idempotent() {
        let harness = Harness::spawn(HandlerRegistry::new());
        harness.shutdown();
        harness.shutdown();
    }

    #[tokio::test]
    async fn call_after_shutdown_times_out_rather_than_hangs() {
        let harness = Harness::spawn(HandlerRegistry::new());
        harness.shutdown();

        let result = tokio::time::timeout(
            Duration::from_secs(3),
            harness.invoke("echo", blank_request(1, "GET", "/echo")),
        )
        .await;

        assert!(result.is_ok(), "invoke must resolve rather than hang forever after shutdown");
        assert!(result.unwrap().is_err(), "a shut-down multiplexer can't produce a handler_response");
    }
}
