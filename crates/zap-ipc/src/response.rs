use tokio::sync::mpsc;
use zap_wire::Envelope;

/// What a correlated `call` resolves to: either a single matched envelope,
/// or — when the peer answered with `stream_start` — the start envelope
/// plus a receiver for the `stream_chunk`/`stream_end` frames that follow,
/// demultiplexed by `stream_id` as they arrive.
pub enum IpcResponse {
    Unary(Envelope),
    Stream {
        start: Envelope,
        chunks: mpsc::Receiver<Envelope>,
    },
}
