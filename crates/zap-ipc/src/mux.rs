use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use zap_transport::Transport;
use zap_wire::{Envelope, RawFrame};

use crate::error::IpcError;
use crate::response::IpcResponse;

/// Bound on the per-stream chunk channel. The reader task blocks writing
/// into it once full, which is the only backpressure signal a stream
/// producer on the peer gets (see the module docs).
const STREAM_CHUNK_BUFFER: usize = 32;

type PendingSlot = oneshot::Sender<Result<IpcResponse, IpcError>>;

/// One multiplexed IPC connection. Owns a reader task and a writer task
/// over a single [`Transport`]; correlates responses to calls by the
/// envelope's `request_id`/`stream_id`, and hands uncorrelated
/// (peer-initiated) envelopes to whichever component drains
/// [`Multiplexer::take_inbound`].
pub struct Multiplexer {
    outbound: mpsc::UnboundedSender<Envelope>,
    pending: Arc<DashMap<u64, PendingSlot>>,
    streams: Arc<DashMap<u64, mpsc::Sender<Envelope>>>,
    health_waiter: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    inbound_rx: Mutex<Option<mpsc::UnboundedReceiver<Envelope>>>,
    closed: Arc<AtomicBool>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Multiplexer {
    pub fn spawn(transport: Transport) -> Self {
        let pending: Arc<DashMap<u64, PendingSlot>> = Arc::new(DashMap::new());
        let streams: Arc<DashMap<u64, mpsc::Sender<Envelope>>> = Arc::new(DashMap::new());
        let health_waiter = Arc::new(Mutex::new(None::<oneshot::Sender<()>>));
        let closed = Arc::new(AtomicBool::new(false));

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Envelope>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Envelope>();

        let writer = tokio::spawn(write_loop(transport.clone(), outbound_rx));
        let reader = tokio::spawn(read_loop(
            transport,
            pending.clone(),
            streams.clone(),
            health_waiter.clone(),
            inbound_tx,
            closed.clone(),
        ));

        Self {
            outbound: outbound_tx,
            pending,
            streams,
            health_waiter,
            inbound_rx: Mutex::new(Some(inbound_rx)),
            closed,
            reader,
            writer,
        }
    }

    /// Take ownership of the channel carrying peer-initiated envelopes
    /// (`invoke_handler`, `rpc_call`, `ws_*`). Panics if called twice.
    pub fn take_inbound(&self) -> mpsc::UnboundedReceiver<Envelope> {
        self.inbound_rx
            .lock()
            .take()
            .expect("inbound receiver already taken")
    }

    /// Fire-and-forget send, for responses and events that don't await a
    /// matching reply (`handler_response`, `rpc_response`, `ws_send`, ...).
    pub fn send(&self, envelope: Envelope) -> Result<(), IpcError> {
        self.outbound
            .send(envelope)
            .map_err(|_| IpcError::ChannelClosed)
    }

    /// Send `envelope` and await the matching reply, correlated by
    /// `envelope.correlation_id()`. `envelope` must carry a correlation id.
    pub async fn call(
        &self,
        envelope: Envelope,
        timeout: Duration,
    ) -> Result<IpcResponse, IpcError> {
        let id = envelope.correlation_id().expect("envelope must carry a correlation id");
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        if self.outbound.send(envelope).is_err() {
            self.pending.remove(&id);
            return Err(IpcError::ChannelClosed);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(IpcError::ChannelClosed),
            Err(_) => {
                self.pending.remove(&id);
                Err(IpcError::Timeout)
            }
        }
    }

    /// Send `health_check` and await `health_check_response`. Only one
    /// outstanding probe is tracked at a time, matching the supervisor's
    /// one-probe-at-a-time polling loop.
    pub async fn health_check(&self, timeout: Duration) -> Result<(), IpcError> {
        let (tx, rx) = oneshot::channel();
        *self.health_waiter.lock() = Some(tx);

        if self.outbound.send(Envelope::HealthCheck).is_err() {
            return Err(IpcError::ChannelClosed);
        }

        tokio::time::timeout(timeout, rx)
            .await
            .map_err(|_| IpcError::Timeout)?
            .map_err(|_| IpcError::ChannelClosed)
    }

    /// Cancel an in-flight call or stream identified by `id` (its
    /// `request_id`/`stream_id`): drop any pending reply/chunk sender
    /// locally so a late response is silently discarded, and notify the
    /// peer with a `cancel_invocation` frame so its producer stops. Used by
    /// the native side when it observes the client HTTP connection
    /// disconnect mid-request.
    pub fn cancel(&self, id: u64) {
        self.pending.remove(&id);
        self.streams.remove(&id);
        let _ = self.outbound.send(Envelope::CancelInvocation { request_id: id });
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stop both tasks. Safe to call more than once.
    pub fn shutdown(&self) {
        self.reader.abort();
        self.writer.abort();
    }
}

async fn write_loop(transport: Transport, mut outbound_rx: mpsc::UnboundedReceiver<Envelope>) {
    let encoding = transport.outgoing_encoding();
    while let Some(envelope) = outbound_rx.recv().await {
        let bytes = zap_wire::encode_envelope(&envelope, encoding);
        let frame = match encoding {
            zap_wire::WireEncoding::Binary => RawFrame::binary(bytes),
            zap_wire::WireEncoding::Text => RawFrame::text(bytes),
        };
        if let Err(e) = transport.send_raw(frame).await {
            warn!(error = %e, "ipc write loop stopping after send failure");
            break;
        }
    }
}

async fn read_loop(
    transport: Transport,
    pending: Arc<DashMap<u64, PendingSlot>>,
    streams: Arc<DashMap<u64, mpsc::Sender<Envelope>>>,
    health_waiter: Arc<Mutex<Option<oneshot::Sender<()>>>>,
    inbound_tx: mpsc::UnboundedSender<Envelope>,
    closed: Arc<AtomicBool>,
) {
    loop {
        let frame = match transport.recv_raw().await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "ipc transport closed, draining pending calls");
                break;
            }
        };

        let envelope = match zap_wire::decode_envelope(&frame) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed ipc frame");
                continue;
            }
        };

        dispatch(envelope, &pending, &streams, &health_waiter, &inbound_tx).await;
    }

    closed.store(true, Ordering::Release);
    let stuck: Vec<u64> = pending.iter().map(|e| *e.key()).collect();
    for id in stuck {
        if let Some((_, tx)) = pending.remove(&id) {
            let _ = tx.send(Err(IpcError::ChannelClosed));
        }
    }
    streams.clear();
    if let Some(tx) = health_waiter.lock().take() {
        let _ = tx.send(());
    }
}

async fn dispatch(
    envelope: Envelope,
    pending: &DashMap<u64, PendingSlot>,
    streams: &DashMap<u64, mpsc::Sender<Envelope>>,
    health_waiter: &Mutex<Option<oneshot::Sender<()>>>,
    inbound_tx: &mpsc::UnboundedSender<Envelope>,
) {
    match &envelope {
        Envelope::HandlerResponse { handler_id: _, request_id, .. } => {
            resolve(pending, *request_id, envelope);
        }
        Envelope::RpcResponse { request_id, .. } | Envelope::RpcError { request_id, .. } => {
            resolve(pending, *request_id, envelope);
        }
        Envelope::Error { .. } => {
            // Terminal error frames without a correlation id are forwarded
            // for the owning side to log and act on.
            let _ = inbound_tx.send(envelope);
        }
        Envelope::HealthCheckResponse => {
            if let Some(tx) = health_waiter.lock().take() {
                let _ = tx.send(());
            }
        }
        Envelope::StreamStart { stream_id, .. } => {
            let id = *stream_id;
            if let Some((_, tx)) = pending.remove(&id) {
                let (chunk_tx, chunk_rx) = mpsc::channel(STREAM_CHUNK_BUFFER);
                streams.insert(id, chunk_tx);
                let _ = tx.send(Ok(IpcResponse::Stream { start: envelope, chunks: chunk_rx }));
            }
        }
        Envelope::StreamChunk { stream_id, .. } => {
            if let Some(sender) = streams.get(stream_id).map(|s| s.clone()) {
                // Awaiting here is the coarse backpressure mechanism: a slow
                // consumer of one stream throttles the whole connection
                // rather than dropping frames.
                let _ = sender.send(envelope).await;
            }
        }
        Envelope::StreamEnd { stream_id, .. } => {
            if let Some((_, sender)) = streams.remove(stream_id) {
                let _ = sender.send(envelope).await;
            }
        }
        Envelope::InvokeHandler { .. }
        | Envelope::RpcCall { .. }
        | Envelope::WsConnect { .. }
        | Envelope::WsMessage { .. }
        | Envelope::WsSend { .. }
        | Envelope::WsClose { .. }
        | Envelope::CancelInvocation { .. }
        | Envelope::HealthCheck => {
            let _ = inbound_tx.send(envelope);
        }
    }
}

fn resolve(pending: &DashMap<u64, PendingSlot>, id: u64, envelope: Envelope) {
    if let Some((_, tx)) = pending.remove(&id) {
        let _ = tx.send(Ok(IpcResponse::Unary(envelope)));
    }
}
