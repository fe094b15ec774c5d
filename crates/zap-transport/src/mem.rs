//! In-process transport: two halves joined by a pair of bounded channels.
//! Used by tests and by in-process embeddings of the script runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, Mutex};
use zap_wire::{RawFrame, TransportError, WireEncoding};

use crate::backend::TransportBackend;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Clone)]
pub struct MemTransport {
    inner: Arc<Inner>,
}

struct Inner {
    tx: mpsc::Sender<RawFrame>,
    rx: Mutex<mpsc::Receiver<RawFrame>>,
    closed: AtomicBool,
    encoding: WireEncoding,
}

impl MemTransport {
    pub fn pair() -> (Self, Self) {
        Self::pair_with_encoding(WireEncoding::Binary, WireEncoding::Binary)
    }

    pub fn pair_with_encoding(a_writes: WireEncoding, b_writes: WireEncoding) -> (Self, Self) {
        let (tx_a, rx_a) = mpsc::channel(CHANNEL_CAPACITY);
        let (tx_b, rx_b) = mpsc::channel(CHANNEL_CAPACITY);

        let a = Self {
            inner: Arc::new(Inner {
                tx: tx_b,
                rx: Mutex::new(rx_a),
                closed: AtomicBool::new(false),
                encoding: a_writes,
            }),
        };
        let b = Self {
            inner: Arc::new(Inner {
                tx: tx_a,
                rx: Mutex::new(rx_b),
                closed: AtomicBool::new(false),
                encoding: b_writes,
            }),
        };
        (a, b)
    }

    pub fn outgoing_encoding(&self) -> WireEncoding {
        self.inner.encoding
    }
}

impl TransportBackend for MemTransport {
    async fn send_raw(&self, frame: RawFrame) -> Result<(), TransportError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.inner
            .tx
            .send(frame)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn recv_raw(&self) -> Result<RawFrame, TransportError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let mut rx = self.inner.rx.lock().await;
        rx.recv().await.ok_or(TransportError::Closed)
    }

    fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}
