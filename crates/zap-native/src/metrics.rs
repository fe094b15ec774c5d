//! In-process counters exposed as Prometheus text exposition format at
//! `metrics_path`. Sourced entirely from atomics incremented on the
//! request-dispatch and WebSocket-connect/close hot paths; nothing here
//! talks to the script side.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Metrics {
    requests_total: AtomicU64,
    status_1xx: AtomicU64,
    status_2xx: AtomicU64,
    status_3xx: AtomicU64,
    status_4xx: AtomicU64,
    status_5xx: AtomicU64,
    ws_open: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed HTTP response, tallying it under its status
    /// class (1xx-5xx); anything outside that range falls under 5xx.
    pub fn record_response(&self, status: u16) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        let bucket = match status {
            100..=199 => &self.status_1xx,
            200..=299 => &self.status_2xx,
            300..=399 => &self.status_3xx,
            400..=499 => &self.status_4xx,
            _ => &self.status_5xx,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ws_connected(&self) {
        self.ws_open.fetch_add(1, Ordering::Relaxed);
    }

    pub fn ws_disconnected(&self) {
        self.ws_open.fetch_sub(1, Ordering::Relaxed);
    }

    /// Render the current counter values as Prometheus text exposition
    /// format, suitable for serving verbatim as the `metrics_path` body.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# HELP zap_requests_total Total HTTP requests dispatched.");
        let _ = writeln!(out, "# TYPE zap_requests_total counter");
        let _ = writeln!(out, "zap_requests_total {}", self.requests_total.load(Ordering::Relaxed));

        let _ = writeln!(out, "# HELP zap_responses_total HTTP responses by status class.");
        let _ = writeln!(out, "# TYPE zap_responses_total counter");
        for (class, count) in [
            ("1xx", self.status_1xx.load(Ordering::Relaxed)),
            ("2xx", self.status_2xx.load(Ordering::Relaxed)),
            ("3xx", self.status_3xx.load(Ordering::Relaxed)),
            ("4xx", self.status_4xx.load(Ordering::Relaxed)),
            ("5xx", self.status_5xx.load(Ordering::Relaxed)),
        ] {
            let _ = writeln!(out, "zap_responses_total{{status_class=\"{class}\"}} {count}");
        }

        let _ = writeln!(out, "# HELP zap_websocket_connections_open Currently open WebSocket connections.");
        let _ = writeln!(out, "# TYPE zap_websocket_connections_open gauge");
        let _ = writeln!(out, "zap_websocket_connections_open {}", self.ws_open.load(Ordering::Relaxed));

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tallies_status_classes_and_total() {
        let metrics = Metrics::new();
        metrics.record_response(200);
        metrics.record_response(404);
        metrics.record_response(500);

        let rendered = metrics.render();
        assert!(rendered.contains("zap_requests_total 3"));
        assert!(rendered.contains("status_class=\"2xx\"} 1"));
        assert!(rendered.contains("status_class=\"4xx\"} 1"));
        assert!(rendered.contains("status_class=\"5xx\"} 1"));
    }

    #[test]
    fn tracks_open_websocket_connections_as_a_gauge() {
        let metrics = Metrics::new();
        metrics.ws_connected();
        metrics.ws_connected();
        metrics.ws_disconnected();

        assert!(metrics.render().contains("zap_websocket_connections_open 1"));
    }
}
