//! Fixed middleware chain applied before routing, per the enabled flags in
//! the configuration's `middleware` block. There's no user-defined ordering
//! or dynamic chain construction: CORS, logging and compression are applied
//! in that fixed order, matching how the configuration record exposes them
//! as three booleans rather than a pipeline.

use std::io::Write as _;

use flate2::Compression;
use flate2::write::GzEncoder;
use zap_config::MiddlewareConfig;
use zap_http::ParsedRequest;

/// CORS preflight response for an `OPTIONS` request, when CORS is enabled.
/// Returns `None` when the request isn't a preflight or CORS is disabled.
pub fn cors_preflight(
    config: &MiddlewareConfig,
    request: &ParsedRequest<'_>,
) -> Option<Vec<(String, String)>> {
    if !config.enable_cors || request.method != "OPTIONS" {
        return None;
    }
    Some(vec![
        ("access-control-allow-origin".to_string(), "*".to_string()),
        (
            "access-control-allow-methods".to_string(),
            "GET, POST, PUT, PATCH, DELETE, OPTIONS".to_string(),
        ),
        (
            "access-control-allow-headers".to_string(),
            "content-type, authorization".to_string(),
        ),
        ("access-control-max-age".to_string(), "86400".to_string()),
    ])
}

/// Headers appended to every non-preflight response when CORS is enabled.
pub fn cors_response_headers(config: &MiddlewareConfig) -> Vec<(String, String)> {
    if config.enable_cors {
        vec![("access-control-allow-origin".to_string(), "*".to_string())]
    } else {
        Vec::new()
    }
}

pub fn log_request(config: &MiddlewareConfig, method: &str, path: &str, status: u16, request_id: u64) {
    if config.enable_logging {
        tracing::info!(request_id, method, path, status, "request completed");
    }
}

/// Gzip-compress `body` when compression is enabled and the client advertised
/// support for it. Returns `None` when the body should pass through
/// unmodified.
pub fn maybe_compress(
    config: &MiddlewareConfig,
    accept_encoding: Option<&str>,
    body: &[u8],
) -> Option<Vec<u8>> {
    if !config.enable_compression {
        return None;
    }
    let accepts_gzip = accept_encoding
        .map(|h| h.split(',').any(|part| part.trim().starts_with("gzip")))
        .unwrap_or(false);
    if !accepts_gzip || body.is_empty() {
        return None;
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(body).is_err() {
        return None;
    }
    encoder.finish().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(enable_compression: bool) -> MiddlewareConfig {
        MiddlewareConfig {
            enable_cors: true,
            enable_logging: true,
            enable_compression,
        }
    }

    #[test]
    fn compresses_when_client_accepts_gzip() {
        let body = b"hello hello hello hello hello".to_vec();
        let out = maybe_compress(&config(true), Some("gzip, deflate"), &body).unwrap();
        assert!(out.len() < body.len() || !out.is_empty());
    }

    #[test]
    fn skips_compression_when_disabled() {
        let body = b"hello".to_vec();
        assert!(maybe_compress(&config(false), Some("gzip"), &body).is_none());
    }

    #[test]
    fn skips_compression_when_client_does_not_accept_it() {
        let body = b"hello".to_vec();
        assert!(maybe_compress(&config(true), Some("br"), &body).is_none());
    }
}
