use std::collections::HashMap;
use std::sync::Arc;

use zap_http::ParsedRequest;

/// Result of an in-process (non-script) handler.
pub struct NativeResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl NativeResponse {
    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: body.into().into_bytes(),
        }
    }
}

/// A route whose `is_script` flag is false: handled entirely in-process,
/// without a round trip over the IPC socket. Supplied by the surrounding
/// application, same as the RPC dispatch table.
pub trait NativeHandler: Send + Sync {
    fn call(&self, request: &ParsedRequest<'_>, body: &[u8]) -> NativeResponse;
}

impl<F> NativeHandler for F
where
    F: Fn(&ParsedRequest<'_>, &[u8]) -> NativeResponse + Send + Sync,
{
    fn call(&self, request: &ParsedRequest<'_>, body: &[u8]) -> NativeResponse {
        (self)(request, body)
    }
}

#[derive(Default, Clone)]
pub struct NativeHandlers {
    handlers: HashMap<String, Arc<dyn NativeHandler>>,
}

impl NativeHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler_id: impl Into<String>, handler: impl NativeHandler + 'static) {
        self.handlers.insert(handler_id.into(), Arc::new(handler));
    }

    pub fn get(&self, handler_id: &str) -> Option<Arc<dyn NativeHandler>> {
        self.handlers.get(handler_id).cloned()
    }
}
