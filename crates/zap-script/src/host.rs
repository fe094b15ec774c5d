use std::sync::Arc;

use zap_config::Config;
use zap_ipc::Multiplexer;
use zap_registry::HandlerRegistry;
use zap_rpc::RpcClient;
use zap_supervisor::{NativeProcess, SupervisorConfig};

use crate::listener;

/// Everything the script process needs once the native peer is up and
/// connected: the multiplexer, the handler registry it feeds, and the RPC
/// client for calling back into native functions.
pub struct ScriptHost {
    pub mux: Arc<Multiplexer>,
    pub registry: Arc<HandlerRegistry>,
    pub rpc: RpcClient,
}

impl ScriptHost {
    /// Bind the IPC socket, spawn the native binary, and wait for it to
    /// dial back in. This is the startup sequence described in the
    /// supervisor's protocol: script listens, native connects as client.
    pub async fn spawn(
        config: &Config,
        mut supervisor_config: SupervisorConfig,
        registry: HandlerRegistry,
    ) -> std::io::Result<(Self, NativeProcess)> {
        supervisor_config.port = config.port;
        let socket_listener = listener::bind(&supervisor_config.socket_path)?;
        let process = NativeProcess::spawn(supervisor_config)
            .map_err(|e| std::io::Error::other(e.to_string()))?;

        let transport = listener::accept_one(&socket_listener).await?;
        let mux = Arc::new(Multiplexer::spawn(transport));
        let registry = Arc::new(registry);
        let rpc = RpcClient::new(mux.clone());

        Ok((
            Self {
                mux,
                registry,
                rpc,
            },
            process,
        ))
    }

    /// Run the inbound dispatch loop until the connection drops. Typically
    /// raced against `NativeProcess::wait` by the caller.
    pub async fn run(&self) {
        crate::event_loop::run(self.mux.clone(), self.registry.clone()).await;
    }
}
