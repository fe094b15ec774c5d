//! Facade crate over the `zap` workspace: one dependency that brings in the
//! wire codec, transports, router, HTTP parser, IPC multiplexer, handler
//! registry, reverse-RPC client and the supervisor, re-exported under a
//! single [`prelude`].
//!
//! The native (`zap-native`) and script-host (`zap-script`) binaries each
//! depend on the underlying crates directly; this facade is for embedding
//! applications that want the whole stack without naming every member.

pub use zap_config as config;
pub use zap_http as http;
pub use zap_ipc as ipc;
pub use zap_registry as registry;
pub use zap_router as router;
pub use zap_rpc as rpc;
pub use zap_supervisor as supervisor;
pub use zap_transport as transport;
pub use zap_wire as wire;

/// Convenient glob import of the types most call sites need.
pub mod prelude {
    pub use zap_config::{Config, MiddlewareConfig, RouteEntry as ConfigRouteEntry};
    pub use zap_http::{ParsedRequest, parse_request_head};
    pub use zap_ipc::{IpcError, IpcResponse, Multiplexer};
    pub use zap_registry::{Handler, HandlerOutcome, HandlerRegistry};
    pub use zap_router::{RouteEntry, RouteMatch, RouteTable, RoutingError};
    pub use zap_rpc::{RpcClient, RpcDispatcher, RpcError};
    pub use zap_supervisor::{Supervisor, SupervisorConfig};
    pub use zap_transport::Transport;
    pub use zap_wire::{Envelope, InvocationRequest, KvPair, WireEncoding};
}
