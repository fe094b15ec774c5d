//! Process supervision: the script side spawns the native binary, probes it
//! for liveness, and tears it down gracefully (SIGTERM with a grace period,
//! then SIGKILL) on shutdown or route-change restart.

mod error;
mod health;
mod process;
mod supervisor;

pub use error::SupervisorError;
pub use health::{probe_http, probe_ipc};
pub use process::{NativeProcess, PortPolicy, SupervisorConfig};
pub use supervisor::{Supervisor, wait_until_healthy};
