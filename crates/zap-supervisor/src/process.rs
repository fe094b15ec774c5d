use std::path::PathBuf;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{info, warn};

use crate::error::SupervisorError;

const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How many ports above the configured one `ScanNextAvailable` will try
/// before giving up.
const MAX_PORT_SCAN: u16 = 32;

/// What to do when the configured port is already bound. Left explicit per
/// deployment rather than hard-coded, since the two behaviors trade off
/// predictability against availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPolicy {
    FailFast,
    ScanNextAvailable,
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub binary_path: PathBuf,
    pub config_path: PathBuf,
    pub socket_path: PathBuf,
    pub log_level: String,
    /// The port the native process is configured to bind, checked with a
    /// pre-flight probe before spawn.
    pub port: u16,
    pub port_policy: PortPolicy,
    pub grace_period: Duration,
}

impl SupervisorConfig {
    pub fn new(binary_path: PathBuf, config_path: PathBuf, socket_path: PathBuf, port: u16) -> Self {
        Self {
            binary_path,
            config_path,
            socket_path,
            log_level: "info".to_string(),
            port,
            port_policy: PortPolicy::FailFast,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// One supervised run of the native binary. Restarting (on a route-change
/// reload) means dropping this and spawning a fresh one against a rewritten
/// configuration file.
pub struct NativeProcess {
    child: Child,
    config: SupervisorConfig,
}

impl NativeProcess {
    pub fn spawn(mut config: SupervisorConfig) -> Result<Self, SupervisorError> {
        let port = probe_port(config.port, config.port_policy)?;
        config.port = port;

        let child = Command::new(&config.binary_path)
            .arg("--config")
            .arg(&config.config_path)
            .arg("--socket")
            .arg(&config.socket_path)
            .arg("--log-level")
            .arg(&config.log_level)
            .arg("--port")
            .arg(port.to_string())
            .kill_on_drop(true)
            .spawn()
            .map_err(SupervisorError::Spawn)?;

        info!(
            pid = child.id(),
            config = %config.config_path.display(),
            port,
            "spawned native process"
        );

        Ok(Self { child, config })
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Drain in-flight invocations is the caller's job (it owns the
    /// multiplexer); this only tears down the child process: SIGTERM, wait
    /// up to the grace period, then SIGKILL.
    pub async fn shutdown(mut self) -> Result<(), SupervisorError> {
        let Some(pid) = self.child.id() else {
            // Already reaped.
            return Ok(());
        };

        send_sigterm(pid);

        match tokio::time::timeout(self.config.grace_period, self.child.wait()).await {
            Ok(Ok(status)) => {
                info!(pid, ?status, "native process exited after sigterm");
                Ok(())
            }
            Ok(Err(e)) => Err(SupervisorError::Io(e)),
            Err(_) => {
                warn!(pid, "native process ignored sigterm, sending sigkill");
                self.child.kill().await.map_err(SupervisorError::Io)?;
                Err(SupervisorError::ShutdownTimedOut)
            }
        }
    }

    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        self.child.wait().await
    }
}

/// Pre-flight port-availability check, run before every spawn so a stale
/// process squatting on the configured port fails fast instead of racing
/// the new child's own bind. Binds and immediately drops a probe listener
/// rather than trying to reuse it, since ownership has to pass to the
/// child process anyway.
fn probe_port(requested: u16, policy: PortPolicy) -> Result<u16, SupervisorError> {
    if std::net::TcpListener::bind(("0.0.0.0", requested)).is_ok() {
        return Ok(requested);
    }

    match policy {
        PortPolicy::FailFast => Err(SupervisorError::PortInUse),
        PortPolicy::ScanNextAvailable => {
            for candidate in (requested.saturating_add(1))..=(requested.saturating_add(MAX_PORT_SCAN)) {
                if std::net::TcpListener::bind(("0.0.0.0", candidate)).is_ok() {
                    warn!(requested, resolved = candidate, "configured port in use, scanned to next available");
                    return Ok(candidate);
                }
            }
            Err(SupervisorError::PortInUse)
        }
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) {
    // SAFETY: `pid` is a live child of this process, obtained from `Child::id`.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }
}

#[cfg(not(unix))]
fn send_sigterm(_pid: u32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fail_fast_errors_when_port_is_taken() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();

        let err = probe_port(port, PortPolicy::FailFast).unwrap_err();
        assert!(matches!(err, SupervisorError::PortInUse));
    }

    #[test]
    fn scan_next_available_finds_a_free_port_above_the_taken_one() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();

        let resolved = probe_port(port, PortPolicy::ScanNextAvailable).unwrap();
        assert_ne!(resolved, port);
    }

    #[test]
    fn returns_the_requested_port_when_free() {
        let held = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();
        drop(held);

        assert_eq!(probe_port(port, PortPolicy::FailFast).unwrap(), port);
    }
}
