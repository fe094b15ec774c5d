use std::time::Duration;

use tracing::info;

use crate::error::SupervisorError;
use crate::process::{NativeProcess, SupervisorConfig};

/// Owns the lifecycle of the native process across restarts. A restart is
/// triggered by a route-table change on the script side: drain in-flight
/// invocations (the caller's responsibility, since only it holds the
/// multiplexer), then call [`Supervisor::restart`].
pub struct Supervisor {
    config: SupervisorConfig,
    process: Option<NativeProcess>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self { config, process: None }
    }

    pub fn start(&mut self) -> Result<(), SupervisorError> {
        self.process = Some(NativeProcess::spawn(self.config.clone())?);
        Ok(())
    }

    pub fn pid(&self) -> Option<u32> {
        self.process.as_ref().and_then(NativeProcess::pid)
    }

    /// Drain in-flight invocations first (caller's job), then call this:
    /// closes the socket on the script side is also the caller's job, this
    /// only tears the child process down, rewrites nothing, and respawns
    /// against whatever configuration file is on disk at `config_path` now.
    pub async fn restart(&mut self) -> Result<(), SupervisorError> {
        if let Some(process) = self.process.take() {
            match process.shutdown().await {
                Ok(()) => {}
                Err(SupervisorError::ShutdownTimedOut) => {
                    info!("native process required sigkill during restart");
                }
                Err(e) => return Err(e),
            }
        }
        self.start()
    }

    pub async fn shutdown(&mut self) -> Result<(), SupervisorError> {
        if let Some(process) = self.process.take() {
            process.shutdown().await?;
        }
        Ok(())
    }

    pub async fn wait(&mut self) -> std::io::Result<std::process::ExitStatus> {
        match &mut self.process {
            Some(process) => process.wait().await,
            None => std::future::pending().await,
        }
    }
}

/// Poll `probe` on an interval until it reports healthy or `attempts` are
/// exhausted.
pub async fn wait_until_healthy<F, Fut>(mut probe: F, interval: Duration, attempts: u32) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..attempts {
        if probe().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_once_probe_reports_healthy() {
        let attempt = AtomicU32::new(0);
        let ok = wait_until_healthy(
            || async {
                attempt.fetch_add(1, Ordering::Relaxed) >= 2
            },
            Duration::from_millis(1),
            10,
        )
        .await;
        assert!(ok);
    }

    #[tokio::test]
    async fn gives_up_after_exhausting_attempts() {
        let ok = wait_until_healthy(|| async { false }, Duration::from_millis(1), 3).await;
        assert!(!ok);
    }
}
