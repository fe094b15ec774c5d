use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn native binary: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("native process did not exit within the grace period")]
    ShutdownTimedOut,

    #[error("requested port is already in use and the port policy is fail-fast")]
    PortInUse,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
