use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpcError {
    #[error("ipc channel closed")]
    ChannelClosed,

    #[error("ipc call timed out")]
    Timeout,

    #[error("response referenced unknown correlation id {0}")]
    UnknownCorrelation(u64),

    #[error("peer error {code}: {message}")]
    PeerError { code: String, message: String },
}
