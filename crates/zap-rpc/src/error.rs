use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    #[error("no native function registered as {0}")]
    NotFound(String),

    #[error("rpc call timed out")]
    Timeout,

    #[error("native function {error_type} failed: {message}")]
    Execution { error_type: String, message: String },
}
