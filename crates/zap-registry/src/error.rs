use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    #[error("no handler registered for id {0}")]
    NotFound(String),

    #[error("handler raised an error: {0}")]
    Execution(String),

    #[error("handler returned a response shape the registry doesn't understand")]
    InvalidResponseShape,
}
