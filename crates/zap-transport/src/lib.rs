//! Transport implementations for the IPC multiplexer.
//!
//! The native and script peers are joined by one local stream socket: a
//! Unix domain socket where available, loopback TCP otherwise. The `mem`
//! backend exists purely for tests and in-process embeddings.

mod backend;
#[cfg(feature = "mem")]
pub mod mem;
#[cfg(feature = "stream")]
pub mod stream;

pub use backend::Transport;
pub use zap_wire::{TransportError, WireEncoding};

/// Remove a stale socket file left behind by an unclean previous shutdown,
/// before binding a fresh listener on the same path.
#[cfg(unix)]
pub fn unlink_stale_socket(path: &std::path::Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
