//! The script-side runtime: binds the IPC socket, spawns the native peer,
//! and drains its inbound envelopes into the handler registry. Intended
//! both as the library a real scripting-runtime host links against and as
//! the test harness for the rest of the workspace.

mod event_loop;
mod host;
mod listener;

pub use event_loop::run as drive_inbound;
pub use host::ScriptHost;
pub use listener::{accept_one, bind};
