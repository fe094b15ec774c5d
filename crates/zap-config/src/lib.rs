//! The configuration record that crosses the process boundary on disk: the
//! script process writes it, the native binary loads it on start and again
//! on a route-change respawn.

mod error;
mod record;

pub use error::ConfigError;
pub use record::{Config, MiddlewareConfig, RouteEntry, StaticFileMapping, StaticFileOptions};
