use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("no route for {method} {path}")]
    NotFound { method: String, path: String },

    #[error("{path} exists but not for method {method}")]
    MethodNotAllowed { method: String, path: String },

    /// Only ever surfaced at startup, while compiling the route table.
    #[error("ambiguous route: {method} {pattern_a} and {pattern_b} cannot be distinguished")]
    AmbiguousRoute {
        method: String,
        pattern_a: String,
        pattern_b: String,
    },
}
