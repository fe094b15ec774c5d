//! Pattern compilation: turns `"/api/users/:id"` into a sequence of
//! segments the radix tree can be built from.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    OptionalParam(String),
    CatchAll(String),
    OptionalCatchAll(String),
}

impl Segment {
    /// Relative specificity for priority ordering at a shared tree position.
    /// Lower sorts first (tried first during matching).
    pub fn rank(&self) -> u8 {
        match self {
            Segment::Literal(_) => 0,
            Segment::Param(_) => 1,
            Segment::OptionalParam(_) => 2,
            Segment::CatchAll(_) => 3,
            Segment::OptionalCatchAll(_) => 4,
        }
    }
}

/// Split a route pattern into path segments, ignoring a leading slash and
/// collapsing an all-slash pattern to the empty (index) segment list.
pub fn compile_pattern(pattern: &str) -> Vec<Segment> {
    pattern
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(compile_one)
        .collect()
}

fn compile_one(raw: &str) -> Segment {
    if let Some(rest) = raw.strip_prefix(':') {
        if let Some(name) = rest.strip_suffix('?') {
            Segment::OptionalParam(name.to_string())
        } else {
            Segment::Param(rest.to_string())
        }
    } else if let Some(rest) = raw.strip_prefix('*') {
        if let Some(name) = rest.strip_suffix('?') {
            Segment::OptionalCatchAll(name.to_string())
        } else {
            Segment::CatchAll(rest.to_string())
        }
    } else {
        Segment::Literal(raw.to_string())
    }
}

/// Split an actual request path the same way, for matching against a
/// compiled tree.
pub fn split_path(path: &str) -> Vec<&str> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether `path` (a pattern or a request path, pre-split) carries a
/// trailing slash distinct from the root itself. `/foo/` is `true`, `/foo`
/// and `/` are `false` -- the root has no meaningful "with trailing slash"
/// variant since it's already just the separator.
pub fn has_trailing_slash(path: &str) -> bool {
    path.len() > 1 && path.ends_with('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_mixed_segments() {
        let segs = compile_pattern("/api/users/:id/*rest?");
        assert_eq!(
            segs,
            vec![
                Segment::Literal("api".into()),
                Segment::Literal("users".into()),
                Segment::Param("id".into()),
                Segment::OptionalCatchAll("rest".into()),
            ]
        );
    }

    #[test]
    fn index_route_has_no_segments() {
        assert!(compile_pattern("/").is_empty());
        assert!(compile_pattern("").is_empty());
    }
}
