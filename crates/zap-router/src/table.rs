use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::RoutingError;
use crate::node::{Node, RouteTarget};
use crate::segment::{compile_pattern, has_trailing_slash, split_path};

/// One routing rule as supplied by configuration, before compilation.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: String,
    pub pattern: String,
    pub handler_id: String,
    pub is_script: bool,
}

/// The outcome of a successful lookup. Captures are returned owned: the
/// match itself walks the compiled tree zero-copy, but callers hold this
/// past the lifetime of any one request and outlive the `ArcSwap` guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub handler_id: String,
    pub is_script: bool,
    pub pattern: String,
    pub params: Vec<(String, String)>,
}

type MethodTrees = HashMap<String, Node>;

/// Compiled, swappable route table. Reloading (e.g. after a script-side
/// route change) replaces the whole tree set atomically; in-flight lookups
/// keep matching against the snapshot they loaded.
#[derive(Debug)]
pub struct RouteTable {
    trees: ArcSwap<MethodTrees>,
}

impl RouteTable {
    pub fn compile(entries: &[RouteEntry]) -> Result<Self, RoutingError> {
        let trees = build_trees(entries)?;
        Ok(Self {
            trees: ArcSwap::new(Arc::new(trees)),
        })
    }

    /// Atomically replace the compiled table with a freshly built one.
    pub fn reload(&self, entries: &[RouteEntry]) -> Result<(), RoutingError> {
        let trees = build_trees(entries)?;
        self.trees.store(Arc::new(trees));
        Ok(())
    }

    pub fn lookup(&self, method: &str, path: &str) -> Result<RouteMatch, RoutingError> {
        let trees = self.trees.load();
        let trailing_slash = has_trailing_slash(path);
        let trimmed = path.trim_matches('/');
        let segments = split_path(trimmed);

        if let Some(root) = trees.get(method) {
            let mut captures = Vec::new();
            if let Some(target) = root.matches(trimmed, &segments, 0, &mut captures, trailing_slash) {
                return Ok(to_match(target, captures));
            }
        }

        for (other_method, root) in trees.iter() {
            if other_method == method {
                continue;
            }
            let mut captures = Vec::new();
            if root.matches(trimmed, &segments, 0, &mut captures, trailing_slash).is_some() {
                return Err(RoutingError::MethodNotAllowed {
                    method: method.to_string(),
                    path: path.to_string(),
                });
            }
        }

        Err(RoutingError::NotFound {
            method: method.to_string(),
            path: path.to_string(),
        })
    }
}

fn to_match(target: &RouteTarget, captures: Vec<(String, &str)>) -> RouteMatch {
    RouteMatch {
        handler_id: target.handler_id.clone(),
        is_script: target.is_script,
        pattern: target.pattern.clone(),
        params: captures
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect(),
    }
}

fn build_trees(entries: &[RouteEntry]) -> Result<MethodTrees, RoutingError> {
    let mut trees: MethodTrees = HashMap::new();
    for entry in entries {
        let segments = compile_pattern(&entry.pattern);
        let trailing_slash = has_trailing_slash(&entry.pattern);
        let param_count = segments
            .iter()
            .filter(|s| {
                matches!(
                    s,
                    crate::segment::Segment::Param(_)
                        | crate::segment::Segment::OptionalParam(_)
                        | crate::segment::Segment::CatchAll(_)
                        | crate::segment::Segment::OptionalCatchAll(_)
                )
            })
            .count();
        let target = RouteTarget {
            handler_id: entry.handler_id.clone(),
            is_script: entry.is_script,
            pattern: entry.pattern.clone(),
            param_count,
        };
        trees
            .entry(entry.method.clone())
            .or_default()
            .insert(&entry.method, &segments, target, trailing_slash)?;
    }
    Ok(trees)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(method: &str, pattern: &str, handler_id: &str) -> RouteEntry {
        RouteEntry {
            method: method.to_string(),
            pattern: pattern.to_string(),
            handler_id: handler_id.to_string(),
            is_script: true,
        }
    }

    #[test]
    fn matches_literal_over_param() {
        let table = RouteTable::compile(&[
            entry("GET", "/users/me", "h_me"),
            entry("GET", "/users/:id", "h_id"),
        ])
        .unwrap();

        let hit = table.lookup("GET", "/users/me").unwrap();
        assert_eq!(hit.handler_id, "h_me");

        let hit = table.lookup("GET", "/users/42").unwrap();
        assert_eq!(hit.handler_id, "h_id");
        assert_eq!(hit.params, vec![("id".to_string(), "42".to_string())]);
    }

    #[test]
    fn distinguishes_not_found_from_method_not_allowed() {
        let table = RouteTable::compile(&[entry("GET", "/widgets", "h_list")]).unwrap();

        let err = table.lookup("POST", "/widgets").unwrap_err();
        assert_eq!(
            err,
            RoutingError::MethodNotAllowed {
                method: "POST".to_string(),
                path: "/widgets".to_string(),
            }
        );

        let err = table.lookup("GET", "/nope").unwrap_err();
        assert_eq!(
            err,
            RoutingError::NotFound {
                method: "GET".to_string(),
                path: "/nope".to_string(),
            }
        );
    }

    #[test]
    fn reload_replaces_table_atomically() {
        let table = RouteTable::compile(&[entry("GET", "/v1", "h_v1")]).unwrap();
        assert!(table.lookup("GET", "/v1").is_ok());

        table.reload(&[entry("GET", "/v2", "h_v2")]).unwrap();
        assert!(table.lookup("GET", "/v1").is_err());
        assert_eq!(table.lookup("GET", "/v2").unwrap().handler_id, "h_v2");
    }

    #[test]
    fn trailing_slash_is_distinct_unless_both_forms_registered() {
        let table = RouteTable::compile(&[entry("GET", "/widgets", "h_no_slash")]).unwrap();
        assert!(table.lookup("GET", "/widgets").is_ok());
        assert!(table.lookup("GET", "/widgets/").is_err());

        let table = RouteTable::compile(&[
            entry("GET", "/widgets", "h_no_slash"),
            entry("GET", "/widgets/", "h_slash"),
        ])
        .unwrap();
        assert_eq!(table.lookup("GET", "/widgets").unwrap().handler_id, "h_no_slash");
        assert_eq!(table.lookup("GET", "/widgets/").unwrap().handler_id, "h_slash");
    }

    #[test]
    fn rejects_ambiguous_patterns_at_compile_time() {
        let err = RouteTable::compile(&[
            entry("GET", "/items/:id", "h_a"),
            entry("GET", "/items/:other", "h_b"),
        ])
        .unwrap_err();
        assert!(matches!(err, RoutingError::AmbiguousRoute { .. }));
    }
}
