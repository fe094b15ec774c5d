use std::collections::HashMap;

use crate::error::RoutingError;
use crate::segment::Segment;

/// What a terminal node resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub handler_id: String,
    pub is_script: bool,
    /// The original pattern text, kept for ambiguity diagnostics and the
    /// "longer path wins" tie-break.
    pub pattern: String,
    /// Number of named captures in this route, used to pre-size the
    /// capture map on a hit.
    pub param_count: usize,
}

#[derive(Debug, Default)]
pub struct Node {
    literal_children: HashMap<String, Box<Node>>,
    param_child: Option<(String, Box<Node>)>,
    optional_param_child: Option<(String, Box<Node>)>,
    catch_all: Option<(String, RouteTarget)>,
    optional_catch_all: Option<(String, RouteTarget)>,
    /// Set when a route terminates exactly at this node (no further
    /// segments to match) and was registered without a trailing slash.
    terminal: Option<RouteTarget>,
    /// Set when a route terminates exactly at this node and was registered
    /// *with* a trailing slash (`/foo/` as opposed to `/foo`). Kept separate
    /// from `terminal` so the two forms only match their own canonical
    /// request shape unless both are registered.
    terminal_slash: Option<RouteTarget>,
}

impl Node {
    pub fn insert(
        &mut self,
        method: &str,
        segments: &[Segment],
        target: RouteTarget,
        trailing_slash: bool,
    ) -> Result<(), RoutingError> {
        match segments.split_first() {
            None => {
                let slot = if trailing_slash { &mut self.terminal_slash } else { &mut self.terminal };
                if let Some(existing) = slot {
                    return Err(RoutingError::AmbiguousRoute {
                        method: method.to_string(),
                        pattern_a: existing.pattern.clone(),
                        pattern_b: target.pattern.clone(),
                    });
                }
                *slot = Some(target);
                Ok(())
            }
            Some((head, rest)) => match head {
                Segment::Literal(lit) => self
                    .literal_children
                    .entry(lit.clone())
                    .or_default()
                    .insert(method, rest, target, trailing_slash),
                Segment::Param(name) => {
                    let child = match &mut self.param_child {
                        Some((existing_name, node)) if existing_name == name => node,
                        Some((existing_name, _)) => {
                            return Err(RoutingError::AmbiguousRoute {
                                method: method.to_string(),
                                pattern_a: format!(":{existing_name}"),
                                pattern_b: format!(":{name}"),
                            });
                        }
                        slot @ None => {
                            *slot = Some((name.clone(), Box::default()));
                            &mut slot.as_mut().unwrap().1
                        }
                    };
                    child.insert(method, rest, target, trailing_slash)
                }
                Segment::OptionalParam(name) => {
                    let child = match &mut self.optional_param_child {
                        Some((existing_name, node)) if existing_name == name => node,
                        Some((existing_name, _)) => {
                            return Err(RoutingError::AmbiguousRoute {
                                method: method.to_string(),
                                pattern_a: format!(":{existing_name}?"),
                                pattern_b: format!(":{name}?"),
                            });
                        }
                        slot @ None => {
                            *slot = Some((name.clone(), Box::default()));
                            &mut slot.as_mut().unwrap().1
                        }
                    };
                    child.insert(method, rest, target, trailing_slash)
                }
                Segment::CatchAll(name) => {
                    if !rest.is_empty() {
                        return Err(RoutingError::AmbiguousRoute {
                            method: method.to_string(),
                            pattern_a: target.pattern.clone(),
                            pattern_b: format!("*{name} followed by more segments"),
                        });
                    }
                    if let Some((_, existing)) = &self.catch_all {
                        return Err(RoutingError::AmbiguousRoute {
                            method: method.to_string(),
                            pattern_a: existing.pattern.clone(),
                            pattern_b: target.pattern.clone(),
                        });
                    }
                    self.catch_all = Some((name.clone(), target));
                    Ok(())
                }
                Segment::OptionalCatchAll(name) => {
                    if !rest.is_empty() {
                        return Err(RoutingError::AmbiguousRoute {
                            method: method.to_string(),
                            pattern_a: target.pattern.clone(),
                            pattern_b: format!("*{name}? followed by more segments"),
                        });
                    }
                    if let Some((_, existing)) = &self.optional_catch_all {
                        return Err(RoutingError::AmbiguousRoute {
                            method: method.to_string(),
                            pattern_a: existing.pattern.clone(),
                            pattern_b: target.pattern.clone(),
                        });
                    }
                    self.optional_catch_all = Some((name.clone(), target));
                    Ok(())
                }
            },
        }
    }

    /// Match `segments[pos..]` against this subtree, in priority order:
    /// literal > required param > optional param > catch-all > optional
    /// catch-all. `full_path` is the (already trimmed of surrounding
    /// slashes) path the segments were split from; catch-all captures slice
    /// directly into it rather than rejoining the segments, so a capture is
    /// always a borrow and never an allocation.
    ///
    /// `trailing_slash` records whether the path being looked up ends in a
    /// slash (`/foo/`, as opposed to `/foo`); at the terminal position this
    /// only matches the slot registered with the same trailing-slash shape,
    /// so `/foo` and `/foo/` resolve independently unless both were
    /// registered.
    pub fn matches<'p>(
        &self,
        full_path: &'p str,
        segments: &[&'p str],
        pos: usize,
        captures: &mut Vec<(String, &'p str)>,
        trailing_slash: bool,
    ) -> Option<&RouteTarget> {
        if pos == segments.len() {
            let exact = if trailing_slash { &self.terminal_slash } else { &self.terminal };
            if let Some(target) = exact {
                return Some(target);
            }
            if let Some((name, node)) = &self.optional_param_child {
                let mark = captures.len();
                captures.push((name.clone(), ""));
                if let Some(t) = node.matches(full_path, segments, pos, captures, trailing_slash) {
                    return Some(t);
                }
                captures.truncate(mark);
            }
            if let Some((name, target)) = &self.optional_catch_all {
                captures.push((name.clone(), ""));
                return Some(target);
            }
            return None;
        }

        let seg = segments[pos];

        if let Some(child) = self.literal_children.get(seg)
            && let Some(t) = child.matches(full_path, segments, pos + 1, captures, trailing_slash)
        {
            return Some(t);
        }

        if let Some((name, node)) = &self.param_child {
            let mark = captures.len();
            captures.push((name.clone(), seg));
            if let Some(t) = node.matches(full_path, segments, pos + 1, captures, trailing_slash) {
                return Some(t);
            }
            captures.truncate(mark);
        }

        if let Some((name, node)) = &self.optional_param_child {
            let mark = captures.len();
            captures.push((name.clone(), seg));
            if let Some(t) = node.matches(full_path, segments, pos + 1, captures, trailing_slash) {
                return Some(t);
            }
            captures.truncate(mark);
        }

        if let Some((name, target)) = &self.catch_all {
            captures.push((name.clone(), remainder(full_path, segments, pos)));
            return Some(target);
        }

        if let Some((name, target)) = &self.optional_catch_all {
            captures.push((name.clone(), remainder(full_path, segments, pos)));
            return Some(target);
        }

        None
    }
}

/// Slice `full_path` from the start of `segments[pos]` to the end, covering
/// every remaining segment (and the slashes between them) without
/// allocating. Relies on `segments` being subslices produced by splitting
/// `full_path` itself.
fn remainder<'p>(full_path: &'p str, segments: &[&'p str], pos: usize) -> &'p str {
    let base = full_path.as_ptr() as usize;
    let seg_ptr = segments[pos].as_ptr() as usize;
    let offset = seg_ptr - base;
    &full_path[offset..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{compile_pattern, split_path};

    fn target(id: &str, pattern: &str, param_count: usize) -> RouteTarget {
        RouteTarget {
            handler_id: id.to_string(),
            is_script: true,
            pattern: pattern.to_string(),
            param_count,
        }
    }

    #[test]
    fn catch_all_capture_spans_remaining_segments_without_allocating() {
        let mut root = Node::default();
        root.insert(
            "GET",
            &compile_pattern("/files/*rest"),
            target("h_files", "/files/*rest", 1),
            false,
        )
        .unwrap();

        let full = "files/a/b/c";
        let segments = split_path(full);
        let mut captures = Vec::new();
        let hit = root.matches(full, &segments, 0, &mut captures, false).unwrap();
        assert_eq!(hit.handler_id, "h_files");
        assert_eq!(captures, vec![("rest".to_string(), "a/b/c")]);
    }
}
