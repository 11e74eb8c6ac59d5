//! Path-to-controller routing.
//!
//! Two route shapes:
//! - prefix routes (`/forum/`) match themselves and every child path, with
//!   the longest registered prefix winning;
//! - pattern routes (`/member/{id}`) match exactly, segment for segment,
//!   and extract the named variables.
//!
//! A pattern match beats any prefix match. Extracted variables are merged
//! into the request parameter map before argument binding, overwriting
//! query-string values of the same name.

use crate::binder::ParamMap;
use crate::error::RouteError;

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Var(String),
}

#[derive(Debug, Clone)]
enum Shape {
    Prefix(String),
    Pattern(Vec<Segment>),
}

#[derive(Debug, Clone)]
struct Route {
    shape: Shape,
    controller: String,
}

/// The outcome of matching a request path.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub controller: String,
    pub vars: ParamMap,
}

#[derive(Debug, Clone, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `path` as handled by `controller`. Paths containing `{name}`
    /// segments become pattern routes; everything else is a prefix route.
    pub fn add(&mut self, path: &str, controller: &str) -> Result<(), RouteError> {
        if path.is_empty() {
            return Err(RouteError::EmptyPath);
        }
        let shape = if path.contains('{') {
            let segments = split(path)
                .into_iter()
                .map(|seg| {
                    match seg.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
                        Some(name) => Segment::Var(name.to_string()),
                        None => Segment::Literal(seg.to_string()),
                    }
                })
                .collect();
            Shape::Pattern(segments)
        } else {
            Shape::Prefix(path.trim_matches('/').to_string())
        };
        self.routes.push(Route {
            shape,
            controller: controller.to_string(),
        });
        Ok(())
    }

    /// Controller names referenced by the route table, for build-time
    /// validation.
    pub fn controllers(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|r| r.controller.as_str())
    }

    /// Match `path`, preferring an exact pattern match, then the longest
    /// matching prefix.
    pub fn find(&self, path: &str) -> Option<RouteMatch> {
        let segments = split(path);

        for route in &self.routes {
            if let Shape::Pattern(pattern) = &route.shape {
                if let Some(vars) = match_pattern(pattern, &segments) {
                    return Some(RouteMatch {
                        controller: route.controller.clone(),
                        vars,
                    });
                }
            }
        }

        let mut best: Option<(&Route, usize)> = None;
        for route in &self.routes {
            if let Shape::Prefix(prefix) = &route.shape {
                if matches_prefix(prefix, &segments)
                    && best.map(|(_, len)| prefix.len() > len).unwrap_or(true)
                {
                    best = Some((route, prefix.len()));
                }
            }
        }
        best.map(|(route, _)| RouteMatch {
            controller: route.controller.clone(),
            vars: ParamMap::new(),
        })
    }
}

fn split(path: &str) -> Vec<&str> {
    path.trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect()
}

fn matches_prefix(prefix: &str, segments: &[&str]) -> bool {
    let prefix_segments = split(prefix);
    segments.len() >= prefix_segments.len()
        && prefix_segments
            .iter()
            .zip(segments)
            .all(|(p, s)| p.eq_ignore_ascii_case(s))
}

fn match_pattern(pattern: &[Segment], segments: &[&str]) -> Option<ParamMap> {
    if pattern.len() != segments.len() {
        return None;
    }
    let mut vars = ParamMap::new();
    for (part, seg) in pattern.iter().zip(segments) {
        match part {
            Segment::Literal(lit) => {
                if !lit.eq_ignore_ascii_case(seg) {
                    return None;
                }
            }
            Segment::Var(name) => {
                vars.insert(name.clone(), (*seg).to_string());
            }
        }
    }
    Some(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn router() -> Router {
        let mut r = Router::new();
        r.add("/forum/", "Forum").unwrap();
        r.add("/forum/admin/", "ForumAdmin").unwrap();
        r.add("/member/{id}", "Member").unwrap();
        r
    }

    #[test]
    fn prefix_matches_itself_and_children() {
        let r = router();
        assert_eq!(r.find("/forum").unwrap().controller, "Forum");
        assert_eq!(r.find("/forum/topic/12").unwrap().controller, "Forum");
    }

    #[test]
    fn longest_prefix_wins() {
        let r = router();
        assert_eq!(r.find("/forum/admin/users").unwrap().controller, "ForumAdmin");
        assert_eq!(r.find("/forum/topic").unwrap().controller, "Forum");
    }

    #[test]
    fn pattern_matches_exactly_and_extracts_vars() {
        let r = router();
        let m = r.find("/member/42").unwrap();
        assert_eq!(m.controller, "Member");
        assert_eq!(m.vars.get("id").map(String::as_str), Some("42"));

        // Pattern routes never match children.
        assert!(r.find("/member/42/posts").is_none());
    }

    #[test]
    fn matching_is_case_insensitive() {
        let r = router();
        assert_eq!(r.find("/Forum/Topic").unwrap().controller, "Forum");
    }

    #[test]
    fn unrouted_paths_yield_none() {
        let r = router();
        assert!(r.find("/blog").is_none());
        assert!(r.find("/").is_none());
    }

    #[test]
    fn empty_path_is_rejected() {
        let mut r = Router::new();
        assert!(matches!(r.add("", "Home"), Err(RouteError::EmptyPath)));
    }
}
