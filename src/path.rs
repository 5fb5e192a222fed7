//! Route path patterns.
//!
//! A pattern is a `/`-separated list of segments:
//!
//! | Segment | Matches | Example |
//! |---|---|---|
//! | literal | exactly that text (case-sensitive) | `/users` |
//! | `:name` | one non-empty segment, captured as `name` | `/users/:id` |
//! | `*name` | the rest of the path, final segment only | `/static/*file` |
//!
//! Each pattern is compiled into its own single-route [`matchit`] tree, so the
//! router can evaluate overlapping patterns one by one in registration order
//! instead of asking one shared tree for the "best" match.

use std::collections::{HashMap, HashSet};

use matchit::Router as MatchitRouter;

use crate::error::Error;

/// Named captures from a matched path, keyed by parameter name.
pub type Params = HashMap<String, String>;

/// A compiled route pattern.
pub struct PathMatcher {
    pattern: String,
    tree: MatchitRouter<()>,
}

impl PathMatcher {
    /// Compiles `pattern`, failing if it is malformed.
    ///
    /// ```rust
    /// use veslo::PathMatcher;
    ///
    /// let m = PathMatcher::compile("/test/:which/:id").unwrap();
    /// let params = m.matches("/test/a/10").unwrap();
    /// assert_eq!(params["which"], "a");
    /// assert_eq!(params["id"], "10");
    /// assert!(m.matches("/test/a").is_none());
    /// ```
    pub fn compile(pattern: &str) -> Result<Self, Error> {
        let route = translate(pattern)?;
        let mut tree = MatchitRouter::new();
        tree.insert(route, ())
            .map_err(|e| invalid(pattern, e.to_string()))?;
        Ok(Self { pattern: pattern.to_owned(), tree })
    }

    /// The pattern as it was registered.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Matches a request path, returning the percent-decoded captures.
    ///
    /// A single trailing `/` on the path is tolerated. A capture that does not
    /// decode to valid UTF-8 makes the whole path non-matching.
    pub fn matches(&self, path: &str) -> Option<Params> {
        let matched = match self.tree.at(path) {
            Ok(m) => m,
            Err(_) => {
                let trimmed = path.strip_suffix('/').filter(|p| !p.is_empty())?;
                self.tree.at(trimmed).ok()?
            }
        };

        matched
            .params
            .iter()
            .map(|(name, raw)| {
                let value = urlencoding::decode(raw).ok()?;
                Some((name.to_owned(), value.into_owned()))
            })
            .collect()
    }
}

impl std::fmt::Debug for PathMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PathMatcher").field(&self.pattern).finish()
    }
}

/// Rewrites `:name` / `*name` segments into matchit's `{name}` / `{*name}` syntax.
fn translate(pattern: &str) -> Result<String, Error> {
    if !pattern.starts_with('/') {
        return Err(invalid(pattern, "must start with `/`"));
    }
    if pattern.contains(['{', '}']) {
        return Err(invalid(pattern, "braces are not allowed"));
    }

    let segments: Vec<&str> = pattern.split('/').skip(1).collect();
    let last = segments.len() - 1;
    let mut seen = HashSet::new();
    let mut out = String::with_capacity(pattern.len() + 2 * segments.len());

    for (i, segment) in segments.iter().copied().enumerate() {
        out.push('/');
        if let Some(name) = segment.strip_prefix(':') {
            check_name(pattern, name, &mut seen)?;
            out.push('{');
            out.push_str(name);
            out.push('}');
        } else if let Some(name) = segment.strip_prefix('*') {
            if i != last {
                return Err(invalid(pattern, "catch-all must be the final segment"));
            }
            check_name(pattern, name, &mut seen)?;
            out.push_str("{*");
            out.push_str(name);
            out.push('}');
        } else {
            out.push_str(segment);
        }
    }

    Ok(out)
}

fn check_name<'p>(pattern: &str, name: &'p str, seen: &mut HashSet<&'p str>) -> Result<(), Error> {
    if name.is_empty() {
        return Err(invalid(pattern, "parameter name is empty"));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid(pattern, format!("parameter name `{name}` is not an identifier")));
    }
    if !seen.insert(name) {
        return Err(invalid(pattern, format!("parameter `{name}` appears twice")));
    }
    Ok(())
}

fn invalid(pattern: &str, reason: impl Into<String>) -> Error {
    Error::InvalidRoute { pattern: pattern.to_owned(), reason: reason.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_match_exactly() {
        let m = PathMatcher::compile("/testget").unwrap();
        assert_eq!(m.matches("/testget"), Some(Params::new()));
        assert_eq!(m.matches("/testget/"), Some(Params::new()));
        assert!(m.matches("/TestGet").is_none());
        assert!(m.matches("/testget/more").is_none());
    }

    #[test]
    fn root_pattern() {
        let m = PathMatcher::compile("/").unwrap();
        assert!(m.matches("/").is_some());
        assert!(m.matches("/x").is_none());
    }

    #[test]
    fn named_segments_are_captured_in_order() {
        let m = PathMatcher::compile("/test/:which/:id").unwrap();
        let params = m.matches("/test/a/10").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params["which"], "a");
        assert_eq!(params["id"], "10");
    }

    #[test]
    fn captures_are_percent_decoded() {
        let m = PathMatcher::compile("/files/:name").unwrap();
        let params = m.matches("/files/hello%20world").unwrap();
        assert_eq!(params["name"], "hello world");
    }

    #[test]
    fn undecodable_capture_is_a_miss() {
        let m = PathMatcher::compile("/files/:name").unwrap();
        assert!(m.matches("/files/%FF%FE").is_none());
    }

    #[test]
    fn catch_all_takes_the_tail() {
        let m = PathMatcher::compile("/static/*file").unwrap();
        let params = m.matches("/static/css/site.css").unwrap();
        assert_eq!(params["file"], "css/site.css");
    }

    #[test]
    fn malformed_patterns_fail_at_compile_time() {
        for bad in ["", "users", "/users/:", "/a/:id/:id", "/a/{id}", "/a/*rest/b", "/a/:i-d"] {
            assert!(
                matches!(PathMatcher::compile(bad), Err(Error::InvalidRoute { .. })),
                "`{bad}` should be rejected"
            );
        }
    }
}
