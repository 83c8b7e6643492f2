//! reef-router: Zero-dependency segment trie HTTP router
//!
//! One trie per HTTP method. Each node level is one path segment.
//!
//! ## Features
//! - O(k) lookup where k = number of path segments
//! - Static paths: `/users`, `/api/v1/health`
//! - Variables: `/users/:id`, `/posts/:postId/comments/:commentId`
//! - Zero external dependencies
//!
//! ## Path Syntax
//! - `:name` - Path variable (captures exactly one segment)
//!
//! ## Priority
//! 1. Literal segment match
//! 2. Variable match (only when no literal child exists)
//!
//! Lookup never backtracks: once a literal child is chosen, a later miss
//! is a miss for the whole path.
//!
//! ## Example
//! ```
//! use reef_router::Router;
//!
//! let mut router = Router::new();
//! router.insert("GET", "/users", 0);
//! router.insert("GET", "/users/:id", 1);
//!
//! let m = router.find("GET", "/users/123").unwrap();
//! assert_eq!(*m.value, 1);
//! assert_eq!(m.params, vec![("id".to_string(), "123".to_string())]);
//! ```

use std::collections::HashMap;

/// Prefix that marks a path variable segment
pub const VARIABLE_MARKER: char = ':';

/// Split a path into trie segments.
///
/// Leading and trailing `/` are stripped before splitting, so `/` and the
/// empty string both yield a single empty segment (the root route).
///
/// ```
/// assert_eq!(reef_router::segments("/users/42/"), vec!["users", "42"]);
/// assert_eq!(reef_router::segments("/"), vec![""]);
/// ```
pub fn segments(path: &str) -> Vec<&str> {
    path.trim_matches('/').split('/').collect()
}

/// Route match result
#[derive(Debug, Clone, PartialEq)]
pub struct Match<'a, T> {
    /// The value registered at the matched node
    pub value: &'a T,
    /// Captured path variables as (name, value) pairs, outermost first
    pub params: Vec<(String, String)>,
}

impl<T> Match<'_, T> {
    /// Get params as HashMap for convenient access
    pub fn params_map(&self) -> HashMap<String, String> {
        self.params.iter().cloned().collect()
    }
}

/// Trie node for one segment level of one method
#[derive(Debug)]
struct Node<T> {
    /// Literal children (key = exact segment)
    children: HashMap<String, Node<T>>,
    /// Single variable child (matches any one segment)
    wildcard: Option<Box<Node<T>>>,
    /// Variable name bound by `wildcard`, recorded on the parent
    var_name: Option<String>,
    /// Registered value; `None` for intermediate nodes
    value: Option<T>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            children: HashMap::new(),
            wildcard: None,
            var_name: None,
            value: None,
        }
    }
}

impl<T> Node<T> {
    fn insert(&mut self, path: &str, value: T) {
        let mut node = self;

        for segment in segments(path) {
            node = match segment.strip_prefix(VARIABLE_MARKER) {
                Some(name) => {
                    if node.wildcard.is_none() {
                        node.var_name = Some(name.to_string());
                    }
                    &mut **node.wildcard.get_or_insert_with(Box::default)
                }
                None => node.children.entry(segment.to_string()).or_default(),
            };
        }

        node.value = Some(value);
    }

    fn find<S: AsRef<str>>(&self, segments: impl IntoIterator<Item = S>) -> Option<Match<'_, T>> {
        let mut node = self;
        let mut params = Vec::new();

        for segment in segments {
            let segment = segment.as_ref();
            node = match node.children.get(segment) {
                Some(child) => child,
                None => {
                    let child = node.wildcard.as_deref()?;
                    let name = node.var_name.clone().unwrap_or_default();
                    params.push((name, segment.to_string()));
                    child
                }
            };
        }

        node.value.as_ref().map(|value| Match { value, params })
    }
}

/// Zero-dependency segment trie HTTP router
///
/// Routes are organized by HTTP method for O(1) method dispatch,
/// then matched segment by segment.
#[derive(Debug)]
pub struct Router<T> {
    /// Method -> Trie root
    trees: HashMap<String, Node<T>>,
}

impl<T> Default for Router<T> {
    fn default() -> Self {
        Self {
            trees: HashMap::new(),
        }
    }
}

impl<T> Router<T> {
    /// Create a new router
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a route
    ///
    /// Registering the same method and path twice replaces the earlier
    /// value.
    ///
    /// # Arguments
    /// * `method` - HTTP method (GET, POST, etc.), case-insensitive
    /// * `path` - URL path with optional variables (`:id`)
    /// * `value` - Value returned on match
    pub fn insert(&mut self, method: &str, path: &str, value: T) {
        self.trees
            .entry(method.to_uppercase())
            .or_default()
            .insert(path, value);
    }

    /// Find a matching route
    ///
    /// # Returns
    /// `Some(Match)` with the registered value and captured variables, or
    /// `None` if no registered node matches
    ///
    /// ```
    /// use reef_router::Router;
    ///
    /// let mut router = Router::new();
    /// router.insert("GET", "/users/:id", "show");
    ///
    /// let m = router.find("GET", "/users/42").unwrap();
    /// assert_eq!(*m.value, "show");
    /// assert_eq!(m.params[0], ("id".to_string(), "42".to_string()));
    /// assert!(router.find("GET", "/users/42/more").is_none());
    /// ```
    pub fn find(&self, method: &str, path: &str) -> Option<Match<'_, T>> {
        self.find_segments(method, segments(path))
    }

    /// Find a route from an already split path
    ///
    /// Lets callers transform segments (e.g. percent-decode them) before
    /// matching. Captured variables hold the segments as given.
    ///
    /// ```
    /// use reef_router::Router;
    ///
    /// let mut router = Router::new();
    /// router.insert("GET", "/files/:name", ());
    ///
    /// let m = router.find_segments("GET", ["files", "a b.txt"]).unwrap();
    /// assert_eq!(m.params[0].1, "a b.txt");
    /// ```
    pub fn find_segments<S: AsRef<str>>(
        &self,
        method: &str,
        segments: impl IntoIterator<Item = S>,
    ) -> Option<Match<'_, T>> {
        self.trees.get(&method.to_uppercase())?.find(segments)
    }

    /// Check if a method has any routes registered
    pub fn has_method(&self, method: &str) -> bool {
        self.trees.contains_key(&method.to_uppercase())
    }

    /// Get all registered methods
    pub fn methods(&self) -> Vec<String> {
        self.trees.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments() {
        assert_eq!(segments(""), vec![""]);
        assert_eq!(segments("/"), vec![""]);
        assert_eq!(segments("users"), vec!["users"]);
        assert_eq!(segments("/users/:id/"), vec!["users", ":id"]);
        assert_eq!(segments("//a//b"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_static_routes() {
        let mut router = Router::new();
        router.insert("GET", "/", 0);
        router.insert("GET", "/users", 1);
        router.insert("GET", "/users/list", 2);
        router.insert("POST", "/users", 3);

        assert_eq!(*router.find("GET", "/").unwrap().value, 0);
        assert_eq!(*router.find("GET", "/users").unwrap().value, 1);
        assert_eq!(*router.find("GET", "/users/list").unwrap().value, 2);
        assert_eq!(*router.find("POST", "/users").unwrap().value, 3);
        assert!(router.find("GET", "/unknown").is_none());
        assert!(router.find("DELETE", "/users").is_none());
    }

    #[test]
    fn test_last_registration_wins() {
        let mut router = Router::new();
        router.insert("GET", "/users", 1);
        router.insert("GET", "/users", 2);

        assert_eq!(*router.find("GET", "/users").unwrap().value, 2);
    }

    #[test]
    fn test_wrong_method_not_found() {
        let mut router = Router::new();
        router.insert("PUT", "/users/:id", 1);

        assert!(router.find("PUT", "/users/1").is_some());
        assert!(router.find("PATCH", "/users/1").is_none());
    }

    #[test]
    fn test_variable_routes() {
        let mut router = Router::new();
        router.insert("GET", "/users/:id", 1);
        router.insert("GET", "/users/:id/posts/:post_id", 2);

        let m = router.find("GET", "/users/42").unwrap();
        assert_eq!(*m.value, 1);
        assert_eq!(m.params, vec![("id".to_string(), "42".to_string())]);

        let m = router.find("GET", "/users/42/posts/99").unwrap();
        assert_eq!(*m.value, 2);
        assert_eq!(
            m.params,
            vec![
                ("id".to_string(), "42".to_string()),
                ("post_id".to_string(), "99".to_string()),
            ]
        );
    }

    #[test]
    fn test_extra_segment_not_found() {
        let mut router = Router::new();
        router.insert("GET", "/users/:id", 1);

        assert!(router.find("GET", "/users/42/more").is_none());
    }

    #[test]
    fn test_priority_literal_over_variable() {
        let mut router = Router::new();
        router.insert("GET", "/users/:id", 1);
        router.insert("GET", "/users/me", 2);

        let m = router.find("GET", "/users/me").unwrap();
        assert_eq!(*m.value, 2);
        assert!(m.params.is_empty());
        assert_eq!(*router.find("GET", "/users/123").unwrap().value, 1);
    }

    #[test]
    fn test_no_backtracking_after_literal() {
        let mut router = Router::new();
        router.insert("GET", "/users/me/settings", 1);
        router.insert("GET", "/users/:id/profile", 2);

        // "me" takes the literal branch, which has no "profile" child
        assert!(router.find("GET", "/users/me/profile").is_none());
        assert_eq!(*router.find("GET", "/users/7/profile").unwrap().value, 2);
    }

    #[test]
    fn test_first_variable_name_sticks() {
        let mut router = Router::new();
        router.insert("GET", "/items/:id", 1);
        router.insert("GET", "/items/:item_id/tags", 2);

        let m = router.find("GET", "/items/5/tags").unwrap();
        assert_eq!(m.params, vec![("id".to_string(), "5".to_string())]);
    }

    #[test]
    fn test_intermediate_node_not_found() {
        let mut router = Router::new();
        router.insert("GET", "/api/v1/health", 1);

        assert!(router.find("GET", "/api").is_none());
        assert!(router.find("GET", "/api/v1").is_none());
    }

    #[test]
    fn test_registered_empty_value_found() {
        let mut router: Router<Vec<u32>> = Router::new();
        router.insert("GET", "/noop", Vec::new());

        let m = router.find("GET", "/noop").unwrap();
        assert!(m.value.is_empty());
    }

    #[test]
    fn test_complex_nested_params() {
        let mut router = Router::new();
        router.insert(
            "GET",
            "/api/v1/orgs/:orgId/teams/:teamId/members/:memberId",
            1,
        );

        let m = router
            .find("GET", "/api/v1/orgs/org1/teams/team2/members/mem3")
            .unwrap();
        assert_eq!(*m.value, 1);
        assert_eq!(
            m.params,
            vec![
                ("orgId".to_string(), "org1".to_string()),
                ("teamId".to_string(), "team2".to_string()),
                ("memberId".to_string(), "mem3".to_string()),
            ]
        );
    }

    #[test]
    fn test_params_map() {
        let mut router = Router::new();
        router.insert("GET", "/users/:id", 1);

        let m = router.find("GET", "/users/42").unwrap();
        let map = m.params_map();
        assert_eq!(map.get("id"), Some(&"42".to_string()));
    }

    #[test]
    fn test_methods() {
        let mut router = Router::new();
        router.insert("GET", "/users", 1);
        router.insert("POST", "/users", 2);
        router.insert("DELETE", "/users/:id", 3);

        assert!(router.has_method("GET"));
        assert!(router.has_method("POST"));
        assert!(router.has_method("DELETE"));
        assert!(!router.has_method("PUT"));

        let methods = router.methods();
        assert!(methods.contains(&"GET".to_string()));
        assert!(methods.contains(&"POST".to_string()));
        assert!(methods.contains(&"DELETE".to_string()));
    }

    #[test]
    fn test_case_insensitive_method() {
        let mut router = Router::new();
        router.insert("get", "/users", 1);

        assert_eq!(*router.find("GET", "/users").unwrap().value, 1);
        assert_eq!(*router.find("get", "/users").unwrap().value, 1);
        assert_eq!(*router.find("Get", "/users").unwrap().value, 1);
    }

    #[test]
    fn test_find_segments_owned() {
        let mut router = Router::new();
        router.insert("GET", "/café/:name", 1);

        let segs = vec!["café".to_string(), "john doe".to_string()];
        let m = router.find_segments("GET", segs).unwrap();
        assert_eq!(*m.value, 1);
        assert_eq!(m.params, vec![("name".to_string(), "john doe".to_string())]);
        assert!(router.find_segments("GET", ["caf%C3%A9", "x"]).is_none());
    }

    #[test]
    fn test_root_path() {
        let mut router = Router::new();
        router.insert("GET", "/", 0);
        router.insert("GET", "/api", 1);

        assert_eq!(*router.find("GET", "").unwrap().value, 0);
        assert_eq!(*router.find("GET", "/").unwrap().value, 0);
        assert_eq!(*router.find("GET", "/api").unwrap().value, 1);
    }

    #[test]
    fn test_trailing_slash() {
        let mut router = Router::new();
        router.insert("GET", "/users/", 1);

        assert_eq!(*router.find("GET", "/users").unwrap().value, 1);
        assert_eq!(*router.find("GET", "/users/").unwrap().value, 1);
    }
}
