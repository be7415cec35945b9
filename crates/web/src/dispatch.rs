//! Path dispatch for incoming requests.
//!
//! A [`DispatchTable`] maps a request's logical path, or a handler's logical name, to a
//! handler. It is assembled once through [`DispatchTableBuilder`] and never changes
//! afterwards, so it can be shared between connections behind an `Arc`.
//!
//! Resolution by path tries, in order:
//!
//! 1. an exact match on the whole path
//! 2. the whole path used as a prefix key
//! 3. every shorter prefix obtained by cutting the path before a `/`, longest first
//!    (`/a/b/c` tries `/a/b`, `/a`, then the empty prefix)
//! 4. the table default handler
//!
//! When a prefix hits, its extension handlers are consulted with the text after the last
//! `.` in the path. An unknown extension falls back to the prefix's own default, which may
//! be absent. Prefixes are matched literally, `/docs` and `/docs/` are different keys.
//!
//! ```
//! use ferry_web::dispatch::DispatchTable;
//!
//! let table = DispatchTable::builder()
//!     .add_exact_match("/index", "index")
//!     .add_prefix_match("/static", "files")
//!     .add_extension_match("/static", "css", "stylesheets")
//!     .set_default_handler("fallback")
//!     .build();
//!
//! assert_eq!(table.resolve_by_path("/index"), Some(&"index"));
//! assert_eq!(table.resolve_by_path("/static/site.css"), Some(&"stylesheets"));
//! assert_eq!(table.resolve_by_path("/static/logo.png"), Some(&"files"));
//! assert_eq!(table.resolve_by_path("/elsewhere"), Some(&"fallback"));
//! ```

use std::collections::HashMap;
use std::fmt;

use tracing::trace;

/// Handlers registered under one prefix.
struct PrefixMatch<H> {
    default_handler: Option<H>,
    extension_matches: HashMap<String, H>,
}

impl<H> PrefixMatch<H> {
    fn new(default_handler: Option<H>) -> Self {
        Self { default_handler, extension_matches: HashMap::new() }
    }

    fn resolve(&self, path: &str) -> Option<&H> {
        if self.extension_matches.is_empty() {
            return self.default_handler.as_ref();
        }

        match path.rfind('.') {
            Some(dot) => self.extension_matches.get(&path[dot + 1..]).or(self.default_handler.as_ref()),
            None => self.default_handler.as_ref(),
        }
    }
}

/// Immutable path and name lookup, see the [module docs](self) for the precedence rules.
pub struct DispatchTable<H> {
    exact_matches: HashMap<String, H>,
    prefix_matches: HashMap<String, PrefixMatch<H>>,
    name_matches: HashMap<String, H>,
    default_handler: Option<H>,
}

impl<H> DispatchTable<H> {
    pub fn builder() -> DispatchTableBuilder<H> {
        DispatchTableBuilder::new()
    }

    /// Finds the handler for a request path.
    pub fn resolve_by_path(&self, path: &str) -> Option<&H> {
        if let Some(handler) = self.exact_matches.get(path) {
            trace!(path, "exact match");
            return Some(handler);
        }

        if let Some(prefix_match) = self.prefix_matches.get(path) {
            return prefix_match.resolve(path);
        }

        for (index, _) in path.rmatch_indices('/') {
            if let Some(prefix_match) = self.prefix_matches.get(&path[..index]) {
                trace!(path, prefix = &path[..index], "prefix match");
                return prefix_match.resolve(path);
            }
        }

        self.default_handler.as_ref()
    }

    /// Finds a handler by its logical name. Names never fall back to the default handler.
    pub fn resolve_by_name(&self, name: &str) -> Option<&H> {
        self.name_matches.get(name)
    }
}

impl<H> fmt::Debug for DispatchTable<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable")
            .field("exact_matches", &self.exact_matches.keys().collect::<Vec<_>>())
            .field("prefix_matches", &self.prefix_matches.keys().collect::<Vec<_>>())
            .field("name_matches", &self.name_matches.keys().collect::<Vec<_>>())
            .field("has_default", &self.default_handler.is_some())
            .finish()
    }
}

/// Collects registrations for a [`DispatchTable`].
pub struct DispatchTableBuilder<H> {
    exact_matches: HashMap<String, H>,
    prefix_matches: HashMap<String, PrefixMatch<H>>,
    name_matches: HashMap<String, H>,
    default_handler: Option<H>,
}

impl<H> DispatchTableBuilder<H> {
    fn new() -> Self {
        Self {
            exact_matches: HashMap::new(),
            prefix_matches: HashMap::new(),
            name_matches: HashMap::new(),
            default_handler: None,
        }
    }

    pub fn add_exact_match(mut self, path: impl Into<String>, handler: H) -> Self {
        self.exact_matches.insert(path.into(), handler);
        self
    }

    /// Registers the default handler of `prefix`.
    ///
    /// Registering the same prefix again replaces its default handler and keeps the
    /// extension handlers already added to it.
    pub fn add_prefix_match(mut self, prefix: impl Into<String>, handler: H) -> Self {
        self.prefix_matches.entry(prefix.into()).or_insert_with(|| PrefixMatch::new(None)).default_handler =
            Some(handler);
        self
    }

    /// Registers a handler for paths under `prefix` ending in `.extension`.
    ///
    /// `extension` is given without the dot. The prefix is created without a default
    /// handler if it isn't registered yet.
    pub fn add_extension_match(mut self, prefix: impl Into<String>, extension: impl Into<String>, handler: H) -> Self {
        self.prefix_matches
            .entry(prefix.into())
            .or_insert_with(|| PrefixMatch::new(None))
            .extension_matches
            .insert(extension.into(), handler);
        self
    }

    pub fn add_name_match(mut self, name: impl Into<String>, handler: H) -> Self {
        self.name_matches.insert(name.into(), handler);
        self
    }

    /// Sets the handler used when no exact or prefix match applies. A later call replaces
    /// the earlier one.
    pub fn set_default_handler(mut self, handler: H) -> Self {
        self.default_handler = Some(handler);
        self
    }

    pub fn build(self) -> DispatchTable<H> {
        DispatchTable {
            exact_matches: self.exact_matches,
            prefix_matches: self.prefix_matches,
            name_matches: self.name_matches,
            default_handler: self.default_handler,
        }
    }
}

impl<H> Default for DispatchTableBuilder<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H> fmt::Debug for DispatchTableBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTableBuilder")
            .field("exact_matches", &self.exact_matches.len())
            .field("prefix_matches", &self.prefix_matches.len())
            .field("name_matches", &self.name_matches.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn table() -> DispatchTable<&'static str> {
        DispatchTable::builder()
            .add_exact_match("/a/b", "exact")
            .add_prefix_match("/a", "prefix")
            .add_extension_match("/a", "jsp", "jsp")
            .add_prefix_match("", "root")
            .add_name_match("servlet", "named")
            .set_default_handler("default")
            .build()
    }

    #[test]
    fn exact_beats_prefix() {
        let table = table();
        assert_eq!(table.resolve_by_path("/a/b"), Some(&"exact"));
    }

    #[test]
    fn longest_prefix_then_extension() {
        let table = table();
        assert_eq!(table.resolve_by_path("/a/b/c"), Some(&"prefix"));
        assert_eq!(table.resolve_by_path("/a/x.jsp"), Some(&"jsp"));
        assert_eq!(table.resolve_by_path("/a/x.html"), Some(&"prefix"));
        assert_eq!(table.resolve_by_path("/a"), Some(&"prefix"));
    }

    #[test]
    fn empty_prefix_catches_everything_below_root() {
        let table = table();
        assert_eq!(table.resolve_by_path("/other"), Some(&"root"));
        assert_eq!(table.resolve_by_path("/other/deeper"), Some(&"root"));
    }

    #[test]
    fn default_only_without_any_prefix() {
        let table = DispatchTable::builder().add_prefix_match("/api", "api").set_default_handler("default").build();

        assert_eq!(table.resolve_by_path("/api/users"), Some(&"api"));
        assert_eq!(table.resolve_by_path("/apiv2"), Some(&"default"));
        assert_eq!(table.resolve_by_path("no-slash"), Some(&"default"));
    }

    #[test]
    fn prefixes_are_literal() {
        let table = DispatchTable::builder().add_prefix_match("/docs/", "slash").build();

        assert_eq!(table.resolve_by_path("/docs/"), Some(&"slash"));
        assert_eq!(table.resolve_by_path("/docs/x"), None);
        assert_eq!(table.resolve_by_path("/docs//x"), Some(&"slash"));
    }

    #[test]
    fn extension_only_prefix_may_resolve_to_nothing() {
        let table = DispatchTable::builder()
            .add_extension_match("/img", "png", "png")
            .set_default_handler("default")
            .build();

        assert_eq!(table.resolve_by_path("/img/logo.png"), Some(&"png"));
        assert_eq!(table.resolve_by_path("/img/logo.gif"), None);
        assert_eq!(table.resolve_by_path("/img/logo"), None);
    }

    #[test]
    fn extension_is_taken_after_the_last_dot() {
        let table = DispatchTable::builder()
            .add_prefix_match("/files", "files")
            .add_extension_match("/files", "gz", "gzip")
            .add_extension_match("/files", "tar.gz", "never")
            .build();

        assert_eq!(table.resolve_by_path("/files/backup.tar.gz"), Some(&"gzip"));
        assert_eq!(table.resolve_by_path("/files/v1.2/readme"), Some(&"files"));
    }

    #[test]
    fn last_prefix_registration_wins() {
        let table = DispatchTable::builder()
            .add_prefix_match("/p", "first")
            .add_extension_match("/p", "txt", "text")
            .add_prefix_match("/p", "second")
            .build();

        assert_eq!(table.resolve_by_path("/p/readme"), Some(&"second"));
        assert_eq!(table.resolve_by_path("/p/readme.txt"), Some(&"text"));
    }

    #[test]
    fn names_have_no_precedence_logic() {
        let table = table();
        assert_eq!(table.resolve_by_name("servlet"), Some(&"named"));
        assert_eq!(table.resolve_by_name("/a/b"), None);
        assert_eq!(table.resolve_by_name("missing"), None);
    }

    #[test]
    fn no_default_means_no_handler() {
        let table = DispatchTable::builder().add_exact_match("/only", "only").build();
        assert_eq!(table.resolve_by_path("/only"), Some(&"only"));
        assert_eq!(table.resolve_by_path("/other"), None);
        assert_eq!(table.resolve_by_path(""), None);
    }

    #[test]
    fn later_default_replaces_earlier() {
        let table = DispatchTable::builder().set_default_handler("one").set_default_handler("two").build();
        assert_eq!(table.resolve_by_path("/x"), Some(&"two"));
    }

    #[test]
    fn shared_across_threads() {
        fn check_send_sync<T: Send + Sync>() {}
        check_send_sync::<DispatchTable<Box<dyn Fn() + Send + Sync>>>();

        let table = Arc::new(table());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || table.resolve_by_path("/a/x.jsp").copied())
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some("jsp"));
        }
    }
}
