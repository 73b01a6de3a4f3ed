//! Decides which directory entries are visible to the build.
//!
//! Two rules apply to every entry name, in order:
//!
//! 1. Hidden and backup names (leading `.`, `_` or `#`, trailing `~`) are
//!    dropped, except for `_posts` and `.htaccess`.
//! 2. Names matching any caller-supplied ignore pattern are dropped. The
//!    allow-list of rule 1 does not protect against this rule.

use regex::Regex;

/// Directory holding dated posts, at any depth of the source tree.
pub const POSTS_DIR: &str = "_posts";

/// Server configuration file that is published even though it's hidden.
pub const HTACCESS: &str = ".htaccess";

/// Returns whether `entry` is a hidden, backup, or site-control name.
pub fn is_hidden(entry: &str) -> bool {
    if entry == POSTS_DIR || entry == HTACCESS {
        return false;
    }
    entry.starts_with('.') || entry.starts_with('_') || entry.starts_with('#') || entry.ends_with('~')
}

/// Filters entry names by the hidden-name rule and a set of ignore patterns.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    ignore: Option<Regex>,
}

impl EntryFilter {
    /// Builds a filter from regex fragments. The fragments are combined with
    /// alternation; blank fragments are skipped.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<EntryFilter, regex::Error> {
        let fragments: Vec<String> = patterns
            .iter()
            .map(|p| p.as_ref().trim())
            .filter(|p| !p.is_empty())
            .map(|p| format!("(?:{})", p))
            .collect();

        let ignore = match fragments.is_empty() {
            true => None,
            false => Some(Regex::new(&fragments.join("|"))?),
        };
        Ok(EntryFilter { ignore })
    }

    /// Returns whether the entry named `entry` takes part in the build.
    pub fn allows(&self, entry: &str) -> bool {
        if is_hidden(entry) {
            return false;
        }
        match &self.ignore {
            Some(ignore) => !ignore.is_match(entry),
            None => true,
        }
    }

    /// Returns the allowed entries, preserving their relative order.
    pub fn filter<I, S>(&self, entries: I) -> Vec<S>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        entries
            .into_iter()
            .filter(|e| self.allows(e.as_ref()))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_filter_hidden_and_backup() {
        let filter = EntryFilter::default();
        let entries = vec!["foo.md", "bar.md", "#baz.md#", ".baz.md", "foo.md~"];
        assert_eq!(filter.filter(entries), vec!["foo.md", "bar.md"]);
    }

    #[test]
    fn test_filter_allow_list() {
        let filter = EntryFilter::default();
        let entries = vec![".htaccess", "_posts", "bla.bla"];
        assert_eq!(filter.filter(entries.clone()), entries);
    }

    #[test]
    fn test_filter_underscore_directories() {
        let filter = EntryFilter::default();
        assert!(!filter.allows("_layouts"));
        assert!(!filter.allows("_includes"));
        assert!(!filter.allows("_site"));
    }

    #[test]
    fn test_filter_ignore_patterns() {
        let filter = EntryFilter::new(&["^Capfile$", "^config$", "\\.bak$"]).unwrap();
        let entries = vec!["Capfile", "config", "config.rb", "a.bak", "index.html"];
        assert_eq!(filter.filter(entries), vec!["config.rb", "index.html"]);
    }

    #[test]
    fn test_ignore_pattern_overrides_allow_list() {
        let filter = EntryFilter::new(&["^_posts$"]).unwrap();
        assert!(!filter.allows("_posts"));
        assert!(filter.allows(".htaccess"));
    }

    #[test]
    fn test_blank_patterns_ignored() {
        let filter = EntryFilter::new(&["", "  "]).unwrap();
        assert!(filter.allows("anything"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(EntryFilter::new(&["(unclosed"]).is_err());
    }
}
