//! The `include` template extension.
//!
//! `{% include nav.html %}` renders `<includes>/nav.html` in place, sharing the
//! variables of the template it appears in. `{% include from page.sidebar %}`
//! takes the file name from a variable instead.
//!
//! Names are restricted to `[A-Za-z0-9_/.-]` and may contain neither `./` nor
//! `/.`, which rules out `..` traversal and hidden path segments. Candidates
//! are found by walking the includes directory without following symbolic
//! links, so a symlink is never a match. Rejected and missing names render an
//! inline diagnostic instead of failing the build, which keeps broken includes
//! visible in the generated pages.

use crate::template::{Error, Result, Scope, TemplateExtension};
use gtmpl_value::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Renders the diagnostic for a name that fails validation.
pub fn invalid_name(name: &str) -> String {
    format!("Include file '{}' contains invalid characters or sequences", name)
}

/// Renders the diagnostic for a name with no matching file.
pub fn not_found(name: &str) -> String {
    format!("Included file '{}' not found in _includes directory", name)
}

/// Returns whether `name` may be used to look up an include.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.' | '-'))
        && !name.contains("./")
        && !name.contains("/.")
}

/// Resolves and renders includes from a single directory.
#[derive(Debug, Clone)]
pub struct IncludeTag {
    directory: PathBuf,
}

impl IncludeTag {
    pub fn new<P: Into<PathBuf>>(directory: P) -> IncludeTag {
        IncludeTag {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Finds the regular file whose path relative to the includes directory
    /// is exactly `name`. Hidden entries and symlinks are never candidates, and
    /// a missing includes directory has no candidates at all.
    pub fn resolve(&self, name: &str) -> Result<Option<PathBuf>> {
        let walker = WalkDir::new(&self.directory)
            .follow_links(false)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if is_not_found(&err) => return Ok(None),
                Err(err) => return Err(Error::Walk(err)),
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.directory) {
                if relative_name(relative) == name {
                    return Ok(Some(entry.into_path()));
                }
            }
        }
        Ok(None)
    }

    fn requested_name(&self, args: &str, scope: &Scope<'_>) -> String {
        let mut words = args.split_whitespace();
        match (words.next(), words.next()) {
            (Some("from"), Some(variable)) => match scope.lookup(variable) {
                Some(Value::String(name)) => name.clone(),
                _ => String::new(),
            },
            _ => args.trim().to_owned(),
        }
    }
}

impl TemplateExtension for IncludeTag {
    fn name(&self) -> &str {
        "include"
    }

    fn render(&self, args: &str, scope: &Scope<'_>) -> Result<String> {
        let name = self.requested_name(args, scope);
        if !is_valid_name(&name) {
            return Ok(invalid_name(&name));
        }

        match self.resolve(&name)? {
            None => Ok(not_found(&name)),
            Some(path) => {
                let source = fs::read_to_string(&path).map_err(|err| Error::Include {
                    path: path.clone(),
                    err,
                })?;
                scope.render(&source)
            }
        }
    }
}

fn relative_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_not_found(err: &walkdir::Error) -> bool {
    err.depth() == 0 && err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::template::{context, empty_context, render, Extensions};
    use crate::value::object;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Extensions) {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("nav.html"), "NAV").unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/footer.html"), "FOOT {% include nav.html %}").unwrap();
        fs::write(tmp.path().join(".hidden"), "HIDDEN").unwrap();
        let mut extensions = Extensions::new();
        extensions.register(IncludeTag::new(tmp.path()));
        (tmp, extensions)
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("nav.html"));
        assert!(is_valid_name("sub/dir/file-1_a.html"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("../secret"));
        assert!(!is_valid_name("a/./b"));
        assert!(!is_valid_name("a/.hidden"));
        assert!(!is_valid_name("a b"));
        assert!(!is_valid_name("a;rm"));
    }

    #[test]
    fn test_include_renders_file() {
        let (_tmp, extensions) = setup();
        let out = render("[{% include nav.html %}]", &empty_context(), &extensions).unwrap();
        assert_eq!(out, "[NAV]");
    }

    #[test]
    fn test_nested_include() {
        let (_tmp, extensions) = setup();
        let out = render("{% include sub/footer.html %}", &empty_context(), &extensions).unwrap();
        assert_eq!(out, "FOOT NAV");
    }

    #[test]
    fn test_traversal_rejected() {
        let (_tmp, extensions) = setup();
        for name in &["../secret", "a/./b"] {
            let out = render(&format!("{{% include {} %}}", name), &empty_context(), &extensions)
                .unwrap();
            assert_eq!(out, invalid_name(name));
        }
    }

    #[test]
    fn test_missing_include() {
        let (_tmp, extensions) = setup();
        let out = render("{% include nope.html %}", &empty_context(), &extensions).unwrap();
        assert_eq!(out, not_found("nope.html"));
    }

    #[test]
    fn test_hidden_file_not_found() {
        let (_tmp, extensions) = setup();
        let out = render("{% include .hidden %}", &empty_context(), &extensions).unwrap();
        assert_eq!(out, not_found(".hidden"));
    }

    #[test]
    fn test_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let tag = IncludeTag::new(tmp.path().join("_includes"));
        assert!(tag.resolve("nav.html").unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_not_followed() {
        let (tmp, extensions) = setup();
        std::os::unix::fs::symlink(tmp.path().join("nav.html"), tmp.path().join("link.html"))
            .unwrap();
        let out = render("{% include link.html %}", &empty_context(), &extensions).unwrap();
        assert_eq!(out, not_found("link.html"));
    }

    #[test]
    fn test_include_syntax_in_data_is_literal() {
        let (_tmp, extensions) = setup();
        let page = object(vec![(
            "code",
            Value::String("{% include nav.html %}".to_owned()),
        )]);
        let ctx = context(&empty_context(), &page, None);
        let out = render("{% include nav.html %} / {{ .page.code }}", &ctx, &extensions).unwrap();
        assert_eq!(out, "NAV / {% include nav.html %}");
    }

    #[test]
    fn test_include_from_variable() {
        let (_tmp, extensions) = setup();
        let page = object(vec![("sidebar", Value::String("nav.html".to_owned()))]);
        let ctx = context(&empty_context(), &page, None);
        let out = render("{% include from page.sidebar %}", &ctx, &extensions).unwrap();
        assert_eq!(out, "NAV");

        let out = render("{% include from page.missing %}", &ctx, &extensions).unwrap();
        assert_eq!(out, invalid_name(""));
    }
}
