//! Defines [`Layout`] and the [`Layouts`] collection, which resolves layouts by
//! name and applies a document's layout chain.
//!
//! A layout is a template that wraps already-rendered content, exposed to it as
//! `{{ .content }}`. A layout may itself name a parent in its front matter
//! (`layout: default`), forming a chain that is applied innermost first. The
//! chain ends at a layout without a parent or at a name that doesn't resolve.
//! A chain that revisits a layout is a configuration error.

use crate::filter::EntryFilter;
use crate::frontmatter;
use crate::markup::{self, ContentType, Converters};
use crate::template::{self, Extensions};
use crate::value::get_str;
use gtmpl_value::Value;
use serde_yaml::Mapping;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The front matter key naming a document's (or layout's) layout.
pub const LAYOUT_KEY: &str = "layout";

/// Represents an error loading or applying layouts.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned for I/O errors reading the layouts directory or a layout file.
    #[error("reading layout `{}`: {err}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when a layout file has malformed front matter.
    #[error("layout `{}`: {err}", .path.display())]
    FrontMatter {
        path: PathBuf,
        #[source]
        err: frontmatter::Error,
    },

    /// Returned when a layout written in markup fails to convert.
    #[error("layout `{name}`: {err}")]
    Convert {
        name: String,
        #[source]
        err: markup::Error,
    },

    /// Returned when a layout chain revisits a layout. Holds the chain in
    /// application order, ending with the repeated name.
    #[error("layout cycle: {}", .0.join(" -> "))]
    Cycle(Vec<String>),

    /// Returned when a layout template fails to render.
    #[error("rendering layout `{name}`: {err}")]
    Render {
        name: String,
        #[source]
        err: template::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// A named template wrapping rendered content.
#[derive(Debug, Clone)]
pub struct Layout {
    /// The lookup key: the file name without its extension.
    pub name: String,

    /// The template source, after front matter removal and markup conversion.
    pub content: String,

    /// The layout's own front matter.
    pub metadata: Mapping,
}

impl Layout {
    /// Parses a layout from its file name and raw text.
    pub fn parse(file_name: &str, raw: &str, converters: &Converters) -> Result<Layout> {
        let path = Path::new(file_name);
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (metadata, body) = frontmatter::parse(raw).map_err(|err| Error::FrontMatter {
            path: path.to_owned(),
            err,
        })?;
        let content = converters
            .convert(ContentType::from_path(path), body.to_owned())
            .map_err(|err| Error::Convert {
                name: name.clone(),
                err,
            })?;
        Ok(Layout {
            name,
            content,
            metadata,
        })
    }

    /// The name of the layout this one is wrapped in, if any.
    pub fn parent(&self) -> Option<&str> {
        get_str(&self.metadata, LAYOUT_KEY)
    }
}

/// All layouts of a site, keyed by name. Loaded once per build and read-only
/// afterwards.
#[derive(Debug, Clone, Default)]
pub struct Layouts {
    layouts: HashMap<String, Layout>,
}

impl Layouts {
    pub fn new() -> Layouts {
        Layouts::default()
    }

    /// Loads every allowed, non-directory entry of `directory`. A missing
    /// directory yields no layouts.
    pub fn load(directory: &Path, filter: &EntryFilter, converters: &Converters) -> Result<Layouts> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Layouts::new()),
            Err(err) => return Err(Error::Read {
                path: directory.to_owned(),
                err,
            }),
        };

        let mut layouts = Layouts::new();
        for entry in entries {
            let entry = entry.map_err(|err| Error::Read {
                path: directory.to_owned(),
                err,
            })?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if !filter.allows(&file_name) || path.is_dir() {
                continue;
            }
            let raw = fs::read_to_string(&path).map_err(|err| Error::Read {
                path: path.clone(),
                err,
            })?;
            layouts.insert(Layout::parse(&file_name, &raw, converters)?);
        }
        Ok(layouts)
    }

    /// Adds `layout`, replacing any layout with the same name.
    pub fn insert(&mut self, layout: Layout) {
        self.layouts.insert(layout.name.clone(), layout);
    }

    /// Looks up a layout by exact, case-sensitive name.
    pub fn resolve(&self, name: &str) -> Option<&Layout> {
        self.layouts.get(name)
    }

    /// The names of all layouts, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.layouts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.layouts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Wraps `content` in the chain of layouts starting at `start`. Each layout
    /// is rendered with the site payload, the document's `page` data, and the
    /// content rendered so far.
    pub fn apply(
        &self,
        start: Option<&str>,
        mut content: String,
        payload: &Value,
        page: &Value,
        extensions: &Extensions,
    ) -> Result<String> {
        let mut chain: Vec<String> = Vec::new();
        let mut next = start;
        while let Some(name) = next {
            let layout = match self.resolve(name) {
                Some(layout) => layout,
                None => break,
            };
            let seen = chain.iter().any(|visited| visited == name);
            chain.push(name.to_owned());
            if seen {
                return Err(Error::Cycle(chain));
            }

            let context = template::context(payload, page, Some(&content));
            content = template::render(&layout.content, &context, extensions).map_err(|err| {
                Error::Render {
                    name: layout.name.clone(),
                    err,
                }
            })?;
            next = layout.parent();
        }
        Ok(content)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::template::empty_context;
    use tempfile::TempDir;

    fn layouts(sources: &[(&str, &str)]) -> Layouts {
        let converters = Converters::default();
        let mut layouts = Layouts::new();
        for (file_name, raw) in sources {
            layouts.insert(Layout::parse(file_name, raw, &converters).unwrap());
        }
        layouts
    }

    #[test]
    fn test_parse_name_and_parent() {
        let layouts = layouts(&[("post.html", "---\nlayout: default\n---\n<article/>")]);
        let post = layouts.resolve("post").unwrap();
        assert_eq!(post.parent(), Some("default"));
        assert_eq!(post.content, "<article/>");
        assert!(layouts.resolve("Post").is_none());
    }

    #[test]
    fn test_apply_chain() {
        let layouts = layouts(&[
            ("default.html", "<html>{{ .content }}</html>"),
            ("post.html", "---\nlayout: default\n---\n<article>{{ .content }}</article>"),
        ]);
        let out = layouts
            .apply(
                Some("post"),
                "body".to_owned(),
                &empty_context(),
                &empty_context(),
                &Extensions::new(),
            )
            .unwrap();
        assert_eq!(out, "<html><article>body</article></html>");
    }

    #[test]
    fn test_missing_layout_stops_chain() {
        let layouts = layouts(&[("post.html", "---\nlayout: nowhere\n---\n[{{ .content }}]")]);
        let out = layouts
            .apply(
                Some("post"),
                "body".to_owned(),
                &empty_context(),
                &empty_context(),
                &Extensions::new(),
            )
            .unwrap();
        assert_eq!(out, "[body]");

        let out = layouts
            .apply(
                Some("absent"),
                "body".to_owned(),
                &empty_context(),
                &empty_context(),
                &Extensions::new(),
            )
            .unwrap();
        assert_eq!(out, "body");
    }

    #[test]
    fn test_cycle_is_an_error() {
        let layouts = layouts(&[
            ("a.html", "---\nlayout: b\n---\nA"),
            ("b.html", "---\nlayout: a\n---\nB"),
        ]);
        let err = layouts
            .apply(
                Some("a"),
                "x".to_owned(),
                &empty_context(),
                &empty_context(),
                &Extensions::new(),
            )
            .unwrap_err();
        match err {
            Error::Cycle(chain) => assert_eq!(chain, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {}", other),
        }
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let layouts = layouts(&[("a.html", "---\nlayout: a\n---\nA")]);
        let result = layouts.apply(
            Some("a"),
            "x".to_owned(),
            &empty_context(),
            &empty_context(),
            &Extensions::new(),
        );
        assert!(matches!(result, Err(Error::Cycle(_))));
    }

    #[test]
    fn test_load_filters_and_tolerates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("_layouts");
        let filter = EntryFilter::default();
        let converters = Converters::default();
        assert!(Layouts::load(&dir, &filter, &converters).unwrap().is_empty());

        fs::create_dir_all(dir.join("nested")).unwrap();
        fs::write(dir.join("default.html"), "D").unwrap();
        fs::write(dir.join("simple.html"), "S").unwrap();
        fs::write(dir.join("simple.html~"), "backup").unwrap();
        fs::write(dir.join(".swp"), "hidden").unwrap();
        let layouts = Layouts::load(&dir, &filter, &converters).unwrap();
        assert_eq!(layouts.names(), vec!["default", "simple"]);
        assert_eq!(layouts.resolve("simple").unwrap().content, "S");
    }
}
