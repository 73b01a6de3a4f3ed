//! Defines [`Document`], the representation shared by pages and posts: a source
//! file's front matter, its raw body, and (once rendered) its output.
//!
//! Rendering runs the body through the template engine with the site payload
//! and the document's own `page` data, converts the result according to the
//! document's [`ContentType`], and finally wraps it in its layout chain.

use crate::frontmatter;
use crate::layout::{self, Layouts, LAYOUT_KEY};
use crate::markup::{self, ContentType, Converters};
use crate::template::{self, Extensions};
use crate::value::{from_mapping, get_str};
use gtmpl_value::Value;
use serde_yaml::Mapping;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Represents an error reading, rendering, or writing a [`Document`].
#[derive(Error, Debug)]
pub enum Error {
    /// Returned for I/O errors reading the source file.
    #[error("reading: {0}")]
    Read(#[source] io::Error),

    /// Returned when the front matter is malformed.
    #[error(transparent)]
    FrontMatter(#[from] frontmatter::Error),

    /// Returned when the body fails to render as a template.
    #[error(transparent)]
    Template(#[from] template::Error),

    /// Returned when markup conversion fails.
    #[error(transparent)]
    Convert(#[from] markup::Error),

    /// Returned when a layout in the chain fails.
    #[error(transparent)]
    Layout(#[from] layout::Error),

    /// Returned when writing a document that hasn't been rendered.
    #[error("document has not been rendered")]
    NotRendered,

    /// Returned for I/O errors writing the output file.
    #[error("writing `{}`: {err}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        err: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Everything a document needs from the site to render itself.
pub struct Renderer<'a> {
    pub layouts: &'a Layouts,
    pub converters: &'a Converters,
    pub extensions: &'a Extensions,
}

/// A source file with optional front matter, rendered through the template
/// engine, a markup converter, and its layouts.
#[derive(Debug, Clone)]
pub struct Document {
    /// Where the document was read from.
    pub path: PathBuf,

    /// The file name the document was read from, used for its content type
    /// and output name.
    pub file_name: String,

    /// The body after front matter removal.
    pub content: String,

    /// The converted body before any layout is applied. This is what other
    /// templates see as the document's `content`. `None` until rendered.
    pub body: Option<String>,

    /// The rendered output, layouts included. `None` until
    /// [`Document::render`] is called.
    pub output: Option<String>,

    /// The front matter, in source order.
    pub metadata: Mapping,

    /// The markup the body is written in.
    pub content_type: ContentType,
}

impl Document {
    /// Parses a document from its file name and raw text.
    pub fn parse(file_name: &str, raw: &str) -> Result<Document> {
        let (metadata, body) = frontmatter::parse(raw)?;
        Ok(Document {
            path: PathBuf::from(file_name),
            file_name: file_name.to_owned(),
            content: body.to_owned(),
            body: None,
            output: None,
            metadata,
            content_type: ContentType::from_path(Path::new(file_name)),
        })
    }

    /// Reads and parses the document at `path`.
    pub fn read(path: &Path) -> Result<Document> {
        let raw = fs::read_to_string(path).map_err(Error::Read)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut document = Document::parse(&file_name, &raw)?;
        document.path = path.to_owned();
        Ok(document)
    }

    /// The layout named in the front matter, if any.
    pub fn layout(&self) -> Option<&str> {
        get_str(&self.metadata, LAYOUT_KEY)
    }

    /// The file name the rendered document is written under: the source name
    /// with its extension replaced when the content type implies one.
    pub fn output_name(&self) -> String {
        let path = Path::new(&self.file_name);
        match self.content_type.output_extension() {
            Some(ext) => path.with_extension(ext).to_string_lossy().into_owned(),
            None => self.file_name.clone(),
        }
    }

    /// The front matter as template fields, for building `page` data.
    pub fn fields(&self) -> HashMap<String, Value> {
        from_mapping(&self.metadata)
    }

    /// Renders the document and stores the result in [`Document::output`].
    /// `page` is the document's template data and `payload` the site payload.
    pub fn render(&mut self, page: &Value, payload: &Value, renderer: &Renderer<'_>) -> Result<()> {
        let context = template::context(payload, page, None);
        let content = template::render(&self.content, &context, renderer.extensions)?;
        let content = renderer.converters.convert(self.content_type, content)?;
        let output = renderer
            .layouts
            .apply(self.layout(), content.clone(), payload, page, renderer.extensions)?;
        self.body = Some(content);
        self.output = Some(output);
        Ok(())
    }

    /// Writes the rendered output to `path`, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        let output = self.output.as_ref().ok_or(Error::NotRendered)?;
        let write_err = |err| Error::Write {
            path: path.to_owned(),
            err,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, output).map_err(write_err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::Layout;
    use crate::template::empty_context;
    use crate::value::object;
    use tempfile::TempDir;

    fn render(document: &mut Document, layouts: &Layouts) {
        let converters = Converters::default();
        let extensions = Extensions::new();
        let renderer = Renderer {
            layouts,
            converters: &converters,
            extensions: &extensions,
        };
        let page = Value::Object(document.fields());
        document.render(&page, &empty_context(), &renderer).unwrap();
    }

    #[test]
    fn test_output_name() {
        let md = Document::parse("about.md", "x").unwrap();
        assert_eq!(md.output_name(), "about.html");
        let css = Document::parse("style.css", "x").unwrap();
        assert_eq!(css.output_name(), "style.css");
        let textile = Document::parse("notes.textile", "x").unwrap();
        assert_eq!(textile.output_name(), "notes.html");
    }

    #[test]
    fn test_render_without_layout_is_converted_markup() {
        let mut document = Document::parse("about.md", "---\ntitle: About\n---\n*hi*\n").unwrap();
        render(&mut document, &Layouts::new());
        assert_eq!(document.output.as_deref(), Some("<p><em>hi</em></p>\n"));
    }

    #[test]
    fn test_render_page_variables_and_layout() {
        let mut layouts = Layouts::new();
        layouts.insert(
            Layout::parse("default.html", "<title>{{ .page.title }}</title>{{ .content }}", &Converters::default())
                .unwrap(),
        );
        let mut document =
            Document::parse("about.html", "---\nlayout: default\ntitle: About\n---\n<p>{{ .page.title }}</p>").unwrap();
        render(&mut document, &layouts);
        assert_eq!(
            document.output.as_deref(),
            Some("<title>About</title><p>About</p>")
        );
        assert_eq!(document.body.as_deref(), Some("<p>About</p>"));
    }

    #[test]
    fn test_write_requires_render() {
        let tmp = TempDir::new().unwrap();
        let document = Document::parse("a.html", "x").unwrap();
        assert!(matches!(
            document.write(&tmp.path().join("a.html")),
            Err(Error::NotRendered)
        ));
    }

    #[test]
    fn test_write_creates_directories() {
        let tmp = TempDir::new().unwrap();
        let mut document = Document::parse("a.html", "x").unwrap();
        render(&mut document, &Layouts::new());
        let path = tmp.path().join("deep/er/a.html");
        document.write(&path).unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "x");
    }

    #[test]
    fn test_page_fields() {
        let document = Document::parse("a.html", "---\ntitle: T\n---\n").unwrap();
        let page = object(document.fields());
        match page {
            Value::Object(fields) => assert!(fields.contains_key("title")),
            _ => panic!("expected object"),
        }
    }
}
