//! Markup-to-HTML conversion, dispatched on a document's [`ContentType`].
//!
//! The [`Converters`] registry maps each content type to a [`Converter`].
//! Types without a registered converter (plain HTML and unknown extensions)
//! pass through unchanged.

use crate::textile;
use pulldown_cmark::{html, Options, Parser};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// The kind of markup a document is written in, inferred from its extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
    Markdown,
    Textile,
    Html,
    Unknown,
}

impl ContentType {
    /// Infers the content type from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> ContentType {
        match ext.to_ascii_lowercase().as_str() {
            "md" | "markdown" | "mkd" | "mkdn" => ContentType::Markdown,
            "textile" => ContentType::Textile,
            "html" | "htm" => ContentType::Html,
            _ => ContentType::Unknown,
        }
    }

    /// Infers the content type from the extension of `path`.
    pub fn from_path(path: &Path) -> ContentType {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => ContentType::from_extension(ext),
            None => ContentType::Unknown,
        }
    }

    /// The extension converted output is written with, or `None` when the
    /// source extension is kept.
    pub fn output_extension(self) -> Option<&'static str> {
        match self {
            ContentType::Markdown | ContentType::Textile => Some("html"),
            ContentType::Html | ContentType::Unknown => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ContentType::Markdown => "markdown",
            ContentType::Textile => "textile",
            ContentType::Html => "html",
            ContentType::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Represents a failed conversion. Conversion failures are fatal to the build.
#[derive(Error, Debug)]
#[error("converting {content_type}: {message}")]
pub struct Error {
    pub content_type: ContentType,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Converts markup text into HTML.
pub trait Converter {
    fn convert(&self, input: &str) -> Result<String>;
}

/// Markdown conversion via [`pulldown_cmark`].
pub struct Markdown {
    options: Options,
}

impl Markdown {
    pub fn new(smart_punctuation: bool) -> Markdown {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_FOOTNOTES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_TASKLISTS);
        if smart_punctuation {
            options.insert(Options::ENABLE_SMART_PUNCTUATION);
        }
        Markdown { options }
    }
}

impl Converter for Markdown {
    fn convert(&self, input: &str) -> Result<String> {
        let mut output = String::with_capacity(input.len() * 3 / 2);
        html::push_html(&mut output, Parser::new_ext(input, self.options));
        Ok(output)
    }
}

/// Textile conversion via the built-in [`crate::textile`] converter.
pub struct Textile;

impl Converter for Textile {
    fn convert(&self, input: &str) -> Result<String> {
        Ok(textile::to_html(input))
    }
}

/// The registry of converters, keyed by content type.
pub struct Converters {
    converters: HashMap<ContentType, Box<dyn Converter>>,
}

impl Converters {
    /// Creates a registry with no converters; everything passes through.
    pub fn empty() -> Converters {
        Converters {
            converters: HashMap::new(),
        }
    }

    /// Creates a registry with the Markdown and Textile converters.
    pub fn new(smart_punctuation: bool) -> Converters {
        let mut converters = Converters::empty();
        converters.register(ContentType::Markdown, Markdown::new(smart_punctuation));
        converters.register(ContentType::Textile, Textile);
        converters
    }

    /// Registers `converter` for `content_type`, replacing any previous one.
    pub fn register<C: Converter + 'static>(&mut self, content_type: ContentType, converter: C) {
        self.converters.insert(content_type, Box::new(converter));
    }

    /// Converts `input` according to `content_type`.
    pub fn convert(&self, content_type: ContentType, input: String) -> Result<String> {
        match self.converters.get(&content_type) {
            Some(converter) => converter.convert(&input),
            None => Ok(input),
        }
    }
}

impl Default for Converters {
    fn default() -> Converters {
        Converters::new(true)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_content_type_from_path() {
        assert_eq!(ContentType::from_path(Path::new("a/b.md")), ContentType::Markdown);
        assert_eq!(ContentType::from_path(Path::new("b.MARKDOWN")), ContentType::Markdown);
        assert_eq!(ContentType::from_path(Path::new("b.textile")), ContentType::Textile);
        assert_eq!(ContentType::from_path(Path::new("b.html")), ContentType::Html);
        assert_eq!(ContentType::from_path(Path::new("b.css")), ContentType::Unknown);
        assert_eq!(ContentType::from_path(Path::new("Makefile")), ContentType::Unknown);
    }

    #[test]
    fn test_markdown() {
        let html = Converters::default()
            .convert(ContentType::Markdown, "*This* is markdown".to_owned())
            .unwrap();
        assert_eq!(html, "<p><em>This</em> is markdown</p>\n");
    }

    #[test]
    fn test_passthrough() {
        let converters = Converters::default();
        let input = "<b>{{ .page.title }}</b>";
        for ty in &[ContentType::Html, ContentType::Unknown] {
            assert_eq!(converters.convert(*ty, input.to_owned()).unwrap(), input);
        }
    }

    struct Failing;

    impl Converter for Failing {
        fn convert(&self, _: &str) -> Result<String> {
            Err(Error {
                content_type: ContentType::Markdown,
                message: "boom".to_owned(),
            })
        }
    }

    #[test]
    fn test_registered_converter_replaces_default() {
        let mut converters = Converters::default();
        converters.register(ContentType::Markdown, Failing);
        let err = converters
            .convert(ContentType::Markdown, "x".to_owned())
            .unwrap_err();
        assert_eq!(err.to_string(), "converting markdown: boom");
    }
}
