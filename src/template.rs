//! The template engine facade.
//!
//! Rendering is two passes over the same context:
//!
//! 1. Extension tags of the form `{% name arguments %}` are taken out of the
//!    source. Each tag whose name is registered in the [`Extensions`] passed
//!    to [`render`] is set aside; unregistered tags are left as they are.
//! 2. The rest is executed as a [`gtmpl`] template, so variables are
//!    addressed from the root of the context (`{{ .page.title }}`,
//!    `{{ range .site.posts }}...{{ end }}`).
//! 3. Each tag set aside is replaced by its extension's output.
//!
//! Tags are only recognized in template text. Values interpolated by gtmpl,
//! such as front matter or the `content` a layout wraps, are never parsed
//! for tags.
//!
//! Extensions may render nested templates through [`Scope::render`], which
//! shares the caller's context. Nesting is bounded by [`MAX_DEPTH`].

use crate::value::object;
use gtmpl::{Context, Template};
use gtmpl_value::Value;
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// How deeply extension output may nest before it is cut off.
pub const MAX_DEPTH: usize = 16;

const TAG_OPEN: &str = "{%";
const TAG_CLOSE: &str = "%}";

// Private-use code points bracketing the index of a tag while gtmpl runs.
const MARK_OPEN: char = '\u{E000}';
const MARK_CLOSE: char = '\u{E001}';

/// Represents an error rendering a template.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned when the template source can't be parsed.
    #[error("parsing template: {0}")]
    Parse(String),

    /// Returned when template execution fails.
    #[error("executing template: {0}")]
    Execute(String),

    /// Returned when the rendered output isn't valid UTF-8.
    #[error("template output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Returned when an include file exists but can't be read.
    #[error("reading include `{}`: {err}", .path.display())]
    Include {
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when the includes directory can't be scanned.
    #[error("scanning includes: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// A named tag that can be used in templates as `{% name arguments %}`.
pub trait TemplateExtension {
    /// The tag name this extension answers to.
    fn name(&self) -> &str;

    /// Renders the tag. `args` is the trimmed text after the tag name.
    fn render(&self, args: &str, scope: &Scope<'_>) -> Result<String>;
}

/// The registry of template extensions available to a render call.
#[derive(Default)]
pub struct Extensions {
    extensions: Vec<Box<dyn TemplateExtension>>,
}

impl Extensions {
    pub fn new() -> Extensions {
        Extensions::default()
    }

    /// Registers `extension`, replacing any extension with the same name.
    pub fn register<E: TemplateExtension + 'static>(&mut self, extension: E) {
        self.extensions.retain(|e| e.name() != extension.name());
        self.extensions.push(Box::new(extension));
    }

    /// Looks up the extension registered under `name`.
    pub fn get(&self, name: &str) -> Option<&dyn TemplateExtension> {
        self.extensions
            .iter()
            .find(|e| e.name() == name)
            .map(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

/// What an extension sees of the render call it was invoked from.
pub struct Scope<'a> {
    context: &'a Value,
    extensions: &'a Extensions,
    depth: usize,
}

impl<'a> Scope<'a> {
    /// The rendering context of the caller.
    pub fn context(&self) -> &'a Value {
        self.context
    }

    /// Resolves a dotted variable path such as `page.sidebar` (a leading dot,
    /// as in `.page.sidebar`, is accepted) against the caller's context.
    pub fn lookup(&self, path: &str) -> Option<&'a Value> {
        path.split('.')
            .filter(|segment| !segment.is_empty())
            .try_fold(self.context, |value, segment| match value {
                Value::Object(fields) | Value::Map(fields) => fields.get(segment),
                _ => None,
            })
    }

    /// Renders `source` as a nested template sharing the caller's context and
    /// extensions.
    pub fn render(&self, source: &str) -> Result<String> {
        if self.depth >= MAX_DEPTH {
            return Ok(format!(
                "Template nesting exceeds {} levels; output truncated",
                MAX_DEPTH
            ));
        }
        render_at(source, self.context, self.extensions, self.depth + 1)
    }
}

/// Renders `source` against `context`, expanding extension tags from
/// `extensions`.
pub fn render(source: &str, context: &Value, extensions: &Extensions) -> Result<String> {
    render_at(source, context, extensions, 0)
}

fn render_at(source: &str, context: &Value, extensions: &Extensions, depth: usize) -> Result<String> {
    let (source, tags) = extract(source, extensions);
    let output = execute(&source, context)?;
    if tags.is_empty() {
        return Ok(output);
    }
    let scope = Scope {
        context,
        extensions,
        depth,
    };
    substitute(&output, &tags, &scope)
}

// Runs the gtmpl pass. Sources without any action are returned unchanged,
// which also sidesteps gtmpl's refusal to execute an empty template.
fn execute(source: &str, context: &Value) -> Result<String> {
    if !source.contains("{{") {
        return Ok(source.to_owned());
    }

    let mut template = Template::default();
    template.parse(source).map_err(Error::Parse)?;
    let context = Context::from(context.clone()).map_err(Error::Execute)?;
    let mut output: Vec<u8> = Vec::with_capacity(source.len());
    template
        .execute(&mut output, &context)
        .map_err(Error::Execute)?;
    Ok(String::from_utf8(output)?)
}

// A registered tag found in a template source.
struct Tag<'a> {
    extension: &'a dyn TemplateExtension,
    args: &'a str,
}

// Replaces every registered tag in `source` with a numbered marker, so tags
// are recognized in the template text only and never in the values gtmpl
// interpolates. Unregistered and unterminated tags stay as text.
fn extract<'a>(source: &'a str, extensions: &'a Extensions) -> (String, Vec<Tag<'a>>) {
    let mut tags = Vec::new();
    if extensions.is_empty() || !source.contains(TAG_OPEN) {
        return (source.to_owned(), tags);
    }

    let mut output = String::with_capacity(source.len());
    let mut rest = source;
    while let Some(start) = rest.find(TAG_OPEN) {
        let end = match rest[start..].find(TAG_CLOSE) {
            Some(offset) => start + offset + TAG_CLOSE.len(),
            None => break,
        };
        output.push_str(&rest[..start]);

        let tag = &rest[start..end];
        let inner = tag[TAG_OPEN.len()..tag.len() - TAG_CLOSE.len()].trim();
        let (name, args) = match inner.find(char::is_whitespace) {
            Some(i) => (&inner[..i], inner[i..].trim()),
            None => (inner, ""),
        };
        match extensions.get(name) {
            Some(extension) => {
                output.push(MARK_OPEN);
                output.push_str(&tags.len().to_string());
                output.push(MARK_CLOSE);
                tags.push(Tag { extension, args });
            }
            None => output.push_str(tag),
        }
        rest = &rest[end..];
    }
    output.push_str(rest);
    (output, tags)
}

// Renders the tag behind each marker in `text`. Extension output is inserted
// as is and never scanned again.
fn substitute(text: &str, tags: &[Tag<'_>], scope: &Scope<'_>) -> Result<String> {
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(MARK_OPEN) {
        output.push_str(&rest[..start]);
        let after = &rest[start + MARK_OPEN.len_utf8()..];
        let marker = after.find(MARK_CLOSE).and_then(|end| {
            let tag = after[..end].parse::<usize>().ok().and_then(|i| tags.get(i))?;
            Some((tag, end))
        });
        match marker {
            Some((tag, end)) => {
                output.push_str(&tag.extension.render(tag.args, scope)?);
                rest = &after[end + MARK_CLOSE.len_utf8()..];
            }
            None => {
                output.push(MARK_OPEN);
                rest = after;
            }
        }
    }
    output.push_str(rest);
    Ok(output)
}

/// Builds the context a document or layout is rendered with: the site
/// payload's fields, plus `page` and (for layouts) `content`.
pub fn context(payload: &Value, page: &Value, content: Option<&str>) -> Value {
    let mut fields: HashMap<String, Value> = match payload {
        Value::Object(fields) | Value::Map(fields) => fields.clone(),
        _ => HashMap::new(),
    };
    fields.insert("page".to_owned(), page.clone());
    if let Some(content) = content {
        fields.insert("content".to_owned(), Value::String(content.to_owned()));
    }
    Value::Object(fields)
}

/// An empty context, for rendering without any site data.
pub fn empty_context() -> Value {
    object(Vec::<(String, Value)>::new())
}
