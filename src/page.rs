//! Defines [`Page`]: a non-dated document rendered in place.
//!
//! A page keeps its position in the source tree. `about/team.md` is written to
//! `<destination>/about/team.html` and its url is `/about/team.html`.

use crate::document::{Document, Renderer, Result};
use gtmpl_value::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Page {
    pub document: Document,

    /// The directory holding the page, relative to the source root.
    pub dir: PathBuf,
}

impl Page {
    /// Reads the page at `root/dir/<file name>`.
    pub fn read(root: &Path, relative: &Path) -> Result<Page> {
        let document = Document::read(&root.join(relative))?;
        Ok(Page {
            document,
            dir: relative.parent().map(Path::to_owned).unwrap_or_default(),
        })
    }

    /// The output path relative to the destination root.
    pub fn destination_relative(&self) -> PathBuf {
        self.dir.join(self.document.output_name())
    }

    pub fn url(&self) -> String {
        let segments: Vec<String> = self
            .destination_relative()
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        format!("/{}", segments.join("/"))
    }

    /// The `page` template data: the front matter plus `url`.
    pub fn data(&self) -> Value {
        let mut fields = self.document.fields();
        fields
            .entry("url".to_owned())
            .or_insert_with(|| Value::String(self.url()));
        Value::Object(fields)
    }

    pub fn render(&mut self, payload: &Value, renderer: &Renderer<'_>) -> Result<()> {
        let page = self.data();
        self.document.render(&page, payload, renderer)
    }

    /// Writes the rendered page below `destination`.
    pub fn write(&self, destination: &Path) -> Result<()> {
        self.document
            .write(&destination.join(self.destination_relative()))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layout::Layouts;
    use crate::markup::Converters;
    use crate::template::{empty_context, Extensions};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_render_and_write_in_place() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::create_dir_all(src.path().join("about")).unwrap();
        fs::write(
            src.path().join("about/team.md"),
            "---\ntitle: Team\n---\n# {{ .page.title }} at {{ .page.url }}\n",
        )
        .unwrap();

        let mut page = Page::read(src.path(), Path::new("about/team.md")).unwrap();
        assert_eq!(page.destination_relative(), PathBuf::from("about/team.html"));
        assert_eq!(page.url(), "/about/team.html");

        let layouts = Layouts::new();
        let converters = Converters::default();
        let extensions = Extensions::new();
        let renderer = Renderer {
            layouts: &layouts,
            converters: &converters,
            extensions: &extensions,
        };
        page.render(&empty_context(), &renderer).unwrap();
        page.write(dst.path()).unwrap();
        assert_eq!(
            fs::read_to_string(dst.path().join("about/team.html")).unwrap(),
            "<h1>Team at /about/team.html</h1>\n"
        );
    }

    #[test]
    fn test_top_level_page() {
        let src = TempDir::new().unwrap();
        fs::write(src.path().join("index.html"), "---\n---\nhome").unwrap();
        let page = Page::read(src.path(), Path::new("index.html")).unwrap();
        assert_eq!(page.dir, PathBuf::new());
        assert_eq!(page.url(), "/index.html");
    }
}
