//! Exports [`SiteBuilder`], which stitches together the steps of one build.
//!
//! A build runs in four strictly ordered stages (see [`Stage`]):
//!
//! 1. **Init**: compile the entry filter, register converters and template
//!    extensions, load the layouts.
//! 2. **Posts**: find every `_posts` directory in the source tree, read the
//!    published posts into one collection, sort it latest first, link
//!    neighbours, then render each post against a fresh [`SitePayload`].
//! 3. **Pages**: walk the tree again. Files that open with front matter are
//!    rendered as [`Page`]s, symbolic links are recreated, everything else is
//!    copied byte for byte. `also_copy` entries are copied last.
//! 4. **Write**: write every post to its dated path.
//!
//! Every page therefore sees the complete, final post collection.

use crate::config::BuildConfig;
use crate::document::{self, Renderer};
use crate::filter::{EntryFilter, POSTS_DIR};
use crate::frontmatter;
use crate::include::IncludeTag;
use crate::layout::{self, Layouts};
use crate::markup::Converters;
use crate::page::Page;
use crate::payload::SitePayload;
use crate::post::{self, Post};
use crate::template::Extensions;
use gtmpl_value::Value;
use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

/// The stage of a build, reported with fatal errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Init,
    Posts,
    Pages,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Stage::Init => "init",
            Stage::Posts => "posts",
            Stage::Pages => "pages",
            Stage::Write => "write",
        })
    }
}

/// The error type for building a site.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned when the ignore patterns don't compile.
    #[error("init: invalid ignore pattern: {0}")]
    Ignore(#[from] regex::Error),

    /// Returned when the layouts can't be loaded.
    #[error("init: {0}")]
    Layouts(#[from] layout::Error),

    /// Returned when a post or page fails to read, render, or write.
    #[error("{stage}: `{}`: {err}", .path.display())]
    Document {
        stage: Stage,
        path: PathBuf,
        #[source]
        err: document::Error,
    },

    /// Returned for filesystem errors while copying or creating output.
    #[error("{stage}: `{}`: {err}", .path.display())]
    Io {
        stage: Stage,
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    /// Returned when a directory of the source tree can't be listed.
    #[error("{stage}: {err}")]
    Walk {
        stage: Stage,
        #[source]
        err: walkdir::Error,
    },

    /// Returned when the destination is the source directory itself, where
    /// copying would overwrite every asset with itself.
    #[error("init: destination `{}` is the source directory", .0.display())]
    DestinationIsSource(PathBuf),

    /// Returned when an `also_copy` entry doesn't exist.
    #[error("pages: also_copy entry `{}` does not exist", .0.display())]
    MissingAlsoCopy(PathBuf),
}

pub type Result<T> = std::result::Result<T, Error>;

/// What a build produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub posts: usize,
    pub pages: usize,
    pub copied: usize,
}

/// Builds one site from a [`BuildConfig`].
pub struct SiteBuilder {
    config: BuildConfig,
    filter: EntryFilter,
    converters: Converters,
    extensions: Extensions,
    layouts: Layouts,
    posts: Vec<Post>,
}

impl SiteBuilder {
    /// Runs the init stage.
    pub fn new(config: &BuildConfig) -> Result<SiteBuilder> {
        let filter = EntryFilter::new(&config.ignore)?;
        let converters = Converters::new(config.smart_punctuation);
        let mut extensions = Extensions::new();
        extensions.register(IncludeTag::new(&config.includes_path));
        let layouts = Layouts::load(&config.layouts_path, &filter, &converters)?;

        if !config.quiet {
            log!("init"; "loaded {} layouts", layouts.len());
        }
        Ok(SiteBuilder {
            config: config.clone(),
            filter,
            converters,
            extensions,
            layouts,
            posts: Vec::new(),
        })
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn layouts(&self) -> &Layouts {
        &self.layouts
    }

    /// The markup converters documents are rendered with. Layouts are
    /// converted when the builder is created, so changes here only reach
    /// posts and pages.
    pub fn converters_mut(&mut self) -> &mut Converters {
        &mut self.converters
    }

    /// The payload templates would see right now.
    pub fn payload(&self) -> SitePayload<'_> {
        SitePayload::new(&self.posts, &self.config.settings)
    }

    /// Runs the remaining stages.
    pub fn process(&mut self) -> Result<Summary> {
        let destination = self.prepare_destination()?;

        let posts_dirs = self.find_posts_dirs(&destination)?;
        for (dir, categories) in &posts_dirs {
            self.read_posts(dir, categories)?;
        }
        self.render_posts()?;
        if !self.config.quiet {
            log!("posts"; "rendered {} posts", self.posts.len());
        }

        let mut summary = self.transform_pages(&destination)?;
        summary.copied += self.copy_also()?;
        if !self.config.quiet {
            log!("pages"; "rendered {} pages, copied {} files", summary.pages, summary.copied);
        }

        self.write_posts()?;
        summary.posts = self.posts.len();
        if !self.config.quiet {
            log!("done"; "built {}", self.config.destination.display());
        }
        Ok(summary)
    }

    // Creates the destination and returns its canonical path, which is what
    // the walks compare against to avoid descending into their own output.
    fn prepare_destination(&self) -> Result<PathBuf> {
        let destination = &self.config.destination;
        let io_err = |err| Error::Io {
            stage: Stage::Init,
            path: destination.clone(),
            err,
        };
        fs::create_dir_all(destination).map_err(io_err)?;
        let canonical = fs::canonicalize(destination).map_err(io_err)?;
        if is_same_dir(&self.config.source, &canonical) {
            return Err(Error::DestinationIsSource(destination.clone()));
        }
        Ok(canonical)
    }

    fn find_posts_dirs(&self, destination: &Path) -> Result<Vec<(PathBuf, Vec<String>)>> {
        let mut found = Vec::new();
        self.walk_source(Stage::Posts, destination, |entry| {
            if entry.file_type().is_dir() && entry.file_name() == POSTS_DIR {
                let categories = entry
                    .path()
                    .parent()
                    .and_then(|parent| parent.strip_prefix(&self.config.source).ok())
                    .map(segments)
                    .unwrap_or_default();
                found.push((entry.path().to_owned(), categories));
                return Ok(false);
            }
            Ok(true)
        })?;
        Ok(found)
    }

    /// Reads the published posts below the `_posts` directory `dir`. Entries
    /// the filter hides are skipped, as are files that aren't posts.
    pub fn read_posts(&mut self, dir: &Path, categories: &[String]) -> Result<usize> {
        let mut entries = WalkDir::new(dir)
            .follow_links(false)
            .min_depth(1)
            .sort_by(|a, b| a.file_name().cmp(b.file_name()))
            .into_iter();

        let mut count = 0;
        while let Some(entry) = entries.next() {
            let entry = entry.map_err(|err| Error::Walk {
                stage: Stage::Posts,
                err,
            })?;
            let is_dir = entry.file_type().is_dir();
            if !self.filter.allows(&entry.file_name().to_string_lossy()) {
                if is_dir {
                    entries.skip_current_dir();
                }
                continue;
            }
            if is_dir {
                continue;
            }

            let topics = entry
                .path()
                .parent()
                .and_then(|parent| parent.strip_prefix(dir).ok())
                .map(segments)
                .unwrap_or_default();
            let post = Post::read(entry.path(), categories, &topics).map_err(|err| Error::Document {
                stage: Stage::Posts,
                path: entry.path().to_owned(),
                err,
            })?;
            if let Some(post) = post.filter(|post| post.published) {
                self.posts.push(post);
                count += 1;
            }
        }
        Ok(count)
    }

    /// Sorts and links the posts, then renders each one. Posts rendered
    /// earlier show up in later posts' payloads with their converted body.
    pub fn render_posts(&mut self) -> Result<()> {
        post::sort_latest(&mut self.posts);
        let renderer = Renderer {
            layouts: &self.layouts,
            converters: &self.converters,
            extensions: &self.extensions,
        };
        let mut values: Vec<Value> = self.posts.iter().map(Post::to_value).collect();
        for i in 0..self.posts.len() {
            let payload = SitePayload::new(&self.posts, &self.config.settings).to_value_with(&values);
            let page = post::page_data(&self.posts, i);
            let post = &mut self.posts[i];
            post.document
                .render(&page, &payload, &renderer)
                .map_err(|err| Error::Document {
                    stage: Stage::Posts,
                    path: post.document.path.clone(),
                    err,
                })?;
            values[i] = post.to_value();
        }
        Ok(())
    }

    /// Renders pages and copies everything else from the source tree. The
    /// returned summary counts pages and copied files.
    pub fn transform_pages(&self, destination: &Path) -> Result<Summary> {
        let mut summary = Summary::default();
        let renderer = Renderer {
            layouts: &self.layouts,
            converters: &self.converters,
            extensions: &self.extensions,
        };

        self.walk_source(Stage::Pages, destination, |entry| {
            let file_type = entry.file_type();
            if file_type.is_dir() {
                return Ok(entry.file_name() != POSTS_DIR);
            }

            let relative = match entry.path().strip_prefix(&self.config.source) {
                Ok(relative) => relative,
                Err(_) => return Ok(false),
            };
            let target = self.config.destination.join(relative);
            let io_err = |err| Error::Io {
                stage: Stage::Pages,
                path: entry.path().to_owned(),
                err,
            };

            if file_type.is_symlink() {
                relink(entry.path(), &target).map_err(io_err)?;
                summary.copied += 1;
            } else if frontmatter::starts_with_delimiter(entry.path()).map_err(io_err)? {
                let doc_err = |err| Error::Document {
                    stage: Stage::Pages,
                    path: entry.path().to_owned(),
                    err,
                };
                let mut page = Page::read(&self.config.source, relative).map_err(doc_err)?;
                let payload = self.payload().to_value();
                page.render(&payload, &renderer).map_err(doc_err)?;
                page.write(&self.config.destination).map_err(doc_err)?;
                summary.pages += 1;
            } else {
                copy(entry.path(), &target).map_err(io_err)?;
                summary.copied += 1;
            }
            Ok(false)
        })?;
        Ok(summary)
    }

    /// Copies the `also_copy` entries verbatim, bypassing the entry filter.
    pub fn copy_also(&self) -> Result<usize> {
        let mut count = 0;
        for relative in &self.config.also_copy {
            let source = self.config.source.join(relative);
            let io_err = |err| Error::Io {
                stage: Stage::Pages,
                path: source.clone(),
                err,
            };
            let metadata = match fs::symlink_metadata(&source) {
                Ok(metadata) => metadata,
                Err(err) if err.kind() == io::ErrorKind::NotFound => {
                    return Err(Error::MissingAlsoCopy(relative.clone()))
                }
                Err(err) => return Err(io_err(err)),
            };
            if !metadata.is_dir() {
                copy(&source, &self.config.destination.join(relative)).map_err(io_err)?;
                count += 1;
                continue;
            }

            for entry in WalkDir::new(&source).follow_links(false).min_depth(1) {
                let entry = entry.map_err(|err| Error::Walk {
                    stage: Stage::Pages,
                    err,
                })?;
                if entry.file_type().is_dir() {
                    continue;
                }
                let inner = entry.path().strip_prefix(&self.config.source).unwrap_or(relative);
                let target = self.config.destination.join(inner);
                let result = match entry.file_type().is_symlink() {
                    true => relink(entry.path(), &target),
                    false => copy(entry.path(), &target),
                };
                result.map_err(|err| Error::Io {
                    stage: Stage::Pages,
                    path: entry.path().to_owned(),
                    err,
                })?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Writes every rendered post to its dated path.
    pub fn write_posts(&self) -> Result<()> {
        for post in &self.posts {
            post.document
                .write(&post.destination(&self.config.destination))
                .map_err(|err| Error::Document {
                    stage: Stage::Write,
                    path: post.document.path.clone(),
                    err,
                })?;
        }
        Ok(())
    }

    // Walks the source tree depth first, `_posts` before its siblings,
    // handing every entry the filter allows to `visit`. Hidden entries and
    // the destination are never visited or descended into. For directories,
    // `visit` returns whether to descend.
    fn walk_source<F>(&self, stage: Stage, destination: &Path, mut visit: F) -> Result<()>
    where
        F: FnMut(&DirEntry) -> Result<bool>,
    {
        let mut entries = WalkDir::new(&self.config.source)
            .follow_links(false)
            .min_depth(1)
            .sort_by(posts_first)
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry.map_err(|err| Error::Walk { stage, err })?;
            let is_dir = entry.file_type().is_dir();
            let allowed = self.filter.allows(&entry.file_name().to_string_lossy());
            if !allowed || (is_dir && is_same_dir(entry.path(), destination)) {
                if is_dir {
                    entries.skip_current_dir();
                }
                continue;
            }
            if !visit(&entry)? && is_dir {
                entries.skip_current_dir();
            }
        }
        Ok(())
    }
}

fn posts_first(a: &DirEntry, b: &DirEntry) -> Ordering {
    let rank = |e: &DirEntry| e.file_name() != POSTS_DIR;
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.file_name().cmp(b.file_name()))
}

fn is_same_dir(path: &Path, canonical: &Path) -> bool {
    fs::canonicalize(path)
        .map(|path| path == canonical)
        .unwrap_or(false)
}

fn segments(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

fn copy(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(source, target).map(|_| ())
}

// Recreates the symbolic link at `source` as `target`, replacing whatever
// `target` held.
fn relink(source: &Path, target: &Path) -> io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::symlink_metadata(target).is_ok() {
        fs::remove_file(target)?;
    }
    symlink(source, target)
}

#[cfg(unix)]
fn symlink(source: &Path, target: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(fs::read_link(source)?, target)
}

#[cfg(not(unix))]
fn symlink(source: &Path, target: &Path) -> io::Result<()> {
    fs::copy(source, target).map(|_| ())
}
