//! Defines the [`Post`] type: a dated [`Document`] read from a `_posts`
//! directory.
//!
//! Post file names follow `YYYY-MM-DD-slug.ext`. The date and slug always come
//! from the file name; front matter may override how they're displayed but
//! never how posts are ordered. Names that don't follow the pattern, or whose
//! date isn't a real calendar date, are not posts and are skipped without
//! comment.
//!
//! Posts are ordered latest first. `previous` and `next` are indices into that
//! ordering: `posts[i].next == Some(i + 1)` and
//! `posts[i].previous == Some(i - 1)`.

use crate::document::{Document, Result};
use crate::value::{extend_unique, get_bool, get_list, get_str, strings};
use chrono::NaiveDate;
use gtmpl_value::Value;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn file_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([0-9]{4})-([0-9]{2})-([0-9]{2})-(.+)\.\w+$").unwrap()
    })
}

/// Returns whether `file_name` has the `YYYY-MM-DD-slug.ext` shape of a post.
pub fn is_valid(file_name: &str) -> bool {
    file_name_pattern().is_match(file_name)
}

/// Splits a post file name into its date and slug. Returns `None` for names
/// that aren't posts, including well-formed names with impossible dates.
pub fn parse_file_name(file_name: &str) -> Option<(NaiveDate, &str)> {
    let captures = file_name_pattern().captures(file_name)?;
    let year = captures.get(1)?.as_str().parse().ok()?;
    let month = captures.get(2)?.as_str().parse().ok()?;
    let day = captures.get(3)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some((date, captures.get(4)?.as_str()))
}

/// A dated, categorized document.
#[derive(Debug, Clone)]
pub struct Post {
    /// The underlying document (front matter, body, rendered output).
    pub document: Document,

    /// The date from the file name. This is the sort key.
    pub date: NaiveDate,

    /// The slug from the file name.
    pub slug: String,

    /// Categories, in first-seen order: the directories above `_posts`,
    /// then the `category` and `categories` front matter keys.
    pub categories: Vec<String>,

    /// Topics, in first-seen order: the directories between `_posts` and the
    /// file, then the `topics` front matter key.
    pub topics: Vec<String>,

    /// Whether the post takes part in the build. Defaults to true.
    pub published: bool,

    /// The index of the adjacent newer post in the latest-first ordering.
    pub previous: Option<usize>,

    /// The index of the adjacent older post in the latest-first ordering.
    pub next: Option<usize>,
}

impl Post {
    /// Parses a post. `file_name` is the bare file name; `categories` and
    /// `topics` are the directory-derived memberships. Returns `Ok(None)` for
    /// file names that aren't posts.
    pub fn parse(
        file_name: &str,
        raw: &str,
        categories: &[String],
        topics: &[String],
    ) -> Result<Option<Post>> {
        let (date, slug) = match parse_file_name(file_name) {
            Some(parsed) => parsed,
            None => return Ok(None),
        };
        let document = Document::parse(file_name, raw)?;

        let mut post_categories = categories.to_vec();
        extend_unique(&mut post_categories, get_list(&document.metadata, "category"));
        extend_unique(&mut post_categories, get_list(&document.metadata, "categories"));

        let mut post_topics = topics.to_vec();
        extend_unique(&mut post_topics, get_list(&document.metadata, "topics"));

        Ok(Some(Post {
            published: get_bool(&document.metadata, "published").unwrap_or(true),
            date,
            slug: slug.to_owned(),
            categories: post_categories,
            topics: post_topics,
            previous: None,
            next: None,
            document,
        }))
    }

    /// Reads the post at `path`. See [`Post::parse`].
    pub fn read(path: &Path, categories: &[String], topics: &[String]) -> Result<Option<Post>> {
        let file_name = match path.file_name().and_then(|name| name.to_str()) {
            Some(name) if is_valid(name) => name.to_owned(),
            _ => return Ok(None),
        };
        let raw = std::fs::read_to_string(path).map_err(crate::document::Error::Read)?;
        let mut post = Post::parse(&file_name, &raw, categories, topics)?;
        if let Some(post) = post.as_mut() {
            post.document.path = path.to_owned();
        }
        Ok(post)
    }

    /// The permalink, e.g. `/2008/10/18/hello-world/`.
    pub fn url(&self) -> String {
        format!("/{}/{}/", self.date.format("%Y/%m/%d"), self.slug)
    }

    /// A unique identifier: the permalink without its trailing slash.
    pub fn id(&self) -> String {
        format!("/{}/{}", self.date.format("%Y/%m/%d"), self.slug)
    }

    /// The display title: the `title` front matter key, or the slug with
    /// dashes as spaces.
    pub fn title(&self) -> String {
        match get_str(&self.document.metadata, "title") {
            Some(title) => title.to_owned(),
            None => self.slug.replace('-', " "),
        }
    }

    /// Where the post is written below the destination root:
    /// `YYYY/MM/DD/slug/index.html`.
    pub fn destination(&self, root: &Path) -> PathBuf {
        root.join(self.date.format("%Y").to_string())
            .join(self.date.format("%m").to_string())
            .join(self.date.format("%d").to_string())
            .join(&self.slug)
            .join("index.html")
    }

    /// Orders posts latest first. Equal dates compare equal so a stable sort
    /// keeps discovery order.
    pub fn cmp_latest(&self, other: &Post) -> Ordering {
        other.date.cmp(&self.date)
    }

    fn summary_fields(&self) -> HashMap<String, Value> {
        let mut fields = HashMap::new();
        fields.insert("title".to_owned(), Value::String(self.title()));
        fields.insert("url".to_owned(), Value::String(self.url()));
        fields.insert("id".to_owned(), Value::String(self.id()));
        fields.insert(
            "date".to_owned(),
            Value::String(self.date.format("%Y-%m-%d").to_string()),
        );
        fields
    }

    fn data_fields(&self) -> HashMap<String, Value> {
        let mut fields = self.summary_fields();
        fields.insert("slug".to_owned(), Value::String(self.slug.clone()));
        fields.insert("categories".to_owned(), strings(&self.categories));
        fields.insert("topics".to_owned(), strings(&self.topics));
        let content = self.document.body.as_ref().unwrap_or(&self.document.content);
        fields.insert("content".to_owned(), Value::String(content.clone()));
        fields.extend(self.document.fields());
        fields
    }

    /// The short form used for `previous`/`next` links.
    pub fn summary(&self) -> Value {
        Value::Object(self.summary_fields())
    }

    /// The template data for this post as it appears in `site.posts` and the
    /// category/topic indexes. `content` is the converted body without
    /// layouts, or the raw body before rendering. Front matter keys overlay
    /// the derived fields.
    pub fn to_value(&self) -> Value {
        Value::Object(self.data_fields())
    }
}

/// Sorts `posts` latest first, keeping discovery order for equal dates, and
/// links each post to its neighbours.
pub fn sort_latest(posts: &mut [Post]) {
    posts.sort_by(Post::cmp_latest);
    link(posts);
}

/// Sets `previous`/`next` on every post from its position in `posts`.
pub fn link(posts: &mut [Post]) {
    let count = posts.len();
    for (i, post) in posts.iter_mut().enumerate() {
        post.previous = i.checked_sub(1);
        post.next = match i + 1 < count {
            true => Some(i + 1),
            false => None,
        };
    }
}

/// The `page` data for `posts[index]` while it renders: its own template data
/// plus `previous` and `next` summaries (nil at either end).
pub fn page_data(posts: &[Post], index: usize) -> Value {
    let post = &posts[index];
    let neighbour = |i: Option<usize>| match i.and_then(|i| posts.get(i)) {
        Some(p) => p.summary(),
        None => Value::Nil,
    };
    let mut fields = post.data_fields();
    fields.insert("previous".to_owned(), neighbour(post.previous));
    fields.insert("next".to_owned(), neighbour(post.next));
    Value::Object(fields)
}
