//! Builds the site-wide data every template is rendered with.
//!
//! A [`SitePayload`] is a read-only view over the sorted post collection plus
//! the site settings. It is built fresh for each render and exposed to
//! templates under `site`:
//!
//! | key             | contents                                    |
//! |-----------------|---------------------------------------------|
//! | `time`          | build time, RFC 3339                        |
//! | `posts`         | every post, latest first                    |
//! | `latest_posts`  | the first [`LATEST`] posts                  |
//! | `older_posts`   | the [`OLDER`] posts after those             |
//! | `recent_posts`  | the first [`RECENT`] posts                  |
//! | `categories`    | category name to its posts, latest first    |
//! | `topics`        | topic name to its posts, latest first       |
//!
//! Settings from `_config.yaml` sit alongside these keys; a setting with the
//! same name as a built-in key is shadowed.

use crate::post::Post;
use crate::value::{from_mapping, object};
use chrono::{DateTime, Local};
use gtmpl_value::Value;
use serde_yaml::Mapping;
use std::collections::BTreeMap;

pub const LATEST: usize = 3;
pub const OLDER: usize = 5;
pub const RECENT: usize = 26;

/// A snapshot of the site as templates see it.
pub struct SitePayload<'a> {
    time: DateTime<Local>,
    posts: &'a [Post],
    order: Vec<usize>,
    categories: BTreeMap<String, Vec<usize>>,
    topics: BTreeMap<String, Vec<usize>>,
    settings: &'a Mapping,
}

impl<'a> SitePayload<'a> {
    /// Builds a payload stamped with the current time.
    pub fn new(posts: &'a [Post], settings: &'a Mapping) -> SitePayload<'a> {
        SitePayload::at(Local::now(), posts, settings)
    }

    /// Builds a payload stamped with `time`.
    pub fn at(time: DateTime<Local>, posts: &'a [Post], settings: &'a Mapping) -> SitePayload<'a> {
        let mut order: Vec<usize> = (0..posts.len()).collect();
        order.sort_by(|&a, &b| posts[a].cmp_latest(&posts[b]));

        let mut categories: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        let mut topics: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for &i in &order {
            for category in &posts[i].categories {
                categories.entry(category.clone()).or_default().push(i);
            }
            for topic in &posts[i].topics {
                topics.entry(topic.clone()).or_default().push(i);
            }
        }

        SitePayload {
            time,
            posts,
            order,
            categories,
            topics,
            settings,
        }
    }

    pub fn time(&self) -> DateTime<Local> {
        self.time
    }

    /// Every post, latest first.
    pub fn posts(&self) -> impl Iterator<Item = &'a Post> + '_ {
        self.order.iter().map(move |&i| &self.posts[i])
    }

    pub fn latest(&self) -> Vec<&'a Post> {
        self.window(0, LATEST)
    }

    pub fn older(&self) -> Vec<&'a Post> {
        self.window(LATEST, OLDER)
    }

    pub fn recent(&self) -> Vec<&'a Post> {
        self.window(0, RECENT)
    }

    /// The posts in `name`, latest first. Empty for unknown categories.
    pub fn category(&self, name: &str) -> Vec<&'a Post> {
        self.indexed(self.categories.get(name))
    }

    /// The posts in topic `name`, latest first.
    pub fn topic(&self, name: &str) -> Vec<&'a Post> {
        self.indexed(self.topics.get(name))
    }

    pub fn category_names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    fn window(&self, skip: usize, take: usize) -> Vec<&'a Post> {
        self.posts().skip(skip).take(take).collect()
    }

    fn indexed(&self, indices: Option<&Vec<usize>>) -> Vec<&'a Post> {
        indices
            .map(|indices| indices.iter().map(|&i| &self.posts[i]).collect())
            .unwrap_or_default()
    }

    /// The template data of every post, indexed like the slice the payload
    /// was built from.
    pub fn post_values(&self) -> Vec<Value> {
        self.posts.iter().map(Post::to_value).collect()
    }

    /// The payload as a template context: `{ "site": { ... } }`.
    pub fn to_value(&self) -> Value {
        self.to_value_with(&self.post_values())
    }

    /// Builds the template context from post data already converted with
    /// [`SitePayload::post_values`], so callers rendering many documents
    /// against the same posts convert each post once.
    pub fn to_value_with(&self, values: &[Value]) -> Value {
        let index = |groups: &BTreeMap<String, Vec<usize>>| {
            object(
                groups
                    .iter()
                    .map(|(name, indices)| (name.clone(), select(&values, indices.iter()))),
            )
        };

        let mut site = from_mapping(self.settings);
        site.insert("time".to_owned(), Value::String(self.time.to_rfc3339()));
        site.insert("posts".to_owned(), select(&values, self.order.iter()));
        site.insert(
            "latest_posts".to_owned(),
            select(&values, self.order.iter().take(LATEST)),
        );
        site.insert(
            "older_posts".to_owned(),
            select(&values, self.order.iter().skip(LATEST).take(OLDER)),
        );
        site.insert(
            "recent_posts".to_owned(),
            select(&values, self.order.iter().take(RECENT)),
        );
        site.insert("categories".to_owned(), index(&self.categories));
        site.insert("topics".to_owned(), index(&self.topics));
        object(vec![("site", Value::Object(site))])
    }
}

fn select<'v, I: Iterator<Item = &'v usize>>(values: &[Value], indices: I) -> Value {
    Value::Array(indices.filter_map(|&i| values.get(i).cloned()).collect())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::template::{self, Extensions};

    fn post(file_name: &str, raw: &str) -> Post {
        Post::parse(file_name, raw, &[], &[]).unwrap().unwrap()
    }

    fn posts() -> Vec<Post> {
        let mut posts = vec![
            post("2008-01-01-a.md", "---\ncategories: [foo]\n---\n"),
            post("2008-03-01-c.md", "---\ncategories: [foo, bar]\ntopics: [rust]\n---\n"),
            post("2008-02-01-b.md", "---\ncategory: foo\n---\n"),
            post("2008-05-01-e.md", "x"),
            post("2008-04-01-d.md", "---\ncategories: foo\n---\n"),
        ];
        crate::post::sort_latest(&mut posts);
        posts
    }

    fn slugs(posts: Vec<&Post>) -> Vec<&str> {
        posts.into_iter().map(|p| p.slug.as_str()).collect()
    }

    #[test]
    fn test_category_index() {
        let posts = posts();
        let settings = Mapping::new();
        let payload = SitePayload::new(&posts, &settings);
        assert_eq!(slugs(payload.category("foo")), vec!["d", "c", "b", "a"]);
        assert_eq!(slugs(payload.category("bar")), vec!["c"]);
        assert!(payload.category("nope").is_empty());
        assert_eq!(slugs(payload.topic("rust")), vec!["c"]);
        assert_eq!(payload.category_names().collect::<Vec<_>>(), vec!["bar", "foo"]);
    }

    #[test]
    fn test_windows() {
        let posts = posts();
        let settings = Mapping::new();
        let payload = SitePayload::new(&posts, &settings);
        assert_eq!(slugs(payload.latest()), vec!["e", "d", "c"]);
        assert_eq!(slugs(payload.older()), vec!["b", "a"]);
        assert_eq!(payload.recent().len(), 5);
    }

    #[test]
    fn test_order_does_not_depend_on_input_order() {
        let posts = vec![
            post("2008-01-01-a.md", "x"),
            post("2009-01-01-b.md", "x"),
        ];
        let settings = Mapping::new();
        let payload = SitePayload::new(&posts, &settings);
        assert_eq!(slugs(payload.posts().collect()), vec!["b", "a"]);
    }

    #[test]
    fn test_template_view() {
        let posts = posts();
        let settings: Mapping = serde_yaml::from_str("name: Blog\nposts: shadowed\n").unwrap();
        let payload = SitePayload::new(&posts, &settings);
        let out = template::render(
            "{{ .site.name }}:{{ len .site.posts }}:{{ len .site.categories.foo }}:\
             {{ range .site.latest_posts }}{{ .slug }}{{ end }}",
            &payload.to_value(),
            &Extensions::new(),
        )
        .unwrap();
        assert_eq!(out, "Blog:5:4:edc");
    }
}
