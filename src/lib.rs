//! The library code for the `quire` static site generator. A build walks a
//! source tree and produces a destination tree in four stages
//! ([`site::Stage`]):
//!
//! 1. Loading layouts ([`crate::layout`]) and compiling the entry filter
//!    ([`crate::filter`])
//! 2. Reading, sorting and rendering posts ([`crate::post`]) from every
//!    `_posts` directory
//! 3. Rendering pages ([`crate::page`]) and copying everything else
//! 4. Writing posts to their dated paths
//!
//! Posts are all read and sorted before anything is rendered, so every
//! template sees the complete post collection through the site payload
//! ([`crate::payload`]). Rendering itself is three steps: the body runs
//! through the template engine ([`crate::template`]), is converted from its
//! markup ([`crate::markup`]), and is wrapped in its layout chain.
//!
//! [`build`] runs all of it from a [`config::BuildConfig`].

#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]

#[macro_use]
pub mod logger;

pub mod config;
pub mod document;
pub mod filter;
pub mod frontmatter;
pub mod include;
pub mod layout;
pub mod markup;
pub mod page;
pub mod payload;
pub mod post;
pub mod site;
pub mod template;
pub mod textile;
pub mod value;

/// Builds the site described by `config`.
pub fn build(config: &config::BuildConfig) -> site::Result<site::Summary> {
    site::SiteBuilder::new(config)?.process()
}
