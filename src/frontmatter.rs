//! Parsing of the leading metadata block of a source file.
//!
//! A file carries front matter when its first line is exactly `---`. The YAML
//! mapping runs up to the next `---` line and everything after that line is
//! the body:
//!
//! ```md
//! ---
//! layout: post
//! title: Hello, world!
//! ---
//! # Hello
//! ```
//!
//! Parsing is soft: text without an opening delimiter, or with an opening
//! delimiter but no closing one, is all body and no metadata.

use crate::value::yaml_mapping;
use serde_yaml::Mapping;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;

/// The line that opens and closes a front matter block.
pub const DELIMITER: &str = "---";

/// Represents an error parsing a front matter block that is present.
#[derive(Error, Debug)]
pub enum Error {
    /// Returned when the block between the delimiters isn't valid YAML.
    #[error("invalid YAML front matter: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Returned when the block is valid YAML but not a mapping.
    #[error("front matter must be a mapping of keys to values")]
    NotAMapping,
}

/// Splits `raw` into `(yaml, body)` if it starts with a delimited block.
pub fn split(raw: &str) -> Option<(&str, &str)> {
    let mut lines = raw.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != DELIMITER {
        return None;
    }

    let yaml_start = first.len();
    let mut offset = yaml_start;
    for line in lines {
        if line.trim_end() == DELIMITER {
            return Some((&raw[yaml_start..offset], &raw[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Parses the front matter of `raw`, returning the metadata and the remaining
/// body. Missing front matter yields an empty mapping and the whole text.
pub fn parse(raw: &str) -> Result<(Mapping, &str), Error> {
    match split(raw) {
        None => Ok((Mapping::new(), raw)),
        Some((yaml, body)) => match yaml_mapping(yaml)? {
            Some(metadata) => Ok((metadata, body)),
            None => Err(Error::NotAMapping),
        },
    }
}

/// Returns whether the first three bytes of the file at `path` are the front
/// matter delimiter. This is the test that separates templated pages from
/// assets copied verbatim.
pub fn starts_with_delimiter(path: &Path) -> io::Result<bool> {
    let mut first = [0u8; 3];
    let mut file = File::open(path)?;
    let mut read = 0;
    while read < first.len() {
        match file.read(&mut first[read..])? {
            0 => return Ok(false),
            n => read += n,
        }
    }
    Ok(first == *DELIMITER.as_bytes())
}
