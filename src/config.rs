//! Loads the [`BuildConfig`]: everything about a build that is decided before
//! any content is read.
//!
//! Three optional files in the source root feed it:
//!
//! * `_config.yaml`: free-form site settings, exposed to templates as `site.*`.
//! * `_options.yaml`: build options (see [`Options`]).
//! * `.quireignore`: whitespace-separated ignore patterns.

use crate::value::yaml_mapping;
use serde::Deserialize;
use serde_yaml::Mapping;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SETTINGS_FILE: &str = "_config.yaml";
pub const OPTIONS_FILE: &str = "_options.yaml";
pub const IGNORE_FILE: &str = ".quireignore";

/// Build options as written in `_options.yaml`. Every key is optional.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct Options {
    /// The layouts directory, relative to the source root.
    pub layouts_path: PathBuf,

    /// The includes directory, relative to the source root.
    pub includes_path: PathBuf,

    /// Source-relative paths copied verbatim even if the entry filter would
    /// hide them.
    pub also_copy: Vec<PathBuf>,

    /// Extra ignore patterns.
    pub ignore: Vec<String>,

    /// Whether Markdown quotes and dashes are made typographic.
    pub smart_punctuation: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            layouts_path: PathBuf::from("_layouts"),
            includes_path: PathBuf::from("_includes"),
            also_copy: Vec::new(),
            ignore: Vec::new(),
            smart_punctuation: true,
        }
    }
}

/// Represents an error loading one of the configuration files.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reading {kind} file `{}`: {err}", .path.display())]
    Read {
        kind: &'static str,
        path: PathBuf,
        #[source]
        err: io::Error,
    },

    #[error("parsing {kind} file `{}`: {err}", .path.display())]
    Parse {
        kind: &'static str,
        path: PathBuf,
        #[source]
        err: serde_yaml::Error,
    },

    #[error("{kind} file `{}` must hold a mapping", .path.display())]
    NotAMapping { kind: &'static str, path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;

/// The resolved configuration of one build. Built once, then only read.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub layouts_path: PathBuf,
    pub includes_path: PathBuf,
    pub also_copy: Vec<PathBuf>,
    pub ignore: Vec<String>,
    pub settings: Mapping,
    pub smart_punctuation: bool,
    pub quiet: bool,
}

impl BuildConfig {
    /// A configuration with default options and no settings, ignoring any
    /// configuration files.
    pub fn new<S: Into<PathBuf>, D: Into<PathBuf>>(source: S, destination: D) -> BuildConfig {
        let source = source.into();
        BuildConfig::from_options(source, destination.into(), Options::default(), Mapping::new())
    }

    /// Reads the configuration files from the `source` root. Missing files
    /// fall back to defaults; unreadable or malformed ones are errors.
    pub fn load<S: Into<PathBuf>, D: Into<PathBuf>>(source: S, destination: D) -> Result<BuildConfig> {
        let source = source.into();

        let settings = match read_optional(&source.join(SETTINGS_FILE), "settings")? {
            None => Mapping::new(),
            Some(text) => {
                let path = source.join(SETTINGS_FILE);
                yaml_mapping(&text)
                    .map_err(|err| Error::Parse {
                        kind: "settings",
                        path: path.clone(),
                        err,
                    })?
                    .ok_or(Error::NotAMapping {
                        kind: "settings",
                        path,
                    })?
            }
        };

        let options = match read_optional(&source.join(OPTIONS_FILE), "options")? {
            None => Options::default(),
            Some(text) if text.trim().is_empty() => Options::default(),
            Some(text) => serde_yaml::from_str(&text).map_err(|err| Error::Parse {
                kind: "options",
                path: source.join(OPTIONS_FILE),
                err,
            })?,
        };

        let mut config = BuildConfig::from_options(source, destination.into(), options, settings);
        if let Some(text) = read_optional(&config.source.join(IGNORE_FILE), "ignore")? {
            config
                .ignore
                .extend(text.split_whitespace().map(str::to_owned));
        }
        Ok(config)
    }

    fn from_options(source: PathBuf, destination: PathBuf, options: Options, settings: Mapping) -> BuildConfig {
        BuildConfig {
            layouts_path: source.join(options.layouts_path),
            includes_path: source.join(options.includes_path),
            also_copy: options.also_copy,
            ignore: options.ignore,
            settings,
            smart_punctuation: options.smart_punctuation,
            quiet: false,
            source,
            destination,
        }
    }

    /// Adds ignore patterns, e.g. from the command line.
    pub fn with_ignore<I, S>(mut self, patterns: I) -> BuildConfig
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Silences progress output.
    pub fn quiet(mut self, quiet: bool) -> BuildConfig {
        self.quiet = quiet;
        self
    }
}

fn read_optional(path: &Path, kind: &'static str) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(Error::Read {
            kind,
            path: path.to_owned(),
            err,
        }),
    }
}
