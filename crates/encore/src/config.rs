use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::gigs::parse_timezone;

pub const CONFIG_FILENAME: &str = "encore.toml";

/// The contents of `encore.toml`. Every key is optional.
#[derive(Debug, PartialEq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,

    /// Relative to `source_dir`, like the other source paths below.
    pub templates_dir: PathBuf,
    pub scss_dir: PathBuf,
    pub assets_dir: PathBuf,
    pub scripts_dir: PathBuf,
    pub gigs: PathBuf,

    /// The timezone for shows that don't name one. Defaults to the timezone
    /// of the machine running the build.
    #[serde(deserialize_with = "deserialize_timezone")]
    pub timezone: Option<Tz>,

    pub minify: bool,
    pub serve: ServeConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            source_dir: PathBuf::from("src"),
            output_dir: PathBuf::from("dist"),
            templates_dir: PathBuf::from("templates"),
            scss_dir: PathBuf::from("scss"),
            assets_dir: PathBuf::from("assets"),
            scripts_dir: PathBuf::from("js"),
            gigs: PathBuf::from("data/gigs.csv"),
            timezone: None,
            minify: false,
            serve: ServeConfig::default(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
    /// How long to wait for more file changes before rebuilding.
    pub debounce_ms: u64,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            debounce_ms: 250,
        }
    }
}

#[derive(Error, Debug)]
pub enum LoadConfigError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SiteConfig {
    /// Loads `encore.toml` from `root_path`, falling back to the defaults
    /// when there is no such file.
    pub fn load(root_path: impl AsRef<Path>) -> Result<Self, LoadConfigError> {
        let path = root_path.as_ref().join(CONFIG_FILENAME);

        match fs::read_to_string(&path) {
            Ok(text) => Self::parse(&text),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(LoadConfigError::Io { path, source }),
        }
    }

    pub fn parse(text: &str) -> Result<Self, LoadConfigError> {
        Ok(toml::from_str(text)?)
    }
}

fn deserialize_timezone<'de, D>(deserializer: D) -> Result<Option<Tz>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<String>::deserialize(deserializer)? {
        Some(name) if !name.trim().is_empty() => parse_timezone(&name)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("unknown timezone '{name}'"))),
        _ => Ok(None),
    }
}
