use std::fs;
use std::path::{Path, PathBuf};

use nestree::TreeSchema;
use serde::Deserialize;
use thiserror::Error;

/// Settings read from the CLI config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    pub database: Option<PathBuf>,
    pub single_tree: bool,
    pub schema: TreeSchema,
}

impl CliConfig {
    /// Loads `explicit`, or the default location when it exists.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => read_file(&path),
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Schema with the single-tree override applied.
    pub fn schema(&self, single_tree: bool) -> TreeSchema {
        if single_tree || self.single_tree {
            self.schema.clone().single_tree()
        } else {
            self.schema.clone()
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

fn read_file(path: &Path) -> Result<CliConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("nestree").join("config.toml"))
}
