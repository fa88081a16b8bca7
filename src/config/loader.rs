//! Loading transform definitions from TOML and merging them into a registry.

use crate::config::schema::{TransformConfig, ValidationError, ValidationIssue};
use crate::transform::TransformDescriptor;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Toml {
        path: Option<PathBuf>,
        source: toml_edit::de::Error,
    },
    Validation {
        path: Option<PathBuf>,
        source: ValidationError,
    },
}

impl ConfigError {
    /// File the error came from, when loaded from disk.
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Io { path, .. } => Some(path),
            ConfigError::Toml { path, .. } | ConfigError::Validation { path, .. } => {
                path.as_deref()
            }
        }
    }

    /// Every validation issue found, empty for I/O and syntax errors.
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            ConfigError::Validation { source, .. } => &source.issues,
            _ => &[],
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let origin = self
            .path()
            .map(|path| format!(" {}", path.display()))
            .unwrap_or_default();

        match self {
            ConfigError::Io { source, .. } => {
                write!(f, "cannot read transform config{origin}: {source}")
            }
            ConfigError::Toml { source, .. } => {
                write!(f, "transform config{origin} is not valid TOML: {source}")
            }
            ConfigError::Validation { source, .. } => {
                let count = source.issues.len();
                let noun = if count == 1 { "issue" } else { "issues" };
                write!(f, "transform config{origin} has {count} {noun}:")?;
                for issue in &source.issues {
                    write!(f, "\n  - {issue}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Toml { source, .. } => Some(source),
            ConfigError::Validation { source, .. } => Some(source),
        }
    }
}

fn parse(input: &str, path: Option<&Path>) -> Result<TransformConfig, ConfigError> {
    let path = || path.map(Path::to_path_buf);
    let config: TransformConfig = toml_edit::de::from_str(input)
        .map_err(|source| ConfigError::Toml { path: path(), source })?;
    config
        .validate()
        .map_err(|source| ConfigError::Validation { path: path(), source })?;
    Ok(config)
}

pub fn load_from_str(input: &str) -> Result<TransformConfig, ConfigError> {
    parse(input, None)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<TransformConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&contents, Some(path))
}

/// Load `path` and merge its transforms into `registry`.
///
/// A transform whose id is already registered takes that descriptor's place
/// in the order; new ids are appended. Returns how many were loaded.
pub fn extend_registry(
    registry: &mut Vec<TransformDescriptor>,
    path: impl AsRef<Path>,
) -> Result<usize, ConfigError> {
    let path = path.as_ref();
    let config = load_from_path(path)?;
    let loaded = config
        .to_descriptors()
        .map_err(|source| ConfigError::Validation {
            path: Some(path.to_path_buf()),
            source,
        })?;
    let count = loaded.len();

    for descriptor in loaded {
        match registry
            .iter_mut()
            .find(|existing| existing.name == descriptor.name)
        {
            Some(existing) => {
                debug!(transform = %descriptor.name, config = %path.display(), "overriding registered transform");
                *existing = descriptor;
            }
            None => registry.push(descriptor),
        }
    }

    Ok(count)
}
