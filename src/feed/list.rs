use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing the YAML feed list.
#[derive(Debug, Error)]
pub enum FeedListError {
    #[error("Failed to access feed list {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid feed list {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// One record of the feed list. Identity is `url`.
///
/// Keys other than `url` and `source` are kept in `extra` and written back
/// unchanged, in their original order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedDefinition {
    pub url: String,

    /// Human label, often the site's host name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

impl FeedDefinition {
    pub fn new(url: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            source: Some(source.into()),
            extra: serde_yaml::Mapping::new(),
        }
    }

    /// The label used in reports: `source`, else the URL itself.
    pub fn label(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.url)
    }
}

/// Reads the whole feed list. An empty file is an empty list.
pub fn load_feed_list(path: &Path) -> Result<Vec<FeedDefinition>, FeedListError> {
    let text = std::fs::read_to_string(path).map_err(|source| FeedListError::Io {
        path: path.to_owned(),
        source,
    })?;

    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_yaml::from_str(&text).map_err(|source| FeedListError::Yaml {
        path: path.to_owned(),
        source,
    })
}

/// Writes the whole feed list, preserving record order.
///
/// The list is written to a sibling temporary file and renamed over `path`,
/// so readers never see a half-written list.
pub fn save_feed_list(path: &Path, feeds: &[FeedDefinition]) -> Result<(), FeedListError> {
    let yaml = serde_yaml::to_string(feeds).map_err(|source| FeedListError::Yaml {
        path: path.to_owned(),
        source,
    })?;

    let io_err = |source| FeedListError::Io {
        path: path.to_owned(),
        source,
    };

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    std::fs::write(&tmp_path, yaml).map_err(io_err)?;
    std::fs::rename(&tmp_path, path).map_err(io_err)?;

    tracing::debug!(path = %path.display(), feeds = feeds.len(), "Saved feed list");
    Ok(())
}
