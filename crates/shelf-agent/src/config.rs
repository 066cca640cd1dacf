use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, AgentResult};

/// How an upload gets its bytes into the store.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkMode {
    /// Block copy with progress after every block.
    #[default]
    Copy,
    /// Hard-link the source into the store when the filesystem allows it,
    /// falling back to a block copy otherwise. The stored object then shares
    /// its inode with the working copy, so in-place edits reach the store.
    HardLink,
}

/// Agent configuration, usually loaded from an optional TOML file and then
/// overridden by command-line flags.
///
/// ```toml
/// base_dir = "/mnt/shared/lfs"
/// temp_dir = "/var/tmp"
/// link_mode = "hard-link"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Root of the object store. `init` fails when this is unset.
    pub base_dir: Option<PathBuf>,
    /// Where downloads are staged before git-lfs moves them into place.
    /// Defaults to the system temp directory.
    pub temp_dir: Option<PathBuf>,
    pub link_mode: LinkMode,
}

impl AgentConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> AgentResult<Self> {
        toml::from_str(s).map_err(|e| AgentError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> AgentResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| AgentError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Staging directory for downloads.
    pub fn download_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
