//! Runtime shared types
//!
//! Contains data structures exchanged with container runtimes.
//! The actual runtime execution logic is in the runtime implementations.

use serde::{Deserialize, Serialize};

/// Image configuration carried from step to step and stamped onto commits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Working directory inside the container
    pub working_dir: String,
    /// User the container process runs as
    pub user: String,
    /// Default command arguments
    pub cmd: Vec<String>,
    /// Entrypoint arguments
    pub entrypoint: Vec<String>,
    /// Environment variables in step order, later keys overwrite earlier ones
    pub env: Vec<(String, String)>,
}

impl ImageConfig {
    /// Set an environment variable, overwriting an existing key in place
    pub fn set_env(&mut self, key: &str, value: &str) {
        match self.env.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.env.push((key.to_string(), value.to_string())),
        }
    }

    /// Environment rendered as `KEY=VALUE` strings
    pub fn env_pairs(&self) -> Vec<String> {
        self.env.iter().map(|(k, v)| format!("{}={}", k, v)).collect()
    }
}

/// Everything needed to create one ephemeral container
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name
    pub name: String,
    /// Image id or reference to create from
    pub image: String,
    /// Effective configuration, including transient overrides
    pub config: ImageConfig,
    /// Allocate a TTY
    pub tty: bool,
}

/// Entry from the runtime's image list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSummary {
    /// Image id
    pub id: String,
    /// Id of the image this one was committed from (empty for pulled images)
    pub parent_id: String,
}

/// Detailed image record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDetails {
    /// Image id
    pub id: String,
    /// Parent image id (empty for pulled images)
    pub parent_id: String,
    /// Commit comment; holds the cache key for images built by boxer
    pub comment: String,
    /// Configuration snapshot
    pub config: ImageConfig,
}

/// Raw `image inspect` record as emitted by Podman/Docker compatible CLIs
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawImage {
    pub id: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub config: Option<RawImageConfig>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawImageConfig {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub cmd: Option<Vec<String>>,
    #[serde(default)]
    pub entrypoint: Option<Vec<String>>,
    #[serde(default)]
    pub env: Option<Vec<String>>,
}

impl From<RawImage> for ImageDetails {
    fn from(raw: RawImage) -> Self {
        let raw_config = raw.config.unwrap_or_default();
        let env = raw_config
            .env
            .unwrap_or_default()
            .into_iter()
            .map(|pair| match pair.split_once('=') {
                Some((k, v)) => (k.to_string(), v.to_string()),
                None => (pair, String::new()),
            })
            .collect();

        Self {
            id: normalize_id(&raw.id),
            parent_id: raw.parent.as_deref().map(normalize_id).unwrap_or_default(),
            comment: raw.comment.unwrap_or_default(),
            config: ImageConfig {
                working_dir: raw_config.working_dir.unwrap_or_default(),
                user: raw_config.user.unwrap_or_default(),
                cmd: raw_config.cmd.unwrap_or_default(),
                entrypoint: raw_config.entrypoint.unwrap_or_default(),
                env,
            },
        }
    }
}

/// Strip the digest algorithm prefix so ids from different commands compare equal
pub fn normalize_id(id: &str) -> String {
    id.trim().trim_start_matches("sha256:").to_string()
}

/// Short form of an id for display
pub fn short_id(id: &str) -> &str {
    &id[..12.min(id.len())]
}
