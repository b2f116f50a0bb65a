//! Build plan files
//!
//! A plan is a TOML (or JSON, by extension) document with a `steps` array:
//!
//! ```toml
//! [[steps]]
//! op = "from"
//! args = ["debian:bookworm"]
//!
//! [[steps]]
//! op = "workdir"
//! args = ["/app"]
//!
//! [[steps.block]]
//! op = "run"
//! args = ["make", "install"]
//! ```

use super::Step;
use crate::error::{BoxerError, BoxerResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Default plan file name in the current directory
pub const DEFAULT_PLAN: &str = "box.toml";

/// Parsed build plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl BuildPlan {
    /// Load a plan from disk, choosing the format by file extension
    pub async fn load(path: &Path) -> BoxerResult<Self> {
        if !path.exists() {
            return Err(BoxerError::PlanNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| BoxerError::io(format!("reading plan {}", path.display()), e))?;

        let plan = if is_json(path) {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str(&content).map_err(|e| e.to_string())
        };

        let plan: Self = plan.map_err(|reason| BoxerError::PlanInvalid {
            path: path.to_path_buf(),
            reason,
        })?;
        debug!(path = %path.display(), steps = plan.steps.len(), "Loaded build plan");
        Ok(plan)
    }

    /// Directory relative copy sources resolve against
    pub fn context_dir(path: &Path) -> PathBuf {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
