//! Runtime factory for creating the configured container runtime

use crate::config::Config;
use crate::error::{BoxerError, BoxerResult};
use crate::orchestration::native_podman::PodmanRuntime;
use crate::orchestration::runtime::ContainerRuntime;
use std::sync::Arc;

/// Create the container runtime named in the configuration
///
/// The runtime is shared with the per-commit interrupt watcher, so it is
/// handed out behind an `Arc`.
pub fn create_runtime(config: &Config) -> BoxerResult<Arc<dyn ContainerRuntime>> {
    let program = config.runtime.program.trim();
    if program.is_empty() {
        return Err(BoxerError::ConfigInvalid {
            path: "runtime.program".into(),
            reason: "runtime program must not be empty".to_string(),
        });
    }

    Ok(Arc::new(PodmanRuntime::new(program)))
}
