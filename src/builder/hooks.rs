//! Step hooks run inside the ephemeral container before it is committed

use crate::cache::CacheKey;
use crate::error::{BoxerError, BoxerResult};
use crate::orchestration::ContainerRuntime;
use crate::ui;
use async_trait::async_trait;

/// Effect applied to an ephemeral container during a commit
#[async_trait]
pub trait StepHook: Send + Sync {
    /// Apply the step's effect. A returned key replaces the step's cache
    /// key unless caching is disabled.
    async fn apply(
        &self,
        runtime: &dyn ContainerRuntime,
        container_id: &str,
    ) -> BoxerResult<Option<CacheKey>>;
}

/// Runs the container's command, streaming its output, and fails on a
/// non-zero exit
pub struct RunHook;

#[async_trait]
impl StepHook for RunHook {
    async fn apply(
        &self,
        runtime: &dyn ContainerRuntime,
        container_id: &str,
    ) -> BoxerResult<Option<CacheKey>> {
        ui::output_begin();
        let started = runtime
            .start_attached(container_id, &|line: String| ui::output_line(&line))
            .await;
        ui::output_end();
        started?;

        let code = runtime.wait_container(container_id).await?;
        if code != 0 {
            return Err(BoxerError::NonZeroExit {
                container: container_id.to_string(),
                code,
            });
        }

        Ok(None)
    }
}

/// Extracts a packaged archive into the container
pub struct CopyHook {
    archive: Vec<u8>,
    key: CacheKey,
}

impl CopyHook {
    pub fn new(archive: Vec<u8>, key: CacheKey) -> Self {
        Self { archive, key }
    }
}

#[async_trait]
impl StepHook for CopyHook {
    async fn apply(
        &self,
        runtime: &dyn ContainerRuntime,
        container_id: &str,
    ) -> BoxerResult<Option<CacheKey>> {
        runtime
            .copy_to_container(container_id, &self.archive, "/")
            .await?;
        Ok(Some(self.key.clone()))
    }
}
