//! Image builder
//!
//! The [`Builder`] owns the runtime handle, the build state and the settings
//! resolved for one build. Steps drive it through [`Builder::execute`], which
//! consults the cache and otherwise runs the commit protocol.

mod commit;
#[cfg(test)]
pub(crate) mod fake;
pub mod hooks;
mod lookup;
pub mod state;

pub use commit::CommitRequest;
pub use hooks::{CopyHook, RunHook, StepHook};
pub use state::{BuildState, HasBuildState, ScopeGuard, ScopedField};

use crate::cache::{extract_file, CacheKey};
use crate::config::Config;
use crate::error::{BoxerError, BoxerResult};
use crate::orchestration::{ContainerRuntime, ContainerSpec};
use crate::ui::{self, PullProgress, UiContext};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Environment variable that disables the cache for a whole run
pub const NO_CACHE_ENV: &str = "NO_CACHE";

/// Key used to re-commit the current image after a scope exit
const RESOLVE_KEY: &str = "box:resolve";

/// Settings fixed for the duration of one build
#[derive(Debug, Clone)]
pub struct BuildSettings {
    /// Skip cache lookups and commit with empty keys
    pub no_cache: bool,
    /// Shell prefix for `run` steps
    pub shell: Vec<String>,
    /// Directory relative copy sources resolve against
    pub context_dir: PathBuf,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            no_cache: false,
            shell: vec!["/bin/sh".to_string(), "-c".to_string()],
            context_dir: PathBuf::from("."),
        }
    }
}

impl BuildSettings {
    /// Resolve settings from config, the `--no-cache` flag and `NO_CACHE`
    pub fn resolve(config: &Config, context_dir: PathBuf, no_cache_flag: bool) -> Self {
        let env_no_cache = std::env::var(NO_CACHE_ENV)
            .map(|v| !v.is_empty())
            .unwrap_or(false);

        Self {
            no_cache: no_cache_flag || env_no_cache || config.build.no_cache,
            shell: config.build.shell.clone(),
            context_dir,
        }
    }
}

/// Drives one image build against a container runtime
pub struct Builder {
    runtime: Arc<dyn ContainerRuntime>,
    state: BuildState,
    settings: BuildSettings,
    cancel: CancellationToken,
}

impl Builder {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: BuildSettings) -> Self {
        Self {
            runtime,
            state: BuildState::new(),
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Use `cancel` to interrupt the build; cancelling removes the in-flight
    /// container and fails the current step
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> &BuildState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut BuildState {
        &mut self.state
    }

    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Run a step: adopt a cached image when one matches, commit otherwise.
    /// Returns the image the state now points at.
    pub async fn execute(&mut self, request: CommitRequest<'_>) -> BoxerResult<String> {
        if self.consult_cache(&request.key).await? {
            return self.current_image();
        }

        let image = self.commit(request).await?;
        ui::committed(&image);
        Ok(image)
    }

    /// Make `reference` the base of the build, pulling it when absent
    pub async fn from_image(&mut self, reference: &str) -> BoxerResult<String> {
        let exists = self
            .interruptible("image lookup", self.runtime.image_exists(reference))
            .await?;
        if !exists {
            info!(image = %reference, "Pulling base image");
            let progress = PullProgress::new(&UiContext::detect(), reference);
            let pulled = self
                .interruptible(
                    "pull",
                    self.runtime
                        .pull_image(reference, &|line: String| progress.on_line(line)),
                )
                .await;
            progress.finish();
            pulled?;
        }

        let details = self
            .interruptible("image inspect", self.runtime.inspect_image(reference))
            .await?;
        debug!(image = %reference, id = %details.id, "Resolved base image");
        self.state.set_base(reference, details.id, &details.config);

        self.execute(CommitRequest::new(CacheKey::for_step("from", reference)))
            .await
    }

    /// Final image id of the build.
    ///
    /// A scope exit leaves no tracked image; the current image is then
    /// re-committed so the result reflects the canonical configuration.
    pub async fn finish(&mut self) -> BoxerResult<String> {
        if self.state.current_image().is_none() {
            return Err(BoxerError::Usage(
                "Nothing to build: the plan has no 'from' step".to_string(),
            ));
        }

        match self.state.tracked_image() {
            Some(image) => Ok(image.to_string()),
            None => {
                self.execute(CommitRequest::new(CacheKey::for_step(RESOLVE_KEY, "")))
                    .await
            }
        }
    }

    /// Tag the current image
    pub async fn tag(&self, tag: &str) -> BoxerResult<()> {
        let image = self.current_image()?;
        self.interruptible("tag", self.runtime.tag_image(&image, tag))
            .await?;
        ui::tagged(tag);
        Ok(())
    }

    /// Read a single file out of the current image
    pub async fn container_content(&self, path: &str) -> BoxerResult<Vec<u8>> {
        let spec = ContainerSpec {
            name: format!("boxer-read-{}", Uuid::new_v4()),
            image: self.current_image()?,
            config: self.state.effective_config(),
            tty: false,
        };

        let container_id = self.runtime.create_container(&spec).await?;
        let copied = self
            .interruptible("copy", self.runtime.copy_from_container(&container_id, path))
            .await;

        if let Err(e) = self.runtime.remove_container(&container_id, true).await {
            warn!(container = %container_id, "Failed to remove read container: {}", e);
        }

        extract_file(&copied?, path)
    }

    /// Await a runtime call unless the build is cancelled first.
    ///
    /// Only for calls that leave nothing behind when dropped; container
    /// creation goes through [`Builder::commit`] instead.
    pub async fn interruptible<T, F>(&self, operation: &str, call: F) -> BoxerResult<T>
    where
        F: Future<Output = BoxerResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                warn!(operation = %operation, "Interrupted");
                Err(BoxerError::Cancelled {
                    operation: operation.to_string(),
                })
            }
            result = call => result,
        }
    }

    fn current_image(&self) -> BoxerResult<String> {
        self.state
            .current_image()
            .map(str::to_string)
            .ok_or_else(|| {
                BoxerError::Usage("No base image: a build must start with 'from'".to_string())
            })
    }
}

impl HasBuildState for Builder {
    fn build_state(&mut self) -> &mut BuildState {
        &mut self.state
    }
}
