//! Cache-aware commit protocol
//!
//! Every step that changes the image goes through [`Builder::commit`]:
//!
//! 1. Create an ephemeral container from the effective configuration
//! 2. Arm an interrupt watcher that force-removes the container on cancel
//! 3. Run the step hook, which may refine the cache key
//! 4. Commit with the canonical configuration and the key as comment
//! 5. Remove the container, cleanly if possible, forcibly otherwise
//!
//! The container is removed exactly once on every path: success, hook
//! failure, commit failure and interruption.

use super::hooks::StepHook;
use super::Builder;
use crate::cache::CacheKey;
use crate::error::{BoxerError, BoxerResult};
use crate::orchestration::{ContainerRuntime, ContainerSpec, ImageConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of ephemeral container names
const CONTAINER_PREFIX: &str = "boxer-step";

/// One commit: the key to store, an optional transient command and an
/// optional hook applied before committing
pub struct CommitRequest<'a> {
    pub key: CacheKey,
    pub cmd_override: Option<Vec<String>>,
    pub hook: Option<&'a dyn StepHook>,
}

impl<'a> CommitRequest<'a> {
    pub fn new(key: CacheKey) -> Self {
        Self {
            key,
            cmd_override: None,
            hook: None,
        }
    }

    /// Command used when creating the container only; never committed
    pub fn with_cmd(mut self, cmd: Vec<String>) -> Self {
        self.cmd_override = Some(cmd);
        self
    }

    pub fn with_hook(mut self, hook: &'a dyn StepHook) -> Self {
        self.hook = Some(hook);
        self
    }
}

/// Background task that force-removes a container when the build is
/// cancelled while the container is live
struct InterruptWatcher {
    disarm: CancellationToken,
    removed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl InterruptWatcher {
    fn arm(
        runtime: Arc<dyn ContainerRuntime>,
        container_id: String,
        cancel: CancellationToken,
    ) -> Self {
        let disarm = CancellationToken::new();
        let removed = Arc::new(AtomicBool::new(false));

        let handle = tokio::spawn({
            let disarm = disarm.clone();
            let removed = removed.clone();
            async move {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(container = %container_id, "Interrupted, removing intermediate container");
                        match runtime.remove_container(&container_id, true).await {
                            Ok(()) => removed.store(true, Ordering::SeqCst),
                            Err(e) => warn!(container = %container_id, "Interrupt cleanup failed: {}", e),
                        }
                    }
                    _ = disarm.cancelled() => {}
                }
            }
        });

        Self {
            disarm,
            removed,
            handle: Some(handle),
        }
    }

    /// Stop watching and report whether the watcher removed the container
    async fn disarm(mut self) -> bool {
        self.disarm.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Interrupt watcher task failed: {}", e);
            }
        }
        self.removed.load(Ordering::SeqCst)
    }
}

impl Drop for InterruptWatcher {
    fn drop(&mut self) {
        self.disarm.cancel();
    }
}

impl Builder {
    /// Run one step through an ephemeral container and commit the result.
    ///
    /// On success the state points at the new image, whose id is returned.
    /// On failure the state is unchanged and the container has been removed.
    pub async fn commit(&mut self, request: CommitRequest<'_>) -> BoxerResult<String> {
        let key = if self.settings.no_cache {
            CacheKey::empty()
        } else {
            request.key
        };

        let image = self
            .state
            .current_image()
            .ok_or_else(|| {
                BoxerError::Usage("No base image: a build must start with 'from'".to_string())
            })?
            .to_string();

        let mut config = self.state.effective_config();
        if let Some(cmd) = request.cmd_override {
            config.cmd = cmd;
        }

        let spec = ContainerSpec {
            name: format!("{}-{}", CONTAINER_PREFIX, Uuid::new_v4()),
            image,
            config,
            tty: true,
        };

        // Not raced against cancellation: a container created by a dropped
        // request would have no id to clean up.
        let container_id = self.runtime.create_container(&spec).await?;
        debug!(container = %container_id, image = %spec.image, "Created intermediate container");

        let watcher = InterruptWatcher::arm(
            self.runtime.clone(),
            container_id.clone(),
            self.cancel.clone(),
        );

        let canonical = self.state.config.clone();
        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(BoxerError::Interrupted {
                container: container_id.clone(),
            }),
            result = apply_and_commit(
                self.runtime.as_ref(),
                &container_id,
                request.hook,
                key,
                self.settings.no_cache,
                &canonical,
            ) => result,
        };

        let watcher_removed = watcher.disarm().await;

        match outcome {
            Ok((image_id, cleanly_removed)) => {
                if !cleanly_removed && !watcher_removed {
                    self.runtime
                        .remove_container(&container_id, true)
                        .await
                        .map_err(|e| {
                            BoxerError::runtime(
                                "rm",
                                &container_id,
                                format!("could not remove intermediate container: {}", e),
                            )
                        })?;
                }
                info!(image = %image_id, "Committed step");
                self.state.set_image(image_id.clone());
                Ok(image_id)
            }
            Err(e) => {
                if !watcher_removed {
                    if let Err(cleanup) = self.runtime.remove_container(&container_id, true).await
                    {
                        warn!(
                            container = %container_id,
                            "Failed to remove intermediate container: {}", cleanup
                        );
                    }
                }
                Err(e)
            }
        }
    }
}

/// Apply the hook, commit, and attempt a clean removal.
///
/// Returns the new image id and whether the clean removal succeeded.
async fn apply_and_commit(
    runtime: &dyn ContainerRuntime,
    container_id: &str,
    hook: Option<&dyn StepHook>,
    mut key: CacheKey,
    no_cache: bool,
    config: &ImageConfig,
) -> BoxerResult<(String, bool)> {
    if let Some(hook) = hook {
        if let Some(refined) = hook.apply(runtime, container_id).await? {
            if !no_cache && !refined.is_empty() {
                key = refined;
            }
        }
    }

    let image_id = runtime
        .commit_container(container_id, config, key.as_str())
        .await?;
    debug!(container = %container_id, image = %image_id, key = %key, "Committed container");

    let removed = match runtime.remove_container(container_id, false).await {
        Ok(()) => true,
        Err(e) => {
            warn!(container = %container_id, "Clean removal failed, forcing: {}", e);
            false
        }
    };

    Ok((image_id, removed))
}
