//! Container runtime abstraction
//!
//! Provides a trait for the container operations the build engine needs,
//! so the commit protocol can be driven against Podman, a Docker-compatible
//! CLI, or an in-memory runtime in tests.

use crate::error::BoxerResult;
use crate::orchestration::podman::{ContainerSpec, ImageConfig, ImageDetails, ImageSummary};
use async_trait::async_trait;

/// Callback receiving one line of process output at a time
pub type OutputSink<'a> = &'a (dyn Fn(String) + Send + Sync);

/// Abstract container runtime interface
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Create a container without starting it and return its id
    async fn create_container(&self, spec: &ContainerSpec) -> BoxerResult<String>;

    /// Start a container attached, streaming its output until it exits
    async fn start_attached(&self, container_id: &str, on_output: OutputSink<'_>)
        -> BoxerResult<()>;

    /// Wait for a container to exit and return its exit code
    async fn wait_container(&self, container_id: &str) -> BoxerResult<i64>;

    /// Remove a container. Removing a container that no longer exists succeeds.
    async fn remove_container(&self, container_id: &str, force: bool) -> BoxerResult<()>;

    /// Commit a container to a new image and return the image id
    async fn commit_container(
        &self,
        container_id: &str,
        config: &ImageConfig,
        comment: &str,
    ) -> BoxerResult<String>;

    /// List all images, including intermediate ones
    async fn list_images(&self) -> BoxerResult<Vec<ImageSummary>>;

    /// Inspect a single image
    async fn inspect_image(&self, image: &str) -> BoxerResult<ImageDetails>;

    /// Check if an image exists locally
    async fn image_exists(&self, image: &str) -> BoxerResult<bool>;

    /// Pull an image, streaming progress lines
    async fn pull_image(&self, image: &str, on_progress: OutputSink<'_>) -> BoxerResult<()>;

    /// Add a tag to an image
    async fn tag_image(&self, image: &str, tag: &str) -> BoxerResult<()>;

    /// Read a path out of a container as a tar archive
    async fn copy_from_container(&self, container_id: &str, path: &str) -> BoxerResult<Vec<u8>>;

    /// Extract a tar archive into a container at `dest`
    async fn copy_to_container(
        &self,
        container_id: &str,
        archive: &[u8],
        dest: &str,
    ) -> BoxerResult<()>;

    /// Get the human-readable runtime name for display
    fn runtime_name(&self) -> &'static str;
}
