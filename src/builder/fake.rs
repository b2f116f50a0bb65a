//! In-memory container runtime for exercising the build engine in tests

use crate::error::{BoxerError, BoxerResult};
use crate::orchestration::{
    ContainerRuntime, ContainerSpec, ImageConfig, ImageDetails, ImageSummary, OutputSink,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

#[derive(Default)]
struct FakeState {
    calls: Vec<String>,
    images: BTreeMap<String, ImageDetails>,
    refs: HashMap<String, String>,
    remote: HashMap<String, ImageConfig>,
    containers: BTreeMap<String, String>,
    created: Vec<ContainerSpec>,
    commits: Vec<(ImageConfig, String)>,
    copied: Vec<Vec<u8>>,
    files: HashMap<String, Vec<u8>>,
    next_id: u64,
    exit_code: i64,
    fail_commit: bool,
    fail_clean_remove: bool,
    fail_force_remove: bool,
}

/// Runtime double that keeps images and containers in memory and records
/// every call it receives
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
    hang_on_start: AtomicBool,
    started: Notify,
    hang_on_pull: AtomicBool,
    pulling: Notify,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a local image reachable by `reference`
    pub fn with_image(self, reference: &str, config: ImageConfig) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            let id = format!("base-{}", reference.replace([':', '/'], "-"));
            state.images.insert(
                id.clone(),
                ImageDetails {
                    id: id.clone(),
                    parent_id: String::new(),
                    comment: String::new(),
                    config,
                },
            );
            state.refs.insert(reference.to_string(), id);
        }
        self
    }

    /// Seed an image that only becomes local after a pull
    pub fn with_remote(self, reference: &str, config: ImageConfig) -> Self {
        self.state
            .lock()
            .unwrap()
            .remote
            .insert(reference.to_string(), config);
        self
    }

    /// Seed a file returned by `copy_from_container`
    pub fn with_file(self, path: &str, content: &[u8]) -> Self {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), content.to_vec());
        self
    }

    pub fn set_exit_code(&self, code: i64) {
        self.state.lock().unwrap().exit_code = code;
    }

    pub fn fail_commit(&self) {
        self.state.lock().unwrap().fail_commit = true;
    }

    pub fn fail_clean_remove(&self) {
        self.state.lock().unwrap().fail_clean_remove = true;
    }

    pub fn fail_force_remove(&self) {
        self.state.lock().unwrap().fail_force_remove = true;
    }

    /// Make `start_attached` block forever once it has signalled `started`
    pub fn hang_on_start(&self) {
        self.hang_on_start.store(true, Ordering::SeqCst);
    }

    /// Resolves once a container has been started
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    /// Make `pull_image` block forever once it has signalled `pulling`
    pub fn hang_on_pull(&self) {
        self.hang_on_pull.store(true, Ordering::SeqCst);
    }

    /// Resolves once a pull has begun
    pub async fn wait_pulling(&self) {
        self.pulling.notified().await;
    }

    /// All recorded calls, e.g. `create <image>` or `rm <id> force`
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of recorded calls whose operation is `op`
    pub fn count(&self, op: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(op))
            .count()
    }

    /// Containers created but not yet removed
    pub fn live_containers(&self) -> Vec<String> {
        self.state.lock().unwrap().containers.keys().cloned().collect()
    }

    /// Specs passed to `create_container`, in order
    pub fn created(&self) -> Vec<ContainerSpec> {
        self.state.lock().unwrap().created.clone()
    }

    /// Configs and comments passed to `commit_container`, in order
    pub fn commits(&self) -> Vec<(ImageConfig, String)> {
        self.state.lock().unwrap().commits.clone()
    }

    /// Archives passed to `copy_to_container`, in order
    pub fn copied(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().copied.clone()
    }

    /// Id a reference resolves to
    pub fn resolve(&self, reference: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        Self::resolve_in(&state, reference)
    }

    fn resolve_in(state: &FakeState, reference: &str) -> Option<String> {
        if state.images.contains_key(reference) {
            return Some(reference.to_string());
        }
        state.refs.get(reference).cloned()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn not_found(operation: &str, target: &str) -> BoxerError {
        BoxerError::runtime(operation, target, "no such object")
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> BoxerResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("create {}", spec.image));
        let image = Self::resolve_in(&state, &spec.image)
            .ok_or_else(|| Self::not_found("create", &spec.image))?;

        state.next_id += 1;
        let id = format!("ctr-{}", state.next_id);
        state.containers.insert(id.clone(), image);
        state.created.push(spec.clone());
        Ok(id)
    }

    async fn start_attached(
        &self,
        container_id: &str,
        on_output: OutputSink<'_>,
    ) -> BoxerResult<()> {
        self.record(format!("start {}", container_id));
        self.started.notify_one();
        if self.hang_on_start.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        on_output(format!("started {}", container_id));
        Ok(())
    }

    async fn wait_container(&self, container_id: &str) -> BoxerResult<i64> {
        self.record(format!("wait {}", container_id));
        Ok(self.state.lock().unwrap().exit_code)
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> BoxerResult<()> {
        let mut state = self.state.lock().unwrap();
        let mode = if force { "force" } else { "clean" };
        state.calls.push(format!("rm {} {}", container_id, mode));

        if (force && state.fail_force_remove) || (!force && state.fail_clean_remove) {
            return Err(BoxerError::runtime("rm", container_id, "device busy"));
        }
        state.containers.remove(container_id);
        Ok(())
    }

    async fn commit_container(
        &self,
        container_id: &str,
        config: &ImageConfig,
        comment: &str,
    ) -> BoxerResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("commit {}", container_id));
        if state.fail_commit {
            return Err(BoxerError::runtime("commit", container_id, "disk full"));
        }
        let parent = state
            .containers
            .get(container_id)
            .cloned()
            .ok_or_else(|| Self::not_found("commit", container_id))?;

        state.next_id += 1;
        let id = format!("img-{}", state.next_id);
        state.images.insert(
            id.clone(),
            ImageDetails {
                id: id.clone(),
                parent_id: parent,
                comment: comment.to_string(),
                config: config.clone(),
            },
        );
        state.commits.push((config.clone(), comment.to_string()));
        Ok(id)
    }

    async fn list_images(&self) -> BoxerResult<Vec<ImageSummary>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("images".to_string());
        // Reverse order so callers cannot rely on listing order
        Ok(state
            .images
            .values()
            .rev()
            .map(|i| ImageSummary {
                id: i.id.clone(),
                parent_id: i.parent_id.clone(),
            })
            .collect())
    }

    async fn inspect_image(&self, image: &str) -> BoxerResult<ImageDetails> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("inspect {}", image));
        let id = Self::resolve_in(&state, image).ok_or_else(|| Self::not_found("inspect", image))?;
        state
            .images
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found("inspect", image))
    }

    async fn image_exists(&self, image: &str) -> BoxerResult<bool> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("exists {}", image));
        Ok(Self::resolve_in(&state, image).is_some())
    }

    async fn pull_image(&self, image: &str, on_progress: OutputSink<'_>) -> BoxerResult<()> {
        self.record(format!("pull {}", image));
        self.pulling.notify_one();
        if self.hang_on_pull.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        let config = {
            let mut state = self.state.lock().unwrap();
            state
                .remote
                .remove(image)
                .ok_or_else(|| Self::not_found("pull", image))?
        };
        on_progress(format!("Pulling {}", image));

        let id = format!("base-{}", image.replace([':', '/'], "-"));
        let mut state = self.state.lock().unwrap();
        state.images.insert(
            id.clone(),
            ImageDetails {
                id: id.clone(),
                parent_id: String::new(),
                comment: String::new(),
                config,
            },
        );
        state.refs.insert(image.to_string(), id);
        Ok(())
    }

    async fn tag_image(&self, image: &str, tag: &str) -> BoxerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("tag {} {}", image, tag));
        let id = Self::resolve_in(&state, image).ok_or_else(|| Self::not_found("tag", image))?;
        state.refs.insert(tag.to_string(), id);
        Ok(())
    }

    async fn copy_from_container(&self, container_id: &str, path: &str) -> BoxerResult<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("cp-from {} {}", container_id, path));
        let content = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found("cp", path))?;

        let name = path.rsplit('/').next().unwrap_or(path);
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        let mut ar = tar::Builder::new(Vec::new());
        ar.append_data(&mut header, name, content.as_slice())
            .map_err(|e| BoxerError::io("fake archive", e))?;
        ar.into_inner().map_err(|e| BoxerError::io("fake archive", e))
    }

    async fn copy_to_container(
        &self,
        container_id: &str,
        archive: &[u8],
        dest: &str,
    ) -> BoxerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("cp-to {} {}", container_id, dest));
        state.copied.push(archive.to_vec());
        Ok(())
    }

    fn runtime_name(&self) -> &'static str {
        "fake"
    }
}
