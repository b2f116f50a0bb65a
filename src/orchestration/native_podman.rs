//! Podman container runtime
//!
//! Implements the ContainerRuntime trait by driving the Podman CLI (or a
//! Docker-compatible CLI named in the config) with `tokio::process`.

use crate::error::{BoxerError, BoxerResult};
use crate::orchestration::podman::{
    normalize_id, short_id, ContainerSpec, ImageConfig, ImageDetails, ImageSummary, RawImage,
};
use crate::orchestration::runtime::{ContainerRuntime, OutputSink};
use crate::orchestration::{error_output_tail, stream_child_output};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Exit status Podman uses for its own failures (as opposed to the container's)
const PODMAN_ERROR_STATUS: i32 = 125;

/// Container runtime driving the Podman CLI
pub struct PodmanRuntime {
    program: String,
}

impl PodmanRuntime {
    /// Create a runtime driving the given CLI program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Podman needs the docker image format to keep commit comments
    fn is_podman(&self) -> bool {
        self.program.ends_with("podman")
    }

    /// Runtime invocation whose process is killed if its future is dropped
    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(args).kill_on_drop(true);
        command
    }

    fn command_line(&self, args: &[&str]) -> String {
        format!("{} {}", self.program, args.join(" "))
    }

    /// Execute a runtime command and return the output
    async fn exec(&self, args: &[&str]) -> BoxerResult<std::process::Output> {
        debug!("Executing: {} {:?}", self.program, args);

        self.command(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| BoxerError::command_failed(self.command_line(args), e))
    }

    /// Execute a runtime command and return trimmed stdout, failing on non-zero status
    async fn exec_ok(&self, operation: &str, target: &str, args: &[&str]) -> BoxerResult<String> {
        let output = self.exec(args).await?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BoxerError::runtime(operation, target, stderr.trim()))
        }
    }

    /// Execute a runtime command feeding `input` on stdin
    async fn exec_with_input(&self, args: &[&str], input: &[u8]) -> BoxerResult<std::process::Output> {
        debug!("Executing with {} bytes of input: {} {:?}", input.len(), self.program, args);

        let mut child = self
            .command(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BoxerError::command_failed(self.command_line(args), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input)
                .await
                .map_err(|e| BoxerError::io(format!("writing archive to {}", self.command_line(args)), e))?;
            // Dropping stdin closes the pipe so the runtime sees EOF
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| BoxerError::command_failed(self.command_line(args), e))
    }

    /// Inspect one or more images in a single runtime call
    async fn inspect_many(&self, images: &[String]) -> BoxerResult<Vec<ImageDetails>> {
        if images.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = vec!["image", "inspect"];
        args.extend(images.iter().map(String::as_str));
        let target = images.join(" ");
        let stdout = self.exec_ok("inspect", &target, &args).await?;

        let raw: Vec<RawImage> =
            serde_json::from_str(&stdout).map_err(|e| BoxerError::RuntimeOutput {
                operation: "image inspect".to_string(),
                reason: e.to_string(),
            })?;

        Ok(raw.into_iter().map(ImageDetails::from).collect())
    }
}

impl Default for PodmanRuntime {
    fn default() -> Self {
        Self::new("podman")
    }
}

/// Build the argument list for `create`
pub(crate) fn create_args(spec: &ContainerSpec) -> Vec<String> {
    let mut args = vec!["create".to_string(), "--name".to_string(), spec.name.clone()];

    if spec.tty {
        args.push("--tty".to_string());
    }

    if !spec.config.working_dir.is_empty() {
        args.push("--workdir".to_string());
        args.push(spec.config.working_dir.clone());
    }

    if !spec.config.user.is_empty() {
        args.push("--user".to_string());
        args.push(spec.config.user.clone());
    }

    for pair in spec.config.env_pairs() {
        args.push("--env".to_string());
        args.push(pair);
    }

    if !spec.config.entrypoint.is_empty() {
        args.push("--entrypoint".to_string());
        args.push(json_list(&spec.config.entrypoint));
    }

    args.push(spec.image.clone());
    args.extend(spec.config.cmd.iter().cloned());
    args
}

/// Build the argument list for `commit`, stamping the canonical config back
/// onto the image so transient container settings never leak into it
pub(crate) fn commit_args(
    container_id: &str,
    config: &ImageConfig,
    comment: &str,
    docker_format: bool,
) -> Vec<String> {
    let mut args = vec!["commit".to_string()];

    if docker_format {
        args.push("--format".to_string());
        args.push("docker".to_string());
    }

    args.push("--message".to_string());
    args.push(comment.to_string());

    let workdir = if config.working_dir.is_empty() {
        "/"
    } else {
        config.working_dir.as_str()
    };
    let user = if config.user.is_empty() {
        "root"
    } else {
        config.user.as_str()
    };

    for change in [
        format!("WORKDIR {}", workdir),
        format!("USER {}", user),
        format!("CMD {}", json_list(&config.cmd)),
        format!("ENTRYPOINT {}", json_list(&config.entrypoint)),
    ] {
        args.push("--change".to_string());
        args.push(change);
    }

    args.push(container_id.to_string());
    args
}

/// Image ids from `images --quiet` output, each listed once. Multiple tags
/// on one image repeat its id, not necessarily on adjacent lines.
fn unique_image_ids(stdout: &str) -> Vec<String> {
    let mut ids: Vec<String> = stdout
        .lines()
        .map(normalize_id)
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}

fn json_list(items: &[String]) -> String {
    serde_json::to_string(items).unwrap_or_else(|_| "[]".to_string())
}

#[async_trait]
impl ContainerRuntime for PodmanRuntime {
    async fn create_container(&self, spec: &ContainerSpec) -> BoxerResult<String> {
        let args = create_args(spec);
        debug!("Creating container: {} {:?}", self.program, args);

        let args_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.exec_ok("create", &spec.image, &args_refs).await?;
        let id = stdout.lines().last().map(normalize_id).unwrap_or_default();

        debug!("Container created: {}", short_id(&id));
        Ok(id)
    }

    async fn start_attached(
        &self,
        container_id: &str,
        on_output: OutputSink<'_>,
    ) -> BoxerResult<()> {
        let args = ["start", "--attach", container_id];
        debug!("Starting container attached: {} {:?}", self.program, args);

        let mut child = self
            .command(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BoxerError::command_failed(self.command_line(&args), e))?;

        let lines = stream_child_output(&mut child, on_output).await;
        let status = child
            .wait()
            .await
            .map_err(|e| BoxerError::command_failed(self.command_line(&args), e))?;

        // The container's own exit code is reported by wait_container
        if status.code() == Some(PODMAN_ERROR_STATUS) {
            return Err(BoxerError::runtime(
                "start",
                container_id,
                error_output_tail(&lines.join("\n"), ""),
            ));
        }

        Ok(())
    }

    async fn wait_container(&self, container_id: &str) -> BoxerResult<i64> {
        let stdout = self
            .exec_ok("wait", container_id, &["wait", container_id])
            .await?;

        stdout
            .lines()
            .last()
            .unwrap_or_default()
            .trim()
            .parse::<i64>()
            .map_err(|e| BoxerError::RuntimeOutput {
                operation: "wait".to_string(),
                reason: format!("{}: {:?}", e, stdout),
            })
    }

    async fn remove_container(&self, container_id: &str, force: bool) -> BoxerResult<()> {
        debug!("Removing container {} (force: {})", container_id, force);

        let output = if force {
            self.exec(&["rm", "--force", container_id]).await?
        } else {
            self.exec(&["rm", container_id]).await?
        };

        if output.status.success() {
            Ok(())
        } else {
            // Ignore error if container doesn't exist
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.to_lowercase().contains("no such container") {
                Ok(())
            } else {
                Err(BoxerError::runtime("remove", container_id, stderr.trim()))
            }
        }
    }

    async fn commit_container(
        &self,
        container_id: &str,
        config: &ImageConfig,
        comment: &str,
    ) -> BoxerResult<String> {
        let args = commit_args(container_id, config, comment, self.is_podman());
        debug!("Committing container: {} {:?}", self.program, args);

        let args_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = self.exec_ok("commit", container_id, &args_refs).await?;

        // Podman may print layer progress before the id
        let id = stdout.lines().last().map(normalize_id).unwrap_or_default();
        if id.is_empty() {
            return Err(BoxerError::RuntimeOutput {
                operation: "commit".to_string(),
                reason: "no image id in output".to_string(),
            });
        }

        Ok(id)
    }

    async fn list_images(&self) -> BoxerResult<Vec<ImageSummary>> {
        let stdout = self
            .exec_ok(
                "list images",
                "local store",
                &["images", "--all", "--quiet", "--no-trunc"],
            )
            .await?;

        let ids = unique_image_ids(&stdout);

        Ok(self
            .inspect_many(&ids)
            .await?
            .into_iter()
            .map(|image| ImageSummary {
                id: image.id,
                parent_id: image.parent_id,
            })
            .collect())
    }

    async fn inspect_image(&self, image: &str) -> BoxerResult<ImageDetails> {
        self.inspect_many(&[image.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| BoxerError::runtime("inspect", image, "no such image"))
    }

    async fn image_exists(&self, image: &str) -> BoxerResult<bool> {
        let output = self
            .exec(&["image", "inspect", "--format", "{{.Id}}", image])
            .await?;
        Ok(output.status.success())
    }

    async fn pull_image(&self, image: &str, on_progress: OutputSink<'_>) -> BoxerResult<()> {
        info!("Pulling image: {}", image);

        let args = ["pull", image];
        let mut child = self
            .command(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BoxerError::command_failed(self.command_line(&args), e))?;

        let lines = stream_child_output(&mut child, on_progress).await;
        let status = child
            .wait()
            .await
            .map_err(|e| BoxerError::command_failed(self.command_line(&args), e))?;

        if status.success() {
            Ok(())
        } else {
            Err(BoxerError::runtime(
                "pull",
                image,
                error_output_tail(&lines.join("\n"), ""),
            ))
        }
    }

    async fn tag_image(&self, image: &str, tag: &str) -> BoxerResult<()> {
        self.exec_ok("tag", image, &["tag", image, tag]).await?;
        Ok(())
    }

    async fn copy_from_container(&self, container_id: &str, path: &str) -> BoxerResult<Vec<u8>> {
        let source = format!("{}:{}", container_id, path);
        let output = self.exec(&["cp", &source, "-"]).await?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BoxerError::runtime("copy from", source, stderr.trim()))
        }
    }

    async fn copy_to_container(
        &self,
        container_id: &str,
        archive: &[u8],
        dest: &str,
    ) -> BoxerResult<()> {
        let target = format!("{}:{}", container_id, dest);
        let output = self.exec_with_input(&["cp", "-", &target], archive).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(BoxerError::runtime("copy to", target, stderr.trim()))
        }
    }

    fn runtime_name(&self) -> &'static str {
        if self.is_podman() {
            "Podman"
        } else {
            "Docker-compatible CLI"
        }
    }
}
