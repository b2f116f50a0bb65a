//! Orchestration module for the container runtime
//!
//! Provides the narrow set of runtime operations the build engine needs:
//! - ephemeral container lifecycle (create, start, wait, remove)
//! - image commit with a comment slot used for cache keys
//! - image listing/inspection for cache lookup
//! - archive transfer in and out of containers

mod factory;
mod native_podman;
pub mod podman;
mod runtime;

pub use factory::create_runtime;
pub use native_podman::PodmanRuntime;
pub use podman::{normalize_id, short_id, ContainerSpec, ImageConfig, ImageDetails, ImageSummary};
pub use runtime::{ContainerRuntime, OutputSink};

use tokio::io::{AsyncBufReadExt, BufReader};

/// Max number of output lines to include in runtime error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Extract the useful tail of runtime output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn error_output_tail(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let total = lines.len();
    let tail: Vec<&str> = if total > ERROR_TAIL_LINES {
        lines[total - ERROR_TAIL_LINES..].to_vec()
    } else {
        lines
    };
    tail.join("\n")
}

/// Stream stdout+stderr from a child process, calling `on_output` for each line.
///
/// Returns all collected output lines for error reporting. A stream that was
/// not piped is treated as already finished.
pub(crate) async fn stream_child_output(
    child: &mut tokio::process::Child,
    on_output: OutputSink<'_>,
) -> Vec<String> {
    let mut stderr_reader = child.stderr.take().map(|s| BufReader::new(s).lines());
    let mut stdout_reader = child.stdout.take().map(|s| BufReader::new(s).lines());

    let mut all_output = Vec::new();
    let mut stderr_done = stderr_reader.is_none();
    let mut stdout_done = stdout_reader.is_none();

    while !stderr_done || !stdout_done {
        tokio::select! {
            line = next_line(&mut stderr_reader), if !stderr_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stderr_done = true,
                }
            }
            line = next_line(&mut stdout_reader), if !stdout_done => {
                match line {
                    Some(line) => {
                        on_output(line.clone());
                        all_output.push(line);
                    }
                    None => stdout_done = true,
                }
            }
        }
    }

    all_output
}

async fn next_line<R>(reader: &mut Option<tokio::io::Lines<BufReader<R>>>) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match reader {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}
