//! Error types for Boxer
//!
//! All modules use `BoxerResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Boxer operations
pub type BoxerResult<T> = Result<T, BoxerError>;

/// All errors that can occur while building an image
#[derive(Error, Debug)]
pub enum BoxerError {
    // Runtime communication errors
    #[error("Runtime command failed to launch: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Runtime {operation} failed for {target}: {reason}")]
    Runtime {
        operation: String,
        target: String,
        reason: String,
    },

    #[error("Unexpected runtime output from {operation}: {reason}")]
    RuntimeOutput { operation: String, reason: String },

    // Step execution errors
    #[error("Command exited with status {code} for container {container}")]
    NonZeroExit { container: String, code: i64 },

    #[error("Build interrupted; intermediate container {container} was removed")]
    Interrupted { container: String },

    #[error("Build interrupted during {operation}")]
    Cancelled { operation: String },

    // Usage errors
    #[error("{0}")]
    Usage(String),

    #[error("Undefined step '{0}'")]
    UnknownStep(String),

    #[error("Invalid arguments for '{step}': {reason}")]
    InvalidArgument { step: String, reason: String },

    // Archive / hash errors
    #[error("Could not package {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not find {path} in container")]
    ContentNotFound { path: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Build plan errors
    #[error("Build plan not found: {0}")]
    PlanNotFound(PathBuf),

    #[error("Invalid build plan {path}: {reason}")]
    PlanInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl BoxerError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a runtime error for an operation against a container or image
    pub fn runtime(
        operation: impl Into<String>,
        target: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Runtime {
            operation: operation.into(),
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Create an archive error for a host path
    pub fn archive(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Archive {
            path: path.into(),
            source,
        }
    }

    /// True for errors caused by how the build was written rather than by
    /// the runtime or the host
    pub fn is_usage(&self) -> bool {
        matches!(
            self,
            Self::Usage(_) | Self::UnknownStep(_) | Self::InvalidArgument { .. }
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CommandFailed { .. } => {
                Some("Install podman or set runtime.program in the config file")
            }
            Self::PlanNotFound(_) => Some("Pass the build plan path: boxer build <PLAN>"),
            Self::UnknownStep(_) => {
                Some("Check the step name and that it is not listed in build.omit")
            }
            Self::Interrupted { .. } | Self::Cancelled { .. } => {
                Some("Re-run the build; completed steps are cached")
            }
            _ => None,
        }
    }
}
