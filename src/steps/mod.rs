//! Step dispatcher
//!
//! A build is a sequence of [`Step`]s. The [`StepRegistry`] maps each step
//! name to a handler that mutates the build state and drives the builder.
//! Scoped steps (`user`, `workdir`) carry a nested block that is dispatched
//! recursively through the same registry.

mod handlers;
pub mod plan;

pub use plan::BuildPlan;

use crate::builder::Builder;
use crate::error::{BoxerError, BoxerResult};
use crate::ui;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use tracing::{info, warn};

/// One positional step argument
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    String(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Arg {
    /// Text form used in step banners and logs
    pub fn render(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::List(items) => format!("[{}]", items.join(", ")),
            Self::Map(map) => {
                let pairs: Vec<String> = map.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
                format!("{{{}}}", pairs.join(", "))
            }
        }
    }
}

impl From<&str> for Arg {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// A named build step with its arguments and optional nested block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub op: String,
    #[serde(default)]
    pub args: Vec<Arg>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block: Option<Vec<Step>>,
}

impl Step {
    pub fn new(op: &str, args: Vec<Arg>) -> Self {
        Self {
            op: op.to_string(),
            args,
            block: None,
        }
    }

    pub fn with_block(mut self, block: Vec<Step>) -> Self {
        self.block = Some(block);
        self
    }

    /// Raw argument text: every argument rendered and joined by spaces
    pub fn raw_args(&self) -> String {
        self.args
            .iter()
            .map(Arg::render)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Arguments as stored in cache keys. The JSON form keeps argument
    /// boundaries and kinds, which the rendered text loses.
    pub fn key_args(&self) -> BoxerResult<String> {
        Ok(serde_json::to_string(&self.args)?)
    }
}

/// Future returned by a step handler
pub type StepFuture<'a> = Pin<Box<dyn Future<Output = BoxerResult<()>> + Send + 'a>>;

/// A step implementation. The registry is passed along so scoped steps can
/// dispatch their nested block.
pub type StepHandler = for<'a> fn(&'a StepRegistry, &'a mut Builder, &'a Step) -> StepFuture<'a>;

/// Table of available steps
#[derive(Clone)]
pub struct StepRegistry {
    handlers: BTreeMap<String, StepHandler>,
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StepRegistry {
    /// Registry with every built-in step
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register("from", handlers::from);
        registry.register("run", handlers::run);
        registry.register("env", handlers::env);
        registry.register("cmd", handlers::cmd);
        registry.register("entrypoint", handlers::entrypoint);
        registry.register("user", handlers::user);
        registry.register("workdir", handlers::workdir);
        registry.register("copy", handlers::copy);
        registry
    }

    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, handler: StepHandler) {
        self.handlers.insert(name.to_string(), handler);
    }

    /// Remove steps by name so plans using them fail as undefined
    pub fn omit<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            let name = name.as_ref();
            if self.handlers.remove(name).is_none() {
                warn!("Cannot omit unknown step '{}'", name);
            }
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Run one step
    pub async fn dispatch(&self, builder: &mut Builder, step: &Step) -> BoxerResult<()> {
        let handler = self
            .handlers
            .get(&step.op)
            .ok_or_else(|| BoxerError::UnknownStep(step.op.clone()))?;

        let raw = step.raw_args();
        info!(step = %step.op, args = %raw, "Dispatching step");
        ui::step(&step.op, &raw);

        handler(self, builder, step).await
    }

    /// Run steps in order, stopping at the first failure
    pub async fn run_all(&self, builder: &mut Builder, steps: &[Step]) -> BoxerResult<()> {
        for step in steps {
            self.dispatch(builder, step).await?;
        }
        Ok(())
    }
}
