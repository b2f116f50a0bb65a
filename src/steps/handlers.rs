//! Built-in step handlers

use super::{Arg, Step, StepFuture, StepRegistry};
use crate::builder::{Builder, CommitRequest, CopyHook, RunHook, ScopeGuard, ScopedField};
use crate::cache::{pack_path, CacheKey};
use crate::error::{BoxerError, BoxerResult};
use tracing::debug;

fn invalid(step: &Step, reason: impl Into<String>) -> BoxerError {
    BoxerError::InvalidArgument {
        step: step.op.clone(),
        reason: reason.into(),
    }
}

fn reject_block(step: &Step) -> BoxerResult<()> {
    if step.block.is_some() {
        return Err(invalid(step, "does not take a block"));
    }
    Ok(())
}

/// Every argument as a string; list arguments contribute their elements
fn string_args(step: &Step) -> BoxerResult<Vec<String>> {
    let mut out = Vec::new();
    for arg in &step.args {
        match arg {
            Arg::String(s) => out.push(s.clone()),
            Arg::List(items) => out.extend(items.iter().cloned()),
            Arg::Map(_) => return Err(invalid(step, "expected string arguments")),
        }
    }
    Ok(out)
}

/// Exactly `count` plain string arguments
fn exact_strings(step: &Step, count: usize) -> BoxerResult<Vec<String>> {
    let strings: Vec<String> = step
        .args
        .iter()
        .filter_map(|arg| match arg {
            Arg::String(s) => Some(s.clone()),
            _ => None,
        })
        .collect();

    if strings.len() != count || step.args.len() != count {
        return Err(invalid(
            step,
            format!("expected {} string argument(s), got {}", count, step.args.len()),
        ));
    }
    Ok(strings)
}

fn require_base(builder: &Builder, step: &Step) -> BoxerResult<()> {
    if builder.state().base_image().is_none() {
        return Err(BoxerError::Usage(format!(
            "'{}' requires a base image: 'from' must be the first step",
            step.op
        )));
    }
    Ok(())
}

fn step_key(step: &Step) -> BoxerResult<CacheKey> {
    Ok(CacheKey::for_step(&step.op, &step.key_args()?))
}

pub(super) fn from<'a>(
    _registry: &'a StepRegistry,
    builder: &'a mut Builder,
    step: &'a Step,
) -> StepFuture<'a> {
    Box::pin(async move {
        reject_block(step)?;
        let image = exact_strings(step, 1)?.remove(0);
        builder.from_image(&image).await?;
        Ok(())
    })
}

pub(super) fn run<'a>(
    _registry: &'a StepRegistry,
    builder: &'a mut Builder,
    step: &'a Step,
) -> StepFuture<'a> {
    Box::pin(async move {
        reject_block(step)?;
        let args = string_args(step)?;
        require_base(builder, step)?;
        if args.is_empty() {
            return Err(invalid(step, "expected a command"));
        }

        let mut cmd = builder.settings().shell.clone();
        cmd.push(args.join(" "));
        debug!(cmd = ?cmd, "Run command");

        builder
            .execute(
                CommitRequest::new(step_key(step)?)
                    .with_cmd(cmd)
                    .with_hook(&RunHook),
            )
            .await?;
        Ok(())
    })
}

pub(super) fn env<'a>(
    _registry: &'a StepRegistry,
    builder: &'a mut Builder,
    step: &'a Step,
) -> StepFuture<'a> {
    Box::pin(async move {
        reject_block(step)?;
        if step.args.is_empty() {
            return Err(invalid(step, "expected a map of variables"));
        }

        let mut pairs = Vec::new();
        for arg in &step.args {
            match arg {
                Arg::Map(map) => pairs.extend(map.iter()),
                _ => return Err(invalid(step, "expected a map of variables")),
            }
        }
        for (key, value) in pairs {
            builder.state_mut().config.set_env(key, value);
        }

        builder.execute(CommitRequest::new(step_key(step)?)).await?;
        Ok(())
    })
}

pub(super) fn cmd<'a>(
    _registry: &'a StepRegistry,
    builder: &'a mut Builder,
    step: &'a Step,
) -> StepFuture<'a> {
    Box::pin(async move {
        reject_block(step)?;
        builder.state_mut().config.cmd = string_args(step)?;
        builder.execute(CommitRequest::new(step_key(step)?)).await?;
        Ok(())
    })
}

pub(super) fn entrypoint<'a>(
    _registry: &'a StepRegistry,
    builder: &'a mut Builder,
    step: &'a Step,
) -> StepFuture<'a> {
    Box::pin(async move {
        reject_block(step)?;
        builder.state_mut().config.entrypoint = string_args(step)?;
        builder.execute(CommitRequest::new(step_key(step)?)).await?;
        Ok(())
    })
}

/// Run a step's block with `field` overridden, restoring it afterwards
async fn scoped(
    registry: &StepRegistry,
    builder: &mut Builder,
    step: &Step,
    field: ScopedField,
) -> BoxerResult<()> {
    let value = exact_strings(step, 1)?.remove(0);
    let block = step
        .block
        .as_deref()
        .ok_or_else(|| invalid(step, "requires a block of nested steps"))?;

    let mut guard = ScopeGuard::enter(builder, field, value);
    registry.run_all(&mut guard, block).await
}

pub(super) fn user<'a>(
    registry: &'a StepRegistry,
    builder: &'a mut Builder,
    step: &'a Step,
) -> StepFuture<'a> {
    Box::pin(scoped(registry, builder, step, ScopedField::User))
}

pub(super) fn workdir<'a>(
    registry: &'a StepRegistry,
    builder: &'a mut Builder,
    step: &'a Step,
) -> StepFuture<'a> {
    Box::pin(scoped(registry, builder, step, ScopedField::WorkingDir))
}

/// Container path a copy destination refers to
fn copy_target(builder: &Builder, dest: &str) -> String {
    if dest.starts_with('/') {
        return dest.to_string();
    }
    let workdir = builder.state().effective_config().working_dir;
    let base = if workdir.is_empty() { "/" } else { workdir.as_str() };
    format!("{}/{}", base.trim_end_matches('/'), dest)
}

pub(super) fn copy<'a>(
    _registry: &'a StepRegistry,
    builder: &'a mut Builder,
    step: &'a Step,
) -> StepFuture<'a> {
    Box::pin(async move {
        reject_block(step)?;
        let args = exact_strings(step, 2)?;
        require_base(builder, step)?;

        let source = builder.settings().context_dir.join(&args[0]);
        let target = copy_target(builder, &args[1]);
        debug!(source = %source.display(), target = %target, "Packaging copy source");

        let packing = tokio::task::spawn_blocking(move || pack_path(&source, &target));
        let packed = builder
            .interruptible("copy packaging", async move {
                packing
                    .await
                    .map_err(|e| BoxerError::io("packaging copy source", std::io::Error::other(e)))
                    .and_then(|packed| packed)
            })
            .await?;

        debug!(entries = packed.entries, digest = %packed.digest, "Packaged copy source");

        let key = CacheKey::for_copy(&packed.digest);
        let hook = CopyHook::new(packed.data, key.clone());
        builder
            .execute(CommitRequest::new(key).with_hook(&hook))
            .await?;
        Ok(())
    })
}
