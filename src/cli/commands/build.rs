//! Build command - run a build plan to completion

use crate::builder::{BuildSettings, Builder};
use crate::cli::args::BuildArgs;
use crate::config::Config;
use crate::error::BoxerResult;
use crate::orchestration::create_runtime;
use crate::steps::{BuildPlan, StepRegistry};
use crate::ui;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Execute the build command
pub async fn execute(args: BuildArgs, config: &Config, cancel: CancellationToken) -> BoxerResult<()> {
    let plan = BuildPlan::load(&args.plan).await?;
    let settings = BuildSettings::resolve(
        config,
        BuildPlan::context_dir(&args.plan),
        args.no_cache,
    );

    let mut registry = StepRegistry::new();
    registry.omit(&config.build.omit);
    registry.omit(&args.omit);
    debug!(steps = ?registry.names(), "Step set");

    let runtime = create_runtime(config)?;
    info!(
        runtime = runtime.runtime_name(),
        plan = %args.plan.display(),
        steps = plan.steps.len(),
        no_cache = settings.no_cache,
        "Starting build"
    );

    let mut builder = Builder::new(runtime, settings).with_cancel(cancel);
    registry.run_all(&mut builder, &plan.steps).await?;

    let image = builder.finish().await?;
    if let Some(tag) = &args.tag {
        builder.tag(tag).await?;
    }

    ui::built(&image);
    Ok(())
}
