//! Turning a validated configuration into runnable definitions.

use std::path::Path;
use std::time::Duration;

use crate::config::schema::{PhaseConfig, PipelineConfig, StepConfig};
use crate::config::validator::validate;
use crate::error::Result;
use crate::runner::{Phase, Pipeline, RunOptions};
use crate::shell::CommandOperation;
use crate::steps::Step;

/// Validate `config` and build the pipeline it describes.
///
/// Relative step working directories are resolved against `base_dir` (the
/// directory holding the config file), which is also the default.
pub fn build_pipeline(config: &PipelineConfig, base_dir: &Path) -> Result<Pipeline> {
    validate(config)?;

    let phases = config
        .phases
        .iter()
        .map(|phase| build_phase(config, phase, base_dir))
        .collect();

    let pipeline = Pipeline::new(phases)?;
    Ok(match &config.name {
        Some(name) => pipeline.with_name(name.clone()),
        None => pipeline,
    })
}

fn build_phase(config: &PipelineConfig, phase: &PhaseConfig, base_dir: &Path) -> Phase {
    let mut built = Phase::new(phase.id.clone());
    if let Some(name) = &phase.name {
        built = built.with_name(name.clone());
    }
    for dep in &phase.depends_on {
        built = built.depends_on(dep.clone());
    }
    if let Some(max) = phase.max_parallel {
        built = built.with_max_parallel(max);
    }
    for step in &phase.steps {
        built = built.with_step(build_step(config, step, base_dir));
    }
    built
}

fn build_step(config: &PipelineConfig, step: &StepConfig, base_dir: &Path) -> Step {
    let workdir = match &step.workdir {
        Some(dir) if dir.is_relative() => base_dir.join(dir),
        Some(dir) => dir.clone(),
        None => base_dir.to_path_buf(),
    };

    let mut env = config.settings.env.clone();
    env.extend(step.env.clone());

    let operation = CommandOperation::new(step.command.clone().unwrap_or_default())
        .with_workdir(workdir)
        .with_env(env)
        .with_transient_exit_codes(step.transient_exit_codes.clone());

    let mut built = Step::new(step.id.clone(), operation)
        .retryable(step.retryable)
        .idempotent(step.idempotent)
        .with_params(step.params.clone());
    if let Some(name) = &step.name {
        built = built.with_name(name.clone());
    }
    if let Some(secs) = step.timeout_secs {
        built = built.with_timeout(Duration::from_secs(secs));
    }
    if step.skip {
        built = built.skipped();
    }
    built
}

/// Run options described by the config's settings.
///
/// Command-line overrides are applied on top by the caller.
pub fn run_options(config: &PipelineConfig) -> RunOptions {
    let settings = &config.settings;
    let mut options = RunOptions::default()
        .with_threads(settings.thread_count)
        .with_retry(settings.retry.to_policy())
        .with_failure_policy(settings.failure_policy)
        .with_grace_period(settings.grace_period())
        .dry_run(settings.dry_run);

    if let Some(timeout) = settings.step_timeout() {
        options = options.with_step_timeout(timeout);
    }
    for phase in &settings.skip_phases {
        options = options.skip_phase(phase.clone());
    }
    options
}
