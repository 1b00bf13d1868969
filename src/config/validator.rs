//! Configuration validation rules.
//!
//! This module validates configuration for correctness:
//! - Phases and steps must have ids, unique in their scope
//! - Every step must have a command
//! - depends_on and skip_phases must reference existing phases
//! - No circular dependencies allowed
//! - Numeric settings must be in range

use crate::config::schema::{PipelineConfig, MAX_THREAD_COUNT, MIN_THREAD_COUNT};
use crate::error::{PipelineError, Result};
use crate::runner::DependencyGraph;
use std::collections::HashSet;

/// Validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Phase id if error is phase-specific
    pub phase: Option<String>,
    /// Step id if error is step-specific
    pub step: Option<String>,
}

impl ValidationError {
    fn new(rule: &str, message: String) -> Self {
        Self {
            rule: rule.to_string(),
            message,
            phase: None,
            step: None,
        }
    }

    fn in_phase(mut self, phase: &str) -> Self {
        self.phase = Some(phase.to_string());
        self
    }

    fn in_step(mut self, step: &str) -> Self {
        self.step = Some(step.to_string());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.rule, self.message)
    }
}

/// Validate a configuration and return all errors.
///
/// This function collects all validation errors rather than stopping
/// at the first one, allowing users to fix multiple issues at once.
pub fn validate_config(config: &PipelineConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_settings(config));
    errors.extend(validate_phases(config));
    errors.extend(validate_dependencies(config));

    errors
}

/// Validate run-wide settings.
fn validate_settings(config: &PipelineConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let settings = &config.settings;

    if !(MIN_THREAD_COUNT..=MAX_THREAD_COUNT).contains(&settings.thread_count) {
        errors.push(ValidationError::new(
            "thread-count-range",
            format!(
                "thread_count must be between {} and {}, got {}",
                MIN_THREAD_COUNT, MAX_THREAD_COUNT, settings.thread_count
            ),
        ));
    }

    if settings.retry.max_attempts == 0 {
        errors.push(ValidationError::new(
            "retry-attempts",
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }

    if settings.retry.max_delay_ms < settings.retry.base_delay_ms {
        errors.push(ValidationError::new(
            "retry-delay-bounds",
            format!(
                "retry.max_delay_ms ({}) must not be below retry.base_delay_ms ({})",
                settings.retry.max_delay_ms, settings.retry.base_delay_ms
            ),
        ));
    }

    if settings.step_timeout_secs == Some(0) {
        errors.push(ValidationError::new(
            "timeout-zero",
            "settings.step_timeout_secs must be greater than 0".to_string(),
        ));
    }

    for phase in &settings.skip_phases {
        if config.phase(phase).is_none() {
            errors.push(
                ValidationError::new(
                    "unknown-phase",
                    format!("skip_phases names unknown phase '{}'", phase),
                )
                .in_phase(phase),
            );
        }
    }

    errors
}

/// Validate phase and step definitions.
fn validate_phases(config: &PipelineConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut phase_ids = HashSet::new();

    for phase in &config.phases {
        if phase.id.trim().is_empty() {
            errors.push(ValidationError::new(
                "missing-id",
                "Every phase must have an 'id'".to_string(),
            ));
            continue;
        }

        if !phase_ids.insert(phase.id.as_str()) {
            errors.push(
                ValidationError::new(
                    "duplicate-phase",
                    format!("Phase '{}' is declared more than once", phase.id),
                )
                .in_phase(&phase.id),
            );
        }

        if phase.steps.is_empty() {
            errors.push(
                ValidationError::new(
                    "empty-phase",
                    format!("Phase '{}' has no steps", phase.id),
                )
                .in_phase(&phase.id),
            );
        }

        if phase.max_parallel == Some(0) {
            errors.push(
                ValidationError::new(
                    "max-parallel-zero",
                    format!("Phase '{}' max_parallel must be at least 1", phase.id),
                )
                .in_phase(&phase.id),
            );
        }

        let mut step_ids = HashSet::new();
        for step in &phase.steps {
            if step.id.trim().is_empty() {
                errors.push(
                    ValidationError::new(
                        "missing-id",
                        format!("Every step in phase '{}' must have an 'id'", phase.id),
                    )
                    .in_phase(&phase.id),
                );
                continue;
            }

            if !step_ids.insert(step.id.as_str()) {
                errors.push(
                    ValidationError::new(
                        "duplicate-step",
                        format!(
                            "Step '{}' is declared more than once in phase '{}'",
                            step.id, phase.id
                        ),
                    )
                    .in_phase(&phase.id)
                    .in_step(&step.id),
                );
            }

            if step
                .command
                .as_deref()
                .map_or(true, |c| c.trim().is_empty())
            {
                errors.push(
                    ValidationError::new(
                        "missing-command",
                        format!("Step '{}.{}' must have a 'command'", phase.id, step.id),
                    )
                    .in_phase(&phase.id)
                    .in_step(&step.id),
                );
            }

            if step.timeout_secs == Some(0) {
                errors.push(
                    ValidationError::new(
                        "timeout-zero",
                        format!(
                            "Step '{}.{}' timeout_secs must be greater than 0",
                            phase.id, step.id
                        ),
                    )
                    .in_phase(&phase.id)
                    .in_step(&step.id),
                );
            }
        }
    }

    errors
}

/// Validate phase dependencies through the dependency graph.
fn validate_dependencies(config: &PipelineConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let ids: HashSet<&str> = config.phases.iter().map(|p| p.id.as_str()).collect();

    for phase in &config.phases {
        for dep in &phase.depends_on {
            if !ids.contains(dep.as_str()) {
                errors.push(
                    ValidationError::new(
                        "unknown-phase",
                        format!(
                            "Phase '{}' depends on '{}' which does not exist",
                            phase.id, dep
                        ),
                    )
                    .in_phase(&phase.id),
                );
            }
        }
    }

    // Unknown and duplicate ids are reported above; only look for cycles.
    if errors.is_empty() && ids.len() == config.phases.len() {
        let graph = config
            .phases
            .iter()
            .fold(DependencyGraph::builder(), |builder, phase| {
                builder.add_phase(phase.id.clone(), phase.depends_on.clone())
            })
            .build();

        if let Err(PipelineError::CyclicDependency { cycle }) = graph {
            errors.push(ValidationError::new(
                "circular-dependency",
                format!("Circular dependency detected: {}", cycle.join(" -> ")),
            ));
        }
    }

    errors
}

/// Validate a configuration, returning an error if invalid.
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(config: &PipelineConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(PipelineError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
