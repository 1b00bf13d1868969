//! Configuration schema definitions for phaseline.
//!
//! This module contains all the struct definitions that map to
//! the YAML (or JSON) pipeline file format.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::runner::{FailurePolicy, RetryPolicy};
use crate::steps::Metrics;

/// Lowest accepted `thread_count`.
pub const MIN_THREAD_COUNT: usize = 1;

/// Highest accepted `thread_count`.
pub const MAX_THREAD_COUNT: usize = 16;

/// Root configuration structure for phaseline.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pipeline name (for display purposes)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Run-wide settings
    pub settings: Settings,

    /// Phase definitions, in declaration order
    pub phases: Vec<PhaseConfig>,
}

impl PipelineConfig {
    /// Look up a phase by id.
    pub fn phase(&self, id: &str) -> Option<&PhaseConfig> {
        self.phases.iter().find(|p| p.id == id)
    }
}

/// Settings that apply to the whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Worker pool size
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Retry parameters applied to every step
    pub retry: RetryConfig,

    /// Default per-attempt timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_timeout_secs: Option<u64>,

    /// Seconds in-flight steps get to finish after an interrupt
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: u64,

    /// Halt or continue after a failed phase
    pub failure_policy: FailurePolicy,

    /// Phases to skip
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skip_phases: Vec<String>,

    /// Probe steps instead of executing them
    #[serde(skip_serializing_if = "is_false")]
    pub dry_run: bool,

    /// Log file path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,

    /// Directory for JSON execution reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_dir: Option<PathBuf>,

    /// Environment variables for every command
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            retry: RetryConfig::default(),
            step_timeout_secs: None,
            grace_period_secs: default_grace_period_secs(),
            failure_policy: FailurePolicy::default(),
            skip_phases: Vec::new(),
            dry_run: false,
            log_path: None,
            report_dir: None,
            env: HashMap::new(),
        }
    }
}

impl Settings {
    /// Default per-attempt timeout.
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_secs.map(Duration::from_secs)
    }

    /// Cancellation grace period.
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

/// Retry parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,

    /// Delay after the first failure, in milliseconds
    pub base_delay_ms: u64,

    /// Upper bound on the backoff delay, in milliseconds
    pub max_delay_ms: u64,

    /// Add random jitter to each delay
    pub jitter: bool,

    /// Retry attempts that timed out
    pub retry_timeouts: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: true,
            retry_timeouts: true,
        }
    }
}

impl RetryConfig {
    /// Convert into the runner's retry policy.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.base_delay_ms),
            Duration::from_millis(self.max_delay_ms),
        )
        .with_jitter(self.jitter)
        .with_retry_timeouts(self.retry_timeouts)
    }
}

/// A phase definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
    /// Unique phase id
    pub id: String,

    /// Display name (defaults to the id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Phases that must finish first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    /// Cap on concurrently running steps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<usize>,

    /// Steps, in declaration order
    pub steps: Vec<StepConfig>,
}

/// A step definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Step id, unique within the phase
    pub id: String,

    /// Display name (defaults to the id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Shell command to run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    /// Working directory (relative to the config file)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workdir: Option<PathBuf>,

    /// Extra environment variables
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub env: HashMap<String, String>,

    /// Whether transient failures are retried
    pub retryable: bool,

    /// Safe to re-run (informational)
    #[serde(skip_serializing_if = "is_false")]
    pub idempotent: bool,

    /// Per-attempt timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Skip this step
    #[serde(skip_serializing_if = "is_false")]
    pub skip: bool,

    /// Exit codes that count as transient failures
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transient_exit_codes: Vec<i32>,

    /// Parameters exposed to the command
    #[serde(skip_serializing_if = "Metrics::is_empty")]
    pub params: Metrics,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: None,
            command: None,
            workdir: None,
            env: HashMap::new(),
            retryable: true,
            idempotent: false,
            timeout_secs: None,
            skip: false,
            transient_exit_codes: Vec::new(),
            params: Metrics::new(),
        }
    }
}

fn default_thread_count() -> usize {
    crate::runner::DEFAULT_THREAD_COUNT
}

fn default_grace_period_secs() -> u64 {
    crate::runner::DEFAULT_GRACE_PERIOD.as_secs()
}

fn is_false(b: &bool) -> bool {
    !*b
}
