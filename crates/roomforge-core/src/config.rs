//! Immutable pipeline configuration: the stage table and the retry policy.
//!
//! Built once at startup and shared behind an `Arc`; nothing mutates it at
//! runtime.

use std::str::FromStr;
use std::time::Duration;

use crate::error::PipelineError;
use crate::stage::{Stage, StageDescriptor};

/// Retry policy applied uniformly to every stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of calls per stage, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay_ms: u64,
    /// Factor applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay in milliseconds to wait after failed attempt `attempt`
    /// (1-based): `min(initial * multiplier^(attempt-1), max)`.
    ///
    /// Strictly geometric and deterministic; there is no jitter.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn delay_ms_for_attempt(&self, attempt: u32) -> u64 {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let raw = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped = raw.min(self.max_delay_ms as f64);
        capped as u64
    }

    /// [`Self::delay_ms_for_attempt`] as a `Duration`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_ms_for_attempt(attempt))
    }

    fn validate(self) -> Result<Self, PipelineError> {
        if self.max_attempts == 0 {
            return Err(PipelineError::Configuration(
                "RETRY_MAX_ATTEMPTS must be at least 1".into(),
            ));
        }
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(PipelineError::Configuration(
                "RETRY_BACKOFF_MULTIPLIER must be at least 1".into(),
            ));
        }
        Ok(self)
    }
}

/// The full pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    stages: Vec<StageDescriptor>,
    /// Retry policy shared by all stages.
    pub retry: RetryPolicy,
    /// Amount passed to the reward collaborator after a full success.
    pub reward_amount: u64,
}

const DEFAULT_REWARD_AMOUNT: u64 = 100;

fn default_endpoint(stage: Stage) -> &'static str {
    match stage {
        Stage::Story => "http://localhost:3001/generate",
        Stage::Asset => "http://localhost:3002/generate",
        Stage::Code => "http://localhost:3003/generate",
        Stage::Deploy => "http://localhost:3004/deploy",
    }
}

fn default_timeout_ms(stage: Stage) -> u64 {
    match stage {
        Stage::Story | Stage::Deploy => 120_000,
        Stage::Asset => 180_000,
        Stage::Code => 240_000,
    }
}

fn env_prefix(stage: Stage) -> &'static str {
    match stage {
        Stage::Story => "STORY_AGENT",
        Stage::Asset => "ASSET_AGENT",
        Stage::Code => "CODE_AGENT",
        Stage::Deploy => "DEPLOY_AGENT",
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, PipelineError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PipelineError::Configuration(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

impl PipelineConfig {
    /// Creates a configuration from an explicit stage table.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Configuration` if a stage appears twice or the
    /// retry policy is invalid.
    pub fn new(
        stages: Vec<StageDescriptor>,
        retry: RetryPolicy,
        reward_amount: u64,
    ) -> Result<Self, PipelineError> {
        for (i, descriptor) in stages.iter().enumerate() {
            if stages[..i].iter().any(|d| d.stage == descriptor.stage) {
                return Err(PipelineError::Configuration(format!(
                    "stage {} is configured more than once",
                    descriptor.stage
                )));
            }
        }
        Ok(Self {
            stages,
            retry: retry.validate()?,
            reward_amount,
        })
    }

    /// Reads configuration through `lookup`, falling back to defaults for
    /// absent keys.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Configuration` if a present value does not
    /// parse or the resulting retry policy is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut stages = Vec::with_capacity(Stage::ORDER.len());
        for stage in Stage::ORDER {
            let prefix = env_prefix(stage);
            let endpoint =
                lookup(&format!("{prefix}_URL")).unwrap_or_else(|| default_endpoint(stage).into());
            let timeout_ms = parse_or(
                &lookup,
                &format!("{prefix}_TIMEOUT_MS"),
                default_timeout_ms(stage),
            )?;
            stages.push(StageDescriptor {
                stage,
                timeout_ms,
                endpoint,
            });
        }

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "RETRY_MAX_ATTEMPTS", defaults.max_attempts)?,
            initial_delay_ms: parse_or(
                &lookup,
                "RETRY_INITIAL_DELAY_MS",
                defaults.initial_delay_ms,
            )?,
            backoff_multiplier: parse_or(
                &lookup,
                "RETRY_BACKOFF_MULTIPLIER",
                defaults.backoff_multiplier,
            )?,
            max_delay_ms: parse_or(&lookup, "RETRY_MAX_DELAY_MS", defaults.max_delay_ms)?,
        };
        let reward_amount = parse_or(&lookup, "REWARD_AMOUNT", DEFAULT_REWARD_AMOUNT)?;

        Self::new(stages, retry, reward_amount)
    }

    /// Reads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Self::from_lookup`].
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Looks up the descriptor for `stage`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::UnknownStage` if the stage table has no entry
    /// for it.
    pub fn descriptor(&self, stage: Stage) -> Result<&StageDescriptor, PipelineError> {
        self.stages
            .iter()
            .find(|d| d.stage == stage)
            .ok_or_else(|| PipelineError::UnknownStage(stage.to_string()))
    }

    /// All configured descriptors.
    #[must_use]
    pub fn stages(&self) -> &[StageDescriptor] {
        &self.stages
    }
}
