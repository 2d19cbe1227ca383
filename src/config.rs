//! ratewatch configuration types and loading

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveTime, TimeDelta};

use crate::schedule::Cadence;

/// Main ratewatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Job cadences and retry policy
    pub schedule: ScheduleConfig,

    /// Rate-tracker window and compaction parameters
    pub tracker: TrackerConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks the values the cadence builders would otherwise panic on.
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        for run in &self.schedule.everyday {
            if NaiveTime::parse_from_str(&run.at, "%H:%M").is_err() {
                return Err(eyre!("invalid time of day {:?}, expected HH:MM", run.at));
            }
            if run.jitter_minutes < 0 {
                return Err(eyre!("jitter-minutes must be >= 0, got {}", run.jitter_minutes));
            }
        }
        if self.schedule.retry.hours <= 0 {
            return Err(eyre!("retry hours must be > 0, got {}", self.schedule.retry.hours));
        }
        if self.schedule.retry.jitter_percent < 0.0 {
            return Err(eyre!(
                "retry jitter-percent must be >= 0, got {}",
                self.schedule.retry.jitter_percent
            ));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .ratewatch.yml
        let local_config = PathBuf::from(".ratewatch.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/ratewatch/ratewatch.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("ratewatch").join("ratewatch.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Scheduling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Daily runs, each at a fixed time with one-sided jitter
    pub everyday: Vec<DailyRun>,

    /// Retry cadence used when a run errors
    pub retry: RetryConfig,

    /// Fire the first run immediately on startup
    #[serde(rename = "update-at-start")]
    pub update_at_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            everyday: vec![DailyRun {
                at: "08:00".to_string(),
                jitter_minutes: 30,
            }],
            retry: RetryConfig::default(),
            update_at_start: true,
        }
    }
}

impl ScheduleConfig {
    /// Build one once-daily cadence per configured run.
    ///
    /// Call [`Config::validate`] first; malformed values panic here.
    pub fn daily_cadences(&self) -> Vec<Cadence> {
        self.everyday
            .iter()
            .map(|run| {
                Cadence::every(1)
                    .days()
                    .at(&run.at)
                    .jitter_add(TimeDelta::minutes(run.jitter_minutes))
            })
            .collect()
    }

    /// Build the error-retry cadence the job returns on failure.
    pub fn retry_cadence(&self) -> Cadence {
        Cadence::every(self.retry.hours)
            .hours()
            .jitter_percent(self.retry.jitter_percent)
    }
}

/// One scheduled daily run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRun {
    /// Wall-clock time of day, "HH:MM"
    pub at: String,

    /// One-sided jitter added after the anchor, in minutes
    #[serde(rename = "jitter-minutes")]
    pub jitter_minutes: i64,
}

/// Retry cadence applied when a run reports an error
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Base retry interval in hours
    pub hours: i64,

    /// Symmetric jitter as a percentage of the base interval
    #[serde(rename = "jitter-percent")]
    pub jitter_percent: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            hours: 1,
            jitter_percent: 25.0,
        }
    }
}

/// Rate-tracker window and compaction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Minimum trailing window, in hours, before a rate is reported
    #[serde(rename = "rate-min-hours")]
    pub rate_min_hours: f64,

    /// History retention horizon, in days
    #[serde(rename = "retain-days")]
    pub retain_days: f64,

    /// Minimum gap, in hours, between retained event-less samples
    #[serde(rename = "merge-hours")]
    pub merge_hours: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            rate_min_hours: 24.0,
            retain_days: 30.0,
            merge_hours: 8.0,
        }
    }
}
