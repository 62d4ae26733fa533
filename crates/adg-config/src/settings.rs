//! Typed view over the merged config JSON.
//!
//! Every section is optional; missing keys take the defaults below. Pointers
//! read here must stay listed in [`crate::CONSUMED_POINTERS`].

use std::time::Duration;

use adg_shuffle::{
    AssignmentPolicy, SeedStrategy, ShuffleEngineConfig, DEFAULT_MAX_BATCH_OPS,
    DEFAULT_PAGE_SIZE, DEFAULT_TOTAL_SQUARES,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::secrets::DEFAULT_ADMIN_KEY_ENV;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyKind {
    OrderingIndex,
    SquarePool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedKind {
    Entropy,
    TimeBucket,
    Fixed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub total_squares: u32,
    pub page_size: u32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            total_squares: DEFAULT_TOTAL_SQUARES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleSection {
    pub policy: PolicyKind,
    pub seed: SeedKind,
    pub seed_interval_secs: u64,
    /// Only read when `seed: fixed`.
    pub fixed_seed: Option<u64>,
    pub batch_limit: usize,
}

impl Default for ShuffleSection {
    fn default() -> Self {
        Self {
            policy: PolicyKind::OrderingIndex,
            seed: SeedKind::Entropy,
            seed_interval_secs: 2 * 60 * 60,
            fixed_seed: None,
            batch_limit: DEFAULT_MAX_BATCH_OPS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerSettings {
    pub cooldown_secs: u64,
    pub cooldown_max_entries: usize,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
}

impl Default for TriggerSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: 5 * 60,
            cooldown_max_entries: 1000,
            rate_limit_max: 5,
            rate_limit_window_secs: 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleSettings {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 2 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    pub admin_key_env: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            admin_key_env: DEFAULT_ADMIN_KEY_ENV.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub cors_origins: Vec<String>,
    /// Take the client identity from `x-forwarded-for` / `x-real-ip`.
    /// Only safe behind a proxy that overwrites those headers; otherwise a
    /// client rotating the header value escapes the cooldown and request limit.
    pub trust_forwarded_for: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            cors_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShuffleSettings {
    pub grid: GridSettings,
    pub shuffle: ShuffleSection,
    pub trigger: TriggerSettings,
    pub schedule: ScheduleSettings,
    pub auth: AuthSettings,
    pub http: HttpSettings,
}

impl ShuffleSettings {
    /// Extract and validate settings from a loaded config.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let s: ShuffleSettings = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: settings do not match the expected shape")?;
        s.validate()?;
        Ok(s)
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.total_squares == 0 {
            bail!("CONFIG_INVALID: grid.total_squares must be > 0");
        }
        if self.grid.page_size == 0 {
            bail!("CONFIG_INVALID: grid.page_size must be > 0");
        }
        if self.shuffle.batch_limit == 0 || self.shuffle.batch_limit > DEFAULT_MAX_BATCH_OPS {
            bail!(
                "CONFIG_INVALID: shuffle.batch_limit must be in 1..={} (got {})",
                DEFAULT_MAX_BATCH_OPS,
                self.shuffle.batch_limit
            );
        }
        if self.shuffle.seed == SeedKind::TimeBucket && self.shuffle.seed_interval_secs == 0 {
            bail!("CONFIG_INVALID: shuffle.seed_interval_secs must be > 0");
        }
        if self.shuffle.seed == SeedKind::Fixed && self.shuffle.fixed_seed.is_none() {
            bail!("CONFIG_INVALID: shuffle.seed=fixed requires shuffle.fixed_seed");
        }
        if self.trigger.cooldown_max_entries == 0 {
            bail!("CONFIG_INVALID: trigger.cooldown_max_entries must be > 0");
        }
        if self.trigger.rate_limit_max == 0 || self.trigger.rate_limit_window_secs == 0 {
            bail!("CONFIG_INVALID: trigger.rate_limit_max and rate_limit_window_secs must be > 0");
        }
        if self.schedule.enabled && self.schedule.interval_secs == 0 {
            bail!("CONFIG_INVALID: schedule.interval_secs must be > 0 when enabled");
        }
        if self.auth.admin_key_env.trim().is_empty() {
            bail!("CONFIG_INVALID: auth.admin_key_env must name an env var");
        }
        Ok(())
    }

    pub fn policy(&self) -> AssignmentPolicy {
        match self.shuffle.policy {
            PolicyKind::OrderingIndex => AssignmentPolicy::OrderingIndex,
            PolicyKind::SquarePool => AssignmentPolicy::SquarePool {
                total_squares: self.grid.total_squares,
                page_size: self.grid.page_size,
            },
        }
    }

    pub fn seed_strategy(&self) -> SeedStrategy {
        match self.shuffle.seed {
            SeedKind::Entropy => SeedStrategy::Entropy,
            SeedKind::TimeBucket => SeedStrategy::TimeBucket {
                interval: Duration::from_secs(self.shuffle.seed_interval_secs),
            },
            // validate() guarantees the seed is present.
            SeedKind::Fixed => SeedStrategy::Fixed(self.shuffle.fixed_seed.unwrap_or_default()),
        }
    }

    pub fn engine_config(&self) -> ShuffleEngineConfig {
        ShuffleEngineConfig {
            policy: self.policy(),
            seed: self.seed_strategy(),
            batch_limit: self.shuffle.batch_limit,
        }
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.trigger.cooldown_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.trigger.rate_limit_window_secs)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.interval_secs)
    }
}
