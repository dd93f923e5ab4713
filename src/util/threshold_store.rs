use crate::errors::CoordinatorError;
use crate::util::kv_store::KeyValueStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage key the threshold config is persisted under.
pub const CONFIG_KEY: &str = "alert_threshold_config";

pub const DEFAULT_THRESHOLD_DAYS: u32 = 3;

/// Days-until-deadline at or below which a tracked entity raises an alert.
/// Stored as `{"alertThresholdDays": N}`; missing fields fall back to defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlertThresholdConfig {
    pub alert_threshold_days: u32,
}

impl Default for AlertThresholdConfig {
    fn default() -> Self {
        Self { alert_threshold_days: DEFAULT_THRESHOLD_DAYS }
    }
}

/// Accept only positive day counts that fit the stored type.
pub fn validate_threshold(days: i64) -> Result<u32, CoordinatorError> {
    u32::try_from(days).ok()
        .filter(|d| *d >= 1)
        .ok_or(CoordinatorError::InvalidThreshold(days))
}

/// Durable home of the alert threshold. The in-memory value is authoritative
/// for the session; persistence is best-effort in both directions.
pub struct ThresholdStore {
    kv:      Arc<dyn KeyValueStore>,
    current: RwLock<Current>,
}

struct Current {
    config: AlertThresholdConfig,
    /// Set once the session has chosen a value; `load` no longer replaces it.
    pinned: bool,
}

impl ThresholdStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            kv,
            current: RwLock::new(Current { config: AlertThresholdConfig::default(), pinned: false }),
        }
    }

    /// Read the persisted config, falling back to defaults on absence,
    /// corruption or storage failure. Never fails.
    ///
    /// Adopts the stored value as current unless [`set`](Self::set) has
    /// already been called this session, in which case the session value
    /// is kept and returned.
    pub fn load(&self) -> AlertThresholdConfig {
        let loaded = match self.kv.read_key(CONFIG_KEY) {
            Ok(Some(text)) => parse_or_default(&text),
            Ok(None) => {
                debug!("no stored alert threshold, using default");
                AlertThresholdConfig::default()
            }
            Err(e) => {
                warn!(error = %e, "failed to read alert threshold, using default");
                AlertThresholdConfig::default()
            }
        };
        let mut current = self.current.write();
        if current.pinned {
            debug!(stored = loaded.alert_threshold_days, kept = current.config.alert_threshold_days,
                   "alert threshold already set this session, ignoring stored value");
        } else {
            current.config = loaded;
        }
        current.config
    }

    /// Persist `config` (best-effort). Failures are logged and swallowed.
    pub fn save(&self, config: &AlertThresholdConfig) {
        let json = match serde_json::to_string(config) {
            Ok(j)  => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize alert threshold");
                return;
            }
        };
        if let Err(e) = self.kv.write_key(CONFIG_KEY, &json) {
            warn!(error = %e, days = config.alert_threshold_days, "failed to persist alert threshold");
        }
    }

    pub fn get(&self) -> AlertThresholdConfig {
        self.current.read().config
    }

    /// In-memory update only; validation happens at the public boundary.
    pub fn set(&self, days: u32) {
        let mut current = self.current.write();
        current.config.alert_threshold_days = days;
        current.pinned = true;
    }
}

fn parse_or_default(text: &str) -> AlertThresholdConfig {
    match serde_json::from_str::<AlertThresholdConfig>(text) {
        Ok(cfg) if cfg.alert_threshold_days >= 1 => cfg,
        Ok(cfg) => {
            warn!(days = cfg.alert_threshold_days, "stored alert threshold out of range, using default");
            AlertThresholdConfig::default()
        }
        Err(e) => {
            warn!(error = %e, "stored alert threshold is corrupt, using default");
            AlertThresholdConfig::default()
        }
    }
}
