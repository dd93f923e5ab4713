use crate::dispatcher::DispatchPolicy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Periodic evaluation interval in seconds
    pub refresh_interval_sec: u64,
    /// JSON file of tracked entities. Empty = must be given with --source.
    pub source_path: String,
    /// Directory for persisted state (threshold). Empty = ~/.local/share/duewatch
    pub state_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    /// Alerts notified individually on first load; the rest are summarised.
    pub max_individual: usize,
    /// Delay between consecutive individual notifications.
    pub stagger_ms: u64,
    /// How long the delivery channel should keep each notification visible.
    pub ttl_ms: u64,
    /// Tag shared by every notification so they can be grouped or cleared together.
    pub group_tag: String,
    pub title: String,
    /// Send a desktop notification via notify-send.
    pub notify_send: bool,
    /// Slack / Discord / generic webhook URL. Empty = disabled.
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "pretty" or "json"
    pub format: String,
}

// ── Defaults ─────────────────────────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { refresh_interval_sec: 300, source_path: String::new(), state_dir: String::new() }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        let policy = DispatchPolicy::default();
        Self {
            max_individual: policy.max_individual,
            stagger_ms:     policy.stagger.as_millis() as u64,
            ttl_ms:         policy.ttl.as_millis() as u64,
            group_tag:      policy.group_tag,
            title:          policy.title,
            notify_send:    false,
            webhook_url:    String::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { format: "pretty".into() }
    }
}

// ── Derived settings ─────────────────────────────────────────────────

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.general.refresh_interval_sec)
    }

    pub fn dispatch_policy(&self) -> DispatchPolicy {
        let n = &self.notifications;
        DispatchPolicy {
            max_individual: n.max_individual,
            stagger:        Duration::from_millis(n.stagger_ms),
            ttl:            Duration::from_millis(n.ttl_ms),
            group_tag:      n.group_tag.clone(),
            title:          n.title.clone(),
        }
    }

    pub fn state_dir(&self) -> Option<PathBuf> {
        if self.general.state_dir.is_empty() {
            crate::util::kv_store::FileKvStore::default_dir()
        } else {
            Some(PathBuf::from(&self.general.state_dir))
        }
    }
}

// ── Load / Save ───────────────────────────────────────────────────────

impl Config {
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_or_init(&path),
            None       => Config::default(),
        }
    }

    /// Read `path`; on any failure write defaults there (best-effort) and use them.
    pub fn load_or_init(path: &Path) -> Self {
        match try_load(path) {
            Ok(c)  => c,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "using default config");
                if !path.exists() {
                    let _ = try_write_defaults(path);
                }
                Config::default()
            }
        }
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("duewatch").join("duewatch.toml"))
    }
}

fn try_load(path: &Path) -> Result<Config> {
    let text = fs::read_to_string(path)?;
    let cfg: Config = toml::from_str(&text)?;
    Ok(cfg)
}

fn try_write_defaults(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let text = toml::to_string_pretty(&Config::default())?;
    fs::write(path, format!("# duewatch configuration\n# Generated on first run, edit freely\n\n{}", text))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_writes_defaults() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("duewatch").join("duewatch.toml");
        let cfg  = Config::load_or_init(&path);
        assert_eq!(cfg.general.refresh_interval_sec, 300);
        assert!(path.exists());

        let reread = Config::load_or_init(&path);
        assert_eq!(reread.notifications.max_individual, 5);
        assert_eq!(reread.logging.format, "pretty");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("duewatch.toml");
        fs::write(&path, "[notifications]\nstagger_ms = 250\n").unwrap();

        let cfg = Config::load_or_init(&path);
        let policy = cfg.dispatch_policy();
        assert_eq!(policy.stagger, Duration::from_millis(250));
        assert_eq!(policy.max_individual, 5);
        assert_eq!(policy.group_tag, "deadline-alerts");
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(300));
    }

    #[test]
    fn broken_file_is_not_overwritten() {
        let dir  = tempfile::tempdir().unwrap();
        let path = dir.path().join("duewatch.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let cfg = Config::load_or_init(&path);
        assert_eq!(cfg.general.refresh_interval_sec, 300);
        assert_eq!(fs::read_to_string(&path).unwrap(), "this is = = not toml");
    }

    #[test]
    fn explicit_state_dir_wins() {
        let mut cfg = Config::default();
        cfg.general.state_dir = "/tmp/dw-state".into();
        assert_eq!(cfg.state_dir(), Some(PathBuf::from("/tmp/dw-state")));
    }
}
