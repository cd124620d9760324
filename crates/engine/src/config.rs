// Local configuration file.
//
// Global config: `~/.termlight/config.toml`

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::annotate::scanner::SkipPolicy;
use crate::overlay::{PlacementMetrics, Size};

/// Root directory for termlight state: `~/.termlight/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".termlight"))
}

/// Path to the config file: `~/.termlight/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Default cache database: `~/.termlight/cache.db`.
pub fn default_cache_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("cache.db"))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub service: ServiceConfig,
    pub cache: CacheConfig,
    pub annotate: AnnotateConfig,
    pub overlay: OverlayConfig,
}

impl EngineConfig {
    /// Load from `~/.termlight/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    pub fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy::with_extra_tags(&self.annotate.extra_skip_tags)
    }
}

/// Remote term service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub base_url: String,
    /// Path segment naming whose term list to fetch.
    pub user_scope: String,
    pub timeout_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".into(),
            user_scope: "usuario123".into(),
            timeout_ms: 10_000,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// SQLite file; `~/.termlight/cache.db` when unset.
    pub path: Option<PathBuf>,
    pub ttl_sec: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { path: None, ttl_sec: 300 }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_sec)
    }

    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(default_cache_path)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AnnotateConfig {
    /// Tags added to the built-in opaque list.
    pub extra_skip_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OverlayConfig {
    pub margin: f64,
    pub popup_gap: f64,
    pub tooltip_gap: f64,
    pub top_margin: f64,
    pub popup_width: f64,
    pub popup_height: f64,
    pub tooltip_width: f64,
    pub tooltip_height: f64,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        let metrics = PlacementMetrics::default();
        Self {
            margin: metrics.margin,
            popup_gap: metrics.popup_gap,
            tooltip_gap: metrics.tooltip_gap,
            top_margin: metrics.top_margin,
            popup_width: 260.0,
            popup_height: 120.0,
            tooltip_width: 220.0,
            tooltip_height: 90.0,
        }
    }
}

impl OverlayConfig {
    pub fn metrics(&self) -> PlacementMetrics {
        PlacementMetrics {
            margin: self.margin,
            popup_gap: self.popup_gap,
            tooltip_gap: self.tooltip_gap,
            top_margin: self.top_margin,
        }
    }

    pub fn popup_size(&self) -> Size {
        Size::new(self.popup_width, self.popup_height)
    }

    pub fn tooltip_size(&self) -> Size {
        Size::new(self.tooltip_width, self.tooltip_height)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
