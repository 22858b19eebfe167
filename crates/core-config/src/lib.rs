//! Configuration loading and parsing.
//!
//! Parses `ui.toml` (or an override path supplied by the binary),
//! extracting the handful of knobs the render loop and input task need
//! at startup: the click-count threshold, whether SGR mouse tracking is
//! enabled at all, and the log level. Unknown fields are ignored so the
//! file can gain sections future crates care about without breaking
//! this one.

use anyhow::Result;
use serde::Deserialize;
use std::{fs, path::PathBuf, time::Duration};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct InputConfig {
    #[serde(default = "InputConfig::default_click_threshold_ms")]
    pub click_threshold_ms: u64,
    #[serde(default = "InputConfig::default_mouse_tracking")]
    pub mouse_tracking: bool,
}

impl InputConfig {
    const fn default_click_threshold_ms() -> u64 {
        300
    }
    const fn default_mouse_tracking() -> bool {
        true
    }

    pub fn click_threshold(&self) -> Duration {
        Duration::from_millis(self.click_threshold_ms)
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            click_threshold_ms: Self::default_click_threshold_ms(),
            mouse_tracking: Self::default_mouse_tracking(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_level")]
    pub level: String,
}

impl LogConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Best-effort config path: the working directory first, then the
/// platform config dir (XDG on Linux, `AppData\Roaming` on Windows).
pub fn discover() -> PathBuf {
    let local = PathBuf::from("ui.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("tui").join("ui.toml");
    }
    PathBuf::from("ui.toml")
}

/// Loads config from `path`, or from [`discover`] when `None`. A missing
/// or unparsable file falls back to defaults rather than failing startup;
/// a render loop should never refuse to start over a broken config file.
pub fn load_from(path: Option<PathBuf>) -> Result<AppConfig> {
    let path = path.unwrap_or_else(discover);
    let Ok(content) = fs::read_to_string(&path) else {
        return Ok(AppConfig::default());
    };
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => {
            info!(target: "config", path = %path.display(), "config_loaded");
            Ok(cfg)
        }
        Err(err) => {
            info!(target: "config", path = %path.display(), error = %err, "config_parse_failed_using_defaults");
            Ok(AppConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_config_when_missing_file() {
        let cfg = load_from(Some(PathBuf::from("__nonexistent_hopefully__.toml"))).unwrap();
        assert_eq!(cfg.input.click_threshold_ms, 300);
        assert!(cfg.input.mouse_tracking);
        assert_eq!(cfg.log.level, "info");
    }

    #[test]
    fn parses_overridden_click_threshold() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[input]\nclick_threshold_ms = 500\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.input.click_threshold_ms, 500);
        assert!(cfg.input.mouse_tracking, "untouched fields keep their default");
    }

    #[test]
    fn parses_mouse_tracking_toggle() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[input]\nmouse_tracking = false\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert!(!cfg.input.mouse_tracking);
    }

    #[test]
    fn parses_log_level() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[log]\nlevel = \"debug\"\n").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "not = [valid toml").unwrap();
        let cfg = load_from(Some(tmp.path().to_path_buf())).unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn click_threshold_converts_to_duration() {
        let input = InputConfig {
            click_threshold_ms: 250,
            mouse_tracking: true,
        };
        assert_eq!(input.click_threshold(), Duration::from_millis(250));
    }
}
