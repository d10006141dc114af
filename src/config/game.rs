use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Well-known port hosts listen on.
pub const DEFAULT_PORT: u16 = 27333;

/// Runtime settings for a game session: tick rate, networking, save location.
#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    #[serde(default = "default_tick_rate")]
    pub tick_rate_hz: f32,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_save_directory")]
    pub save_directory: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,
    #[serde(default = "default_ping_interval")]
    pub ping_interval_ticks: u32,
    #[serde(default)]
    pub share_world_on_join: bool,
}

fn default_tick_rate() -> f32 {
    20.0
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_save_directory() -> String {
    "saves".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_viewport_width() -> u32 {
    25
}

fn default_viewport_height() -> u32 {
    15
}

fn default_ping_interval() -> u32 {
    100
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            tick_rate_hz: default_tick_rate(),
            port: default_port(),
            bind: default_bind(),
            save_directory: default_save_directory(),
            log_level: default_log_level(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            ping_interval_ticks: default_ping_interval(),
            share_world_on_join: false,
        }
    }
}

impl GameConfig {
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
        Self::from_toml_str(&content, path)
    }

    pub fn from_toml_str(content: &str, source_path: &Path) -> Result<Self, String> {
        let config: GameConfig =
            toml::from_str(content).map_err(|e| format!("{}: {}", source_path.display(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Fixed tick period derived from `tick_rate_hz`.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut errors = Vec::new();

        if !(self.tick_rate_hz > 0.0 && self.tick_rate_hz <= 1000.0) {
            errors.push(format!(
                "tick_rate_hz must be > 0.0 and <= 1000.0, got {}. Example: tick_rate_hz = 20.0",
                self.tick_rate_hz
            ));
        }

        if self.port == 0 {
            errors.push(format!(
                "port must be 1-65535, got {}. Example: port = {}",
                self.port, DEFAULT_PORT
            ));
        }

        if self.bind.trim().is_empty() {
            errors.push("bind must not be empty. Example: bind = \"0.0.0.0\"".to_string());
        }

        if self.save_directory.trim().is_empty() {
            errors.push(
                "save_directory must not be empty. Example: save_directory = \"saves\"".to_string(),
            );
        }

        if self.viewport_width == 0 || self.viewport_height == 0 {
            errors.push(format!(
                "viewport must be at least 1x1 tiles, got {}x{}. Example: viewport_width = 25",
                self.viewport_width, self.viewport_height
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "log_level must be one of {:?}, got '{}'. Example: log_level = \"info\"",
                valid_levels, self.log_level
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors.join("\n"))
        }
    }
}
