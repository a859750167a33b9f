use anyhow::{Context, Result, bail};
use figment::{
    Figment,
    providers::{Env, Format, Json, Toml, Yaml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::jobs::grades::GradesMode;
use crate::pool::calculate_optimal_workers;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

const ENV_PREFIX: &str = "PIPEWORK_";

pub struct PipeworkConfig {
    figment: Figment,
}

impl PipeworkConfig {
    pub fn load(custom_config: Option<&str>) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let user = Self::user_config_base_path();
        let mut figment = Figment::new()
            .merge(Toml::string(DEFAULT_CONFIG)) // 1. Defaults (lowest)
            .merge(Toml::file(format!("{user}.toml"))) // 2. User config
            .merge(Json::file(format!("{user}.json")))
            .merge(Yaml::file(format!("{user}.yaml")))
            .merge(Toml::file("pipework.toml")) // 3. Repo config
            .merge(Json::file("pipework.json"))
            .merge(Yaml::file("pipework.yaml"));

        if let Some(path) = custom_config {
            // 4. Custom config, picked by extension
            if !std::path::Path::new(path).exists() {
                bail!("Config file {path} not found");
            }
            figment = match path.rsplit('.').next() {
                Some("json") => figment.merge(Json::file(path)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
                _ => figment.merge(Toml::file(path)),
            };
        }

        // 5. Environment variables (highest)
        let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        Ok(Self { figment })
    }

    /// Typed, validated view of the merged configuration.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .context("Invalid configuration")?;
        settings.validate()?;
        tracing::trace!(?settings, "CONFIG LOAD: Final settings");
        Ok(settings)
    }

    /// Get a nested object/section as JSON
    pub fn get_section(&self, path: &str) -> Result<serde_json::Value> {
        Ok(self.figment.extract_inner(path)?)
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        Ok(self.figment.extract()?)
    }

    fn user_config_base_path() -> String {
        match std::env::var("HOME") {
            Ok(home) => format!("{home}/.config/pipework/config"),
            Err(_) => "~/.config/pipework/config".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub pool: PoolSettings,
    pub fanout: FanOutSettings,
    pub vowels: VowelsSettings,
    pub ips: IpsSettings,
    pub grades: GradesSettings,
    pub movies: MoviesSettings,
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.pool.thread_percentage) {
            bail!(
                "pool.thread_percentage must be between 1 and 100, got {}",
                self.pool.thread_percentage
            );
        }
        if self.grades.students == 0 {
            bail!("grades.students must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSettings {
    /// 0 sizes the pool from available cores.
    pub size: usize,
    pub thread_percentage: u8,
}

impl PoolSettings {
    pub fn worker_count(&self) -> usize {
        if self.size > 0 {
            self.size
        } else {
            calculate_optimal_workers(0, self.thread_percentage)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutSettings {
    pub collect_timeout_ms: u64,
}

impl FanOutSettings {
    pub fn collect_timeout(&self) -> Duration {
        Duration::from_millis(self.collect_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VowelsSettings {
    pub input: PathBuf,
    pub letters: String,
    pub sample_repetitions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpsSettings {
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradesSettings {
    pub mode: GradesMode,
    pub students: usize,
    pub grades_per_student: usize,
    pub dir: PathBuf,
    pub averages_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoviesSettings {
    pub output_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_config_loads_defaults() {
        let config = PipeworkConfig::load(None).expect("Should load default config");
        let settings = config.settings().unwrap();

        assert_eq!(settings.fanout.collect_timeout(), Duration::from_millis(500));
        assert_eq!(settings.vowels.letters, "aeiou");
        assert_eq!(settings.grades.averages_file, PathBuf::from("medias.txt"));
        assert_eq!(settings.grades.mode, GradesMode::Lock);
        assert!(settings.pool.worker_count() >= 1);

        let full = config.get_full_config().unwrap();
        assert!(full.get("movies").is_some());
        assert_eq!(config.get_section("grades").unwrap()["students"], 10);
    }

    #[test]
    fn test_custom_config_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[pool]\nsize = 3\n\n[ips]\ncount = 42\n").unwrap();

        let config = PipeworkConfig::load(path.to_str()).unwrap();
        let settings = config.settings().unwrap();
        assert_eq!(settings.pool.worker_count(), 3);
        assert_eq!(settings.ips.count, 42);
        // Untouched sections keep their defaults.
        assert_eq!(settings.grades.grades_per_student, 6);
    }

    #[test]
    fn test_json_custom_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(&path, r#"{"grades": {"mode": "pool", "students": 4}}"#).unwrap();

        let settings = PipeworkConfig::load(path.to_str()).unwrap().settings().unwrap();
        assert_eq!(settings.grades.mode, GradesMode::Pool);
        assert_eq!(settings.grades.students, 4);
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        assert!(PipeworkConfig::load(Some("definitely-not-here.toml")).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");

        fs::write(&path, "[pool]\nthread_percentage = 0\n").unwrap();
        let err = PipeworkConfig::load(path.to_str()).unwrap().settings().unwrap_err();
        assert!(err.to_string().contains("thread_percentage"));

        fs::write(&path, "[grades]\nstudents = 0\n").unwrap();
        let err = PipeworkConfig::load(path.to_str()).unwrap().settings().unwrap_err();
        assert!(err.to_string().contains("students"));
    }
}
