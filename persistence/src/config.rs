//! Engine configuration loading and saving.

use quizcord_core::types::{EngineConfig, QuizError, Result};
use std::path::PathBuf;
use tracing::info;

const CONFIG_FILE: &str = "config.toml";

/// TOML-backed configuration under the platform config directory. Missing
/// files yield defaults; partial files fill in the rest via serde defaults.
pub struct ConfigStore {
    config_dir: PathBuf,
}

impl ConfigStore {
    pub fn open_default() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("quizcord");
        Self::open(config_dir)
    }

    pub fn open(config_dir: impl Into<PathBuf>) -> Result<Self> {
        let config_dir = config_dir.into();
        std::fs::create_dir_all(&config_dir)?;
        Ok(Self { config_dir })
    }

    pub fn load(&self) -> Result<EngineConfig> {
        let path = self.config_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(EngineConfig::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&content)
            .map_err(|e| QuizError::Config(format!("failed to parse {}: {e}", path.display())))?;
        info!(path = %path.display(), "loaded engine configuration");
        Ok(config)
    }

    pub fn save(&self, config: &EngineConfig) -> Result<()> {
        let path = self.config_dir.join(CONFIG_FILE);
        let content = toml::to_string_pretty(config)
            .map_err(|e| QuizError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quizcord_core::types::DegradedPolicy;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();
        let config = store.load().unwrap();
        assert_eq!(config.group_max_questions, 5);
        assert_eq!(config.answer_channel_capacity, 64);
    }

    #[test]
    fn saved_config_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::open(dir.path()).unwrap();

        let mut config = EngineConfig::default();
        config.question_timeout_max_s = 90;
        config.degraded_policy = DegradedPolicy::Drop;
        store.save(&config).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.question_timeout_max_s, 90);
        assert_eq!(loaded.degraded_policy, DegradedPolicy::Drop);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("config.toml"), "group_max_questions = 3\n").unwrap();

        let store = ConfigStore::open(dir.path()).unwrap();
        let config = store.load().unwrap();
        assert_eq!(config.group_max_questions, 3);
        assert_eq!(config.solo_max_questions, 20);
    }
}
