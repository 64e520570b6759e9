//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub ocr: OcrConfig,

    #[serde(default)]
    pub images: ImagesConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &PathBuf) -> ConfigResult<Self> {
        if !path.exists() {
            debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &PathBuf) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, Self::default_config_string())?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scheduler.interval_seconds == 0 {
            return Err(invalid("scheduler.interval_seconds", "must be at least 1"));
        }
        if self.scheduler.max_attempts < 1 {
            return Err(invalid("scheduler.max_attempts", "must be at least 1"));
        }
        if self.ocr.languages.is_empty() {
            return Err(invalid("ocr.languages", "at least one language is required"));
        }
        if self.images.min_aspect > self.images.max_aspect {
            return Err(invalid("images.min_aspect", "must not exceed images.max_aspect"));
        }
        Ok(())
    }

    /// Resolve paths, honouring `general.data_dir` when set.
    pub fn paths(&self) -> ConfigResult<AppPaths> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Ok(match &self.general.data_dir {
            Some(dir) => paths.with_data_dir(dir),
            None => paths,
        })
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# Vitae Configuration
# Document stage pipeline: text extraction, entity extraction, image extraction

[general]
# Data directory for the document database and blob store
# data_dir = "~/.local/share/vitae"

[scheduler]
# Seconds between ticks of a stage service
interval_seconds = 5

# Failed attempts before a document is dead-lettered for a stage
max_attempts = 5

# Seconds a claimed document stays hidden from other processes of the same stage
claim_lease_seconds = 900

[ollama]
# Ollama server address (entity extraction)
host = "http://localhost:11434"
model = "llama3"

# Request timeout in seconds
timeout_seconds = 800

# Maximum tokens generated per response
num_predict = 1024

[ocr]
# Retry with Tesseract when a PDF has no embedded text
ocr_fallback = true

# Tesseract language codes
languages = ["spa"]

# Rasterisation resolution for OCR
dpi = 300

[images]
# Acceptance rules for the extracted profile picture
min_width = 64
min_height = 64

# Height / width ratio bounds
min_aspect = 0.75
max_aspect = 2.0
"#
        .to_string()
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        message: message.to_string(),
    }
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
}

/// Tick cadence and failure budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_seconds: u64,
    pub max_attempts: i32,
    pub claim_lease_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            max_attempts: 5,
            claim_lease_seconds: 900,
        }
    }
}

/// Ollama LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub timeout_seconds: u64,
    pub num_predict: i32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            timeout_seconds: 800,
            num_predict: 1024,
        }
    }
}

/// Text extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub ocr_fallback: bool,
    pub languages: Vec<String>,
    pub dpi: u32,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            ocr_fallback: true,
            languages: vec!["spa".to_string()],
            dpi: 300,
        }
    }
}

/// Image extraction acceptance settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagesConfig {
    pub min_width: u32,
    pub min_height: u32,
    pub min_aspect: f64,
    pub max_aspect: f64,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            min_width: 64,
            min_height: 64,
            min_aspect: 0.75,
            max_aspect: 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.ollama.host, "http://localhost:11434");
        assert_eq!(config.scheduler.interval_seconds, 5);
        assert!(config.ocr.ocr_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_string_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_config_string()).unwrap();
        let defaults = Config::default();
        assert_eq!(parsed.ollama.model, defaults.ollama.model);
        assert_eq!(parsed.scheduler.max_attempts, defaults.scheduler.max_attempts);
        assert_eq!(parsed.ocr.languages, defaults.ocr.languages);
        assert_eq!(parsed.images.max_aspect, defaults.images.max_aspect);
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
            [scheduler]
            interval_seconds = 30

            [ocr]
            languages = ["spa", "eng"]
            "#
        )
        .unwrap();

        let path = temp_file.path().to_path_buf();
        let config = Config::load_from(&path).unwrap();

        assert_eq!(config.scheduler.interval_seconds, 30);
        assert_eq!(config.ocr.languages, vec!["spa", "eng"]);
        // Defaults should still work
        assert_eq!(config.scheduler.max_attempts, 5);
        assert_eq!(config.ollama.model, "llama3");
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "[scheduler]\ninterval_seconds = 0").unwrap();

        let err = Config::load_from(&temp_file.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == "scheduler.interval_seconds"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.scheduler.claim_lease_seconds, 900);
    }
}
