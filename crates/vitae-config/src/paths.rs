//! Application paths management.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

/// Locations of the config file, the document database and the blob store.
#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub config_file: PathBuf,
    pub database_file: PathBuf,
    pub blob_dir: PathBuf,
}

impl AppPaths {
    /// Create paths using platform-specific directories.
    pub fn new() -> Option<Self> {
        let proj_dirs = ProjectDirs::from("com", "vitae", "vitae")?;

        let config_dir = proj_dirs.config_dir().to_path_buf();
        let data_dir = proj_dirs.data_dir().to_path_buf();

        Some(Self::build(config_dir, data_dir))
    }

    /// Keep the platform config file but place data under `data_dir`.
    pub fn with_data_dir(self, data_dir: impl AsRef<Path>) -> Self {
        Self::build(self.config_dir, expand_home(data_dir.as_ref()))
    }

    fn build(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_file: config_dir.join("config.toml"),
            database_file: data_dir.join("vitae.db"),
            blob_dir: data_dir.join("blobs"),
            config_dir,
            data_dir,
        }
    }

    /// Create all necessary directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.blob_dir)?;
        Ok(())
    }

    /// Check if vitae has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.database_file.exists()
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_paths_creation() {
        let paths = AppPaths::new();
        assert!(paths.is_some());

        let paths = paths.unwrap();
        assert!(paths.config_file.to_string_lossy().contains("config.toml"));
        assert!(paths.database_file.to_string_lossy().contains("vitae.db"));
    }

    #[test]
    fn test_data_dir_override() {
        let paths = AppPaths::new().unwrap().with_data_dir("/srv/vitae");
        assert_eq!(paths.database_file, PathBuf::from("/srv/vitae/vitae.db"));
        assert_eq!(paths.blob_dir, PathBuf::from("/srv/vitae/blobs"));
        assert!(paths.config_file.ends_with("config.toml"));
    }
}
