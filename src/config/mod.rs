//! Configuration file handling
//!
//! One TOML file, `<config dir>/hoard/config.toml` unless `--config` or
//! `HOARD_CONFIG` names another. A missing file means defaults; a file
//! that fails to parse is an error naming the file.

pub mod schema;

pub use schema::Config;

use crate::error::{HoardError, HoardResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// What `init` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Written,
    /// A file was already there and `force` was not given
    Kept,
}

/// Locates, reads and writes the configuration file
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Use `explicit` when given, the platform location otherwise
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        Self {
            config_path: explicit.unwrap_or_else(Self::default_config_path),
        }
    }

    pub fn with_path(path: PathBuf) -> Self {
        Self::resolve(Some(path))
    }

    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hoard")
            .join("config.toml")
    }

    /// Cache root used when the file does not set one
    pub fn default_cache_root() -> PathBuf {
        dirs::cache_dir()
            .or_else(dirs::data_local_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("hoard")
    }

    pub fn path(&self) -> &Path {
        &self.config_path
    }

    pub async fn load(&self) -> HoardResult<Config> {
        match fs::read_to_string(&self.config_path).await {
            Ok(content) => parse(&self.config_path, &content),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No config at {}, using defaults", self.config_path.display());
                Ok(Config::default())
            }
            Err(e) => Err(HoardError::io(
                format!("reading config from {}", self.config_path.display()),
                e,
            )),
        }
    }

    /// Write `config`, creating the parent directory if needed
    pub async fn save(&self, config: &Config) -> HoardResult<()> {
        if let Some(dir) = self.config_path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| HoardError::ConfigDirCreate {
                    path: dir.to_path_buf(),
                    source: Arc::new(e),
                })?;
        }

        let content = toml::to_string_pretty(config)?;
        fs::write(&self.config_path, content).await.map_err(|e| {
            HoardError::io(format!("writing {}", self.config_path.display()), e)
        })?;

        info!("Wrote {}", self.config_path.display());
        Ok(())
    }

    /// Write a default file unless one exists and `force` is false
    pub async fn init(&self, force: bool) -> HoardResult<InitOutcome> {
        let exists = fs::try_exists(&self.config_path).await.map_err(|e| {
            HoardError::io(format!("checking {}", self.config_path.display()), e)
        })?;
        if exists && !force {
            return Ok(InitOutcome::Kept);
        }

        self.save(&Config::default()).await?;
        Ok(InitOutcome::Written)
    }
}

fn parse(path: &Path, content: &str) -> HoardResult<Config> {
    toml::from_str(content).map_err(|e| HoardError::ConfigInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> ConfigManager {
        ConfigManager::with_path(dir.path().join("nested").join("config.toml"))
    }

    #[test]
    fn resolve_prefers_explicit_path() {
        let explicit = PathBuf::from("/etc/hoard.toml");
        assert_eq!(ConfigManager::resolve(Some(explicit.clone())).path(), explicit);
        assert_eq!(
            ConfigManager::resolve(None).path(),
            ConfigManager::default_config_path()
        );
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = manager(&dir).load().await.unwrap();
        assert_eq!(config.general.log_format, "text");
        assert!(!config.cache.paranoid);
    }

    #[tokio::test]
    async fn saved_values_load_back() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        let mut config = Config::default();
        config.cache.timeout_secs = 90;
        manager.save(&config).await.unwrap();

        assert_eq!(manager.load().await.unwrap().cache.timeout_secs, 90);
    }

    #[tokio::test]
    async fn init_keeps_existing_file_unless_forced() {
        let dir = TempDir::new().unwrap();
        let manager = manager(&dir);

        assert_eq!(manager.init(false).await.unwrap(), InitOutcome::Written);

        fs::write(manager.path(), "[cache]\ntimeout_secs = 7\n")
            .await
            .unwrap();
        assert_eq!(manager.init(false).await.unwrap(), InitOutcome::Kept);
        assert_eq!(manager.load().await.unwrap().cache.timeout_secs, 7);

        assert_eq!(manager.init(true).await.unwrap(), InitOutcome::Written);
        assert_eq!(manager.load().await.unwrap().cache.timeout_secs, 0);
    }

    #[test]
    fn parse_error_names_the_file() {
        let path = Path::new("/tmp/hoard.toml");
        let err = parse(path, "[cache]\nparanoid = \"sometimes\"\n").unwrap_err();
        assert!(matches!(err, HoardError::ConfigInvalid { path: p, .. } if p == path));
    }
}
