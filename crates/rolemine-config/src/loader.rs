//! Configuration loader with multi-source merging

use crate::{ConfigError, Paths, RolemineConfig};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::{env, fs};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default project directory (current dir)
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "RLM".to_string(),
        }
    }

    /// Set the project directory
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "RLM")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<RolemineConfig> {
        let mut builder = config::Config::builder();

        // 1. Start with built-in defaults
        let defaults = RolemineConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/rolemine/config.toml)
        let paths = Paths::new();
        if let Ok(user_config_file) = paths.user_config_file() {
            if user_config_file.exists() {
                builder = builder.add_source(toml_source(&user_config_file)?);
            }
        }

        // 3. Project config (rolemine.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(toml_source(&project_config_file)?);
        }

        // 4. Local config (rolemine.local.toml, gitignored)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(toml_source(&local_config_file)?);
        }

        // 5. Environment variables (RLM_*)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .separator("_")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut rolemine_config: RolemineConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        rolemine_config.resolve_paths(&self.project_dir);

        Ok(rolemine_config)
    }

    /// Load configuration or return defaults if not found
    pub fn load_or_default(self) -> RolemineConfig {
        self.load().unwrap_or_default()
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and syntax-checks one TOML config file, so a failure names the
/// offending file instead of the merged builder.
fn toml_source(
    path: &Path,
) -> Result<config::File<config::FileSourceString, config::FileFormat>, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str::<toml::Table>(&text).map_err(|source| ConfigError::ParseError {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config::File::from_str(&text, config::FileFormat::Toml))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .expect("Failed to load config");

        assert_eq!(config.mining.policy, "by-user");
        assert_eq!(config.strict.split_retries, 10);
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[project]
name = "hc-experiment"

[mining]
mur = 50
policy = "by-full-row"
collapse_duplicates = true

[strict]
criterion = "max"
rng_seed = 42
"#;
        fs::write(project_dir.join("rolemine.toml"), config_content)
            .expect("Failed to write config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("Failed to load config");

        assert_eq!(config.project.name, "hc-experiment");
        assert_eq!(config.mining.mur, 50);
        assert_eq!(config.mining.policy, "by-full-row");
        assert!(config.mining.collapse_duplicates);
        assert_eq!(config.strict.criterion, "max");
        assert_eq!(config.strict.rng_seed, Some(42));
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("rolemine.toml"),
            r#"
[mining]
mur = 10
"#,
        )
        .expect("Failed to write project config");

        fs::write(
            project_dir.join("rolemine.local.toml"),
            r#"
[mining]
mur = 3
"#,
        )
        .expect("Failed to write local config");

        let config = ConfigLoader::new()
            .with_project_dir(project_dir)
            .load()
            .expect("Failed to load config");

        // Local config should override project config
        assert_eq!(config.mining.mur, 3);
    }

    #[test]
    fn test_malformed_config_names_the_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("rolemine.toml"), "[mining\nmur = 3")
            .expect("Failed to write config");

        let err = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .unwrap_err();

        let config_err = err.downcast_ref::<ConfigError>().expect("typed config error");
        assert!(matches!(config_err, ConfigError::ParseError { .. }));
        assert!(err.to_string().contains("rolemine.toml"));
    }

    #[test]
    fn test_unreadable_config_is_a_read_error() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        // a directory where the config file is expected
        fs::create_dir(temp_dir.path().join("rolemine.toml")).expect("Failed to create dir");

        let err = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .unwrap_err();

        let config_err = err.downcast_ref::<ConfigError>().expect("typed config error");
        assert!(matches!(config_err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn test_path_resolution() {
        let temp_dir = tempdir().expect("Failed to create temp dir");

        let config = ConfigLoader::new()
            .with_project_dir(temp_dir.path())
            .load()
            .expect("Failed to load config");

        assert!(config.experiment.datasets_dir.is_absolute());
        assert!(config.experiment.output_dir.is_absolute());
    }
}
