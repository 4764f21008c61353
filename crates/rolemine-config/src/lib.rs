//! Configuration management for rolemine
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (RLM_* prefix)
//! 3. rolemine.local.toml (gitignored, local overrides)
//! 4. rolemine.toml (git-tracked, project config)
//! 5. ~/.config/rolemine/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main rolemine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RolemineConfig {
    pub project: ProjectConfig,
    pub mining: MiningConfig,
    pub strict: StrictConfig,
    pub experiment: ExperimentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub name: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "rolemine-project".to_string(),
        }
    }
}

/// Settings shared by every mining run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    /// Maximum users per role. 0 means "no cap".
    pub mur: usize,
    /// Seed policy for the covering engine, one of: by-user,
    /// by-user-or-permission, by-full-row, by-residual-row-full-test.
    pub policy: String,
    /// Merge users with identical permission rows before mining.
    pub collapse_duplicates: bool,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            mur: 0,
            policy: "by-user".to_string(),
            collapse_duplicates: false,
        }
    }
}

/// Settings specific to the strict engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrictConfig {
    /// Which matrix ranks seed users: "full" or "residual".
    pub matrix: String,
    /// Seed selection criterion: "min" or "max".
    pub criterion: String,
    /// Retry budget for random role splits.
    pub split_retries: usize,
    /// RNG seed; omit for entropy-seeded runs.
    pub rng_seed: Option<u64>,
}

impl Default for StrictConfig {
    fn default() -> Self {
        Self {
            matrix: "full".to_string(),
            criterion: "min".to_string(),
            split_retries: 10,
            rng_seed: None,
        }
    }
}

/// Settings for the sweep experiment driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Directory holding user-permission dataset files.
    pub datasets_dir: PathBuf,
    /// Directory holding role-block decomposition files for post runs.
    pub decompositions_dir: PathBuf,
    /// Where result tables land.
    pub output_dir: PathBuf,
    /// Emit LaTeX tables alongside the plain-text ones.
    pub latex: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            datasets_dir: PathBuf::from("datasets"),
            decompositions_dir: PathBuf::from("decompositions"),
            output_dir: PathBuf::from("results"),
            latex: false,
        }
    }
}

impl RolemineConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Check the selector strings and numeric ranges before handing the
    /// config to an engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        const POLICIES: [&str; 4] = [
            "by-user",
            "by-user-or-permission",
            "by-full-row",
            "by-residual-row-full-test",
        ];
        if !POLICIES.contains(&self.mining.policy.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown mining.policy `{}`",
                self.mining.policy
            )));
        }
        if !["full", "residual"].contains(&self.strict.matrix.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown strict.matrix `{}`",
                self.strict.matrix
            )));
        }
        if !["min", "max"].contains(&self.strict.criterion.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown strict.criterion `{}`",
                self.strict.criterion
            )));
        }
        if self.strict.split_retries == 0 {
            return Err(ConfigError::ValidationError(
                "strict.split_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();
        for dir in [
            &mut self.experiment.datasets_dir,
            &mut self.experiment.decompositions_dir,
            &mut self.experiment.output_dir,
        ] {
            if dir.is_relative() {
                *dir = base.join(&*dir);
            }
        }
    }
}
