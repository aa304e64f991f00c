//! Site configuration management for `thicket.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                            |
//! |-------------|----------------------------------------------------|
//! | `[build]`   | Content/template/output paths, ignores, base URL   |
//! | `[serve]`   | Preview server (port, interface, regeneration)     |
//! | `[locals]`  | User-defined values handed to every view           |
//!
//! # Example
//!
//! ```toml
//! [build]
//! contents = "contents"
//! output = "build"
//! ignore = ["**/*.psd"]
//!
//! [serve]
//! port = 8080
//!
//! [locals]
//! name = "My Site"
//! ```

mod build;
pub mod defaults;
mod error;
mod serve;

pub use build::BuildConfig;
pub use error::ConfigError;
pub use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use anyhow::{Context, Result, bail};
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Locals handed to every view.
pub type Locals = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure representing thicket.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Preview server settings
    #[serde(default)]
    pub serve: ServeConfig,

    /// User-defined locals
    #[serde(default)]
    pub locals: Locals,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content).map_err(ConfigError::Toml)?;
        Ok(config)
    }

    /// Load configuration from file path
    pub fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Load, apply CLI overrides and validate.
    ///
    /// A missing config file is not an error: defaults are used instead.
    pub fn load(cli: &Cli) -> Result<Self> {
        let root = cli.root.clone().unwrap_or_else(|| PathBuf::from("./"));
        let config_path = root.join(&cli.config);

        let mut config = if config_path.exists() {
            Self::from_path(&config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?
        } else {
            Self::default()
        };
        config.update_with_cli(cli, &root);
        config.validate()?;
        Ok(config)
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        self.build.root.as_deref().unwrap_or(Path::new("./"))
    }

    /// Set the root directory path
    pub fn set_root(&mut self, path: &Path) {
        self.build.root = Some(path.to_path_buf());
    }

    /// Hash of the config file content, `None` if it cannot be read.
    ///
    /// Used to tell a real edit apart from a save that changed nothing.
    pub fn content_hash(&self) -> Option<blake3::Hash> {
        fs::read(&self.config_path)
            .ok()
            .map(|content| blake3::hash(&content))
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli, root: &Path) {
        Self::update_option(&mut self.build.contents, cli.contents.as_ref());

        match &cli.command {
            Commands::Build { output, clean } => {
                Self::update_option(&mut self.build.output, output.as_ref());
                self.build.clean |= *clean;
            }
            Commands::Preview { interface, port } => {
                Self::update_option(&mut self.serve.interface, interface.as_ref());
                Self::update_option(&mut self.serve.port, port.as_ref());
            }
        }

        let root = Self::normalize_path(root);
        self.config_path = Self::normalize_path(&root.join(&cli.config));
        self.update_path_with_root(&root);
    }

    /// Update config option if CLI value is provided
    fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
        if let Some(option) = cli_option {
            *config_option = option.clone();
        }
    }

    /// Resolve all directory paths against the root and normalize to absolute paths
    pub fn update_path_with_root(&mut self, root: &Path) {
        self.set_root(root);

        self.build.contents = Self::normalize_path(&root.join(&self.build.contents));
        self.build.templates = Self::normalize_path(&root.join(&self.build.templates));
        self.build.output = Self::normalize_path(&root.join(&self.build.output));
        self.build.views = self
            .build
            .views
            .as_ref()
            .map(|views| Self::normalize_path(&root.join(views)));
        self.build.locals_file = self
            .build
            .locals_file
            .as_ref()
            .map(|file| Self::normalize_path(&root.join(file)));
    }

    /// Normalize a path to absolute, using canonicalize if the path exists
    fn normalize_path(path: &Path) -> PathBuf {
        path.canonicalize().unwrap_or_else(|_| {
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                std::env::current_dir()
                    .map(|cwd| cwd.join(path))
                    .unwrap_or_else(|_| path.to_path_buf())
            }
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        let base_url = &self.build.base_url;
        if !(base_url.starts_with('/') || base_url.starts_with("http")) {
            bail!(ConfigError::Validation(
                "[build.base_url] must start with `/` or http(s)://".into()
            ));
        }

        if self.build.file_limit == 0 {
            bail!(ConfigError::Validation(
                "[build.file_limit] must be greater than zero".into()
            ));
        }

        for pattern in &self.build.ignore {
            if let Err(err) = glob::Pattern::new(pattern) {
                bail!(ConfigError::Validation(format!(
                    "[build.ignore] invalid glob `{pattern}`: {err}"
                )));
            }
        }

        if !self.build.contents.is_dir() {
            bail!(ConfigError::Validation(format!(
                "[build.contents] `{}` is not a directory",
                self.build.contents.display()
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
