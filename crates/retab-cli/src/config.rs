//! Configuration file management for retab.
//!
//! Provides a TOML-based config file at `~/.config/retab/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use retab_core::GeminiConfig;

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub backend: BackendSection,
    #[serde(default)]
    pub templates: TemplatesSection,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BackendSection {
    /// Model id; defaults to the bundled adapter's default.
    pub model: Option<String>,
    /// Environment variable holding the API key.
    pub api_key_env: Option<String>,
    /// Endpoint override, mainly for proxies.
    pub endpoint: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TemplatesSection {
    /// Extra template file merged over the built-in presets.
    pub path: Option<String>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the retab config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/retab` or `~/.config/retab`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("retab");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("retab")
}

/// Return the path to the retab config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`. Returns an error if it does
/// not exist.
pub fn load_config_at(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents).context("failed to parse config file")?;
    Ok(config)
}

/// Serialize and write the config file, creating parent dirs as needed.
/// Sets file permissions to 0600 on Unix.
pub fn save_config_at(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

/// Write a starter config file at the default location.
pub fn write_starter_config(force: bool) -> Result<PathBuf> {
    let path = config_path();
    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }
    save_config_at(&path, &ConfigFile::default())?;
    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct RetabConfig {
    pub gemini: GeminiConfig,
    /// Extra template file merged over the presets, when one is configured
    /// or passed on the command line.
    pub templates_path: Option<PathBuf>,
}

impl RetabConfig {
    /// Resolve configuration using the chain:
    /// CLI flag > env var > config file > default.
    ///
    /// - model: `--model` > `RETAB_MODEL` > `backend.model` > adapter default
    /// - api key env: `RETAB_API_KEY_ENV` > `backend.api_key_env` > adapter default
    /// - endpoint: `backend.endpoint` > adapter default
    /// - templates: `--templates` > `RETAB_TEMPLATES` > `templates.path` > none
    pub fn resolve(cli_model: Option<&str>, cli_templates: Option<&Path>) -> Result<Self> {
        Self::resolve_from(load_config_at(&config_path()).ok(), cli_model, cli_templates)
    }

    fn resolve_from(
        file: Option<ConfigFile>,
        cli_model: Option<&str>,
        cli_templates: Option<&Path>,
    ) -> Result<Self> {
        let file = file.unwrap_or_default();
        let mut gemini = GeminiConfig::default();

        if let Some(model) = cli_model
            .map(str::to_string)
            .or_else(|| std::env::var("RETAB_MODEL").ok())
            .or(file.backend.model)
        {
            gemini.model = model;
        }
        if let Some(api_key_env) = std::env::var("RETAB_API_KEY_ENV")
            .ok()
            .or(file.backend.api_key_env)
        {
            gemini.api_key_env = api_key_env;
        }
        if let Some(endpoint) = file.backend.endpoint {
            gemini.endpoint = endpoint;
        }

        let templates_path = cli_templates
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("RETAB_TEMPLATES").ok().map(PathBuf::from))
            .or(file.templates.path.map(PathBuf::from));

        Ok(Self {
            gemini,
            templates_path,
        })
    }
}
