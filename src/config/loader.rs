//! Settings loading and merging logic
//!
//! Handles loading settings from multiple sources and merging them
//! according to precedence rules.

use super::{defaults, paths, schema::Settings};
use crate::descriptor::DescriptorFormat;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Values given on the command line; `None` leaves the lower layers alone
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub server: Option<String>,
    pub app_id: Option<String>,
    pub channel: Option<String>,
    pub interval_seconds: Option<u64>,
    pub dev: bool,
    pub backend: Option<crate::backend::BackendKind>,
    pub descriptor_format: Option<DescriptorFormat>,
    pub kubeconfig: Option<PathBuf>,
    pub env_path: Option<PathBuf>,
    pub instance_id: Option<String>,
}

/// Settings loader
pub struct SettingsLoader;

impl SettingsLoader {
    /// Load settings with all layers merged
    ///
    /// Precedence order (highest to lowest):
    /// 1. Command line overrides
    /// 2. NUA_* environment variables
    /// 3. Settings file (`path`, or the default location if it exists)
    /// 4. Built-in defaults
    pub fn load(path: Option<&Path>, overrides: &SettingsOverrides) -> Result<Settings> {
        let mut settings = match path {
            Some(path) => Self::load_file(path)?,
            None => {
                let default_path = paths::settings_path();
                if default_path.exists() {
                    Self::load_file(&default_path)?
                } else {
                    Self::load_defaults()
                }
            }
        };

        settings = Self::apply_env_overrides(settings)?;
        settings = Self::apply_overrides(settings, overrides);
        Self::validate(&settings)?;

        Ok(settings)
    }

    /// Load settings from a file
    pub fn load_file(path: &Path) -> Result<Settings> {
        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let settings: Settings = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Load default settings
    pub fn load_defaults() -> Settings {
        defaults::default_settings()
    }

    /// Apply NUA_* environment variable overrides
    fn apply_env_overrides(mut settings: Settings) -> Result<Settings> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(server) = var("NUA_SERVER") {
            settings.server = Some(server);
        }
        if let Some(app_id) = var("NUA_APP_ID") {
            settings.app_id = Some(app_id);
        }
        if let Some(channel) = var("NUA_CHANNEL") {
            settings.channel = channel;
        }
        if let Some(interval) = var("NUA_INTERVAL_SECONDS") {
            settings.interval_seconds = interval
                .parse()
                .context("NUA_INTERVAL_SECONDS must be a number")?;
        }
        if let Some(dev) = var("NUA_DEV") {
            settings.dev = dev.parse().context("NUA_DEV must be 'true' or 'false'")?;
        }
        if let Some(kubeconfig) = var("NUA_KUBECONFIG") {
            settings.kubeconfig = Some(PathBuf::from(kubeconfig));
        }
        if let Some(env_path) = var("NUA_ENV_PATH") {
            settings.env_path = Some(PathBuf::from(env_path));
        }
        if let Some(instance_id) = var("NUA_INSTANCE_ID") {
            settings.instance_id = Some(instance_id);
        }

        Ok(settings)
    }

    fn apply_overrides(mut settings: Settings, overrides: &SettingsOverrides) -> Settings {
        if let Some(server) = &overrides.server {
            settings.server = Some(server.clone());
        }
        if let Some(app_id) = &overrides.app_id {
            settings.app_id = Some(app_id.clone());
        }
        if let Some(channel) = &overrides.channel {
            settings.channel = channel.clone();
        }
        if let Some(interval) = overrides.interval_seconds {
            settings.interval_seconds = interval;
        }
        settings.dev |= overrides.dev;
        if let Some(backend) = overrides.backend {
            settings.backend = backend;
        }
        if let Some(format) = overrides.descriptor_format {
            settings.descriptor_format = format;
        }
        if let Some(kubeconfig) = &overrides.kubeconfig {
            settings.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(env_path) = &overrides.env_path {
            settings.env_path = Some(env_path.clone());
        }
        if let Some(instance_id) = &overrides.instance_id {
            settings.instance_id = Some(instance_id.clone());
        }
        settings
    }

    /// Reject settings the agent cannot start with
    pub fn validate(settings: &Settings) -> Result<()> {
        let missing = |value: &Option<String>| value.as_deref().is_none_or(|v| v.trim().is_empty());

        if missing(&settings.server) {
            anyhow::bail!("Nebraska server URL is required (--nebraska-server or NUA_SERVER)");
        }
        if missing(&settings.app_id) {
            anyhow::bail!("Application ID is required (--app-id or NUA_APP_ID)");
        }
        if settings.interval_seconds == 0 {
            anyhow::bail!("Poll interval must be greater than zero");
        }
        if settings.readiness.interval_seconds == 0 || settings.readiness.timeout_seconds == 0 {
            anyhow::bail!("Readiness interval and timeout must be greater than zero");
        }
        if settings.backend == crate::backend::BackendKind::HostConfig && settings.env_path.is_none()
        {
            anyhow::bail!("Host config mode requires an env file (--envpath or NUA_ENV_PATH)");
        }
        Ok(())
    }
}
