//! Configuration schema definitions
//!
//! Defines the structure of the settings file using serde for serialization.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::backend::BackendKind;
use crate::descriptor::DescriptorFormat;

/// Version a cluster reports before its first update
const CLUSTER_INITIAL_VERSION: &str = "0.0.0";
/// Version a node reports before its first update
const NODE_INITIAL_VERSION: &str = "0.0.1";

/// Startup settings, immutable once loaded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Omaha endpoint of the Nebraska server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Nebraska assigned application ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,

    /// Channel to follow (stable, beta, alpha)
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Poll interval in seconds
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,

    /// Use a random instance id instead of the cluster identity
    #[serde(default)]
    pub dev: bool,

    #[serde(default)]
    pub backend: BackendKind,

    #[serde(default)]
    pub descriptor_format: DescriptorFormat,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Env file rewritten by the host config backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env_path: Option<PathBuf>,

    /// Fixed instance id reported to the coordinator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Version assumed before the first successful update, see
    /// [`Settings::initial_version`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_version: Option<String>,

    #[serde(default)]
    pub readiness: ReadinessConfig,
}

/// Readiness polling after an update was applied
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReadinessConfig {
    #[serde(default = "default_readiness_interval")]
    pub interval_seconds: u64,

    #[serde(default = "default_readiness_timeout")]
    pub timeout_seconds: u64,
}

fn default_channel() -> String {
    "stable".to_string()
}

fn default_interval_seconds() -> u64 {
    60
}

fn default_readiness_interval() -> u64 {
    10
}

fn default_readiness_timeout() -> u64 {
    600
}

impl Settings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    /// Configured initial version, else the default of the selected backend
    pub fn initial_version(&self) -> &str {
        self.initial_version
            .as_deref()
            .unwrap_or(match self.backend {
                BackendKind::GitOps => CLUSTER_INITIAL_VERSION,
                BackendKind::Container | BackendKind::HostConfig => NODE_INITIAL_VERSION,
            })
    }
}

impl ReadinessConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: None,
            app_id: None,
            channel: default_channel(),
            interval_seconds: default_interval_seconds(),
            dev: false,
            backend: BackendKind::default(),
            descriptor_format: DescriptorFormat::default(),
            kubeconfig: None,
            env_path: None,
            instance_id: None,
            initial_version: None,
            readiness: ReadinessConfig::default(),
        }
    }
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_readiness_interval(),
            timeout_seconds: default_readiness_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.channel, "stable");
        assert_eq!(settings.backend, BackendKind::GitOps);
        assert_eq!(settings.readiness.timeout(), Duration::from_secs(600));
        assert_eq!(settings.readiness.interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_initial_version_depends_on_backend() {
        let mut settings = Settings::default();
        assert_eq!(settings.initial_version(), "0.0.0");

        settings.backend = BackendKind::Container;
        assert_eq!(settings.initial_version(), "0.0.1");

        settings.initial_version = Some("1.4.0".to_string());
        assert_eq!(settings.initial_version(), "1.4.0");
    }

    #[test]
    fn test_settings_deserialization() {
        let yaml = r#"
server: https://nebraska.example.com/v1/update/
appId: io.example.app
channel: beta
intervalSeconds: 30
backend: hostConfig
descriptorFormat: structured
envPath: /etc/app/app.env
readiness:
  timeoutSeconds: 120
"#;
        let settings: Settings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings.app_id.as_deref(), Some("io.example.app"));
        assert_eq!(settings.channel, "beta");
        assert_eq!(settings.interval(), Duration::from_secs(30));
        assert_eq!(settings.backend, BackendKind::HostConfig);
        assert_eq!(settings.descriptor_format, DescriptorFormat::Structured);
        assert_eq!(settings.readiness.timeout_seconds, 120);
        assert_eq!(settings.readiness.interval_seconds, 10);
    }

    #[test]
    fn test_settings_serialization() {
        let yaml = serde_yaml::to_string(&Settings::default()).unwrap();
        assert!(yaml.contains("intervalSeconds"));
        assert!(yaml.contains("descriptorFormat"));
        assert!(!yaml.contains("appId"));
    }
}
