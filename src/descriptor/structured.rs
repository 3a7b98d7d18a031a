//! Structured update config
//!
//! ```yaml
//! packages:
//!   - name: app
//!     chart: app
//!     namespace: apps
//!     gitrepo:
//!       url: https://github.com/org/repo
//!       ref: {commit: 9ffef19}
//!   - name: db
//!     chart: postgresql
//!     helmrepo:
//!       url: https://charts.example.com
//!     version: 12.1.0
//! ```

use serde::{Deserialize, Serialize};

use super::DecodeError;
use crate::models::{DEFAULT_NAMESPACE, GitRepositoryRef};
use crate::version::ensure_v;

/// Update config document as written by the release pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UpdateConfig {
    #[serde(default)]
    pub packages: Vec<RawPackage>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawPackage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub chart: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gitrepo: Option<RawGitRepo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helmrepo: Option<RawHelmRepo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawGitRepo {
    pub url: String,
    #[serde(default, rename = "ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<GitRepositoryRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawHelmRepo {
    pub url: String,
}

/// Where a package's chart comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageSource {
    Git {
        url: String,
        reference: GitRepositoryRef,
    },
    Helm {
        url: String,
        version: String,
    },
}

/// A validated package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub name: String,
    pub chart: String,
    pub namespace: String,
    pub source: PackageSource,
}

/// Validated deployment: at least one package, each with exactly one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentSpec {
    pub packages: Vec<PackageSpec>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl RawPackage {
    fn validate(&self, index: usize, update_version: &str) -> Result<PackageSpec, DecodeError> {
        let Some(label) = non_empty(Some(&self.name)) else {
            return Err(DecodeError::invalid_package(
                &format!("#{}", index + 1),
                "name is required",
            ));
        };
        let Some(chart) = non_empty(Some(&self.chart)) else {
            return Err(DecodeError::invalid_package(label, "chart is required"));
        };

        let source = match (&self.gitrepo, &self.helmrepo) {
            (Some(_), Some(_)) => {
                return Err(DecodeError::invalid_package(
                    label,
                    "gitrepo and helmrepo are mutually exclusive",
                ));
            }
            (None, None) => {
                return Err(DecodeError::invalid_package(
                    label,
                    "one of gitrepo or helmrepo is required",
                ));
            }
            (Some(git), None) => {
                let Some(url) = non_empty(Some(&git.url)) else {
                    return Err(DecodeError::invalid_package(label, "gitrepo.url is required"));
                };
                let reference = match &git.reference {
                    Some(reference) if !reference.is_empty() => reference.clone(),
                    _ => {
                        let Some(version) = non_empty(Some(update_version)) else {
                            return Err(DecodeError::invalid_package(
                                label,
                                "gitrepo has no ref and the update has no version",
                            ));
                        };
                        GitRepositoryRef::tag(ensure_v(version))
                    }
                };
                PackageSource::Git {
                    url: url.to_string(),
                    reference,
                }
            }
            (None, Some(helm)) => {
                let Some(url) = non_empty(Some(&helm.url)) else {
                    return Err(DecodeError::invalid_package(label, "helmrepo.url is required"));
                };
                let Some(version) = non_empty(self.version.as_deref()) else {
                    return Err(DecodeError::invalid_package(
                        label,
                        "helmrepo requires a version",
                    ));
                };
                PackageSource::Helm {
                    url: url.to_string(),
                    version: version.to_string(),
                }
            }
        };

        Ok(PackageSpec {
            name: label.to_string(),
            chart: chart.to_string(),
            namespace: non_empty(self.namespace.as_deref())
                .unwrap_or(DEFAULT_NAMESPACE)
                .to_string(),
            source,
        })
    }
}

impl UpdateConfig {
    /// Validate every package; the first invalid one fails the whole document
    pub fn validate(&self, update_version: &str) -> Result<DeploymentSpec, DecodeError> {
        if self.packages.is_empty() {
            return Err(DecodeError::NoPackages);
        }

        let packages = self
            .packages
            .iter()
            .enumerate()
            .map(|(index, package)| package.validate(index, update_version))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(DeploymentSpec { packages })
    }
}

/// Parse and validate a structured update config
///
/// `update_version` is the version the coordinator announced; Git packages
/// without an explicit ref track the tag `v<version>`.
pub fn parse_update_config(
    document: &str,
    update_version: &str,
) -> Result<DeploymentSpec, DecodeError> {
    let config: UpdateConfig =
        serde_yaml::from_str(document).map_err(DecodeError::UpdateConfig)?;
    config.validate(update_version)
}
