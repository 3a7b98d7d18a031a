//! Update descriptor decoding
//!
//! The coordinator hands out an opaque URL per release. Depending on the
//! configured [`DescriptorFormat`] it either carries the deployment inline as
//! base64 query parameters, or points at a YAML document listing packages.

mod fetch;
mod query;
mod structured;

pub use fetch::{FETCH_TIMEOUT, fetch_descriptor, http_client};
pub use query::{QueryDescriptor, decode_query_descriptor};
pub use structured::{
    DeploymentSpec, PackageSource, PackageSpec, UpdateConfig, parse_update_config,
};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Query parameter carrying the Git commit
pub const COMMIT_PARAM: &str = "nua_commit";
/// Query parameter carrying the target namespace
pub const NAMESPACE_PARAM: &str = "nua_namespace";
/// Query parameter carrying the Kustomization spec fragment
pub const KUSTOMIZE_PARAM: &str = "nua_kustomize_config";

/// Encoding of the update descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "camelCase")]
pub enum DescriptorFormat {
    /// Base64 query parameters on the update URL
    #[default]
    Query,
    /// YAML package list, inline or fetched from the update URL
    Structured,
}

impl fmt::Display for DescriptorFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorFormat::Query => f.write_str("query"),
            DescriptorFormat::Structured => f.write_str("structured"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("parsing update URL {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("update URL has no host")]
    MissingHost,

    #[error("query parameter {0} is missing or empty")]
    MissingParameter(&'static str),

    #[error("query parameter {param} is not valid base64")]
    Base64 {
        param: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("query parameter {param} is not valid UTF-8")]
    Utf8 {
        param: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("query parameter {param} decodes to an empty value")]
    EmptyValue { param: &'static str },

    #[error("parsing kustomize config")]
    KustomizeConfig(#[source] serde_yaml::Error),

    #[error("kustomize config has no spec.sourceRef.name")]
    MissingSourceName,

    #[error("parsing update config")]
    UpdateConfig(#[source] serde_yaml::Error),

    #[error("update config lists no packages")]
    NoPackages,

    #[error("package {package}: {reason}")]
    InvalidPackage { package: String, reason: String },

    #[error("building HTTP client")]
    HttpClient(#[source] reqwest::Error),

    #[error("fetching update config from {url}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching update config from {url}: HTTP {status}")]
    FetchStatus { url: String, status: u16 },
}

impl DecodeError {
    fn invalid_package(package: &str, reason: impl Into<String>) -> Self {
        DecodeError::InvalidPackage {
            package: package.to_string(),
            reason: reason.into(),
        }
    }
}
