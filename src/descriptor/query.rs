//! Query-parameter descriptor
//!
//! `https://github.com/org/repo?nua_commit=..&nua_namespace=..&nua_kustomize_config=..`
//! becomes one GitRepository and one Kustomization sharing a name and
//! namespace.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use url::Url;

use super::{COMMIT_PARAM, DecodeError, KUSTOMIZE_PARAM, NAMESPACE_PARAM};
use crate::models::{
    DEFAULT_INTERVAL, GitRepository, GitRepositoryRef, GitRepositorySpec, Kustomization,
    KustomizationSpec,
};

/// Flux objects described by a query-parameter update URL
#[derive(Debug, Clone, PartialEq)]
pub struct QueryDescriptor {
    pub git_repository: GitRepository,
    pub kustomization: Kustomization,
}

impl QueryDescriptor {
    pub fn namespace(&self) -> &str {
        self.kustomization
            .metadata
            .namespace
            .as_deref()
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct KustomizeFragment {
    spec: KustomizationSpec,
}

fn query_param(url: &Url, param: &'static str) -> Result<String, DecodeError> {
    url.query_pairs()
        .find(|(key, _)| key == param)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
        .ok_or(DecodeError::MissingParameter(param))
}

fn decode_param(url: &Url, param: &'static str) -> Result<String, DecodeError> {
    // An unescaped `+` arrives as a space after form decoding
    let encoded = query_param(url, param)?.trim().replace(' ', "+");
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|source| DecodeError::Base64 { param, source })?;
    let decoded = String::from_utf8(bytes).map_err(|source| DecodeError::Utf8 { param, source })?;
    Ok(decoded)
}

/// Decode a query-parameter update URL
pub fn decode_query_descriptor(encoded_url: &str) -> Result<QueryDescriptor, DecodeError> {
    let url = Url::parse(encoded_url).map_err(|source| DecodeError::InvalidUrl {
        url: encoded_url.to_string(),
        source,
    })?;

    let host = url.host_str().ok_or(DecodeError::MissingHost)?;
    let port = url.port().map(|port| format!(":{}", port)).unwrap_or_default();
    let repo_url = format!(
        "https://{}{}{}",
        host,
        port,
        url.path().trim_end_matches('/')
    );

    let commit = decode_param(&url, COMMIT_PARAM)?.trim().to_string();
    if commit.is_empty() {
        return Err(DecodeError::EmptyValue {
            param: COMMIT_PARAM,
        });
    }
    let namespace = decode_param(&url, NAMESPACE_PARAM)?.trim().to_string();
    if namespace.is_empty() {
        return Err(DecodeError::EmptyValue {
            param: NAMESPACE_PARAM,
        });
    }
    let kustomize_config = decode_param(&url, KUSTOMIZE_PARAM)?;

    tracing::debug!("Update URL decoded for {}", repo_url);

    let fragment: KustomizeFragment =
        serde_yaml::from_str(&kustomize_config).map_err(DecodeError::KustomizeConfig)?;
    let name = fragment.spec.source_ref.name.trim().to_string();
    if name.is_empty() {
        return Err(DecodeError::MissingSourceName);
    }

    let mut kustomization = Kustomization::new(&name, fragment.spec);
    kustomization.metadata.namespace = Some(namespace.clone());

    let mut git_repository = GitRepository::new(
        &name,
        GitRepositorySpec {
            url: repo_url,
            reference: Some(GitRepositoryRef::commit(commit)),
            interval: DEFAULT_INTERVAL.to_string(),
            ..Default::default()
        },
    );
    git_repository.metadata.namespace = Some(namespace);

    Ok(QueryDescriptor {
        git_repository,
        kustomization,
    })
}
