//! Omaha 3.0 wire format
//!
//! Only the subset Nebraska needs: a single `app` per request carrying either
//! an `updatecheck` or an `event`.

use serde::{Deserialize, Serialize};

use super::{CoordinatorError, PackageInfo, Progress, UpdateInfo};

pub const PROTOCOL_VERSION: &str = "3.0";

#[derive(Debug, Serialize)]
#[serde(rename = "request")]
pub struct Request {
    #[serde(rename = "@protocol")]
    pub protocol: &'static str,
    #[serde(rename = "@version")]
    pub updater_version: String,
    pub os: Os,
    pub app: App,
}

#[derive(Debug, Serialize)]
pub struct Os {
    #[serde(rename = "@platform")]
    pub platform: &'static str,
}

#[derive(Debug, Serialize)]
pub struct App {
    #[serde(rename = "@appid")]
    pub app_id: String,
    #[serde(rename = "@version")]
    pub version: String,
    #[serde(rename = "@track")]
    pub track: String,
    #[serde(rename = "@machineid")]
    pub machine_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updatecheck: Option<UpdateCheck>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<Event>,
}

#[derive(Debug, Serialize)]
pub struct UpdateCheck {}

#[derive(Debug, Serialize)]
pub struct Event {
    #[serde(rename = "@eventtype")]
    pub event_type: u32,
    #[serde(rename = "@eventresult")]
    pub event_result: u32,
}

/// Identity of the instance talking to the coordinator
#[derive(Debug, Clone)]
pub struct AppIdentity<'a> {
    pub app_id: &'a str,
    pub version: &'a str,
    pub track: &'a str,
    pub machine_id: &'a str,
}

impl Request {
    fn for_app(identity: &AppIdentity<'_>) -> Self {
        Self {
            protocol: PROTOCOL_VERSION,
            updater_version: format!("nua-{}", env!("CARGO_PKG_VERSION")),
            os: Os { platform: "linux" },
            app: App {
                app_id: identity.app_id.to_string(),
                version: identity.version.to_string(),
                track: identity.track.to_string(),
                machine_id: identity.machine_id.to_string(),
                updatecheck: None,
                event: None,
            },
        }
    }

    pub fn update_check(identity: &AppIdentity<'_>) -> Self {
        let mut request = Self::for_app(identity);
        request.app.updatecheck = Some(UpdateCheck {});
        request
    }

    pub fn event(identity: &AppIdentity<'_>, progress: Progress) -> Self {
        let (event_type, event_result) = progress.omaha_event();
        let mut request = Self::for_app(identity);
        request.app.event = Some(Event {
            event_type,
            event_result,
        });
        request
    }

    pub fn to_xml(&self) -> Result<String, CoordinatorError> {
        let body =
            quick_xml::se::to_string(self).map_err(|e| CoordinatorError::Encode(e.to_string()))?;
        Ok(format!(r#"<?xml version="1.0" encoding="UTF-8"?>{}"#, body))
    }
}

#[derive(Debug, Deserialize)]
pub struct Response {
    #[serde(rename = "@protocol", default)]
    pub protocol: String,
    #[serde(rename = "app", default)]
    pub apps: Vec<AppResponse>,
}

#[derive(Debug, Deserialize)]
pub struct AppResponse {
    #[serde(rename = "@appid", default)]
    pub app_id: String,
    #[serde(rename = "@status", default)]
    pub status: Option<String>,
    #[serde(default)]
    pub updatecheck: Option<UpdateCheckResponse>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCheckResponse {
    #[serde(rename = "@status", default)]
    pub status: String,
    #[serde(default)]
    pub urls: Option<Urls>,
    #[serde(default)]
    pub manifest: Option<Manifest>,
}

#[derive(Debug, Deserialize)]
pub struct Urls {
    #[serde(default)]
    pub url: Vec<Url>,
}

#[derive(Debug, Deserialize)]
pub struct Url {
    #[serde(rename = "@codebase")]
    pub codebase: String,
}

#[derive(Debug, Deserialize)]
pub struct Manifest {
    #[serde(rename = "@version", default)]
    pub version: String,
    #[serde(default)]
    pub packages: Option<Packages>,
}

#[derive(Debug, Deserialize)]
pub struct Packages {
    #[serde(default)]
    pub package: Vec<Package>,
}

#[derive(Debug, Deserialize)]
pub struct Package {
    #[serde(rename = "@name", default)]
    pub name: String,
    #[serde(rename = "$text", default)]
    pub content: Option<String>,
}

impl Response {
    pub fn from_xml(xml: &str) -> Result<Self, CoordinatorError> {
        quick_xml::de::from_str(xml).map_err(|e| CoordinatorError::Decode(e.to_string()))
    }

    fn app(&self) -> Result<&AppResponse, CoordinatorError> {
        let app = self
            .apps
            .first()
            .ok_or_else(|| CoordinatorError::Decode("response has no app element".to_string()))?;
        match app.status.as_deref() {
            None | Some("ok") => Ok(app),
            Some(status) => Err(CoordinatorError::Rejected(format!(
                "app {} status {}",
                app.app_id, status
            ))),
        }
    }

    /// Interpret the response to an update check
    pub fn into_update_info(self) -> Result<UpdateInfo, CoordinatorError> {
        let check = self.app()?.updatecheck.as_ref().ok_or_else(|| {
            CoordinatorError::Decode("response has no updatecheck element".to_string())
        })?;

        match check.status.as_str() {
            "noupdate" => Ok(UpdateInfo::no_update()),
            "ok" => {
                let url = check
                    .urls
                    .as_ref()
                    .and_then(|urls| urls.url.first())
                    .map(|url| url.codebase.clone())
                    .unwrap_or_default();
                let manifest = check.manifest.as_ref().ok_or_else(|| {
                    CoordinatorError::Decode("update has no manifest".to_string())
                })?;
                let package = manifest
                    .packages
                    .as_ref()
                    .and_then(|packages| packages.package.first())
                    .map(|package| PackageInfo {
                        name: package.name.clone(),
                        content: package
                            .content
                            .as_ref()
                            .map(|content| content.trim().to_string())
                            .filter(|content| !content.is_empty()),
                    })
                    .unwrap_or_default();

                Ok(UpdateInfo {
                    has_update: true,
                    version: manifest.version.clone(),
                    url,
                    package,
                })
            }
            other => Err(CoordinatorError::Rejected(format!(
                "updatecheck status {}",
                other
            ))),
        }
    }

    /// Check that an event was accepted
    pub fn ensure_ok(&self) -> Result<(), CoordinatorError> {
        self.app().map(|_| ())
    }
}
