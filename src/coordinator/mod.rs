//! Update coordinator capability
//!
//! The reconciliation loop asks the coordinator whether a newer version is
//! available and reports installation progress back to it. [`OmahaClient`]
//! implements this against a Nebraska server.

mod omaha;
mod protocol;

pub use omaha::OmahaClient;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

/// Package metadata attached to an update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    /// Update descriptor shipped inline with the package, if any
    pub content: Option<String>,
}

/// Result of a single check-for-update call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateInfo {
    pub has_update: bool,
    pub version: String,
    /// Opaque descriptor URL (the first codebase of the update)
    pub url: String,
    pub package: PackageInfo,
}

impl UpdateInfo {
    pub fn no_update() -> Self {
        Self::default()
    }

    /// Location of the update descriptor document
    ///
    /// A codebase ending in `/` is a directory; the package name is appended.
    pub fn descriptor_url(&self) -> String {
        if self.url.ends_with('/') && !self.package.name.is_empty() {
            format!("{}{}", self.url, self.package.name)
        } else {
            self.url.clone()
        }
    }
}

/// Installation progress reported to the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    DownloadStarted,
    DownloadFinished,
    InstallationStarted,
    InstallationFinished,
    UpdateComplete,
    Error,
}

impl Progress {
    /// Omaha `(eventtype, eventresult)` pair
    pub fn omaha_event(&self) -> (u32, u32) {
        match self {
            Progress::DownloadStarted => (13, 1),
            Progress::DownloadFinished => (14, 1),
            Progress::InstallationStarted => (6, 1),
            Progress::InstallationFinished => (2, 1),
            Progress::UpdateComplete => (3, 2),
            Progress::Error => (3, 0),
        }
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Progress::DownloadStarted => "DownloadStarted",
            Progress::DownloadFinished => "DownloadFinished",
            Progress::InstallationStarted => "InstallationStarted",
            Progress::InstallationFinished => "InstallationFinished",
            Progress::UpdateComplete => "UpdateComplete",
            Progress::Error => "Error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("sending request to {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("coordinator returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("encoding omaha request: {0}")]
    Encode(String),

    #[error("decoding omaha response: {0}")]
    Decode(String),

    #[error("coordinator rejected the request: {0}")]
    Rejected(String),
}

/// Check-for-update and progress reporting against the coordinator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpdateCoordinator: Send + Sync {
    async fn check_for_update(&self) -> Result<UpdateInfo, CoordinatorError>;

    async fn report_progress(&self, progress: Progress) -> Result<(), CoordinatorError>;

    /// Version this instance currently reports
    fn instance_version(&self) -> String;

    /// Version reported by every later request
    fn set_instance_version(&mut self, version: &str);
}
