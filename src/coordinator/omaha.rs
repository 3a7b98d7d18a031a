//! Nebraska client speaking Omaha over HTTP

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::protocol::{AppIdentity, Request, Response};
use super::{CoordinatorError, Progress, UpdateCoordinator, UpdateInfo};
use crate::version::strip_v;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Omaha client bound to one application, channel and instance
pub struct OmahaClient {
    http: Client,
    server: String,
    app_id: String,
    channel: String,
    instance_id: String,
    instance_version: String,
}

impl OmahaClient {
    pub fn new(
        server: impl Into<String>,
        app_id: impl Into<String>,
        channel: impl Into<String>,
        instance_id: impl Into<String>,
        instance_version: &str,
    ) -> Result<Self, CoordinatorError> {
        let server = server.into();
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|source| CoordinatorError::Http {
                url: server.clone(),
                source,
            })?;

        Ok(Self {
            http,
            server,
            app_id: app_id.into(),
            channel: channel.into(),
            instance_id: instance_id.into(),
            instance_version: strip_v(instance_version).to_string(),
        })
    }

    fn identity(&self) -> AppIdentity<'_> {
        AppIdentity {
            app_id: &self.app_id,
            version: &self.instance_version,
            track: &self.channel,
            machine_id: &self.instance_id,
        }
    }

    async fn send(&self, request: Request) -> Result<Response, CoordinatorError> {
        let body = request.to_xml()?;
        tracing::trace!("Omaha request: {}", body);

        let http_error = |source| CoordinatorError::Http {
            url: self.server.clone(),
            source,
        };

        let response = self
            .http
            .post(&self.server)
            .header(reqwest::header::CONTENT_TYPE, "text/xml")
            .body(body)
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        let text = response.text().await.map_err(http_error)?;
        tracing::trace!("Omaha response ({}): {}", status, text);

        if !status.is_success() {
            return Err(CoordinatorError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        Response::from_xml(&text)
    }
}

#[async_trait]
impl UpdateCoordinator for OmahaClient {
    async fn check_for_update(&self) -> Result<UpdateInfo, CoordinatorError> {
        tracing::debug!(
            "Checking {} for updates of {} on channel {} (current {})",
            self.server,
            self.app_id,
            self.channel,
            self.instance_version
        );
        let response = self.send(Request::update_check(&self.identity())).await?;
        response.into_update_info()
    }

    async fn report_progress(&self, progress: Progress) -> Result<(), CoordinatorError> {
        tracing::debug!("Reporting progress {}", progress);
        let response = self.send(Request::event(&self.identity(), progress)).await?;
        response.ensure_ok()
    }

    fn instance_version(&self) -> String {
        self.instance_version.clone()
    }

    fn set_instance_version(&mut self, version: &str) {
        self.instance_version = strip_v(version).to_string();
    }
}
