//! Controller transport
//!
//! Moves serialized request envelopes to the storage controller and returns
//! the raw response body. [`HttpTransport`] posts to the controller's XML
//! request servlet with basic authentication.

use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const FILER_URL_PATH: &str = "/servlets/netapp.servlets.admin.XMLrequest_filer";

/// Transport protocol towards the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    #[default]
    Http,
    Https,
}

impl TransportType {
    pub fn scheme(&self) -> &'static str {
        match self {
            TransportType::Http => "http",
            TransportType::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            TransportType::Http => 80,
            TransportType::Https => 443,
        }
    }
}

/// Port for delivering one request envelope
#[async_trait]
pub trait ControllerTransport: Send + Sync {
    /// Send `body` on behalf of `operation`, returning the response body
    async fn send(&self, operation: &str, body: String) -> Result<String>;
}

/// HTTP(S) transport with basic authentication
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    login: String,
    password: String,
}

impl HttpTransport {
    pub fn new(
        transport_type: TransportType,
        hostname: &str,
        port: Option<u16>,
        login: &str,
        password: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: Self::url(transport_type, hostname, port),
            login: login.to_string(),
            password: password.to_string(),
        })
    }

    fn url(transport_type: TransportType, hostname: &str, port: Option<u16>) -> String {
        format!(
            "{}://{}:{}{}",
            transport_type.scheme(),
            hostname,
            port.unwrap_or_else(|| transport_type.default_port()),
            FILER_URL_PATH
        )
    }
}

#[async_trait]
impl ControllerTransport for HttpTransport {
    async fn send(&self, operation: &str, body: String) -> Result<String> {
        debug!("Sending {} to {}", operation, self.url);

        let response = self
            .client
            .post(&self.url)
            .basic_auth(&self.login, Some(&self.password))
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("{}: {}", operation, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                operation: operation.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url() {
        assert_eq!(
            HttpTransport::url(TransportType::Https, "filer.example", None),
            "https://filer.example:443/servlets/netapp.servlets.admin.XMLrequest_filer"
        );
        assert_eq!(
            HttpTransport::url(TransportType::Http, "10.0.0.1", Some(8080)),
            "http://10.0.0.1:8080/servlets/netapp.servlets.admin.XMLrequest_filer"
        );
    }

    #[test]
    fn test_transport_type_serde() {
        let parsed: TransportType = serde_yaml::from_str("https").unwrap();
        assert_eq!(parsed, TransportType::Https);
        assert_eq!(TransportType::default().scheme(), "http");
    }

    #[tokio::test]
    async fn test_unreachable_controller_is_transient() {
        let transport = HttpTransport::new(
            TransportType::Http,
            "127.0.0.1",
            Some(1),
            "admin",
            "secret",
            Duration::from_secs(2),
        )
        .unwrap();
        let err = transport
            .send("system-get-version", "<netapp/>".into())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
