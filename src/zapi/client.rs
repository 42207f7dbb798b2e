//! Remote Controller Protocol Client
//!
//! Wraps an operation tree in the controller envelope, dispatches it through
//! a [`ControllerTransport`] under the retry policy of the invocation layer,
//! and decodes the `results` node of the reply.

use crate::error::{Error, Result};
use crate::placement::PoolCapacities;
use crate::retry::{retry_transient, RetryConfig};
use crate::zapi::codec::{from_xml, to_xml};
use crate::zapi::element::Element;
use crate::zapi::transport::ControllerTransport;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

const NETAPP_NS: &str = "http://www.netapp.com/filer/admin";

// =============================================================================
// API Version
// =============================================================================

/// Controller API version pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersion {
    pub major: u32,
    pub minor: u32,
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self { major: 1, minor: 15 }
    }
}

impl std::fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

// =============================================================================
// Response
// =============================================================================

/// Decoded reply to one operation
#[derive(Debug, Clone)]
pub struct Response {
    operation: String,
    results: Element,
}

impl Response {
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// The `results` node carrying status and payload
    pub fn results(&self) -> &Element {
        &self.results
    }

    pub fn status(&self) -> &str {
        self.results.attr("status").unwrap_or_default()
    }

    pub fn passed(&self) -> bool {
        self.status() == "passed"
    }

    pub fn reason(&self) -> &str {
        self.results.attr("reason").unwrap_or_default()
    }

    pub fn errno(&self) -> &str {
        self.results.attr("errno").unwrap_or_default()
    }

    /// Convert a failed status into `Error::RemoteInvocation`
    pub fn into_checked(self) -> Result<Self> {
        if self.status() == "failed" {
            return Err(Error::remote(&self.operation, self.reason(), self.errno()));
        }
        Ok(self)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Client for the storage controller's request/response API
pub struct ControllerClient {
    transport: Arc<dyn ControllerTransport>,
    api_version: ApiVersion,
    vserver: Option<String>,
    retry: RetryConfig,
}

impl ControllerClient {
    pub fn new(transport: Arc<dyn ControllerTransport>, api_version: ApiVersion, retry: RetryConfig) -> Self {
        Self {
            transport,
            api_version,
            vserver: None,
            retry,
        }
    }

    /// Tunnel all requests to the given vserver
    pub fn with_vserver(mut self, vserver: impl Into<String>) -> Self {
        self.vserver = Some(vserver.into());
        self
    }

    pub fn vserver(&self) -> &str {
        self.vserver.as_deref().unwrap_or_default()
    }

    /// Invoke an operation; a failed status becomes `Error::RemoteInvocation`
    pub async fn invoke(&self, request: Element) -> Result<Response> {
        self.invoke_unchecked(request).await?.into_checked()
    }

    /// Invoke an operation and hand back the reply whatever its status
    pub async fn invoke_unchecked(&self, request: Element) -> Result<Response> {
        let operation = request.name().to_string();
        let body = self.envelope(&request);
        debug!("Invoking {}", operation);

        let raw = retry_transient(&self.retry, &operation, || {
            self.transport.send(&operation, body.clone())
        })
        .await?;

        let response = decode(&operation, &raw)?;
        debug!("{} returned status {}", operation, response.status());
        Ok(response)
    }

    fn envelope(&self, request: &Element) -> String {
        let mut root = Element::new("netapp")
            .with_attr("version", self.api_version.to_string())
            .with_attr("xmlns", NETAPP_NS);
        if let Some(vserver) = &self.vserver {
            root.set_attr("vfiler", vserver.as_str());
        }
        root.add_child(request.clone());
        format!("<?xml version='1.0' encoding='utf-8'?>{}", to_xml(&root))
    }

    /// Free capacity of every aggregate assigned to the vserver, in
    /// controller order
    pub async fn get_available_pools(&self) -> Result<PoolCapacities> {
        const OP: &str = "vserver-get";
        let response = self.invoke(Element::new(OP)).await?;
        let info = response
            .results()
            .require("attributes", OP)?
            .require("vserver-info", OP)?;

        let mut pools = PoolCapacities::new();
        if let Some(list) = info.child("vserver-aggr-info-list") {
            for aggr in list.children_named("vserver-aggr-info") {
                let Some(name) = aggr.child_content("aggr-name") else {
                    continue;
                };
                let avail = aggr.require_content("aggr-availsize", OP)?;
                let avail = avail.trim().parse::<u64>().map_err(|_| {
                    Error::malformed(OP, format!("invalid aggr-availsize {:?} for {}", avail, name))
                })?;
                pools.insert(name.to_string(), avail);
            }
        }

        if pools.is_empty() {
            return Err(Error::NoPoolsAvailable {
                vserver: self.vserver().to_string(),
            });
        }
        debug!("Available aggregates: {:?}", pools);
        Ok(pools)
    }

    /// Address of a controller-known host, or the input if already an address
    pub async fn resolve_host_address(&self, host_or_id: &str) -> Result<Option<String>> {
        if host_or_id.parse::<IpAddr>().is_ok() {
            return Ok(Some(host_or_id.to_string()));
        }

        const OP: &str = "host-list-info-iter-start";
        let start = self
            .invoke(Element::new(OP).with_child_content("object-name-or-id", host_or_id))
            .await?;
        let tag = start.results().require_content("tag", OP)?.to_string();
        let records = start
            .results()
            .child_content("records")
            .and_then(|r| r.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let found = self.fetch_host(&tag, records, host_or_id).await;

        let end = Element::new("host-list-info-iter-end").with_child_content("tag", &tag);
        if let Err(e) = self.invoke(end).await {
            warn!("Failed to close host iterator {}: {}", tag, e);
        }

        found
    }

    async fn fetch_host(&self, tag: &str, records: u64, host_or_id: &str) -> Result<Option<String>> {
        const OP: &str = "host-list-info-iter-next";
        let mut fetched = 0u64;

        while fetched < records {
            let next = Element::new(OP)
                .with_child_content("maximum", (records - fetched).to_string())
                .with_child_content("tag", tag);
            let response = self.invoke(next).await?;

            let hosts: Vec<&Element> = response
                .results()
                .child("hosts")
                .map(|h| h.children_named("host-info").collect())
                .unwrap_or_default();
            if hosts.is_empty() {
                break;
            }
            fetched += hosts.len() as u64;

            let matched = hosts.into_iter().find(|host| {
                host.child_content("host-id") == Some(host_or_id)
                    || host.child_content("host-name") == Some(host_or_id)
            });
            if let Some(host) = matched {
                return Ok(host.child_content("host-address").map(str::to_string));
            }
        }

        Ok(None)
    }
}

fn decode(operation: &str, raw: &str) -> Result<Response> {
    let root = from_xml(raw).map_err(|e| match e {
        Error::MalformedResponse { reason, .. } => Error::malformed(operation, reason),
        other => other,
    })?;

    let results = if root.name() == "results" {
        root
    } else {
        root.require("results", operation)?.clone()
    };

    if results.attr("status").is_none() {
        return Err(Error::malformed(operation, "results carry no status"));
    }

    Ok(Response {
        operation: operation.to_string(),
        results,
    })
}
