//! NFS helper of the clustered driver
//!
//! Export rules live on the controller keyed by pathname. The rule API
//! replaces the whole rule set of a pathname on every submit, so allow and
//! deny read the current hosts, edit the lists and write all of them back.

use super::helper::NasHelper;
use crate::domain::export::NfsExport;
use crate::domain::naming::share_name;
use crate::domain::share::{AccessRule, AccessType, Share};
use crate::error::{Error, Result};
use crate::zapi::{ControllerClient, Element};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub struct NfsHelper {
    client: Arc<ControllerClient>,
    bootstrap_host: String,
}

impl NfsHelper {
    pub fn new(client: Arc<ControllerClient>, bootstrap_host: impl Into<String>) -> Self {
        Self {
            client,
            bootstrap_host: bootstrap_host.into(),
        }
    }

    /// Hosts currently granted on `pathname`
    async fn existing_hosts(&self, pathname: &str) -> Result<ExportHosts> {
        let response = self
            .client
            .invoke(Element::new("nfs-exportfs-list-rules-2").with_child_content("pathname", pathname))
            .await?;

        let mut hosts = ExportHosts::default();
        let rule_infos = response
            .results()
            .child("rules")
            .into_iter()
            .flat_map(|rules| rules.children_named("exports-rule-info-2"))
            .filter_map(|info| info.child("security-rules"))
            .flat_map(|rules| rules.children_named("security-rule-info"));

        for rule in rule_infos {
            push_unique(&mut hosts.read_write, hostnames(rule, "read-write"));
            push_unique(&mut hosts.root, hostnames(rule, "root"));
        }

        debug!("Existing export hosts of {}: {:?}", pathname, hosts);
        Ok(hosts)
    }

    /// Replace the rule set of `pathname` with `hosts`
    async fn submit_rules(&self, pathname: &str, hosts: &ExportHosts) -> Result<()> {
        let request = Element::new("nfs-exportfs-append-rules-2")
            .with_child_content("persistent", "true")
            .with_child(export_rules(pathname, &hosts.read_write, &hosts.root));
        self.client.invoke(request).await?;
        Ok(())
    }
}

/// Export of `share`, failing when its location names no host or path
fn known_export(share: &Share) -> Result<NfsExport> {
    let export = NfsExport::parse(share.export_location.as_deref());
    if export.host.is_empty() || export.path.is_empty() {
        return Err(Error::UnknownExportLocation {
            share_id: share.id.clone(),
        });
    }
    Ok(export)
}

/// Read-write and root host lists of one export, kept apart so a host
/// only ever regains the access it had
#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct ExportHosts {
    read_write: Vec<String>,
    root: Vec<String>,
}

impl ExportHosts {
    /// New hosts get read-write and root access
    fn grant(&mut self, hosts: Vec<String>) {
        push_unique(&mut self.read_write, hosts.iter().map(String::as_str));
        push_unique(&mut self.root, hosts.iter().map(String::as_str));
    }

    fn revoke(&mut self, hosts: &[String]) {
        self.read_write.retain(|host| !hosts.contains(host));
        self.root.retain(|host| !hosts.contains(host));
    }
}

fn hostnames<'a>(rule: &'a Element, list: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    rule.child(list)
        .into_iter()
        .flat_map(|list| list.children_named("exports-hostname-info"))
        .filter_map(|info| info.child_content("name"))
}

fn push_unique<'a>(hosts: &mut Vec<String>, names: impl Iterator<Item = &'a str>) {
    for name in names {
        if !hosts.iter().any(|h| h == name) {
            hosts.push(name.to_string());
        }
    }
}

/// `rules` tree granting the listed hosts read-write and root access
pub(crate) fn export_rules(pathname: &str, read_write: &[String], root: &[String]) -> Element {
    let hostname_infos = |hosts: &[String]| -> Vec<Element> {
        hosts
            .iter()
            .map(|host| Element::new("exports-hostname-info").with_child_content("name", host.as_str()))
            .collect()
    };
    let security_rule = Element::new("security-rule-info")
        .with_child(Element::new("read-write").with_children(hostname_infos(read_write)))
        .with_child(Element::new("root").with_children(hostname_infos(root)));

    Element::new("rules").with_child(
        Element::new("exports-rule-info-2")
            .with_child_content("pathname", pathname)
            .with_child(Element::new("security-rules").with_child(security_rule)),
    )
}

#[async_trait]
impl NasHelper for NfsHelper {
    async fn create_share(&self, target: &str, share: &Share) -> Result<String> {
        let pathname = format!("/vol/{}", share_name(&share.id));
        info!("Creating NFS export {} on {}", pathname, target);

        let bootstrap = [self.bootstrap_host.clone()];
        let request = Element::new("nfs-exportfs-append-rules-2")
            .with_child(export_rules(&pathname, &bootstrap, &bootstrap));
        self.client.invoke(request).await?;

        Ok(NfsExport::new(target, pathname).location())
    }

    async fn delete_share(&self, share: &Share) -> Result<()> {
        let export = known_export(share)?;
        info!("Deleting NFS export {}", export.path);

        let request = Element::new("nfs-exportfs-delete-rules").with_child(
            Element::new("pathnames")
                .with_child(Element::new("pathname-info").with_child_content("name", export.path)),
        );
        self.client.invoke(request).await?;
        Ok(())
    }

    async fn allow_access(&self, share: &Share, access: &AccessRule) -> Result<()> {
        access.require(AccessType::Ip, share.share_proto)?;
        let export = known_export(share)?;

        let mut hosts = self.existing_hosts(&export.path).await?;
        hosts.grant(access.targets());

        info!("Allowing {} on {}", access.access_to, export.path);
        self.submit_rules(&export.path, &hosts).await
    }

    async fn deny_access(&self, share: &Share, access: &AccessRule) -> Result<()> {
        access.require(AccessType::Ip, share.share_proto)?;
        let export = known_export(share)?;

        let mut hosts = self.existing_hosts(&export.path).await?;
        hosts.revoke(&access.targets());

        info!("Denying {} on {}", access.access_to, export.path);
        self.submit_rules(&export.path, &hosts).await
    }

    fn get_target(&self, share: &Share) -> Option<String> {
        NfsExport::parse(share.export_location.as_deref()).target()
    }
}
