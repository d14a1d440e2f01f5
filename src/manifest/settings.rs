//! Derived settings sealed into every manifest.

use super::types::{Manifest, ManifestError, ManifestNode, SettingsSection};
use crate::cluster_config::{AdminConfig, EndpointPorts, IdentityKind, UserConfig};
use crate::config::{DEFAULT_PORT_STRIDE, DEFAULT_SYSTEM_SERVICES};
use crate::security::CredentialCache;
use crate::topology::Node;
use log::debug;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const FEDERATION_SECTION: &str = "Federation";
pub const SECURITY_SECTION: &str = "Security";

#[derive(Debug, Clone)]
pub struct SettingsGenerator {
    cache: Arc<CredentialCache>,
    system_services: Vec<String>,
    port_stride: u16,
}

impl SettingsGenerator {
    pub fn new(cache: Arc<CredentialCache>) -> Self {
        Self {
            cache,
            system_services: DEFAULT_SYSTEM_SERVICES
                .iter()
                .map(|service| service.to_string())
                .collect(),
            port_stride: DEFAULT_PORT_STRIDE,
        }
    }

    pub fn with_system_services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.system_services = services.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_port_stride(mut self, stride: u16) -> Self {
        self.port_stride = stride;
        self
    }

    pub fn credential_cache(&self) -> &Arc<CredentialCache> {
        &self.cache
    }

    /// Builds and seals the manifest for `nodes` at `version`.
    pub fn render<'a, I>(
        &self,
        user: &UserConfig,
        admin: &AdminConfig,
        version: u64,
        nodes: I,
    ) -> Result<Manifest, ManifestError>
    where
        I: IntoIterator<Item = &'a Node>,
    {
        let mut nodes: Vec<&Node> = nodes.into_iter().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        let offsets = self.scale_min_offsets(&nodes);

        let mut entries = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let node_type =
                user.node_type(&node.node_type)
                    .ok_or_else(|| ManifestError::UnknownNodeType {
                        node: node.name.clone(),
                        node_type: node.node_type.clone(),
                    })?;
            let offset = offsets.get(node.name.as_str()).copied().unwrap_or(0);
            let endpoints = shifted(node_type.endpoints, offset)
                .ok_or_else(|| ManifestError::PortOverflow(node.name.clone()))?;
            entries.push(ManifestNode::from_node(node, endpoints));
        }

        let seed_count = entries.iter().filter(|node| node.is_seed).count();
        let mut sections = self.replica_sections(user);
        sections.insert(
            FEDERATION_SECTION.to_string(),
            SettingsSection::new(FEDERATION_SECTION)
                .with("NodeCount", entries.len())
                .with("SeedNodeCount", seed_count),
        );
        sections.insert(SECURITY_SECTION.to_string(), self.security_section(user)?);
        for feature in &user.addon_features {
            let name = feature.to_string();
            sections.insert(name.clone(), SettingsSection::new(name).with("IsEnabled", true));
        }
        for (section, parameters) in &admin.fabric_settings {
            let entry = sections
                .entry(section.clone())
                .or_insert_with(|| SettingsSection::new(section.clone()));
            for (parameter, value) in parameters {
                entry.parameters.insert(parameter.clone(), value.clone());
            }
        }

        debug!(
            "event=manifest_render version={} nodes={} seeds={} sections={} shifted_nodes={}",
            version,
            entries.len(),
            seed_count,
            sections.len(),
            offsets.values().filter(|offset| **offset > 0).count()
        );

        Manifest {
            cluster_name: user.cluster_name.clone(),
            version,
            config_version: user.config_version.clone(),
            admin_version: admin.version.clone(),
            code_version: user.code_version.clone(),
            nodes: entries,
            settings: sections.into_values().collect(),
            content_hash: None,
        }
        .seal()
    }

    fn replica_sections(&self, user: &UserConfig) -> BTreeMap<String, SettingsSection> {
        let size = user.reliability_level.replica_set_size();
        self.system_services
            .iter()
            .map(|service| {
                (
                    service.clone(),
                    SettingsSection::new(service.clone())
                        .with("MinReplicaSetSize", size.min)
                        .with("TargetReplicaSetSize", size.target),
                )
            })
            .collect()
    }

    fn security_section(&self, user: &UserConfig) -> Result<SettingsSection, ManifestError> {
        let Some(set) = user.security.cluster_identities() else {
            return Ok(SettingsSection::new(SECURITY_SECTION).with("ClusterCredentialType", "None"));
        };
        let mut thumbprints = BTreeSet::new();
        for identity in &set.identities {
            thumbprints.extend(self.cache.resolve_thumbprints(
                &set.store_name,
                set.kind,
                &identity.value,
            )?);
        }
        let identities = set.normalized_values().into_iter().collect::<Vec<_>>();
        let mut section = SettingsSection::new(SECURITY_SECTION)
            .with("ClusterCredentialType", "X509")
            .with("ClusterIdentityKind", set.kind)
            .with("ClusterCertificateStore", &set.store_name)
            .with("ClusterCertThumbprints", join(thumbprints));
        if set.kind == IdentityKind::CommonName {
            section = section.with("ClusterCertCommonNames", identities.join(","));
        }
        Ok(section)
    }

    /// Port offsets for nodes sharing an address. Each shared-address group is
    /// ordered by name and its members offset by `index * stride`.
    fn scale_min_offsets<'n>(&self, nodes: &[&'n Node]) -> BTreeMap<&'n str, u32> {
        let mut groups: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for node in nodes {
            groups
                .entry(node.ip_address.as_str())
                .or_default()
                .push(node.name.as_str());
        }
        let mut offsets = BTreeMap::new();
        for members in groups.values().filter(|members| members.len() > 1) {
            for (index, name) in members.iter().enumerate() {
                offsets.insert(*name, index as u32 * u32::from(self.port_stride));
            }
        }
        offsets
    }
}

fn shifted(ports: EndpointPorts, offset: u32) -> Option<EndpointPorts> {
    let highest = [
        ports.client_connection,
        ports.cluster_connection,
        ports.lease_driver,
        ports.service_connection,
        ports.http_gateway,
    ]
    .into_iter()
    .max()
    .unwrap_or(0);
    if u32::from(highest) + offset > u32::from(u16::MAX) {
        return None;
    }
    Some(ports.offset(offset as u16))
}

fn join(values: BTreeSet<String>) -> String {
    values.into_iter().collect::<Vec<_>>().join(",")
}
