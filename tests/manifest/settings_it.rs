use std::sync::Arc;
use std::time::{Duration, SystemTime};
use toposhift::{
    AddonFeature, AdminConfig, CertificateIdentity, CertificateIdentitySet, CertificateInventory,
    CredentialCache, InstalledCertificate, Node, NodeType, ReliabilityLevel, SecurityDescriptor,
    SettingsGenerator, UserConfig,
};

fn nodes() -> Vec<Node> {
    vec![
        Node::new("n1", "10.0.0.1", "fd:/dc1", "ud1", "primary").as_seed(),
        Node::new("n2", "10.0.0.2", "fd:/dc2", "ud2", "primary").as_seed(),
        Node::new("n3", "10.0.0.3", "fd:/dc3", "ud3", "primary").as_seed(),
        Node::new("n4", "10.0.0.4", "fd:/dc4", "ud4", "primary"),
    ]
}

fn user() -> UserConfig {
    let mut user = UserConfig::new("prod", "3.0");
    user.node_types.push(NodeType::primary("primary"));
    user.reliability_level = ReliabilityLevel::Bronze;
    user
}

fn installed(node: &str, thumbprint: &str) -> InstalledCertificate {
    let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    InstalledCertificate::new(
        node,
        "My",
        thumbprint,
        "cluster.example",
        now - Duration::from_secs(3_600),
        now + Duration::from_secs(3_600),
    )
}

fn generator(inventory: CertificateInventory) -> SettingsGenerator {
    SettingsGenerator::new(Arc::new(CredentialCache::new(Arc::new(inventory))))
}

#[test]
fn unsecured_cluster_gets_plain_sections() {
    let manifest = generator(CertificateInventory::new())
        .render(&user(), &AdminConfig::new("7"), 12, &nodes())
        .unwrap();

    assert_eq!(manifest.version, 12);
    assert_eq!(manifest.config_version, "3.0");
    assert_eq!(manifest.admin_version, "7");
    let federation = manifest.section("Federation").unwrap();
    assert_eq!(federation.get("NodeCount"), Some("4"));
    assert_eq!(federation.get("SeedNodeCount"), Some("3"));
    let security = manifest.section("Security").unwrap();
    assert_eq!(security.get("ClusterCredentialType"), Some("None"));
    assert!(security.get("ClusterCertThumbprints").is_none());
    let cluster_manager = manifest.section("ClusterManager").unwrap();
    assert_eq!(cluster_manager.get("TargetReplicaSetSize"), Some("3"));
}

#[test]
fn common_name_identity_resolves_installed_thumbprints() {
    let inventory = CertificateInventory::new()
        .with(installed("n1", "bb22"))
        .with(installed("n2", "aa11"))
        .with(installed("n3", "AA11"));
    let generator = generator(inventory);
    let mut user = user();
    user.security = SecurityDescriptor::with_certificate(CertificateIdentitySet::common_names(
        "My",
        vec![CertificateIdentity::new("cluster.example")],
    ));

    let manifest = generator
        .render(&user, &AdminConfig::new("1"), 1, &nodes())
        .unwrap();
    let security = manifest.section("Security").unwrap();
    assert_eq!(security.get("ClusterCredentialType"), Some("X509"));
    assert_eq!(security.get("ClusterIdentityKind"), Some("common-name"));
    assert_eq!(security.get("ClusterCertificateStore"), Some("My"));
    assert_eq!(security.get("ClusterCertThumbprints"), Some("AA11,BB22"));
    assert_eq!(security.get("ClusterCertCommonNames"), Some("cluster.example"));
    assert_eq!(generator.credential_cache().len(), 1);

    generator
        .render(&user, &AdminConfig::new("1"), 2, &nodes())
        .unwrap();
    assert_eq!(generator.credential_cache().len(), 1);
}

#[test]
fn thumbprint_identity_needs_no_lookup() {
    let generator = generator(CertificateInventory::new());
    let mut user = user();
    user.security = SecurityDescriptor::with_certificate(CertificateIdentitySet::thumbprints(
        "My",
        ["ff00", "0a0b"],
    ));
    let manifest = generator
        .render(&user, &AdminConfig::new("1"), 1, &nodes())
        .unwrap();
    let security = manifest.section("Security").unwrap();
    assert_eq!(security.get("ClusterIdentityKind"), Some("thumbprint"));
    assert_eq!(security.get("ClusterCertThumbprints"), Some("0A0B,FF00"));
    assert!(security.get("ClusterCertCommonNames").is_none());
    assert!(generator.credential_cache().is_empty());
}

#[test]
fn addons_and_admin_overrides_are_applied() {
    let mut user = user();
    user.addon_features.insert(AddonFeature::DnsService);
    let admin = AdminConfig::new("2")
        .with_setting("NamingService", "TargetReplicaSetSize", "7")
        .with_setting("Diagnostics", "ProducerInstances", "etw");

    let manifest = generator(CertificateInventory::new())
        .render(&user, &admin, 1, &nodes())
        .unwrap();
    assert_eq!(
        manifest.section("DnsService").unwrap().get("IsEnabled"),
        Some("true")
    );
    let naming = manifest.section("NamingService").unwrap();
    assert_eq!(naming.get("TargetReplicaSetSize"), Some("7"));
    assert_eq!(naming.get("MinReplicaSetSize"), Some("3"));
    assert_eq!(
        manifest.section("Diagnostics").unwrap().get("ProducerInstances"),
        Some("etw")
    );
    let names: Vec<_> = manifest.settings.iter().map(|s| s.name.as_str()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn scale_min_nodes_share_an_address_on_distinct_ports() {
    let local: Vec<Node> = (1..=3)
        .map(|i| Node::new(format!("n{i}"), "127.0.0.1", format!("fd:/{i}"), i.to_string(), "primary"))
        .collect();
    let manifest = generator(CertificateInventory::new())
        .render(&user(), &AdminConfig::new("1"), 1, &local)
        .unwrap();
    let ports: Vec<u16> = manifest
        .nodes
        .iter()
        .map(|node| node.endpoints.cluster_connection)
        .collect();
    assert_eq!(ports, vec![19001, 19011, 19021]);
}

#[test]
fn port_overflow_is_rejected() {
    let mut user = user();
    user.node_types[0].endpoints.http_gateway = 65_530;
    let local: Vec<Node> = (1..=2)
        .map(|i| Node::new(format!("n{i}"), "127.0.0.1", format!("fd:/{i}"), i.to_string(), "primary"))
        .collect();
    let err = generator(CertificateInventory::new())
        .render(&user, &AdminConfig::new("1"), 1, &local)
        .unwrap_err();
    assert_eq!(err.code(), "port-overflow");
}

#[test]
fn digest_tracks_content_only() {
    let generator = generator(CertificateInventory::new());
    let first = generator
        .render(&user(), &AdminConfig::new("1"), 5, &nodes())
        .unwrap();
    let mut reversed = nodes();
    reversed.reverse();
    let again = generator
        .render(&user(), &AdminConfig::new("1"), 5, &reversed)
        .unwrap();
    assert_eq!(first.digest(), again.digest());
    assert_eq!(first.digest().map(str::len), Some(64));

    let bumped = generator
        .render(&user(), &AdminConfig::new("2"), 5, &nodes())
        .unwrap();
    assert_ne!(first.digest(), bumped.digest());
}
