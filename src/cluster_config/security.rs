use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Mechanism nodes use to recognise each other's cluster certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdentityKind {
    Thumbprint,
    CommonName,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKind::Thumbprint => f.write_str("thumbprint"),
            IdentityKind::CommonName => f.write_str("common-name"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateIdentity {
    /// Thumbprint or subject common name, depending on the owning set's kind.
    pub value: String,
    /// Pinned issuers for common-name identities. Empty means any trusted issuer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issuer_thumbprints: Vec<String>,
}

impl CertificateIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            issuer_thumbprints: Vec::new(),
        }
    }

    pub fn with_issuers<I, S>(mut self, issuers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.issuer_thumbprints = issuers.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateIdentitySet {
    pub kind: IdentityKind,
    pub store_name: String,
    pub identities: Vec<CertificateIdentity>,
}

impl CertificateIdentitySet {
    pub fn thumbprints<I, S>(store_name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind: IdentityKind::Thumbprint,
            store_name: store_name.into(),
            identities: values.into_iter().map(CertificateIdentity::new).collect(),
        }
    }

    pub fn common_names(
        store_name: impl Into<String>,
        identities: Vec<CertificateIdentity>,
    ) -> Self {
        Self {
            kind: IdentityKind::CommonName,
            store_name: store_name.into(),
            identities,
        }
    }

    /// Distinct identity values in their comparison form. Thumbprints compare
    /// case-insensitively, common names exactly.
    pub fn normalized_values(&self) -> BTreeSet<String> {
        self.identities
            .iter()
            .map(|identity| normalize(self.kind, &identity.value))
            .collect()
    }

    pub fn find(&self, normalized: &str) -> Option<&CertificateIdentity> {
        self.identities
            .iter()
            .find(|identity| normalize(self.kind, &identity.value) == normalized)
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

pub(crate) fn normalize(kind: IdentityKind, value: &str) -> String {
    let trimmed = value.trim();
    match kind {
        IdentityKind::Thumbprint => trimmed.to_ascii_uppercase(),
        IdentityKind::CommonName => trimmed.to_string(),
    }
}

/// Issuer certificate store pinned by issuer common name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerStore {
    pub issuer_common_name: String,
    pub store_names: Vec<String>,
}

impl IssuerStore {
    pub fn new<I, S>(issuer_common_name: impl Into<String>, store_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            issuer_common_name: issuer_common_name.into(),
            store_names: store_names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn normalized_stores(&self) -> BTreeSet<String> {
        self.store_names
            .iter()
            .map(|store| store.trim().to_string())
            .filter(|store| !store.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_certificate: Option<CertificateIdentitySet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issuer_stores: Vec<IssuerStore>,
}

impl SecurityDescriptor {
    pub fn unsecured() -> Self {
        Self::default()
    }

    pub fn with_certificate(set: CertificateIdentitySet) -> Self {
        Self {
            cluster_certificate: Some(set),
            issuer_stores: Vec::new(),
        }
    }

    /// The cluster certificate set, treating an empty set as absent.
    pub fn cluster_identities(&self) -> Option<&CertificateIdentitySet> {
        self.cluster_certificate
            .as_ref()
            .filter(|set| !set.is_empty())
    }

    pub fn is_certificate_secured(&self) -> bool {
        self.cluster_identities().is_some()
    }
}
