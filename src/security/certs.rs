use crate::cluster_config::{normalize_identity, IdentityKind};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// A certificate found in a node's store by the installed-certificate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledCertificate {
    pub node: String,
    pub store_name: String,
    pub thumbprint: String,
    pub subject_common_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer_thumbprint: Option<String>,
    pub not_before: SystemTime,
    pub not_after: SystemTime,
    #[serde(default)]
    pub revoked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateValidity {
    Valid,
    NotYetValid,
    Expired,
    Revoked,
}

impl InstalledCertificate {
    pub fn new(
        node: impl Into<String>,
        store_name: impl Into<String>,
        thumbprint: impl Into<String>,
        subject_common_name: impl Into<String>,
        not_before: SystemTime,
        not_after: SystemTime,
    ) -> Self {
        Self {
            node: node.into(),
            store_name: store_name.into(),
            thumbprint: thumbprint.into(),
            subject_common_name: subject_common_name.into(),
            issuer_thumbprint: None,
            not_before,
            not_after,
            revoked: false,
        }
    }

    pub fn issued_by(mut self, issuer_thumbprint: impl Into<String>) -> Self {
        self.issuer_thumbprint = Some(issuer_thumbprint.into());
        self
    }

    pub fn revoked(mut self) -> Self {
        self.revoked = true;
        self
    }

    pub fn validity_at(&self, now: SystemTime) -> CertificateValidity {
        if self.revoked {
            CertificateValidity::Revoked
        } else if now < self.not_before {
            CertificateValidity::NotYetValid
        } else if now > self.not_after {
            CertificateValidity::Expired
        } else {
            CertificateValidity::Valid
        }
    }

    pub fn is_valid_at(&self, now: SystemTime) -> bool {
        self.validity_at(now) == CertificateValidity::Valid
    }

    /// Whether this certificate answers to `value` under the given identity
    /// mechanism. `value` may be in any case or padding.
    pub fn matches(&self, kind: IdentityKind, value: &str) -> bool {
        let wanted = normalize_identity(kind, value);
        match kind {
            IdentityKind::Thumbprint => normalize_identity(kind, &self.thumbprint) == wanted,
            IdentityKind::CommonName => {
                normalize_identity(kind, &self.subject_common_name) == wanted
            }
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CertificateLookupError {
    #[error("certificate store {0} is unavailable")]
    StoreUnavailable(String),
    #[error("certificate store {0} does not exist")]
    UnknownStore(String),
    #[error("certificate lookup timed out after {0:?}")]
    Timeout(Duration),
}

impl CertificateLookupError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, CertificateLookupError::UnknownStore(_))
    }
}

/// Read-only access to certificates installed across the fleet.
pub trait CertificateLookup: Send + Sync {
    fn installed(
        &self,
        store_name: &str,
        kind: IdentityKind,
        value: &str,
    ) -> Result<Vec<InstalledCertificate>, CertificateLookupError>;
}

/// In-memory inventory, used when the caller has already gathered the
/// installed certificates.
#[derive(Debug, Clone, Default)]
pub struct CertificateInventory {
    certificates: Vec<InstalledCertificate>,
}

impl CertificateInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, certificate: InstalledCertificate) -> Self {
        self.certificates.push(certificate);
        self
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }
}

impl CertificateLookup for CertificateInventory {
    fn installed(
        &self,
        store_name: &str,
        kind: IdentityKind,
        value: &str,
    ) -> Result<Vec<InstalledCertificate>, CertificateLookupError> {
        Ok(self
            .certificates
            .iter()
            .filter(|cert| cert.store_name.eq_ignore_ascii_case(store_name.trim()))
            .filter(|cert| cert.matches(kind, value))
            .cloned()
            .collect())
    }
}
