use super::certs::CertificateLookupError;
use thiserror::Error;

/// Reasons a certificate identity change cannot roll out safely.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CertificateRotationError {
    #[error("certificates cannot be {0}; that changes the authentication mode")]
    AuthenticationModeChange(&'static str),
    #[error("current and target certificate identities share no common value")]
    NoIntersection,
    #[error("issuer thumbprints for {0} share no common value")]
    IssuerThumbprintNoIntersection(String),
    #[error("certificate {identity} is not installed in store {store} on any node")]
    NotInstalled { identity: String, store: String },
    #[error("certificate {0} has no valid installed copy")]
    Invalid(String),
    #[error("current and target issuer stores share no issuer common name")]
    IssuerStoreCnNoIntersection,
    #[error("issuer stores for {0} share no common store name")]
    IssuerStoreNoIntersection(String),
    #[error(transparent)]
    Lookup(#[from] CertificateLookupError),
}

impl CertificateRotationError {
    pub fn code(&self) -> &'static str {
        match self {
            CertificateRotationError::AuthenticationModeChange(_) => "authentication-mode-change",
            CertificateRotationError::NoIntersection => "no-intersection",
            CertificateRotationError::IssuerThumbprintNoIntersection(_) => {
                "issuer-thumbprint-no-intersection"
            }
            CertificateRotationError::NotInstalled { .. } => "not-installed",
            CertificateRotationError::Invalid(_) => "invalid",
            CertificateRotationError::IssuerStoreCnNoIntersection => {
                "issuer-store-cn-no-intersection"
            }
            CertificateRotationError::IssuerStoreNoIntersection(_) => {
                "issuer-store-no-intersection"
            }
            CertificateRotationError::Lookup(_) => "certificate-lookup-failed",
        }
    }

    /// Installation and validity depend on fleet state that an operator can
    /// fix without changing the target.
    pub fn is_retryable(&self) -> bool {
        match self {
            CertificateRotationError::NotInstalled { .. } | CertificateRotationError::Invalid(_) => {
                true
            }
            CertificateRotationError::Lookup(err) => err.is_transient(),
            _ => false,
        }
    }
}
