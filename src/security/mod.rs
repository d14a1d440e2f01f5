//! Installed-certificate access and certificate rotation checks.

mod cache;
mod certs;
mod errors;
mod rotation;

pub use cache::CredentialCache;
pub use certs::{
    CertificateInventory, CertificateLookup, CertificateLookupError, CertificateValidity,
    InstalledCertificate,
};
pub use errors::CertificateRotationError;
pub use rotation::{CertificateRotation, CertificateRotationValidator};
