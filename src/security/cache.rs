use super::certs::{CertificateLookup, CertificateLookupError, InstalledCertificate};
use crate::cluster_config::{normalize_identity, IdentityKind};
use log::debug;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

type CacheKey = (String, IdentityKind, String);

/// Memoizes installed-certificate lookups for the lifetime of one planning
/// pass. Shared between the rotation validator and the settings generator by
/// handing both the same `Arc`.
pub struct CredentialCache {
    lookup: Arc<dyn CertificateLookup>,
    entries: Mutex<HashMap<CacheKey, Vec<InstalledCertificate>>>,
}

impl CredentialCache {
    pub fn new(lookup: Arc<dyn CertificateLookup>) -> Self {
        Self {
            lookup,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Failed lookups are not cached so a later attempt reaches the store again.
    pub fn installed(
        &self,
        store_name: &str,
        kind: IdentityKind,
        value: &str,
    ) -> Result<Vec<InstalledCertificate>, CertificateLookupError> {
        let key = (
            store_name.trim().to_ascii_lowercase(),
            kind,
            normalize_identity(kind, value),
        );
        if let Some(hit) = self.entries.lock().get(&key) {
            return Ok(hit.clone());
        }
        let found = self.lookup.installed(store_name, kind, value)?;
        debug!(
            "event=credential_cache_fill store={} kind={} value={} certificates={}",
            store_name,
            kind,
            key.2,
            found.len()
        );
        self.entries.lock().insert(key, found.clone());
        Ok(found)
    }

    /// Installed thumbprints for an identity, uppercased and deduplicated.
    pub fn resolve_thumbprints(
        &self,
        store_name: &str,
        kind: IdentityKind,
        value: &str,
    ) -> Result<Vec<String>, CertificateLookupError> {
        if kind == IdentityKind::Thumbprint {
            return Ok(vec![normalize_identity(kind, value)]);
        }
        Ok(self
            .installed(store_name, kind, value)?
            .into_iter()
            .map(|cert| normalize_identity(IdentityKind::Thumbprint, &cert.thumbprint))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCache")
            .field("entries", &self.len())
            .finish()
    }
}
