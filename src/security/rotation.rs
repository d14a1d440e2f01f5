//! Trust-continuity checks for rolling certificate identity changes.
//!
//! During a rolling rotation some nodes run the current identity set and
//! others the target. Every pair of nodes must still be able to authenticate
//! each other, so the two sets have to overlap unless the change is a plain
//! one-for-one swap or a switch of identity mechanism.

use super::cache::CredentialCache;
use super::errors::CertificateRotationError;
use crate::cluster_config::{
    normalize_identity, CertificateIdentitySet, IdentityKind, IssuerStore, SecurityDescriptor,
};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::SystemTime;

/// Why a rotation was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateRotation {
    /// Neither side carries certificates.
    Unsecured,
    /// Same identities on both sides.
    Unchanged,
    /// Thumbprint to common name or the reverse.
    MechanismSwitch,
    /// Exactly one identity replaced by exactly one other.
    Swap { from: String, to: String },
    Overlapping {
        added: Vec<String>,
        removed: Vec<String>,
        retained: Vec<String>,
    },
}

impl CertificateRotation {
    pub fn label(&self) -> &'static str {
        match self {
            CertificateRotation::Unsecured => "unsecured",
            CertificateRotation::Unchanged => "unchanged",
            CertificateRotation::MechanismSwitch => "mechanism-switch",
            CertificateRotation::Swap { .. } => "swap",
            CertificateRotation::Overlapping { .. } => "overlapping",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CertificateRotationValidator {
    cache: Arc<CredentialCache>,
}

impl CertificateRotationValidator {
    pub fn new(cache: Arc<CredentialCache>) -> Self {
        Self { cache }
    }

    pub fn validate(
        &self,
        current: &SecurityDescriptor,
        target: &SecurityDescriptor,
        now: SystemTime,
    ) -> Result<CertificateRotation, CertificateRotationError> {
        let result = self.check(current, target, now);
        match &result {
            Ok(rotation) => info!(
                "event=certificate_rotation_accepted outcome={}",
                rotation.label()
            ),
            Err(err) => warn!(
                "event=certificate_rotation_rejected code={} reason=\"{}\"",
                err.code(),
                err
            ),
        }
        result
    }

    fn check(
        &self,
        current: &SecurityDescriptor,
        target: &SecurityDescriptor,
        now: SystemTime,
    ) -> Result<CertificateRotation, CertificateRotationError> {
        let (current_set, target_set) =
            match (current.cluster_identities(), target.cluster_identities()) {
                (None, None) => return Ok(CertificateRotation::Unsecured),
                (None, Some(_)) => {
                    return Err(CertificateRotationError::AuthenticationModeChange("added"))
                }
                (Some(_), None) => {
                    return Err(CertificateRotationError::AuthenticationModeChange("removed"))
                }
                (Some(current), Some(target)) => (current, target),
            };

        let same_kind = current_set.kind == target_set.kind;
        if same_kind && current_set.kind == IdentityKind::CommonName {
            check_issuer_thumbprints(current_set, target_set)?;
        }

        let before = current_set.normalized_values();
        let after = target_set.normalized_values();
        if same_kind && before == after {
            check_issuer_stores(&current.issuer_stores, &target.issuer_stores)?;
            return Ok(CertificateRotation::Unchanged);
        }

        // Values of different kinds never compare equal, so a mechanism switch
        // retains nothing and every target value counts as added.
        let retained: Vec<String> = if same_kind {
            before.intersection(&after).cloned().collect()
        } else {
            Vec::new()
        };
        let added: Vec<String> = if same_kind {
            after.difference(&before).cloned().collect()
        } else {
            after.iter().cloned().collect()
        };

        let rotation = if !same_kind {
            CertificateRotation::MechanismSwitch
        } else if retained.is_empty() {
            if before.len() != 1 || after.len() != 1 {
                return Err(CertificateRotationError::NoIntersection);
            }
            CertificateRotation::Swap {
                from: before.iter().next().cloned().unwrap_or_default(),
                to: after.iter().next().cloned().unwrap_or_default(),
            }
        } else {
            CertificateRotation::Overlapping {
                added: added.clone(),
                removed: before.difference(&after).cloned().collect(),
                retained: retained.clone(),
            }
        };

        for identity in &added {
            let installed =
                self.cache
                    .installed(&target_set.store_name, target_set.kind, identity)?;
            if installed.is_empty() {
                return Err(CertificateRotationError::NotInstalled {
                    identity: identity.clone(),
                    store: target_set.store_name.clone(),
                });
            }
            if !installed.iter().all(|cert| cert.is_valid_at(now)) {
                return Err(CertificateRotationError::Invalid(identity.clone()));
            }
        }

        for identity in &retained {
            let installed =
                self.cache
                    .installed(&target_set.store_name, target_set.kind, identity)?;
            if !installed.iter().any(|cert| cert.is_valid_at(now)) {
                return Err(CertificateRotationError::Invalid(identity.clone()));
            }
        }

        check_issuer_stores(&current.issuer_stores, &target.issuer_stores)?;
        Ok(rotation)
    }
}

/// Every common name present on both sides with pinned issuers on both sides
/// must keep at least one issuer.
fn check_issuer_thumbprints(
    current: &CertificateIdentitySet,
    target: &CertificateIdentitySet,
) -> Result<(), CertificateRotationError> {
    let shared: Vec<String> = current
        .normalized_values()
        .intersection(&target.normalized_values())
        .cloned()
        .collect();
    for name in &shared {
        let (Some(before), Some(after)) = (current.find(name), target.find(name)) else {
            continue;
        };
        let pinned = |issuers: &[String]| -> BTreeSet<String> {
            issuers
                .iter()
                .map(|issuer| normalize_identity(IdentityKind::Thumbprint, issuer))
                .filter(|issuer| !issuer.is_empty())
                .collect()
        };
        let before = pinned(&before.issuer_thumbprints);
        let after = pinned(&after.issuer_thumbprints);
        if before.is_empty() || after.is_empty() {
            continue;
        }
        if before.is_disjoint(&after) {
            return Err(CertificateRotationError::IssuerThumbprintNoIntersection(
                name.clone(),
            ));
        }
    }
    Ok(())
}

fn check_issuer_stores(
    current: &[IssuerStore],
    target: &[IssuerStore],
) -> Result<(), CertificateRotationError> {
    let index = |stores: &[IssuerStore]| -> BTreeMap<String, BTreeSet<String>> {
        let mut map: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for store in stores {
            map.entry(store.issuer_common_name.trim().to_string())
                .or_default()
                .extend(store.normalized_stores());
        }
        map
    };
    let before = index(current);
    let after = index(target);
    if !before.is_empty() && before.keys().all(|issuer| !after.contains_key(issuer)) {
        return Err(CertificateRotationError::IssuerStoreCnNoIntersection);
    }
    for (issuer, stores) in &before {
        let Some(next) = after.get(issuer) else {
            continue;
        };
        if stores.is_disjoint(next) {
            return Err(CertificateRotationError::IssuerStoreNoIntersection(
                issuer.clone(),
            ));
        }
    }
    Ok(())
}
