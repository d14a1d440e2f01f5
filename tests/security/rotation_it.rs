use std::sync::Arc;
use std::time::{Duration, SystemTime};
use toposhift::{
    CertificateIdentity, CertificateIdentitySet, CertificateInventory, CertificateLookup,
    CertificateLookupError, CertificateRotation, CertificateRotationError,
    CertificateRotationValidator, CredentialCache, IdentityKind, InstalledCertificate, IssuerStore,
    SecurityDescriptor,
};

fn now() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
}

fn valid(thumbprint: &str) -> InstalledCertificate {
    InstalledCertificate::new(
        "n1",
        "My",
        thumbprint,
        "cluster.example",
        now() - Duration::from_secs(86_400),
        now() + Duration::from_secs(86_400),
    )
}

fn expired(thumbprint: &str) -> InstalledCertificate {
    InstalledCertificate::new(
        "n1",
        "My",
        thumbprint,
        "cluster.example",
        now() - Duration::from_secs(2 * 86_400),
        now() - Duration::from_secs(86_400),
    )
}

fn thumbprints(values: &[&str]) -> SecurityDescriptor {
    SecurityDescriptor::with_certificate(CertificateIdentitySet::thumbprints(
        "My",
        values.iter().copied(),
    ))
}

fn common_names(identities: Vec<CertificateIdentity>) -> SecurityDescriptor {
    SecurityDescriptor::with_certificate(CertificateIdentitySet::common_names("My", identities))
}

fn validator(inventory: CertificateInventory) -> CertificateRotationValidator {
    CertificateRotationValidator::new(Arc::new(CredentialCache::new(Arc::new(inventory))))
}

#[test]
fn rolling_through_an_overlapping_pair_is_accepted_both_ways() {
    let validator = validator(CertificateInventory::new().with(valid("aa")).with(valid("bb")));

    let grow = validator
        .validate(&thumbprints(&["AA"]), &thumbprints(&["AA", "BB"]), now())
        .unwrap();
    assert_eq!(
        grow,
        CertificateRotation::Overlapping {
            added: vec!["BB".into()],
            removed: vec![],
            retained: vec!["AA".into()],
        }
    );

    let shrink = validator
        .validate(&thumbprints(&["AA", "BB"]), &thumbprints(&["bb"]), now())
        .unwrap();
    assert_eq!(shrink.label(), "overlapping");
}

#[test]
fn single_value_swap_skips_the_overlap_check() {
    let rotation = validator(CertificateInventory::new().with(valid("BB")))
        .validate(&thumbprints(&["AA"]), &thumbprints(&["BB"]), now())
        .unwrap();
    assert_eq!(
        rotation,
        CertificateRotation::Swap {
            from: "AA".into(),
            to: "BB".into()
        }
    );
}

#[test]
fn swap_to_an_uninstalled_certificate_is_rejected() {
    let err = validator(CertificateInventory::new().with(valid("AA")))
        .validate(&thumbprints(&["AA"]), &thumbprints(&["BB"]), now())
        .unwrap_err();
    assert_eq!(
        err,
        CertificateRotationError::NotInstalled {
            identity: "BB".into(),
            store: "My".into(),
        }
    );
}

#[test]
fn swap_still_honours_issuer_stores() {
    let mut current = thumbprints(&["AA"]);
    current.issuer_stores = vec![IssuerStore::new("Contoso Root", ["Root"])];
    let mut target = thumbprints(&["BB"]);
    target.issuer_stores = vec![IssuerStore::new("Contoso Root", ["Intermediate"])];
    let err = validator(CertificateInventory::new().with(valid("BB")))
        .validate(&current, &target, now())
        .unwrap_err();
    assert_eq!(err.code(), "issuer-store-no-intersection");
}

#[test]
fn disjoint_multi_value_sets_are_rejected() {
    let err = validator(CertificateInventory::new())
        .validate(&thumbprints(&["AA", "BB"]), &thumbprints(&["CC", "DD"]), now())
        .unwrap_err();
    assert_eq!(err, CertificateRotationError::NoIntersection);
    assert!(!err.is_retryable());
}

#[test]
fn added_identity_must_be_installed() {
    let err = validator(CertificateInventory::new().with(valid("AA")))
        .validate(&thumbprints(&["AA"]), &thumbprints(&["AA", "CC"]), now())
        .unwrap_err();
    assert_eq!(
        err,
        CertificateRotationError::NotInstalled {
            identity: "CC".into(),
            store: "My".into(),
        }
    );
    assert!(err.is_retryable());
}

#[test]
fn added_identity_must_be_valid_everywhere_it_is_installed() {
    let inventory = CertificateInventory::new()
        .with(valid("AA"))
        .with(valid("CC"))
        .with(expired("CC"));
    let err = validator(inventory)
        .validate(&thumbprints(&["AA"]), &thumbprints(&["AA", "CC"]), now())
        .unwrap_err();
    assert_eq!(err, CertificateRotationError::Invalid("CC".into()));

    let revoked = validator(CertificateInventory::new().with(valid("BB").revoked()))
        .validate(&thumbprints(&["AA"]), &thumbprints(&["BB"]), now())
        .unwrap_err();
    assert_eq!(revoked.code(), "invalid");
}

#[test]
fn retained_identity_must_still_be_valid() {
    let err = validator(CertificateInventory::new().with(expired("AA")).with(valid("CC")))
        .validate(&thumbprints(&["AA"]), &thumbprints(&["AA", "CC"]), now())
        .unwrap_err();
    assert_eq!(err, CertificateRotationError::Invalid("AA".into()));
    assert_eq!(err.code(), "invalid");
}

#[test]
fn switching_mechanism_skips_the_overlap_check() {
    let rotation = validator(CertificateInventory::new().with(valid("AA")))
        .validate(
            &thumbprints(&["AA"]),
            &common_names(vec![CertificateIdentity::new("cluster.example")]),
            now(),
        )
        .unwrap();
    assert_eq!(rotation, CertificateRotation::MechanismSwitch);
}

#[test]
fn switching_mechanism_needs_the_new_identity_installed() {
    let err = validator(CertificateInventory::new())
        .validate(
            &thumbprints(&["AA"]),
            &common_names(vec![CertificateIdentity::new("other.example")]),
            now(),
        )
        .unwrap_err();
    assert_eq!(err.code(), "not-installed");
}

#[test]
fn adding_or_removing_security_is_a_mode_change() {
    let validator = validator(CertificateInventory::new());
    let added = validator
        .validate(&SecurityDescriptor::unsecured(), &thumbprints(&["AA"]), now())
        .unwrap_err();
    assert_eq!(added, CertificateRotationError::AuthenticationModeChange("added"));
    assert_eq!(
        validator
            .validate(
                &SecurityDescriptor::unsecured(),
                &SecurityDescriptor::unsecured(),
                now()
            )
            .unwrap(),
        CertificateRotation::Unsecured
    );
}

#[test]
fn pinned_issuers_of_a_retained_name_must_overlap() {
    let current = common_names(vec![
        CertificateIdentity::new("cluster.example").with_issuers(["11AA"]),
        CertificateIdentity::new("old.example"),
    ]);
    let target = common_names(vec![
        CertificateIdentity::new("cluster.example").with_issuers(["22BB"]),
        CertificateIdentity::new("new.example"),
    ]);
    let err = validator(CertificateInventory::new())
        .validate(&current, &target, now())
        .unwrap_err();
    assert_eq!(
        err,
        CertificateRotationError::IssuerThumbprintNoIntersection("cluster.example".into())
    );
}

#[test]
fn repinning_an_unchanged_name_needs_a_shared_issuer() {
    let current = common_names(vec![
        CertificateIdentity::new("cluster.example").with_issuers(["11AA"])
    ]);
    let target = common_names(vec![
        CertificateIdentity::new("cluster.example").with_issuers(["22BB"])
    ]);
    let err = validator(CertificateInventory::new())
        .validate(&current, &target, now())
        .unwrap_err();
    assert_eq!(err.code(), "issuer-thumbprint-no-intersection");

    let widened = common_names(vec![
        CertificateIdentity::new("cluster.example").with_issuers(["11aa", "22BB"])
    ]);
    assert_eq!(
        validator(CertificateInventory::new())
            .validate(&current, &widened, now())
            .unwrap(),
        CertificateRotation::Unchanged
    );
}

#[test]
fn issuer_stores_must_keep_a_common_issuer() {
    let mut current = thumbprints(&["AA"]);
    current.issuer_stores = vec![IssuerStore::new("Contoso Root", ["Root"])];
    let mut target = thumbprints(&["AA"]);
    target.issuer_stores = vec![IssuerStore::new("Fabrikam Root", ["Root"])];
    let err = validator(CertificateInventory::new())
        .validate(&current, &target, now())
        .unwrap_err();
    assert_eq!(err, CertificateRotationError::IssuerStoreCnNoIntersection);
    assert_eq!(err.code(), "issuer-store-cn-no-intersection");
    assert!(!err.is_retryable());

    target.issuer_stores.push(IssuerStore::new("Contoso Root", ["Root"]));
    assert!(validator(CertificateInventory::new())
        .validate(&current, &target, now())
        .is_ok());
}

#[test]
fn issuer_stores_must_keep_a_common_store() {
    let mut current = thumbprints(&["AA"]);
    current.issuer_stores = vec![IssuerStore::new("Contoso Root", ["Root"])];
    let mut target = thumbprints(&["AA"]);
    target.issuer_stores = vec![IssuerStore::new("Contoso Root", ["Intermediate"])];
    let err = validator(CertificateInventory::new())
        .validate(&current, &target, now())
        .unwrap_err();
    assert_eq!(err.code(), "issuer-store-no-intersection");

    target.issuer_stores = vec![IssuerStore::new("Contoso Root", ["Intermediate", "Root"])];
    assert_eq!(
        validator(CertificateInventory::new())
            .validate(&current, &target, now())
            .unwrap(),
        CertificateRotation::Unchanged
    );
}

struct UnavailableStore;

impl CertificateLookup for UnavailableStore {
    fn installed(
        &self,
        store_name: &str,
        _kind: IdentityKind,
        _value: &str,
    ) -> Result<Vec<InstalledCertificate>, CertificateLookupError> {
        Err(CertificateLookupError::StoreUnavailable(store_name.to_string()))
    }
}

#[test]
fn store_outage_surfaces_as_retryable_lookup_failure() {
    let cache = Arc::new(CredentialCache::new(Arc::new(UnavailableStore)));
    let err = CertificateRotationValidator::new(cache.clone())
        .validate(&thumbprints(&["AA"]), &thumbprints(&["AA", "BB"]), now())
        .unwrap_err();
    assert!(matches!(err, CertificateRotationError::Lookup(_)));
    assert!(err.is_retryable());
    assert!(cache.is_empty());
}
