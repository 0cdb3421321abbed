//! # Authentication Validator
//!
//! Decides whether a signature set legitimately authorizes a change to an
//! identity document. Signature bytes are not looked at here; the question
//! is purely *who* signed, measured against the document's
//! `authentication` policy, its controllers' policies and, on update, the
//! previous version of the document.
//!
//! ## Flow
//!
//! ```text
//! structural checks (no I/O)
//!        │
//!        ├── plain ──────► self-controlled: exact id-set equality
//!        │                 external:        coverage + cardinality
//!        │
//!        └── rotation ───► resolve previous ─► rotations / topology
//!                                 │
//!                                 ├── neither: exact equality over union
//!                                 └── else:    per-id frequency comparison
//! ```
//!
//! Structural failures always short-circuit before any resolver call.

use std::borrow::Cow;
use std::collections::HashMap;

use futures::future::try_join_all;
use tracing::debug;

use super::error::{InvalidReason, ValidationError, ValidationResult};
use super::requirements::{Provenance, RequiredSigners};
use crate::crypto::SignatureEntry;
use crate::identity::{
    rotated_method_ids, ControllerCache, ControllerTopology, Document, DocumentResolver,
};

// ---------------------------------------------------------------------------
// Structural checks
// ---------------------------------------------------------------------------

/// How repeated signature ids are treated by the structural pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DuplicateSignatures {
    /// Any repeat is invalid.
    Reject,
    /// A declared method may sign twice (outgoing and incoming material)
    /// with two different signatures; whether it had to is settled by the
    /// frequency comparison.
    AllowRotationPairs,
}

fn check_structure(
    document: &Document,
    signatures: &[SignatureEntry],
    duplicates: DuplicateSignatures,
) -> Option<InvalidReason> {
    let declares_methods = !document.verification_method.is_empty();

    if declares_methods && signatures.is_empty() {
        return Some(InvalidReason::NoSignatures);
    }
    if declares_methods && document.authentication.is_empty() {
        return Some(InvalidReason::NoAuthentication);
    }

    let mut seen = Vec::with_capacity(document.authentication.len());
    for key_id in &document.authentication {
        if seen.contains(&key_id) {
            return Some(InvalidReason::DuplicateAuthentication(key_id.clone()));
        }
        seen.push(key_id);
    }

    let mut seen: HashMap<&str, (usize, &[u8])> = HashMap::new();
    for signature in signatures {
        let key_id = signature.verification_method_id.as_str();
        let (count, first) = seen
            .entry(key_id)
            .or_insert((0, signature.signature.as_slice()));
        *count += 1;
        let allowed = match duplicates {
            DuplicateSignatures::Reject => 1,
            DuplicateSignatures::AllowRotationPairs if document.declares_method(key_id) => 2,
            DuplicateSignatures::AllowRotationPairs => 1,
        };
        let repeated_bytes = *count > 1 && *first == signature.signature.as_slice();
        if *count > allowed || repeated_bytes {
            return Some(InvalidReason::DuplicateSignature(key_id.to_string()));
        }
    }

    document
        .authentication
        .iter()
        .find(|key_id| !document.declares_method(key_id))
        .map(|key_id| InvalidReason::DanglingAuthentication(key_id.clone()))
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Fetch every external controller's document, cache first, all lookups
/// in flight at once. Results keep the order of `controllers`.
async fn resolve_controllers<'a>(
    controllers: &[String],
    resolver: &dyn DocumentResolver,
    controller_cache: Option<&'a ControllerCache>,
) -> Result<Vec<Cow<'a, Document>>, ValidationError> {
    let lookups = controllers.iter().map(|controller| async move {
        if let Some(cached) = controller_cache.and_then(|cache| cache.get(controller)) {
            return Ok(Cow::Borrowed(cached));
        }
        resolver
            .resolve(controller)
            .await
            .map(Cow::Owned)
            .map_err(|source| ValidationError::ControllerDocumentNotFound {
                controller: controller.clone(),
                source,
            })
    });
    try_join_all(lookups).await
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Validate a create or deactivate.
///
/// A self-controlled document is authorized by exactly the keys in its
/// `authentication`. An externally controlled one needs every key from its
/// own `authentication` and from each controller's `authentication`, and no
/// more signatures than there are such keys.
pub async fn validate_authentication(
    document: &Document,
    signatures: &[SignatureEntry],
    resolver: &dyn DocumentResolver,
    controller_cache: Option<&ControllerCache>,
) -> Result<ValidationResult, ValidationError> {
    if let Some(reason) = check_structure(document, signatures, DuplicateSignatures::Reject) {
        return Ok(reject(document, reason));
    }

    let mut required = RequiredSigners::new();
    for key_id in &document.authentication {
        required.require_once(key_id, Provenance::Current);
    }

    let outcome = match document.topology() {
        ControllerTopology::SelfControlled => required.check_exact(signatures),
        ControllerTopology::External(controllers) => {
            let controller_docs =
                resolve_controllers(&controllers, resolver, controller_cache).await?;
            for (index, controller_doc) in controller_docs.iter().enumerate() {
                for key_id in &controller_doc.authentication {
                    required.require_once(key_id, Provenance::Controller(index));
                }
            }
            required.check_coverage(signatures)
        }
    };

    Ok(finish(document, outcome))
}

/// Validate an update, which may rotate key material.
///
/// `previous` is the version being replaced; when `None` it is resolved by
/// the document's own id. A rotated method must sign with both its outgoing
/// and its incoming material, so its id appears twice in `signatures`.
pub async fn validate_authentication_on_rotation(
    document: &Document,
    signatures: &[SignatureEntry],
    resolver: &dyn DocumentResolver,
    previous: Option<&Document>,
    controller_cache: Option<&ControllerCache>,
) -> Result<ValidationResult, ValidationError> {
    if let Some(reason) =
        check_structure(document, signatures, DuplicateSignatures::AllowRotationPairs)
    {
        return Ok(reject(document, reason));
    }

    let previous = match previous {
        Some(previous) => Cow::Borrowed(previous),
        None => Cow::Owned(resolver.resolve(&document.id).await.map_err(|source| {
            ValidationError::PreviousDocumentNotFound {
                id: document.id.clone(),
                source,
            }
        })?),
    };

    let rotated = rotated_method_ids(&previous, document);
    let topology = ControllerTopology::derive(
        &document.id,
        document.controller.iter().chain(previous.controller.iter()),
    );
    debug!(
        document = %document.id,
        rotated = rotated.len(),
        external = topology.is_external(),
        "evaluating update authorization"
    );

    let mut required = union_requirements(document, &previous);

    if rotated.is_empty() && !topology.is_external() {
        return Ok(finish(document, required.check_exact(signatures)));
    }

    for key_id in &rotated {
        if document.authentication.contains(key_id) && previous.authentication.contains(key_id) {
            required.require(key_id.as_str(), Provenance::Rotated);
        }
    }

    if let ControllerTopology::External(controllers) = &topology {
        let controller_docs = resolve_controllers(controllers, resolver, controller_cache).await?;
        for (index, controller_doc) in controller_docs.iter().enumerate() {
            for key_id in &controller_doc.authentication {
                required.require_once(key_id, Provenance::Controller(index));
            }
        }
    }

    Ok(finish(document, required.check_frequencies(signatures)))
}

/// Union of the new and previous `authentication`, each id once, tagged
/// with where it came from.
fn union_requirements(document: &Document, previous: &Document) -> RequiredSigners {
    let mut required = RequiredSigners::new();
    for key_id in previous.authentication.iter().chain(&document.authentication) {
        let provenance = if previous.authentication.contains(key_id) {
            Provenance::Previous
        } else {
            Provenance::Current
        };
        required.require_once(key_id, provenance);
    }
    required
}

fn finish(document: &Document, outcome: Option<InvalidReason>) -> ValidationResult {
    match outcome {
        Some(reason) => reject(document, reason),
        None => {
            debug!(document = %document.id, "authentication satisfied");
            ValidationResult::Valid
        }
    }
}

fn reject(document: &Document, reason: InvalidReason) -> ValidationResult {
    debug!(
        document = %document.id,
        key_id = reason.offending_key_id().unwrap_or("-"),
        %reason,
        "authentication rejected"
    );
    ValidationResult::Invalid(reason)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{
        KeyMaterial, ResolverError, StaticResolver, VerificationMethod, VerificationMethodType,
    };

    const ALICE: &str = "did:idl:testnet:alice";
    const BOB: &str = "did:idl:testnet:bob";

    fn key(did: &str, n: u8) -> String {
        format!("{}#key-{}", did, n)
    }

    fn method(did: &str, n: u8, material: &str) -> VerificationMethod {
        VerificationMethod::new(
            key(did, n),
            VerificationMethodType::Ed25519VerificationKey2020,
            did,
            KeyMaterial::Multibase(material.to_string()),
        )
    }

    /// A document with `n` keys, all in `authentication`.
    fn doc(did: &str, n: u8) -> Document {
        (1..=n).fold(Document::new(did), |doc, i| {
            doc.with_verification_method(method(did, i, &format!("z{}{}", did, i)))
                .with_authentication(key(did, i))
        })
    }

    fn sigs(ids: &[String]) -> Vec<SignatureEntry> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| SignatureEntry::new(id.clone(), vec![i as u8; 64]))
            .collect()
    }

    async fn plain(document: &Document, signatures: &[SignatureEntry]) -> ValidationResult {
        validate_authentication(document, signatures, &StaticResolver::new(), None)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn self_controlled_exact_set_is_valid() {
        let document = doc(ALICE, 2);
        let result = plain(&document, &sigs(&[key(ALICE, 2), key(ALICE, 1)])).await;
        assert_eq!(result, ValidationResult::Valid);
    }

    #[tokio::test]
    async fn self_controlled_missing_key() {
        let document = doc(ALICE, 2);
        let result = plain(&document, &sigs(&[key(ALICE, 1)])).await;
        assert_eq!(
            result,
            ValidationResult::Invalid(InvalidReason::MissingSignature {
                key_id: key(ALICE, 2),
                provenance: Provenance::Current,
            })
        );
    }

    #[tokio::test]
    async fn self_controlled_excess_key() {
        let document = doc(ALICE, 1);
        let result = plain(&document, &sigs(&[key(ALICE, 1), key(BOB, 1)])).await;
        assert_eq!(
            result,
            ValidationResult::Invalid(InvalidReason::ExcessSignature(key(BOB, 1)))
        );
    }

    #[tokio::test]
    async fn structural_checks_run_in_order() {
        let document = doc(ALICE, 1);
        assert_eq!(
            plain(&document, &[]).await,
            ValidationResult::Invalid(InvalidReason::NoSignatures)
        );

        let mut no_auth = doc(ALICE, 1);
        no_auth.authentication.clear();
        assert_eq!(
            plain(&no_auth, &sigs(&[key(ALICE, 1)])).await,
            ValidationResult::Invalid(InvalidReason::NoAuthentication)
        );

        let dup_auth = doc(ALICE, 1).with_authentication(key(ALICE, 1));
        assert_eq!(
            plain(&dup_auth, &sigs(&[key(ALICE, 1), key(ALICE, 1)])).await,
            ValidationResult::Invalid(InvalidReason::DuplicateAuthentication(key(ALICE, 1)))
        );

        assert_eq!(
            plain(&document, &sigs(&[key(ALICE, 1), key(ALICE, 1)])).await,
            ValidationResult::Invalid(InvalidReason::DuplicateSignature(key(ALICE, 1)))
        );

        let dangling = doc(ALICE, 1).with_authentication(key(ALICE, 9));
        assert_eq!(
            plain(&dangling, &sigs(&[key(ALICE, 1)])).await,
            ValidationResult::Invalid(InvalidReason::DanglingAuthentication(key(ALICE, 9)))
        );
    }

    #[tokio::test]
    async fn empty_document_needs_no_signatures() {
        let document = Document::new(ALICE);
        assert!(plain(&document, &[]).await.is_valid());
    }

    #[tokio::test]
    async fn structural_failure_skips_resolution() {
        let document = doc(ALICE, 1).with_controllers([ALICE, BOB]);
        let resolver = StaticResolver::new();
        let result = validate_authentication(
            &document,
            &sigs(&[key(ALICE, 1), key(ALICE, 1)]),
            &resolver,
            None,
        )
        .await
        .unwrap();
        assert!(!result.is_valid());
        assert_eq!(resolver.lookup_count(), 0);
    }

    #[tokio::test]
    async fn external_controller_union() {
        let document = doc(ALICE, 1).with_controllers([ALICE, BOB]);
        let resolver = StaticResolver::new().with_document(doc(BOB, 1));

        let both = sigs(&[key(ALICE, 1), key(BOB, 1)]);
        let result = validate_authentication(&document, &both, &resolver, None)
            .await
            .unwrap();
        assert!(result.is_valid());

        let only_own = sigs(&[key(ALICE, 1)]);
        let result = validate_authentication(&document, &only_own, &resolver, None)
            .await
            .unwrap();
        assert_eq!(
            result.reason(),
            Some(&InvalidReason::MissingSignature {
                key_id: key(BOB, 1),
                provenance: Provenance::Controller(0),
            })
        );
    }

    #[tokio::test]
    async fn external_cardinality_bound() {
        let document = doc(ALICE, 1).with_controllers([BOB]);
        let resolver = StaticResolver::new().with_document(doc(BOB, 1));
        let too_many = sigs(&[key(ALICE, 1), key(BOB, 1), key(BOB, 2)]);
        let result = validate_authentication(&document, &too_many, &resolver, None)
            .await
            .unwrap();
        assert_eq!(result.reason(), Some(&InvalidReason::ExcessSignature(key(BOB, 2))));
    }

    #[tokio::test]
    async fn controller_cache_is_consulted_first() {
        let document = doc(ALICE, 1).with_controllers([BOB]);
        let resolver = StaticResolver::new();
        let mut cache = ControllerCache::new();
        cache.insert(BOB.to_string(), doc(BOB, 1));

        let result = validate_authentication(
            &document,
            &sigs(&[key(ALICE, 1), key(BOB, 1)]),
            &resolver,
            Some(&cache),
        )
        .await
        .unwrap();
        assert!(result.is_valid());
        assert_eq!(resolver.lookup_count(), 0);
    }

    #[tokio::test]
    async fn unresolvable_controller_is_an_error() {
        let document = doc(ALICE, 1).with_controllers([BOB]);
        let err = validate_authentication(
            &document,
            &sigs(&[key(ALICE, 1)]),
            &StaticResolver::new(),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::ControllerDocumentNotFound {
                controller: BOB.to_string(),
                source: ResolverError::NotFound(BOB.to_string()),
            }
        );
    }

    // -- rotation --------------------------------------------------------

    fn rotated_alice() -> (Document, Document) {
        let previous = doc(ALICE, 1);
        let mut current = doc(ALICE, 1);
        current.verification_method[0].key_material = KeyMaterial::Multibase("zRotated".into());
        (previous, current)
    }

    #[tokio::test]
    async fn rotation_requires_both_keys() {
        let (previous, current) = rotated_alice();
        let resolver = StaticResolver::new();

        let once = sigs(&[key(ALICE, 1)]);
        let result =
            validate_authentication_on_rotation(&current, &once, &resolver, Some(&previous), None)
                .await
                .unwrap();
        assert_eq!(
            result.reason(),
            Some(&InvalidReason::MissingSignature {
                key_id: key(ALICE, 1),
                provenance: Provenance::Rotated,
            })
        );

        let twice = sigs(&[key(ALICE, 1), key(ALICE, 1)]);
        let result =
            validate_authentication_on_rotation(&current, &twice, &resolver, Some(&previous), None)
                .await
                .unwrap();
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn rotation_pair_with_identical_bytes_is_duplicate() {
        let (previous, current) = rotated_alice();
        let copied = vec![
            SignatureEntry::new(key(ALICE, 1), vec![9u8; 64]),
            SignatureEntry::new(key(ALICE, 1), vec![9u8; 64]),
        ];
        let result = validate_authentication_on_rotation(
            &current,
            &copied,
            &StaticResolver::new(),
            Some(&previous),
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            result.reason(),
            Some(&InvalidReason::DuplicateSignature(key(ALICE, 1)))
        );
    }

    #[tokio::test]
    async fn rotation_rejects_three_signatures_from_one_key() {
        let (previous, current) = rotated_alice();
        let thrice = sigs(&[key(ALICE, 1), key(ALICE, 1), key(ALICE, 1)]);
        let result = validate_authentication_on_rotation(
            &current,
            &thrice,
            &StaticResolver::new(),
            Some(&previous),
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            result.reason(),
            Some(&InvalidReason::DuplicateSignature(key(ALICE, 1)))
        );
    }

    #[tokio::test]
    async fn update_without_rotation_uses_union_equality() {
        let previous = doc(ALICE, 1);
        let current = doc(ALICE, 2);
        let resolver = StaticResolver::new();

        let result = validate_authentication_on_rotation(
            &current,
            &sigs(&[key(ALICE, 1), key(ALICE, 2)]),
            &resolver,
            Some(&previous),
            None,
        )
        .await
        .unwrap();
        assert!(result.is_valid());

        let result = validate_authentication_on_rotation(
            &current,
            &sigs(&[key(ALICE, 1), key(ALICE, 1)]),
            &resolver,
            Some(&previous),
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            result.reason(),
            Some(&InvalidReason::MissingSignature {
                key_id: key(ALICE, 2),
                provenance: Provenance::Current,
            })
        );
    }

    #[tokio::test]
    async fn previous_document_is_resolved_when_absent() {
        let (previous, current) = rotated_alice();
        let resolver = StaticResolver::new().with_document(previous);
        let result = validate_authentication_on_rotation(
            &current,
            &sigs(&[key(ALICE, 1), key(ALICE, 1)]),
            &resolver,
            None,
            None,
        )
        .await
        .unwrap();
        assert!(result.is_valid());
        assert_eq!(resolver.lookup_count(), 1);
    }

    #[tokio::test]
    async fn missing_previous_document_is_an_error() {
        let (_, current) = rotated_alice();
        let err = validate_authentication_on_rotation(
            &current,
            &sigs(&[key(ALICE, 1)]),
            &StaticResolver::new(),
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ValidationError::PreviousDocumentNotFound { id, .. } if id == ALICE));
    }

    #[tokio::test]
    async fn controller_dropped_in_update_must_still_sign() {
        let previous = doc(ALICE, 1).with_controllers([ALICE, BOB]);
        let current = doc(ALICE, 1);
        let resolver = StaticResolver::new().with_document(doc(BOB, 1));

        let result = validate_authentication_on_rotation(
            &current,
            &sigs(&[key(ALICE, 1)]),
            &resolver,
            Some(&previous),
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            result.reason(),
            Some(&InvalidReason::MissingSignature {
                key_id: key(BOB, 1),
                provenance: Provenance::Controller(0),
            })
        );

        let result = validate_authentication_on_rotation(
            &current,
            &sigs(&[key(ALICE, 1), key(BOB, 1)]),
            &resolver,
            Some(&previous),
            None,
        )
        .await
        .unwrap();
        assert!(result.is_valid());
    }

    #[tokio::test]
    async fn rotation_reports_excess_before_missing() {
        let (previous, current) = rotated_alice();
        let result = validate_authentication_on_rotation(
            &current,
            &sigs(&[key(ALICE, 1), key(BOB, 1)]),
            &StaticResolver::new(),
            Some(&previous),
            None,
        )
        .await
        .unwrap();
        assert_eq!(result.reason(), Some(&InvalidReason::ExcessSignature(key(BOB, 1))));
    }
}
