//! The required-signer multiset.
//!
//! A [`RequiredSigners`] is built fresh for every validation call and holds
//! one `(key_id, Provenance)` entry per requirement. The same key id can be
//! required more than once from different sources: a rotated key is
//! required once by the previous document (old material authorizes the
//! change) and once more as rotated material (new material proves
//! possession).
//!
//! Three comparisons are offered, one per policy:
//!
//! | Policy | Method |
//! |---|---|
//! | self-controlled, no rotation | [`RequiredSigners::check_exact`] |
//! | externally controlled create/deactivate | [`RequiredSigners::check_coverage`] |
//! | rotation or externally controlled update | [`RequiredSigners::check_frequencies`] |

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::error::InvalidReason;
use crate::crypto::SignatureEntry;

/// Where a signing requirement came from.
///
/// The ordering is significant: when a key signs fewer times than it is
/// required, requirements are considered satisfied in this order and the
/// first unsatisfied one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provenance {
    /// Listed in the previous version's `authentication`.
    Previous,
    /// Listed in the document's own `authentication`.
    Current,
    /// Incoming key material of a rotated verification method.
    Rotated,
    /// Listed in the `authentication` of the n-th external controller.
    Controller(usize),
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Previous => f.write_str("previous document"),
            Self::Current => f.write_str("current document"),
            Self::Rotated => f.write_str("rotated key material"),
            Self::Controller(index) => write!(f, "external controller #{}", index),
        }
    }
}

/// Multiset of signing requirements, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredSigners {
    entries: Vec<(String, Provenance)>,
}

impl RequiredSigners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one requirement.
    pub fn require(&mut self, key_id: impl Into<String>, provenance: Provenance) {
        self.entries.push((key_id.into(), provenance));
    }

    /// Add a requirement unless the key is already required. Returns
    /// whether it was added.
    pub fn require_once(&mut self, key_id: &str, provenance: Provenance) -> bool {
        if self.contains(key_id) {
            return false;
        }
        self.require(key_id, provenance);
        true
    }

    /// Multiset cardinality.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct key ids.
    pub fn distinct_len(&self) -> usize {
        self.distinct().count()
    }

    pub fn contains(&self, key_id: &str) -> bool {
        self.entries.iter().any(|(id, _)| id == key_id)
    }

    /// How many times `key_id` is required.
    pub fn count(&self, key_id: &str) -> usize {
        self.entries.iter().filter(|(id, _)| id == key_id).count()
    }

    pub fn entries(&self) -> &[(String, Provenance)] {
        &self.entries
    }

    /// First entry per key id, in first-seen order.
    fn distinct(&self) -> impl Iterator<Item = (&str, Provenance)> {
        let mut seen = HashSet::new();
        self.entries
            .iter()
            .filter(move |(id, _)| seen.insert(id.as_str()))
            .map(|(id, provenance)| (id.as_str(), *provenance))
    }

    /// The requirement left unmet when `key_id` signed `provided` times.
    fn unmet_provenance(&self, key_id: &str, provided: usize) -> Provenance {
        let mut provenances: Vec<Provenance> = self
            .entries
            .iter()
            .filter(|(id, _)| id == key_id)
            .map(|(_, provenance)| *provenance)
            .collect();
        provenances.sort();
        provenances
            .get(provided)
            .or(provenances.last())
            .copied()
            .unwrap_or(Provenance::Current)
    }

    /// Set equality between required ids and signing ids.
    ///
    /// Reports the first missing id; if none is missing, the first
    /// signature that is not required or repeats an id already seen.
    pub fn check_exact(&self, signatures: &[SignatureEntry]) -> Option<InvalidReason> {
        let provided: HashSet<&str> = signatures
            .iter()
            .map(|s| s.verification_method_id.as_str())
            .collect();

        if let Some((key_id, provenance)) = self.distinct().find(|(id, _)| !provided.contains(id)) {
            return Some(InvalidReason::MissingSignature {
                key_id: key_id.to_string(),
                provenance,
            });
        }

        let mut seen = HashSet::new();
        signatures
            .iter()
            .map(|s| s.verification_method_id.as_str())
            .find(|id| !self.contains(id) || !seen.insert(*id))
            .map(|id| InvalidReason::ExcessSignature(id.to_string()))
    }

    /// Every required id must be signed, and there may be no more
    /// signatures than distinct required ids.
    ///
    /// This is a cardinality bound, not a membership check: an unrelated
    /// signature passes as long as the count still fits.
    pub fn check_coverage(&self, signatures: &[SignatureEntry]) -> Option<InvalidReason> {
        let provided: HashSet<&str> = signatures
            .iter()
            .map(|s| s.verification_method_id.as_str())
            .collect();

        if let Some((key_id, provenance)) = self.distinct().find(|(id, _)| !provided.contains(id)) {
            return Some(InvalidReason::MissingSignature {
                key_id: key_id.to_string(),
                provenance,
            });
        }

        if signatures.len() > self.distinct_len() {
            let offending = signatures
                .iter()
                .find(|s| !self.contains(&s.verification_method_id))
                .or(signatures.last())
                .map(|s| s.verification_method_id.clone())
                .unwrap_or_default();
            return Some(InvalidReason::ExcessSignature(offending));
        }

        None
    }

    /// Per-id frequency comparison.
    ///
    /// A signing id required fewer times than it signed (or not at all) is
    /// an excess; a required id signed fewer times than required is
    /// missing, reported with the provenance of the first unmet
    /// requirement. Excess is checked first.
    pub fn check_frequencies(&self, signatures: &[SignatureEntry]) -> Option<InvalidReason> {
        let mut required: HashMap<&str, usize> = HashMap::new();
        for (id, _) in &self.entries {
            *required.entry(id.as_str()).or_default() += 1;
        }

        let mut provided: HashMap<&str, usize> = HashMap::new();
        let mut provided_order: Vec<&str> = Vec::new();
        for signature in signatures {
            let id = signature.verification_method_id.as_str();
            let count = provided.entry(id).or_default();
            if *count == 0 {
                provided_order.push(id);
            }
            *count += 1;
        }

        for id in provided_order {
            let signed = provided[id];
            match required.get(id) {
                Some(&needed) if needed >= signed => {}
                _ => return Some(InvalidReason::ExcessSignature(id.to_string())),
            }
        }

        for (id, _) in self.distinct() {
            let signed = provided.get(id).copied().unwrap_or(0);
            if required[id] > signed {
                return Some(InvalidReason::MissingSignature {
                    key_id: id.to_string(),
                    provenance: self.unmet_provenance(id, signed),
                });
            }
        }

        None
    }
}
