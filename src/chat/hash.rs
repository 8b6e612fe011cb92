//! Participant-set canonicalization.

use sha2::{Digest, Sha256};

/// Canonicalize a participant alias set: case-sensitive sort, dedupe.
#[must_use]
pub fn canonical_aliases(aliases: &[String]) -> Vec<String> {
    let mut out: Vec<String> = aliases.to_vec();
    out.sort();
    out.dedup();
    out
}

/// Digest of the canonicalized alias set.
///
/// The hash exists only to make `(project_id, participant_hash)` unique
/// in the store; it is never surfaced as an external identifier. Alias
/// validation rejects control characters, so the newline join is
/// unambiguous.
#[must_use]
pub fn participant_hash(canonical: &[String]) -> String {
    let joined = canonical.join("\n");
    hex::encode(Sha256::digest(joined.as_bytes()))
}
