use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use super::filter::FilterSelection;

/// Deterministic digest of a [`FilterSelection`], used as the partition key
/// for progress and session state.
///
/// Two selections with the same criteria always produce the same hash, no
/// matter how they were constructed. An empty selection hashes to the SHA-256
/// digest of the empty string.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FilterContextHash(String);

impl FilterContextHash {
    /// Computes the hash of a selection.
    ///
    /// Canonical form: provided criteria rendered as `key:value`, keys in
    /// lexicographic order, joined with `|`, digested with SHA-256 and
    /// rendered as lowercase hex.
    #[must_use]
    pub fn of(selection: &FilterSelection) -> Self {
        let canonical = canonical_string(selection);
        let digest = Sha256::digest(canonical.as_bytes());
        use fmt::Write;
        let mut hex = String::with_capacity(digest.len() * 2);
        for byte in digest {
            // writing to a String is infallible
            let _ = write!(hex, "{byte:02x}");
        }
        Self(hex)
    }

    /// Wraps an already-computed digest (used when rehydrating from storage).
    #[must_use]
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// Returns the hex digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn canonical_string(selection: &FilterSelection) -> String {
    let parts: Vec<String> = selection
        .criteria()
        .iter()
        .map(|(key, value)| format!("{key}:{value}"))
        .collect();
    parts.join("|")
}

impl fmt::Debug for FilterContextHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FilterContextHash({})", self.0)
    }
}

impl fmt::Display for FilterContextHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
