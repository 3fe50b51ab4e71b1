//! Fingerprint derivation for duplicate detection.
//!
//! Two submissions of the same logical chat line must map to the same
//! fingerprint even when their timestamps differ by producer-side jitter.
//! The canonical string is `author` (omitted entirely when absent) followed
//! by `content` followed by the decimal timestamp with its final two digits
//! dropped, so submissions landing in the same 100ms bucket collide by
//! design. The canonical string is hashed with SHA-1 and encoded as URL-safe
//! base64, which keeps the fingerprint safe to use as a file name.
//!
//! Distinct events colliding through the digest itself is accepted as a
//! cryptographically negligible false-duplicate risk.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

use super::event::ChatEvent;

/// A deduplication fingerprint identifying a logical chat event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Returns the fingerprint as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(s: String) -> Self {
        Fingerprint(s)
    }
}

/// Derives the fingerprint for a chat event.
///
/// Deterministic and pure: equal `{author, content, time bucket}` triples
/// always produce equal fingerprints. An authored event and an otherwise
/// identical unauthored event never collide, because an absent author is
/// omitted from the canonical string rather than replaced by a placeholder
/// that real content could imitate.
pub fn fingerprint(event: &ChatEvent) -> Fingerprint {
    let mut canonical = String::new();
    if let Some(author) = &event.author {
        canonical.push_str(author);
    }
    canonical.push_str(&event.content);
    canonical.push_str(&time_bucket(event.timestamp));

    let digest = Sha1::digest(canonical.as_bytes());
    Fingerprint(URL_SAFE_NO_PAD.encode(digest))
}

/// Coarsens a millisecond timestamp by dropping its last two decimal digits.
///
/// Timestamps under 100 collapse to the empty bucket; event times are epoch
/// milliseconds, so that never occurs in practice.
fn time_bucket(timestamp: i64) -> String {
    let mut text = timestamp.to_string();
    text.truncate(text.len().saturating_sub(2));
    text
}
