//! TTL-based pruning of dedup records.
//!
//! The relay never deletes records on its own, so the record directory grows
//! with every unique chat line. The sweep here removes records older than a
//! configured retention window. A pruned record re-admits a duplicate of the
//! corresponding event, which is acceptable once the event is weeks old.

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use super::{DedupRecord, DedupStore, Result};

/// Removes records whose insertion time is older than `ttl_hours`.
///
/// Files that cannot be parsed as records are skipped, not deleted: a
/// truncated record (crash mid-write) still marks its fingerprint as seen
/// and must keep doing so.
///
/// Returns the number of records removed.
pub fn prune_expired_records(store: &DedupStore, ttl_hours: i64) -> Result<usize> {
    let cutoff = Utc::now() - Duration::hours(ttl_hours);
    let mut pruned = 0;

    for entry in std::fs::read_dir(store.dir())? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(path = %path.display(), %error, "Skipping unreadable record");
                continue;
            }
        };
        let record: DedupRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(error) => {
                warn!(path = %path.display(), %error, "Skipping unparseable record");
                continue;
            }
        };

        if record.recorded_at < cutoff {
            std::fs::remove_file(&path)?;
            debug!(fingerprint = %record.fingerprint, "Pruned expired record");
            pruned += 1;
        }
    }

    Ok(pruned)
}
