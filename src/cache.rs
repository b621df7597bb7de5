// Cache store: one flat JSON file holding a snapshot of all three machine
// listings. Written only by an explicit refresh, read opportunistically by
// the resolver. Single-user tool, so no locking.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::model::{CacheSnapshot, Group};

/// How old a snapshot may get before lookups start nagging about it.
/// Advisory only; a stale snapshot is still used.
pub const STALE_AFTER_SECS: u64 = 300_000;

/// Fetch all three listings, stamp the snapshot and overwrite the cache
/// file. No merging with whatever was there before.
pub fn refresh(api: &ApiClient, path: &Path) -> Result<CacheSnapshot> {
    let snapshot = CacheSnapshot {
        active: api.list_group(Group::Active)?,
        retired: api.list_group(Group::Retired)?,
        starting_point: api.list_group(Group::StartingPoint)?,
        created_at: unix_now(),
    };
    let json = serde_json::to_string(&snapshot).context("serializing machine cache")?;
    fs::write(path, json)
        .with_context(|| format!("writing machine cache to {}", path.display()))?;
    Ok(snapshot)
}

/// Read the snapshot back. A missing or unparseable file is simply no
/// cache; the caller falls through to live queries.
pub fn load(path: &Path) -> Option<CacheSnapshot> {
    let data = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&data) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            debug!(%err, path = %path.display(), "ignoring unreadable machine cache");
            None
        }
    }
}

pub fn warn_if_stale(snapshot: &CacheSnapshot) {
    let age = snapshot.age_secs(unix_now());
    if is_stale(age) {
        warn!(
            age_secs = age,
            "machine cache is stale, consider running `htb refresh`"
        );
    }
}

pub fn is_stale(age_secs: u64) -> bool {
    age_secs > STALE_AFTER_SECS
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn staleness_boundary() {
        assert!(!is_stale(0));
        assert!(!is_stale(299_999));
        assert!(!is_stale(300_000));
        assert!(is_stale(300_001));
    }

    #[test]
    fn load_missing_file_is_none() {
        assert!(load(Path::new("/nonexistent/htb_cache.json")).is_none());
    }

    #[test]
    fn load_malformed_file_is_none() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        assert!(load(file.path()).is_none());
    }

    #[test]
    fn load_roundtrips_a_snapshot() {
        let snapshot = CacheSnapshot {
            active: vec![],
            retired: vec![],
            starting_point: vec![],
            created_at: 12345,
        };
        let file = tempfile::NamedTempFile::new().unwrap();
        fs::write(file.path(), serde_json::to_string(&snapshot).unwrap()).unwrap();
        let loaded = load(file.path()).unwrap();
        assert_eq!(loaded.created_at, 12345);
        assert!(loaded.active.is_empty());
    }
}
