// Machine resolver: turns a user-supplied identifier (name, numeric id or
// IP) into one machine record. Strategies are tried in a fixed order and
// the first hit wins: the local cache snapshot, then the live profile
// endpoint, then a scan of the starting-point listing when the profile
// endpoint punts.

use anyhow::Result;
use std::path::Path;
use tracing::debug;

use crate::api::{ApiClient, ProfileOutcome};
use crate::cache;
use crate::model::{Group, MachineRecord};

/// Resolve an identifier to a machine, cache first. A miss in every
/// strategy is `None`, which callers report as "no such machine" - it is
/// never an error.
pub fn resolve(
    api: &ApiClient,
    cache_file: &Path,
    ident: &str,
) -> Result<Option<(MachineRecord, Group)>> {
    if let Some(found) = resolve_from_cache(cache_file, ident) {
        return Ok(Some(found));
    }
    resolve_live(api, ident)
}

fn resolve_from_cache(cache_file: &Path, ident: &str) -> Option<(MachineRecord, Group)> {
    let snapshot = cache::load(cache_file)?;
    cache::warn_if_stale(&snapshot);
    let (record, group) = snapshot.find(ident)?;
    debug!(machine = %record.name, %group, "resolved from cache");
    Some((record.clone(), group))
}

/// The no-cache path: ask the profile endpoint directly; if it answers
/// "starting point", scan that listing for a name or id match.
pub fn resolve_live(api: &ApiClient, ident: &str) -> Result<Option<(MachineRecord, Group)>> {
    match api.machine_profile(ident)? {
        ProfileOutcome::Lab(record) => {
            let group = record.lab_group();
            Ok(Some((record, group)))
        }
        ProfileOutcome::StartingPoint => {
            let found = api
                .sp_machines()?
                .into_iter()
                .find(|m| m.name.eq_ignore_ascii_case(ident) || m.id.to_string() == ident);
            Ok(found.map(|m| (m, Group::StartingPoint)))
        }
        ProfileOutcome::NotFound => Ok(None),
    }
}

/// Resolve straight to an id for the actions that only need one. A string
/// of digits is taken at face value without a lookup; the server will
/// complain if no such id exists.
pub fn resolve_id(api: &ApiClient, cache_file: &Path, ident: &str) -> Result<Option<u64>> {
    if !ident.is_empty() && ident.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(id) = ident.parse() {
            return Ok(Some(id));
        }
    }
    Ok(resolve(api, cache_file, ident)?.map(|(record, _)| record.id))
}

/// Find a lab machine's IP the only way the API allows: fetch the whole
/// listing for its group and scan for its id. Slow, so callers put a
/// spinner around it and treat failure as "no IP to show".
pub fn lookup_ip(api: &ApiClient, ident: &str) -> Result<Option<String>> {
    let record = match api.machine_profile(ident)? {
        ProfileOutcome::Lab(record) => record,
        _ => return Ok(None),
    };
    let listing = api.list_group(record.lab_group())?;
    Ok(listing
        .into_iter()
        .find(|m| m.id == record.id)
        .and_then(|m| m.ip))
}
