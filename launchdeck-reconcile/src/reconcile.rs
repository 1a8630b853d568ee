//! The merge itself: definitions on one side, live statuses on the other,
//! one flagged entry per key.
//!
//! Flag precedence for a defined job:
//! 1. `DisabledButLoaded` (loaded while its override says disabled)
//! 2. `Consistent` (loaded and enabled)
//! 3. `DefinedNotLoaded` (everything else, including "no live record")
//!
//! A live record with no definition is always `LoadedNotDefined`, whatever
//! its loaded or enabled bits say.

use std::collections::{BTreeMap, BTreeSet};

use launchdeck_core::types::{
    ConsistencyFlag, JobDefinition, JobKey, LiveStatus, ReconciledJob,
};

/// Merge one pass of definitions and live statuses into a flagged snapshot.
///
/// Pure: same inputs, same output, nothing consulted besides the arguments.
/// Output is sorted by key; duplicate keys within one input keep the first
/// occurrence.
pub fn reconcile(definitions: &[JobDefinition], statuses: &[LiveStatus]) -> Vec<ReconciledJob> {
    let mut by_definition: BTreeMap<JobKey, &JobDefinition> = BTreeMap::new();
    for definition in definitions {
        by_definition.entry(definition.key()).or_insert(definition);
    }

    let mut by_status: BTreeMap<JobKey, &LiveStatus> = BTreeMap::new();
    for status in statuses {
        by_status.entry(status.key()).or_insert(status);
    }

    let mut keys: BTreeSet<JobKey> = by_definition.keys().cloned().collect();
    keys.extend(by_status.keys().cloned());

    let mut jobs = Vec::with_capacity(keys.len());
    for key in keys {
        let definition = by_definition.get(&key).copied();
        let status = by_status.get(&key).copied();
        let Some(flag) = flag_for(definition.is_some(), status) else {
            continue;
        };
        jobs.push(ReconciledJob {
            key,
            definition: definition.cloned(),
            status: status.cloned(),
            flag,
        });
    }
    jobs
}

/// The decision table, as a function. `None` only when there is nothing on
/// either side — a key the merge would never have produced.
pub fn flag_for(definition_present: bool, status: Option<&LiveStatus>) -> Option<ConsistencyFlag> {
    match (definition_present, status) {
        (true, Some(live)) if live.loaded && live.enabled => Some(ConsistencyFlag::Consistent),
        (true, Some(live)) if live.loaded => Some(ConsistencyFlag::DisabledButLoaded),
        (true, _) => Some(ConsistencyFlag::DefinedNotLoaded),
        (false, Some(_)) => Some(ConsistencyFlag::LoadedNotDefined),
        (false, None) => None,
    }
}
