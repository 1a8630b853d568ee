//! Flag transitions between two reconciliation snapshots, for `watch`-style
//! callers that only want to print what changed.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use launchdeck_core::types::{ConsistencyFlag, JobKey, ReconciledJob};

/// One key whose flag differs between two snapshots. `None` on either side
/// means the key was absent from that snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagTransition {
    pub key: JobKey,
    pub previous: Option<ConsistencyFlag>,
    pub current: Option<ConsistencyFlag>,
}

impl FlagTransition {
    pub fn appeared(&self) -> bool {
        self.previous.is_none()
    }

    pub fn disappeared(&self) -> bool {
        self.current.is_none()
    }
}

/// Exactly the keys whose flag changed between `previous` and `current`,
/// including appearances and disappearances, sorted by key. `diff(x, x)` is
/// empty.
pub fn diff(previous: &[ReconciledJob], current: &[ReconciledJob]) -> Vec<FlagTransition> {
    let before = flags_by_key(previous);
    let after = flags_by_key(current);

    let mut keys: BTreeSet<&JobKey> = before.keys().copied().collect();
    keys.extend(after.keys());

    let mut transitions = Vec::new();
    for key in keys {
        let old = before.get(key).copied();
        let new = after.get(key).copied();
        if old != new {
            transitions.push(FlagTransition {
                key: key.clone(),
                previous: old,
                current: new,
            });
        }
    }
    transitions
}

fn flags_by_key(jobs: &[ReconciledJob]) -> BTreeMap<&JobKey, ConsistencyFlag> {
    let mut flags = BTreeMap::new();
    for job in jobs {
        flags.entry(&job.key).or_insert(job.flag);
    }
    flags
}
