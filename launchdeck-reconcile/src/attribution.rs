//! Re-homing of live records for multi-domain views.
//!
//! The service manager keeps one namespace per session, not one per
//! definition directory: both agent domains resolve to the same gui/user
//! targets and both daemon domains resolve to `system`. A per-domain probe
//! therefore attributes every row to whichever domain it was asked about,
//! and an aggregated view built from several probe passes would show the
//! same live job once per sibling domain, each copy an apparent orphan.
//!
//! `attribute` fixes both problems in one pure pass: duplicate labels
//! within a namespace family collapse to one record, and each record moves
//! to the family domain that actually defines its label.

use std::collections::HashSet;

use launchdeck_core::types::{Domain, JobDefinition, JobKey, Label, LiveStatus};

/// Collapse per-namespace duplicates and re-home each live record to the
/// sibling domain defining its label. Records no domain defines keep the
/// probe's attribution — those are the true orphans.
pub fn attribute(statuses: Vec<LiveStatus>, definitions: &[JobDefinition]) -> Vec<LiveStatus> {
    let defined: HashSet<JobKey> = definitions.iter().map(JobDefinition::key).collect();

    let mut seen: HashSet<(bool, Label)> = HashSet::new();
    let mut attributed = Vec::with_capacity(statuses.len());
    for mut status in statuses {
        if !seen.insert((is_agent(status.domain), status.label.clone())) {
            continue;
        }
        if !defined.contains(&status.key()) {
            let sibling = sibling_of(status.domain);
            if defined.contains(&JobKey::new(sibling, status.label.clone())) {
                status.domain = sibling;
            }
        }
        attributed.push(status);
    }
    attributed
}

fn is_agent(domain: Domain) -> bool {
    matches!(domain, Domain::UserAgent | Domain::GuiSession)
}

fn sibling_of(domain: Domain) -> Domain {
    match domain {
        Domain::UserAgent => Domain::GuiSession,
        Domain::GuiSession => Domain::UserAgent,
        Domain::GlobalDaemon => Domain::SystemDaemon,
        Domain::SystemDaemon => Domain::GlobalDaemon,
    }
}
