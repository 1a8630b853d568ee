//! Shared view assembly for `list`, `show` and `watch`: read the definition
//! directories, probe the service manager, attribute and reconcile.

use anyhow::{Context, Result};

use launchdeck_core::types::{Domain, ReconciledJob};
use launchdeck_probe::Probe;
use launchdeck_reconcile::{attribute, reconcile};
use launchdeck_store::DefinitionStore;

/// One reconciled pass over a set of domains.
pub struct Snapshot {
    pub jobs: Vec<ReconciledJob>,
    /// The service manager could not be consulted; `jobs` carry definitions
    /// only and their flags mean nothing.
    pub degraded: bool,
}

/// Domains a view command operates on: `--all-domains`, an explicit
/// `--domain`, or the configured default.
pub fn requested_domains(all: bool, domain: Option<Domain>, fallback: Domain) -> Vec<Domain> {
    if all {
        Domain::ALL.to_vec()
    } else {
        vec![domain.unwrap_or(fallback)]
    }
}

/// Build one snapshot. Store errors abort; a probe failure degrades to a
/// definitions-only view instead (the manager being unreachable must never
/// hide what is on disk).
pub fn collect(store: &DefinitionStore, probe: &Probe, domains: &[Domain]) -> Result<Snapshot> {
    let mut definitions = Vec::new();
    for domain in domains {
        let batch = store
            .list(*domain)
            .with_context(|| format!("failed to read {domain} definitions"))?;
        definitions.extend(batch);
    }

    let mut statuses = Vec::new();
    let mut degraded = false;
    for pass in probe_passes(domains) {
        match probe.probe(pass) {
            Ok(batch) => statuses.extend(batch),
            Err(err) => {
                tracing::warn!(
                    domain = %pass,
                    error = %err,
                    "service manager unavailable; listing definitions only"
                );
                degraded = true;
                statuses.clear();
                break;
            }
        }
    }

    let statuses = attribute(statuses, &definitions);
    Ok(Snapshot {
        jobs: reconcile(&definitions, &statuses),
        degraded,
    })
}

/// Sibling domains share launchctl namespaces, so one probe pass per family
/// covers both; attribution re-homes the rows afterwards.
fn probe_passes(domains: &[Domain]) -> Vec<Domain> {
    let mut passes = Vec::new();
    let mut agents_covered = false;
    let mut daemons_covered = false;
    for domain in domains {
        match domain {
            Domain::UserAgent | Domain::GuiSession if !agents_covered => {
                agents_covered = true;
                passes.push(*domain);
            }
            Domain::GlobalDaemon | Domain::SystemDaemon if !daemons_covered => {
                daemons_covered = true;
                passes.push(*domain);
            }
            _ => {}
        }
    }
    passes
}
