//! Live State Probe.
//!
//! One probe pass per domain: `launchctl print` for the service table,
//! `launchctl print-disabled` for the persisted overrides, merged across the
//! domain's namespaces (GUI session first for agents). Results are rebuilt
//! from scratch every call — nothing live is ever cached or persisted.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, OnceLock};

use launchdeck_core::types::{Domain, DomainTarget, JobKey, Label, LiveStatus};

use crate::error::ProbeError;
use crate::launchctl::{resolve_uid, Launchctl};
use crate::parse::{parse_print_disabled, parse_print_services};

/// Queries the running service manager for per-domain live state.
pub struct Probe {
    launchctl: Arc<dyn Launchctl>,
    uid: OnceLock<u32>,
}

impl Probe {
    /// Probe resolving the uid lazily via `id -u` on first use.
    pub fn new(launchctl: Arc<dyn Launchctl>) -> Self {
        Self {
            launchctl,
            uid: OnceLock::new(),
        }
    }

    /// Probe with a fixed uid. Tests use this; so can callers that already
    /// know the session uid.
    pub fn with_uid(launchctl: Arc<dyn Launchctl>, uid: u32) -> Self {
        let cell = OnceLock::new();
        let _ = cell.set(uid);
        Self {
            launchctl,
            uid: cell,
        }
    }

    /// The uid this probe targets its per-user namespaces at, resolved via
    /// `id -u` on first use and cached for the probe's lifetime.
    pub fn session_uid(&self) -> Result<u32, ProbeError> {
        if let Some(uid) = self.uid.get() {
            return Ok(*uid);
        }
        let uid = resolve_uid()?;
        Ok(*self.uid.get_or_init(|| uid))
    }

    /// Every live record visible for `domain`, one per label.
    ///
    /// When a label is visible in more than one namespace the first target
    /// in [`Domain::probe_targets`] order wins.
    pub fn probe(&self, domain: Domain) -> Result<Vec<LiveStatus>, ProbeError> {
        let uid = self.session_uid()?;
        let mut statuses = Vec::new();
        let mut seen: HashSet<Label> = HashSet::new();

        for target in domain.probe_targets(uid) {
            for status in self.snapshot_target(target, domain)? {
                if seen.insert(status.label.clone()) {
                    statuses.push(status);
                }
            }
        }

        tracing::debug!(domain = %domain, count = statuses.len(), "probe pass complete");
        Ok(statuses)
    }

    /// The live record for one key, if the manager has one.
    pub fn find(&self, key: &JobKey) -> Result<Option<LiveStatus>, ProbeError> {
        Ok(self
            .probe(key.domain)?
            .into_iter()
            .find(|status| status.label == key.label))
    }

    /// Raw per-service `launchctl print` text for the detail view.
    /// `Ok(None)` when no namespace of the domain knows the label.
    pub fn print_service(&self, key: &JobKey) -> Result<Option<String>, ProbeError> {
        let uid = self.session_uid()?;
        for target in key.domain.probe_targets(uid) {
            let args = vec!["print".to_owned(), target.service_target(&key.label)];
            let output = self.launchctl.invoke(&args)?;
            if output.success {
                return Ok(Some(output.stdout));
            }
        }
        Ok(None)
    }

    fn snapshot_target(
        &self,
        target: DomainTarget,
        domain: Domain,
    ) -> Result<Vec<LiveStatus>, ProbeError> {
        let args = vec!["print".to_owned(), target.to_string()];
        let print = self.launchctl.invoke(&args)?;
        if !print.success {
            return Err(ProbeError::Unavailable {
                details: format!("launchctl print {target} failed: {}", print.diagnostic()),
            });
        }

        let rows = parse_print_services(&print.stdout);
        let overrides = self.disabled_overrides(target)?;

        let mut seen: HashSet<Label> = HashSet::new();
        let mut statuses = Vec::with_capacity(rows.len());
        for row in rows {
            seen.insert(row.label.clone());
            let disabled = overrides.get(&row.label).copied().unwrap_or(false);
            statuses.push(LiveStatus {
                label: row.label,
                domain,
                target,
                loaded: true,
                pid: row.pid,
                last_exit_code: row.last_exit_code,
                enabled: !disabled,
            });
        }

        // A disabled override with no service row is residual manager state
        // worth surfacing; an enabled override merely restates the default.
        for (label, disabled) in overrides {
            if !disabled || seen.contains(&label) {
                continue;
            }
            statuses.push(LiveStatus {
                label,
                domain,
                target,
                loaded: false,
                pid: None,
                last_exit_code: None,
                enabled: false,
            });
        }

        Ok(statuses)
    }

    fn disabled_overrides(&self, target: DomainTarget) -> Result<BTreeMap<Label, bool>, ProbeError> {
        let args = vec!["print-disabled".to_owned(), target.to_string()];
        match self.launchctl.invoke(&args)? {
            output if output.success => Ok(parse_print_disabled(&output.stdout)),
            output => {
                // The manager answered `print`, so it is reachable; treat a
                // refused override query as "no overrides" instead of
                // degrading the whole probe.
                tracing::warn!(
                    target = %target,
                    detail = %output.diagnostic(),
                    "print-disabled failed; assuming default-enabled"
                );
                Ok(BTreeMap::new())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
