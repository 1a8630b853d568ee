//! Applies mutations to the service manager and verifies they landed.
//!
//! One [`Executor::apply`] call is one mutation: take the per-label lock,
//! read both sides of the job, fail fast on impossible transitions,
//! short-circuit when there is nothing to do, otherwise issue the launchctl
//! commands and poll until the job settles on the expected state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::Mutex as AsyncMutex;

use launchdeck_core::types::{
    JobAction, JobDefinition, JobKey, LiveStatus, MutationOutcome, MutationRequest,
};
use launchdeck_probe::{Launchctl, Probe, ProbeError};
use launchdeck_reconcile::flag_for;
use launchdeck_store::DefinitionStore;

use crate::error::{invalid, ExecError};
use crate::policy::VerifyPolicy;
use crate::transition;

/// One launchctl invocation within a mutation plan. A tolerated step may
/// fail without failing the mutation (boot-out of a job that was never
/// loaded).
struct Step {
    args: Vec<String>,
    tolerated: bool,
}

impl Step {
    fn strict(args: Vec<String>) -> Self {
        Self {
            args,
            tolerated: false,
        }
    }

    fn tolerated(args: Vec<String>) -> Self {
        Self {
            args,
            tolerated: true,
        }
    }
}

pub struct Executor {
    store: Arc<DefinitionStore>,
    probe: Arc<Probe>,
    launchctl: Arc<dyn Launchctl>,
    policy: VerifyPolicy,
    locks: StdMutex<HashMap<JobKey, Arc<AsyncMutex<()>>>>,
}

impl Executor {
    pub fn new(
        store: Arc<DefinitionStore>,
        probe: Arc<Probe>,
        launchctl: Arc<dyn Launchctl>,
        policy: VerifyPolicy,
    ) -> Self {
        Self {
            store,
            probe,
            launchctl,
            policy,
            locks: StdMutex::new(HashMap::new()),
        }
    }

    /// Apply one mutation end to end.
    ///
    /// Returns the outcome of the attempt; `Err` means the request never got
    /// as far as the manager (impossible transition, unreadable store, or an
    /// unreachable manager — mutations are refused outright when the probe
    /// cannot see live state).
    ///
    /// Dropping the returned future stops local polling only. The command
    /// plan runs inside a single blocking task, so anything already issued
    /// runs to completion and is never rolled back.
    pub async fn apply(&self, request: &MutationRequest) -> Result<MutationOutcome, ExecError> {
        let lock = self.lock_for(&request.key);
        let _serialized = lock.lock().await;

        let definition = self.read_definition(&request.key).await?;
        let status = self.find_status(&request.key).await?;

        transition::permitted(request, definition.as_ref(), status.as_ref())?;

        // Reload always re-issues: its whole point is picking up an edited
        // file, which no live observation can rule out.
        if request.action != JobAction::Reload
            && transition::satisfied(request.action, status.as_ref())
            && flag_for(definition.is_some(), status.as_ref()) == request.expected
        {
            tracing::debug!(
                key = %request.key,
                action = %request.action,
                "already in the requested state; nothing issued"
            );
            return Ok(MutationOutcome::Success);
        }

        if let Some(rejected) = self
            .issue(request, definition.as_ref(), status.as_ref())
            .await?
        {
            return Ok(rejected);
        }

        self.verify(request, definition.is_some()).await
    }

    fn lock_for(&self, key: &JobKey) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key.clone()).or_default().clone()
    }

    async fn read_definition(&self, key: &JobKey) -> Result<Option<JobDefinition>, ExecError> {
        let store = self.store.clone();
        let key = key.clone();
        let definition = tokio::task::spawn_blocking(move || store.find(&key))
            .await
            .map_err(|err| ExecError::Join(err.to_string()))??;
        Ok(definition)
    }

    async fn find_status(&self, key: &JobKey) -> Result<Option<LiveStatus>, ExecError> {
        let probe = self.probe.clone();
        let key = key.clone();
        let status = tokio::task::spawn_blocking(move || probe.find(&key))
            .await
            .map_err(|err| ExecError::Join(err.to_string()))??;
        Ok(status)
    }

    async fn session_uid(&self) -> Result<u32, ExecError> {
        let probe = self.probe.clone();
        let uid = tokio::task::spawn_blocking(move || probe.session_uid())
            .await
            .map_err(|err| ExecError::Join(err.to_string()))??;
        Ok(uid)
    }

    /// Run the command plan. `Ok(None)` means every required step was
    /// accepted; `Ok(Some(Failed))` carries the manager's rejection.
    async fn issue(
        &self,
        request: &MutationRequest,
        definition: Option<&JobDefinition>,
        status: Option<&LiveStatus>,
    ) -> Result<Option<MutationOutcome>, ExecError> {
        let uid = self.session_uid().await?;
        let plan = command_plan(request, definition, status, uid)?;

        tracing::info!(
            key = %request.key,
            action = %request.action,
            "issuing mutation"
        );

        let launchctl = self.launchctl.clone();
        let key = request.key.clone();
        let rejection = tokio::task::spawn_blocking(move || -> Result<Option<String>, ProbeError> {
            for step in plan {
                let command = step.args.join(" ");
                let output = launchctl.invoke(&step.args)?;
                if output.success {
                    continue;
                }
                if step.tolerated {
                    tracing::debug!(
                        key = %key,
                        command = %command,
                        detail = %output.diagnostic(),
                        "tolerated launchctl failure"
                    );
                    continue;
                }
                tracing::warn!(
                    key = %key,
                    command = %command,
                    detail = %output.diagnostic(),
                    "launchctl rejected mutation"
                );
                return Ok(Some(output.diagnostic()));
            }
            Ok(None)
        })
        .await
        .map_err(|err| ExecError::Join(err.to_string()))??;

        Ok(rejection.map(|reason| MutationOutcome::Failed { reason }))
    }

    /// Poll the probe until the post-condition holds and the job sits on the
    /// expected flag, or the attempt budget runs out.
    async fn verify(
        &self,
        request: &MutationRequest,
        definition_present: bool,
    ) -> Result<MutationOutcome, ExecError> {
        for attempt in 0..self.policy.attempts {
            let delay = self.policy.delay_before(attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let observed = self.find_status(&request.key).await?;
            if transition::satisfied(request.action, observed.as_ref())
                && flag_for(definition_present, observed.as_ref()) == request.expected
            {
                tracing::info!(
                    key = %request.key,
                    action = %request.action,
                    attempts = attempt + 1,
                    "mutation verified"
                );
                return Ok(MutationOutcome::Success);
            }
        }

        tracing::warn!(
            key = %request.key,
            action = %request.action,
            attempts = self.policy.attempts,
            "mutation not observed within the attempt budget"
        );
        Ok(MutationOutcome::TimedOut {
            attempts: self.policy.attempts,
        })
    }
}

fn command_plan(
    request: &MutationRequest,
    definition: Option<&JobDefinition>,
    status: Option<&LiveStatus>,
    uid: u32,
) -> Result<Vec<Step>, ExecError> {
    // Address the namespace the job was actually observed in; fall back to
    // the domain's own target for jobs with no live record yet.
    let target = status
        .map(|live| live.target)
        .unwrap_or_else(|| request.key.domain.primary_target(uid));
    let service = target.service_target(&request.key.label);

    let plan = match request.action {
        JobAction::Enable => vec![Step::strict(vec!["enable".to_owned(), service])],
        JobAction::Disable => vec![Step::strict(vec!["disable".to_owned(), service])],
        JobAction::Start => vec![Step::strict(vec!["kickstart".to_owned(), service])],
        JobAction::Stop => vec![Step::strict(vec![
            "kill".to_owned(),
            "TERM".to_owned(),
            service,
        ])],
        JobAction::Reload => {
            let Some(source) = definition.map(|def| def.source.clone()) else {
                return Err(invalid(
                    &request.key,
                    request.action,
                    "no definition file on disk",
                ));
            };
            vec![
                Step::tolerated(vec!["bootout".to_owned(), service]),
                Step::strict(vec![
                    "bootstrap".to_owned(),
                    target.to_string(),
                    source.display().to_string(),
                ]),
            ]
        }
    };
    Ok(plan)
}
