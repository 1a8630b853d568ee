//! Which actions make sense from which states, what each one must look like
//! once it lands, and the flag a caller should expect afterwards.

use launchdeck_core::types::{
    ConsistencyFlag, DeclaredProperties, JobAction, JobDefinition, LiveStatus, MutationRequest,
};

use crate::error::{invalid, ExecError};

/// Fail fast on actions the manager cannot perform from the current state.
/// Everything rejected here produces [`ExecError::InvalidTransition`] before
/// any command is issued.
pub(crate) fn permitted(
    request: &MutationRequest,
    definition: Option<&JobDefinition>,
    status: Option<&LiveStatus>,
) -> Result<(), ExecError> {
    let key = &request.key;
    if definition.is_none() && status.is_none() {
        return Err(invalid(
            key,
            request.action,
            "job is neither defined on disk nor known to the service manager",
        ));
    }

    match request.action {
        JobAction::Start => match status {
            Some(live) if !live.loaded => Err(invalid(key, request.action, "job is not loaded")),
            Some(live) if !live.enabled => {
                Err(invalid(key, request.action, "job is disabled; enable it first"))
            }
            Some(_) => Ok(()),
            None => Err(invalid(key, request.action, "job is not loaded")),
        },
        JobAction::Reload => match definition.map(|d| &d.properties) {
            Some(DeclaredProperties::Parsed(_)) => Ok(()),
            Some(DeclaredProperties::Malformed { error }) => Err(invalid(
                key,
                request.action,
                format!("definition cannot be parsed: {error}"),
            )),
            None => Err(invalid(key, request.action, "no definition file on disk")),
        },
        JobAction::Enable | JobAction::Disable | JobAction::Stop => Ok(()),
    }
}

/// Whether the action's post-condition already holds for the observed state.
/// An absent record means "not loaded, no override" — enabled and stopped by
/// definition.
pub(crate) fn satisfied(action: JobAction, status: Option<&LiveStatus>) -> bool {
    match action {
        JobAction::Enable => status.map_or(true, |live| live.enabled),
        JobAction::Disable => status.is_some_and(|live| !live.enabled),
        JobAction::Start => status.is_some_and(LiveStatus::is_running),
        JobAction::Stop => status.map_or(true, |live| !live.is_running()),
        JobAction::Reload => status.is_some_and(|live| live.loaded),
    }
}

/// The flag a job should settle on once `action` lands, given what is known
/// about it right now. `None` predicts the job dropping out of view entirely,
/// which only happens when enabling clears the last override of an undefined
/// job.
pub fn expected_flag_after(
    action: JobAction,
    definition_present: bool,
    status: Option<&LiveStatus>,
) -> Option<ConsistencyFlag> {
    let loaded = match action {
        JobAction::Start | JobAction::Reload => true,
        JobAction::Enable | JobAction::Disable | JobAction::Stop => {
            status.is_some_and(|live| live.loaded)
        }
    };
    let enabled = match action {
        JobAction::Enable => true,
        JobAction::Disable => false,
        JobAction::Start | JobAction::Stop | JobAction::Reload => {
            status.map_or(true, |live| live.enabled)
        }
    };
    let record_remains = match action {
        // Enable clears the override; only a loaded job still has a row.
        JobAction::Enable => loaded,
        // Disable writes an override, which is itself a visible record.
        JobAction::Disable => true,
        JobAction::Start | JobAction::Stop | JobAction::Reload => loaded || status.is_some(),
    };

    match (definition_present, loaded) {
        (true, true) if enabled => Some(ConsistencyFlag::Consistent),
        (true, true) => Some(ConsistencyFlag::DisabledButLoaded),
        (true, false) => Some(ConsistencyFlag::DefinedNotLoaded),
        (false, _) if record_remains => Some(ConsistencyFlag::LoadedNotDefined),
        (false, _) => None,
    }
}
