//! Domain types for the launchdeck view pipeline.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.
//! Everything the CLI renders is `Serialize` so `--json` output falls out of
//! the same structs the table view uses.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A launchd job label, e.g. `com.example.agent`. Unique within a domain.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Label(pub String);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Label {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Domains and launchctl targets
// ---------------------------------------------------------------------------

/// Which definition directory a job belongs to.
///
/// Variant order is display order: agent domains first, then daemons. The
/// derived `Ord` drives every sorted listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Domain {
    /// `~/Library/LaunchAgents`
    #[serde(rename = "user")]
    UserAgent,
    /// `/Library/LaunchAgents`
    #[serde(rename = "gui")]
    GuiSession,
    /// `/Library/LaunchDaemons`
    #[serde(rename = "daemon")]
    GlobalDaemon,
    /// `/System/Library/LaunchDaemons`
    #[serde(rename = "system")]
    SystemDaemon,
}

impl Domain {
    pub const ALL: [Domain; 4] = [
        Domain::UserAgent,
        Domain::GuiSession,
        Domain::GlobalDaemon,
        Domain::SystemDaemon,
    ];

    /// launchctl namespaces to consult when probing this domain.
    ///
    /// launchd registers per-user agents in the GUI session when one exists
    /// and in `user/<uid>` otherwise, so both agent domains look in both,
    /// GUI first. Daemon domains share the single `system` namespace.
    pub fn probe_targets(self, uid: u32) -> Vec<DomainTarget> {
        match self {
            Domain::UserAgent | Domain::GuiSession => {
                vec![DomainTarget::Gui(uid), DomainTarget::User(uid)]
            }
            Domain::GlobalDaemon | Domain::SystemDaemon => vec![DomainTarget::System],
        }
    }

    /// Namespace to address when acting on a job that is not currently
    /// visible in any target (e.g. enabling an unloaded agent).
    pub fn primary_target(self, uid: u32) -> DomainTarget {
        match self {
            Domain::UserAgent => DomainTarget::User(uid),
            Domain::GuiSession => DomainTarget::Gui(uid),
            Domain::GlobalDaemon | Domain::SystemDaemon => DomainTarget::System,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::UserAgent => write!(f, "user"),
            Domain::GuiSession => write!(f, "gui"),
            Domain::GlobalDaemon => write!(f, "daemon"),
            Domain::SystemDaemon => write!(f, "system"),
        }
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Domain::UserAgent),
            "gui" => Ok(Domain::GuiSession),
            "daemon" => Ok(Domain::GlobalDaemon),
            "system" => Ok(Domain::SystemDaemon),
            other => Err(format!(
                "unknown domain '{other}' (expected one of: user, gui, daemon, system)"
            )),
        }
    }
}

/// A launchctl addressing namespace: `system`, `user/<uid>` or `gui/<uid>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum DomainTarget {
    System,
    User(u32),
    Gui(u32),
}

impl DomainTarget {
    /// `<target>/<label>` — the service-target form launchctl verbs accept.
    pub fn service_target(&self, label: &Label) -> String {
        format!("{self}/{label}")
    }
}

impl fmt::Display for DomainTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DomainTarget::System => write!(f, "system"),
            DomainTarget::User(uid) => write!(f, "user/{uid}"),
            DomainTarget::Gui(uid) => write!(f, "gui/{uid}"),
        }
    }
}

impl From<DomainTarget> for String {
    fn from(target: DomainTarget) -> Self {
        target.to_string()
    }
}

/// Identity of a job: domain + label. Never merged across domains.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct JobKey {
    pub domain: Domain,
    pub label: Label,
}

impl JobKey {
    pub fn new(domain: Domain, label: impl Into<Label>) -> Self {
        Self { domain, label: label.into() }
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.domain, self.label)
    }
}

// ---------------------------------------------------------------------------
// Definitions (on-disk side)
// ---------------------------------------------------------------------------

/// The `KeepAlive` plist key collapsed to the three shapes launchd accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeepAlive {
    #[default]
    No,
    Always,
    /// A condition dictionary (SuccessfulExit, PathState, …).
    Conditional,
}

impl fmt::Display for KeepAlive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeepAlive::No => write!(f, "no"),
            KeepAlive::Always => write!(f, "always"),
            KeepAlive::Conditional => write!(f, "conditional"),
        }
    }
}

/// Declared properties parsed from a job's property list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<PathBuf>,
    #[serde(default)]
    pub program_arguments: Vec<String>,
    #[serde(default)]
    pub run_at_load: bool,
    #[serde(default)]
    pub keep_alive: KeepAlive,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    /// The declared `Disabled` key. Informational only — launchd's persisted
    /// overrides, not this key, decide whether a job may load.
    #[serde(default)]
    pub disabled: bool,
}

impl JobProperties {
    /// Executable shown in listings: `Program`, else `ProgramArguments[0]`.
    pub fn executable(&self) -> Option<&str> {
        self.program
            .as_deref()
            .and_then(|p| p.to_str())
            .or_else(|| self.program_arguments.first().map(String::as_str))
    }
}

/// Parse result for one definition file. A file that is not a valid property
/// list still produces an entry so one bad file never hides from a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclaredProperties {
    Parsed(JobProperties),
    Malformed { error: String },
}

impl DeclaredProperties {
    pub fn is_malformed(&self) -> bool {
        matches!(self, DeclaredProperties::Malformed { .. })
    }

    pub fn as_parsed(&self) -> Option<&JobProperties> {
        match self {
            DeclaredProperties::Parsed(props) => Some(props),
            DeclaredProperties::Malformed { .. } => None,
        }
    }
}

/// One job definition file, as read in a single store pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobDefinition {
    pub label: Label,
    pub domain: Domain,
    /// Absolute path of the plist this definition came from.
    pub source: PathBuf,
    pub modified_at: DateTime<Utc>,
    pub properties: DeclaredProperties,
}

impl JobDefinition {
    pub fn key(&self) -> JobKey {
        JobKey { domain: self.domain, label: self.label.clone() }
    }
}

// ---------------------------------------------------------------------------
// Live state (service-manager side)
// ---------------------------------------------------------------------------

/// One job as the service manager reports it. Rebuilt on every probe pass,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveStatus {
    pub label: Label,
    pub domain: Domain,
    /// Namespace the record was observed in.
    pub target: DomainTarget,
    /// The manager holds an in-memory registration for this label.
    pub loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_exit_code: Option<i32>,
    /// Persisted load permission — orthogonal to `loaded`.
    pub enabled: bool,
}

impl LiveStatus {
    pub fn key(&self) -> JobKey {
        JobKey { domain: self.domain, label: self.label.clone() }
    }

    pub fn is_running(&self) -> bool {
        self.pid.is_some()
    }
}

// ---------------------------------------------------------------------------
// Reconciled view
// ---------------------------------------------------------------------------

/// How a job's on-disk definition and live state relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyFlag {
    /// Defined, loaded and enabled.
    Consistent,
    /// Defined on disk but the manager does not hold it.
    DefinedNotLoaded,
    /// The manager reports it but no definition file exists (orphan).
    LoadedNotDefined,
    /// Loaded while its persisted override says disabled.
    DisabledButLoaded,
}

impl fmt::Display for ConsistencyFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsistencyFlag::Consistent => write!(f, "consistent"),
            ConsistencyFlag::DefinedNotLoaded => write!(f, "defined-not-loaded"),
            ConsistencyFlag::LoadedNotDefined => write!(f, "loaded-not-defined"),
            ConsistencyFlag::DisabledButLoaded => write!(f, "disabled-but-loaded"),
        }
    }
}

/// One job with both sides of the story and the verdict. Immutable; a new
/// reconciliation pass replaces the whole snapshot instead of editing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciledJob {
    pub key: JobKey,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<JobDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<LiveStatus>,
    pub flag: ConsistencyFlag,
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// The five operations the executor knows how to apply and verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobAction {
    Enable,
    Disable,
    Start,
    Stop,
    /// Unload + load again, picking up an edited definition file.
    Reload,
}

impl fmt::Display for JobAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobAction::Enable => write!(f, "enable"),
            JobAction::Disable => write!(f, "disable"),
            JobAction::Start => write!(f, "start"),
            JobAction::Stop => write!(f, "stop"),
            JobAction::Reload => write!(f, "reload"),
        }
    }
}

/// A single intended transition, consumed once by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationRequest {
    pub key: JobKey,
    pub action: JobAction,
    /// Flag the caller expects the job to settle on once the action
    /// verifies. `None` means the job should drop out of view entirely
    /// (clearing the last override of an undefined job leaves no record on
    /// either side).
    pub expected: Option<ConsistencyFlag>,
}

/// What became of an applied mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MutationOutcome {
    /// Post-condition observed (or already held — the idempotent no-op).
    Success,
    /// The manager rejected the operation.
    Failed { reason: String },
    /// Command issued but the post-condition never showed up within the
    /// attempt budget. The action may still land later.
    TimedOut { attempts: u32 },
}

impl MutationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, MutationOutcome::Success)
    }
}

impl fmt::Display for MutationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationOutcome::Success => write!(f, "success"),
            MutationOutcome::Failed { reason } => write!(f, "failed: {reason}"),
            MutationOutcome::TimedOut { attempts } => {
                write!(f, "timed out after {attempts} verification attempts")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
