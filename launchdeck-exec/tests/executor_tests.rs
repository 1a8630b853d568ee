use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tokio_test::assert_ok;

use launchdeck_core::types::{
    ConsistencyFlag, Domain, JobAction, JobKey, MutationOutcome, MutationRequest,
};
use launchdeck_exec::{expected_flag_after, ExecError, Executor, VerifyPolicy};
use launchdeck_probe::{CmdOutput, Launchctl, Probe, ProbeError};
use launchdeck_store::{DefinitionStore, DomainLayout};

const LABEL: &str = "com.example.sample";

// ---------------------------------------------------------------------------
// A fake launchd: answers print/print-disabled from in-memory state and
// interprets the mutation verbs against it, so the executor's probe reads
// see the consequences of its own commands.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct ManagerState {
    /// label -> pid of the running process, None when loaded but idle.
    rows: BTreeMap<String, Option<u32>>,
    /// label -> disabled bit of the persisted override.
    overrides: BTreeMap<String, bool>,
}

struct FakeInner {
    current: ManagerState,
    /// Pre-mutation snapshot served for this many more probe passes.
    stale: Option<(u32, ManagerState)>,
    settle_polls: u32,
    calls: Vec<String>,
    fail_verbs: HashMap<String, String>,
    /// When set, `kill` is accepted but the process never dies.
    stubborn_kill: bool,
    slow_mutations: Option<Duration>,
    active: u32,
    max_active: u32,
    next_pid: u32,
}

struct FakeManager {
    inner: Mutex<FakeInner>,
}

impl FakeManager {
    fn new() -> Self {
        Self {
            inner: Mutex::new(FakeInner {
                current: ManagerState::default(),
                stale: None,
                settle_polls: 0,
                calls: Vec::new(),
                fail_verbs: HashMap::new(),
                stubborn_kill: false,
                slow_mutations: None,
                active: 0,
                max_active: 0,
                next_pid: 500,
            }),
        }
    }

    fn seed_row(&self, label: &str, pid: Option<u32>) {
        self.lock().current.rows.insert(label.to_owned(), pid);
    }

    fn seed_override(&self, label: &str, disabled: bool) {
        self.lock()
            .current
            .overrides
            .insert(label.to_owned(), disabled);
    }

    fn fail_verb(&self, verb: &str, stderr: &str) {
        self.lock()
            .fail_verbs
            .insert(verb.to_owned(), stderr.to_owned());
    }

    /// Probe passes keep seeing the pre-mutation state for `polls` passes
    /// after each mutation, imitating launchd's settle delay.
    fn settle_after_polls(&self, polls: u32) {
        self.lock().settle_polls = polls;
    }

    fn stubborn_kill(&self) {
        self.lock().stubborn_kill = true;
    }

    fn slow_mutations(&self, delay: Duration) {
        self.lock().slow_mutations = Some(delay);
    }

    fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn mutation_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| !call.starts_with("print"))
            .collect()
    }

    fn pass_heads(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| is_pass_head(call))
            .count()
    }

    fn override_of(&self, label: &str) -> Option<bool> {
        self.lock().current.overrides.get(label).copied()
    }

    fn pid_of(&self, label: &str) -> Option<Option<u32>> {
        self.lock().current.rows.get(label).copied()
    }

    fn max_active(&self) -> u32 {
        self.lock().max_active
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeInner> {
        self.inner.lock().expect("fake manager lock")
    }

    fn run_mutation(&self, apply: impl FnOnce(&mut ManagerState)) {
        let delay = {
            let mut inner = self.lock();
            inner.active += 1;
            inner.max_active = inner.max_active.max(inner.active);
            inner.slow_mutations
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let mut inner = self.lock();
        if inner.settle_polls > 0 && inner.stale.is_none() {
            inner.stale = Some((inner.settle_polls, inner.current.clone()));
        }
        apply(&mut inner.current);
        inner.active -= 1;
    }
}

fn is_pass_head(call: &str) -> bool {
    let mut parts = call.split_whitespace();
    parts.next() == Some("print")
        && parts
            .next()
            .is_some_and(|target| target.starts_with("gui/") || target == "system")
}

fn success(stdout: String) -> CmdOutput {
    CmdOutput {
        success: true,
        code: Some(0),
        stdout,
        stderr: String::new(),
    }
}

fn failure(stderr: &str) -> CmdOutput {
    CmdOutput {
        success: false,
        code: Some(5),
        stdout: String::new(),
        stderr: stderr.to_owned(),
    }
}

fn render_services(state: &ManagerState) -> String {
    let mut out = String::from("com.apple.xpc.launchd.domain = {\n\tservices = {\n");
    for (label, pid) in &state.rows {
        let pid_col = pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_owned());
        out.push_str(&format!("\t\t{pid_col}\t0\t{label}\n"));
    }
    out.push_str("\t}\n}\n");
    out
}

fn render_overrides(state: &ManagerState) -> String {
    let mut out = String::from("disabled services = {\n");
    for (label, disabled) in &state.overrides {
        let word = if *disabled { "disabled" } else { "enabled" };
        out.push_str(&format!("\t\"{label}\" => {word}\n"));
    }
    out.push_str("}\n");
    out
}

fn label_of(service_target: &str) -> String {
    service_target
        .rsplit('/')
        .next()
        .unwrap_or(service_target)
        .to_owned()
}

impl Launchctl for FakeManager {
    fn invoke(&self, args: &[String]) -> Result<CmdOutput, ProbeError> {
        let call = args.join(" ");
        let verb = args.first().map(String::as_str).unwrap_or("");

        {
            let mut inner = self.lock();
            inner.calls.push(call.clone());
            if let Some(stderr) = inner.fail_verbs.get(verb).cloned() {
                return Ok(failure(&stderr));
            }
        }

        match verb {
            "print" => {
                let mut inner = self.lock();
                if is_pass_head(&call) {
                    if matches!(inner.stale, Some((0, _))) {
                        inner.stale = None;
                    } else if let Some((remaining, _)) = inner.stale.as_mut() {
                        *remaining -= 1;
                    }
                }
                let state = inner
                    .stale
                    .as_ref()
                    .map(|(_, snapshot)| snapshot.clone())
                    .unwrap_or_else(|| inner.current.clone());
                Ok(success(render_services(&state)))
            }
            "print-disabled" => {
                let inner = self.lock();
                let state = inner
                    .stale
                    .as_ref()
                    .map(|(_, snapshot)| snapshot.clone())
                    .unwrap_or_else(|| inner.current.clone());
                Ok(success(render_overrides(&state)))
            }
            "enable" => {
                let label = label_of(&args[1]);
                self.run_mutation(|state| {
                    state.overrides.insert(label, false);
                });
                Ok(success(String::new()))
            }
            "disable" => {
                let label = label_of(&args[1]);
                self.run_mutation(|state| {
                    state.overrides.insert(label, true);
                });
                Ok(success(String::new()))
            }
            "kickstart" => {
                let label = label_of(&args[1]);
                if self.pid_of(&label).is_none() {
                    return Ok(failure("Could not find service in domain for port"));
                }
                let pid = {
                    let mut inner = self.lock();
                    inner.next_pid += 1;
                    inner.next_pid
                };
                self.run_mutation(|state| {
                    state.rows.insert(label, Some(pid));
                });
                Ok(success(String::new()))
            }
            "kill" => {
                let label = label_of(&args[2]);
                if self.pid_of(&label).is_none() {
                    return Ok(failure("No such process"));
                }
                if self.lock().stubborn_kill {
                    return Ok(success(String::new()));
                }
                self.run_mutation(|state| {
                    state.rows.insert(label, None);
                });
                Ok(success(String::new()))
            }
            "bootout" => {
                let label = label_of(&args[1]);
                if self.pid_of(&label).is_none() {
                    return Ok(failure("Boot-out failed: 3: No such process"));
                }
                self.run_mutation(|state| {
                    state.rows.remove(&label);
                });
                Ok(success(String::new()))
            }
            "bootstrap" => {
                let label = Path::new(&args[2])
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .unwrap_or("")
                    .to_owned();
                if self.override_of(&label) == Some(true) {
                    return Ok(failure("Bootstrap failed: 125: Domain does not support specified action"));
                }
                let pid = {
                    let mut inner = self.lock();
                    inner.next_pid += 1;
                    inner.next_pid
                };
                self.run_mutation(|state| {
                    state.rows.insert(label, Some(pid));
                });
                Ok(success(String::new()))
            }
            other => Ok(failure(&format!("Unrecognized subcommand: {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

struct Fixture {
    _root: TempDir,
    exec: Arc<Executor>,
    fake: Arc<FakeManager>,
    user_agents: PathBuf,
}

fn fixture(policy: VerifyPolicy) -> Fixture {
    let root = TempDir::new().expect("root");
    let layout = DomainLayout::rooted(root.path());
    let user_agents = layout.dir(Domain::UserAgent).to_path_buf();
    let store = Arc::new(DefinitionStore::new(layout));
    let fake = Arc::new(FakeManager::new());
    let probe = Arc::new(Probe::with_uid(fake.clone(), 501));
    let exec = Arc::new(Executor::new(store, probe, fake.clone(), policy));
    Fixture {
        _root: root,
        exec,
        fake,
        user_agents,
    }
}

fn quick_policy(attempts: u32) -> VerifyPolicy {
    VerifyPolicy {
        attempts,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(10),
    }
}

fn write_agent(dir: &Path, label: &str) -> PathBuf {
    fs::create_dir_all(dir).expect("create agents dir");
    let path = dir.join(format!("{label}.plist"));
    let body = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
        <string>/usr/bin/true</string>
    </array>
</dict>
</plist>
"#
    );
    fs::write(&path, body).expect("write plist");
    path
}

fn request(action: JobAction, expected: Option<ConsistencyFlag>) -> MutationRequest {
    MutationRequest {
        key: JobKey::new(Domain::UserAgent, LABEL),
        action,
        expected,
    }
}

// ---------------------------------------------------------------------------
// Happy paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn enable_clears_the_override_and_verifies() {
    let fx = fixture(quick_policy(4));
    write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, Some(77));
    fx.fake.seed_override(LABEL, true);

    let outcome = tokio_test::assert_ok!(
        fx.exec
            .apply(&request(JobAction::Enable, Some(ConsistencyFlag::Consistent)))
            .await
    );

    assert_eq!(outcome, MutationOutcome::Success);
    assert_eq!(fx.fake.override_of(LABEL), Some(false));
    assert_eq!(
        fx.fake.mutation_calls(),
        vec![format!("enable gui/501/{LABEL}")],
        "the row was observed in the GUI namespace, so that is where enable goes"
    );
}

#[tokio::test]
async fn enable_on_an_already_enabled_job_issues_nothing() {
    let fx = fixture(quick_policy(4));
    write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, Some(77));

    let outcome = tokio_test::assert_ok!(
        fx.exec
            .apply(&request(JobAction::Enable, Some(ConsistencyFlag::Consistent)))
            .await
    );

    assert_eq!(outcome, MutationOutcome::Success);
    assert!(
        fx.fake.mutation_calls().is_empty(),
        "idempotent mutation must not reach the manager: {:?}",
        fx.fake.mutation_calls()
    );
}

#[tokio::test]
async fn disable_of_an_unloaded_definition_targets_its_own_domain() {
    let fx = fixture(quick_policy(4));
    write_agent(&fx.user_agents, LABEL);

    let outcome = tokio_test::assert_ok!(
        fx.exec
            .apply(&request(
                JobAction::Disable,
                Some(ConsistencyFlag::DefinedNotLoaded),
            ))
            .await
    );

    assert_eq!(outcome, MutationOutcome::Success);
    assert_eq!(fx.fake.override_of(LABEL), Some(true));
    assert_eq!(
        fx.fake.mutation_calls(),
        vec![format!("disable user/501/{LABEL}")],
        "no live record, so the domain's own per-user namespace is addressed"
    );
}

#[tokio::test]
async fn start_kickstarts_and_polls_until_the_pid_shows_up() {
    let fx = fixture(quick_policy(5));
    write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, None);
    fx.fake.settle_after_polls(2);

    let outcome = tokio_test::assert_ok!(
        fx.exec
            .apply(&request(JobAction::Start, Some(ConsistencyFlag::Consistent)))
            .await
    );

    assert_eq!(outcome, MutationOutcome::Success);
    assert_eq!(
        fx.fake.mutation_calls(),
        vec![format!("kickstart gui/501/{LABEL}")]
    );
    assert!(
        fx.fake.pid_of(LABEL).expect("row").is_some(),
        "kickstart must have produced a pid"
    );
}

#[tokio::test]
async fn reload_boots_out_then_bootstraps_even_when_already_loaded() {
    let fx = fixture(quick_policy(4));
    let source = write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, Some(90));

    let outcome = tokio_test::assert_ok!(
        fx.exec
            .apply(&request(JobAction::Reload, Some(ConsistencyFlag::Consistent)))
            .await
    );

    assert_eq!(outcome, MutationOutcome::Success);
    let issued = fx.fake.mutation_calls();
    assert_eq!(
        issued,
        vec![
            format!("bootout gui/501/{LABEL}"),
            format!("bootstrap gui/501 {}", source.display()),
        ],
        "reload must re-issue even though the job was already loaded"
    );
    let pid = fx.fake.pid_of(LABEL).expect("row").expect("pid");
    assert_ne!(pid, 90, "bootstrap starts a fresh process");
}

#[tokio::test]
async fn reload_tolerates_bootout_of_a_job_that_was_never_loaded() {
    let fx = fixture(quick_policy(4));
    write_agent(&fx.user_agents, LABEL);

    let outcome = tokio_test::assert_ok!(
        fx.exec
            .apply(&request(JobAction::Reload, Some(ConsistencyFlag::Consistent)))
            .await
    );

    assert_eq!(outcome, MutationOutcome::Success);
    let issued = fx.fake.mutation_calls();
    assert_eq!(issued.len(), 2, "bootout rejection is tolerated: {issued:?}");
    assert!(issued[1].starts_with("bootstrap user/501 "));
}

// ---------------------------------------------------------------------------
// Fail-fast transitions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn start_of_a_not_loaded_job_is_rejected_before_any_command() {
    let fx = fixture(quick_policy(4));
    write_agent(&fx.user_agents, LABEL);

    let err = fx
        .exec
        .apply(&request(JobAction::Start, Some(ConsistencyFlag::Consistent)))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::InvalidTransition { .. }), "got: {err}");
    assert!(err.to_string().contains("not loaded"));
    assert!(fx.fake.mutation_calls().is_empty());
}

#[tokio::test]
async fn start_of_a_disabled_job_is_rejected() {
    let fx = fixture(quick_policy(4));
    write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, None);
    fx.fake.seed_override(LABEL, true);

    let err = fx
        .exec
        .apply(&request(JobAction::Start, Some(ConsistencyFlag::Consistent)))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("disabled"));
    assert!(fx.fake.mutation_calls().is_empty());
}

#[tokio::test]
async fn reload_of_an_orphan_is_rejected() {
    let fx = fixture(quick_policy(4));
    fx.fake.seed_row(LABEL, Some(12));

    let err = fx
        .exec
        .apply(&request(
            JobAction::Reload,
            Some(ConsistencyFlag::LoadedNotDefined),
        ))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("no definition file"));
    assert!(fx.fake.mutation_calls().is_empty());
}

#[tokio::test]
async fn any_action_on_a_wholly_unknown_job_is_rejected() {
    let fx = fixture(quick_policy(4));

    let err = fx
        .exec
        .apply(&request(JobAction::Enable, None))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::InvalidTransition { .. }), "got: {err}");
}

// ---------------------------------------------------------------------------
// Failure and timeout outcomes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn manager_rejection_becomes_failed_with_its_diagnostic() {
    let fx = fixture(quick_policy(4));
    write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, None);
    fx.fake.fail_verb("kickstart", "Operation not permitted");

    let outcome = tokio_test::assert_ok!(
        fx.exec
            .apply(&request(JobAction::Start, Some(ConsistencyFlag::Consistent)))
            .await
    );

    match outcome {
        MutationOutcome::Failed { reason } => {
            assert!(reason.contains("Operation not permitted"), "reason: {reason}")
        }
        other => panic!("expected Failed, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stop_that_never_lands_times_out_with_the_attempt_budget() {
    let fx = fixture(VerifyPolicy {
        attempts: 4,
        initial_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(800),
    });
    write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, Some(61));
    fx.fake.stubborn_kill();

    let outcome = tokio_test::assert_ok!(
        fx.exec
            .apply(&request(JobAction::Stop, Some(ConsistencyFlag::Consistent)))
            .await
    );

    assert_eq!(outcome, MutationOutcome::TimedOut { attempts: 4 });
    // One probe pass before issuing, then one per verification attempt.
    assert_eq!(fx.fake.pass_heads(), 5);
}

#[tokio::test]
async fn unreachable_manager_refuses_the_mutation_outright() {
    let fx = fixture(quick_policy(4));
    write_agent(&fx.user_agents, LABEL);
    fx.fake.fail_verb("print", "Could not find domain");

    let err = fx
        .exec
        .apply(&request(JobAction::Enable, Some(ConsistencyFlag::Consistent)))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::Probe(_)), "got: {err}");
    assert!(fx.fake.mutation_calls().is_empty());
}

// ---------------------------------------------------------------------------
// Concurrency and cancellation
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_mutations_of_one_label_collapse_to_a_single_command() {
    let fx = fixture(quick_policy(6));
    write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, Some(31));
    fx.fake.seed_override(LABEL, true);
    fx.fake.slow_mutations(Duration::from_millis(40));

    let first = {
        let exec = fx.exec.clone();
        tokio::spawn(async move {
            exec.apply(&request(JobAction::Enable, Some(ConsistencyFlag::Consistent)))
                .await
        })
    };
    let second = {
        let exec = fx.exec.clone();
        tokio::spawn(async move {
            exec.apply(&request(JobAction::Enable, Some(ConsistencyFlag::Consistent)))
                .await
        })
    };

    let first = first.await.expect("join").expect("apply");
    let second = second.await.expect("join").expect("apply");

    assert_eq!(first, MutationOutcome::Success);
    assert_eq!(second, MutationOutcome::Success);
    assert_eq!(
        fx.fake.mutation_calls().len(),
        1,
        "second caller must observe the first one's work and no-op"
    );
    assert_eq!(fx.fake.max_active(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn different_labels_mutate_in_parallel() {
    let fx = fixture(quick_policy(6));
    let other = "com.example.other";
    write_agent(&fx.user_agents, LABEL);
    write_agent(&fx.user_agents, other);
    fx.fake.seed_row(LABEL, Some(31));
    fx.fake.seed_override(LABEL, true);
    fx.fake.seed_row(other, Some(32));
    fx.fake.seed_override(other, true);
    fx.fake.slow_mutations(Duration::from_millis(60));

    let first = {
        let exec = fx.exec.clone();
        tokio::spawn(async move {
            exec.apply(&request(JobAction::Enable, Some(ConsistencyFlag::Consistent)))
                .await
        })
    };
    let second = {
        let exec = fx.exec.clone();
        tokio::spawn(async move {
            exec.apply(&MutationRequest {
                key: JobKey::new(Domain::UserAgent, other),
                action: JobAction::Enable,
                expected: Some(ConsistencyFlag::Consistent),
            })
            .await
        })
    };

    assert!(first.await.expect("join").expect("apply").is_success());
    assert!(second.await.expect("join").expect("apply").is_success());
    assert_eq!(
        fx.fake.max_active(),
        2,
        "two labels must not serialize behind one another"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropping_apply_stops_polling_but_never_recalls_an_issued_command() {
    let fx = fixture(VerifyPolicy {
        attempts: 8,
        initial_delay: Duration::from_millis(200),
        max_delay: Duration::from_millis(200),
    });
    write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, Some(61));
    fx.fake.stubborn_kill();

    let attempt = tokio::time::timeout(
        Duration::from_millis(60),
        fx.exec
            .apply(&request(JobAction::Stop, Some(ConsistencyFlag::Consistent))),
    )
    .await;
    assert!(attempt.is_err(), "verification should outlive the timeout");

    let issued = fx.fake.mutation_calls();
    assert_eq!(
        issued,
        vec![format!("kill TERM gui/501/{LABEL}")],
        "the command that was already issued stays issued"
    );

    let calls_after_drop = fx.fake.calls().len();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        fx.fake.calls().len(),
        calls_after_drop,
        "no probe polling may continue once the future is dropped"
    );
}

// ---------------------------------------------------------------------------
// Expected-flag plumbing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn expected_flag_helper_round_trips_through_apply() {
    let fx = fixture(quick_policy(4));
    write_agent(&fx.user_agents, LABEL);
    fx.fake.seed_row(LABEL, Some(44));
    fx.fake.seed_override(LABEL, true);

    // Compute the expectation the way a caller would: from the pre-mutation
    // observation.
    let observed = launchdeck_probe::Probe::with_uid(fx.fake.clone(), 501)
        .find(&JobKey::new(Domain::UserAgent, LABEL))
        .expect("probe")
        .expect("status");
    let expected = expected_flag_after(JobAction::Disable, true, Some(&observed));
    assert_eq!(expected, Some(ConsistencyFlag::DisabledButLoaded));

    let outcome = tokio_test::assert_ok!(
        fx.exec.apply(&request(JobAction::Disable, expected)).await
    );
    assert_eq!(outcome, MutationOutcome::Success);
}
