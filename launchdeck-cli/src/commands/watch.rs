//! `launchdeck watch` — re-reconcile on changes and print flag transitions.
//!
//! Definition-directory edits trigger an immediate pass through a `notify`
//! watcher (debounced); live-state drift is caught by the interval tick.
//! Only transitions print, so a quiet system produces no output.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::Args;
use colored::Colorize;
use notify::{recommended_watcher, Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use launchdeck_core::settings;
use launchdeck_core::types::{ConsistencyFlag, Domain, ReconciledJob};
use launchdeck_probe::{Probe, SystemLaunchctl};
use launchdeck_reconcile::{diff, FlagTransition};
use launchdeck_store::{DefinitionStore, DomainLayout};

use crate::snapshot::{self, Snapshot};

/// Events on the same path inside this window fold into one pass.
const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

/// Arguments for `launchdeck watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Domain to watch. Defaults to the configured domain.
    #[arg(long, conflicts_with = "all_domains")]
    pub domain: Option<Domain>,

    /// Watch all four domains.
    #[arg(long)]
    pub all_domains: bool,

    /// Seconds between live-state polls.
    #[arg(long, default_value_t = 5)]
    pub interval: u64,

    /// Stop after this many reconcile passes (0 = run until interrupted).
    #[arg(long, default_value_t = 0)]
    pub count: u64,
}

impl WatchArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let settings = settings::load_at(&home).context("failed to load configuration")?;
        let domains =
            snapshot::requested_domains(self.all_domains, self.domain, settings.default_domain);

        let store = Arc::new(DefinitionStore::new(DomainLayout::standard(&home)));
        let probe = Arc::new(Probe::new(Arc::new(SystemLaunchctl)));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start async runtime")?;
        runtime.block_on(watch_loop(store, probe, domains, self.interval, self.count))
    }
}

async fn watch_loop(
    store: Arc<DefinitionStore>,
    probe: Arc<Probe>,
    domains: Vec<Domain>,
    interval_secs: u64,
    count: u64,
) -> Result<()> {
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = recommended_watcher(move |event| {
        let _ = event_tx.send(event);
    })
    .context("failed to create filesystem watcher")?;
    for domain in &domains {
        let dir = store.layout().dir(*domain);
        if dir.exists() {
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("failed to watch {}", dir.display()))?;
        }
    }

    let mut previous: Option<Vec<ReconciledJob>> = None;
    run_pass(&store, &probe, &domains, &mut previous).await?;
    let mut passes: u64 = 1;
    println!(
        "watching {} job(s) across {} domain(s); interval {}s",
        previous.as_ref().map_or(0, Vec::len),
        domains.len(),
        interval_secs.max(1),
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker.tick().await; // consume the first immediate tick

    let mut debounce = HashMap::<PathBuf, Instant>::new();
    while count == 0 || passes < count {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("ctrl-c handler failed")?;
                break;
            }
            _ = ticker.tick() => {
                run_pass(&store, &probe, &domains, &mut previous).await?;
                passes += 1;
            }
            event = event_rx.recv() => {
                let Some(event) = event else { break };
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::warn!(error = %err, "watcher event error");
                        continue;
                    }
                };
                if !is_relevant_event_kind(&event.kind) {
                    continue;
                }
                let now = Instant::now();
                let triggered = event
                    .paths
                    .iter()
                    .filter(|path| is_definition_path(path))
                    .any(|path| should_process_event(&mut debounce, path, now));
                if triggered {
                    run_pass(&store, &probe, &domains, &mut previous).await?;
                    passes += 1;
                    ticker.reset();
                }
            }
        }
    }

    Ok(())
}

/// One reconcile pass: diff against the last good baseline and print what
/// changed. A degraded pass keeps the baseline so a manager hiccup never
/// prints a wall of disappearances.
async fn run_pass(
    store: &Arc<DefinitionStore>,
    probe: &Arc<Probe>,
    domains: &[Domain],
    previous: &mut Option<Vec<ReconciledJob>>,
) -> Result<()> {
    let snapshot = collect_async(store, probe, domains).await?;
    if snapshot.degraded {
        tracing::warn!("service manager unavailable; keeping the previous baseline");
        return Ok(());
    }
    if let Some(baseline) = previous.as_ref() {
        print_transitions(&diff(baseline, &snapshot.jobs));
    }
    *previous = Some(snapshot.jobs);
    Ok(())
}

async fn collect_async(
    store: &Arc<DefinitionStore>,
    probe: &Arc<Probe>,
    domains: &[Domain],
) -> Result<Snapshot> {
    let store = Arc::clone(store);
    let probe = Arc::clone(probe);
    let domains = domains.to_vec();
    tokio::task::spawn_blocking(move || snapshot::collect(&store, &probe, &domains))
        .await
        .map_err(|err| anyhow!("reconcile task failed: {err}"))?
}

fn print_transitions(transitions: &[FlagTransition]) {
    let stamp = Local::now().format("%H:%M:%S").to_string();
    for transition in transitions {
        println!(
            "{} {} {} → {}",
            stamp.bright_black(),
            transition.key,
            flag_name(transition.previous),
            flag_name(transition.current),
        );
    }
}

fn flag_name(flag: Option<ConsistencyFlag>) -> String {
    match flag {
        Some(flag) => flag.to_string(),
        None => "absent".to_string(),
    }
}

fn is_relevant_event_kind(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

fn is_definition_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("plist"))
        .unwrap_or(false)
}

fn should_process_event(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
) -> bool {
    should_process_event_with_threshold(debounce, path, now, DEBOUNCE_WINDOW)
}

fn should_process_event_with_threshold(
    debounce: &mut HashMap<PathBuf, Instant>,
    path: &Path,
    now: Instant,
    threshold: Duration,
) -> bool {
    debounce.retain(|_, seen_at| now.duration_since(*seen_at) <= Duration::from_secs(30));
    match debounce.get(path) {
        Some(last_seen) if now.duration_since(*last_seen) < threshold => false,
        _ => {
            debounce.insert(path.to_path_buf(), now);
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
