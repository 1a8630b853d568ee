//! `launchdeck list` — reconciled view of definitions and live state.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use launchdeck_core::settings;
use launchdeck_core::types::{ConsistencyFlag, Domain, ReconciledJob};
use launchdeck_probe::{Probe, SystemLaunchctl};
use launchdeck_store::{DefinitionStore, DomainLayout};

use crate::snapshot::{self, Snapshot};

/// Arguments for `launchdeck list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Domain to list: user, gui, daemon or system. Defaults to the
    /// configured domain.
    #[arg(long, conflicts_with = "all_domains")]
    pub domain: Option<Domain>,

    /// One view across all four domains.
    #[arg(long)]
    pub all_domains: bool,

    /// Keep only jobs whose label or source path contains this substring.
    #[arg(long)]
    pub filter: Option<String>,

    /// Hide com.apple.* jobs.
    #[arg(long)]
    pub hide_apple: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ListArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let settings = settings::load_at(&home).context("failed to load configuration")?;
        let domains =
            snapshot::requested_domains(self.all_domains, self.domain, settings.default_domain);

        let store = DefinitionStore::new(DomainLayout::standard(&home));
        let probe = Probe::new(Arc::new(SystemLaunchctl));
        let mut snapshot = snapshot::collect(&store, &probe, &domains)?;

        retain_matches(&mut snapshot.jobs, self.filter.as_deref(), self.hide_apple);

        if self.json {
            print_json(&snapshot)?;
            return Ok(());
        }

        print_table(&snapshot);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

fn retain_matches(jobs: &mut Vec<ReconciledJob>, filter: Option<&str>, hide_apple: bool) {
    if hide_apple {
        jobs.retain(|job| !job.key.label.0.starts_with("com.apple."));
    }
    if let Some(needle) = filter {
        jobs.retain(|job| {
            job.key.label.0.contains(needle)
                || job
                    .definition
                    .as_ref()
                    .is_some_and(|definition| definition.source.to_string_lossy().contains(needle))
        });
    }
}

// ---------------------------------------------------------------------------
// JSON output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ListReportJson {
    summary: ListSummaryJson,
    degraded: bool,
    jobs: Vec<JobRowJson>,
}

#[derive(Serialize)]
struct ListSummaryJson {
    jobs: usize,
    flagged: usize,
}

#[derive(Serialize)]
struct JobRowJson {
    domain: String,
    label: String,
    /// Absent in a degraded listing — no live state, no verdict.
    flag: Option<String>,
    loaded: Option<bool>,
    pid: Option<u32>,
    last_exit_code: Option<i32>,
    enabled: Option<bool>,
    source: Option<String>,
    malformed: bool,
}

fn print_json(snapshot: &Snapshot) -> Result<()> {
    let payload = ListReportJson {
        summary: ListSummaryJson {
            jobs: snapshot.jobs.len(),
            flagged: flagged_count(snapshot),
        },
        degraded: snapshot.degraded,
        jobs: snapshot
            .jobs
            .iter()
            .map(|job| json_row(job, snapshot.degraded))
            .collect(),
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize listing JSON")?
    );
    Ok(())
}

fn json_row(job: &ReconciledJob, degraded: bool) -> JobRowJson {
    let status = job.status.as_ref();
    JobRowJson {
        domain: job.key.domain.to_string(),
        label: job.key.label.to_string(),
        flag: (!degraded).then(|| job.flag.to_string()),
        loaded: if degraded { None } else { status.map(|s| s.loaded) },
        pid: status.and_then(|s| s.pid),
        last_exit_code: status.and_then(|s| s.last_exit_code),
        enabled: if degraded { None } else { status.map(|s| s.enabled) },
        source: job
            .definition
            .as_ref()
            .map(|definition| definition.source.display().to_string()),
        malformed: job
            .definition
            .as_ref()
            .is_some_and(|definition| definition.properties.is_malformed()),
    }
}

// ---------------------------------------------------------------------------
// Table output
// ---------------------------------------------------------------------------

#[derive(Tabled)]
struct JobTableRow {
    #[tabled(rename = "label")]
    label: String,
    #[tabled(rename = "flag")]
    flag: String,
    #[tabled(rename = "pid")]
    pid: String,
    #[tabled(rename = "last exit")]
    last_exit: String,
    #[tabled(rename = "enabled")]
    enabled: String,
    #[tabled(rename = "source")]
    source: String,
}

fn print_table(snapshot: &Snapshot) {
    println!(
        "Launchdeck v{} | {} jobs | {} flagged",
        env!("CARGO_PKG_VERSION"),
        snapshot.jobs.len(),
        flagged_count(snapshot),
    );
    if snapshot.degraded {
        println!(
            "{}",
            "service manager unreachable — definitions only".yellow().bold()
        );
    }
    if snapshot.jobs.is_empty() {
        println!("No jobs found.");
        return;
    }

    let separator = "■".repeat(72).bright_black().to_string();
    let mut grouped = BTreeMap::<Domain, Vec<&ReconciledJob>>::new();
    for job in &snapshot.jobs {
        grouped.entry(job.key.domain).or_default().push(job);
    }

    println!("{separator}");
    println!(
        "Indicators: {} CONSISTENT  {} NOT LOADED  {} ORPHAN  {} DISABLED BUT LOADED",
        flag_indicator(Some(ConsistencyFlag::Consistent)),
        flag_indicator(Some(ConsistencyFlag::DefinedNotLoaded)),
        flag_indicator(Some(ConsistencyFlag::LoadedNotDefined)),
        flag_indicator(Some(ConsistencyFlag::DisabledButLoaded)),
    );
    println!("{separator}");
    for (domain, jobs) in grouped {
        println!("{}", domain.to_string().to_uppercase().bold());
        let rows: Vec<JobTableRow> = jobs
            .iter()
            .map(|job| table_row(job, snapshot.degraded))
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{separator}");
    }
}

fn table_row(job: &ReconciledJob, degraded: bool) -> JobTableRow {
    let status = job.status.as_ref();
    let dash = || "-".to_string();

    let mut source = job
        .definition
        .as_ref()
        .map(|definition| definition.source.display().to_string())
        .unwrap_or_else(dash);
    if job
        .definition
        .as_ref()
        .is_some_and(|definition| definition.properties.is_malformed())
    {
        source.push_str(" (malformed)");
    }

    JobTableRow {
        label: job.key.label.to_string(),
        flag: if degraded { dash() } else { job.flag.to_string() },
        pid: status
            .and_then(|s| s.pid)
            .map(|pid| pid.to_string())
            .unwrap_or_else(dash),
        last_exit: status
            .and_then(|s| s.last_exit_code)
            .map(|code| code.to_string())
            .unwrap_or_else(dash),
        enabled: if degraded {
            dash()
        } else {
            match status {
                Some(s) if s.enabled => "yes".to_string(),
                Some(_) => "no".to_string(),
                None => dash(),
            }
        },
        source,
    }
}

fn flagged_count(snapshot: &Snapshot) -> usize {
    if snapshot.degraded {
        return 0;
    }
    snapshot
        .jobs
        .iter()
        .filter(|job| job.flag != ConsistencyFlag::Consistent)
        .count()
}

fn flag_indicator(flag: Option<ConsistencyFlag>) -> String {
    match flag {
        Some(ConsistencyFlag::Consistent) => "■".green().bold().to_string(),
        Some(ConsistencyFlag::DefinedNotLoaded) => "■".yellow().bold().to_string(),
        Some(ConsistencyFlag::LoadedNotDefined) => "■".magenta().bold().to_string(),
        Some(ConsistencyFlag::DisabledButLoaded) => "■".red().bold().to_string(),
        None => "■".bright_black().bold().to_string(),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
