//! `launchdeck show` — everything known about one job.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use launchdeck_core::settings;
use launchdeck_core::types::{
    ConsistencyFlag, DeclaredProperties, Domain, JobDefinition, JobKey, LiveStatus,
};
use launchdeck_probe::{Probe, SystemLaunchctl};
use launchdeck_reconcile::flag_for;
use launchdeck_store::{DefinitionStore, DomainLayout};

/// Arguments for `launchdeck show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Job label to inspect.
    pub label: String,

    /// Domain the job belongs to. Defaults to the configured domain.
    #[arg(long)]
    pub domain: Option<Domain>,

    /// Print the manager's raw `print` output for the service instead.
    #[arg(long, conflicts_with = "json")]
    pub raw: bool,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ShowArgs {
    pub fn run(self) -> Result<()> {
        let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
        let settings = settings::load_at(&home).context("failed to load configuration")?;
        let domain = self.domain.unwrap_or(settings.default_domain);
        let key = JobKey::new(domain, self.label.as_str());

        let probe = Probe::new(Arc::new(SystemLaunchctl));

        if self.raw {
            return print_raw(&probe, &key);
        }

        let store = DefinitionStore::new(DomainLayout::standard(&home));
        let definition = store
            .find(&key)
            .with_context(|| format!("failed to read {domain} definitions"))?;
        let (status, degraded) = match probe.find(&key) {
            Ok(status) => (status, false),
            Err(err) => {
                tracing::warn!(error = %err, "service manager unavailable; showing definition only");
                (None, true)
            }
        };

        if definition.is_none() && status.is_none() {
            if degraded {
                bail!(
                    "no definition for '{}' in domain '{domain}' and the service manager is unreachable",
                    self.label
                );
            }
            bail!("no job named '{}' in domain '{domain}'", self.label);
        }

        let flag = if degraded {
            None
        } else {
            flag_for(definition.is_some(), status.as_ref())
        };

        if self.json {
            print_json(&key, definition.as_ref(), status.as_ref(), flag, degraded)?;
        } else {
            print_human(&key, definition.as_ref(), status.as_ref(), flag, degraded);
        }
        Ok(())
    }
}

fn print_raw(probe: &Probe, key: &JobKey) -> Result<()> {
    let raw = probe
        .print_service(key)
        .context("service manager unreachable")?;
    match raw {
        Some(text) => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            Ok(())
        }
        None => bail!("'{}' is not loaded in any {} namespace", key.label, key.domain),
    }
}

// ---------------------------------------------------------------------------
// JSON output
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ShowReportJson<'a> {
    domain: String,
    label: String,
    flag: Option<String>,
    degraded: bool,
    definition: Option<&'a JobDefinition>,
    status: Option<&'a LiveStatus>,
}

fn print_json(
    key: &JobKey,
    definition: Option<&JobDefinition>,
    status: Option<&LiveStatus>,
    flag: Option<ConsistencyFlag>,
    degraded: bool,
) -> Result<()> {
    let payload = ShowReportJson {
        domain: key.domain.to_string(),
        label: key.label.to_string(),
        flag: flag.map(|flag| flag.to_string()),
        degraded,
        definition,
        status,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&payload).context("failed to serialize job JSON")?
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Human output
// ---------------------------------------------------------------------------

fn print_human(
    key: &JobKey,
    definition: Option<&JobDefinition>,
    status: Option<&LiveStatus>,
    flag: Option<ConsistencyFlag>,
    degraded: bool,
) {
    let verdict = match flag {
        Some(flag) => flag_text(flag),
        None => "unknown".bright_black().to_string(),
    };
    println!("{} [{}] {}", key.label.to_string().bold(), key.domain, verdict);
    if degraded {
        println!("{}", "service manager unreachable — definition only".yellow());
    }

    match definition {
        Some(definition) => print_definition(definition),
        None => println!("definition: none on disk (orphan)"),
    }

    match status {
        Some(live) => print_live(live),
        None if degraded => {}
        None => println!("live state: not loaded"),
    }
}

fn print_definition(definition: &JobDefinition) {
    println!("definition: {}", definition.source.display());
    println!(
        "  modified: {}",
        definition.modified_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    match &definition.properties {
        DeclaredProperties::Parsed(props) => {
            if let Some(program) = props.executable() {
                println!("  program: {program}");
            }
            if props.program_arguments.len() > 1 {
                println!("  arguments: {}", props.program_arguments.join(" "));
            }
            println!("  run at load: {}", yes_no(props.run_at_load));
            println!("  keep alive: {}", props.keep_alive);
            for (name, value) in &props.environment {
                println!("  environment: {name}={value}");
            }
            if props.disabled {
                println!("  declared disabled: yes");
            }
        }
        DeclaredProperties::Malformed { error } => {
            println!("  {} {error}", "malformed:".red().bold());
        }
    }
}

fn print_live(live: &LiveStatus) {
    if live.loaded {
        println!("live state: loaded in {}", live.target);
    } else {
        println!("live state: not loaded (override record in {})", live.target);
    }
    match live.pid {
        Some(pid) => println!("  pid: {pid}"),
        None => println!("  pid: -"),
    }
    if let Some(code) = live.last_exit_code {
        println!("  last exit: {code}");
    }
    println!("  enabled: {}", yes_no(live.enabled));
}

fn flag_text(flag: ConsistencyFlag) -> String {
    let text = flag.to_string();
    match flag {
        ConsistencyFlag::Consistent => text.green().bold().to_string(),
        ConsistencyFlag::DefinedNotLoaded => text.yellow().bold().to_string(),
        ConsistencyFlag::LoadedNotDefined => text.magenta().bold().to_string(),
        ConsistencyFlag::DisabledButLoaded => text.red().bold().to_string(),
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
