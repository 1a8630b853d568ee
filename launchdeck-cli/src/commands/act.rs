//! `launchdeck enable|disable|start|stop|reload` — apply one mutation and
//! verify it landed.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;

use launchdeck_core::settings;
use launchdeck_core::types::{Domain, JobAction, JobKey, MutationOutcome, MutationRequest};
use launchdeck_exec::{expected_flag_after, Executor, VerifyPolicy};
use launchdeck_probe::{Launchctl, Probe, SystemLaunchctl};
use launchdeck_store::{DefinitionStore, DomainLayout};

/// Arguments shared by the five mutation subcommands.
#[derive(Args, Debug)]
pub struct ActArgs {
    /// Job label to act on.
    pub label: String,

    /// Domain the job belongs to. Defaults to the configured domain.
    #[arg(long)]
    pub domain: Option<Domain>,
}

pub fn run(action: JobAction, args: ActArgs) -> Result<()> {
    let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
    let settings = settings::load_at(&home).context("failed to load configuration")?;
    let domain = args.domain.unwrap_or(settings.default_domain);
    let key = JobKey::new(domain, args.label.as_str());

    let launchctl: Arc<dyn Launchctl> = Arc::new(SystemLaunchctl);
    let store = Arc::new(DefinitionStore::new(DomainLayout::standard(&home)));
    let probe = Arc::new(Probe::new(launchctl.clone()));

    // The expected flag comes from a pre-read; the executor re-reads under
    // its per-label lock before issuing anything.
    let definition = store
        .find(&key)
        .with_context(|| format!("failed to read {domain} definitions"))?;
    let status = probe.find(&key).context("service manager unreachable")?;
    let expected = expected_flag_after(action, definition.is_some(), status.as_ref());

    let request = MutationRequest { key: key.clone(), action, expected };
    let executor = Executor::new(
        store,
        probe,
        launchctl,
        VerifyPolicy::from_settings(&settings.verify),
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let outcome = runtime
        .block_on(executor.apply(&request))
        .with_context(|| format!("could not {action} '{key}'"))?;

    match outcome {
        MutationOutcome::Success => {
            println!("✓ {action} '{key}' verified");
            Ok(())
        }
        other => bail!("{action} '{key}': {other}"),
    }
}
