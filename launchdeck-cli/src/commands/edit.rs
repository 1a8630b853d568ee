//! `launchdeck edit` / `launchdeck reveal` — hand a definition file to the
//! configured editor or to Finder.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use clap::Args;

use launchdeck_core::settings::{self, Settings, SYSTEM_EDITOR};
use launchdeck_core::types::{Domain, JobKey};
use launchdeck_store::{DefinitionStore, DomainLayout};

/// Arguments for `launchdeck edit`.
#[derive(Args, Debug)]
pub struct EditArgs {
    /// Job label whose definition file to open.
    pub label: String,

    /// Domain the job belongs to. Defaults to the configured domain.
    #[arg(long)]
    pub domain: Option<Domain>,
}

/// Arguments for `launchdeck reveal`.
#[derive(Args, Debug)]
pub struct RevealArgs {
    /// Job label whose definition file to reveal in Finder.
    pub label: String,

    /// Domain the job belongs to. Defaults to the configured domain.
    #[arg(long)]
    pub domain: Option<Domain>,
}

impl EditArgs {
    pub fn run(self) -> Result<()> {
        let (source, settings) = definition_source(&self.label, self.domain)?;
        let mut command = editor_command(&settings.editor, &source);
        command
            .spawn()
            .with_context(|| format!("failed to launch editor for {}", source.display()))?;
        // Not waited on; `reload` picks the edit up afterwards.
        println!("✓ opened {}", source.display());
        Ok(())
    }
}

impl RevealArgs {
    pub fn run(self) -> Result<()> {
        let (source, _) = definition_source(&self.label, self.domain)?;
        Command::new("open")
            .arg("-R")
            .arg(&source)
            .spawn()
            .with_context(|| format!("failed to reveal {}", source.display()))?;
        println!("✓ revealed {}", source.display());
        Ok(())
    }
}

fn definition_source(label: &str, domain: Option<Domain>) -> Result<(PathBuf, Settings)> {
    let home: PathBuf = dirs::home_dir().context("could not determine home directory")?;
    let settings = settings::load_at(&home).context("failed to load configuration")?;
    let domain = domain.unwrap_or(settings.default_domain);
    let key = JobKey::new(domain, label);

    let store = DefinitionStore::new(DomainLayout::standard(&home));
    let definition = store
        .find(&key)
        .with_context(|| format!("failed to read {domain} definitions"))?
        .with_context(|| format!("no definition file for '{label}' in domain '{domain}'"))?;
    Ok((definition.source, settings))
}

/// Build the editor invocation the settings value dictates: `system` or
/// empty → `open <path>`; an absolute path → run it directly; a command line
/// with flags → split on whitespace; anything else is an application name
/// for `open -a`.
fn editor_command(editor: &str, path: &Path) -> Command {
    let trimmed = editor.trim();
    if trimmed.is_empty() || trimmed == SYSTEM_EDITOR {
        let mut command = Command::new("open");
        command.arg(path);
        return command;
    }
    if Path::new(trimmed).is_absolute() && !trimmed.contains(char::is_whitespace) {
        let mut command = Command::new(trimmed);
        command.arg(path);
        return command;
    }
    if trimmed.contains(char::is_whitespace) {
        let mut parts = trimmed.split_whitespace();
        let program = parts.next().unwrap_or("open");
        let mut command = Command::new(program);
        command.args(parts);
        command.arg(path);
        return command;
    }
    let mut command = Command::new("open");
    command.args(["-a", trimmed]).arg(path);
    command
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
