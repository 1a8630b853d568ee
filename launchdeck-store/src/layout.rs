//! Domain → definition-directory mapping.

use std::path::{Path, PathBuf};

use launchdeck_core::types::Domain;

/// Where each domain keeps its property-list files.
///
/// Construction forms:
/// - [`DomainLayout::standard`] — the real macOS locations; used everywhere
///   outside tests
/// - [`DomainLayout::rooted`] — all four directories rebased under one root;
///   used in tests with `TempDir`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainLayout {
    user_agents: PathBuf,
    gui_agents: PathBuf,
    global_daemons: PathBuf,
    system_daemons: PathBuf,
}

impl DomainLayout {
    /// The macOS directory set: `~/Library/LaunchAgents`,
    /// `/Library/LaunchAgents`, `/Library/LaunchDaemons`,
    /// `/System/Library/LaunchDaemons`.
    pub fn standard(home: &Path) -> Self {
        Self {
            user_agents: home.join("Library").join("LaunchAgents"),
            gui_agents: PathBuf::from("/Library/LaunchAgents"),
            global_daemons: PathBuf::from("/Library/LaunchDaemons"),
            system_daemons: PathBuf::from("/System/Library/LaunchDaemons"),
        }
    }

    /// The same tree shape relocated under `root`, with the home directory
    /// standing in at `root/home`.
    pub fn rooted(root: &Path) -> Self {
        Self {
            user_agents: root.join("home").join("Library").join("LaunchAgents"),
            gui_agents: root.join("Library").join("LaunchAgents"),
            global_daemons: root.join("Library").join("LaunchDaemons"),
            system_daemons: root.join("System").join("Library").join("LaunchDaemons"),
        }
    }

    pub fn dir(&self, domain: Domain) -> &Path {
        match domain {
            Domain::UserAgent => &self.user_agents,
            Domain::GuiSession => &self.gui_agents,
            Domain::GlobalDaemon => &self.global_daemons,
            Domain::SystemDaemon => &self.system_daemons,
        }
    }
}
