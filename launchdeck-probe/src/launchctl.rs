//! The service-manager command boundary.

use std::process::Command;

use crate::error::ProbeError;

/// Captured result of one launchctl invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    /// Best human-readable account of a failure: stderr, then stdout, then
    /// the bare exit status.
    pub fn diagnostic(&self) -> String {
        let err = self.stderr.trim();
        if !err.is_empty() {
            return err.to_owned();
        }
        let out = self.stdout.trim();
        if !out.is_empty() {
            return out.to_owned();
        }
        match self.code {
            Some(code) => format!("exit status {code}"),
            None => "terminated by signal".to_owned(),
        }
    }
}

/// Boundary to the launchctl binary. [`SystemLaunchctl`] talks to the real
/// one; tests substitute scripted doubles.
///
/// A non-zero exit is NOT an `Err` here — callers decide what a refusal
/// means. Only a failure to execute the command at all escapes as an error.
pub trait Launchctl: Send + Sync {
    fn invoke(&self, args: &[String]) -> Result<CmdOutput, ProbeError>;
}

/// Spawns `launchctl` from `PATH`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLaunchctl;

impl Launchctl for SystemLaunchctl {
    fn invoke(&self, args: &[String]) -> Result<CmdOutput, ProbeError> {
        let output = Command::new("launchctl")
            .args(args.iter().map(String::as_str))
            .output()
            .map_err(|e| ProbeError::Spawn {
                command: format!("launchctl {}", args.join(" ")),
                source: e,
            })?;

        Ok(CmdOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Current uid via `id -u`, the form launchctl targets are addressed with.
pub fn resolve_uid() -> Result<u32, ProbeError> {
    let output = Command::new("id").arg("-u").output().map_err(|e| ProbeError::Spawn {
        command: "id -u".to_owned(),
        source: e,
    })?;
    if !output.status.success() {
        return Err(ProbeError::Unavailable {
            details: format!("failed to resolve current uid (status {})", output.status),
        });
    }

    let raw = String::from_utf8_lossy(&output.stdout).trim().to_owned();
    raw.parse().map_err(|_| ProbeError::Unavailable {
        details: format!("unexpected uid from `id -u`: '{raw}'"),
    })
}
