//! Verification poll schedule: a bounded number of probe attempts with a
//! doubling delay, capped. Defaults work out to eight attempts spread over
//! roughly four seconds, which covers launchd's usual settle time without
//! making a failed verify feel stuck.

use std::time::Duration;

use launchdeck_core::settings::VerifySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self::from_settings(&VerifySettings::default())
    }
}

impl VerifyPolicy {
    pub fn from_settings(settings: &VerifySettings) -> Self {
        Self {
            attempts: settings.attempts.max(1),
            initial_delay: Duration::from_millis(settings.initial_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms.max(settings.initial_delay_ms)),
        }
    }

    /// Delay to sleep before attempt `n` (zero-based). Attempt 0 polls
    /// immediately.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let doubled = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt - 1));
        doubled.min(self.max_delay)
    }
}
