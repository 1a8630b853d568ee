//! Parsers for `launchctl print` and `launchctl print-disabled` output.
//!
//! The text is launchd's human-oriented dump, not a stable format, so both
//! parsers are deliberately tolerant: lines that do not look like rows are
//! skipped instead of failing the probe.

use std::collections::BTreeMap;

use launchdeck_core::types::Label;

/// One row of a domain-level `services = {` table:
/// `<pid-or-dash>  <last-exit-status>  <label>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRow {
    pub pid: Option<u32>,
    pub last_exit_code: Option<i32>,
    pub label: Label,
}

/// Extract the service rows from a `launchctl print <domain-target>` dump.
pub fn parse_print_services(output: &str) -> Vec<ServiceRow> {
    let mut rows = Vec::new();
    let mut in_block = false;

    for line in output.lines() {
        let trimmed = line.trim();
        if !in_block {
            if trimmed == "services = {" {
                in_block = true;
            }
            continue;
        }
        if trimmed == "}" {
            break;
        }

        let mut tokens = trimmed.split_whitespace();
        let (Some(pid_token), Some(exit_token), Some(first_label_token)) =
            (tokens.next(), tokens.next(), tokens.next())
        else {
            continue;
        };

        // Labels never contain whitespace in practice, but launchd owns the
        // format; keep whatever follows the two numeric columns intact.
        let mut label = first_label_token.to_owned();
        for rest in tokens {
            label.push(' ');
            label.push_str(rest);
        }

        rows.push(ServiceRow {
            pid: parse_column(pid_token),
            last_exit_code: parse_column(exit_token),
            label: Label::from(label),
        });
    }

    rows
}

/// Parse `launchctl print-disabled` override rows into label → disabled.
///
/// Accepts both spellings launchd has used over the years:
/// `"label" => disabled|enabled` and `"label" => true|false`.
pub fn parse_print_disabled(output: &str) -> BTreeMap<Label, bool> {
    let mut overrides = BTreeMap::new();

    for line in output.lines() {
        let Some((lhs, rhs)) = line.split_once("=>") else {
            continue;
        };
        let label = lhs.trim().trim_matches('"');
        if label.is_empty() {
            continue;
        }
        let disabled = matches!(rhs.trim(), "disabled" | "true");
        overrides.insert(Label::from(label), disabled);
    }

    overrides
}

fn parse_column<T: std::str::FromStr>(token: &str) -> Option<T> {
    if token == "-" {
        return None;
    }
    token.parse().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
