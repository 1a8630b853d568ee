//! Property-list file → [`JobDefinition`] conversion.
//!
//! `plist::Value::from_file` detects XML vs binary encodings itself, so both
//! forms land here through the same path.

use std::path::Path;

use chrono::{DateTime, Utc};
use plist::Value;

use launchdeck_core::types::{
    DeclaredProperties, Domain, JobDefinition, JobProperties, KeepAlive, Label,
};

/// Read one definition file. Never fails: an unreadable or unparseable file
/// yields a `Malformed` entry whose label falls back to the file stem.
pub(crate) fn read_definition(path: &Path, domain: Domain, modified_at: DateTime<Utc>) -> JobDefinition {
    let (label, properties) = match Value::from_file(path) {
        Ok(value) => match value.as_dictionary() {
            Some(dict) => {
                let label = dict
                    .get("Label")
                    .and_then(Value::as_string)
                    .map(Label::from)
                    .unwrap_or_else(|| label_from_path(path));
                (label, DeclaredProperties::Parsed(properties_from_dict(dict)))
            }
            None => (
                label_from_path(path),
                DeclaredProperties::Malformed {
                    error: "property list root is not a dictionary".to_owned(),
                },
            ),
        },
        Err(e) => (
            label_from_path(path),
            DeclaredProperties::Malformed { error: e.to_string() },
        ),
    };

    JobDefinition {
        label,
        domain,
        source: path.to_path_buf(),
        modified_at,
        properties,
    }
}

fn properties_from_dict(dict: &plist::Dictionary) -> JobProperties {
    JobProperties {
        program: dict
            .get("Program")
            .and_then(Value::as_string)
            .map(Into::into),
        program_arguments: dict
            .get("ProgramArguments")
            .and_then(Value::as_array)
            .map(|args| {
                args.iter()
                    .filter_map(Value::as_string)
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default(),
        run_at_load: dict
            .get("RunAtLoad")
            .and_then(Value::as_boolean)
            .unwrap_or(false),
        keep_alive: keep_alive_policy(dict.get("KeepAlive")),
        environment: dict
            .get("EnvironmentVariables")
            .and_then(Value::as_dictionary)
            .map(|env| {
                env.iter()
                    .filter_map(|(key, value)| {
                        value.as_string().map(|s| (key.to_string(), s.to_owned()))
                    })
                    .collect()
            })
            .unwrap_or_default(),
        disabled: dict
            .get("Disabled")
            .and_then(Value::as_boolean)
            .unwrap_or(false),
    }
}

/// `KeepAlive` is a bool in the simple case and a condition dictionary
/// (SuccessfulExit, PathState, …) in the rest.
fn keep_alive_policy(value: Option<&Value>) -> KeepAlive {
    match value {
        Some(Value::Boolean(true)) => KeepAlive::Always,
        Some(Value::Dictionary(_)) => KeepAlive::Conditional,
        _ => KeepAlive::No,
    }
}

fn label_from_path(path: &Path) -> Label {
    Label::from(
        path.file_stem()
            .unwrap_or(path.as_os_str())
            .to_string_lossy()
            .into_owned(),
    )
}
