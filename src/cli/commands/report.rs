use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cli::{context, output};
use crate::core::errors::Result;
use crate::core::models::key::Key;
use crate::core::models::task::{Artifact, Slot, SlotResult};
use crate::core::services::state::State;

#[derive(Serialize)]
struct SlotReport<'a> {
    #[serde(flatten)]
    slot: &'a Slot,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
}

#[derive(Serialize)]
struct Report<'a> {
    fragment: String,
    mode: &'static str,
    keyring: Vec<String>,
    usable: String,
    results: Vec<SlotReport<'a>>,
}

/// Print the settled results, write artifacts and return how many error
/// slots remain.
pub fn print(state: &State) -> Result<usize> {
    let results = state.results();
    let mut slots = Vec::new();
    for slot in results.iter() {
        let path = match &slot.result {
            SlotResult::Artifact(artifact) => Some(write_artifact(context::out_dir(), artifact)?),
            _ => None,
        };
        slots.push(SlotReport { slot, path });
    }
    let errors = results.iter().filter(|slot| slot.is_error()).count();
    let fragment = state.hash();
    let keyring = state.keyring();

    if context::json() {
        let report = Report {
            fragment,
            mode: state.mode().name(),
            keyring: keyring.users(),
            usable: keyring.features().explain(),
            results: slots,
        };
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        println!("{json}");
        return Ok(errors);
    }

    for report in &slots {
        print_slot(report);
    }
    if !keyring.is_empty() {
        output::header("Keyring");
        output::detail(&keyring.users().join("\n"));
        output::detail(&format!("Usable {}", keyring.features().explain()));
    }
    output::header("Fragment");
    println!("{fragment}");
    Ok(errors)
}

fn print_slot(report: &SlotReport<'_>) {
    match &report.slot.result {
        SlotResult::Info(info) => {
            let (first, rest) = info.info.split_once('\n').unwrap_or((info.info.as_str(), ""));
            if info.error {
                output::error(first);
            } else {
                output::success(first);
            }
            output::detail(rest);
        }
        SlotResult::Artifact(artifact) => {
            let kind = artifact.kind.as_deref().unwrap_or("Artifact");
            let path = report
                .path
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            output::success(&format!("{kind}: {path}"));
            output::detail(&artifact.title);
        }
        SlotResult::Working => output::warning(&format!("Slot {} is still working", report.slot.id)),
    }
}

/// Reduce an artifact filename to one safe path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "unnamed".into()
    } else {
        cleaned.to_string()
    }
}

/// First of `name`, `name.1`, `name.2`, ... that does not exist in `dir`.
fn free_path(dir: &Path, name: &str) -> PathBuf {
    let first = dir.join(name);
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{name}.{n}")))
        .find(|path| !path.exists())
        .unwrap_or(first)
}

/// Write an artifact without overwriting anything.
pub fn write_artifact(dir: &Path, artifact: &Artifact) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = free_path(dir, &sanitize_filename(&artifact.filename));
    std::fs::write(&path, &artifact.data)?;
    tracing::debug!(path = %path.display(), bytes = artifact.len, "artifact written");
    Ok(path)
}
