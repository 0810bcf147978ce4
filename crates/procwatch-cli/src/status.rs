//! One-shot `--status` query against the process table, with no watch loop.

use procwatch_core::{AppVersion, IdentityRegistry, LivenessProbe, Result};
use serde::Serialize;

/// Current state of one version as written in `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusLine<'a> {
    pub identity: AppVersion,
    pub key: &'a str,
    pub running: bool,
}

/// Bind the probe, query every registered key once, then release it.
///
/// No tracker or listener is involved, so nothing but the result is
/// reported.
pub fn query_status<P: LivenessProbe>(
    probe: &P,
    registry: &IdentityRegistry<AppVersion>,
) -> Result<Vec<(AppVersion, bool)>> {
    probe.bind()?;
    let result = registry
        .entries()
        .map(|(key, version)| probe.is_alive(key).map(|alive| (*version, alive)))
        .collect();
    probe.release();
    result
}

pub fn format_status(version: &AppVersion, running: bool, json: bool) -> String {
    if json {
        let line = StatusLine {
            identity: *version,
            key: version.as_str(),
            running,
        };
        serde_json::to_string(&line).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
    } else {
        format!(
            "{} {}",
            version,
            if running { "running" } else { "not running" }
        )
    }
}
