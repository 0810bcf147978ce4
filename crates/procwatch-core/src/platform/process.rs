//! Process-table probe backed by `sysinfo`.
//!
//! Raw identity keys are platform-neutral (bundle identifiers); this module
//! maps each key to the executable names it appears as on the current OS.

use crate::config::MonitorConfig;
use crate::error::{Result, WatchError};
use crate::identity::AppVersion;
use crate::probe::LivenessProbe;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};
use tracing::{debug, info};

/// How one watched key shows up in the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPattern {
    /// Process or executable file name, compared case-insensitively.
    pub name: String,
    /// Substring the executable path must contain, for apps whose versions
    /// share an executable name.
    pub path_hint: Option<String>,
}

impl ProcessPattern {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path_hint: None,
        }
    }

    pub fn with_path_hint(mut self, hint: impl Into<String>) -> Self {
        self.path_hint = Some(hint.into());
        self
    }

    fn matches(&self, name: &str, exe: Option<&Path>) -> bool {
        let exe_name = exe
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy());
        let name_matches = name.eq_ignore_ascii_case(&self.name)
            || exe_name.is_some_and(|n| n.eq_ignore_ascii_case(&self.name));
        if !name_matches {
            return false;
        }

        match (&self.path_hint, exe) {
            (None, _) => true,
            (Some(hint), Some(path)) => path
                .to_string_lossy()
                .to_lowercase()
                .contains(&hint.to_lowercase()),
            (Some(_), None) => false,
        }
    }
}

/// Process patterns for every `AppVersion`, for the current platform.
pub fn default_patterns() -> HashMap<String, Vec<ProcessPattern>> {
    AppVersion::ALL
        .iter()
        .map(|version| (version.as_str().to_string(), patterns_for(*version)))
        .collect()
}

fn patterns_for(version: AppVersion) -> Vec<ProcessPattern> {
    let major = match version {
        AppVersion::V3 => 3,
        AppVersion::V4 => 4,
        AppVersion::V5 => 5,
    };

    #[cfg(windows)]
    {
        vec![ProcessPattern::named("lightroom.exe").with_path_hint(format!("Lightroom {}", major))]
    }

    #[cfg(not(windows))]
    {
        vec![ProcessPattern::named(format!("Adobe Lightroom {}", major))]
    }
}

struct ProcessTable {
    system: System,
    refreshed_at: Option<Instant>,
}

/// Liveness probe that scans the OS process table.
///
/// The table is refreshed at most once per TTL so a poll round over several
/// keys shares one scan.
pub struct SysinfoProbe {
    patterns: HashMap<String, Vec<ProcessPattern>>,
    table: Mutex<Option<ProcessTable>>,
    ttl: Duration,
}

impl SysinfoProbe {
    /// Create a probe over an explicit key -> patterns table.
    pub fn new(patterns: HashMap<String, Vec<ProcessPattern>>) -> Self {
        Self {
            patterns,
            table: Mutex::new(None),
            ttl: MonitorConfig::PROCESS_TABLE_TTL,
        }
    }

    /// Probe configured for every known `AppVersion`.
    pub fn for_app_versions() -> Self {
        Self::new(default_patterns())
    }

    /// Override how long a process table snapshot is reused.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn is_bound(&self) -> bool {
        self.table.lock().is_some()
    }

    fn refresh(table: &mut ProcessTable) {
        table.system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::new().with_exe(UpdateKind::OnlyIfNotSet),
        );
        table.refreshed_at = Some(Instant::now());
    }
}

impl LivenessProbe for SysinfoProbe {
    fn bind(&self) -> Result<()> {
        if !sysinfo::IS_SUPPORTED_SYSTEM {
            return Err(WatchError::bind_failure(format!(
                "process enumeration is not supported on {}",
                super::current_platform()
            )));
        }

        let mut table = ProcessTable {
            system: System::new(),
            refreshed_at: None,
        };
        Self::refresh(&mut table);

        let count = table.system.processes().len();
        if count == 0 {
            return Err(WatchError::bind_failure("process table is empty"));
        }

        info!(
            "Bound process table probe on {} ({} processes, {} keys)",
            super::current_platform(),
            count,
            self.patterns.len()
        );
        *self.table.lock() = Some(table);
        Ok(())
    }

    fn is_alive(&self, raw_key: &str) -> Result<bool> {
        let patterns = self
            .patterns
            .get(raw_key)
            .ok_or_else(|| WatchError::ProbeQuery {
                key: raw_key.to_string(),
                message: "no process patterns configured".to_string(),
            })?;

        let mut guard = self.table.lock();
        let table = guard.as_mut().ok_or_else(|| WatchError::ProbeQuery {
            key: raw_key.to_string(),
            message: "probe is not bound".to_string(),
        })?;

        let stale = table
            .refreshed_at
            .map(|t| t.elapsed() >= self.ttl)
            .unwrap_or(true);
        if stale {
            Self::refresh(table);
        }

        let alive = table.system.processes().values().any(|process| {
            let name = process.name().to_string_lossy();
            patterns
                .iter()
                .any(|pattern| pattern.matches(&name, process.exe()))
        });

        debug!("is_alive({}) = {}", raw_key, alive);
        Ok(alive)
    }

    fn release(&self) {
        if self.table.lock().take().is_some() {
            debug!("Released process table probe");
        }
    }
}
