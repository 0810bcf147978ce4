//! Console listener that prints one line per transition.

use chrono::Local;
use procwatch_core::{AppVersion, EventKind, ProcessListener};
use serde::Serialize;
use std::io::{self, Write};

/// A transition as written in `--json` mode.
#[derive(Debug, Serialize)]
pub struct EventLine<'a> {
    pub event: EventKind,
    pub identity: AppVersion,
    pub key: &'a str,
    pub timestamp: String,
}

/// Prints transitions to stdout as text or JSON lines.
pub struct ConsolePrinter {
    json: bool,
}

impl ConsolePrinter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn format(&self, kind: EventKind, version: &AppVersion) -> String {
        let timestamp = Local::now();
        if self.json {
            let line = EventLine {
                event: kind,
                identity: *version,
                key: version.as_str(),
                timestamp: timestamp.to_rfc3339(),
            };
            serde_json::to_string(&line).unwrap_or_else(|e| format!(r#"{{"error":"{}"}}"#, e))
        } else {
            let verb = match kind {
                EventKind::Started => "Started",
                EventKind::Stopped => "Stopped",
            };
            format!(
                "{} {}  DateTime: {}",
                verb,
                version,
                timestamp.format("%Y-%m-%d %H:%M:%S")
            )
        }
    }

    fn print(&self, kind: EventKind, version: &AppVersion) {
        let line = self.format(kind, version);
        let mut stdout = io::stdout().lock();
        // Nothing useful to do if stdout is closed.
        let _ = writeln!(stdout, "{}", line);
        let _ = stdout.flush();
    }
}

impl ProcessListener<AppVersion> for ConsolePrinter {
    fn on_started(&self, identity: &AppVersion) {
        self.print(EventKind::Started, identity);
    }

    fn on_stopped(&self, identity: &AppVersion) {
        self.print(EventKind::Stopped, identity);
    }

    fn name(&self) -> &str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_format() {
        let line = ConsolePrinter::new(false).format(EventKind::Started, &AppVersion::V5);
        assert!(line.starts_with("Started com.adobe.Lightroom5  DateTime: "));
    }

    #[test]
    fn test_json_format() {
        let line = ConsolePrinter::new(true).format(EventKind::Stopped, &AppVersion::V3);
        let value: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event"], "stopped");
        assert_eq!(value["identity"], "V3");
        assert_eq!(value["key"], "com.adobe.Lightroom3");
        assert!(value["timestamp"].is_string());
    }
}
