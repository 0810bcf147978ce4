//! Platform layer: the OS-backed liveness probe.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than in the
//! monitor core.
//!
//! # Supported Platforms
//!
//! Whatever `sysinfo` can enumerate processes on (Linux, Windows, macOS,
//! FreeBSD). Elsewhere `SysinfoProbe::bind` fails.

pub mod process;

pub use process::{default_patterns, ProcessPattern, SysinfoProbe};

/// Returns the current platform name.
pub fn current_platform() -> &'static str {
    #[cfg(target_os = "linux")]
    {
        "linux"
    }
    #[cfg(target_os = "windows")]
    {
        "windows"
    }
    #[cfg(target_os = "macos")]
    {
        "macos"
    }
    #[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
    {
        "unknown"
    }
}

/// Returns true if the process table can be read on this platform.
pub fn is_supported_platform() -> bool {
    sysinfo::IS_SUPPORTED_SYSTEM
}
