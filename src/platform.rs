//! # Platform-specific utilities
//!
//! Questo modulo centralizza la risoluzione dei comandi esterni (ffmpeg,
//! ffprobe) per piattaforma e la verifica della loro disponibilità nel PATH.

use std::path::PathBuf;
use tracing::{info, warn};

/// Tools the video pipeline shells out to
pub const REQUIRED_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Platform-specific command names and PATH lookups
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformCommands;

impl PlatformCommands {
    /// Get the platform-specific executable name
    pub fn get_command(base_name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", base_name)
        } else {
            base_name.to_string()
        }
    }

    /// Resolve a tool to an absolute path through `PATH`
    pub fn get_tool_path(base_name: &str) -> Option<PathBuf> {
        which::which(Self::get_command(base_name)).ok()
    }

    /// Check if a command is available on the system
    pub fn is_command_available(base_name: &str) -> bool {
        Self::get_tool_path(base_name).is_some()
    }

    /// Names of required tools that cannot be found
    pub fn missing_tools() -> Vec<&'static str> {
        REQUIRED_TOOLS
            .iter()
            .copied()
            .filter(|tool| !Self::is_command_available(tool))
            .collect()
    }

    /// Log tool availability. Missing tools only make videos fail one by one,
    /// so this warns instead of aborting the run.
    pub fn report_dependencies() -> bool {
        let missing = Self::missing_tools();
        if missing.is_empty() {
            info!("🔧 Video tools available: {}", REQUIRED_TOOLS.join(", "));
            true
        } else {
            warn!("⚠️ Missing video tools (videos will fail): {}", missing.join(", "));
            false
        }
    }

    /// Get system information for debugging
    pub fn system_info() -> SystemInfo {
        SystemInfo {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            family: std::env::consts::FAMILY,
        }
    }
}

/// System information structure
#[derive(Debug, Clone)]
pub struct SystemInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub family: &'static str,
}

impl std::fmt::Display for SystemInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} ({})", self.os, self.arch, self.family)
    }
}
