//! Configuration, log and artifact paths

use std::io;
use std::path::{Path, PathBuf};

/// Name used for the platform project directories
const APP_NAME: &str = "scenario-runner";

/// Catalog file looked up in the working directory when none is configured
pub const DEFAULT_CATALOG: &str = "scenarios.yaml";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/scenario-runner/`
/// - macOS: `~/Library/Application Support/scenario-runner/`
/// - Windows: `%APPDATA%\scenario-runner\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Directory receiving generated artifacts when none is configured
pub fn default_artifacts_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.data_dir().join("artifacts"))
        .unwrap_or_else(|| std::env::temp_dir().join(APP_NAME).join("artifacts"))
}

/// Create a directory (and parents) if it does not exist yet
pub fn ensure_dir(dir: &Path) -> io::Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(dir.to_path_buf())
}

/// File name for one generated artifact
///
/// ASCII letters, digits and `-` are kept; every other byte of the tag
/// (including `_`) becomes `_xx` hex, so distinct tags never share a stem and
/// nothing can escape the directory. `sequence` separates artifacts that
/// share a tag.
pub fn artifact_file_name(tag: &str, sequence: u64, extension: &str) -> String {
    let mut stem = String::with_capacity(tag.len());
    for byte in tag.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{:02x}", byte));
        }
    }
    format!("{}-{}.{}", stem, sequence, extension.trim_start_matches('.'))
}
