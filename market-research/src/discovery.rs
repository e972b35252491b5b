//! Locating the capability executable
//!
//! The server never hard-codes where `research-capability` lives. It searches, in order:
//!
//! 1. The directory of the running executable (and its parent when running from
//!    `target/*/deps`, which is where `cargo test` puts test binaries)
//! 2. `~/.market-research/capabilities/`
//! 3. `PATH`

use std::path::{Path, PathBuf};

/// File name of the bundled capability executable
pub const CAPABILITY_BINARY: &str = "research-capability";

/// Find the bundled capability executable
pub fn find_capability_binary() -> Option<PathBuf> {
    find_executable(CAPABILITY_BINARY, &get_search_paths())
}

/// Find an executable named `name` in `search_paths`, falling back to `PATH`
pub fn find_executable(name: &str, search_paths: &[PathBuf]) -> Option<PathBuf> {
    let file_name = format!("{}{}", name, std::env::consts::EXE_SUFFIX);

    search_paths
        .iter()
        .filter(|dir| dir.is_dir())
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file() && is_executable(candidate))
        .or_else(|| which::which(name).ok())
}

/// Get list of directories to search for capability executables
pub fn get_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    // 1. Built-in capabilities: same directory as the server binary
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.to_path_buf());

            // cargo test/run from target/debug/deps: binaries live one level up
            if exe_dir.ends_with("deps") {
                if let Some(parent_dir) = exe_dir.parent() {
                    paths.push(parent_dir.to_path_buf());
                }
            }
        }
    }

    // 2. User capabilities from ~/.market-research/capabilities/
    if let Some(dirs) = directories::BaseDirs::new() {
        paths.push(dirs.home_dir().join(".market-research").join("capabilities"));
    }

    paths
}

/// Check if a file is executable
fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|m| m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }

    #[cfg(windows)]
    {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("exe"))
            .unwrap_or(false)
    }

    #[cfg(not(any(unix, windows)))]
    {
        true // Assume executable on other platforms
    }
}
