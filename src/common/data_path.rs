// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@mitander.dev>

use std::path::{Path, PathBuf};

const DATA_DIR_ENV: &str = "DATA_DIR";

fn absolute(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

fn env_data_dir() -> Option<String> {
    std::env::var(DATA_DIR_ENV)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn executable_data_dir_candidate() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let parent = exe.parent()?;
    Some(absolute(parent.join("..").join("data")))
}

/// Resolve the active data directory using precedence:
/// 1) explicit `DATA_DIR`
/// 2) executable-relative `../data` (if present)
/// 3) cwd-relative `./data`
pub fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = env_data_dir() {
        return absolute(PathBuf::from(dir));
    }
    if let Some(exe_data) = executable_data_dir_candidate()
        && exe_data.exists()
    {
        return exe_data;
    }
    absolute(PathBuf::from("data"))
}

/// Resolve a path that may be absolute or relative. Relative paths honor
/// DATA_DIR precedence and come back absolute.
pub fn resolve_data_path(raw_path: &str) -> PathBuf {
    let as_path = PathBuf::from(raw_path);
    if as_path.is_absolute() {
        return as_path;
    }
    let rel: &Path = as_path
        .strip_prefix("data")
        .unwrap_or_else(|_| as_path.as_path());
    if env_data_dir().is_some() {
        return resolve_data_dir().join(rel);
    }
    if let Some(exe_data) = executable_data_dir_candidate() {
        let candidate = exe_data.join(rel);
        if candidate.exists() {
            return candidate;
        }
    }
    absolute(as_path)
}
