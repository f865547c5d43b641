//! Task library.
//!
//! Each domain module exposes typed operations for library callers plus a
//! `tasks()` table wiring them into the [`TaskRegistry`](crate::registry::TaskRegistry).

pub mod databases;
pub mod projects;
pub mod search;
pub mod system;
pub mod users;

use crate::registry::TaskSpec;
use std::path::{Path, PathBuf};

pub fn catalogue() -> Vec<TaskSpec> {
    let mut all = Vec::new();
    all.extend(system::tasks());
    all.extend(users::tasks());
    all.extend(databases::tasks());
    all.extend(projects::tasks());
    all.extend(search::tasks());
    all
}

/// Expand `~` and anchor relative paths at `base`.
pub(crate) fn local_path(path: &str, base: &Path) -> PathBuf {
    let expanded = PathBuf::from(shellexpand::tilde(path).to_string());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

/// Final path component, used to name uploaded files under `/tmp`.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
