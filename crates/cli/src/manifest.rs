//! Precache manifest checks against a build output directory.

use std::path::{Path, PathBuf};

/// What happened to one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryCheck {
    Present(PathBuf),
    Missing(PathBuf),
    /// Absolute URLs are served by someone else and cannot be checked.
    Remote,
}

/// File in `dist` that serves a root-relative manifest entry. `/` maps to `index.html`.
pub fn file_for(dist: &Path, entry: &str) -> PathBuf {
    let path = entry.split(['?', '#']).next().unwrap_or_default();
    let relative = path.trim_start_matches('/');
    if relative.is_empty() || relative.ends_with('/') {
        dist.join(relative).join("index.html")
    } else {
        dist.join(relative)
    }
}

pub fn check_entry(dist: &Path, entry: &str) -> EntryCheck {
    if !entry.starts_with('/') || entry.starts_with("//") {
        return EntryCheck::Remote;
    }
    let file = file_for(dist, entry);
    if file.is_file() { EntryCheck::Present(file) } else { EntryCheck::Missing(file) }
}

/// Check every entry; returns `(entry, result)` pairs in manifest order.
pub fn check(dist: &Path, entries: &[String]) -> Vec<(String, EntryCheck)> {
    entries.iter().map(|e| (e.clone(), check_entry(dist, e))).collect()
}
