// Cache path utilities.
// Lays out one snapshot directory per connected instance host.

use std::path::PathBuf;

use directories::ProjectDirs;

use crate::records::RecordKind;

/// Base cache directory (~/.cache/nowsync on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "nowsync").map(|dirs| dirs.cache_dir().to_path_buf())
}

/// Snapshot directory for one instance host.
pub fn instance_dir(host: &str) -> Option<PathBuf> {
    cache_dir().map(|dir| dir.join("instances").join(sanitize_name(host)))
}

/// Snapshot file for one record kind inside an instance directory.
pub fn kind_path(instance_dir: &std::path::Path, kind: RecordKind) -> PathBuf {
    instance_dir.join(format!("{}.json", kind.class_tag()))
}

/// Sanitize a name for use in filesystem paths.
/// Replaces problematic characters with underscores.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}
