//! Utility functions shared by the manager and the helper

use std::path::{Path, PathBuf};

/// Generate a time-ordered UUID (v7)
pub fn generate_uuid() -> uuid::Uuid {
    uuid::Uuid::now_v7()
}

/// Platform identifier for the running machine, e.g. "linux-x64" or "osx-arm64"
pub fn current_platform_id() -> &'static str {
    platform_id(std::env::consts::OS, std::env::consts::ARCH)
}

fn platform_id(os: &str, arch: &str) -> &'static str {
    match (os, arch) {
        ("windows", "x86_64") => "win-x64",
        ("windows", "x86") => "win-x86",
        ("windows", "aarch64") => "win-arm64",
        ("macos", "x86_64") => "osx-x64",
        ("macos", "aarch64") => "osx-arm64",
        ("linux", "x86_64") => "linux-x64",
        ("linux", "x86") => "linux-x86",
        ("linux", "aarch64") => "linux-arm64",
        ("linux", "arm") => "linux-arm",
        _ => "unknown",
    }
}

/// A fresh path beside `path` (same parent), e.g. `/opt/.app.backup-<uuid>`.
///
/// Renames between `path` and the returned path stay on one volume.
pub fn sibling_path(path: &Path, label: &str) -> PathBuf {
    let name = get_filename(path);
    let sibling = format!(".{}.{}-{}", name, label, generate_uuid().simple());
    match path.parent() {
        Some(parent) => parent.join(sibling),
        None => PathBuf::from(sibling),
    }
}

/// Extract filename from path
pub fn get_filename(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Recursively copy a directory tree, returning the number of files copied
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(dst)?;
    let mut copied = 0;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copied += copy_dir_recursive(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Format file size for display
pub fn format_file_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
