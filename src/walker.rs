use std::path::{Path, PathBuf};

use crate::error::Result;

/// A note file found under the vault root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    /// Path relative to the vault root.
    pub relative_path: PathBuf,
    /// Fully resolved absolute path.
    pub absolute_path: PathBuf,
}

/// Extensions treated as notes.
const NOTE_EXTENSIONS: &[&str] = &["md", "markdown", "txt"];

/// Recursively walk the vault and list note files, sorted by relative path.
///
/// Hidden entries (names starting with `.`, e.g. `.obsidian/`, `.git/`)
/// are skipped, as are symlinks that resolve to directories inside the
/// vault. Only an unreadable root is an error; unreadable entries below it
/// are logged and skipped.
pub fn discover_files(root: &Path) -> Result<Vec<DiscoveredFile>> {
    let canonical_root = root.canonicalize()?;
    let mut found = Vec::new();
    walk(&canonical_root, &canonical_root, &mut found)?;
    found.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    Ok(found)
}

fn walk(
    root: &Path,
    dir: &Path,
    found: &mut Vec<DiscoveredFile>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(
                    dir = %dir.display(),
                    error = %e,
                    "skipping unreadable entry"
                );
                continue;
            }
        };
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }

        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "skipping unreadable entry"
                );
                continue;
            }
        };

        if file_type.is_dir() {
            if let Err(e) = walk(root, &path, found) {
                tracing::warn!(
                    dir = %path.display(),
                    error = %e,
                    "skipping unreadable directory"
                );
            }
        } else if file_type.is_symlink() {
            let Ok(resolved) = path.canonicalize() else {
                continue;
            };
            if resolved.is_file() && is_note(&resolved) {
                found.push(discovered(root, &path, resolved));
            }
        } else if file_type.is_file() && is_note(&path) {
            match path.canonicalize() {
                Ok(absolute) => found.push(discovered(root, &path, absolute)),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "skipping unresolvable file"
                    );
                }
            }
        }
    }

    Ok(())
}

fn is_note(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            NOTE_EXTENSIONS.iter().any(|n| n.eq_ignore_ascii_case(ext))
        })
}

fn discovered(root: &Path, path: &Path, absolute: PathBuf) -> DiscoveredFile {
    DiscoveredFile {
        relative_path: path.strip_prefix(root).unwrap_or(path).to_path_buf(),
        absolute_path: absolute,
    }
}
