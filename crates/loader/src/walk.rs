use std::collections::{HashSet, VecDeque};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Walks `path` breadth first and returns every regular file accepted by
/// `accept`, sorted so that merged models are independent of directory order.
/// Symlinks and unreadable entries are skipped.
pub fn collect_files<F>(path: &Path, accept: &F) -> anyhow::Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    let mut pending: VecDeque<PathBuf> = VecDeque::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut found = Vec::new();
    pending.push_back(path.to_path_buf());

    while let Some(current) = pending.pop_front() {
        if !visited.insert(current.clone()) {
            continue;
        }
        let metadata = match fs::symlink_metadata(&current) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!(path = %current.display(), "Permission denied");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let file_type = metadata.file_type();
        if file_type.is_symlink() {
            debug!(path = %current.display(), "Symlink skipped");
            continue;
        }
        if file_type.is_file() {
            if accept(&current) {
                debug!(path = %current.display(), "Model file discovered");
                found.push(current);
            }
        } else if file_type.is_dir() {
            let entries = match fs::read_dir(&current) {
                Ok(e) => e,
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                    debug!(path = %current.display(), "Permission denied");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            for entry in entries.flatten() {
                let child = entry.path();
                if child
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'))
                {
                    continue;
                }
                pending.push_back(child);
            }
        }
    }

    found.sort();
    Ok(found)
}
