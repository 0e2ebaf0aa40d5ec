//! Retention - removes expired artifacts and the directories they leave behind
//!
//! Includes:
//! - Candidate enumeration from path templates
//! - Expiry check against a cutoff instant
//! - Deletion with retry
//! - Deepest-first empty directory cleanup

use crate::common::MAX_DELETE_ATTEMPTS;
use crate::operations::template::PathTemplate;
use anyhow::{Context, Result, bail};
use filetime::FileTime;
use log::{debug, info, warn};
use std::{
    collections::{BTreeSet, HashSet},
    fs, io,
    path::{Path, PathBuf},
    thread,
    time::{Duration, SystemTime},
};
use walkdir::WalkDir;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PruneSummary {
    pub files_deleted: usize,
    pub dirs_deleted: usize,
    pub failures: usize,
}

/// Delete every file matched by `templates` whose modification time is
/// strictly older than `cutoff`, then remove the parent directories of the
/// deleted files that ended up empty.
pub fn prune_expired(templates: &[&PathTemplate], cutoff: SystemTime) -> Result<PruneSummary> {
    let cutoff = FileTime::from_system_time(cutoff);
    let mut summary = PruneSummary::default();
    let mut touched_dirs = HashSet::new();

    for path in collect_candidates(templates)? {
        let modified = match fs::metadata(&path) {
            Ok(metadata) => FileTime::from_last_modification_time(&metadata),
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => {
                warn!("Failed reading metadata of {:?}: {}", path, err);
                summary.failures += 1;
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match delete_with_retry(&path) {
            Ok(true) => {
                summary.files_deleted += 1;
                if let Some(parent) = path.parent() {
                    touched_dirs.insert(parent.to_path_buf());
                }
            }
            Ok(false) => {}
            Err(err) => {
                warn!("{:#}", err);
                summary.failures += 1;
            }
        }
    }

    summary.dirs_deleted = remove_empty_dirs(touched_dirs);
    Ok(summary)
}

/// Every file matched by any template, without duplicates.
pub fn collect_candidates(templates: &[&PathTemplate]) -> Result<BTreeSet<PathBuf>> {
    let mut candidates = BTreeSet::new();

    for template in templates {
        let root = template.scan_root();
        if !root.exists() {
            debug!("Scan root {:?} does not exist yet", root);
            continue;
        }

        let walker = WalkDir::new(root)
            .min_depth(template.depth())
            .max_depth(template.depth());
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) if err.depth() == 0 => {
                    return Err(err).context(format!("failed to scan {:?}", root));
                }
                Err(err) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, err);
                    continue;
                }
            };
            if entry.file_type().is_file() && template.matches(entry.path()) {
                candidates.insert(entry.into_path());
            }
        }
    }

    Ok(candidates)
}

/// `Ok(false)` when the file was already gone.
fn delete_with_retry(path: &Path) -> Result<bool> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match fs::remove_file(path) {
            Ok(_) => {
                info!("Deleted file: {:?}", path);
                return Ok(true);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) if attempts < MAX_DELETE_ATTEMPTS => {
                warn!(
                    "Failed deleting {:?} (attempt {}), retrying in {}ms: {}",
                    path,
                    attempts,
                    100 * attempts,
                    err
                );
                thread::sleep(Duration::from_millis(100 * attempts));
            }
            Err(err) => {
                return Err(err).context(format!(
                    "Failed deleting {:?} after {} attempts",
                    path, attempts
                ));
            }
        }
    }
}

/// Visit directories longest path first so a child removed here can leave its
/// parent empty for a later iteration. Only the given directories are
/// considered; their ancestors are never walked.
fn remove_empty_dirs(dirs: HashSet<PathBuf>) -> usize {
    let mut dirs: Vec<PathBuf> = dirs.into_iter().collect();
    dirs.sort_by(|a, b| {
        b.as_os_str()
            .len()
            .cmp(&a.as_os_str().len())
            .then_with(|| a.cmp(b))
    });

    let mut removed = 0;
    for dir in dirs {
        match remove_dir_if_empty(&dir) {
            Ok(true) => {
                info!("Deleted empty directory: {:?}", dir);
                removed += 1;
            }
            Ok(false) => {}
            Err(err) => warn!("{:#}", err),
        }
    }
    removed
}

fn remove_dir_if_empty(dir: &Path) -> Result<bool> {
    let mut entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => bail!("failed to list {:?}: {}", dir, err),
    };
    if entries.next().is_some() {
        return Ok(false);
    }
    fs::remove_dir(dir).context(format!("failed to remove directory {:?}", dir))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::set_file_mtime;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn touch(path: &Path, age: Duration, now: SystemTime) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"jpeg").unwrap();
        set_file_mtime(path, FileTime::from_system_time(now - age)).unwrap();
    }

    fn template(root: &Path, rest: &str) -> PathTemplate {
        PathTemplate::parse(&format!("{}/{}", root.display(), rest)).unwrap()
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn deletes_only_files_older_than_cutoff() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        let old = dir.path().join("cam/2024-01-01/2024-01-01T10-00-00.jpg");
        let fresh = dir.path().join("cam/2024-01-01/2024-01-01T10-15-00.jpg");
        touch(&old, 20 * MINUTE, now);
        touch(&fresh, 5 * MINUTE, now);

        let primary = template(dir.path(), "cam/{date}/{datetime}.jpg");
        let summary = prune_expired(&[&primary], now - 10 * MINUTE).unwrap();

        assert_eq!(
            summary,
            PruneSummary {
                files_deleted: 1,
                dirs_deleted: 0,
                failures: 0
            }
        );
        assert!(!old.exists());
        assert!(fresh.exists());
    }

    #[test]
    fn removes_emptied_directories_deepest_first() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        let a = dir.path().join("a");
        let b = a.join("b");
        let c = b.join("c");
        touch(&b.join("2024-01-01.jpg"), 20 * MINUTE, now);
        touch(&c.join("2024-01-01.jpg"), 20 * MINUTE, now);

        let primary = template(dir.path(), "a/b/{date}.jpg");
        let thumbs = template(dir.path(), "a/b/c/{date}.jpg");
        let summary = prune_expired(&[&primary, &thumbs], now - 10 * MINUTE).unwrap();

        assert_eq!(summary.files_deleted, 2);
        assert_eq!(summary.dirs_deleted, 2);
        assert!(!c.exists());
        assert!(!b.exists());
        // empty, but no file was deleted directly inside it
        assert!(a.exists());
    }

    #[test]
    fn keeps_directories_that_still_hold_files() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        let day = dir.path().join("cam/2024-01-01");
        touch(&day.join("old.jpg"), 20 * MINUTE, now);
        touch(&day.join("new.jpg"), MINUTE, now);

        let primary = template(dir.path(), "cam/{date}/{time}.jpg");
        let summary = prune_expired(&[&primary], now - 10 * MINUTE).unwrap();

        assert_eq!(summary.files_deleted, 1);
        assert_eq!(summary.dirs_deleted, 0);
        assert!(day.exists());
    }

    #[test]
    fn overlapping_templates_delete_each_file_once() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        let shot = dir.path().join("cam/2024-01-01T10-00-00.jpg");
        let thumb = dir.path().join("cam/2024-01-01T10-00-00-thumb.jpg");
        touch(&shot, 20 * MINUTE, now);
        touch(&thumb, 20 * MINUTE, now);

        let primary = template(dir.path(), "cam/{datetime}.jpg");
        let thumbs = template(dir.path(), "cam/{datetime}-thumb.jpg");
        let summary = prune_expired(&[&primary, &thumbs], now - 10 * MINUTE).unwrap();

        assert_eq!(summary.files_deleted, 2);
        assert_eq!(summary.failures, 0);
        assert_eq!(summary.dirs_deleted, 1);
    }

    #[test]
    fn disjoint_records_do_not_interfere() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        let a_file = dir.path().join("records/cam-a/2024-01-01.jpg");
        let b_file = dir.path().join("records/cam-b/2024-01-01.jpg");
        let stray = dir.path().join("records/cam-a/notes.txt");
        touch(&a_file, 20 * MINUTE, now);
        touch(&b_file, 20 * MINUTE, now);
        touch(&stray, 20 * MINUTE, now);

        let record_a = template(dir.path(), "records/cam-a/{date}.jpg");
        let summary = prune_expired(&[&record_a], now - 10 * MINUTE).unwrap();

        assert_eq!(summary.files_deleted, 1);
        assert!(!a_file.exists());
        assert!(b_file.exists());
        assert!(stray.exists());
    }

    #[test]
    fn missing_scan_root_is_not_an_error() {
        let dir = tempdir().unwrap();
        let primary = template(dir.path(), "never-created/{date}.jpg");

        let summary = prune_expired(&[&primary], SystemTime::now()).unwrap();

        assert_eq!(summary, PruneSummary::default());
    }

    #[test]
    fn directories_are_never_treated_as_artifacts() {
        let dir = tempdir().unwrap();
        let now = SystemTime::now();
        let lookalike = dir.path().join("cam/2024-01-01.jpg");
        fs::create_dir_all(&lookalike).unwrap();
        set_file_mtime(&lookalike, FileTime::from_system_time(now - 20 * MINUTE)).unwrap();

        let primary = template(dir.path(), "cam/{date}.jpg");
        let candidates = collect_candidates(&[&primary]).unwrap();

        assert!(candidates.is_empty());
    }
}
