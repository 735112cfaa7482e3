use anyhow::Result;
use chrono::{NaiveDateTime, Utc};
use fs_err as fs;
use std::path::{Path, PathBuf};

/// Maximum number of backups kept on disk
const MAX_BACKUPS: usize = 30;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;

fn ensure_backup_dir(backup_dir: &Path) -> Result<()> {
    if !backup_dir.exists() {
        fs::create_dir_all(backup_dir)?;
        log::info!("Created backup directory: {}", backup_dir.display());
    }
    Ok(())
}

/// Parses the `YYYYmmdd_HHMMSS` prefix of a backup file name.
fn backup_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let file_name = path.file_name()?.to_str()?;
    let prefix = file_name.get(0..TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(prefix, TIMESTAMP_FORMAT).ok()
}

/// Copies the database file into `backup_dir` under a timestamped name
///
/// # Arguments
///
/// * `db_path` - Path to the SQLite database file
/// * `backup_dir` - Directory that collects the copies (created if missing)
///
/// # Returns
///
/// Path of the new backup. Older backups beyond the newest 30 are removed.
pub fn create_backup(db_path: &str, backup_dir: &str) -> Result<PathBuf> {
    let backup_dir = Path::new(backup_dir);
    ensure_backup_dir(backup_dir)?;

    let timestamp = Utc::now().format(TIMESTAMP_FORMAT);
    let db_name = Path::new(db_path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("kinotreyler.db");
    let backup_path = backup_dir.join(format!("{}_{}", timestamp, db_name));

    fs::copy(db_path, &backup_path)?;
    log::info!("Created backup: {}", backup_path.display());

    cleanup_old_backups(backup_dir)?;

    Ok(backup_path)
}

/// Removes all but the newest `MAX_BACKUPS` backups
fn cleanup_old_backups(backup_dir: &Path) -> Result<()> {
    let backups = scan_backups(backup_dir)?;

    for (path, _) in backups.iter().skip(MAX_BACKUPS) {
        if let Err(e) = fs::remove_file(path) {
            log::warn!("Failed to remove old backup {}: {}", path.display(), e);
        } else {
            log::info!("Removed old backup: {}", path.display());
        }
    }

    Ok(())
}

fn scan_backups(backup_dir: &Path) -> Result<Vec<(PathBuf, NaiveDateTime)>> {
    let mut backups = Vec::new();

    if backup_dir.is_dir() {
        for entry in fs::read_dir(backup_dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(ts) = backup_timestamp(&path) {
                backups.push((path, ts));
            }
        }
    }

    // Newest first; same-second backups fall back to name order
    backups.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    Ok(backups)
}

/// Lists existing backups, newest first
pub fn list_backups(backup_dir: &str) -> Result<Vec<(PathBuf, NaiveDateTime)>> {
    scan_backups(Path::new(backup_dir))
}
