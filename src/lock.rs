//! Single-instance lock for the watch daemon.
//!
//! Cross-platform (fs2) advisory lock on <root>/daemon.pid:
//! - try_acquire(): exclusive, non-blocking; the holder's PID is written into the file.
//! - probe(): PID of a live holder, if any. A file whose lock is free is stale.
//!
//! The file itself is never unlinked, so every holder locks the same inode. Drop truncates
//! it and unlocks. A crashed holder loses its lock with the process, so a stale file never
//! blocks the next `watch`.

use anyhow::{Context, Result};
use fs2::FileExt;
use log::debug;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::UndoError;

pub const PID_FILE: &str = "daemon.pid";

pub fn pid_file_path(root: &Path) -> PathBuf {
    root.join(PID_FILE)
}

pub struct DaemonLock {
    file: File,
    path: PathBuf,
    pid: u32,
}

impl DaemonLock {
    /// Take the exclusive lock or fail with `AlreadyRunning`.
    pub fn try_acquire(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("create storage root {}", root.display()))?;
        let path = pid_file_path(root);
        let mut file = open_pid_file(&path)?;

        if file.try_lock_exclusive().is_err() {
            let pid = read_pid(&mut file).unwrap_or(0);
            return Err(UndoError::AlreadyRunning { pid }.into());
        }

        let pid = std::process::id();
        file.set_len(0)
            .with_context(|| format!("truncate {}", path.display()))?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(pid.to_string().as_bytes())
            .with_context(|| format!("write pid into {}", path.display()))?;
        file.flush()?;
        debug!("daemon lock acquired: {} (pid {})", path.display(), pid);

        Ok(Self { file, path, pid })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// PID of the process currently holding the lock under `root`, if any.
    pub fn probe(root: &Path) -> Result<Option<u32>> {
        let path = pid_file_path(root);
        if !path.exists() {
            return Ok(None);
        }
        let mut file = open_pid_file(&path)?;
        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                // nobody holds it: stale pid file
                let _ = FileExt::unlock(&file);
                Ok(None)
            }
            Err(_) => Ok(Some(read_pid(&mut file).unwrap_or(0))),
        }
    }
}

impl Drop for DaemonLock {
    fn drop(&mut self) {
        let _ = self.file.set_len(0);
        let _ = FileExt::unlock(&self.file);
    }
}

fn open_pid_file(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)
        .with_context(|| format!("open pid file {}", path.display()))
}

fn read_pid(file: &mut File) -> Option<u32> {
    let mut s = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut s).ok()?;
    s.trim().parse::<u32>().ok()
}
