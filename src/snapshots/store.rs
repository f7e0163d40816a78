//! On-disk snapshot store.
//!
//! Layout:
//! - <root>/snapshots/<id>/metadata.json
//! - <root>/snapshots/<id>/files/<encoded relative path>.gz
//!
//! Every captured file is an independent gzip blob, so single files can be restored (or fail)
//! without touching the rest of the snapshot. Blobs and metadata are written to a `.tmp`
//! sibling and renamed into place. Metadata is written last and lists only the files whose
//! blob landed.
//!
//! Snapshot id = unix time in ms at capture. If that container already exists (two captures
//! within one millisecond) the id is bumped by 1 ms until `create_dir` succeeds, which keeps
//! ids unique and numerically ordered by capture time (within one process the next id is
//! also never lower than the last one handed out).
//!
//! One writer per snapshot id at a time; no cross-process locking here (the watch session
//! holds the daemon lock).

use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::batch::ChangeBatch;
use crate::codec;
use crate::error::UndoError;
use crate::metrics::{
    record_file_captured, record_file_restored, record_file_skipped, record_restore_failure,
    record_snapshot_created,
};

use super::meta::{read_metadata, write_metadata, SnapshotLabel, SnapshotMetadata, METADATA_FILE};

pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const FILES_DIR: &str = "files";

// Highest id handed out by this process; ids never go backwards even after a bump.
static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Id + metadata pair returned by listing.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    pub id: String,
    pub metadata: SnapshotMetadata,
}

pub struct SnapshotStore {
    root: PathBuf,
    snapshots_dir: PathBuf,
}

impl SnapshotStore {
    /// Create <root>/snapshots if missing and open the store.
    pub fn init(root: &Path) -> Result<Self> {
        let snapshots_dir = root.join(SNAPSHOTS_DIR);
        fs::create_dir_all(&snapshots_dir)
            .with_context(|| format!("create snapshots dir {}", snapshots_dir.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            snapshots_dir,
        })
    }

    /// Open an existing store; `NotInitialized` if <root>/snapshots is absent.
    pub fn open(root: &Path) -> Result<Self> {
        if !Self::is_initialized(root) {
            return Err(UndoError::NotInitialized(root.to_path_buf()).into());
        }
        Ok(Self {
            root: root.to_path_buf(),
            snapshots_dir: root.join(SNAPSHOTS_DIR),
        })
    }

    pub fn is_initialized(root: &Path) -> bool {
        root.is_dir() && root.join(SNAPSHOTS_DIR).is_dir()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_dir(&self, id: &str) -> PathBuf {
        self.snapshots_dir.join(id)
    }

    pub fn files_dir(&self, id: &str) -> PathBuf {
        self.snapshot_dir(id).join(FILES_DIR)
    }

    // ---------------- capture ----------------

    /// Capture every path of `batch` that is still a regular file under `project_root`.
    ///
    /// Vanished files and per-file read/compress/write failures are logged and skipped.
    /// Returns the new snapshot id even if some (or all) files were skipped.
    pub fn create_snapshot(
        &self,
        batch: &ChangeBatch,
        project_root: &Path,
        label: SnapshotLabel,
    ) -> Result<String> {
        let (id, ts) = self.allocate_id()?;
        // removes the whole container unless the capture reaches commit()
        let guard = ContainerGuard::new(self.snapshot_dir(&id));
        let files_dir = self.files_dir(&id);
        fs::create_dir_all(&files_dir)
            .with_context(|| format!("create snapshot files dir {}", files_dir.display()))?;

        let mut captured: Vec<PathBuf> = Vec::with_capacity(batch.len());
        // blob name -> source path (guards against marker collisions inside one snapshot)
        let mut used_names: HashMap<String, PathBuf> = HashMap::new();
        let mut skipped = 0usize;

        for path in batch.iter() {
            if !is_regular_file(path) {
                debug!("snapshot {}: skip {} (no longer a file)", id, path.display());
                skipped += 1;
                record_file_skipped();
                continue;
            }

            let name = match codec::blob_name(path, project_root) {
                Ok(n) => n,
                Err(e) => {
                    warn!("snapshot {}: skip {}: {}", id, path.display(), e);
                    skipped += 1;
                    record_file_skipped();
                    continue;
                }
            };

            if let Ok(rel) = codec::relative_to(path, project_root) {
                if codec::is_ambiguous(&rel) {
                    warn!(
                        "snapshot {}: {} contains the '{}' marker; stored name {} is ambiguous",
                        id,
                        rel.display(),
                        codec::MARKER,
                        name
                    );
                }
            }

            if let Some(prev) = used_names.get(&name) {
                warn!(
                    "snapshot {}: skip {}: blob name {} already used by {}",
                    id,
                    path.display(),
                    name,
                    prev.display()
                );
                skipped += 1;
                record_file_skipped();
                continue;
            }

            match write_blob(path, &files_dir.join(&name)) {
                Ok(bytes) => {
                    record_file_captured(bytes);
                    used_names.insert(name, path.to_path_buf());
                    captured.push(path.to_path_buf());
                }
                Err(e) => {
                    warn!("snapshot {}: failed to copy {}: {:#}", id, path.display(), e);
                    skipped += 1;
                    record_file_skipped();
                }
            }
        }

        let meta = SnapshotMetadata::new(ts, project_root, captured, label);
        write_metadata(&self.snapshot_dir(&id), &meta)
            .with_context(|| format!("write metadata for snapshot {id}"))?;
        guard.commit();
        record_snapshot_created();

        if skipped > 0 {
            info!(
                "snapshot {}: captured {} file(s), skipped {}",
                id, meta.file_count, skipped
            );
        } else {
            debug!("snapshot {}: captured {} file(s)", id, meta.file_count);
        }
        Ok(id)
    }

    /// Claim a fresh snapshot directory named after the current unix-ms time.
    fn allocate_id(&self) -> Result<(String, u64)> {
        fs::create_dir_all(&self.snapshots_dir)
            .with_context(|| format!("create snapshots dir {}", self.snapshots_dir.display()))?;
        let mut ts = now_unix_ms().max(LAST_ID.load(Ordering::Relaxed) + 1);
        loop {
            let id = ts.to_string();
            let dir = self.snapshot_dir(&id);
            match fs::create_dir(&dir) {
                Ok(()) => {
                    LAST_ID.fetch_max(ts, Ordering::Relaxed);
                    return Ok((id, ts));
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    ts += 1;
                }
                Err(e) => {
                    return Err(anyhow!(e))
                        .with_context(|| format!("create snapshot dir {}", dir.display()))
                }
            }
        }
    }

    // ---------------- restore ----------------

    /// Overwrite `path` with its content from snapshot `id`, creating parent dirs first.
    ///
    /// Fails with `BlobNotFound` if the snapshot has no blob for this path. The blob is fully
    /// decompressed before the target is touched, so a corrupt blob leaves the file as is.
    pub fn restore_file(&self, path: &Path, id: &str, project_root: &Path) -> Result<()> {
        let name = codec::blob_name(path, project_root)?;
        let blob = self.files_dir(id).join(&name);
        if !blob.is_file() {
            return Err(UndoError::BlobNotFound {
                id: id.to_string(),
                name,
            }
            .into());
        }

        let f = OpenOptions::new()
            .read(true)
            .open(&blob)
            .with_context(|| format!("open blob {}", blob.display()))?;
        let mut data = Vec::new();
        GzDecoder::new(f)
            .read_to_end(&mut data)
            .with_context(|| format!("decompress blob {}", blob.display()))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir {}", parent.display()))?;
        }
        fs::write(path, &data).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }

    /// Restore every file of snapshot `id` into `project_root`.
    ///
    /// Refuses (without writing anything) when the snapshot was taken in another project.
    /// Per-file failures are logged; returns the number of files restored.
    pub fn restore_snapshot(&self, id: &str, project_root: &Path) -> Result<usize> {
        let meta = self.snapshot_metadata(id)?;
        ensure_same_project(&meta, project_root)?;

        let mut restored = 0usize;
        for file in &meta.changed_files {
            match self.restore_file(file, id, project_root) {
                Ok(()) => {
                    restored += 1;
                    record_file_restored();
                }
                Err(e) => {
                    warn!("restore {}: failed to restore {}: {:#}", id, file.display(), e);
                    record_restore_failure();
                }
            }
        }
        info!(
            "restore {}: {} of {} file(s) restored",
            id,
            restored,
            meta.changed_files.len()
        );
        Ok(restored)
    }

    // ---------------- listing / maintenance ----------------

    /// Snapshot ids, newest first. Entries whose name is not a number are ignored.
    pub fn snapshot_ids(&self) -> Result<Vec<String>> {
        if !self.snapshots_dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids: Vec<(u64, String)> = Vec::new();
        for e in fs::read_dir(&self.snapshots_dir)
            .with_context(|| format!("read_dir {}", self.snapshots_dir.display()))?
        {
            let e = e?;
            if !e.file_type()?.is_dir() {
                continue;
            }
            let name = e.file_name().to_string_lossy().into_owned();
            if let Ok(n) = name.parse::<u64>() {
                ids.push((n, name));
            }
        }
        ids.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    /// All snapshots with readable metadata, newest first.
    pub fn list_snapshots(&self) -> Result<Vec<SnapshotEntry>> {
        let mut out = Vec::new();
        for id in self.snapshot_ids()? {
            match read_metadata(&self.snapshot_dir(&id)) {
                Ok(metadata) => out.push(SnapshotEntry { id, metadata }),
                Err(e) => warn!("snapshot {}: unreadable metadata: {:#}", id, e),
            }
        }
        Ok(out)
    }

    /// Number of snapshots with a metadata record (same set as `list_snapshots`, minus
    /// unparsable ones).
    pub fn snapshot_count(&self) -> Result<usize> {
        Ok(self
            .snapshot_ids()?
            .iter()
            .filter(|id| self.snapshot_dir(id).join(METADATA_FILE).is_file())
            .count())
    }

    pub fn snapshot_metadata(&self, id: &str) -> Result<SnapshotMetadata> {
        let dir = self.snapshot_dir(id);
        if !is_valid_id(id) || !dir.is_dir() {
            return Err(UndoError::SnapshotNotFound(id.to_string()).into());
        }
        read_metadata(&dir)
    }

    /// Remove the whole snapshot container.
    pub fn delete_snapshot(&self, id: &str) -> Result<()> {
        let dir = self.snapshot_dir(id);
        if !is_valid_id(id) || !dir.is_dir() {
            return Err(UndoError::SnapshotNotFound(id.to_string()).into());
        }
        fs::remove_dir_all(&dir).with_context(|| format!("remove {}", dir.display()))?;
        info!("snapshot {} deleted", id);
        Ok(())
    }

    /// Sum of file sizes under <root>/snapshots.
    pub fn total_size(&self) -> Result<u64> {
        if !self.snapshots_dir.exists() {
            return Ok(0);
        }
        dir_size(&self.snapshots_dir)
    }
}

/// Fail with `ProjectMismatch` unless the snapshot was taken in `project_root`.
pub fn ensure_same_project(meta: &SnapshotMetadata, project_root: &Path) -> Result<()> {
    if meta.project_root != project_root {
        return Err(UndoError::ProjectMismatch {
            recorded: meta.project_root.clone(),
            current: project_root.to_path_buf(),
        }
        .into());
    }
    Ok(())
}

// ---------------- helpers ----------------

/// Read `src`, gzip it and write the blob at `dst` (via dst.tmp). Returns compressed size.
fn write_blob(src: &Path, dst: &Path) -> Result<usize> {
    let content = fs::read(src).with_context(|| format!("read {}", src.display()))?;

    let mut enc = GzEncoder::new(Vec::with_capacity(content.len() / 2 + 64), Compression::default());
    enc.write_all(&content)?;
    let compressed = enc.finish().context("gzip finish")?;

    let tmp = dst.with_extension("gz.tmp");
    let res = write_tmp(&tmp, &compressed).and_then(|()| {
        fs::rename(&tmp, dst).with_context(|| format!("rename blob into {}", dst.display()))
    });
    if let Err(e) = res {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(compressed.len())
}

fn write_tmp(tmp: &Path, data: &[u8]) -> Result<()> {
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(tmp)
        .with_context(|| format!("open {}", tmp.display()))?;
    f.write_all(data)
        .with_context(|| format!("write {}", tmp.display()))?;
    f.flush()?;
    Ok(())
}

/// Snapshot container that is deleted on drop unless committed.
struct ContainerGuard {
    dir: PathBuf,
    armed: bool,
}

impl ContainerGuard {
    fn new(dir: PathBuf) -> Self {
        Self { dir, armed: true }
    }

    fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("discarding incomplete snapshot container {}", self.dir.display());
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}

fn is_regular_file(p: &Path) -> bool {
    fs::metadata(p).map(|m| m.is_file()).unwrap_or(false)
}

fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0u64;
    for e in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let e = e?;
        let ft = e.file_type()?;
        if ft.is_dir() {
            total += dir_size(&e.path())?;
        } else {
            total += e.metadata()?.len();
        }
    }
    Ok(total)
}

fn now_unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(prefix: &str) -> PathBuf {
        let t = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!("undoai-unit-{prefix}-{}-{t}", std::process::id()))
    }

    #[test]
    fn uncommitted_container_is_removed() {
        let base = scratch("guard");
        let dir = base.join("1700000000000");
        fs::create_dir_all(dir.join(FILES_DIR)).unwrap();
        fs::write(dir.join(FILES_DIR).join("a.txt.gz"), b"partial").unwrap();
        drop(ContainerGuard::new(dir.clone()));
        assert!(!dir.exists());

        fs::create_dir_all(&dir).unwrap();
        ContainerGuard::new(dir.clone()).commit();
        assert!(dir.exists());
    }

    #[test]
    fn failed_blob_write_leaves_no_tmp() {
        let base = scratch("blob");
        fs::create_dir_all(&base).unwrap();
        let src = base.join("src.txt");
        fs::write(&src, b"content").unwrap();
        // rename onto a non-empty directory fails
        let dst = base.join("a.txt.gz");
        fs::create_dir_all(dst.join("occupied")).unwrap();

        assert!(write_blob(&src, &dst).is_err());
        assert!(!base.join("a.txt.gz.tmp").exists());
        assert!(dst.is_dir());
    }

    #[test]
    fn container_without_metadata_is_not_counted() {
        let base = scratch("count");
        let store = SnapshotStore::init(&base).unwrap();
        let orphan = store.files_dir("1700000000000");
        fs::create_dir_all(&orphan).unwrap();
        fs::write(orphan.join("x.gz"), b"x").unwrap();

        assert_eq!(store.snapshot_count().unwrap(), 0);
        assert!(store.list_snapshots().unwrap().is_empty());
    }

    #[test]
    fn ids_must_be_numeric() {
        assert!(is_valid_id("1700000000000"));
        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../etc"));
        assert!(!is_valid_id("17000x"));
    }
}
