//! Path codec: project-relative path <-> flat blob name.
//!
//! encode: take the path relative to the project root and replace every separator
//! ('/' and '\\') with MARKER. decode: replace MARKER with the platform separator.
//!
//! Example: /home/u/proj/src/auth.ts (root /home/u/proj) -> "src__auth.ts".
//!
//! Known limitation: the mapping is only a bijection when no path segment already contains
//! MARKER. "a__b" and "a/b" encode to the same name, and "__init__.py" does not decode back
//! to itself. `is_ambiguous()` lets callers detect such paths; the store refuses to let two
//! files of one snapshot share a blob name.

use anyhow::Result;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use crate::error::UndoError;

/// Separator replacement used in blob names.
pub const MARKER: &str = "__";

/// Extension appended to every stored blob.
pub const BLOB_EXT: &str = ".gz";

/// Path of `path` relative to `root`, or `OutsideProject`.
pub fn relative_to(path: &Path, root: &Path) -> Result<PathBuf> {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => Ok(rel.to_path_buf()),
        _ => Err(UndoError::OutsideProject {
            path: path.to_path_buf(),
            root: root.to_path_buf(),
        }
        .into()),
    }
}

/// Encode an absolute path under `root` into a flat, storage-safe name (without extension).
pub fn encode(path: &Path, root: &Path) -> Result<String> {
    let rel = relative_to(path, root)?;
    Ok(encode_relative(&rel))
}

/// Encode an already relative path.
pub fn encode_relative(rel: &Path) -> String {
    let s = rel.to_string_lossy();
    let mut out = String::with_capacity(s.len() + 8);
    for ch in s.chars() {
        if ch == '/' || ch == '\\' {
            out.push_str(MARKER);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Decode a safe name back into a relative path (platform separators).
pub fn decode(safe_name: &str) -> PathBuf {
    let name = safe_name.strip_suffix(BLOB_EXT).unwrap_or(safe_name);
    PathBuf::from(name.replace(MARKER, &MAIN_SEPARATOR.to_string()))
}

/// Blob file name for `path` ("<encoded>.gz").
pub fn blob_name(path: &Path, root: &Path) -> Result<String> {
    Ok(format!("{}{}", encode(path, root)?, BLOB_EXT))
}

/// True if decode(encode(rel)) would not give `rel` back, i.e. some segment contains MARKER
/// or ends with '_' right before a separator.
pub fn is_ambiguous(rel: &Path) -> bool {
    decode(&encode_relative(rel)) != rel
}
