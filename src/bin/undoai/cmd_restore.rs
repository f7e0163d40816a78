use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use undoai::config::UndoConfig;
use undoai::patterns::split_list;
use undoai::restore::{execute, plan_restore, FileSelector, RestorePlan};
use undoai::snapshots::{ensure_same_project, SnapshotEntry, SnapshotLabel, SnapshotStore};

use crate::util::{confirm, display_rel, now_ms, parse_selection, plural, prompt, relative_time};

const PREVIEW_LIMIT: usize = 10;

pub struct RestoreArgs {
    pub id: Option<String>,
    pub latest: bool,
    pub interactive: bool,
    pub files: Option<String>,
    pub pattern: Option<String>,
    pub yes: bool,
}

/// CLI: restore: вернуть файлы из снапшота в текущий проект.
///
/// Примеры:
///   undoai restore                      (выбор снапшота из списка)
///   undoai restore --latest -y
///   undoai restore 1700000000000 -f "**/*.rs,**/Cargo.toml"
///   undoai restore --latest -i
pub fn exec(args: RestoreArgs) -> Result<()> {
    let cfg = UndoConfig::from_env();
    let store = SnapshotStore::open(&cfg.storage_root)
        .context("no snapshots found; start watching with `undoai watch` first")?;
    let root = crate::util::project_root()?;

    let id = match resolve_id(&store, &args)? {
        Some(id) => id,
        None => {
            println!("Restore cancelled");
            return Ok(());
        }
    };

    let meta = store.snapshot_metadata(&id)?;
    ensure_same_project(&meta, &root)?;

    let mut patterns = args.files.as_deref().map(split_list).unwrap_or_default();
    if let Some(p) = args.pattern.as_deref() {
        patterns.extend(split_list(p));
    }

    let mut stdin_selector = StdinSelector;
    let selector: Option<&mut dyn FileSelector> = if args.interactive {
        Some(&mut stdin_selector)
    } else {
        None
    };

    let files = match plan_restore(&meta, &patterns, selector)? {
        RestorePlan::Files(files) => files,
        RestorePlan::Cancelled => {
            println!("No files selected");
            return Ok(());
        }
    };
    if !patterns.is_empty() {
        println!("Matched {} file{} from pattern", files.len(), plural(files.len()));
    }

    print_preview(&files, &root);
    if !args.yes {
        println!("Current changes to these files will be overwritten.");
        if !confirm("Continue with restore?", true)? {
            println!("Restore cancelled");
            return Ok(());
        }
    }

    let report = execute(&store, &id, &root, &files)?;
    for f in report.failed() {
        eprintln!(
            "  failed: {}: {}",
            display_rel(&f.path, &root),
            f.error.as_deref().unwrap_or("unknown error")
        );
    }
    let n = report.restored();
    println!("Restored {} file{}", n, plural(n));
    println!("From: {}", relative_time(meta.timestamp, now_ms()));
    Ok(())
}

/// Explicit id, --latest, or the picker. None = cancelled.
fn resolve_id(store: &SnapshotStore, args: &RestoreArgs) -> Result<Option<String>> {
    if let Some(id) = &args.id {
        return Ok(Some(id.trim().to_string()));
    }

    let candidates: Vec<SnapshotEntry> = store
        .list_snapshots()?
        .into_iter()
        .filter(|e| e.metadata.file_count > 0)
        .collect();
    if candidates.is_empty() {
        anyhow::bail!("no snapshots available; start watching with `undoai watch` to create snapshots");
    }
    if args.latest {
        return Ok(Some(candidates[0].id.clone()));
    }

    println!("Available snapshots:");
    let now = now_ms();
    for (i, e) in candidates.iter().enumerate() {
        let label = match e.metadata.label {
            SnapshotLabel::AiBurst => "AI",
            SnapshotLabel::Auto => "Auto",
        };
        println!(
            "  {:>2}. [{}]  {} file{}  {}",
            i + 1,
            relative_time(e.metadata.timestamp, now),
            e.metadata.file_count,
            plural(e.metadata.file_count),
            label
        );
    }
    println!("   0. Cancel");

    loop {
        let ans = prompt("Which snapshot do you want to restore? ")?;
        if ans.is_empty() || ans == "0" {
            return Ok(None);
        }
        match ans.parse::<usize>() {
            Ok(n) if n >= 1 && n <= candidates.len() => {
                return Ok(Some(candidates[n - 1].id.clone()))
            }
            _ => println!("enter a number between 0 and {}", candidates.len()),
        }
    }
}

fn print_preview(files: &[PathBuf], root: &Path) {
    println!(
        "Preview: {} file{} will be restored",
        files.len(),
        plural(files.len())
    );
    for f in files.iter().take(PREVIEW_LIMIT) {
        println!("  {}", display_rel(f, root));
    }
    if files.len() > PREVIEW_LIMIT {
        println!("  ... and {} more", files.len() - PREVIEW_LIMIT);
    }
}

/// Numbered list on stdout, selection ("1,3,5-7", "a") from stdin. Empty input selects nothing.
struct StdinSelector;

impl FileSelector for StdinSelector {
    fn select(&mut self, candidates: &[PathBuf], project_root: &Path) -> Result<Vec<PathBuf>> {
        println!("Select files to restore:");
        for (i, f) in candidates.iter().enumerate() {
            println!("  {:>3}. {}", i + 1, display_rel(f, project_root));
        }
        loop {
            let ans = prompt("Files (e.g. 1,3,5-7 or a for all; empty = none): ")?;
            match parse_selection(&ans, candidates.len()) {
                Ok(idx) => return Ok(idx.into_iter().map(|i| candidates[i].clone()).collect()),
                Err(e) => println!("{}", e),
            }
        }
    }
}
