//! Glob matching helpers (globset).
//!
//! All globs are built with `literal_separator(true)`, so `*` stays inside one path segment
//! and `**` is needed to cross directories (`**/*.rs`, `**/node_modules/**`).

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

/// Directories and temp files that never enter a change batch.
pub const DEFAULT_IGNORE: &[&str] = &[
    "**/node_modules/**",
    "**/.git/**",
    "**/dist/**",
    "**/build/**",
    "**/target/**",
    "**/_tmp_*",
    "**/*.tmp",
    "**/pnpm-lock.yaml.*",
    "**/package.json.*",
];

/// Files whose change alone warrants a snapshot. Matched against the project-relative path.
pub const DEFAULT_IMPORTANT: &[&str] = &[
    ".env",
    ".env.*",
    "package.json",
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "tsconfig.json",
    "jsconfig.json",
    "**/*.prisma",
    "**/schema.prisma",
    "**/migrations/**",
    "Dockerfile",
    "docker-compose.yml",
    "docker-compose.*.yml",
    ".github/workflows/**",
    ".gitlab-ci.yml",
    "Jenkinsfile",
];

/// Compile a list of globs into one set.
pub fn build_globset<S: AsRef<str>>(patterns: &[S]) -> Result<GlobSet> {
    let mut b = GlobSetBuilder::new();
    for p in patterns {
        let p = p.as_ref().trim();
        if p.is_empty() {
            continue;
        }
        let glob = GlobBuilder::new(p)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob '{p}'"))?;
        b.add(glob);
    }
    b.build().context("build glob set")
}

/// match(path, pattern) -> bool
pub fn matches(path: &Path, pattern: &str) -> Result<bool> {
    Ok(build_globset(&[pattern])?.is_match(path))
}

/// Split a comma separated pattern list ("a, b,,c" -> ["a", "b", "c"]).
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
