use anyhow::{anyhow, Context, Result};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Canonical current directory, used as the project root by watch and restore.
pub fn project_root() -> Result<PathBuf> {
    let cwd = std::env::current_dir().context("current dir")?;
    std::fs::canonicalize(&cwd).with_context(|| format!("canonicalize {}", cwd.display()))
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// "3 days ago", "1 hour ago", "5 mins ago", "just now".
pub fn relative_time(ts_ms: u64, now_ms: u64) -> String {
    let seconds = now_ms.saturating_sub(ts_ms) / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let plural = |n: u64| if n > 1 { "s" } else { "" };
    if days > 0 {
        format!("{} day{} ago", days, plural(days))
    } else if hours > 0 {
        format!("{} hour{} ago", hours, plural(hours))
    } else if minutes > 0 {
        format!("{} min{} ago", minutes, plural(minutes))
    } else {
        "just now".to_string()
    }
}

/// 0 -> "0 Bytes", 1536 -> "1.5 KB", 1048576 -> "1 MB".
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    let mut i = 0usize;
    let mut v = bytes as f64;
    while v >= 1024.0 && i < UNITS.len() - 1 {
        v /= 1024.0;
        i += 1;
    }
    // два знака после запятой, без хвостовых нулей
    let s = format!("{:.2}", v);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", s, UNITS[i])
}

pub fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Path relative to `root` for display; falls back to the full path.
pub fn display_rel(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Print `msg`, read one trimmed line from stdin (empty on EOF).
pub fn prompt(msg: &str) -> Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("read stdin")?;
    Ok(line.trim().to_string())
}

/// y/n question; empty answer = `default`.
pub fn confirm(msg: &str, default: bool) -> Result<bool> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    let ans = prompt(&format!("{} {} ", msg, hint))?;
    Ok(match ans.to_ascii_lowercase().as_str() {
        "" => default,
        "y" | "yes" => true,
        _ => false,
    })
}

/// Parse a 1-based selection over `n` items: "1,3,5-7", "a"/"all", "" (nothing).
/// Returns sorted, deduplicated 0-based indices.
pub fn parse_selection(input: &str, n: usize) -> Result<Vec<usize>> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("a") || input.eq_ignore_ascii_case("all") {
        return Ok((0..n).collect());
    }
    let mut out = Vec::new();
    for part in input.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (lo, hi) = match part.split_once('-') {
            Some((a, b)) => (parse_index(a, n)?, parse_index(b, n)?),
            None => {
                let i = parse_index(part, n)?;
                (i, i)
            }
        };
        if lo > hi {
            return Err(anyhow!("invalid range '{}'", part));
        }
        out.extend(lo..=hi);
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

fn parse_index(s: &str, n: usize) -> Result<usize> {
    let v: usize = s
        .trim()
        .parse()
        .map_err(|_| anyhow!("not a number: '{}'", s.trim()))?;
    if v == 0 || v > n {
        return Err(anyhow!("{} is out of range 1..={}", v, n));
    }
    Ok(v - 1)
}
