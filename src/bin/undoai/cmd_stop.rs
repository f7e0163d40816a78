use anyhow::{anyhow, Result};

use undoai::config::UndoConfig;
use undoai::lock::DaemonLock;

/// CLI: stop: послать SIGTERM процессу, держащему daemon lock.
pub fn exec() -> Result<()> {
    let cfg = UndoConfig::from_env();
    let pid = match DaemonLock::probe(&cfg.storage_root)? {
        Some(pid) if pid != 0 => pid,
        Some(_) => return Err(anyhow!("watcher is running but its pid is unknown")),
        None => return Err(anyhow!("undoai is not running (use `undoai watch` to start)")),
    };
    terminate(pid)?;
    println!("stop: OK (sent SIGTERM to pid {})", pid);
    Ok(())
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<()> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if rc != 0 {
        return Err(anyhow!(
            "kill({}) failed: {}",
            pid,
            std::io::Error::last_os_error()
        ));
    }
    Ok(())
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<()> {
    Err(anyhow!(
        "stopping the watcher (pid {}) is only supported on unix; press Ctrl-C in its terminal",
        pid
    ))
}
