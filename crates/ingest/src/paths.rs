use std::path::{Path, PathBuf};

pub fn default_openclaw_home() -> PathBuf {
    if let Ok(path) = std::env::var("OPENCLAW_HOME") {
        return PathBuf::from(path);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".openclaw");
    }
    PathBuf::from(".openclaw")
}

/// Directories under a home that hold session logs: every
/// `agents/<name>/sessions`, then `sessions` and `logs`. Missing ones are
/// left out.
pub fn session_log_dirs(home: &Path) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(entries) = std::fs::read_dir(home.join("agents")) {
        let mut agents = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path().join("sessions"))
            .filter(|path| path.is_dir())
            .collect::<Vec<_>>();
        agents.sort();
        dirs.extend(agents);
    }
    for name in ["sessions", "logs"] {
        let dir = home.join(name);
        if dir.is_dir() {
            dirs.push(dir);
        }
    }
    dirs
}
