use std::path::{Path, PathBuf};

use tracker_app::LogSources;

const DATA_DIR_NAME: &str = "token-tracker";

/// `--data-dir` (or `$TOKEN_TRACKER_HOME`, read by clap), else
/// `~/.openclaw/token-tracker`.
pub fn resolve_data_dir(flag: Option<&Path>) -> Result<PathBuf, String> {
    if let Some(dir) = flag {
        return Ok(dir.to_path_buf());
    }
    let home = std::env::var("HOME").map_err(|err| format!("resolve HOME: {}", err))?;
    Ok(PathBuf::from(home).join(".openclaw").join(DATA_DIR_NAME))
}

/// Explicit `--log` paths win, then `--home`, then the configured home, then
/// `$OPENCLAW_HOME` or `~/.openclaw`.
pub fn resolve_log_sources(
    logs: &[PathBuf],
    home_flag: Option<&Path>,
    configured_home: Option<&Path>,
) -> LogSources {
    if !logs.is_empty() {
        return LogSources::Paths(logs.to_vec());
    }
    let home = home_flag
        .or(configured_home)
        .map(Path::to_path_buf)
        .unwrap_or_else(ingest::default_openclaw_home);
    LogSources::Home(home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_data_dir_is_used_as_is() {
        let dir = resolve_data_dir(Some(Path::new("/data/tracker"))).expect("resolve");
        assert_eq!(dir, PathBuf::from("/data/tracker"));
    }

    #[test]
    fn log_paths_take_precedence() {
        let sources = resolve_log_sources(
            &[PathBuf::from("/tmp/a.jsonl")],
            Some(Path::new("/home")),
            None,
        );
        assert!(matches!(sources, LogSources::Paths(paths) if paths == vec![PathBuf::from("/tmp/a.jsonl")]));
    }

    #[test]
    fn home_flag_beats_configured_home() {
        let sources =
            resolve_log_sources(&[], Some(Path::new("/flag")), Some(Path::new("/config")));
        assert!(matches!(sources, LogSources::Home(home) if home == Path::new("/flag")));

        let sources = resolve_log_sources(&[], None, Some(Path::new("/config")));
        assert!(matches!(sources, LogSources::Home(home) if home == Path::new("/config")));
    }
}
