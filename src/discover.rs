//! Log file discovery when none is given on the command line.
//!
//! Claude Code writes one `.jsonl` per session under
//! `~/.claude/projects/<escaped cwd>/`, where the escaped cwd is the absolute
//! path with every `/` replaced by `-`. The newest file there wins; failing
//! that, the newest `.jsonl` in the current directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

/// Find the log to tail for the current working directory.
pub fn find_log() -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;
    if let Some(home) = dirs::home_dir() {
        let project = project_dir(&home, &cwd);
        if let Some(path) = newest_jsonl(&project) {
            debug!(path = %path.display(), "found session log");
            return Some(path);
        }
    }
    let path = newest_jsonl(&cwd)?;
    debug!(path = %path.display(), "found log in current directory");
    Some(path)
}

/// `~/.claude/projects/<escaped cwd>` for a working directory.
fn project_dir(home: &Path, cwd: &Path) -> PathBuf {
    home.join(".claude")
        .join("projects")
        .join(escape_path(&cwd.to_string_lossy()))
}

/// `/Users/me/proj` -> `-Users-me-proj`
fn escape_path(path: &str) -> String {
    let escaped = path.replace('/', "-");
    if escaped.starts_with('-') {
        escaped
    } else {
        format!("-{escaped}")
    }
}

fn is_jsonl(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "jsonl")
}

/// Most recently modified `*.jsonl` file directly inside `dir`.
fn newest_jsonl(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;

    let mut newest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !is_jsonl(&path) {
            continue;
        }
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().is_none_or(|(best, _)| modified > *best) {
            newest = Some((modified, path));
        }
    }

    newest.map(|(_, path)| path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use filetime::FileTime;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path, secs_ago: i64) {
        fs::write(path, "{}\n").unwrap();
        let now = FileTime::now();
        let then = FileTime::from_unix_time(now.unix_seconds() - secs_ago, 0);
        filetime::set_file_mtime(path, then).unwrap();
    }

    #[test]
    fn escape_path_replaces_separators() {
        assert_eq!(escape_path("/Users/me/proj"), "-Users-me-proj");
        assert_eq!(escape_path("relative/dir"), "-relative-dir");
    }

    #[test]
    fn project_dir_lives_under_claude_projects() {
        let dir = project_dir(Path::new("/home/me"), Path::new("/work/app"));
        assert_eq!(dir, PathBuf::from("/home/me/.claude/projects/-work-app"));
    }

    #[test]
    fn newest_jsonl_picks_most_recent_file() {
        let tmp = TempDir::new().unwrap();
        touch(&tmp.path().join("old.jsonl"), 600);
        touch(&tmp.path().join("new.jsonl"), 10);
        touch(&tmp.path().join("newer.txt"), 0);

        let newest = newest_jsonl(tmp.path()).unwrap();
        assert_eq!(newest.file_name().unwrap(), "new.jsonl");
    }

    #[test]
    fn newest_jsonl_ignores_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("nested.jsonl")).unwrap();
        assert!(newest_jsonl(tmp.path()).is_none());
    }

    #[test]
    fn missing_directory_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        assert!(newest_jsonl(&tmp.path().join("absent")).is_none());
    }
}
