use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};
use tracker_core::UsageMap;
use walkdir::WalkDir;

use crate::parser::{extract_usage_record_from_value, parse_json_line};
use crate::paths::session_log_dirs;
use crate::totals::{accumulate, merge_usage, usage_from_reader};
use crate::types::{IngestIssue, Result, ScanResult};

fn is_log_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|value| value.to_str()),
        Some("log") | Some("jsonl") | Some("ndjson")
    )
}

fn is_plain_log(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|value| value.to_str()),
        Some("log")
    )
}

fn looks_like_jsonl(file: &mut File) -> io::Result<bool> {
    file.seek(SeekFrom::Start(0))?;
    let mut reader = BufReader::new(&mut *file);
    let mut buf = String::new();
    for _ in 0..5 {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        return Ok(line.starts_with('{'));
    }
    Ok(false)
}

struct ParsedFile {
    usage: UsageMap,
    records_parsed: usize,
    lines_skipped: usize,
    bytes_read: u64,
    issues: Vec<IngestIssue>,
    skipped: bool,
}

impl ParsedFile {
    fn skipped(issues: Vec<IngestIssue>) -> Self {
        Self {
            usage: UsageMap::new(),
            records_parsed: 0,
            lines_skipped: 0,
            bytes_read: 0,
            issues,
            skipped: true,
        }
    }
}

fn issue(file_path: &str, err: impl ToString) -> IngestIssue {
    IngestIssue {
        file_path: file_path.to_string(),
        message: err.to_string(),
    }
}

fn parse_file(path: &Path) -> ParsedFile {
    let file_path = path.to_string_lossy().to_string();
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to open session log");
            return ParsedFile::skipped(vec![issue(&file_path, err)]);
        }
    };

    if is_plain_log(path) {
        match looks_like_jsonl(&mut file) {
            Ok(true) => {}
            Ok(false) => return ParsedFile::skipped(Vec::new()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to sniff log file");
                return ParsedFile::skipped(vec![issue(&file_path, err)]);
            }
        }
        if let Err(err) = file.seek(SeekFrom::Start(0)) {
            return ParsedFile::skipped(vec![issue(&file_path, err)]);
        }
    }

    let mut parsed = ParsedFile {
        usage: UsageMap::new(),
        records_parsed: 0,
        lines_skipped: 0,
        bytes_read: 0,
        issues: Vec::new(),
        skipped: false,
    };
    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => break,
            Ok(bytes) => {
                parsed.bytes_read = parsed.bytes_read.saturating_add(bytes as u64);
                let Ok(text) = std::str::from_utf8(&buf) else {
                    parsed.lines_skipped += 1;
                    continue;
                };
                let line = text.trim_end_matches(&['\n', '\r'][..]);
                if line.trim().is_empty() {
                    continue;
                }
                let Some(value) = parse_json_line(line) else {
                    parsed.lines_skipped += 1;
                    continue;
                };
                match extract_usage_record_from_value(&value) {
                    Some(record) => {
                        accumulate(&mut parsed.usage, &record);
                        parsed.records_parsed += 1;
                    }
                    None => parsed.lines_skipped += 1,
                }
            }
            Err(err) => {
                // Keep what was read so far; the rest of the file is unreadable.
                warn!(path = %path.display(), error = %err, "stopped reading session log");
                parsed.issues.push(issue(&file_path, err));
                break;
            }
        }
    }
    debug!(
        path = %path.display(),
        records = parsed.records_parsed,
        skipped = parsed.lines_skipped,
        bytes = parsed.bytes_read,
        "parsed session log"
    );
    parsed
}

fn collect_log_files(root: &Path, files: &mut Vec<PathBuf>, issues: &mut Vec<IngestIssue>) {
    if root.is_file() {
        files.push(root.to_path_buf());
        return;
    }
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let file_path = err
                    .path()
                    .map(|path| path.to_string_lossy().to_string())
                    .unwrap_or_else(|| "<unknown>".to_string());
                warn!(path = %file_path, error = %err, "failed to walk log directory");
                issues.push(issue(&file_path, err));
                continue;
            }
        };
        if entry.file_type().is_file() && is_log_path(entry.path()) {
            files.push(entry.path().to_path_buf());
        }
    }
}

/// Aggregates usage across files and directories.
///
/// Directories are walked recursively for `.jsonl`, `.ndjson` and JSON-looking
/// `.log` files; explicit files are read whatever their extension. A file that
/// cannot be opened or read is recorded in `stats.issues` and the scan goes on.
pub fn scan_paths(paths: &[PathBuf]) -> ScanResult {
    let mut result = ScanResult::default();
    let mut files = Vec::new();
    for path in paths {
        collect_log_files(path, &mut files, &mut result.stats.issues);
    }
    files.sort();
    files.dedup();

    let parsed_files = files
        .into_par_iter()
        .map(|path| parse_file(&path))
        .collect::<Vec<_>>();

    let stats = &mut result.stats;
    for parsed in parsed_files {
        stats.files_scanned += 1;
        stats.bytes_read += parsed.bytes_read;
        stats.records_parsed += parsed.records_parsed;
        stats.lines_skipped += parsed.lines_skipped;
        stats.issues.extend(parsed.issues);
        if parsed.skipped {
            stats.files_skipped += 1;
            continue;
        }
        merge_usage(&mut result.usage, parsed.usage);
    }
    result
}

/// Scans every session log directory under an OpenClaw home.
pub fn scan_openclaw_home(home: &Path) -> ScanResult {
    let dirs = session_log_dirs(home);
    if dirs.is_empty() {
        debug!(home = %home.display(), "no session log directories found");
    }
    scan_paths(&dirs)
}

/// Aggregates a single log, failing if it cannot be opened.
pub fn usage_from_path(path: &Path) -> Result<UsageMap> {
    let file = File::open(path)?;
    Ok(usage_from_reader(BufReader::new(file)))
}
