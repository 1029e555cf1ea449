mod parser;
mod paths;
mod pipeline;
mod totals;
mod types;

pub use parser::{extract_usage_record_from_line, extract_usage_record_from_value};
pub use paths::{default_openclaw_home, session_log_dirs};
pub use pipeline::{scan_openclaw_home, scan_paths, usage_from_path};
pub use totals::{accumulate, aggregate_lines, aggregate_records, merge_usage, usage_from_reader};
pub use types::{IngestError, IngestIssue, IngestStats, Result, ScanResult};
