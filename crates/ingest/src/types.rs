use std::io;

use serde::Serialize;
use thiserror::Error;
use tracker_core::UsageMap;

/// Summary of one scan across the session logs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestStats {
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub records_parsed: usize,
    pub lines_skipped: usize,
    pub bytes_read: u64,
    pub issues: Vec<IngestIssue>,
}

/// Non-fatal issues encountered during ingest.
#[derive(Debug, Clone, Serialize)]
pub struct IngestIssue {
    pub file_path: String,
    pub message: String,
}

/// Aggregated usage together with the stats of the scan that produced it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanResult {
    pub usage: UsageMap,
    pub stats: IngestStats,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
