//! Size-capped content loading.
//!
//! The size cap is checked against file metadata before any body bytes are
//! read, and the read itself is bounded so a file that grows after the probe
//! still cannot exceed the cap. Content that is not valid UTF-8 is decoded
//! lossily; loading never fails a run.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;

use tracing::{debug, trace};

use crate::filter::InclusionDecision;
use crate::walker::CandidatePath;

/// Default size cap: 1 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1024 * 1024;

/// Per-candidate outcome of the second pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileResult {
    Loaded(String),
    SkippedTooLarge(u64),
    SkippedByFilter(String),
    /// Pinned entry absent from disk.
    NotFound,
    Error(String),
}

impl FileResult {
    /// Resolve a non-included decision without touching the file.
    pub fn from_decision(decision: &InclusionDecision) -> Option<Self> {
        match decision {
            InclusionDecision::Included => None,
            InclusionDecision::NotFound => Some(FileResult::NotFound),
            other => Some(FileResult::SkippedByFilter(other.to_string())),
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, FileResult::Loaded(_))
    }

    /// Short label used in progress lines.
    pub fn label(&self) -> &'static str {
        match self {
            FileResult::Loaded(_) => "processed",
            FileResult::SkippedTooLarge(_) | FileResult::SkippedByFilter(_) => "skipped",
            FileResult::NotFound => "missing",
            FileResult::Error(_) => "error",
        }
    }
}

/// Reads candidate files under a size cap.
#[derive(Debug, Clone, Copy)]
pub struct ContentLoader {
    max_size: u64,
}

impl Default for ContentLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl ContentLoader {
    pub fn new(max_size: u64) -> Self {
        Self { max_size }
    }

    /// Load a candidate, classifying the outcome.
    pub fn load(&self, candidate: &CandidatePath) -> FileResult {
        match self.read_capped(&candidate.absolute) {
            Ok(result) => result,
            Err(e) => {
                debug!(path = %candidate.relative, error = %e, "read failed");
                FileResult::Error(describe_io(&e))
            }
        }
    }

    fn read_capped(&self, path: &Path) -> io::Result<FileResult> {
        // Opening a FIFO or device can block, so only regular files are opened.
        let metadata = fs::metadata(path)?;
        if !metadata.is_file() {
            return Ok(FileResult::Error("not a regular file".to_string()));
        }

        let size = metadata.len();
        if size > self.max_size {
            trace!(path = %path.display(), size, "over size cap, body not read");
            return Ok(FileResult::SkippedTooLarge(size));
        }

        let file = File::open(path)?;
        let mut bytes = Vec::with_capacity(size as usize);
        file.take(self.max_size + 1).read_to_end(&mut bytes)?;
        if bytes.len() as u64 > self.max_size {
            return Ok(FileResult::SkippedTooLarge(bytes.len() as u64));
        }

        Ok(FileResult::Loaded(decode_lossy(bytes)))
    }
}

/// Decode bytes as UTF-8, replacing invalid sequences instead of failing.
pub fn decode_lossy(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// Human-readable reason for an I/O failure.
pub fn describe_io(error: &io::Error) -> String {
    match error.kind() {
        io::ErrorKind::PermissionDenied => "permission denied".to_string(),
        io::ErrorKind::NotFound => "not found".to_string(),
        _ => error.to_string(),
    }
}
