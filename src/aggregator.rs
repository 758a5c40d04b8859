//! Streamed artifact writing.
//!
//! The [`ArtifactWriter`] is the only writer of the output file. It writes
//! the header first, then appends one section at a time and flushes after
//! each, so a run killed part-way leaves a valid artifact up to the last
//! completed section. Nothing is ever read back.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, trace};

use crate::errors::SluiceError;
use crate::filter::PathFilter;
use crate::loader::{ContentLoader, FileResult};
use crate::output::format_section;
use crate::report::Reporter;
use crate::tokens::TokenCounter;
use crate::walker::{CandidatePath, Mode, PathIssue, Plan};

/// A declared file skipped by the size cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TooLarge {
    pub path: String,
    pub size: u64,
}

/// Final counts, written into the footer and printed by the reporter.
///
/// `declared == written + too_large + errored + missing` holds for every
/// completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryReport {
    pub mode: Mode,
    pub root: String,
    pub output: String,
    pub generated_at: String,
    pub declared: usize,
    pub discovered: usize,
    pub written: usize,
    /// Candidates excluded by a deny token.
    pub skipped_denied: usize,
    /// Candidates whose extension is not in the allow-list.
    pub skipped_extension: usize,
    pub too_large: Vec<TooLarge>,
    pub errored: Vec<PathIssue>,
    pub missing: Vec<String>,
    pub pruned_directories: usize,
    pub walk_issues: Vec<PathIssue>,
    pub lines: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<usize>,
}

impl SummaryReport {
    /// Seed a report with the first-pass counts.
    pub fn from_plan(plan: &Plan, root: &Path, output: &Path, generated_at: &str) -> Self {
        Self {
            mode: plan.mode,
            root: root.display().to_string(),
            output: output.display().to_string(),
            generated_at: generated_at.to_string(),
            declared: plan.declared.len(),
            discovered: plan.discovered,
            written: 0,
            skipped_denied: plan.denied,
            skipped_extension: plan.outside_allow_list,
            too_large: Vec::new(),
            errored: Vec::new(),
            missing: Vec::new(),
            pruned_directories: plan.pruned.len(),
            walk_issues: plan.issues.clone(),
            lines: 0,
            tokens: None,
        }
    }

    /// Whether every declared file was written.
    pub fn is_complete(&self) -> bool {
        self.written == self.declared && self.walk_issues.is_empty()
    }
}

/// Append-only writer for the output artifact.
pub struct ArtifactWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ArtifactWriter {
    /// Create (truncate) the artifact and write the header as the first write.
    pub fn create(path: &Path, header: &str) -> Result<Self, SluiceError> {
        let file = File::create(path).map_err(|source| SluiceError::Output {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = Self {
            path: path.to_path_buf(),
            out: BufWriter::new(file),
        };
        writer.append(header)?;
        Ok(writer)
    }

    fn append(&mut self, text: &str) -> Result<(), SluiceError> {
        self.out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush())
            .map_err(|source| SluiceError::Output {
                path: self.path.clone(),
                source,
            })
    }

    /// Frame and append one file's section.
    pub fn write_section(&mut self, relative: &str, content: &str) -> Result<(), SluiceError> {
        self.append(&format_section(relative, content))
    }

    /// Append the footer and close the artifact.
    pub fn finish(mut self, footer: &str) -> Result<PathBuf, SluiceError> {
        self.append(footer)?;
        Ok(self.path)
    }
}

/// Second pass: load, frame, and stream every declared candidate.
pub struct Aggregator<'a> {
    filter: &'a PathFilter,
    loader: ContentLoader,
    tokens: Option<TokenCounter>,
    output: Option<PathBuf>,
}

impl<'a> Aggregator<'a> {
    pub fn new(filter: &'a PathFilter, loader: ContentLoader, tokens: Option<TokenCounter>) -> Self {
        Self {
            filter,
            loader,
            tokens,
            output: None,
        }
    }

    /// Never read `path` back; a candidate resolving to it becomes an error.
    pub fn exclude_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Resolve any candidate through the decide/load state machine.
    pub fn resolve(&self, candidate: &CandidatePath) -> FileResult {
        match FileResult::from_decision(&self.filter.decide(candidate)) {
            Some(result) => result,
            None => self.load_declared(candidate),
        }
    }

    /// Load a candidate whose decision is already known to be declared.
    fn load_declared(&self, candidate: &CandidatePath) -> FileResult {
        if !candidate.exists {
            return FileResult::NotFound;
        }
        if self.is_output(candidate) {
            debug!(path = %candidate.relative, "refusing to read the output artifact");
            return FileResult::Error("output artifact".to_string());
        }
        self.loader.load(candidate)
    }

    fn is_output(&self, candidate: &CandidatePath) -> bool {
        let Some(output) = self.output.as_deref() else {
            return false;
        };
        candidate.absolute == output
            || candidate
                .absolute
                .canonicalize()
                .is_ok_and(|path| path == output)
    }

    /// Process the plan in declared order, updating `report` as it goes.
    ///
    /// Per-file outcomes never fail the run; only a write to the artifact can.
    pub fn run(
        &self,
        plan: &Plan,
        writer: &mut ArtifactWriter,
        report: &mut SummaryReport,
        reporter: &mut dyn Reporter,
    ) -> Result<(), SluiceError> {
        if self.tokens.is_some() {
            report.tokens = Some(0);
        }

        for candidate in &plan.declared {
            let result = self.load_declared(candidate);
            let relative = candidate.relative.as_str();

            match &result {
                FileResult::Loaded(content) => {
                    writer.write_section(relative, content)?;
                    report.written += 1;
                    report.lines += count_lines(content);
                    if let (Some(counter), Some(total)) = (&self.tokens, report.tokens.as_mut()) {
                        *total += counter.count(content);
                    }
                    trace!(path = relative, bytes = content.len(), "section written");
                }
                FileResult::SkippedTooLarge(size) => report.too_large.push(TooLarge {
                    path: relative.to_string(),
                    size: *size,
                }),
                FileResult::SkippedByFilter(reason) => {
                    debug_assert!(false, "declared candidate {relative} was filtered: {reason}");
                }
                FileResult::NotFound => report.missing.push(relative.to_string()),
                FileResult::Error(reason) => report.errored.push(PathIssue {
                    path: relative.to_string(),
                    reason: reason.clone(),
                }),
            }

            reporter.file(relative, &result);
        }

        debug!(
            written = report.written,
            declared = report.declared,
            "aggregation complete"
        );
        Ok(())
    }
}

/// Number of lines in `content`, counting a final unterminated line.
pub fn count_lines(content: &str) -> usize {
    let newlines = bytecount::count(content.as_bytes(), b'\n');
    if content.is_empty() || content.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}
