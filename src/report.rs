//! Operator-facing progress and summary.
//!
//! Reporters only observe; nothing they do affects the artifact.

use std::io::{self, Write};

use crate::aggregator::SummaryReport;
use crate::filter::InclusionDecision;
use crate::loader::FileResult;
use crate::output::summary_lines;
use crate::walker::PathIssue;

/// Receives per-candidate progress and the final summary.
pub trait Reporter {
    /// A candidate (or pruned directory) rejected during enumeration.
    fn filtered(&mut self, _relative: &str, _decision: &InclusionDecision) {}

    fn walk_issue(&mut self, _issue: &PathIssue) {}

    /// Outcome for a declared candidate.
    fn file(&mut self, relative: &str, result: &FileResult);

    fn finished(&mut self, _report: &SummaryReport) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn file(&mut self, _relative: &str, _result: &FileResult) {}
}

/// How much progress to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Summary only.
    Quiet,
    #[default]
    Normal,
    /// Also list filtered-out candidates.
    Verbose,
}

/// Plain-text progress lines, written to stderr by default.
pub struct ConsoleReporter<W: Write> {
    out: W,
    verbosity: Verbosity,
}

impl ConsoleReporter<io::Stderr> {
    pub fn stderr(verbosity: Verbosity) -> Self {
        Self::new(io::stderr(), verbosity)
    }
}

impl<W: Write> ConsoleReporter<W> {
    pub fn new(out: W, verbosity: Verbosity) -> Self {
        Self { out, verbosity }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, status: &str, relative: &str, detail: Option<&str>) {
        let _ = match detail {
            Some(detail) => writeln!(self.out, "{:<10} {}: {}", status, relative, detail),
            None => writeln!(self.out, "{:<10} {}", status, relative),
        };
    }
}

impl<W: Write> Reporter for ConsoleReporter<W> {
    fn filtered(&mut self, relative: &str, decision: &InclusionDecision) {
        if self.verbosity == Verbosity::Verbose {
            self.line("filtered", relative, Some(&decision.to_string()));
        }
    }

    fn walk_issue(&mut self, issue: &PathIssue) {
        if self.verbosity != Verbosity::Quiet {
            self.line("error", &issue.path, Some(&issue.reason));
        }
    }

    fn file(&mut self, relative: &str, result: &FileResult) {
        if self.verbosity == Verbosity::Quiet {
            return;
        }
        let detail = match result {
            FileResult::Loaded(_) | FileResult::NotFound => None,
            FileResult::SkippedTooLarge(size) => Some(format!("too large ({} bytes)", size)),
            FileResult::SkippedByFilter(reason) | FileResult::Error(reason) => Some(reason.clone()),
        };
        self.line(result.label(), relative, detail.as_deref());
    }

    fn finished(&mut self, report: &SummaryReport) {
        let _ = writeln!(self.out);
        let _ = writeln!(self.out, "Summary ({})", report.mode);
        for (label, value) in summary_lines(report) {
            let _ = writeln!(self.out, "  {:<24}{}", label, value);
        }
        for path in &report.missing {
            let _ = writeln!(self.out, "  missing: {}", path);
        }
        let _ = writeln!(self.out, "Output: {}", report.output);
        let _ = self.out.flush();
    }
}
