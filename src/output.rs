//! Artifact text: per-file sections, header, and footer.
//!
//! Every section is framed by a start and an end marker that carry the exact
//! relative path, prefixed with a comment token chosen from the file's
//! extension. Content between the markers is written unmodified.

use std::path::Path;

use crate::aggregator::SummaryReport;
use crate::tree::format_number;
use crate::walker::Mode;

/// Width of header and footer banners.
pub const BANNER_WIDTH: usize = 100;
/// Width of the rule inside section markers.
pub const MARKER_WIDTH: usize = 80;

pub const FILE_LABEL: &str = "FILE: ";
pub const END_LABEL: &str = "END OF FILE: ";

/// Comment syntax used to frame a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommentStyle {
    pub open: &'static str,
    /// Closing token for block-comment languages.
    pub close: Option<&'static str>,
}

impl CommentStyle {
    const fn line(open: &'static str) -> Self {
        Self { open, close: None }
    }

    const fn block(open: &'static str, close: &'static str) -> Self {
        Self {
            open,
            close: Some(close),
        }
    }

    /// Render one marker line, including the trailing newline.
    fn marker(&self, text: &str) -> String {
        match self.close {
            Some(close) => format!("{} {} {}\n", self.open, text, close),
            None => format!("{} {}\n", self.open, text),
        }
    }
}

/// Fallback for unmapped extensions.
pub const DEFAULT_STYLE: CommentStyle = CommentStyle::line("//");

const HASH: CommentStyle = CommentStyle::line("#");
const HTML: CommentStyle = CommentStyle::block("<!--", "-->");
const C_BLOCK: CommentStyle = CommentStyle::block("/*", "*/");
const SQL: CommentStyle = CommentStyle::line("--");

/// Look up the comment style for a lower-cased extension.
pub fn comment_style(extension: Option<&str>) -> CommentStyle {
    match extension.unwrap_or("") {
        "py" | "rb" | "r" | "sh" | "bash" | "yaml" | "yml" | "toml" => HASH,
        "md" | "html" | "htm" | "vue" | "xml" | "svelte" => HTML,
        "css" => C_BLOCK,
        "sql" => SQL,
        _ => DEFAULT_STYLE,
    }
}

fn rule(width: usize) -> String {
    "=".repeat(width)
}

/// Frame one file's content as a section.
///
/// # Examples
///
/// ```
/// use sluice::output::format_section;
///
/// let section = format_section("src/app.py", "print('hi')\n");
/// assert!(section.contains("# FILE: src/app.py\n"));
/// assert!(section.contains("# END OF FILE: src/app.py\n"));
/// ```
pub fn format_section(relative: &str, content: &str) -> String {
    let extension = crate::filter::extension_of(Path::new(relative));
    let style = comment_style(extension.as_deref());
    let bar = rule(MARKER_WIDTH);

    let mut section = String::with_capacity(content.len() + 2 * relative.len() + 6 * MARKER_WIDTH);
    section.push('\n');
    section.push_str(&style.marker(&bar));
    section.push_str(&style.marker(&format!("{}{}", FILE_LABEL, relative)));
    section.push_str(&style.marker(&bar));
    section.push('\n');
    section.push_str(content);
    if !content.ends_with('\n') {
        section.push('\n');
    }
    section.push_str(&style.marker(&bar));
    section.push_str(&style.marker(&format!("{}{}", END_LABEL, relative)));
    section.push_str(&style.marker(&bar));
    section.push('\n');
    section
}

/// What the header declares before any section is written.
#[derive(Debug, Clone)]
pub struct Header<'a> {
    pub generated_at: &'a str,
    pub root: &'a Path,
    pub mode: Mode,
    pub files: Vec<&'a str>,
    /// Pre-rendered structure tree, if requested.
    pub structure: Option<String>,
}

fn push_banner(out: &mut String, title: &str) {
    let bar = rule(BANNER_WIDTH);
    out.push_str(&bar);
    out.push('\n');
    out.push_str(title);
    out.push('\n');
    out.push_str(&bar);
    out.push('\n');
}

/// Render the header block.
pub fn render_header(header: &Header<'_>) -> String {
    let total = header.files.len();
    let mut out = String::with_capacity(512 + header.files.iter().map(|f| f.len() + 8).sum::<usize>());

    push_banner(&mut out, "CODEBASE SNAPSHOT");
    out.push_str(&format!("Generated on: {}\n", header.generated_at));
    out.push_str(&format!("Root: {}\n", header.root.display()));
    out.push_str(&format!("Mode: {}\n", header.mode));
    out.push('\n');

    push_banner(&mut out, "FILES");
    let width = total.to_string().len();
    for (i, file) in header.files.iter().enumerate() {
        out.push_str(&format!("{:>width$}. {}\n", i + 1, file, width = width));
    }
    out.push('\n');

    if let Some(structure) = &header.structure {
        push_banner(&mut out, "PROJECT STRUCTURE");
        out.push_str(structure);
        out.push('\n');
    }

    let bar = rule(BANNER_WIDTH);
    out.push_str(&bar);
    out.push('\n');
    out.push_str(&format!("TOTAL FILES: {}\n", total));
    out.push_str(&bar);
    out.push('\n');
    out
}

/// Summary counts as label/value pairs, shared by the footer and the console.
pub fn summary_lines(report: &SummaryReport) -> Vec<(&'static str, String)> {
    let mut lines = vec![
        ("Declared", format_number(report.declared)),
        ("Discovered", format_number(report.discovered)),
        ("Written", format_number(report.written)),
        ("Skipped (denied)", format_number(report.skipped_denied)),
        ("Skipped (extension)", format_number(report.skipped_extension)),
        ("Skipped (too large)", format_number(report.too_large.len())),
        ("Errors", format_number(report.errored.len())),
    ];
    match report.mode {
        Mode::Pinned => lines.push(("Missing", format_number(report.missing.len()))),
        Mode::Discovery => {
            lines.push(("Pruned directories", format_number(report.pruned_directories)))
        }
    }
    if !report.walk_issues.is_empty() {
        lines.push((
            "Unreadable directories",
            format_number(report.walk_issues.len()),
        ));
    }
    lines.push(("Lines", format_number(report.lines)));
    if let Some(tokens) = report.tokens {
        lines.push(("Tokens", format_number(tokens)));
    }
    lines
}

/// Render the footer block.
pub fn render_footer(report: &SummaryReport) -> String {
    let mut out = String::with_capacity(1024);
    out.push('\n');
    push_banner(&mut out, "EXTRACTION SUMMARY");
    for (label, value) in summary_lines(report) {
        out.push_str(&format!("{}: {}\n", label, value));
    }
    out.push_str(&format!("Output file: {}\n", report.output));
    out.push('\n');

    if report.mode == Mode::Pinned {
        push_banner(&mut out, "MISSING FILES");
        if report.missing.is_empty() {
            out.push_str("None\n");
        }
        for path in &report.missing {
            out.push_str(&format!("- {}\n", path));
        }
        out.push('\n');
    }

    if !report.too_large.is_empty() {
        push_banner(&mut out, "TOO LARGE");
        for entry in &report.too_large {
            out.push_str(&format!("- {}: {} bytes\n", entry.path, entry.size));
        }
        out.push('\n');
    }

    if !report.errored.is_empty() || !report.walk_issues.is_empty() {
        push_banner(&mut out, "ERRORS");
        for failure in report.errored.iter().chain(&report.walk_issues) {
            out.push_str(&format!("- {}: {}\n", failure.path, failure.reason));
        }
        out.push('\n');
    }

    push_banner(&mut out, "EXTRACTION COMPLETED");
    out
}
