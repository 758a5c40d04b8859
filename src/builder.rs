//! Run context and fluent builder API.
//!
//! Everything a run needs is carried explicitly in a [`RunContext`]; no
//! component consults the process working directory.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, info};

use crate::aggregator::{Aggregator, ArtifactWriter, SummaryReport};
use crate::config::{Config, DEFAULT_DENY, DEFAULT_EXTENSIONS, DEFAULT_OUTPUT};
use crate::errors::SluiceError;
use crate::filter::{DiscoveryRules, PathFilter};
use crate::loader::{ContentLoader, DEFAULT_MAX_FILE_SIZE};
use crate::output::{render_footer, render_header, Header};
use crate::report::Reporter;
use crate::tokens::{Encoding, TokenCounter};
use crate::tree::{build_from_paths, render_tree, RenderOptions};
use crate::walker::{enumerate, DiscoverySource, PathSource, PinnedSource, WalkOptions};

/// How candidates are selected.
#[derive(Debug, Clone)]
pub enum Selection {
    Discovery(DiscoveryRules),
    /// Ordered manifest of root-relative paths.
    Pinned(Vec<String>),
}

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub root: PathBuf,
    pub output: PathBuf,
    pub selection: Selection,
    pub max_file_size: u64,
    /// Directories that must exist under the root before anything is written.
    pub require: Vec<String>,
    pub walk: WalkOptions,
    pub generated_at: DateTime<Utc>,
    /// Add a project-structure tree to the header.
    pub tree: bool,
    /// Count tokens of written content with this encoding.
    pub encoding: Option<Encoding>,
}

/// Builder for a snapshot run.
///
/// # Examples
///
/// ```no_run
/// use sluice::builder::Snapshot;
/// use sluice::report::NullReporter;
///
/// let report = Snapshot::new("./project")
///     .pinned(["server/index.js", "README.md"])
///     .require(["server"])
///     .run(&mut NullReporter)
///     .unwrap();
/// assert_eq!(report.declared, 2);
/// ```
#[derive(Debug, Clone)]
pub struct Snapshot {
    root: PathBuf,
    output: Option<PathBuf>,
    deny: Vec<String>,
    extensions: Vec<String>,
    pinned: Option<Vec<String>>,
    require: Vec<String>,
    max_file_size: u64,
    walk: WalkOptions,
    generated_at: Option<DateTime<Utc>>,
    tree: bool,
    encoding: Option<Encoding>,
}

impl Snapshot {
    /// Create a builder with default rules for the given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            output: None,
            deny: DEFAULT_DENY.iter().map(|s| s.to_string()).collect(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            pinned: None,
            require: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            walk: WalkOptions::default(),
            generated_at: None,
            tree: false,
            encoding: Some(Encoding::default()),
        }
    }

    /// Create a builder from a loaded configuration.
    pub fn from_config(root: impl Into<PathBuf>, config: &Config) -> Self {
        let root = root.into();
        let output = config.output_path(&root);
        let mut builder = Self::new(root)
            .output(output)
            .deny(&config.deny)
            .extensions(&config.extensions)
            .require(&config.require)
            .max_file_size(config.max_file_size)
            .include_hidden(config.include_hidden)
            .respect_gitignore(config.respect_gitignore)
            .tree(config.tree)
            .count_tokens(config.count_tokens.then_some(config.encoding));
        if let Some(entries) = &config.pinned {
            builder = builder.pinned(entries);
        }
        builder
    }

    /// Artifact path. Defaults to `sluice-snapshot.txt` under the root.
    pub fn output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Replace the deny-list.
    pub fn deny<I>(mut self, tokens: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.deny = tokens.into_iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    /// Replace the extension allow-list.
    pub fn extensions<I>(mut self, extensions: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|e| e.as_ref().to_string())
            .collect();
        self
    }

    /// Switch to pinned mode with the given manifest.
    pub fn pinned<I>(mut self, entries: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.pinned = Some(entries.into_iter().map(|e| e.as_ref().to_string()).collect());
        self
    }

    pub fn require<I>(mut self, markers: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.require = markers.into_iter().map(|m| m.as_ref().to_string()).collect();
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn include_hidden(mut self, include: bool) -> Self {
        self.walk.include_hidden = include;
        self
    }

    pub fn respect_gitignore(mut self, respect: bool) -> Self {
        self.walk.respect_gitignore = respect;
        self
    }

    /// Fix the generation timestamp (defaults to now).
    pub fn generated_at(mut self, at: DateTime<Utc>) -> Self {
        self.generated_at = Some(at);
        self
    }

    pub fn tree(mut self, include: bool) -> Self {
        self.tree = include;
        self
    }

    /// Token counting encoding, or `None` to skip counting.
    pub fn count_tokens(mut self, encoding: Option<Encoding>) -> Self {
        self.encoding = encoding;
        self
    }

    /// Assemble the explicit run context.
    pub fn context(self) -> RunContext {
        let output = self
            .output
            .unwrap_or_else(|| self.root.join(DEFAULT_OUTPUT));
        let selection = match self.pinned {
            Some(entries) => Selection::Pinned(entries),
            None => Selection::Discovery(DiscoveryRules::new(&self.deny, &self.extensions)),
        };
        RunContext {
            root: self.root,
            output,
            selection,
            max_file_size: self.max_file_size,
            require: self.require,
            walk: self.walk,
            generated_at: self.generated_at.unwrap_or_else(Utc::now),
            tree: self.tree,
            encoding: self.encoding,
        }
    }

    /// Build the context and run it.
    pub fn run(self, reporter: &mut dyn Reporter) -> Result<SummaryReport, SluiceError> {
        run(&self.context(), reporter)
    }
}

/// Check that every required top-level directory exists under `root`.
pub fn preflight(root: &Path, require: &[String]) -> Result<(), SluiceError> {
    let missing: Vec<String> = require
        .iter()
        .filter(|marker| !root.join(marker.as_str()).is_dir())
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SluiceError::Preflight { missing })
    }
}

fn resolve_root(root: &Path) -> Result<PathBuf, SluiceError> {
    let canonical = root
        .canonicalize()
        .map_err(|_| SluiceError::PathNotFound(root.to_path_buf()))?;
    if !canonical.is_dir() {
        return Err(SluiceError::NotADirectory(root.to_path_buf()));
    }
    Ok(canonical)
}

/// Absolute artifact path; the parent directory must already exist.
fn resolve_output(output: &Path) -> Result<PathBuf, SluiceError> {
    let invalid = |source: io::Error| SluiceError::Output {
        path: output.to_path_buf(),
        source,
    };
    let file_name = output.file_name().ok_or_else(|| {
        invalid(io::Error::new(
            io::ErrorKind::InvalidInput,
            "output path has no file name",
        ))
    })?;
    let parent = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let parent = parent.canonicalize().map_err(invalid)?;
    Ok(parent.join(file_name))
}

/// Execute a run: preflight, enumerate, write header, stream sections, write footer.
///
/// Nothing is created on disk unless the root, preflight markers, output
/// location, and manifest are all valid.
pub fn run(ctx: &RunContext, reporter: &mut dyn Reporter) -> Result<SummaryReport, SluiceError> {
    let root = resolve_root(&ctx.root)?;
    preflight(&root, &ctx.require)?;
    let output = resolve_output(&ctx.output)?;

    let (source, filter): (Box<dyn PathSource>, PathFilter) = match &ctx.selection {
        Selection::Discovery(rules) => {
            let filter = PathFilter::Discovery(rules.clone());
            let options = ctx.walk.clone().exclude(&output);
            let source = DiscoverySource::new(&root, filter.clone(), options);
            (Box::new(source), filter)
        }
        Selection::Pinned(entries) => {
            let source = PinnedSource::new(&root, entries)?;
            let filter = PathFilter::pinned(source.entries());
            (Box::new(source), filter)
        }
    };

    info!(root = %root.display(), mode = %source.mode(), "enumerating candidates");
    let plan = enumerate(source.as_ref(), &filter, reporter);

    let generated_at = ctx.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let structure = ctx.tree.then(|| {
        let root_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        let options = RenderOptions {
            missing: plan
                .declared
                .iter()
                .filter(|c| !c.exists)
                .map(|c| c.relative.clone())
                .collect(),
        };
        render_tree(&build_from_paths(&root_name, plan.declared_paths()), &options)
    });
    let header = render_header(&Header {
        generated_at: &generated_at,
        root: &root,
        mode: plan.mode,
        files: plan.declared_paths(),
        structure,
    });

    let mut writer = ArtifactWriter::create(&output, &header)?;
    let mut report = SummaryReport::from_plan(&plan, &root, &output, &generated_at);

    let aggregator = Aggregator::new(
        &filter,
        ContentLoader::new(ctx.max_file_size),
        ctx.encoding.map(TokenCounter::new),
    )
    .exclude_output(&output);
    aggregator.run(&plan, &mut writer, &mut report, reporter)?;

    writer.finish(&render_footer(&report))?;
    debug!(output = %output.display(), "artifact complete");
    reporter.finished(&report);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NullReporter;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 3, 24, 21).unwrap()
    }

    fn header_of(text: &str) -> &str {
        let end = text.find("TOTAL FILES:").unwrap();
        &text[..end]
    }

    fn create_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("project");
        fs::create_dir_all(root.join("cache")).unwrap();
        fs::write(root.join("a.js"), "const answer = 42;\n").unwrap();
        fs::write(root.join("b.png"), [0x89u8, b'P', b'N', b'G']).unwrap();
        fs::write(root.join("cache/c.js"), "cached();\n").unwrap();
        dir
    }

    #[test]
    fn test_discovery_scenario() {
        let dir = create_project();
        let root = dir.path().join("project");
        let output = dir.path().join("out.txt");

        let report = Snapshot::new(&root)
            .output(&output)
            .deny(["cache"])
            .extensions(["js"])
            .count_tokens(None)
            .generated_at(fixed_time())
            .run(&mut NullReporter)
            .unwrap();

        assert_eq!(report.written, 1);
        assert_eq!(report.skipped_extension, 1);
        assert_eq!(report.skipped_denied, 0);
        assert_eq!(report.pruned_directories, 1);
        // cache/c.js is never listed, so never discovered.
        assert_eq!(report.discovered, 2);

        let text = fs::read_to_string(&output).unwrap();
        assert!(text.contains("\n1. a.js\n"));
        assert!(text.contains("TOTAL FILES: 1\n"));
        assert_eq!(text.matches("// FILE: ").count(), 1);
        assert!(text.contains("// FILE: a.js\n// ="));
        assert!(!text.contains("cache/c.js"));
        assert!(text.contains("Written: 1\n"));
        assert!(text.contains("Generated on: 2025-06-01T03:24:21Z\n"));
    }

    #[test]
    fn test_pinned_scenario() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("x.ext"), "x body\n").unwrap();
        let output = dir.path().join("snapshot.txt");

        let report = Snapshot::new(dir.path())
            .output(&output)
            .pinned(["x.ext", "y.ext"])
            .count_tokens(None)
            .run(&mut NullReporter)
            .unwrap();

        assert_eq!(report.declared, 2);
        assert_eq!(report.written, 1);
        assert_eq!(report.missing, vec!["y.ext"]);

        let text = fs::read_to_string(&output).unwrap();
        assert!(text.contains("TOTAL FILES: 2\n"));
        assert!(text.contains("1. x.ext\n2. y.ext\n"));
        assert_eq!(text.matches("// FILE: ").count(), 1);
        assert!(text.contains("// FILE: x.ext\n"));
        assert!(text.contains("MISSING FILES\n"));
        let missing = text.split("MISSING FILES\n").nth(1).unwrap();
        let listed: Vec<&str> = missing
            .lines()
            .skip(1)
            .take_while(|l| l.starts_with("- "))
            .collect();
        assert_eq!(listed, vec!["- y.ext"]);
    }

    #[test]
    fn test_empty_pinned_manifest_stays_pinned() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "a();\n").unwrap();
        let output = dir.path().join("out.txt");

        let report = Snapshot::new(dir.path())
            .output(&output)
            .pinned(Vec::<String>::new())
            .count_tokens(None)
            .run(&mut NullReporter)
            .unwrap();

        assert_eq!(report.mode, crate::walker::Mode::Pinned);
        assert_eq!(report.declared, 0);
        assert_eq!(report.written, 0);
        let text = fs::read_to_string(&output).unwrap();
        assert!(text.contains("TOTAL FILES: 0\n"));
        assert!(!text.contains("a.js"));
    }

    #[test]
    fn test_pinned_output_artifact_is_never_read_back() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.py"), "print(1)\n").unwrap();
        let output = dir.path().join("snap.txt");

        let run_once = || {
            Snapshot::new(dir.path())
                .output(&output)
                .pinned(["main.py", "snap.txt"])
                .count_tokens(None)
                .run(&mut NullReporter)
                .unwrap()
        };

        let first = run_once();
        assert_eq!(first.missing, vec!["snap.txt"]);

        let second = run_once();
        assert_eq!(second.written, 1);
        assert_eq!(second.errored.len(), 1);
        assert_eq!(second.errored[0].path, "snap.txt");
        assert_eq!(second.errored[0].reason, "output artifact");

        let text = fs::read_to_string(&output).unwrap();
        assert_eq!(text.matches("CODEBASE SNAPSHOT").count(), 1);
        assert!(!text.contains("# FILE: snap.txt"));
        assert!(!text.contains("// FILE: snap.txt"));
        assert!(text.contains("- snap.txt: output artifact\n"));
    }

    #[test]
    fn test_preflight_failure_creates_nothing() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("server")).unwrap();
        let output = dir.path().join("out.txt");

        let err = Snapshot::new(dir.path())
            .output(&output)
            .require(["server", "webfrontend"])
            .run(&mut NullReporter)
            .unwrap_err();

        match err {
            SluiceError::Preflight { missing } => assert_eq!(missing, vec!["webfrontend"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!output.exists());
    }

    #[test]
    fn test_headers_are_byte_identical_across_runs() {
        let dir = create_project();
        let root = dir.path().join("project");
        fs::create_dir_all(root.join("src/b")).unwrap();
        fs::write(root.join("src/b/z.js"), "z").unwrap();
        fs::write(root.join("src/a.js"), "a").unwrap();

        let run_once = |name: &str| {
            let output = dir.path().join(name);
            Snapshot::new(&root)
                .output(&output)
                .tree(true)
                .count_tokens(None)
                .generated_at(fixed_time())
                .run(&mut NullReporter)
                .unwrap();
            fs::read_to_string(output).unwrap()
        };

        let first = run_once("one.txt");
        let second = run_once("two.txt");
        assert_eq!(header_of(&first), header_of(&second));
        assert!(first.contains("PROJECT STRUCTURE"));
    }

    #[test]
    fn test_default_output_is_excluded_from_discovery() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("main.py"), "print(1)\n").unwrap();

        let run_once = || {
            Snapshot::new(dir.path())
                .extensions(["py", "txt"])
                .count_tokens(None)
                .run(&mut NullReporter)
                .unwrap()
        };

        run_once();
        // Second run must not pick up the first run's artifact.
        let report = run_once();
        assert_eq!(report.declared, 1);
        assert!(dir.path().join(DEFAULT_OUTPUT).exists());
    }

    #[test]
    fn test_oversized_file_declared_but_not_written() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("p");
        fs::create_dir(&root).unwrap();
        fs::write(root.join("huge.js"), vec![0xFFu8; 4096]).unwrap();
        fs::write(root.join("ok.js"), "ok();\n").unwrap();
        let output = dir.path().join("out.txt");

        let report = Snapshot::new(&root)
            .output(&output)
            .max_file_size(1024)
            .count_tokens(None)
            .run(&mut NullReporter)
            .unwrap();

        assert_eq!(report.declared, 2);
        assert_eq!(report.written, 1);
        assert_eq!(report.too_large[0].size, 4096);
        let text = fs::read_to_string(&output).unwrap();
        assert!(!text.contains("FILE: huge.js"));
        assert!(text.contains("- huge.js: 4096 bytes\n"));
    }

    #[test]
    fn test_missing_root_and_output_parent() {
        let dir = TempDir::new().unwrap();
        let missing_root = Snapshot::new(dir.path().join("nope")).run(&mut NullReporter);
        assert!(matches!(missing_root, Err(SluiceError::PathNotFound(_))));

        let bad_output = Snapshot::new(dir.path())
            .output(dir.path().join("no/such/dir/out.txt"))
            .run(&mut NullReporter);
        assert!(matches!(bad_output, Err(SluiceError::Output { .. })));
    }

    #[test]
    fn test_token_count_reported() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("lib.rs"), "pub fn add(a: i32, b: i32) -> i32 { a + b }\n")
            .unwrap();

        let report = Snapshot::new(dir.path())
            .output(dir.path().join("out.txt"))
            .run(&mut NullReporter)
            .unwrap();
        assert!(report.tokens.is_some_and(|t| t > 0));
    }

    #[test]
    fn test_from_config_pinned() {
        let config = Config {
            pinned: Some(vec!["a.rs".into()]),
            output: Some("snap.txt".into()),
            ..Config::default()
        };
        let ctx = Snapshot::from_config("/project", &config).context();

        assert!(matches!(ctx.selection, Selection::Pinned(ref e) if e == &["a.rs"]));
        assert_eq!(ctx.output, Path::new("/project").join("snap.txt"));
        assert_eq!(ctx.encoding, Some(Encoding::Cl100kBase));
    }
}
