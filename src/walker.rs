//! Candidate enumeration.
//!
//! A [`PathSource`] yields candidates in a fully deterministic order. The
//! discovery source walks the tree with the `ignore` crate, sorted by file
//! name at every level, and prunes denied directories before descending.
//! The pinned source replays a fixed manifest with one existence check per
//! entry. [`enumerate`] runs the first pass and produces the [`Plan`] that
//! the header declares.

use std::collections::{HashSet, VecDeque};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use ignore::WalkBuilder;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::errors::SluiceError;
use crate::filter::{extension_of, normalize_relative, InclusionDecision, PathFilter};
use crate::loader::describe_io;
use crate::report::Reporter;

/// Selection strategy in effect for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Discovery,
    Pinned,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Discovery => write!(f, "discovery"),
            Mode::Pinned => write!(f, "pinned"),
        }
    }
}

/// A path considered for inclusion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePath {
    /// Root-relative path with `/` separators, exactly as it appears in markers.
    pub relative: String,
    pub absolute: PathBuf,
    /// Lower-cased extension without the dot.
    pub extension: Option<String>,
    /// Result of the existence check. Always true for walked files.
    pub exists: bool,
}

impl CandidatePath {
    pub fn new(root: &Path, relative: impl Into<String>, exists: bool) -> Self {
        let relative = relative.into();
        let absolute = root.join(&relative);
        let extension = extension_of(Path::new(&relative));
        Self {
            relative,
            absolute,
            extension,
            exists,
        }
    }
}

/// A path that could not be read, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathIssue {
    pub path: String,
    pub reason: String,
}

/// One step of a path source.
#[derive(Debug, Clone)]
pub enum WalkEvent {
    Candidate(CandidatePath),
    /// A directory skipped without descent because a deny token matched.
    Pruned { relative: String, token: String },
    Issue(PathIssue),
}

/// Produces the ordered candidates for a run.
pub trait PathSource {
    fn mode(&self) -> Mode;

    fn root(&self) -> &Path;

    fn events(&self) -> Box<dyn Iterator<Item = WalkEvent> + '_>;
}

/// Options for directory walking.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Include hidden files and directories.
    pub include_hidden: bool,
    /// Respect .gitignore and related ignore files.
    pub respect_gitignore: bool,
    /// Follow symbolic links to directories.
    pub follow_symlinks: bool,
    /// Absolute paths never offered as candidates (e.g. the output artifact).
    pub exclude: Vec<PathBuf>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            include_hidden: true,
            respect_gitignore: false,
            follow_symlinks: false,
            exclude: Vec::new(),
        }
    }
}

impl WalkOptions {
    /// Never offer `path` as a candidate.
    pub fn exclude(mut self, path: impl Into<PathBuf>) -> Self {
        self.exclude.push(path.into());
        self
    }
}

/// Filesystem walk with deny-list pruning.
pub struct DiscoverySource {
    root: PathBuf,
    filter: PathFilter,
    options: WalkOptions,
}

impl DiscoverySource {
    pub fn new(root: impl Into<PathBuf>, filter: PathFilter, options: WalkOptions) -> Self {
        Self {
            root: root.into(),
            filter,
            options,
        }
    }
}

impl PathSource for DiscoverySource {
    fn mode(&self) -> Mode {
        Mode::Discovery
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn events(&self) -> Box<dyn Iterator<Item = WalkEvent> + '_> {
        let queue: Arc<Mutex<VecDeque<WalkEvent>>> = Arc::new(Mutex::new(VecDeque::new()));

        let mut builder = WalkBuilder::new(&self.root);
        let respect = self.options.respect_gitignore;
        builder
            .hidden(!self.options.include_hidden)
            .ignore(respect)
            .parents(respect)
            .git_ignore(respect)
            .git_global(respect)
            .git_exclude(respect)
            .follow_links(self.options.follow_symlinks)
            .sort_by_file_name(|a, b| a.cmp(b));

        let prune_root = self.root.clone();
        let prune_filter = self.filter.clone();
        let prune_queue = Arc::clone(&queue);
        builder.filter_entry(move |entry| {
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if entry.depth() == 0 || !is_dir {
                return true;
            }
            let relative = relative_string(&prune_root, entry.path());
            match prune_filter.prune_token(&relative) {
                Some(token) => {
                    trace!(path = %relative, token, "pruning directory");
                    lock(&prune_queue).push_back(WalkEvent::Pruned {
                        relative,
                        token: token.to_string(),
                    });
                    false
                }
                None => true,
            }
        });

        Box::new(DiscoveryEvents {
            walk: builder.build(),
            queue,
            root: self.root.clone(),
            exclude: self.options.exclude.iter().cloned().collect(),
            done: false,
        })
    }
}

struct DiscoveryEvents {
    walk: ignore::Walk,
    queue: Arc<Mutex<VecDeque<WalkEvent>>>,
    root: PathBuf,
    exclude: HashSet<PathBuf>,
    done: bool,
}

impl DiscoveryEvents {
    fn convert(&self, result: Result<ignore::DirEntry, ignore::Error>) -> Option<WalkEvent> {
        match result {
            Ok(entry) => {
                if entry.depth() == 0 {
                    return None;
                }
                let is_file = match entry.file_type() {
                    Some(ft) if ft.is_symlink() => entry.path().is_file(),
                    Some(ft) => ft.is_file(),
                    None => false,
                };
                if !is_file {
                    return None;
                }
                if self.exclude.contains(entry.path()) {
                    debug!(path = %entry.path().display(), "excluding output artifact");
                    return None;
                }
                let relative = relative_string(&self.root, entry.path());
                Some(WalkEvent::Candidate(CandidatePath::new(
                    &self.root, relative, true,
                )))
            }
            Err(err) => issue_from_error(&self.root, err).map(|mut issue| {
                if issue.path.is_empty() {
                    issue.path = ".".to_string();
                }
                WalkEvent::Issue(issue)
            }),
        }
    }
}

impl Iterator for DiscoveryEvents {
    type Item = WalkEvent;

    fn next(&mut self) -> Option<WalkEvent> {
        loop {
            if let Some(event) = lock(&self.queue).pop_front() {
                return Some(event);
            }
            if self.done {
                return None;
            }
            match self.walk.next() {
                // Pruned directories seen while reading ahead come first.
                Some(result) => {
                    if let Some(event) = self.convert(result) {
                        lock(&self.queue).push_back(event);
                    }
                }
                None => self.done = true,
            }
        }
    }
}

fn lock(queue: &Mutex<VecDeque<WalkEvent>>) -> std::sync::MutexGuard<'_, VecDeque<WalkEvent>> {
    queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn issue_from_error(root: &Path, err: ignore::Error) -> Option<PathIssue> {
    match err {
        ignore::Error::WithPath { path, err } => {
            issue_from_error(root, *err).map(|mut issue| {
                if issue.path.is_empty() {
                    issue.path = relative_string(root, &path);
                }
                issue
            })
        }
        ignore::Error::WithDepth { err, .. } => issue_from_error(root, *err),
        ignore::Error::Loop { child, .. } => Some(PathIssue {
            path: relative_string(root, &child),
            reason: "symlink loop".to_string(),
        }),
        ignore::Error::Io(io_err) => Some(PathIssue {
            path: String::new(),
            reason: describe_io(&io_err),
        }),
        // Ignore-file parse problems are not per-path failures.
        other => {
            warn!(error = %other, "skipping walk diagnostic");
            None
        }
    }
}

/// Root-relative path of `path` using `/` separators.
pub fn relative_string(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.display().to_string(),
    }
}

/// Fixed, ordered manifest of root-relative paths.
#[derive(Debug, Clone)]
pub struct PinnedSource {
    root: PathBuf,
    entries: Vec<String>,
}

impl PinnedSource {
    /// Build a pinned source. Entries are normalized and de-duplicated
    /// (first occurrence wins). Absolute entries and entries that climb out
    /// of the root are rejected.
    pub fn new<I>(root: impl Into<PathBuf>, entries: I) -> Result<Self, SluiceError>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut normalized = Vec::new();
        for raw in entries {
            let raw = raw.as_ref();
            let entry = normalize_relative(raw);
            if entry.is_empty() {
                continue;
            }
            let path = Path::new(&entry);
            let escapes = path.is_absolute()
                || path
                    .components()
                    .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir));
            if escapes {
                return Err(SluiceError::Manifest {
                    path: raw.to_string(),
                    reason: "entries must be relative to the root".to_string(),
                });
            }
            if seen.insert(entry.clone()) {
                normalized.push(entry);
            }
        }
        Ok(Self {
            root: root.into(),
            entries: normalized,
        })
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }
}

impl PathSource for PinnedSource {
    fn mode(&self) -> Mode {
        Mode::Pinned
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn events(&self) -> Box<dyn Iterator<Item = WalkEvent> + '_> {
        Box::new(self.entries.iter().map(move |relative| {
            let exists = self.root.join(relative).exists();
            WalkEvent::Candidate(CandidatePath::new(&self.root, relative.as_str(), exists))
        }))
    }
}

/// Parse a manifest file: one path per line, `#` comments and blank lines ignored.
pub fn read_manifest(path: &Path) -> Result<Vec<String>, SluiceError> {
    let content = std::fs::read_to_string(path).map_err(|e| SluiceError::Manifest {
        path: path.display().to_string(),
        reason: describe_io(&e),
    })?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(String::from)
        .collect())
}

/// First pass: the ordered list of declared candidates plus what was left out.
#[derive(Debug, Clone)]
pub struct Plan {
    pub mode: Mode,
    pub declared: Vec<CandidatePath>,
    /// Candidates considered (walked files, or manifest entries).
    pub discovered: usize,
    /// Candidates rejected by a deny token.
    pub denied: usize,
    /// Candidates rejected by the extension allow-list (or absent from a pinned set).
    pub outside_allow_list: usize,
    pub pruned: Vec<String>,
    pub issues: Vec<PathIssue>,
}

impl Plan {
    pub fn declared_paths(&self) -> Vec<&str> {
        self.declared.iter().map(|c| c.relative.as_str()).collect()
    }
}

/// Run the first pass over `source`, deciding every candidate with `filter`.
pub fn enumerate(source: &dyn PathSource, filter: &PathFilter, reporter: &mut dyn Reporter) -> Plan {
    let mut plan = Plan {
        mode: source.mode(),
        declared: Vec::new(),
        discovered: 0,
        denied: 0,
        outside_allow_list: 0,
        pruned: Vec::new(),
        issues: Vec::new(),
    };

    for event in source.events() {
        match event {
            WalkEvent::Candidate(candidate) => {
                plan.discovered += 1;
                let decision = filter.decide(&candidate);
                if decision.is_declared() {
                    plan.declared.push(candidate);
                } else {
                    match decision {
                        InclusionDecision::DeniedByPattern { .. } => plan.denied += 1,
                        _ => plan.outside_allow_list += 1,
                    }
                    reporter.filtered(&candidate.relative, &decision);
                }
            }
            WalkEvent::Pruned { relative, token } => {
                reporter.filtered(&relative, &InclusionDecision::DeniedByPattern { token });
                plan.pruned.push(relative);
            }
            WalkEvent::Issue(issue) => {
                reporter.walk_issue(&issue);
                plan.issues.push(issue);
            }
        }
    }

    debug!(
        mode = %plan.mode,
        declared = plan.declared.len(),
        denied = plan.denied,
        outside_allow_list = plan.outside_allow_list,
        pruned = plan.pruned.len(),
        "enumeration complete"
    );
    plan
}
