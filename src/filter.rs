//! Inclusion decisions for candidate paths.
//!
//! Two selection strategies share one decision type:
//!
//! - **Discovery**: a path is denied when any deny token appears anywhere in
//!   its relative path (plain substring, not a glob), and otherwise kept only
//!   if its extension is in the allow-list. Both tests are case-insensitive.
//! - **Pinned**: a path is included iff it is in the fixed manifest. Entries
//!   absent from disk are reported as [`InclusionDecision::NotFound`].
//!
//! Decisions are pure: they depend only on the candidate and the rules.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::walker::CandidatePath;

/// Outcome of testing a candidate against the selection rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum InclusionDecision {
    Included,
    /// A deny token matched; `token` is the first configured token that did.
    DeniedByPattern { token: String },
    NotInAllowList,
    NotFound,
}

impl InclusionDecision {
    /// Whether the candidate belongs in the declared manifest.
    ///
    /// Pinned entries that are missing on disk are still declared so the
    /// header reflects the requested list.
    pub fn is_declared(&self) -> bool {
        matches!(self, InclusionDecision::Included | InclusionDecision::NotFound)
    }
}

impl fmt::Display for InclusionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InclusionDecision::Included => write!(f, "included"),
            InclusionDecision::DeniedByPattern { token } => write!(f, "denied by '{}'", token),
            InclusionDecision::NotInAllowList => write!(f, "extension not in allow-list"),
            InclusionDecision::NotFound => write!(f, "not found"),
        }
    }
}

/// Deny-list and extension allow-list for discovery mode.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryRules {
    deny: Vec<String>,
    extensions: HashSet<String>,
}

impl DiscoveryRules {
    /// Build rules from raw tokens. Tokens are lower-cased; extensions may be
    /// given with or without a leading dot. Empty entries are dropped.
    pub fn new<D, E>(deny: D, extensions: E) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let deny = deny
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        let extensions = extensions
            .into_iter()
            .map(|e| normalize_extension(e.as_ref()))
            .filter(|e| !e.is_empty())
            .collect();
        Self { deny, extensions }
    }

    /// Return the first deny token contained in `path`, if any.
    pub fn denied_by(&self, path: &str) -> Option<&str> {
        if self.deny.is_empty() {
            return None;
        }
        let lowered = path.to_lowercase();
        self.deny
            .iter()
            .find(|token| lowered.contains(token.as_str()))
            .map(String::as_str)
    }

    /// Check whether an (already lower-cased) extension is allowed.
    pub fn allows_extension(&self, extension: Option<&str>) -> bool {
        extension.is_some_and(|ext| self.extensions.contains(ext))
    }
}

/// The single filter seam shared by both selection strategies.
#[derive(Debug, Clone)]
pub enum PathFilter {
    Discovery(DiscoveryRules),
    Pinned(HashSet<String>),
}

impl PathFilter {
    /// Build a pinned filter from manifest entries.
    pub fn pinned<I>(entries: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        PathFilter::Pinned(
            entries
                .into_iter()
                .map(|e| normalize_relative(e.as_ref()))
                .collect(),
        )
    }

    /// Decide whether a candidate is included.
    pub fn decide(&self, candidate: &CandidatePath) -> InclusionDecision {
        match self {
            PathFilter::Discovery(rules) => {
                if let Some(token) = rules.denied_by(&candidate.relative) {
                    InclusionDecision::DeniedByPattern {
                        token: token.to_string(),
                    }
                } else if !rules.allows_extension(candidate.extension.as_deref()) {
                    InclusionDecision::NotInAllowList
                } else {
                    InclusionDecision::Included
                }
            }
            PathFilter::Pinned(members) => {
                if !members.contains(&candidate.relative) {
                    InclusionDecision::NotInAllowList
                } else if !candidate.exists {
                    InclusionDecision::NotFound
                } else {
                    InclusionDecision::Included
                }
            }
        }
    }

    /// Test a directory before descending into it.
    ///
    /// Returns the matching deny token when the subtree should be pruned.
    /// Pinned mode never walks, so it never prunes.
    pub fn prune_token(&self, relative_dir: &str) -> Option<&str> {
        match self {
            PathFilter::Discovery(rules) => rules.denied_by(relative_dir),
            PathFilter::Pinned(_) => None,
        }
    }
}

/// Lower-case extension of a path, without the dot.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
}

fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Normalize a user-supplied relative path to the form used in markers:
/// `/` separators, no leading `./`, no trailing `/`.
pub fn normalize_relative(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let mut rest = unified.as_str();
    while let Some(stripped) = rest.strip_prefix("./") {
        rest = stripped;
    }
    rest.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn candidate(relative: &str) -> CandidatePath {
        CandidatePath::new(Path::new("/project"), relative, true)
    }

    fn rules() -> DiscoveryRules {
        DiscoveryRules::new(["node_modules", "cache", ".env"], ["js", ".RS", "py"])
    }

    #[test]
    fn test_deny_token_wins_regardless_of_extension() {
        let filter = PathFilter::Discovery(rules());
        let decision = filter.decide(&candidate("web/node_modules/react/index.js"));
        assert_eq!(
            decision,
            InclusionDecision::DeniedByPattern {
                token: "node_modules".into()
            }
        );
    }

    #[test]
    fn test_deny_is_case_insensitive_substring() {
        let filter = PathFilter::Discovery(rules());
        assert!(matches!(
            filter.decide(&candidate("src/MyCache/util.py")),
            InclusionDecision::DeniedByPattern { .. }
        ));
        // `.env` also matches `.environment.js` - substring, not glob.
        assert!(matches!(
            filter.decide(&candidate("config/.environment.js")),
            InclusionDecision::DeniedByPattern { .. }
        ));
    }

    #[test]
    fn test_extension_allow_list() {
        let filter = PathFilter::Discovery(rules());
        assert_eq!(filter.decide(&candidate("a.js")), InclusionDecision::Included);
        assert_eq!(filter.decide(&candidate("lib/Main.RS")), InclusionDecision::Included);
        assert_eq!(
            filter.decide(&candidate("logo.png")),
            InclusionDecision::NotInAllowList
        );
        assert_eq!(
            filter.decide(&candidate("Makefile")),
            InclusionDecision::NotInAllowList
        );
    }

    #[test]
    fn test_pinned_membership_ignores_rules() {
        let filter = PathFilter::pinned(["./node_modules/x.png", "y.ext"]);
        assert_eq!(
            filter.decide(&candidate("node_modules/x.png")),
            InclusionDecision::Included
        );

        let missing = CandidatePath::new(Path::new("/project"), "y.ext", false);
        assert_eq!(filter.decide(&missing), InclusionDecision::NotFound);

        assert_eq!(
            filter.decide(&candidate("other.js")),
            InclusionDecision::NotInAllowList
        );
    }

    #[test]
    fn test_prune_only_in_discovery() {
        let discovery = PathFilter::Discovery(rules());
        assert_eq!(discovery.prune_token("pkg/Cache"), Some("cache"));
        assert_eq!(discovery.prune_token("src"), None);

        let pinned = PathFilter::pinned(["cache/a.js"]);
        assert_eq!(pinned.prune_token("cache"), None);
    }

    #[test]
    fn test_declared_decisions() {
        assert!(InclusionDecision::Included.is_declared());
        assert!(InclusionDecision::NotFound.is_declared());
        assert!(!InclusionDecision::NotInAllowList.is_declared());
    }

    #[test]
    fn test_normalize_relative() {
        assert_eq!(normalize_relative("./src/main.rs"), "src/main.rs");
        assert_eq!(normalize_relative("src\\lib.rs"), "src/lib.rs");
        assert_eq!(normalize_relative(" docs/ "), "docs");
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of(&PathBuf::from("a/B.JSX")), Some("jsx".into()));
        assert_eq!(extension_of(&PathBuf::from(".gitignore")), None);
    }
}
