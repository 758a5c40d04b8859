//! Error types for Sluice.
//!
//! Only run-level failures live here. Per-file conditions are resolved
//! into [`FileResult`](crate::loader::FileResult) values and never escape
//! the candidate that produced them.

use std::path::PathBuf;

use crate::config::ConfigError;

/// Top-level error type for Sluice operations.
#[derive(Debug, thiserror::Error)]
pub enum SluiceError {
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("preflight failed: required entries missing under root: {}", .missing.join(", "))]
    Preflight { missing: Vec<String> },

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid manifest {path}: {reason}")]
    Manifest { path: String, reason: String },

    #[error("cannot write output {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Map an error to its exit code.
pub fn exit_code(error: &SluiceError) -> i32 {
    match error {
        SluiceError::PathNotFound(_) => 3,
        SluiceError::NotADirectory(_) => 4,
        SluiceError::Config(_) => 5,
        SluiceError::Preflight { .. } => 6,
        SluiceError::Manifest { .. } => 7,
        SluiceError::Output { .. } => 8,
        SluiceError::Io(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_message_lists_missing() {
        let err = SluiceError::Preflight {
            missing: vec!["server".into(), "webfrontend".into()],
        };
        assert_eq!(
            err.to_string(),
            "preflight failed: required entries missing under root: server, webfrontend"
        );
        assert_eq!(exit_code(&err), 6);
    }

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = [
            SluiceError::PathNotFound("a".into()),
            SluiceError::NotADirectory("a".into()),
            SluiceError::Preflight { missing: vec![] },
            SluiceError::Manifest {
                path: "m".into(),
                reason: "r".into(),
            },
            SluiceError::Output {
                path: "o".into(),
                source: std::io::Error::other("x"),
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(exit_code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }
}
