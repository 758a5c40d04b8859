//! Sluice - Serialize a codebase into one self-describing snapshot artifact.
//!
//! Sluice walks a project tree (or a pinned list of paths), selects files by
//! configurable rules, and streams their contents into a single text file
//! framed with greppable start/end markers. The header declares the full file
//! list up front; the footer records what was written, skipped, or missing so
//! the artifact can be audited on its own.
//!
//! # Quick Start
//!
//! ```no_run
//! use sluice::builder::Snapshot;
//! use sluice::report::NullReporter;
//!
//! let report = Snapshot::new("./my-project")
//!     .output("./snapshot.txt")
//!     .extensions(["rs", "toml"])
//!     .deny(["target", ".git"])
//!     .run(&mut NullReporter)
//!     .unwrap();
//!
//! println!("wrote {} of {} files", report.written, report.declared);
//! ```
//!
//! # Modules
//!
//! - [`filter`] - Inclusion decisions (deny-list, extension allow-list, pinned set)
//! - [`walker`] - Candidate enumeration (directory walk or pinned manifest)
//! - [`loader`] - Size-capped, encoding-tolerant content loading
//! - [`output`] - Section framing, header and footer rendering
//! - [`aggregator`] - Streamed artifact writing and counters
//! - [`report`] - Operator-facing progress and summary
//! - [`config`] - Configuration defaults and file loading
//! - [`tree`] - Project-structure view of the declared manifest
//! - [`tokens`] - Token estimates for written content
//! - [`builder`] - Run context and fluent API

pub mod aggregator;
pub mod builder;
pub mod config;
pub mod errors;
pub mod filter;
pub mod loader;
pub mod output;
pub mod report;
pub mod tokens;
pub mod tree;
pub mod walker;

// Re-export key types at crate root for convenience
pub use aggregator::{ArtifactWriter, SummaryReport};
pub use builder::{RunContext, Selection, Snapshot};
pub use config::{Config, ConfigError};
pub use errors::SluiceError;
pub use filter::{DiscoveryRules, InclusionDecision, PathFilter};
pub use loader::{ContentLoader, FileResult};
pub use report::{ConsoleReporter, NullReporter, Reporter};
pub use tokens::{Encoding, TokenCounter};
pub use walker::{CandidatePath, Mode, Plan};
