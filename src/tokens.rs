//! Token estimates for written content.
//!
//! Uses tiktoken-rs for OpenAI-compatible counts, falling back to a
//! ~4 characters per token heuristic when an encoder cannot be built.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tiktoken_rs::CoreBPE;

/// Token encoding to use for counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Encoding {
    /// cl100k_base: GPT-4, GPT-3.5-turbo
    #[default]
    #[serde(rename = "cl100k_base", alias = "cl100k")]
    Cl100kBase,
    /// o200k_base: GPT-4o
    #[serde(rename = "o200k_base", alias = "o200k")]
    O200kBase,
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Cl100kBase => write!(f, "cl100k_base"),
            Encoding::O200kBase => write!(f, "o200k_base"),
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" => Ok(Encoding::Cl100kBase),
            "o200k" | "o200k_base" => Ok(Encoding::O200kBase),
            _ => Err(format!("unknown encoding: {}", s)),
        }
    }
}

// Built once per encoding, on first use.
static CL100K: OnceLock<Option<CoreBPE>> = OnceLock::new();
static O200K: OnceLock<Option<CoreBPE>> = OnceLock::new();

fn tokenizer(encoding: Encoding) -> Option<&'static CoreBPE> {
    match encoding {
        Encoding::Cl100kBase => CL100K
            .get_or_init(|| tiktoken_rs::cl100k_base().ok())
            .as_ref(),
        Encoding::O200kBase => O200K
            .get_or_init(|| tiktoken_rs::o200k_base().ok())
            .as_ref(),
    }
}

fn fallback_count(text: &str) -> usize {
    (text.len() + 3) / 4
}

/// Counts tokens with a fixed encoding. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenCounter {
    encoding: Encoding,
}

impl TokenCounter {
    pub fn new(encoding: Encoding) -> Self {
        Self { encoding }
    }

    pub fn count(&self, text: &str) -> usize {
        match tokenizer(self.encoding) {
            Some(bpe) => bpe.encode_ordinary(text).len(),
            None => fallback_count(text),
        }
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }
}
