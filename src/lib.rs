//! # kokoro-g2p
//!
//! Grapheme-to-phoneme resolution for the Kokoro text-to-speech vocabulary.
//!
//! ## Features
//!
//! - **Multi-source resolution**: gold and silver dictionaries, per-language
//!   rule engines and espeak-ng fallback, queried in a fixed priority order
//! - **Canonical output**: every source's alphabet is mapped onto the closed
//!   Kokoro inventory of the configured locale, stress marks included
//! - **Locales**: American and British English, Italian, German and French
//! - **Parallel**: order-preserving concurrent resolution (`parallel` feature)
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! kokoro-g2p = "2026.2"
//! ```
//!
//! ```ignore
//! use kokoro_g2p::{Collaborators, Resolver, ResolverConfig, G2P};
//!
//! let collaborators = Collaborators::with_dictionary_dir("data/dictionaries");
//! let resolver = Resolver::new(ResolverConfig::for_locale("en-us")?, &collaborators)?;
//!
//! assert_eq!(resolver.phonemize("Hello, world!"), "həlˈO, wˈɜɹld!");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod canonical;
pub mod error;
pub mod lexicon;
pub mod punctuation;
pub mod registry;
pub mod resolver;
pub mod sources;
pub mod vocab;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use canonical::{canonicalize, Canonical, Canonicalizer, SourceAlphabet, StressNotation, SymbolSet};
pub use error::{ConfigError, SourceError};
pub use lexicon::{normalize_key, JsonTierSource, Lexicon, StaticTierSource, Tier, TierSelection};
pub use punctuation::{normalize_punctuation, tokenize};
pub use registry::ResolverRegistry;
pub use resolver::{Collaborators, FallbackBackend, Resolver, ResolverConfig, ResolverConfigBuilder};
pub use sources::AdapterKind;
pub use vocab::Locale;

/// Quality of a resolution decision. Higher is better.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Rating {
    /// No source had an answer.
    #[default]
    Unresolved = 0,
    /// Secondary external tool.
    Alternate = 1,
    /// Primary external tool.
    Fallback = 2,
    /// Silver dictionary or rule engine.
    Derived = 3,
    /// Punctuation, passed through.
    Punctuation = 4,
    /// Gold dictionary or caller override.
    Curated = 5,
}

impl Rating {
    pub fn value(self) -> u8 {
        self as u8
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.value()
    }
}

impl TryFrom<u8> for Rating {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Rating::Unresolved),
            1 => Ok(Rating::Alternate),
            2 => Ok(Rating::Fallback),
            3 => Ok(Rating::Derived),
            4 => Ok(Rating::Punctuation),
            5 => Ok(Rating::Curated),
            other => Err(format!("rating {other} is outside 0..=5")),
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// One resolvable unit of input and its resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    text: String,
    normalized_key: String,
    /// POS tag from an external tagger; only used to pick between heteronyms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_hint: Option<String>,
    /// Kokoro phonemes, empty when unresolved.
    #[serde(default)]
    pub phonemes: String,
    #[serde(default)]
    pub rating: Rating,
    /// Separator following the token in the source text.
    #[serde(default)]
    pub whitespace: String,
    /// Adapter that produced `phonemes`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<AdapterKind>,
    /// Source symbols dropped while canonicalizing `phonemes`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coverage_gaps: Vec<char>,
}

impl Token {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            normalized_key: normalize_key(&text),
            text,
            pos_hint: None,
            phonemes: String::new(),
            rating: Rating::Unresolved,
            whitespace: String::new(),
            source: None,
            coverage_gaps: Vec::new(),
        }
    }

    pub fn with_pos(mut self, tag: impl Into<String>) -> Self {
        self.pos_hint = Some(tag.into());
        self
    }

    pub fn with_whitespace(mut self, whitespace: impl Into<String>) -> Self {
        self.whitespace = whitespace.into();
        self
    }

    /// Pin the pronunciation; resolvers will not touch it.
    pub fn with_override(mut self, phonemes: impl Into<String>) -> Self {
        self.phonemes = phonemes.into();
        self.rating = Rating::Curated;
        self.source = None;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn normalized_key(&self) -> &str {
        &self.normalized_key
    }

    pub fn is_override(&self) -> bool {
        self.rating == Rating::Curated && self.source.is_none() && !self.phonemes.is_empty()
    }

    /// True for non-empty text without any letter or digit.
    pub fn is_punctuation(&self) -> bool {
        !self.text.trim().is_empty() && !self.text.chars().any(char::is_alphanumeric)
    }

    pub fn is_resolved(&self) -> bool {
        self.rating > Rating::Unresolved
    }
}

/// Text to phonemes through token resolution.
pub trait G2P {
    /// Resolve tokens, keeping their order.
    fn resolve_tokens(&self, tokens: Vec<Token>) -> Vec<Token>;

    /// Tokenize, resolve and join into one phoneme string.
    ///
    /// Unresolved tokens are skipped; runs of whitespace become one space.
    fn phonemize(&self, text: &str) -> String {
        let mut out = String::new();
        for token in self.resolve_tokens(tokenize(text)) {
            out.push_str(&token.phonemes);
            if !token.whitespace.is_empty() && !out.is_empty() && !out.ends_with(' ') {
                out.push(' ');
            }
        }
        out.truncate(out.trim_end().len());
        out
    }
}
