use std::path::PathBuf;
use std::time::Duration;

use crate::lexicon::{Tier, TierSelection};
use crate::resolver::FallbackBackend;
use crate::vocab::Locale;

/// Fatal errors raised while constructing a [`crate::Resolver`] or its lexicon.
///
/// These are the only errors that cross the resolver boundary. Everything that
/// can go wrong while resolving an individual token is absorbed into the
/// token's rating instead.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Unknown locale variant '{0}'. Supported: en-us, en-gb, it, de, fr")]
    UnknownLocale(String),
    #[error("Unknown fallback backend '{0}'. Supported: espeak-ng, espeak")]
    UnknownBackend(String),
    #[error("No transcriber registered for fallback backend '{0}'")]
    MissingTranscriber(FallbackBackend),
    #[error("Invalid fallback order: {0}")]
    FallbackOrder(String),
    #[error("{tier} dictionary for {locale} not found at {}", .path.display())]
    MissingTier {
        tier: Tier,
        locale: Locale,
        path: PathBuf,
    },
    #[error("{tier} dictionary for {locale} not provided by the tier source")]
    TierUnavailable { tier: Tier, locale: Locale },
    #[error("Malformed {tier} dictionary: {reason}")]
    MalformedTier { tier: Tier, reason: String },
    #[error(
        "Lexicon for {found_locale} ({found}) does not match the configured \
         {locale} ({expected})"
    )]
    LexiconMismatch {
        locale: Locale,
        expected: TierSelection,
        found_locale: Locale,
        found: TierSelection,
    },
    #[error("Invalid config.json: {0}")]
    Vocab(String),
    #[error("Vocabulary has no id for {locale} symbols {symbols:?}")]
    MissingIds { locale: Locale, symbols: Vec<char> },
    #[error("Incomplete resolver configuration: {0}")]
    Builder(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<derive_builder::UninitializedFieldError> for ConfigError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        ConfigError::Builder(err.to_string())
    }
}

/// Why an external transcription tool produced no answer.
///
/// Never escapes the fallback adapter: it is logged and turned into a
/// "no candidate" result.
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error(
        "{0} not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    NotFound(String),
    #[error("Transcription timed out after {0:?}")]
    Timeout(Duration),
    #[error("Transcription failed: {0}")]
    Failed(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
