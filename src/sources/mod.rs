//! Knowledge sources consulted by the resolver.
//!
//! Each source sits behind one [`SourceAdapter`] variant. Adapters answer
//! with at most one [`Candidate`]; they never fail, a source that cannot
//! answer simply returns `None`.

pub mod espeak;
pub mod rules;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::canonical::SourceAlphabet;
use crate::error::SourceError;
use crate::lexicon::{Lexicon, Tier};
use crate::vocab::Locale;
use crate::{Rating, Token};

pub use espeak::EspeakTranscriber;
pub use rules::ItalianRules;

/// Deterministic orthography-to-phoneme rules for one language.
pub trait RuleEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Alphabet of the strings returned by [`RuleEngine::derive`].
    fn alphabet(&self) -> SourceAlphabet;

    /// Pronunciation of `text`, or `None` outside the engine's coverage.
    fn derive(&self, text: &str) -> Option<String>;
}

/// An external phonetic transcription tool.
pub trait Transcriber: Send + Sync {
    fn name(&self) -> &str;

    fn alphabet(&self) -> SourceAlphabet {
        SourceAlphabet::ESPEAK
    }

    /// Probed once when a resolver is built; unavailable tools are skipped.
    fn is_available(&self) -> bool;

    /// Transcribe `text`, giving up after `timeout`.
    fn transcribe(&self, text: &str, locale: Locale, timeout: Duration)
        -> Result<String, SourceError>;
}

/// Position of an adapter in the resolution chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AdapterKind {
    Gold,
    Silver,
    Rules,
    FallbackPrimary,
    FallbackSecondary,
}

impl AdapterKind {
    /// Rating of a decision made by this kind of adapter.
    pub fn rating(self) -> Rating {
        match self {
            AdapterKind::Gold => Rating::Curated,
            AdapterKind::Silver | AdapterKind::Rules => Rating::Derived,
            AdapterKind::FallbackPrimary => Rating::Fallback,
            AdapterKind::FallbackSecondary => Rating::Alternate,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            AdapterKind::Gold => "gold",
            AdapterKind::Silver => "silver",
            AdapterKind::Rules => "rules",
            AdapterKind::FallbackPrimary => "fallback_primary",
            AdapterKind::FallbackSecondary => "fallback_secondary",
        }
    }
}

impl fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A source's answer for one token, before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub raw: String,
    pub alphabet: SourceAlphabet,
    pub rating: Rating,
}

#[derive(Clone)]
pub enum SourceAdapter {
    Gold(Arc<Lexicon>),
    Silver(Arc<Lexicon>),
    Rules(Arc<dyn RuleEngine>),
    FallbackPrimary(Arc<dyn Transcriber>),
    FallbackSecondary(Arc<dyn Transcriber>),
}

impl SourceAdapter {
    pub fn kind(&self) -> AdapterKind {
        match self {
            SourceAdapter::Gold(_) => AdapterKind::Gold,
            SourceAdapter::Silver(_) => AdapterKind::Silver,
            SourceAdapter::Rules(_) => AdapterKind::Rules,
            SourceAdapter::FallbackPrimary(_) => AdapterKind::FallbackPrimary,
            SourceAdapter::FallbackSecondary(_) => AdapterKind::FallbackSecondary,
        }
    }

    pub fn resolve(&self, token: &Token, locale: Locale, timeout: Duration) -> Option<Candidate> {
        let (raw, alphabet) = match self {
            SourceAdapter::Gold(lexicon) => lexicon_answer(lexicon, Tier::Gold, token)?,
            SourceAdapter::Silver(lexicon) => lexicon_answer(lexicon, Tier::Silver, token)?,
            SourceAdapter::Rules(engine) => (engine.derive(token.text())?, engine.alphabet()),
            SourceAdapter::FallbackPrimary(tool) | SourceAdapter::FallbackSecondary(tool) => {
                match tool.transcribe(token.text(), locale, timeout) {
                    Ok(raw) => (raw, tool.alphabet()),
                    Err(e) => {
                        log::warn!("{} failed on '{}': {e}", tool.name(), token.text());
                        return None;
                    }
                }
            }
        };

        if raw.trim().is_empty() {
            return None;
        }
        Some(Candidate {
            raw,
            alphabet,
            rating: self.kind().rating(),
        })
    }
}

fn lexicon_answer(lexicon: &Lexicon, tier: Tier, token: &Token) -> Option<(String, SourceAlphabet)> {
    let hit = lexicon.lookup_tier(tier, token.normalized_key(), token.pos_hint.as_deref())?;
    Some((hit.phonemes.to_string(), hit.alphabet))
}

impl fmt::Debug for SourceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match self {
            SourceAdapter::Gold(lexicon) | SourceAdapter::Silver(lexicon) => {
                lexicon.locale().code().to_string()
            }
            SourceAdapter::Rules(engine) => engine.name().to_string(),
            SourceAdapter::FallbackPrimary(tool) | SourceAdapter::FallbackSecondary(tool) => {
                tool.name().to_string()
            }
        };
        f.debug_tuple(self.kind().name()).field(&source).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexicon::{LexiconEntry, StaticTierSource, TierData, TierSelection};

    struct Echo(Result<&'static str, &'static str>);

    impl Transcriber for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn transcribe(&self, _: &str, _: Locale, _: Duration) -> Result<String, SourceError> {
            self.0
                .map(str::to_string)
                .map_err(|e| SourceError::Failed(e.to_string()))
        }
    }

    fn lexicon() -> Arc<Lexicon> {
        let source = StaticTierSource::new().with_tier(
            Locale::EnUs,
            Tier::Gold,
            TierData {
                alphabet: SourceAlphabet::KOKORO,
                entries: vec![LexiconEntry::new("cats", "kˈæts")],
            },
        );
        let selection = TierSelection {
            gold: true,
            silver: false,
        };
        Arc::new(Lexicon::build(Locale::EnUs, selection, &source).unwrap())
    }

    const TIMEOUT: Duration = Duration::from_secs(1);

    #[test]
    fn ratings_follow_adapter_order() {
        let ratings: Vec<Rating> = [
            AdapterKind::Gold,
            AdapterKind::Silver,
            AdapterKind::Rules,
            AdapterKind::FallbackPrimary,
            AdapterKind::FallbackSecondary,
        ]
        .iter()
        .map(|kind| kind.rating())
        .collect();
        assert!(ratings.windows(2).all(|pair| pair[0] >= pair[1]));
        assert_eq!(AdapterKind::Gold.rating(), Rating::Curated);
        assert_eq!(AdapterKind::FallbackSecondary.rating(), Rating::Alternate);
    }

    #[test]
    fn lexicon_adapters_answer_from_their_own_tier() {
        let token = Token::new("Cats");
        let gold = SourceAdapter::Gold(lexicon());
        let candidate = gold.resolve(&token, Locale::EnUs, TIMEOUT).unwrap();
        assert_eq!(candidate.raw, "kˈæts");
        assert_eq!(candidate.rating, Rating::Curated);

        let silver = SourceAdapter::Silver(lexicon());
        assert!(silver.resolve(&token, Locale::EnUs, TIMEOUT).is_none());
    }

    #[test]
    fn rule_adapter_passes_surface_text() {
        let rules = SourceAdapter::Rules(Arc::new(ItalianRules::default()));
        let candidate = rules.resolve(&Token::new("Casa"), Locale::It, TIMEOUT).unwrap();
        assert_eq!(candidate.raw, "kasa");
        assert_eq!(candidate.rating, Rating::Derived);
        assert!(rules.resolve(&Token::new("k8s"), Locale::It, TIMEOUT).is_none());
    }

    #[test]
    fn tool_errors_and_blank_output_are_no_answer() {
        let token = Token::new("cats");
        let failing = SourceAdapter::FallbackPrimary(Arc::new(Echo(Err("boom"))));
        assert!(failing.resolve(&token, Locale::EnUs, TIMEOUT).is_none());

        let blank = SourceAdapter::FallbackPrimary(Arc::new(Echo(Ok(" \n"))));
        assert!(blank.resolve(&token, Locale::EnUs, TIMEOUT).is_none());

        let secondary = SourceAdapter::FallbackSecondary(Arc::new(Echo(Ok("kˈæts"))));
        let candidate = secondary.resolve(&token, Locale::EnUs, TIMEOUT).unwrap();
        assert_eq!(candidate.alphabet, SourceAlphabet::ESPEAK);
        assert_eq!(candidate.rating, Rating::Alternate);
    }

    #[test]
    fn debug_names_the_adapter() {
        let adapter = SourceAdapter::FallbackPrimary(Arc::new(Echo(Ok(""))));
        assert_eq!(format!("{adapter:?}"), "fallback_primary(\"echo\")");
    }
}
