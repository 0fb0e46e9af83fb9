use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use derive_builder::Builder;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::canonical::Canonicalizer;
use crate::error::ConfigError;
use crate::lexicon::{normalize_key, JsonTierSource, Lexicon, TierSelection, TierSource};
use crate::punctuation::{KokoroPunctuation, PunctuationNormalizer};
use crate::sources::{AdapterKind, EspeakTranscriber, ItalianRules, RuleEngine, SourceAdapter, Transcriber};
use crate::vocab::{self, Locale};
use crate::{Rating, Token, G2P};

/// Maximum number of fallback backends: one primary and one secondary.
pub const MAX_FALLBACK_BACKENDS: usize = 2;

pub const DEFAULT_FALLBACK_TIMEOUT: Duration = Duration::from_secs(2);

/// External transcription backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum FallbackBackend {
    #[serde(rename = "espeak-ng")]
    EspeakNg,
    #[serde(rename = "espeak")]
    EspeakLegacy,
}

impl FallbackBackend {
    pub fn id(self) -> &'static str {
        match self {
            FallbackBackend::EspeakNg => "espeak-ng",
            FallbackBackend::EspeakLegacy => "espeak",
        }
    }

    /// Executable looked up on PATH by default.
    pub fn binary_name(self) -> &'static str {
        self.id()
    }
}

impl fmt::Display for FallbackBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for FallbackBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "espeak-ng" | "espeakng" => Ok(FallbackBackend::EspeakNg),
            "espeak" => Ok(FallbackBackend::EspeakLegacy),
            _ => Err(ConfigError::UnknownBackend(s.to_string())),
        }
    }
}

/// Immutable resolver configuration.
///
/// Equal configurations describe interchangeable resolvers, which is what
/// [`crate::ResolverRegistry`] keys on.
///
/// ```
/// use std::time::Duration;
/// use kokoro_g2p::{FallbackBackend, Locale, ResolverConfig};
///
/// let config = ResolverConfig::builder()
///     .locale(Locale::EnGb)
///     .load_silver(false)
///     .fallback_order(vec![FallbackBackend::EspeakNg, FallbackBackend::EspeakLegacy])
///     .fallback_timeout(Duration::from_millis(500))
///     .build()?;
/// assert!(config.validate().is_ok());
/// # Ok::<(), kokoro_g2p::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Builder)]
#[builder(default, setter(into), build_fn(error = "ConfigError"))]
pub struct ResolverConfig {
    pub locale: Locale,
    pub load_gold: bool,
    pub load_silver: bool,
    pub enable_rules: bool,
    pub enable_fallback: bool,
    /// Primary backend first, optional secondary second.
    pub fallback_order: Vec<FallbackBackend>,
    /// Bound on each external tool call.
    pub fallback_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            locale: Locale::default(),
            load_gold: true,
            load_silver: true,
            enable_rules: true,
            enable_fallback: true,
            fallback_order: vec![FallbackBackend::EspeakNg],
            fallback_timeout: DEFAULT_FALLBACK_TIMEOUT,
        }
    }
}

impl ResolverConfig {
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::default()
    }

    /// Default configuration for a locale identifier such as `"en-gb"`.
    pub fn for_locale(id: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            locale: id.parse()?,
            ..Self::default()
        })
    }

    pub fn tier_selection(&self) -> TierSelection {
        TierSelection {
            gold: self.load_gold,
            silver: self.load_silver,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback_order.len() > MAX_FALLBACK_BACKENDS {
            return Err(ConfigError::FallbackOrder(format!(
                "{} backends listed, at most {MAX_FALLBACK_BACKENDS} allowed",
                self.fallback_order.len()
            )));
        }
        if let [first, second] = &self.fallback_order[..] {
            if first == second {
                return Err(ConfigError::FallbackOrder(format!("'{first}' listed twice")));
            }
        }
        Ok(())
    }
}

/// Everything a resolver consults besides its configuration.
///
/// Defaults: Italian rules for `it`, espeak-ng and legacy espeak from PATH,
/// and [`KokoroPunctuation`].
#[derive(Clone)]
pub struct Collaborators {
    pub tier_source: Arc<dyn TierSource>,
    pub rules: HashMap<Locale, Arc<dyn RuleEngine>>,
    pub transcribers: HashMap<FallbackBackend, Arc<dyn Transcriber>>,
    pub punctuation: Arc<dyn PunctuationNormalizer>,
}

impl Collaborators {
    pub fn new(tier_source: Arc<dyn TierSource>) -> Self {
        let mut rules: HashMap<Locale, Arc<dyn RuleEngine>> = HashMap::new();
        rules.insert(Locale::It, Arc::new(ItalianRules::default()));

        let mut transcribers: HashMap<FallbackBackend, Arc<dyn Transcriber>> = HashMap::new();
        for backend in [FallbackBackend::EspeakNg, FallbackBackend::EspeakLegacy] {
            transcribers.insert(backend, Arc::new(EspeakTranscriber::for_backend(backend)));
        }

        Self {
            tier_source,
            rules,
            transcribers,
            punctuation: Arc::new(KokoroPunctuation),
        }
    }

    /// Read `{prefix}_{tier}.json` dictionaries from `dir`.
    pub fn with_dictionary_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(JsonTierSource::new(dir)))
    }

    pub fn with_rules(mut self, locale: Locale, engine: Arc<dyn RuleEngine>) -> Self {
        self.rules.insert(locale, engine);
        self
    }

    pub fn without_rules(mut self, locale: Locale) -> Self {
        self.rules.remove(&locale);
        self
    }

    pub fn with_transcriber(
        mut self,
        backend: FallbackBackend,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        self.transcribers.insert(backend, transcriber);
        self
    }

    pub fn with_punctuation(mut self, punctuation: Arc<dyn PunctuationNormalizer>) -> Self {
        self.punctuation = punctuation;
        self
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rules: HashMap<Locale, &str> = self
            .rules
            .iter()
            .map(|(locale, engine)| (*locale, engine.name()))
            .collect();
        let transcribers: HashMap<FallbackBackend, &str> = self
            .transcribers
            .iter()
            .map(|(backend, tool)| (*backend, tool.name()))
            .collect();
        f.debug_struct("Collaborators")
            .field("rules", &rules)
            .field("transcribers", &transcribers)
            .finish_non_exhaustive()
    }
}

/// Resolves tokens to canonical phonemes by querying sources in priority
/// order: gold, silver, rules, primary fallback, secondary fallback.
///
/// A `Resolver` is immutable once built and can be shared across threads.
#[derive(Debug)]
pub struct Resolver {
    config: ResolverConfig,
    lexicon: Arc<Lexicon>,
    canonicalizer: Canonicalizer,
    adapters: Vec<SourceAdapter>,
    punctuation: Arc<dyn PunctuationNormalizer>,
}

impl Resolver {
    /// Load the configured lexicon tiers and build the adapter chain.
    pub fn new(config: ResolverConfig, collaborators: &Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;
        let lexicon = Lexicon::build(
            config.locale,
            config.tier_selection(),
            collaborators.tier_source.as_ref(),
        )?;
        Self::with_lexicon(config, Arc::new(lexicon), collaborators)
    }

    /// Build on an already loaded lexicon of the same locale and tier
    /// selection.
    pub fn with_lexicon(
        config: ResolverConfig,
        lexicon: Arc<Lexicon>,
        collaborators: &Collaborators,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let locale = config.locale;
        if lexicon.locale() != locale || lexicon.selection() != config.tier_selection() {
            return Err(ConfigError::LexiconMismatch {
                locale,
                expected: config.tier_selection(),
                found_locale: lexicon.locale(),
                found: lexicon.selection(),
            });
        }

        let mut adapters = Vec::new();
        if config.load_gold {
            adapters.push(SourceAdapter::Gold(lexicon.clone()));
        }
        if config.load_silver {
            adapters.push(SourceAdapter::Silver(lexicon.clone()));
        }
        if config.enable_rules {
            match collaborators.rules.get(&locale) {
                Some(engine) => {
                    log::info!("Rule engine '{}' enabled for {locale}", engine.name());
                    adapters.push(SourceAdapter::Rules(engine.clone()));
                }
                None => log::debug!("No rule engine for {locale}"),
            }
        }
        if config.enable_fallback {
            for (position, backend) in config.fallback_order.iter().enumerate() {
                let tool = collaborators
                    .transcribers
                    .get(backend)
                    .ok_or(ConfigError::MissingTranscriber(*backend))?
                    .clone();
                if !tool.is_available() {
                    log::warn!("{} is not available; {backend} fallback disabled", tool.name());
                    continue;
                }
                log::info!("Fallback {backend} enabled for {locale}");
                adapters.push(if position == 0 {
                    SourceAdapter::FallbackPrimary(tool)
                } else {
                    SourceAdapter::FallbackSecondary(tool)
                });
            }
        }

        Ok(Self {
            canonicalizer: Canonicalizer::new(locale),
            punctuation: collaborators.punctuation.clone(),
            config,
            lexicon,
            adapters,
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn locale(&self) -> Locale {
        self.config.locale
    }

    pub fn lexicon(&self) -> &Arc<Lexicon> {
        &self.lexicon
    }

    /// Active adapters in query order.
    pub fn adapter_kinds(&self) -> Vec<AdapterKind> {
        self.adapters.iter().map(SourceAdapter::kind).collect()
    }

    /// Resolve one token.
    ///
    /// Overrides (see [`Token::with_override`]) are returned untouched.
    /// Punctuation is normalized and rated [`Rating::Punctuation`]. Anything
    /// else takes the first adapter answer that canonicalizes to a non-empty
    /// string, or stays [`Rating::Unresolved`].
    pub fn resolve(&self, mut token: Token) -> Token {
        if token.is_override() {
            log::debug!("'{}' keeps its override", token.text());
            return token;
        }

        token.phonemes.clear();
        token.rating = Rating::Unresolved;
        token.source = None;
        token.coverage_gaps.clear();

        if token.text().trim().is_empty() {
            return token;
        }

        if token.is_punctuation() {
            token.phonemes = self
                .punctuation
                .normalize(token.text())
                .chars()
                .filter(|&ch| vocab::is_punctuation_mark(ch))
                .collect();
            token.rating = Rating::Punctuation;
            return token;
        }

        for adapter in &self.adapters {
            let Some(candidate) =
                adapter.resolve(&token, self.config.locale, self.config.fallback_timeout)
            else {
                continue;
            };

            let canonical = self
                .canonicalizer
                .canonicalize(&candidate.raw, candidate.alphabet);
            if !canonical.gaps.is_empty() {
                log::warn!(
                    "No {} mapping for {:?} in {} output for '{}'; dropped",
                    self.config.locale,
                    canonical.gaps,
                    adapter.kind(),
                    token.text()
                );
            }
            if canonical.phonemes.is_empty() {
                log::debug!("{} answer for '{}' folded to nothing", adapter.kind(), token.text());
                continue;
            }

            log::debug!(
                "'{}' -> {} from {} (rating {})",
                token.text(),
                canonical.phonemes,
                adapter.kind(),
                candidate.rating.value()
            );
            token.phonemes = canonical.phonemes;
            token.rating = candidate.rating;
            token.source = Some(adapter.kind());
            token.coverage_gaps = canonical.gaps;
            return token;
        }

        log::debug!("No source resolved '{}'", token.text());
        token
    }

    /// Resolve a sequence, concurrently with the `parallel` feature.
    /// Results keep input order.
    pub fn resolve_all(&self, tokens: Vec<Token>) -> Vec<Token> {
        #[cfg(feature = "parallel")]
        {
            tokens.into_par_iter().map(|token| self.resolve(token)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            tokens.into_iter().map(|token| self.resolve(token)).collect()
        }
    }

    /// Resolve lazily. Dropping the iterator abandons the remaining tokens.
    pub fn resolve_iter<'a, I>(&'a self, tokens: I) -> impl Iterator<Item = Token> + 'a
    where
        I: IntoIterator<Item = Token>,
        I::IntoIter: 'a,
    {
        tokens.into_iter().map(move |token| self.resolve(token))
    }

    /// Canonical pronunciation of `word` from the loaded lexicon tiers only.
    pub fn lookup(&self, word: &str, pos: Option<&str>) -> Option<String> {
        let hit = self.lexicon.lookup(&normalize_key(word), pos)?;
        let canonical = self.canonicalizer.canonicalize(hit.phonemes, hit.alphabet);
        (!canonical.phonemes.is_empty()).then_some(canonical.phonemes)
    }

    /// Whether any dictionary tier knows `word`, loaded or not.
    pub fn is_known(&self, word: &str) -> bool {
        self.lexicon.is_known(&normalize_key(word))
    }
}

impl G2P for Resolver {
    fn resolve_tokens(&self, tokens: Vec<Token>) -> Vec<Token> {
        self.resolve_all(tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::SourceAlphabet;
    use crate::error::SourceError;
    use crate::lexicon::{LexiconEntry, StaticTierSource, Tier, TierData};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Transcriber that answers from a table, optionally slowly.
    struct FakeTool {
        name: &'static str,
        available: bool,
        answers: HashMap<&'static str, Result<&'static str, &'static str>>,
        delays: HashMap<&'static str, Duration>,
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    impl FakeTool {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                available: true,
                answers: HashMap::new(),
                delays: HashMap::new(),
                calls: AtomicUsize::new(0),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn answer(mut self, word: &'static str, raw: &'static str) -> Self {
            self.answers.insert(word, Ok(raw));
            self
        }

        fn fail(mut self, word: &'static str) -> Self {
            self.answers.insert(word, Err("tool crashed"));
            self
        }

        fn slow(mut self, word: &'static str, delay: Duration) -> Self {
            self.delays.insert(word, delay);
            self
        }

        fn unavailable(mut self) -> Self {
            self.available = false;
            self
        }
    }

    impl Transcriber for FakeTool {
        fn name(&self) -> &str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn transcribe(&self, text: &str, _: Locale, timeout: Duration) -> Result<String, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(text.to_string());
            if let Some(delay) = self.delays.get(text) {
                if *delay > timeout {
                    return Err(SourceError::Timeout(timeout));
                }
                std::thread::sleep(*delay);
            }
            match self.answers.get(text) {
                Some(Ok(raw)) => Ok(raw.to_string()),
                Some(Err(reason)) => Err(SourceError::Failed(reason.to_string())),
                None => Ok(String::new()),
            }
        }
    }

    struct FixedRules;

    impl RuleEngine for FixedRules {
        fn name(&self) -> &str {
            "fixed"
        }

        fn alphabet(&self) -> SourceAlphabet {
            SourceAlphabet::IPA
        }

        fn derive(&self, text: &str) -> Option<String> {
            (text == "zork").then(|| "ˈzɔrk".to_string())
        }
    }

    fn tiers() -> StaticTierSource {
        StaticTierSource::new()
            .with_tier(
                Locale::EnUs,
                Tier::Gold,
                TierData {
                    alphabet: SourceAlphabet::KOKORO,
                    entries: vec![
                        LexiconEntry::new("cats", "kˈæts"),
                        LexiconEntry::new("hello", "həlˈO"),
                        LexiconEntry::new("read", "ɹˈid"),
                        LexiconEntry::new("read", "ɹˈɛd").with_pos("VBD"),
                    ],
                },
            )
            .with_tier(
                Locale::EnUs,
                Tier::Silver,
                TierData {
                    alphabet: SourceAlphabet::KOKORO,
                    entries: vec![
                        LexiconEntry::new("cats", "kˈAts"),
                        LexiconEntry::new("dogs", "dˈɑɡz"),
                    ],
                },
            )
            .with_tier(
                Locale::EnGb,
                Tier::Gold,
                TierData {
                    alphabet: SourceAlphabet::KOKORO,
                    entries: vec![LexiconEntry::new("hello", "həlˈO")],
                },
            )
    }

    fn collaborators(primary: FakeTool, secondary: FakeTool) -> Collaborators {
        Collaborators::new(Arc::new(tiers()))
            .with_rules(Locale::EnUs, Arc::new(FixedRules))
            .with_transcriber(FallbackBackend::EspeakNg, Arc::new(primary))
            .with_transcriber(FallbackBackend::EspeakLegacy, Arc::new(secondary))
    }

    fn both_backends() -> ResolverConfig {
        ResolverConfig {
            fallback_order: vec![FallbackBackend::EspeakNg, FallbackBackend::EspeakLegacy],
            ..ResolverConfig::default()
        }
    }

    fn resolver(config: ResolverConfig) -> Resolver {
        Resolver::new(config, &collaborators(FakeTool::new("primary"), FakeTool::new("secondary")))
            .unwrap()
    }

    #[test]
    fn gold_beats_silver() {
        let resolver = resolver(ResolverConfig::default());
        let token = resolver.resolve(Token::new("cats"));
        assert_eq!(token.phonemes, "kˈæts");
        assert_eq!(token.rating, Rating::Curated);
        assert_eq!(token.source, Some(AdapterKind::Gold));

        let token = resolver.resolve(Token::new("dogs"));
        assert_eq!(token.rating, Rating::Derived);
        assert_eq!(token.source, Some(AdapterKind::Silver));
    }

    #[test]
    fn unloaded_gold_falls_through_to_silver() {
        let resolver = resolver(ResolverConfig {
            load_gold: false,
            ..ResolverConfig::default()
        });
        let token = resolver.resolve(Token::new("cats"));
        assert_eq!(token.phonemes, "kˈAts");
        assert_eq!(token.rating, Rating::Derived);
        assert!(resolver.is_known("hello"));
        assert_eq!(resolver.lookup("hello", None), None);
    }

    #[test]
    fn heteronyms_follow_the_pos_hint() {
        let resolver = resolver(ResolverConfig::default());
        let present = resolver.resolve(Token::new("read").with_pos("VB"));
        let past = resolver.resolve(Token::new("read").with_pos("VBD"));
        assert_eq!(present.phonemes, "ɹˈid");
        assert_eq!(past.phonemes, "ɹˈɛd");
    }

    #[test]
    fn rules_answer_after_dictionaries() {
        let resolver = resolver(ResolverConfig::default());
        let token = resolver.resolve(Token::new("zork"));
        assert_eq!(token.phonemes, "zˈɔɹk");
        assert_eq!(token.rating, Rating::Derived);
        assert_eq!(token.source, Some(AdapterKind::Rules));
    }

    #[test]
    fn disabled_rules_move_on_to_fallback() {
        let primary = FakeTool::new("primary").answer("zork", "zˈɔːk");
        let collaborators = collaborators(primary, FakeTool::new("secondary"));
        let config = ResolverConfig {
            enable_rules: false,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::new(config, &collaborators).unwrap();
        let token = resolver.resolve(Token::new("zork"));
        assert_eq!(token.phonemes, "zˈɔk");
        assert_eq!(token.rating, Rating::Fallback);
        assert_eq!(token.source, Some(AdapterKind::FallbackPrimary));
    }

    #[test]
    fn unresolved_without_any_source() {
        let config = ResolverConfig {
            enable_rules: false,
            enable_fallback: false,
            ..ResolverConfig::default()
        };
        let token = resolver(config).resolve(Token::new("xyznotaword"));
        assert_eq!(token.phonemes, "");
        assert_eq!(token.rating, Rating::Unresolved);
        assert_eq!(token.source, None);
    }

    #[test]
    fn punctuation_passes_through() {
        let resolver = resolver(ResolverConfig::default());
        let token = resolver.resolve(Token::new("!"));
        assert_eq!(token.phonemes, "!");
        assert_eq!(token.rating, Rating::Punctuation);

        let token = resolver.resolve(Token::new("..."));
        assert_eq!(token.phonemes, "…");
        let token = resolver.resolve(Token::new("#"));
        assert_eq!(token.phonemes, "");
        assert_eq!(token.rating, Rating::Punctuation);
    }

    #[test]
    fn custom_collaborators_replace_the_defaults() {
        struct Bangs;

        impl PunctuationNormalizer for Bangs {
            fn normalize(&self, text: &str) -> String {
                text.chars().map(|_| '!').collect()
            }
        }

        let collaborators = collaborators(FakeTool::new("primary"), FakeTool::new("secondary"))
            .with_punctuation(Arc::new(Bangs))
            .without_rules(Locale::EnUs);
        let resolver = Resolver::new(ResolverConfig::default(), &collaborators).unwrap();
        assert_eq!(resolver.resolve(Token::new("?.")).phonemes, "!!");
        assert!(!resolver.resolve(Token::new("zork")).is_resolved());
        assert!(!resolver.adapter_kinds().contains(&AdapterKind::Rules));
    }

    #[test]
    fn overrides_are_left_alone() {
        let primary = FakeTool::new("primary");
        let collaborators = collaborators(primary, FakeTool::new("secondary"));
        let resolver = Resolver::new(ResolverConfig::default(), &collaborators).unwrap();
        let token = resolver.resolve(Token::new("cats").with_override("kˈIts"));
        assert_eq!(token.phonemes, "kˈIts");
        assert_eq!(token.rating, Rating::Curated);
        assert_eq!(token.source, None);
    }

    #[test]
    fn folded_symbols_are_recorded_as_gaps() {
        let primary = FakeTool::new("primary").answer("blørk", "blˈøɹk");
        let collaborators = collaborators(primary, FakeTool::new("secondary"));
        let resolver = Resolver::new(ResolverConfig::default(), &collaborators).unwrap();
        let token = resolver.resolve(Token::new("blørk"));
        assert_eq!(token.phonemes, "blɹk");
        assert_eq!(token.coverage_gaps, vec!['ø']);
        assert_eq!(token.rating, Rating::Fallback);
        assert!(Locale::EnUs.inventory().is_valid(&token.phonemes));
    }

    #[test]
    fn tool_failures_move_on_to_the_secondary() {
        let primary = FakeTool::new("primary").fail("qux");
        let secondary = FakeTool::new("secondary").answer("qux", "kwˈʌks");
        let resolver = Resolver::new(both_backends(), &collaborators(primary, secondary)).unwrap();
        let token = resolver.resolve(Token::new("qux"));
        assert_eq!(token.phonemes, "kwˈʌks");
        assert_eq!(token.rating, Rating::Alternate);
        assert_eq!(token.source, Some(AdapterKind::FallbackSecondary));
    }

    #[test]
    fn answers_folding_to_nothing_do_not_win() {
        let primary = FakeTool::new("primary").answer("qux", "❓");
        let secondary = FakeTool::new("secondary").answer("qux", "kwˈʌks");
        let resolver = Resolver::new(both_backends(), &collaborators(primary, secondary)).unwrap();
        let token = resolver.resolve(Token::new("qux"));
        assert_eq!(token.rating, Rating::Alternate);
        assert!(token.coverage_gaps.is_empty());
    }

    #[test]
    fn timeouts_leave_the_token_unresolved() {
        let primary = FakeTool::new("primary")
            .answer("slow", "slˈO")
            .slow("slow", Duration::from_secs(60));
        let config = ResolverConfig {
            fallback_timeout: Duration::from_millis(50),
            ..ResolverConfig::default()
        };
        let resolver =
            Resolver::new(config, &collaborators(primary, FakeTool::new("secondary"))).unwrap();
        let token = resolver.resolve(Token::new("slow"));
        assert_eq!(token.rating, Rating::Unresolved);
    }

    #[test]
    fn unavailable_tools_are_skipped_at_construction() {
        let primary = FakeTool::new("primary").unavailable();
        let secondary = FakeTool::new("secondary").answer("qux", "kwˈʌks");
        let resolver = Resolver::new(both_backends(), &collaborators(primary, secondary)).unwrap();
        assert_eq!(
            resolver.adapter_kinds(),
            vec![
                AdapterKind::Gold,
                AdapterKind::Silver,
                AdapterKind::Rules,
                AdapterKind::FallbackSecondary
            ]
        );
        assert_eq!(resolver.resolve(Token::new("qux")).rating, Rating::Alternate);
    }

    #[test]
    fn rejects_invalid_fallback_orders() {
        let collaborators = collaborators(FakeTool::new("primary"), FakeTool::new("secondary"));
        for order in [
            vec![FallbackBackend::EspeakNg, FallbackBackend::EspeakNg],
            vec![
                FallbackBackend::EspeakNg,
                FallbackBackend::EspeakLegacy,
                FallbackBackend::EspeakNg,
            ],
        ] {
            let config = ResolverConfig {
                fallback_order: order,
                ..ResolverConfig::default()
            };
            assert!(matches!(
                Resolver::new(config, &collaborators),
                Err(ConfigError::FallbackOrder(_))
            ));
        }
    }

    #[test]
    fn missing_transcriber_is_a_configuration_error() {
        let mut collaborators = collaborators(FakeTool::new("primary"), FakeTool::new("secondary"));
        collaborators.transcribers.remove(&FallbackBackend::EspeakLegacy);
        let err = Resolver::new(both_backends(), &collaborators).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingTranscriber(FallbackBackend::EspeakLegacy)
        ));
    }

    #[test]
    fn missing_requested_tier_is_a_configuration_error() {
        let config = ResolverConfig {
            locale: Locale::EnGb,
            ..ResolverConfig::default()
        };
        let err = Resolver::new(config, &collaborators(FakeTool::new("p"), FakeTool::new("s")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::TierUnavailable { tier: Tier::Silver, .. }));
    }

    #[test]
    fn resolution_is_deterministic() {
        let primary = FakeTool::new("primary").answer("qux", "kwˈʌks");
        let resolver = Resolver::new(
            ResolverConfig::default(),
            &collaborators(primary, FakeTool::new("secondary")),
        )
        .unwrap();
        for word in ["cats", "qux", "zork", "nothing", "?"] {
            let first = resolver.resolve(Token::new(word));
            let second = resolver.resolve(Token::new(word));
            assert_eq!(
                (first.phonemes, first.rating, first.source),
                (second.phonemes, second.rating, second.source)
            );
        }
    }

    #[test]
    fn concurrent_resolution_preserves_order() {
        let words = ["one", "two", "three", "four", "five"];
        let mut primary = FakeTool::new("primary");
        for (i, word) in words.iter().enumerate() {
            primary = primary
                .answer(word, "wˈʌn")
                .slow(word, Duration::from_millis(10 * (5 - i as u64)));
        }
        let resolver = Resolver::new(
            ResolverConfig::default(),
            &collaborators(primary, FakeTool::new("secondary")),
        )
        .unwrap();
        let tokens = words.iter().map(|w| Token::new(*w)).collect();
        let resolved = resolver.resolve_all(tokens);
        let texts: Vec<&str> = resolved.iter().map(|t| t.text()).collect();
        assert_eq!(texts, words);
        assert!(resolved.iter().all(|t| t.rating == Rating::Fallback));
    }

    #[test]
    fn lazy_resolution_stops_when_dropped() {
        let primary = Arc::new(FakeTool::new("primary"));
        let collaborators = collaborators(FakeTool::new("unused"), FakeTool::new("secondary"))
            .with_transcriber(FallbackBackend::EspeakNg, primary.clone());
        let resolver = Resolver::new(ResolverConfig::default(), &collaborators).unwrap();
        let tokens = ["a", "b", "c", "d"].map(Token::new);
        let first_two: Vec<Token> = resolver.resolve_iter(tokens).take(2).collect();
        assert_eq!(first_two.len(), 2);
        assert_eq!(primary.calls.load(Ordering::SeqCst), 2);
        assert_eq!(*primary.seen.lock().unwrap(), ["a", "b"]);
    }

    #[test]
    fn phonemizes_text() {
        let primary = FakeTool::new("primary").answer("world", "wˈɜːld");
        let resolver = Resolver::new(
            ResolverConfig::default(),
            &collaborators(primary, FakeTool::new("secondary")),
        )
        .unwrap();
        assert_eq!(resolver.phonemize("Hello, world!"), "həlˈO, wˈɜɹld!");
        assert_eq!(resolver.phonemize("Hello xyzzy cats."), "həlˈO kˈæts.");
    }

    #[test]
    fn lookup_canonicalizes_for_the_locale() {
        let us = resolver(ResolverConfig::default());
        assert_eq!(us.lookup("Hello", None).as_deref(), Some("həlˈO"));
        assert_eq!(us.lookup("read", Some("VBD")).as_deref(), Some("ɹˈɛd"));
        assert!(!us.is_known("xyznotaword"));

        let gb_config = ResolverConfig {
            locale: Locale::EnGb,
            load_silver: false,
            ..ResolverConfig::default()
        };
        let gb = resolver(gb_config);
        assert_eq!(gb.lookup("hello", None).as_deref(), Some("həlˈQ"));
    }

    #[test]
    fn parses_configuration_identifiers() {
        assert_eq!("espeak-ng".parse::<FallbackBackend>().unwrap(), FallbackBackend::EspeakNg);
        assert_eq!("espeak".parse::<FallbackBackend>().unwrap(), FallbackBackend::EspeakLegacy);
        assert!(matches!(
            "festival".parse::<FallbackBackend>(),
            Err(ConfigError::UnknownBackend(_))
        ));
        assert_eq!(ResolverConfig::for_locale("en_gb").unwrap().locale, Locale::EnGb);
        assert!(matches!(
            ResolverConfig::for_locale("klingon"),
            Err(ConfigError::UnknownLocale(_))
        ));

        let config = ResolverConfig::builder()
            .locale(Locale::It)
            .enable_fallback(false)
            .build()
            .unwrap();
        assert_eq!(config.locale, Locale::It);
        assert!(config.load_gold && config.enable_rules && !config.enable_fallback);
        assert_eq!(config.fallback_timeout, DEFAULT_FALLBACK_TIMEOUT);
    }

    #[test]
    fn rejects_a_lexicon_built_for_another_configuration() {
        let collaborators = collaborators(FakeTool::new("primary"), FakeTool::new("secondary"));
        let gold_only = TierSelection {
            gold: true,
            silver: false,
        };
        let lexicon = Arc::new(Lexicon::build(Locale::EnUs, gold_only, &tiers()).unwrap());

        let err = Resolver::with_lexicon(ResolverConfig::default(), lexicon.clone(), &collaborators)
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::LexiconMismatch { found, .. } if found == gold_only
        ));

        let british = ResolverConfig {
            locale: Locale::EnGb,
            load_silver: false,
            ..ResolverConfig::default()
        };
        let err = Resolver::with_lexicon(british, lexicon.clone(), &collaborators).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::LexiconMismatch { found_locale: Locale::EnUs, .. }
        ));

        let matching = ResolverConfig {
            load_silver: false,
            ..ResolverConfig::default()
        };
        let resolver = Resolver::with_lexicon(matching, lexicon, &collaborators).unwrap();
        assert_eq!(resolver.lookup("cats", None).as_deref(), Some("kˈæts"));
    }

    #[test]
    fn resolver_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Resolver>();
    }
}
