//! Curated pronunciation dictionaries, partitioned into gold and silver tiers.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use crate::canonical::SourceAlphabet;
use crate::error::ConfigError;
use crate::vocab::Locale;

/// Dictionary quality tier. Gold is consulted before silver.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Gold,
    Silver,
}

impl Tier {
    pub const ALL: [Tier; 2] = [Tier::Gold, Tier::Silver];

    pub fn name(self) -> &'static str {
        match self {
            Tier::Gold => "gold",
            Tier::Silver => "silver",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One pronunciation as delivered by a tier source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexiconEntry {
    pub key: String,
    /// Part-of-speech class; `None` is the key's default entry.
    pub pos: Option<String>,
    pub phonemes: String,
}

impl LexiconEntry {
    pub fn new(key: impl Into<String>, phonemes: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pos: None,
            phonemes: phonemes.into(),
        }
    }

    pub fn with_pos(mut self, pos: impl Into<String>) -> Self {
        self.pos = Some(pos.into());
        self
    }
}

/// Parsed contents of one tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierData {
    /// Alphabet the tier's pronunciations are written in.
    pub alphabet: SourceAlphabet,
    pub entries: Vec<LexiconEntry>,
}

/// Provides parsed tier data. Only called while a [`Lexicon`] is built.
pub trait TierSource: Send + Sync {
    fn load(&self, locale: Locale, tier: Tier) -> Result<TierData, ConfigError>;
}

/// Reads `{prefix}_{tier}.json` dictionaries from a directory.
///
/// Values are either a phoneme string or an object mapping POS tags to
/// phoneme strings, where `DEFAULT` is the untagged entry and `null` values
/// are skipped:
///
/// ```json
/// {
///   "cats": "kˈæts",
///   "read": {"DEFAULT": "ɹˈid", "VBD": "ɹˈɛd", "VBN": "ɹˈɛd"}
/// }
/// ```
#[derive(Debug, Clone)]
pub struct JsonTierSource {
    dir: PathBuf,
}

impl JsonTierSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, locale: Locale, tier: Tier) -> PathBuf {
        self.dir
            .join(format!("{}_{}.json", locale.dictionary_prefix(), tier))
    }
}

impl TierSource for JsonTierSource {
    fn load(&self, locale: Locale, tier: Tier) -> Result<TierData, ConfigError> {
        let path = self.path(locale, tier);
        if !path.is_file() {
            return Err(ConfigError::MissingTier { tier, locale, path });
        }
        let content = std::fs::read_to_string(&path)?;
        parse_tier_json(&content, tier, locale.dictionary_alphabet())
    }
}

/// Parse one dictionary in the JSON layout accepted by [`JsonTierSource`].
pub fn parse_tier_json(
    content: &str,
    tier: Tier,
    alphabet: SourceAlphabet,
) -> Result<TierData, ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedTier { tier, reason };

    let json: serde_json::Value =
        serde_json::from_str(content).map_err(|e| malformed(format!("Failed to parse JSON: {e}")))?;
    let object = json
        .as_object()
        .ok_or_else(|| malformed("top level must be an object".to_string()))?;

    let mut entries = Vec::with_capacity(object.len());
    for (key, value) in object {
        match value {
            serde_json::Value::String(phonemes) => {
                entries.push(LexiconEntry::new(key.as_str(), phonemes.as_str()));
            }
            serde_json::Value::Object(tagged) => {
                for (tag, phonemes) in tagged {
                    let phonemes = match phonemes {
                        serde_json::Value::Null => continue,
                        serde_json::Value::String(phonemes) => phonemes,
                        _ => return Err(malformed(format!("{key:?}/{tag}: expected a string"))),
                    };
                    let entry = LexiconEntry::new(key.as_str(), phonemes.as_str());
                    entries.push(if tag == "DEFAULT" {
                        entry
                    } else {
                        entry.with_pos(tag.as_str())
                    });
                }
            }
            serde_json::Value::Null => continue,
            _ => {
                return Err(malformed(format!(
                    "{key:?}: expected a string or an object of POS tags"
                )))
            }
        }
    }

    Ok(TierData { alphabet, entries })
}

/// In-memory tier source.
#[derive(Debug, Clone, Default)]
pub struct StaticTierSource {
    tiers: HashMap<(Locale, Tier), TierData>,
}

impl StaticTierSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tier(mut self, locale: Locale, tier: Tier, data: TierData) -> Self {
        self.insert(locale, tier, data);
        self
    }

    pub fn insert(&mut self, locale: Locale, tier: Tier, data: TierData) {
        self.tiers.insert((locale, tier), data);
    }
}

impl TierSource for StaticTierSource {
    fn load(&self, locale: Locale, tier: Tier) -> Result<TierData, ConfigError> {
        self.tiers
            .get(&(locale, tier))
            .cloned()
            .ok_or(ConfigError::TierUnavailable { tier, locale })
    }
}

/// Which tiers a lexicon loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TierSelection {
    pub gold: bool,
    pub silver: bool,
}

impl TierSelection {
    pub const ALL: TierSelection = TierSelection {
        gold: true,
        silver: true,
    };
    pub const NONE: TierSelection = TierSelection {
        gold: false,
        silver: false,
    };

    pub fn includes(self, tier: Tier) -> bool {
        match tier {
            Tier::Gold => self.gold,
            Tier::Silver => self.silver,
        }
    }
}

impl Default for TierSelection {
    fn default() -> Self {
        Self::ALL
    }
}

impl fmt::Display for TierSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.gold, self.silver) {
            (true, true) => f.write_str("gold+silver"),
            (true, false) => f.write_str("gold"),
            (false, true) => f.write_str("silver"),
            (false, false) => f.write_str("no tiers"),
        }
    }
}

/// A lexicon lookup result, borrowed from the lexicon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LexiconHit<'a> {
    pub phonemes: &'a str,
    pub tier: Tier,
    pub alphabet: SourceAlphabet,
}

#[derive(Debug)]
struct TierTable {
    alphabet: SourceAlphabet,
    /// Entries per key in insertion order.
    entries: HashMap<String, Vec<(Option<String>, String)>>,
    len: usize,
}

impl TierTable {
    fn from_data(data: TierData) -> Self {
        let mut entries: HashMap<String, Vec<(Option<String>, String)>> = HashMap::new();
        let len = data.entries.len();
        for entry in data.entries {
            entries
                .entry(normalize_key(&entry.key))
                .or_default()
                .push((entry.pos, entry.phonemes));
        }
        Self {
            alphabet: data.alphabet,
            entries,
            len,
        }
    }

    /// Exact tag, then the tag's coarse class, then the default entry, then
    /// whichever entry was inserted first.
    fn lookup(&self, key: &str, pos: Option<&str>) -> Option<&str> {
        let candidates = self.entries.get(key)?;
        let tagged = |tag: &str| {
            candidates
                .iter()
                .find(|(pos, _)| pos.as_deref() == Some(tag))
        };

        let hit = pos
            .and_then(|tag| tagged(tag).or_else(|| tagged(coarse_pos(tag))))
            .or_else(|| candidates.iter().find(|(pos, _)| pos.is_none()))
            .or_else(|| candidates.first())?;
        Some(hit.1.as_str())
    }
}

/// Normalized word → curated pronunciations, built once per
/// `(locale, tier selection)` and read-only afterwards.
#[derive(Debug)]
pub struct Lexicon {
    locale: Locale,
    selection: TierSelection,
    gold: Option<TierTable>,
    silver: Option<TierTable>,
    known: HashSet<String>,
}

impl Lexicon {
    /// Load the selected tiers from `source`.
    ///
    /// A selected tier that cannot be loaded is fatal. Unselected tiers are
    /// read only to answer [`Lexicon::is_known`]; failures there are logged.
    pub fn build(
        locale: Locale,
        selection: TierSelection,
        source: &dyn TierSource,
    ) -> Result<Self, ConfigError> {
        let mut lexicon = Self::empty(locale);
        lexicon.selection = selection;

        for tier in Tier::ALL {
            if !selection.includes(tier) {
                match source.load(locale, tier) {
                    Ok(data) => lexicon
                        .known
                        .extend(data.entries.iter().map(|entry| normalize_key(&entry.key))),
                    Err(e) => log::debug!("{tier} dictionary for {locale} not read: {e}"),
                }
                continue;
            }

            let table = TierTable::from_data(source.load(locale, tier)?);
            log::info!(
                "Loaded {} {tier} entries ({} words) for {locale}",
                table.len,
                table.entries.len()
            );
            lexicon.known.extend(table.entries.keys().cloned());
            match tier {
                Tier::Gold => lexicon.gold = Some(table),
                Tier::Silver => lexicon.silver = Some(table),
            }
        }

        Ok(lexicon)
    }

    /// A lexicon with no tiers.
    pub fn empty(locale: Locale) -> Self {
        Self {
            locale,
            selection: TierSelection::NONE,
            gold: None,
            silver: None,
            known: HashSet::new(),
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn selection(&self) -> TierSelection {
        self.selection
    }

    fn table(&self, tier: Tier) -> Option<&TierTable> {
        match tier {
            Tier::Gold => self.gold.as_ref(),
            Tier::Silver => self.silver.as_ref(),
        }
    }

    /// Search the loaded tiers, gold first. `key` must already be normalized
    /// with [`normalize_key`].
    pub fn lookup(&self, key: &str, pos: Option<&str>) -> Option<LexiconHit<'_>> {
        Tier::ALL
            .iter()
            .find_map(|&tier| self.lookup_tier(tier, key, pos))
    }

    pub fn lookup_tier(&self, tier: Tier, key: &str, pos: Option<&str>) -> Option<LexiconHit<'_>> {
        let table = self.table(tier)?;
        table.lookup(key, pos).map(|phonemes| LexiconHit {
            phonemes,
            tier,
            alphabet: table.alphabet,
        })
    }

    /// True if any tier the source provides has an entry for `key`, loaded
    /// or not.
    pub fn is_known(&self, key: &str) -> bool {
        self.known.contains(key)
    }

    /// Number of entries across loaded tiers.
    pub fn len(&self) -> usize {
        Tier::ALL
            .iter()
            .filter_map(|&tier| self.table(tier))
            .map(|table| table.len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lookup key for a surface form: NFC, lowercase, typographic apostrophes
/// folded to `'`.
pub fn normalize_key(text: &str) -> String {
    text.nfc()
        .flat_map(char::to_lowercase)
        .map(|ch| match ch {
            '\u{2019}' | '\u{2018}' | '\u{02bc}' | '`' | '\u{b4}' => '\'',
            other => other,
        })
        .collect()
}

/// Coarse class of a Penn Treebank tag; other tags are returned unchanged.
pub fn coarse_pos(tag: &str) -> &str {
    if tag.starts_with("VB") {
        "VERB"
    } else if tag.starts_with("NN") {
        "NOUN"
    } else if tag.starts_with("JJ") {
        "ADJ"
    } else if tag.starts_with("RB") {
        "ADV"
    } else {
        tag
    }
}
