//! Target phoneme inventories and the Kokoro token id table.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::canonical::SourceAlphabet;
use crate::error::ConfigError;

/// Symbols shared by both English variants: two stress marks, consonants,
/// monophthongs, the four shared diphthongs and the reduced schwa.
const SHARED_ENGLISH: &str = "ˈˌbdfhjklmnpstvwzɡŋɹʃʒðθʤʧəiuɑɔɛɜɪʊʌAIWYᵊ";
const AMERICAN_ONLY: &str = "æOᵻTʔ";
const BRITISH_ONLY: &str = "aQɒː";
const ITALIAN: &str = "ˈˌːaeiouɛɔjwbdfkɡlmnprstvzʃʒʎɲŋʦʣʧʤ";
const GERMAN: &str = "ˈˌːaeiouyøœɐɛɪɔʊəjbdfhkɡlmnŋpstvzçxʁʃʒʦʧʤ";
/// Nasal vowels are written with a combining tilde (`ɑ̃`).
const FRENCH: &str = "ˈˌaeiouyøœɑɛɔə\u{303}jwɥbdfkɡlmnɲŋpstvzʁʃʒ";

/// Punctuation marks the synthesizer accepts.
pub const PUNCTUATION: &str = ";:,.!?—…\"()\u{201c}\u{201d}";

/// Target vocabulary variant.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Locale {
    #[default]
    EnUs,
    EnGb,
    It,
    De,
    Fr,
}

impl Locale {
    pub const ALL: [Locale; 5] = [
        Locale::EnUs,
        Locale::EnGb,
        Locale::It,
        Locale::De,
        Locale::Fr,
    ];

    /// Canonical identifier, e.g. `"en-us"`.
    pub fn code(self) -> &'static str {
        match self {
            Locale::EnUs => "en-us",
            Locale::EnGb => "en-gb",
            Locale::It => "it",
            Locale::De => "de",
            Locale::Fr => "fr",
        }
    }

    /// espeak-ng voice used for fallback transcription.
    pub fn espeak_voice(self) -> &'static str {
        match self {
            Locale::Fr => "fr-fr",
            other => other.code(),
        }
    }

    /// File name prefix of this locale's dictionaries (`us_gold.json`).
    pub fn dictionary_prefix(self) -> &'static str {
        match self {
            Locale::EnUs => "us",
            Locale::EnGb => "gb",
            Locale::It => "it",
            Locale::De => "de",
            Locale::Fr => "fr",
        }
    }

    /// Alphabet the locale's curated dictionaries are written in.
    pub fn dictionary_alphabet(self) -> SourceAlphabet {
        match self {
            Locale::EnUs | Locale::EnGb => SourceAlphabet::KOKORO,
            Locale::It | Locale::De | Locale::Fr => SourceAlphabet::IPA,
        }
    }

    pub fn is_english(self) -> bool {
        matches!(self, Locale::EnUs | Locale::EnGb)
    }

    /// Map a Kokoro voice name to its locale.
    ///
    /// Voice names follow the pattern `{prefix}_{name}` where the two-character
    /// prefix encodes the language. Voices of languages without an inventory
    /// here (Spanish, Hindi, Japanese, Portuguese, Mandarin) return `None`.
    /// Kokoro ships no German voice; German is selected by locale id only.
    pub fn from_voice(voice: &str) -> Option<Locale> {
        let prefix = voice.get(..2)?;
        match prefix {
            "af" | "am" => Some(Locale::EnUs),
            "bf" | "bm" => Some(Locale::EnGb),
            "if" | "im" => Some(Locale::It),
            "ff" => Some(Locale::Fr),
            _ => None,
        }
    }

    pub fn inventory(self) -> Inventory {
        match self {
            Locale::EnUs => Inventory {
                shared: SHARED_ENGLISH,
                variant: AMERICAN_ONLY,
            },
            Locale::EnGb => Inventory {
                shared: SHARED_ENGLISH,
                variant: BRITISH_ONLY,
            },
            Locale::It => Inventory {
                shared: ITALIAN,
                variant: "",
            },
            Locale::De => Inventory {
                shared: GERMAN,
                variant: "",
            },
            Locale::Fr => Inventory {
                shared: FRENCH,
                variant: "",
            },
        }
    }

    /// Inventory symbols, punctuation included, that `vocab` has no id for.
    pub fn missing_ids(self, vocab: &HashMap<char, i64>) -> Vec<char> {
        self.inventory()
            .symbols()
            .chain(PUNCTUATION.chars())
            .chain([' '])
            .filter(|ch| !vocab.contains_key(ch))
            .collect()
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_lowercase().replace('_', "-");
        match id.as_str() {
            "en-us" | "en" | "a" | "american" => Ok(Locale::EnUs),
            "en-gb" | "b" | "british" => Ok(Locale::EnGb),
            "it" | "it-it" | "i" | "italian" => Ok(Locale::It),
            "de" | "de-de" | "german" => Ok(Locale::De),
            "fr" | "fr-fr" | "f" | "french" => Ok(Locale::Fr),
            _ => Err(ConfigError::UnknownLocale(s.to_string())),
        }
    }
}

/// The closed phoneme inventory of one locale.
///
/// A single space is always accepted as a separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inventory {
    shared: &'static str,
    variant: &'static str,
}

impl Inventory {
    pub fn contains(&self, ch: char) -> bool {
        ch == ' ' || self.shared.contains(ch) || self.variant.contains(ch)
    }

    /// True if every character of `phonemes` belongs to the inventory.
    pub fn is_valid(&self, phonemes: &str) -> bool {
        phonemes.chars().all(|ch| self.contains(ch))
    }

    /// Phoneme and stress symbols, without the separator.
    pub fn symbols(&self) -> impl Iterator<Item = char> + '_ {
        self.shared.chars().chain(self.variant.chars())
    }

    pub fn len(&self) -> usize {
        self.symbols().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub fn is_punctuation_mark(ch: char) -> bool {
    ch == ' ' || PUNCTUATION.contains(ch)
}

/// Load the Kokoro vocabulary from a model `config.json` file.
///
/// The config.json must contain a `"vocab"` field mapping single-character
/// strings to integer token IDs.
pub fn load_vocab(config_path: &Path) -> Result<HashMap<char, i64>, ConfigError> {
    let content = std::fs::read_to_string(config_path)?;
    let json: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| ConfigError::Vocab(format!("Failed to parse JSON: {e}")))?;

    let vocab_obj = json
        .get("vocab")
        .ok_or_else(|| ConfigError::Vocab("Missing 'vocab' field".to_string()))?
        .as_object()
        .ok_or_else(|| ConfigError::Vocab("'vocab' must be an object".to_string()))?;

    let mut map = HashMap::new();
    for (k, v) in vocab_obj {
        let ch = k
            .chars()
            .next()
            .ok_or_else(|| ConfigError::Vocab(format!("Empty key in vocab: {k:?}")))?;
        let id = v
            .as_i64()
            .ok_or_else(|| ConfigError::Vocab(format!("Non-integer vocab value for key {k:?}")))?;
        map.insert(ch, id);
    }

    Ok(map)
}

/// Check that a model vocabulary can encode everything the locale produces.
pub fn check_vocab(locale: Locale, vocab: &HashMap<char, i64>) -> Result<(), ConfigError> {
    let symbols = locale.missing_ids(vocab);
    if symbols.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::MissingIds { locale, symbols })
    }
}

/// Encode a phoneme string as Kokoro token ids.
///
/// Characters without an id are dropped, as the synthesizer would.
pub fn encode(phonemes: &str, vocab: &HashMap<char, i64>) -> Vec<i64> {
    phonemes
        .chars()
        .filter_map(|ch| vocab.get(&ch).copied())
        .collect()
}

/// Inverse of [`encode`]; ids without a symbol are skipped.
pub fn decode(ids: &[i64], vocab: &HashMap<char, i64>) -> String {
    let reverse: HashMap<i64, char> = vocab.iter().map(|(&ch, &id)| (id, ch)).collect();
    ids.iter().filter_map(|id| reverse.get(id)).collect()
}

/// Hardcoded Kokoro vocabulary (from config.json, model-version-agnostic).
///
/// Use when no model config.json is at hand; prefer [`load_vocab`] otherwise.
pub fn kokoro_vocab() -> HashMap<char, i64> {
    let entries: &[(char, i64)] = &[
        (';', 1),
        (':', 2),
        (',', 3),
        ('.', 4),
        ('!', 5),
        ('?', 6),
        ('—', 9),
        ('…', 10),
        ('"', 11),
        ('(', 12),
        (')', 13),
        ('\u{201c}', 14),
        ('\u{201d}', 15),
        (' ', 16),
        ('\u{0303}', 17),
        ('ʣ', 18),
        ('ʥ', 19),
        ('ʦ', 20),
        ('ʨ', 21),
        ('ᵝ', 22),
        ('ꭧ', 23),
        ('A', 24),
        ('I', 25),
        ('O', 31),
        ('Q', 33),
        ('S', 35),
        ('T', 36),
        ('W', 39),
        ('Y', 41),
        ('ᵊ', 42),
        ('a', 43),
        ('b', 44),
        ('c', 45),
        ('d', 46),
        ('e', 47),
        ('f', 48),
        ('h', 50),
        ('i', 51),
        ('j', 52),
        ('k', 53),
        ('l', 54),
        ('m', 55),
        ('n', 56),
        ('o', 57),
        ('p', 58),
        ('q', 59),
        ('r', 60),
        ('s', 61),
        ('t', 62),
        ('u', 63),
        ('v', 64),
        ('w', 65),
        ('x', 66),
        ('y', 67),
        ('z', 68),
        ('ɑ', 69),
        ('ɐ', 70),
        ('ɒ', 71),
        ('æ', 72),
        ('β', 75),
        ('ɔ', 76),
        ('ɕ', 77),
        ('ç', 78),
        ('ɖ', 80),
        ('ð', 81),
        ('ʤ', 82),
        ('ə', 83),
        ('ɚ', 85),
        ('ɛ', 86),
        ('ɜ', 87),
        ('ɟ', 90),
        ('ɡ', 92),
        ('ɥ', 99),
        ('ɨ', 101),
        ('ɪ', 102),
        ('ʝ', 103),
        ('ɯ', 110),
        ('ɰ', 111),
        ('ŋ', 112),
        ('ɳ', 113),
        ('ɲ', 114),
        ('ɴ', 115),
        ('ø', 116),
        ('ɸ', 118),
        ('θ', 119),
        ('œ', 120),
        ('ɹ', 123),
        ('ɾ', 125),
        ('ɻ', 126),
        ('ʁ', 128),
        ('ɽ', 129),
        ('ʂ', 130),
        ('ʃ', 131),
        ('ʈ', 132),
        ('ʧ', 133),
        ('ʊ', 135),
        ('ʋ', 136),
        ('ʌ', 138),
        ('ɣ', 139),
        ('ɤ', 140),
        ('χ', 142),
        ('ʎ', 143),
        ('ʒ', 147),
        ('ʔ', 148),
        ('ˈ', 156),
        ('ˌ', 157),
        ('ː', 158),
        ('ʰ', 162),
        ('ʲ', 164),
        ('↓', 169),
        ('→', 171),
        ('↗', 172),
        ('↘', 173),
        ('ᵻ', 177),
    ];
    entries.iter().copied().collect()
}
