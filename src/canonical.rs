//! Phoneme canonicalization.
//!
//! Every source (curated dictionaries, rule engines, espeak-ng) writes
//! pronunciations in its own alphabet. [`Canonicalizer`] maps any of them into
//! the closed inventory of one [`Locale`] in four steps:
//!
//! 1. **Source substitution**: longest-match rewriting of source symbols,
//!    including tied and untied digraphs collapsing to one target symbol
//!    (`a^ɪ` → `I`, `t͡ʃ` → `ʧ`), syllabic consonants (`n̩` → `ᵊn`) and
//!    Italian doubled consonants (`tts` → `ʦː`).
//! 2. **Variant substitution**: per-locale rewriting of symbols that belong to
//!    a sibling variant (`ɾ` → `T` for American English, `O` → `Q` for British).
//!    Only symbols outside the locale's inventory are ever rewritten.
//! 3. **Folding**: anything still outside the inventory is dropped and
//!    reported as a coverage gap.
//! 4. **Stress placement**: primary `ˈ` and secondary `ˌ` are moved to sit
//!    immediately before the syllable nucleus, according to the source's
//!    [`StressNotation`].
//!
//! Canonicalizing a valid target string under [`SourceAlphabet::KOKORO`]
//! returns it unchanged, so the output of any alphabet is a fixed point.

use unicode_normalization::UnicodeNormalization;

use crate::vocab::{Inventory, Locale};

const PRIMARY: char = 'ˈ';
const SECONDARY: char = 'ˌ';
const SYLLABIC: char = '\u{329}';
const LONG: char = 'ː';

/// Italian consonants that can be long.
const ITALIAN_CONSONANTS: &str = "bdfkɡlmnprstvzʃʒʎɲʦʣʧʤ";

/// Symbols that can carry stress once canonical.
const NUCLEI: &str = "AIOQWYaeiouyæøœɐɑɒɔəɛɜɪʊʌᵻ";
const NASAL: char = '\u{303}';

const ESPEAK_TIES: &[&str] = &["^", "\u{361}", ""];
const IPA_TIES: &[&str] = &["\u{361}", "\u{35c}", ""];

/// Symbol repertoire a source writes in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolSet {
    /// Already in the target vocabulary (misaki-style dictionaries).
    Kokoro,
    /// espeak-ng `--ipa` output, `^` ties and `_` separators included.
    Espeak,
    /// Standard IPA.
    Ipa,
}

/// Where a source writes its stress marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StressNotation {
    /// Marks are already placed as the target expects; left untouched.
    Canonical,
    /// Directly before the vowel (espeak-ng).
    BeforeNucleus,
    /// Before the syllable onset (dictionary IPA, `ˈhaʊs`).
    SyllableOnset,
    /// Directly after the stressed vowel.
    AfterNucleus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceAlphabet {
    pub symbols: SymbolSet,
    pub stress: StressNotation,
}

impl SourceAlphabet {
    pub const KOKORO: SourceAlphabet = SourceAlphabet {
        symbols: SymbolSet::Kokoro,
        stress: StressNotation::Canonical,
    };
    pub const ESPEAK: SourceAlphabet = SourceAlphabet {
        symbols: SymbolSet::Espeak,
        stress: StressNotation::BeforeNucleus,
    };
    pub const IPA: SourceAlphabet = SourceAlphabet {
        symbols: SymbolSet::Ipa,
        stress: StressNotation::SyllableOnset,
    };

    pub const fn with_stress(self, stress: StressNotation) -> Self {
        SourceAlphabet {
            symbols: self.symbols,
            stress,
        }
    }
}

/// Result of canonicalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Canonical {
    /// Target-vocabulary phonemes.
    pub phonemes: String,
    /// Source symbols without a mapping, in order of first appearance.
    pub gaps: Vec<char>,
}

/// Maps source alphabets onto one locale's inventory.
///
/// Substitution tables are built once at construction; canonicalization
/// itself is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    locale: Locale,
    inventory: Inventory,
    espeak: Substitutions,
    ipa: Substitutions,
    variant: Substitutions,
}

impl Canonicalizer {
    pub fn new(locale: Locale) -> Self {
        Self {
            locale,
            inventory: locale.inventory(),
            espeak: Substitutions::new(source_rules(SymbolSet::Espeak, locale)),
            ipa: Substitutions::new(source_rules(SymbolSet::Ipa, locale)),
            variant: Substitutions::new(variant_rules(locale)),
        }
    }

    pub fn locale(&self) -> Locale {
        self.locale
    }

    pub fn canonicalize(&self, raw: &str, alphabet: SourceAlphabet) -> Canonical {
        let mut chars: Vec<char> = raw.nfc().collect();
        if self.inventory.contains(NASAL) {
            chars = split_nasals(&chars);
        }

        let source = match alphabet.symbols {
            SymbolSet::Kokoro => None,
            SymbolSet::Espeak => Some(&self.espeak),
            SymbolSet::Ipa => Some(&self.ipa),
        };
        if let Some(table) = source {
            for ch in chars.iter_mut().filter(|ch| ch.is_whitespace()) {
                *ch = ' ';
            }
            chars = table.apply(&chars);
            chars = mark_syllabics(&chars, self.locale.is_english());
            if self.locale == Locale::It {
                chars = mark_geminates(&chars);
            }
        }
        chars = self.variant.apply(&chars);

        let mut gaps = Vec::new();
        chars.retain(|&ch| {
            if self.inventory.contains(ch) {
                return true;
            }
            if !gaps.contains(&ch) {
                gaps.push(ch);
            }
            false
        });

        let phonemes = match alphabet.stress {
            StressNotation::Canonical => chars.into_iter().collect(),
            notation => place_stress(&chars, notation),
        };
        Canonical { phonemes, gaps }
    }
}

/// Canonicalize with a throwaway [`Canonicalizer`].
///
/// Prefer keeping a `Canonicalizer` around when converting many strings.
pub fn canonicalize(raw: &str, alphabet: SourceAlphabet, locale: Locale) -> Canonical {
    Canonicalizer::new(locale).canonicalize(raw, alphabet)
}

/// Ordered longest-match substitution table.
#[derive(Debug, Clone)]
struct Substitutions {
    rules: Vec<(Vec<char>, String)>,
}

impl Substitutions {
    fn new(rules: Vec<(String, String)>) -> Self {
        let mut rules: Vec<(Vec<char>, String)> = rules
            .into_iter()
            .filter(|(pattern, _)| !pattern.is_empty())
            .map(|(pattern, replacement)| (pattern.chars().collect(), replacement))
            .collect();
        // Stable: among equal lengths the first rule listed wins.
        rules.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Self { rules }
    }

    /// Rewrite left to right; replacements are never re-scanned.
    fn apply(&self, input: &[char]) -> Vec<char> {
        let mut out = Vec::with_capacity(input.len());
        let mut i = 0;
        while i < input.len() {
            let rest = &input[i..];
            match self
                .rules
                .iter()
                .find(|(pattern, _)| rest.starts_with(pattern))
            {
                Some((pattern, replacement)) => {
                    out.extend(replacement.chars());
                    i += pattern.len();
                }
                None => {
                    out.push(input[i]);
                    i += 1;
                }
            }
        }
        out
    }
}

fn rule(rules: &mut Vec<(String, String)>, from: &str, to: &str) {
    rules.push((from.to_string(), to.to_string()));
}

/// Two-symbol sequence written with any of `ties` between its halves.
fn tied(rules: &mut Vec<(String, String)>, ties: &[&str], first: char, second: char, to: &str) {
    for tie in ties {
        rules.push((format!("{first}{tie}{second}"), to.to_string()));
        rules.push((format!("{first}{tie}{second}\u{32f}"), to.to_string()));
    }
}

fn source_rules(symbols: SymbolSet, locale: Locale) -> Vec<(String, String)> {
    let ties = match symbols {
        SymbolSet::Kokoro => return Vec::new(),
        SymbolSet::Espeak => ESPEAK_TIES,
        SymbolSet::Ipa => IPA_TIES,
    };
    let tie_marks: Vec<&str> = ties.iter().copied().filter(|t| !t.is_empty()).collect();
    let mut rules = Vec::new();

    rule(&mut rules, "g", "ɡ");
    rule(&mut rules, "'", "ˈ");
    rule(&mut rules, "ˑ", "");
    rule(&mut rules, "ʰ", "");
    rule(&mut rules, "\u{32f}", "");
    rule(&mut rules, "\u{361}", "");
    rule(&mut rules, "\u{35c}", "");
    if symbols == SymbolSet::Espeak {
        rule(&mut rules, "_", "");
        rule(&mut rules, "^", "");
    }

    match locale {
        Locale::EnUs | Locale::EnGb => {
            tied(&mut rules, ties, 't', 'ʃ', "ʧ");
            tied(&mut rules, ties, 'd', 'ʒ', "ʤ");
            tied(&mut rules, &tie_marks, 't', 's', "ts");
            tied(&mut rules, &tie_marks, 'd', 'z', "dz");
            tied(&mut rules, ties, 'a', 'ɪ', "I");
            tied(&mut rules, ties, 'a', 'ʊ', "W");
            tied(&mut rules, ties, 'e', 'ɪ', "A");
            tied(&mut rules, ties, 'ɔ', 'ɪ', "Y");
            for (from, to) in [
                ("r", "ɹ"),
                ("x", "k"),
                ("ç", "k"),
                ("ɐ", "ə"),
                ("ɚ", "əɹ"),
                ("ɝ", "ɜɹ"),
                ("ɬ", "l"),
                ("ɫ", "l"),
                ("ʍ", "w"),
                ("ʲ", ""),
                ("ɪ\u{308}", "ᵻ"),
                ("ɨ", "ᵻ"),
                ("o", "ɔ"),
            ] {
                rule(&mut rules, from, to);
            }
            if symbols == SymbolSet::Espeak {
                rule(&mut rules, "e", "A");
                rule(&mut rules, "ʔˌn\u{329}", "tᵊn");
                rule(&mut rules, "ʔn\u{329}", "tᵊn");
                rule(&mut rules, "ʔn", "tᵊn");
                rule(&mut rules, "ʔ", "t");
                tied(&mut rules, &tie_marks, 'ə', 'l', "ᵊl");
            } else {
                rule(&mut rules, "e", "ɛ");
            }
            if locale == Locale::EnUs {
                tied(&mut rules, ties, 'o', 'ʊ', "O");
                tied(&mut rules, ties, 'ə', 'ʊ', "O");
                rule(&mut rules, "ɜːɹ", "ɜɹ");
                rule(&mut rules, "ɜː", "ɜɹ");
                rule(&mut rules, "ɪə", "iə");
            } else {
                tied(&mut rules, ties, 'o', 'ʊ', "Q");
                tied(&mut rules, ties, 'ə', 'ʊ', "Q");
                tied(&mut rules, ties, 'e', 'ə', "ɛː");
                rule(&mut rules, "iə", "ɪə");
            }
        }
        Locale::It => {
            tied(&mut rules, ties, 't', 'ʃ', "ʧ");
            tied(&mut rules, ties, 'd', 'ʒ', "ʤ");
            tied(&mut rules, ties, 't', 's', "ʦ");
            tied(&mut rules, ties, 'd', 'z', "ʣ");
            rule(&mut rules, "ɾ", "r");
            rule(&mut rules, "ɐ", "a");
            rule(&mut rules, "\u{329}", "");
        }
        Locale::De => {
            tied(&mut rules, ties, 't', 's', "ʦ");
            tied(&mut rules, ties, 't', 'ʃ', "ʧ");
            tied(&mut rules, ties, 'd', 'ʒ', "ʤ");
            tied(&mut rules, &tie_marks, 'p', 'f', "pf");
            rule(&mut rules, "ʏ", "y");
            rule(&mut rules, "ɑ", "a");
            rule(&mut rules, "ɜ", "ɛ");
            rule(&mut rules, "ʔ", "");
            rule(&mut rules, "\u{329}", "");
        }
        Locale::Fr => {
            tied(&mut rules, &tie_marks, 't', 'ʃ', "tʃ");
            tied(&mut rules, &tie_marks, 'd', 'ʒ', "dʒ");
            rule(&mut rules, "ɐ", "a");
            rule(&mut rules, "ɜ", "ɛ");
            rule(&mut rules, "ɪ", "i");
            rule(&mut rules, "ʊ", "u");
            rule(&mut rules, "ː", "");
            rule(&mut rules, "\u{329}", "");
        }
    }
    rules
}

/// Substitutions between sibling variants. Keys are never in the locale's
/// own inventory.
fn variant_rules(locale: Locale) -> Vec<(String, String)> {
    let pairs: &[(&str, &str)] = match locale {
        Locale::EnUs => &[("ɾ", "T"), ("Q", "O"), ("a", "æ"), ("ɒ", "ɑ"), ("ː", "")],
        Locale::EnGb => &[
            ("O", "Q"),
            ("æ", "a"),
            ("T", "t"),
            ("ɾ", "t"),
            ("ᵻ", "ɪ"),
            ("ʔ", "t"),
        ],
        Locale::It => &[("ɹ", "r"), ("ɾ", "r")],
        Locale::De | Locale::Fr => &[("r", "ʁ"), ("ɾ", "ʁ"), ("ɹ", "ʁ"), ("ʀ", "ʁ")],
    };
    pairs
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}

/// `n̩` → `ᵊn` for English; elsewhere the syllabic mark is dropped.
fn mark_syllabics(chars: &[char], english: bool) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len() + 1);
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if ch == SYLLABIC {
            i += 1;
            continue;
        }
        if english && !ch.is_whitespace() && chars.get(i + 1) == Some(&SYLLABIC) {
            out.push('ᵊ');
            out.push(ch);
            i += 2;
            continue;
        }
        out.push(ch);
        i += 1;
    }
    out
}

/// Precomposed vowels with a tilde (`õ`, `ã`) back to vowel plus combining
/// tilde, the form the French inventory uses.
fn split_nasals(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    for &ch in chars {
        let decomposed: Vec<char> = std::iter::once(ch).nfd().collect();
        if decomposed.len() > 1 && decomposed.last() == Some(&NASAL) {
            out.extend(decomposed);
        } else {
            out.push(ch);
        }
    }
    out
}

/// Italian long consonants are written doubled in IPA; the target writes one
/// symbol and a length mark. A stop before its own affricate is the long
/// affricate (`ttʃ` → `ʧː`, `tts` → `ʦː`).
fn mark_geminates(chars: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        let ch = chars[i];
        if !ITALIAN_CONSONANTS.contains(ch) {
            out.push(ch);
            i += 1;
            continue;
        }
        // Syllable-onset stress may sit between the two halves.
        let mut next = i + 1;
        while next < chars.len() && is_stress(chars[next]) {
            next += 1;
        }
        let long = match (ch, chars.get(next).copied()) {
            (first, Some(second)) if first == second => Some(second),
            ('t', Some(second @ ('ʦ' | 'ʧ'))) | ('d', Some(second @ ('ʣ' | 'ʤ'))) => {
                Some(second)
            }
            _ => None,
        };
        match long {
            Some(consonant) => {
                out.extend_from_slice(&chars[i + 1..next]);
                out.push(consonant);
                if chars.get(next + 1) != Some(&LONG) {
                    out.push(LONG);
                }
                i = next + 1;
            }
            None => {
                out.push(ch);
                i += 1;
            }
        }
    }
    out
}

fn is_stress(ch: char) -> bool {
    ch == PRIMARY || ch == SECONDARY
}

fn is_nucleus(ch: char) -> bool {
    NUCLEI.contains(ch)
}

fn strongest(current: Option<char>, mark: char) -> Option<char> {
    if current == Some(PRIMARY) || mark == PRIMARY {
        Some(PRIMARY)
    } else {
        Some(SECONDARY)
    }
}

fn place_stress(chars: &[char], notation: StressNotation) -> String {
    chars
        .split(|&ch| ch == ' ')
        .filter(|word| !word.is_empty())
        .map(|word| place_stress_in_word(word, notation))
        .filter(|word| !word.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Re-attach every stress mark to a nucleus; marks with no nucleus to attach
/// to are dropped, and a nucleus keeps only its strongest mark.
fn place_stress_in_word(word: &[char], notation: StressNotation) -> String {
    let mut base: Vec<char> = Vec::with_capacity(word.len());
    let mut marks: Vec<Option<char>> = Vec::with_capacity(word.len());
    let mut pending: Option<char> = None;

    for &ch in word {
        if is_stress(ch) {
            let previous = match notation {
                StressNotation::AfterNucleus => base.iter().rposition(|&c| is_nucleus(c)),
                _ => None,
            };
            match previous {
                Some(idx) => marks[idx] = strongest(marks[idx], ch),
                None => pending = strongest(pending, ch),
            }
            continue;
        }
        base.push(ch);
        marks.push(None);
        if is_nucleus(ch) {
            if let Some(mark) = pending.take() {
                let idx = marks.len() - 1;
                marks[idx] = strongest(marks[idx], mark);
            }
        }
    }

    let mut out = String::with_capacity(word.len() * 2);
    for (ch, mark) in base.into_iter().zip(marks) {
        if let Some(mark) = mark {
            out.push(mark);
        }
        out.push(ch);
    }
    out
}
