use unicode_normalization::UnicodeNormalization;

use super::RuleEngine;
use crate::canonical::{SourceAlphabet, StressNotation};

const VOWELS: &str = "aeiouɛɔ";

/// Rule-based Italian orthography to IPA.
///
/// Italian spelling is close to phonemic, so a handful of context rules cover
/// the language: palatal digraphs (`gn`, `gli`, `sc`), hard `ch`/`gh`, soft
/// `c`/`g` before front vowels, `qu`, silent `h` and doubled consonants
/// (written as a length mark). Accented vowels carry the only stress the
/// spelling records; the mark is written after the vowel.
///
/// Elided articles and prepositions (`l'acqua`, `dell'anno`) are read as one
/// word; the apostrophe is silent. Words containing anything else outside
/// `a–z` and `àèéìíòóùú` are not covered.
#[derive(Debug, Clone, Copy)]
pub struct ItalianRules {
    pub mark_stress: bool,
    pub mark_gemination: bool,
}

impl Default for ItalianRules {
    fn default() -> Self {
        Self {
            mark_stress: true,
            mark_gemination: true,
        }
    }
}

impl RuleEngine for ItalianRules {
    fn name(&self) -> &str {
        "italian-rules"
    }

    fn alphabet(&self) -> SourceAlphabet {
        SourceAlphabet::IPA.with_stress(StressNotation::AfterNucleus)
    }

    fn derive(&self, text: &str) -> Option<String> {
        let mut letters = Vec::with_capacity(text.len());
        let mut stressed = Vec::with_capacity(text.len());
        for ch in text.nfc().flat_map(char::to_lowercase) {
            let (letter, accented) = match ch {
                'a'..='z' => (ch, false),
                'à' => ('a', true),
                'è' => ('ɛ', true),
                'é' => ('e', true),
                'ì' | 'í' => ('i', true),
                'ò' => ('ɔ', true),
                'ó' => ('o', true),
                'ù' | 'ú' => ('u', true),
                '\'' | '\u{2019}' => continue,
                _ => return None,
            };
            letters.push(letter);
            stressed.push(accented);
        }
        if letters.is_empty() {
            return None;
        }
        Some(self.transcribe(&letters, &stressed))
    }
}

impl ItalianRules {
    fn transcribe(&self, letters: &[char], stressed: &[bool]) -> String {
        let mut out = String::with_capacity(letters.len() * 2);
        let mut i = 0;

        while i < letters.len() {
            let rest = &letters[i..];
            let consumed = match rest {
                ['c', 'q', 'u', ..] => {
                    out.push('k');
                    self.geminate(&mut out);
                    out.push('w');
                    3
                }
                // The `h` is consumed as silent on the next step.
                ['c', 'c', 'h', ..] => {
                    out.push('k');
                    self.geminate(&mut out);
                    2
                }
                ['g', 'g', 'h', ..] => {
                    out.push('ɡ');
                    self.geminate(&mut out);
                    2
                }
                ['g', 'n', 'n', ..] => {
                    out.push('ɲ');
                    self.geminate(&mut out);
                    3
                }
                ['g', 'n', ..] => {
                    out.push('ɲ');
                    2
                }
                ['g', 'l', 'i'] => {
                    out.push('ʎ');
                    3
                }
                ['g', 'l', 'i', next, ..] if is_vowel(*next) => {
                    out.push('ʎ');
                    3
                }
                ['s', 'c', front, ..] if is_front(*front) => {
                    out.push('ʃ');
                    2 + self.silent_i(rest, 2, stressed, i)
                }
                ['s', 'c', ..] => {
                    out.push_str("sk");
                    2
                }
                ['c', 'h', ..] | ['g', 'h', ..] => {
                    out.push(if rest[0] == 'c' { 'k' } else { 'ɡ' });
                    2
                }
                [c @ ('c' | 'g'), second, front, ..] if second == c && is_front(*front) => {
                    out.push(palatal(*c));
                    self.geminate(&mut out);
                    2 + self.silent_i(rest, 2, stressed, i)
                }
                [c @ ('c' | 'g'), front, ..] if is_front(*front) => {
                    out.push(palatal(*c));
                    1 + self.silent_i(rest, 1, stressed, i)
                }
                [c @ ('c' | 'g'), second, ..] if second == c => {
                    out.push(velar(*c));
                    self.geminate(&mut out);
                    2
                }
                ['c' | 'g' | 'k', ..] => {
                    out.push(velar(rest[0]));
                    1
                }
                ['q', 'u', ..] => {
                    out.push_str("kw");
                    2
                }
                ['q', ..] => {
                    out.push('k');
                    1
                }
                ['z', 'z', ..] => {
                    out.push('ʦ');
                    self.geminate(&mut out);
                    2
                }
                ['z', ..] => {
                    out.push('ʦ');
                    1
                }
                ['h', ..] => 0,
                ['x', ..] => {
                    out.push_str("ks");
                    1
                }
                ['y', ..] => {
                    out.push('i');
                    1
                }
                [vowel, ..] if is_vowel(*vowel) => {
                    out.push(*vowel);
                    if self.mark_stress && stressed[i] {
                        out.push('ˈ');
                    }
                    1
                }
                [consonant, second, ..] if second == consonant => {
                    out.push(*consonant);
                    self.geminate(&mut out);
                    2
                }
                [consonant, ..] => {
                    out.push(*consonant);
                    1
                }
                [] => break,
            };
            // Silent `h` consumes itself without output.
            i += consumed.max(1);
        }

        out
    }

    fn geminate(&self, out: &mut String) {
        if self.mark_gemination {
            out.push('ː');
        }
    }

    /// An unstressed `i` between a palatal and another vowel only marks the
    /// palatal (`ciao`, `giorno`, `sciame`): returns 1 if it should be skipped.
    fn silent_i(&self, rest: &[char], offset: usize, stressed: &[bool], start: usize) -> usize {
        match (rest.get(offset), rest.get(offset + 1)) {
            (Some('i'), Some(&next)) if is_vowel(next) && !stressed[start + offset] => 1,
            _ => 0,
        }
    }
}

fn is_vowel(ch: char) -> bool {
    VOWELS.contains(ch)
}

fn is_front(ch: char) -> bool {
    matches!(ch, 'e' | 'i' | 'ɛ')
}

fn palatal(ch: char) -> char {
    if ch == 'c' {
        'ʧ'
    } else {
        'ʤ'
    }
}

fn velar(ch: char) -> char {
    if ch == 'g' {
        'ɡ'
    } else {
        'k'
    }
}
