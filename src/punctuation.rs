//! Punctuation normalization and a simple tokenizer.

use std::fmt;

use crate::vocab::PUNCTUATION;
use crate::Token;

/// Maps punctuation text onto the marks the synthesizer accepts.
pub trait PunctuationNormalizer: Send + Sync {
    fn normalize(&self, text: &str) -> String;
}

impl fmt::Debug for dyn PunctuationNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PunctuationNormalizer")
    }
}

/// [`normalize_punctuation`] as a [`PunctuationNormalizer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct KokoroPunctuation;

impl PunctuationNormalizer for KokoroPunctuation {
    fn normalize(&self, text: &str) -> String {
        normalize_punctuation(text)
    }
}

/// Multi-character sequences folded to an ellipsis, longest first.
const ELLIPSES: &[&str] = &["...", "．．．", "・・・", ".."];

fn map_mark(ch: char) -> Option<&'static str> {
    let mapped = match ch {
        '–' | '−' | '―' | '⸺' | '⸻' => "—",
        '\'' | '\u{2018}' | '\u{2019}' | '‚' | '‛' | '„' | '‟' | '«' | '»' | '‹' | '›' | '「'
        | '」' | '『' | '』' | '《' | '》' => "\"",
        '；' => ";",
        '：' | '︰' => ":",
        '，' | '、' => ",",
        '．' | '。' | '｡' => ".",
        '！' | '¡' => "!",
        '？' | '¿' | '⸮' => "?",
        '⁉' | '⁈' => "?!",
        '‼' => "!!",
        '［' | '【' | '〔' | '〈' | '｛' | '（' | '[' | '{' => "(",
        '］' | '】' | '〕' | '〉' | '｝' | '）' | ']' | '}' => ")",
        _ => return None,
    };
    Some(mapped)
}

/// Fold Unicode punctuation onto the Kokoro marks `; : , . ! ? — … " ( ) “ ”`.
///
/// Ellipses written as dots become `…`, look-alike marks are mapped, and any
/// other symbol is removed. Letters, digits and whitespace are kept.
pub fn normalize_punctuation(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(ch) = rest.chars().next() {
        if let Some(ellipsis) = ELLIPSES.iter().find(|e| rest.starts_with(**e)) {
            out.push('…');
            rest = &rest[ellipsis.len()..];
            continue;
        }
        match map_mark(ch) {
            Some(mapped) => out.push_str(mapped),
            None if ch.is_alphanumeric() || ch.is_whitespace() || PUNCTUATION.contains(ch) => {
                out.push(ch)
            }
            None => {}
        }
        rest = &rest[ch.len_utf8()..];
    }

    out
}

/// Split text into word and punctuation tokens.
///
/// Contractions (`don't`) and digit groups (`2.0`, `1,000`) stay in one
/// token; each run of punctuation is one token. Whitespace is attached to
/// the preceding token and leading whitespace is dropped. Typographic
/// apostrophes are normalized to `'`.
pub fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<char> = text
        .chars()
        .map(|ch| match ch {
            '\u{2019}' | '\u{2018}' | '\u{02bc}' => '\'',
            other => other,
        })
        .collect();

    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let start = i;
        let ch = chars[i];

        if ch.is_whitespace() {
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            if let Some(last) = tokens.last_mut() {
                last.whitespace.extend(&chars[start..i]);
            }
            continue;
        }

        if ch.is_alphanumeric() {
            loop {
                while i < chars.len() && chars[i].is_alphanumeric() {
                    i += 1;
                }
                if is_word_connector(&chars, i) {
                    i += 1;
                    continue;
                }
                break;
            }
        } else {
            while i < chars.len() && !chars[i].is_whitespace() && !chars[i].is_alphanumeric() {
                i += 1;
            }
        }

        tokens.push(Token::new(chars[start..i].iter().collect::<String>()));
    }

    tokens
}

/// An apostrophe between letters, or `.`/`,` between digits.
fn is_word_connector(chars: &[char], idx: usize) -> bool {
    let (Some(&ch), Some(&prev), Some(&next)) = (
        chars.get(idx),
        idx.checked_sub(1).and_then(|p| chars.get(p)),
        chars.get(idx + 1),
    ) else {
        return false;
    };
    match ch {
        '\'' => prev.is_alphanumeric() && next.is_alphanumeric(),
        '.' | ',' => prev.is_ascii_digit() && next.is_ascii_digit(),
        _ => false,
    }
}
