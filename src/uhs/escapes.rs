//! Inline markup expansion for decrypted string content.
//!
//! Escapes have existed since 88a in most nodes' content and titles. The
//! `#` character is the main escape char and is itself written `##`.
//!
//! - `#a+XY#a-` — accented letter; `:` diaeresis, `'` acute, `` ` `` grave,
//!   `^` circumflex, `~` tilde, plus `ae` and `TM`.
//! - `#w+` / `#w.` — raw newlines render as spaces (the default).
//! - `#w-` — raw newlines render as newlines.
//! - `^break^` — a soft line break, expanded per the current whitespace mode.
//!
//! `#p+` / `#p-` (proportional font toggles) are a presentation concern and
//! pass through unexpanded. Unknown accent pairs are reported at Info
//! severity and copied through verbatim.

use crate::uhs::report::{DiagnosticSink, Severity};

const BREAK_TOKEN: [char; 7] = ['^', 'b', 'r', 'e', 'a', 'k', '^'];

/// Expands UHS escapes in `input`, reporting unknown accents to `sink`
/// against physical line `line`.
pub fn expand_escapes(input: &str, sink: &dyn DiagnosticSink, line: usize) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut break_str = " ";

    let mut c = 0;
    while c < chars.len() {
        if chars[c] == '#' && chars.get(c + 1) == Some(&'#') {
            out.push('#');
            c += 2;
            continue;
        }
        if chars[c] == '#' {
            if c + 7 < chars.len()
                && chars[c + 1] == 'a'
                && chars[c + 2] == '+'
                && chars[c + 5] == '#'
                && chars[c + 6] == 'a'
                && chars[c + 7] == '-'
            {
                let letter = chars[c + 3];
                let mark = chars[c + 4];
                if let Some(accented) = accent_char(letter, mark) {
                    out.push(accented);
                    c += 8;
                    continue;
                }
                sink.report(
                    Severity::Info,
                    "escapes",
                    &format!("Unknown accent: {}{}", letter, mark),
                    line,
                    None,
                );
            }
            if c + 2 < chars.len() && chars[c + 1] == 'w' {
                match chars[c + 2] {
                    '+' | '.' => {
                        break_str = " ";
                        c += 3;
                        continue;
                    }
                    '-' => {
                        break_str = "\n";
                        c += 3;
                        continue;
                    }
                    _ => {}
                }
            }
        }
        if c + 6 < chars.len() && chars[c..c + 7] == BREAK_TOKEN {
            out.push_str(break_str);
            c += 7;
            continue;
        }
        out.push(chars[c]);
        c += 1;
    }

    out
}

/// Maps a `#a+XY#a-` letter/diacritic pair to its Unicode character.
fn accent_char(letter: char, mark: char) -> Option<char> {
    let accented = match (letter, mark) {
        ('A', ':') => 'Ä',
        ('E', ':') => 'Ë',
        ('I', ':') => 'Ï',
        ('O', ':') => 'Ö',
        ('U', ':') => 'Ü',
        ('a', ':') => 'ä',
        ('e', ':') => 'ë',
        ('i', ':') => 'ï',
        ('o', ':') => 'ö',
        ('u', ':') => 'ü',
        ('A', '\'') => 'Á',
        ('E', '\'') => 'É',
        ('I', '\'') => 'Í',
        ('O', '\'') => 'Ó',
        ('U', '\'') => 'Ú',
        ('a', '\'') => 'á',
        ('e', '\'') => 'é',
        ('i', '\'') => 'í',
        ('o', '\'') => 'ó',
        ('u', '\'') => 'ú',
        ('A', '`') => 'À',
        ('E', '`') => 'È',
        ('I', '`') => 'Ì',
        ('O', '`') => 'Ò',
        ('U', '`') => 'Ù',
        ('a', '`') => 'à',
        ('e', '`') => 'è',
        ('i', '`') => 'ì',
        ('o', '`') => 'ò',
        ('u', '`') => 'ù',
        ('A', '^') => 'Â',
        ('E', '^') => 'Ê',
        ('I', '^') => 'Î',
        ('O', '^') => 'Ô',
        ('U', '^') => 'Û',
        ('a', '^') => 'â',
        ('e', '^') => 'ê',
        ('i', '^') => 'î',
        ('o', '^') => 'ô',
        ('u', '^') => 'û',
        ('N', '~') => 'Ñ',
        ('n', '~') => 'ñ',
        ('a', 'e') => 'æ',
        ('T', 'M') => '™',
        _ => return None,
    };
    Some(accented)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uhs::report::NullSink;

    fn expand(input: &str) -> String {
        expand_escapes(input, &NullSink, 0)
    }

    #[test]
    fn double_hash_is_literal() {
        assert_eq!(expand("##"), "#");
        assert_eq!(expand("a##b"), "a#b");
    }

    #[test]
    fn accents() {
        assert_eq!(expand("#a+A:#a-"), "Ä");
        assert_eq!(expand("#a+e'#a-"), "é");
        assert_eq!(expand("#a+n~#a-"), "ñ");
        assert_eq!(expand("#a+ae#a-"), "æ");
        assert_eq!(expand("#a+TM#a-"), "™");
    }

    #[test]
    fn unknown_accent_passes_through() {
        assert_eq!(expand("#a+x%#a-"), "#a+x%#a-");
    }

    #[test]
    fn break_token_follows_whitespace_mode() {
        assert_eq!(expand("one^break^two"), "one two");
        assert_eq!(expand("#w-one^break^two"), "one\ntwo");
        assert_eq!(expand("#w-a^break^b#w+c^break^d"), "a\nbc d");
        assert_eq!(expand("#w.a^break^b"), "a b");
    }

    #[test]
    fn font_toggles_left_alone() {
        assert_eq!(expand("#p+fixed#p-"), "#p+fixed#p-");
    }
}
