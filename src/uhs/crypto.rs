//! Cipher transforms for the UHS format.
//!
//! Three independent substitution ciphers are in play, one per encoding era,
//! and they are never mixed: the keyless 88a cipher, the keyed cipher used by
//! `nesthint` and `incentive` hunks, and the keyed cipher used by `text`
//! hunks. The two keyed variants differ only in what the key byte is XORed
//! with, and that difference must be reproduced exactly.
//!
//! The `encrypt_*` inverses exist so tests can synthesize valid fixture
//! files from plaintext; they are not a file writer.

use log::trace;

/// Derives the decryption key for formats after 88a.
///
/// For title string S: `key[i] = S[i] + (['k','e','y'][i % 3] ^ (i + 40))`,
/// reduced into printable range by repeatedly subtracting 96 while > 127.
/// The title is that of the master subject node, not the filename.
pub fn generate_key(title: &str) -> Vec<i32> {
    trace!("Generating key from {}-char title", title.chars().count());
    let k = [b'k' as i32, b'e' as i32, b'y' as i32];
    title
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let mut v = c as i32 + (k[i % 3] ^ (i as i32 + 40));
            while v > 127 {
                v -= 96;
            }
            v
        })
        .collect()
}

/// Decrypts 88a hint lines and standalone `hint` hunk content.
///
/// Keyless: values below 32 pass through, 32..80 map via `c*2 - 32`,
/// 80 and above map via `c*2 - 127`.
pub fn decrypt_88a(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            let v = c as i32;
            let v = if v < 32 {
                v
            } else if v < 80 {
                v * 2 - 32
            } else {
                v * 2 - 127
            };
            to_char(v)
        })
        .collect()
}

/// Decrypts the content of `nesthint` and `incentive` hunks.
///
/// `c - (key[i % keylen] ^ (i + 40))`, normalized into printable range by
/// adding 96 while below 32. Note the XOR uses the absolute character
/// position, unlike [`decrypt_text`].
pub fn decrypt_nest(input: &str, key: &[i32]) -> String {
    if key.is_empty() {
        return input.to_string();
    }
    input
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let mut v = c as i32 - (key[i % key.len()] ^ (i as i32 + 40));
            while v < 32 {
                v += 96;
            }
            to_char(v)
        })
        .collect()
}

/// Decrypts the content of `text` hunks.
///
/// `c - (key[i % keylen] ^ (i % keylen + 40))`: the XOR uses the key index,
/// not the absolute position. Same normalization as [`decrypt_nest`].
pub fn decrypt_text(input: &str, key: &[i32]) -> String {
    if key.is_empty() {
        return input.to_string();
    }
    input
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let off = (i % key.len()) as i32;
            let mut v = c as i32 - (key[i % key.len()] ^ (off + 40));
            while v < 32 {
                v += 96;
            }
            to_char(v)
        })
        .collect()
}

/// Inverse of [`decrypt_88a`] for plaintext in the printable range.
pub fn encrypt_88a(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            let v = c as i32;
            let v = if v < 32 {
                v
            } else if v % 2 == 0 {
                (v + 32) / 2
            } else {
                (v + 127) / 2
            };
            to_char(v)
        })
        .collect()
}

/// Inverse of [`decrypt_nest`] for plaintext in the printable range.
pub fn encrypt_nest(input: &str, key: &[i32]) -> String {
    if key.is_empty() {
        return input.to_string();
    }
    input
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let mut v = c as i32 + (key[i % key.len()] ^ (i as i32 + 40));
            while v > 127 {
                v -= 96;
            }
            to_char(v)
        })
        .collect()
}

/// Inverse of [`decrypt_text`] for plaintext in the printable range.
pub fn encrypt_text(input: &str, key: &[i32]) -> String {
    if key.is_empty() {
        return input.to_string();
    }
    input
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let off = (i % key.len()) as i32;
            let mut v = c as i32 + (key[i % key.len()] ^ (off + 40));
            while v > 127 {
                v -= 96;
            }
            to_char(v)
        })
        .collect()
}

fn to_char(v: i32) -> char {
    char::from_u32(v as u32).unwrap_or(char::REPLACEMENT_CHARACTER)
}
