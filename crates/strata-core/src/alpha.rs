//! Reversible base-N identifier codec.
//!
//! Encodes a 64-bit identifier into a compact string over a configurable
//! alphabet, most significant digit first, and decodes it back. The codec
//! is how numeric identifiers become URL-friendly slugs.

use crate::{StrataError, StrataResult};

/// The default encoding alphabet (base 62).
pub const DEFAULT_ALPHABET: &str =
    "0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Encodes `value` over `alphabet` by repeated division.
///
/// `0` encodes to the alphabet's first character.
pub fn encode(value: u64, alphabet: &str) -> StrataResult<String> {
    let digits: Vec<char> = alphabet.chars().collect();
    if digits.is_empty() {
        return Err(StrataError::Codec("empty alphabet".to_string()));
    }

    let base = digits.len() as u64;
    let mut out = Vec::new();
    let mut val = value;
    loop {
        out.push(digits[(val % base) as usize]);
        val /= base;
        if val == 0 {
            break;
        }
    }
    Ok(out.into_iter().rev().collect())
}

/// Decodes `text` over `alphabet` as a positional-weighted sum.
///
/// Fails with a codec error when a character is absent from the alphabet
/// or the value overflows 64 bits.
pub fn decode(text: &str, alphabet: &str) -> StrataResult<u64> {
    let digits: Vec<char> = alphabet.chars().collect();
    if digits.is_empty() {
        return Err(StrataError::Codec("empty alphabet".to_string()));
    }

    let base = digits.len() as u64;
    let mut num: u64 = 0;
    for ch in text.chars() {
        let digit = digits
            .iter()
            .position(|&c| c == ch)
            .ok_or_else(|| StrataError::Codec(format!("invalid character {:?}", ch)))?
            as u64;
        num = num
            .checked_mul(base)
            .and_then(|n| n.checked_add(digit))
            .ok_or_else(|| StrataError::Codec("value overflows 64 bits".to_string()))?;
    }
    Ok(num)
}
