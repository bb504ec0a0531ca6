//! Deterministic query fingerprints.
//!
//! A djb2-style hash over the query text, walked from the last UTF-16 code
//! unit to the first. The arithmetic wraps as a 32-bit two's-complement
//! integer so the output matches other implementations bit for bit,
//! including negative values.

/// Starting value of the hash.
const SEED: i32 = 5381;

/// Returns the fingerprint of `text`.
///
/// Equal text always yields an equal fingerprint; distinct text may collide.
pub fn fingerprint(text: &str) -> i32 {
    fingerprint_with_seed(SEED, text)
}

/// Folds `text` into `seed`, last code unit first.
pub fn fingerprint_with_seed(seed: i32, text: &str) -> i32 {
    let units: Vec<u16> = text.encode_utf16().collect();
    units
        .iter()
        .rev()
        .fold(seed, |hash, &unit| hash.wrapping_mul(33) ^ i32::from(unit))
}
