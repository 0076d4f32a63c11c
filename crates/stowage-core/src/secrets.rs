//! Random secret generation
//!
//! Values are generated once per render (or once per provisioned secret) and
//! never regenerated by individual producers.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Character sets for secret generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecretCharset {
    /// a-zA-Z0-9 (default)
    #[default]
    Alphanumeric,
    /// a-zA-Z0-9 plus `_-.`, safe inside cookie values
    CookieSafe,
    /// 0-9a-f
    Hex,
}

impl SecretCharset {
    /// Get the character set as bytes
    pub const fn chars(&self) -> &'static [u8] {
        match self {
            Self::Alphanumeric => b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789",
            Self::CookieSafe => {
                b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz_-."
            }
            Self::Hex => b"0123456789abcdef",
        }
    }
}

/// Generate `length` characters drawn from `charset`
pub fn random_string<R: Rng + ?Sized>(rng: &mut R, length: usize, charset: SecretCharset) -> String {
    let chars = charset.chars();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..chars.len());
            chars[idx] as char
        })
        .collect()
}
