//! The closed label set for cryptographic code and the alias rewrite applied
//! to every emitted label.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "hashing")]
    Hashing,
    #[serde(rename = "RSA")]
    Rsa,
    #[serde(rename = "DiffieHellman")]
    DiffieHellman,
    #[serde(rename = "DSA")]
    Dsa,
    #[serde(rename = "ElipticCurves")]
    EllipticCurves,
    #[serde(rename = "ED448")]
    Ed448,
    #[serde(rename = "ED25519")]
    Ed25519,
    #[serde(rename = "AES")]
    Aes,
    #[serde(rename = "Camellia")]
    Camellia,
    #[serde(rename = "ChaCha")]
    ChaCha,
    #[serde(rename = "DES")]
    Des,
    #[serde(rename = "HMAC")]
    Hmac,
    #[serde(rename = "MD5")]
    Md5,
    #[serde(rename = "SHA")]
    Sha,
    #[serde(rename = "NOCRYPTO")]
    NoCrypto,
    #[serde(rename = "USES_AES")]
    UsesAes,
    #[serde(rename = "PASSWORD_PBKDF2_SHA256")]
    PasswordPbkdf2Sha256,
    #[serde(rename = "PASSWORD_BCRYPT")]
    PasswordBcrypt,
}

impl Category {
    /// Declaration order; extraction patterns are built from it, so it matters.
    pub const ALL: [Category; 18] = [
        Category::Hashing,
        Category::Rsa,
        Category::DiffieHellman,
        Category::Dsa,
        Category::EllipticCurves,
        Category::Ed448,
        Category::Ed25519,
        Category::Aes,
        Category::Camellia,
        Category::ChaCha,
        Category::Des,
        Category::Hmac,
        Category::Md5,
        Category::Sha,
        Category::NoCrypto,
        Category::UsesAes,
        Category::PasswordPbkdf2Sha256,
        Category::PasswordBcrypt,
    ];

    /// Labels for code that calls into a primitive rather than implementing it.
    pub const USES: [Category; 3] = [
        Category::UsesAes,
        Category::PasswordPbkdf2Sha256,
        Category::PasswordBcrypt,
    ];

    pub const IMPLEMENTATIONS: [Category; 13] = [
        Category::Rsa,
        Category::DiffieHellman,
        Category::Dsa,
        Category::EllipticCurves,
        Category::Ed448,
        Category::Ed25519,
        Category::Aes,
        Category::Camellia,
        Category::ChaCha,
        Category::Des,
        Category::Hmac,
        Category::Md5,
        Category::Sha,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hashing => "hashing",
            Category::Rsa => "RSA",
            Category::DiffieHellman => "DiffieHellman",
            Category::Dsa => "DSA",
            Category::EllipticCurves => "ElipticCurves",
            Category::Ed448 => "ED448",
            Category::Ed25519 => "ED25519",
            Category::Aes => "AES",
            Category::Camellia => "Camellia",
            Category::ChaCha => "ChaCha",
            Category::Des => "DES",
            Category::Hmac => "HMAC",
            Category::Md5 => "MD5",
            Category::Sha => "SHA",
            Category::NoCrypto => "NOCRYPTO",
            Category::UsesAes => "USES_AES",
            Category::PasswordPbkdf2Sha256 => "PASSWORD_PBKDF2_SHA256",
            Category::PasswordBcrypt => "PASSWORD_BCRYPT",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown category {}", s))
    }
}

/// Upper-case alias some labelers use for the elliptic-curve family.
pub const ELLIPTIC_CURVES_ALIAS: &str = "ELLIPTIC_CURVES";

/// Rewrites known aliases to their canonical spelling. Anything else, including
/// labels outside the taxonomy, is returned unchanged.
pub fn normalize(label: &str) -> &str {
    if label == ELLIPTIC_CURVES_ALIAS {
        Category::EllipticCurves.as_str()
    } else {
        label
    }
}
