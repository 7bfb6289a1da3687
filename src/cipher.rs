//! Password obfuscation for protected chapters.
//!
//! This is a convenience lock, not encryption: anyone with the page source and
//! some patience can recover the text. The layout is fixed because the browser
//! side (`static/unlock.js`) reproduces it:
//!
//! - key = SHA-256(password), 32 bytes
//! - ciphertext = base64(html XOR key repeated cyclically)
//! - verification = first 16 hex chars of SHA-256(password)
//!
//! The browser hashes the typed password, compares it with the verification
//! value, and only then decodes.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Hex characters of the verification hash.
pub const VERIFICATION_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decrypted content is not UTF-8 (wrong password?)")]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn key(password: &str) -> [u8; 32] {
    Sha256::digest(password.as_bytes()).into()
}

fn xor_with_key(data: &[u8], key: &[u8; 32]) -> Vec<u8> {
    data.iter()
        .zip(key.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

/// Obfuscate chapter HTML with a password.
pub fn encrypt(html: &str, password: &str) -> String {
    STANDARD.encode(xor_with_key(html.as_bytes(), &key(password)))
}

/// Reverse [`encrypt`].
pub fn decrypt(ciphertext: &str, password: &str) -> Result<String, CipherError> {
    let bytes = STANDARD.decode(ciphertext.trim())?;
    Ok(String::from_utf8(xor_with_key(&bytes, &key(password)))?)
}

/// Value the browser compares a typed password against.
pub fn verification_hash(password: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(password.as_bytes()));
    digest[..VERIFICATION_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = "<h1>Chapter 4</h1>\n<p>Ünïcödé and <em>markup</em> survive.</p>";

    #[test]
    fn round_trip() {
        let ct = encrypt(HTML, "open sesame");
        assert_ne!(ct, HTML);
        assert_eq!(decrypt(&ct, "open sesame").unwrap(), HTML);
    }

    #[test]
    fn deterministic() {
        assert_eq!(encrypt(HTML, "pw"), encrypt(HTML, "pw"));
        assert_ne!(encrypt(HTML, "pw"), encrypt(HTML, "other"));
    }

    #[test]
    fn empty_content() {
        assert_eq!(encrypt("", "pw"), "");
        assert_eq!(decrypt("", "pw").unwrap(), "");
    }

    #[test]
    fn content_longer_than_key_cycles() {
        let long = "x".repeat(100);
        let ct = STANDARD.decode(encrypt(&long, "pw")).unwrap();
        let k = key("pw");
        assert_eq!(ct[0], ct[32]);
        assert_eq!(ct[5], b'x' ^ k[5]);
    }

    #[test]
    fn verification_hash_shape() {
        let h = verification_hash("secret");
        assert_eq!(h.len(), VERIFICATION_LEN);
        assert_eq!(h, verification_hash("secret"));
        assert_ne!(h, verification_hash("Secret"));
        // SHA-256("hello") = 2cf24dba5fb0a30e...
        assert_eq!(verification_hash("hello"), "2cf24dba5fb0a30e");
    }

    #[test]
    fn invalid_base64_is_error() {
        assert!(matches!(decrypt("%%%", "pw"), Err(CipherError::Base64(_))));
    }
}
