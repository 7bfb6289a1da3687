//! URL slugs for tags and arc titles.
//!
//! Slugs are used as directory names (`/{story}/{lang}/tags/{slug}/`) and as
//! file name components (`{story}-{arc-slug}.epub`), so they must be
//! deterministic, non-empty, and free of filesystem-unsafe characters.
//!
//! - `"Main Plot"` → `main-plot`
//! - `"Ｆｕｌｌｗｉｄｔｈ"` → `fullwidth` (compatibility decomposition)
//! - `"what/if?"` → `what-if`
//! - `"???"` or `".."` → first 8 hex chars of SHA-256 of the original text

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

/// Characters that can't appear in file names on common filesystems.
const UNSAFE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Length of the hash fallback for tags that normalize to nothing.
const HASH_SLUG_LEN: usize = 8;

/// Slug for a tag or title.
pub fn slugify(text: &str) -> String {
    let normalized: String = text.trim().to_lowercase().nfkd().collect();

    let mut slug = String::with_capacity(normalized.len());
    let mut prev_dash = false;
    for c in normalized.chars() {
        if c.is_whitespace() || c == '-' || UNSAFE_CHARS.contains(&c) {
            if !prev_dash {
                slug.push('-');
            }
            prev_dash = true;
        } else {
            slug.push(c);
            prev_dash = false;
        }
    }

    let trimmed = slug.trim_matches('-');
    // "." and ".." would name the parent or current directory
    if trimmed.chars().all(|c| c == '.') {
        hash_prefix(text.as_bytes(), HASH_SLUG_LEN)
    } else {
        trimmed.to_string()
    }
}

/// First `len` hex characters of the SHA-256 of `bytes`.
pub fn hash_prefix(bytes: &[u8], len: usize) -> String {
    let digest = format!("{:x}", Sha256::digest(bytes));
    digest[..len.min(digest.len())].to_string()
}
