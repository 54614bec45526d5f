//! Slug and invite-code generation.

use rand::Rng;

const SLUG_MAX_LEN: usize = 50;
const SUFFIX_CHARS: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const INVITE_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const INVITE_PREFIX: &str = "INV-";
const INVITE_SUFFIX_LEN: usize = 8;

/// Normalize a group name to a URL-safe slug: lowercase, non-alphanumeric
/// runs collapsed to single hyphens, trimmed, truncated to 50 characters.
/// Falls back to "group" when nothing survives.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut pending_hyphen = false;

    for c in input.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
        if out.len() >= SLUG_MAX_LEN {
            break;
        }
    }

    out.truncate(SLUG_MAX_LEN);
    if out.is_empty() {
        "group".to_string()
    } else {
        out
    }
}

/// Random lowercase-alphanumeric suffix used to disambiguate slug collisions.
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| SUFFIX_CHARS[rng.random_range(0..SUFFIX_CHARS.len())] as char)
        .collect()
}

/// Opaque invite code: fixed prefix plus random uppercase alphanumerics.
pub fn generate_invite_code() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..INVITE_SUFFIX_LEN)
        .map(|_| INVITE_CHARS[rng.random_range(0..INVITE_CHARS.len())] as char)
        .collect();
    format!("{INVITE_PREFIX}{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes_names() {
        assert_eq!(slugify("Test Group"), "test-group");
        assert_eq!(slugify("  Rust & Friends!!  "), "rust-friends");
        assert_eq!(slugify("already-a-slug"), "already-a-slug");
    }

    #[test]
    fn slugify_truncates_to_fifty_chars() {
        let long = "x".repeat(120);
        assert_eq!(slugify(&long).len(), 50);
    }

    #[test]
    fn slugify_falls_back_for_empty_input() {
        assert_eq!(slugify(""), "group");
        assert_eq!(slugify("!!! ???"), "group");
    }

    #[test]
    fn random_suffix_has_requested_length_and_charset() {
        let s = random_suffix(3);
        assert_eq!(s.len(), 3);
        assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn invite_codes_carry_the_prefix() {
        let code = generate_invite_code();
        assert!(code.starts_with("INV-"));
        assert_eq!(code.len(), 4 + 8);
    }
}
