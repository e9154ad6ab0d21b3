//! Access code generation
//!
//! Codes are short, uppercase and drawn from an alphabet without look-alike
//! characters (no `0/O`, `1/I/L`) so they survive being read aloud or retyped.

use rand::{rngs::OsRng, Rng};

/// Characters an access code may contain
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Default code length
pub const DEFAULT_CODE_LENGTH: usize = 8;

/// Shortest code length accepted from configuration
pub const MIN_CODE_LENGTH: usize = 6;

/// Generate a fresh access code of the given length
pub fn generate_access_code(length: usize) -> String {
    let length = length.max(MIN_CODE_LENGTH);
    (0..length)
        .map(|_| {
            let idx = OsRng.gen_range(0..CODE_ALPHABET.len());
            char::from(CODE_ALPHABET[idx])
        })
        .collect()
}

/// Check that a string could have been produced by [`generate_access_code`]
pub fn is_well_formed(code: &str) -> bool {
    code.len() >= MIN_CODE_LENGTH && code.bytes().all(|b| CODE_ALPHABET.contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_code_shape() {
        let code = generate_access_code(DEFAULT_CODE_LENGTH);
        assert_eq!(code.len(), DEFAULT_CODE_LENGTH);
        assert!(is_well_formed(&code));
    }

    #[test]
    fn test_short_lengths_are_clamped() {
        assert_eq!(generate_access_code(2).len(), MIN_CODE_LENGTH);
    }

    #[test]
    fn test_no_ambiguous_characters() {
        for _ in 0..200 {
            let code = generate_access_code(12);
            assert!(!code.contains(['0', 'O', '1', 'I', 'L']));
        }
    }

    #[test]
    fn test_codes_differ() {
        let codes: HashSet<String> = (0..100).map(|_| generate_access_code(8)).collect();
        assert_eq!(codes.len(), 100);
    }

    #[test]
    fn test_lowercase_is_not_well_formed() {
        assert!(!is_well_formed("abcdefgh"));
        assert!(!is_well_formed("ABC"));
    }
}
