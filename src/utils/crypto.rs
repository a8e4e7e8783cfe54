use subtle::ConstantTimeEq;

/// Constant-time string comparison for shared secrets such as quiz keys.
pub fn keys_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}
