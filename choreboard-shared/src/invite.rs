/// Invite code generation
///
/// Codes are drawn uniformly from the uppercase alphanumeric alphabet
/// `[0-9A-Z]`. At the default length of 8 that is a 36^8 space, so
/// collisions with existing codes are handled by a retry on the unique
/// constraint rather than a pre-check.

use rand::Rng;

/// Alphabet for invite codes
const CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generates a random invite code of the given length
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::thread_rng();

    (0..length)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Normalizes a user-supplied code for lookup: trims whitespace and
/// uppercases, so codes are case-insensitive on entry.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
