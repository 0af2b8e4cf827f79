//! Small shared helpers.

use sha2::{Digest, Sha256};

/// Stable short hash used to mangle nested-function and generic-variation
/// names into target file names.
pub fn hash_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..12].to_string()
}

/// Strips characters the target's resource-location grammar rejects.
/// Alphanumerics, `_` and `.` pass through; `-` maps to `_`.
pub fn sanitize_path_component(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
            output.push(ch);
        } else if ch == '-' {
            output.push('_');
        }
    }
    output
}
