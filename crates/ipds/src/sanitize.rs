//! Helpers for sanitizing identifiers before they enter filesystem names.
//!
//! UUT serials and operator ids come from external systems and may carry
//! separators or other path-hostile characters. Export filenames keep
//! only alphanumerics, hyphens and underscores.

/// Strips every character that is not alphanumeric, `-` or `_`.
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}
