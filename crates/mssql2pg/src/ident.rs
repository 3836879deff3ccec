//! Identifier normalization for destination-safe names.
//!
//! Both the DDL generator and the batch copier derive destination column
//! names through [`normalize_ident`]. The function is pure, so the two
//! call sites always agree on the final name.

/// Normalize a raw source identifier into a destination-safe one.
///
/// - lowercases everything
/// - collapses each run of non-alphanumeric characters to a single `_`
/// - prefixes a `_` when the result would start with a digit
///
/// The transformation is idempotent: applying it twice yields the same
/// result as applying it once. Quoting for SQL text is the caller's job.
pub fn normalize_ident(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut in_separator = false;

    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            in_separator = false;
        } else if !in_separator {
            out.push('_');
            in_separator = true;
        }
    }

    if out.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        out.insert(0, '_');
    }

    out
}
