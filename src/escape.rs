//! Single-quote escaping for SQL string literals built as text.
//!
//! Only `'` is handled. Backslashes and NUL bytes pass through untouched, so
//! this is only safe for clients that treat `''` as the sole escape inside a
//! standard-conforming literal (PostgreSQL with `standard_conforming_strings`).

/// Double every single quote: `It's` -> `It''s`.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}

/// Inverse of [`escape_literal`].
pub fn unescape_literal(value: &str) -> String {
    value.replace("''", "'")
}

/// Escape and wrap in single quotes, ready to splice into a statement.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", escape_literal(value))
}
