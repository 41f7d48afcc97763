use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::escape::unescape_literal;

/// Metadata pulled from one post module. Values are raw, not escaped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub title: String,
    pub category: String,
    pub filename: String,
}

/// A file that could not be read or decoded.
#[derive(Debug, Clone, Serialize)]
pub struct ReadFailure {
    pub filename: String,
    pub message: String,
}

/// Outcome of the extraction pass, in processing order.
#[derive(Debug, Default)]
pub struct Extraction {
    pub records: Vec<PostRecord>,
    /// Files that were read but lacked a `title` or `category` literal.
    pub skipped: Vec<String>,
    pub failures: Vec<ReadFailure>,
}

// A literal closes on the quote that opened it. A doubled delimiter inside
// the body (`'It''s'`) stands for one literal quote.
fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"title:\s*(?:'((?:[^'\n]|'')+)'|"((?:[^"\n]|"")+)")"#).unwrap()
    })
}

fn category_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"category:\s*(?:'((?:[^'\n]|'')+)'|"((?:[^"\n]|"")+)")"#).unwrap()
    })
}

/// First quoted literal after the key, with doubled delimiters collapsed.
fn first_literal(re: &Regex, content: &str) -> Option<String> {
    let caps = re.captures(content)?;
    if let Some(m) = caps.get(1) {
        return Some(unescape_literal(m.as_str()));
    }
    caps.get(2).map(|m| m.as_str().replace("\"\"", "\""))
}

/// Pull `(title, category)` out of a post module's source text.
///
/// Both keys must be present; only the first occurrence of each counts.
pub fn extract_fields(content: &str) -> Option<(String, String)> {
    let title = first_literal(title_re(), content)?;
    let category = first_literal(category_re(), content)?;
    Some((title, category))
}

/// Read `dir/filename` and extract its record. `Ok(None)` means a pattern miss.
pub fn extract_post(dir: &Path, filename: &str) -> Result<Option<PostRecord>> {
    let path = dir.join(filename);
    let content =
        fs::read_to_string(&path).with_context(|| format!("Failed to read {:?}", path))?;

    Ok(extract_fields(&content).map(|(title, category)| PostRecord {
        title,
        category,
        filename: filename.to_string(),
    }))
}

/// Run [`extract_post`] over `filenames` in order, collecting every outcome.
pub fn extract_posts(dir: &Path, filenames: &[String]) -> Extraction {
    let mut out = Extraction::default();

    for filename in filenames {
        match extract_post(dir, filename) {
            Ok(Some(record)) => {
                debug!(file = %filename, title = %record.title, category = %record.category, "extracted");
                out.records.push(record);
            }
            Ok(None) => {
                warn!("Skipping {}: no title/category literal", filename);
                out.skipped.push(filename.clone());
            }
            Err(e) => {
                let message = format!("{:#}", e);
                debug!("Read failed for {}: {}", filename, message);
                out.failures.push(ReadFailure {
                    filename: filename.clone(),
                    message,
                });
            }
        }
    }

    out
}
