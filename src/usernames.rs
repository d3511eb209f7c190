//! Username list parsing
//!
//! One identifier per line. Blank lines and `#` comments are ignored, a
//! leading `@` is stripped, and anything that is not a 5-32 character
//! username is dropped without complaint.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{5,32}$").expect("valid username regex"));

/// Normalise one line. `None` for comments, blanks and invalid tokens.
pub fn parse_line(line: &str) -> Option<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let name = trimmed.strip_prefix('@').unwrap_or(trimmed);
    is_valid_username(name).then(|| name.to_string())
}

pub fn is_valid_username(name: &str) -> bool {
    USERNAME_RE.is_match(name)
}

/// Parse a whole list, keeping first-seen order and dropping repeats.
pub fn parse_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .filter_map(parse_line)
        .filter(|name| seen.insert(name.to_lowercase()))
        .collect()
}

pub fn load_usernames<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)?;
    Ok(parse_list(&content))
}
