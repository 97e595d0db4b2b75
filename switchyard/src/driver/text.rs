//! Helpers for line- and key/value-shaped device output.

use std::borrow::Borrow;

use crate::error::DriverError;

/// Drop empty lines from both ends of `lines`.
pub fn trim_empty_lines<'a, 'b>(lines: &'b [&'a str]) -> &'b [&'a str] {
    let start = lines
        .iter()
        .position(|line| !line.is_empty())
        .unwrap_or(lines.len());
    let end = lines
        .iter()
        .rposition(|line| !line.is_empty())
        .map_or(start, |idx| idx + 1);
    &lines[start..end]
}

/// Split on `\n` or `\r\n`, dropping leading and trailing empty lines.
pub fn split_lines(text: &str) -> Vec<&str> {
    let lines: Vec<&str> = text.lines().collect();
    trim_empty_lines(&lines).to_vec()
}

pub fn join_lines<S: Borrow<str>>(lines: &[S]) -> String {
    lines.join("\n")
}

/// `"51,234,816"` → `"51234816"`.
pub fn remove_commas(text: &str) -> String {
    text.replace(',', "")
}

/// Parse a counter that may use comma digit grouping.
pub fn parse_count(text: &str) -> Result<u64, DriverError> {
    remove_commas(text.trim())
        .parse()
        .map_err(|_| DriverError::protocol("invalid number", text))
}

/// Split `key <sep> value`, requiring exactly one separator.
///
/// Both halves are trimmed.
pub fn parse_key_value<'a>(line: &'a str, sep: &str) -> Result<(&'a str, &'a str), DriverError> {
    if line.matches(sep).count() != 1 {
        return Err(DriverError::protocol("invalid key/value output", line));
    }
    match line.split_once(sep) {
        Some((key, value)) => Ok((key.trim(), value.trim())),
        None => Err(DriverError::protocol("invalid key/value output", line)),
    }
}
