//! Output sanitization: terminal escape stripping and prompt trimming.

use vte::{Parser, Perform};

/// Collects printable text, dropping every control and escape sequence
/// except line feeds and tabs.
struct Printable {
    text: String,
}

impl Perform for Printable {
    fn print(&mut self, c: char) {
        self.text.push(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.text.push('\n'),
            b'\t' => self.text.push('\t'),
            _ => {}
        }
    }
}

/// Strip ANSI/VT escape sequences and control characters from raw output.
///
/// Carriage returns are dropped, so `\r\n` line endings come out as `\n`.
pub fn strip_escapes(raw: &[u8]) -> String {
    let mut performer = Printable {
        text: String::with_capacity(raw.len()),
    };
    let mut parser = Parser::new();
    parser.advance(&mut performer, raw);
    performer.text
}

/// Sanitize raw command output.
///
/// Strips escape sequences, then truncates after the last complete line.
/// Whatever follows the final line feed is the freshly drawn prompt and is
/// discarded.
pub fn sanitize(raw: &[u8]) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let mut text = strip_escapes(raw);
    match text.rfind('\n') {
        Some(idx) => {
            text.truncate(idx + 1);
            text
        }
        None => String::new(),
    }
}

/// Remove the device's echo of `command` and the line break after it.
pub fn strip_echo<'a>(output: &'a str, command: &str) -> &'a str {
    match output.strip_prefix(command) {
        Some(rest) => rest.strip_prefix('\n').unwrap_or(rest),
        None => output,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_escapes() {
        assert_eq!(strip_escapes(b"\x1b[32mGreen text\x1b[0m"), "Green text");
        assert_eq!(strip_escapes(b"a\r\nb\r\n"), "a\nb\n");
        assert_eq!(strip_escapes(b"\x1b[?25h\x1b[24;1Hswitch# "), "switch# ");
    }

    #[test]
    fn test_sanitize_drops_trailing_prompt() {
        let raw = b"show time\r\nMon Jan  1 00:00:00 1990\r\nswitch# \x1b[24;1H\x1b[24;9H";
        assert_eq!(sanitize(raw), "show time\nMon Jan  1 00:00:00 1990\n");
    }

    #[test]
    fn test_sanitize_without_complete_line() {
        assert_eq!(sanitize(b""), "");
        assert_eq!(sanitize(b"switch# \x1b[24;1H"), "");
    }

    #[test]
    fn test_strip_echo() {
        assert_eq!(strip_echo("no page\nInvalid input: page\n", "no page"), "Invalid input: page\n");
        assert_eq!(strip_echo("unrelated\n", "no page"), "unrelated\n");
        assert_eq!(strip_echo("show ver", "show ver"), "");
    }
}
