//! Pattern matching utilities for prompt and response detection.

use std::fmt;

use memchr::memmem;
use regex::bytes::Regex;

/// An immutable matcher over stream text, identified by a tag.
///
/// Patterns are pure values and can be shared freely between sessions.
#[derive(Clone)]
pub struct Pattern {
    tag: String,
    kind: PatternKind,
}

#[derive(Clone)]
enum PatternKind {
    Regex(Regex),
    Literal(Vec<u8>),
}

impl Pattern {
    /// Compile a regular expression pattern.
    pub fn regex(tag: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            tag: tag.into(),
            kind: PatternKind::Regex(Regex::new(pattern)?),
        })
    }

    /// Create a pattern that matches `text` verbatim.
    pub fn literal(tag: impl Into<String>, text: impl AsRef<[u8]>) -> Self {
        Self {
            tag: tag.into(),
            kind: PatternKind::Literal(text.as_ref().to_vec()),
        }
    }

    /// Compile a prompt pattern, anchoring it to the end of the buffer
    /// when it carries no anchor of its own.
    pub fn prompt(tag: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            tag: tag.into(),
            kind: PatternKind::Regex(compile_prompt_pattern(pattern)?),
        })
    }

    /// Pattern matching the device's echo of `command`, up to and including
    /// the line ending.
    ///
    /// Tolerates trailing blanks and any number of carriage returns before
    /// the newline.
    pub fn echo(command: &str) -> Self {
        let source = format!(r"{}[ \t]*\r*\n", regex::escape(command));
        Self {
            tag: "echo".to_string(),
            // Very long commands can exceed the regex size limit. The literal
            // stops short of the line ending, which `output::clean` trims.
            kind: match Regex::new(&source) {
                Ok(re) => PatternKind::Regex(re),
                Err(_) => PatternKind::Literal(command.as_bytes().to_vec()),
            },
        }
    }

    /// The identifying tag.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// The pattern source (regex source or the literal text).
    pub fn as_str(&self) -> std::borrow::Cow<'_, str> {
        match &self.kind {
            PatternKind::Regex(re) => re.as_str().into(),
            PatternKind::Literal(text) => String::from_utf8_lossy(text),
        }
    }

    /// Find the leftmost match in `haystack`, as a `(start, end)` byte span.
    pub fn find(&self, haystack: &[u8]) -> Option<(usize, usize)> {
        match &self.kind {
            PatternKind::Regex(re) => re.find(haystack).map(|m| (m.start(), m.end())),
            PatternKind::Literal(text) => {
                memmem::find(haystack, text).map(|start| (start, start + text.len()))
            }
        }
    }

    /// Check if the pattern matches anywhere in `haystack`.
    pub fn is_match(&self, haystack: &[u8]) -> bool {
        self.find(haystack).is_some()
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            PatternKind::Regex(_) => "regex",
            PatternKind::Literal(_) => "literal",
        };
        f.debug_struct("Pattern")
            .field("tag", &self.tag)
            .field(kind, &self.as_str())
            .finish()
    }
}

/// Location of a match found by [`find_earliest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    /// Position of the matching pattern in the candidate list.
    pub index: usize,
    /// Byte offset where the match starts.
    pub start: usize,
    /// Byte offset where the match ends.
    pub end: usize,
}

/// Find the earliest match of any pattern in `haystack`.
///
/// The match with the lowest start offset wins; on a tie the pattern listed
/// first wins.
pub fn find_earliest<'a, I>(haystack: &[u8], patterns: I) -> Option<MatchSpan>
where
    I: IntoIterator<Item = &'a Pattern>,
{
    let mut best: Option<MatchSpan> = None;

    for (index, pattern) in patterns.into_iter().enumerate() {
        if let Some((start, end)) = pattern.find(haystack) {
            match best {
                Some(current) if start >= current.start => {}
                _ => best = Some(MatchSpan { index, start, end }),
            }
        }
    }

    best
}

/// Compile a prompt pattern string into a regex.
///
/// Anchors to the end of the buffer if no anchor is specified, allowing
/// trailing whitespace after the prompt.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("{}\\s*$", pattern)
    };

    Regex::new(&pattern)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regex_and_literal_find() {
        let re = Pattern::regex("prompt", r"router#\s*$").unwrap();
        assert_eq!(re.find(b"output\nrouter# "), Some((7, 15)));
        assert!(!re.is_match(b"router> "));

        let lit = Pattern::literal("marker", "--More--");
        assert_eq!(lit.find(b"line\n--More--"), Some((5, 13)));
        assert!(!lit.is_match(b"--More-"));
    }

    #[test]
    fn test_earliest_match_wins() {
        let late = Pattern::literal("late", "prompt>");
        let early = Pattern::literal("early", "banner");
        let span = find_earliest(b"banner text prompt>", [&late, &early]).unwrap();
        assert_eq!(span.index, 1);
        assert_eq!((span.start, span.end), (0, 6));
    }

    #[test]
    fn test_tie_prefers_first_registered() {
        let short = Pattern::literal("short", "dev");
        let long = Pattern::regex("long", r"device>").unwrap();

        let span = find_earliest(b"device>", [&short, &long]).unwrap();
        assert_eq!(span.index, 0);

        let span = find_earliest(b"device>", [&long, &short]).unwrap();
        assert_eq!(span.index, 0);
        assert_eq!(span.end, 7);
    }

    #[test]
    fn test_no_match_yet() {
        let prompt = Pattern::prompt("prompt", r"switch#").unwrap();
        assert!(find_earliest(b"switch", [&prompt]).is_none());
        assert!(find_earliest(b"switch#", [&prompt]).is_some());
    }

    #[test]
    fn test_echo_pattern_line_endings() {
        let echo = Pattern::echo("show ip int brief | i up");
        assert!(echo.is_match(b"show ip int brief | i up\r\n"));
        assert!(echo.is_match(b"show ip int brief | i up\n"));
        assert!(echo.is_match(b"show ip int brief | i up \r\r\n"));
        // The line ending has not arrived yet
        assert!(!echo.is_match(b"show ip int brief | i up\r"));
        // Regex metacharacters in the command are literal
        assert!(!echo.is_match(b"show ip int brief X i up\r\n"));
    }

    #[test]
    fn test_oversized_echo_falls_back_to_literal() {
        let command = "x".repeat(1 << 20);
        let echo = Pattern::echo(&command);
        assert_eq!(echo.as_str(), command);

        let mut received = command.clone().into_bytes();
        received.extend_from_slice(b"\r\ndevice#");
        // The line ending stays behind for the output to absorb
        assert_eq!(echo.find(&received), Some((0, command.len())));
    }

    #[test]
    fn test_compile_prompt_pattern() {
        // Pattern without anchor gets one added
        let pattern = compile_prompt_pattern(r"router#").unwrap();
        assert!(pattern.is_match(b"router# "));
        assert!(!pattern.is_match(b"router# more"));

        // Pattern with anchor stays as-is
        let pattern = compile_prompt_pattern(r"router#$").unwrap();
        assert_eq!(pattern.as_str(), "router#$");
    }
}
