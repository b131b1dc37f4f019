//! Command output post-processing.

/// Normalize line endings: any run of `\r` around a `\n`, and any lone
/// `\r`, becomes a single `\n`.
pub fn normalize_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\r' | '\n' => {
                let mut saw_newline = c == '\n';
                // Swallow the rest of this separator: \r* \n? \r*
                while let Some(&next) = chars.peek() {
                    match next {
                        '\r' => {
                            chars.next();
                        }
                        '\n' if !saw_newline => {
                            saw_newline = true;
                            chars.next();
                        }
                        _ => break,
                    }
                }
                out.push('\n');
            }
            _ => out.push(c),
        }
    }

    out
}

/// Tidy a command's output: normalize line endings, drop leading blank
/// lines and trailing whitespace. Leading spaces of the first line are kept
/// since they are often column alignment.
pub fn clean(text: &str) -> String {
    let normalized = normalize_newlines(text);
    normalized
        .trim_start_matches('\n')
        .trim_end()
        .to_string()
}

/// Remove a first line equal to `command`, for devices whose echo was not
/// consumed separately.
pub fn strip_command_line<'a>(output: &'a str, command: &str) -> &'a str {
    match output.strip_prefix(command) {
        Some(rest) if rest.is_empty() || rest.starts_with(['\r', '\n', ' ', '\t']) => {
            rest.trim_start_matches([' ', '\t']).trim_start_matches(['\r', '\n'])
        }
        _ => output,
    }
}

/// An error printed by the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceError {
    /// The error lines.
    pub error: String,
    /// The output without the error lines.
    pub remainder: String,
}

/// Marker printed by IOS under the offending input.
pub const CARET_MARKER: &str = "'^' marker";

/// Find the first device error in normalized output.
///
/// A device error is a line starting with `%`. When it mentions the `'^'`
/// marker, the caret line before it and the line after it belong to the
/// error too.
pub fn find_device_error(output: &str) -> Option<DeviceError> {
    let lines: Vec<&str> = output.split('\n').collect();
    let index = lines.iter().position(|line| line.starts_with('%'))?;

    let span = if lines[index].contains(CARET_MARKER) {
        index.saturating_sub(1)..(index + 2).min(lines.len())
    } else {
        index..index + 1
    };

    let error = lines[span.clone()].join("\n").trim().to_string();
    let remainder = lines[..span.start]
        .iter()
        .chain(&lines[span.end..])
        .copied()
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string();

    Some(DeviceError { error, remainder })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_newlines() {
        assert_eq!(normalize_newlines("a\r\nb"), "a\nb");
        assert_eq!(normalize_newlines("a\r\r\nb"), "a\nb");
        assert_eq!(normalize_newlines("a\n\rb"), "a\nb");
        assert_eq!(normalize_newlines("a\rb"), "a\nb");
        assert_eq!(normalize_newlines("a\r\n\r\nb"), "a\n\nb");
        assert_eq!(normalize_newlines("a\n\nb"), "a\n\nb");
        assert_eq!(normalize_newlines("plain"), "plain");
    }

    #[test]
    fn test_clean_keeps_alignment() {
        assert_eq!(
            clean("\r\n  Port   Status\r\n  Gi0/1  up\r\n\r\n"),
            "  Port   Status\n  Gi0/1  up"
        );
    }

    #[test]
    fn test_strip_command_line() {
        assert_eq!(strip_command_line("show clock\r\n12:00", "show clock"), "12:00");
        assert_eq!(strip_command_line("show clock", "show clock"), "");
        assert_eq!(strip_command_line("show clocks\n1", "show clock"), "show clocks\n1");
        assert_eq!(strip_command_line("12:00", "show clock"), "12:00");
    }

    #[test]
    fn test_plain_device_error() {
        let found = find_device_error(
            "Translating \"foo\"\n% Unknown command or computer name, or unable to find computer address",
        )
        .unwrap();
        assert_eq!(
            found.error,
            "% Unknown command or computer name, or unable to find computer address"
        );
        assert_eq!(found.remainder, "Translating \"foo\"");
    }

    #[test]
    fn test_caret_device_error() {
        let found = find_device_error("     ^\n% Invalid input detected at '^' marker.\n").unwrap();
        assert_eq!(found.error, "^\n% Invalid input detected at '^' marker.");
        assert_eq!(found.remainder, "");
    }

    #[test]
    fn test_caret_error_on_first_line() {
        let found = find_device_error("% Invalid input detected at '^' marker.\nmore").unwrap();
        assert_eq!(found.error, "% Invalid input detected at '^' marker.\nmore");
    }

    #[test]
    fn test_no_device_error() {
        assert!(find_device_error("Interface  Status\nGi0/1  up  100%").is_none());
        assert!(find_device_error("").is_none());
    }
}
