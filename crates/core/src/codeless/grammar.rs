//! Line classification for the "pending outbound command" receive grammar
//! (§4.3): distinguishes the two terminators, lines that merely look like an
//! error (buffered until the terminator arrives), and everything else.

/// What kind of line was just received while a command is pending.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineClass {
    /// An empty line.
    Empty,
    /// The success terminator, `"OK"`.
    Ok,
    /// The failure terminator, `"ERROR"`.
    Error,
    /// Matches `^(ERROR|INVALID COMMAND|EC\d+:).*` without being the bare `ERROR` terminator.
    PotentialError,
    /// Anything else.
    Other,
}

/// Classifies one already-trimmed CodeLess line.
#[must_use]
pub fn classify_line(line: &str) -> LineClass {
    if line.is_empty() {
        return LineClass::Empty;
    }
    if line == "OK" {
        return LineClass::Ok;
    }
    if line == "ERROR" {
        return LineClass::Error;
    }
    if line.starts_with("ERROR") || line.starts_with("INVALID COMMAND") || looks_like_error_code(line) {
        return LineClass::PotentialError;
    }
    LineClass::Other
}

/// Extracts the numeric code from a leading `ECnnn:` marker, if present.
#[must_use]
pub fn extract_error_code(line: &str) -> Option<String> {
    let rest = line.strip_prefix("EC")?;
    let digits_end = rest.find(':')?;
    let digits = &rest[..digits_end];
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        Some(format!("EC{digits}"))
    } else {
        None
    }
}

fn looks_like_error_code(line: &str) -> bool {
    extract_error_code(line).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_terminators() {
        assert_eq!(classify_line(""), LineClass::Empty);
        assert_eq!(classify_line("OK"), LineClass::Ok);
        assert_eq!(classify_line("ERROR"), LineClass::Error);
    }

    #[test]
    fn classifies_error_prefixed_lines_as_potential() {
        assert_eq!(classify_line("ERROR: bad state"), LineClass::PotentialError);
        assert_eq!(classify_line("INVALID COMMAND"), LineClass::PotentialError);
        assert_eq!(classify_line("EC007: out of range"), LineClass::PotentialError);
    }

    #[test]
    fn everything_else_is_other() {
        assert_eq!(classify_line("device-name-123"), LineClass::Other);
    }

    #[test]
    fn extracts_error_code() {
        assert_eq!(extract_error_code("EC042: bad state"), Some("EC042".to_string()));
        assert_eq!(extract_error_code("hello"), None);
        assert_eq!(extract_error_code("ECxx: nope"), None);
    }
}
