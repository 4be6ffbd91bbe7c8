//! Incremental parser for the DSPS file-receive header:
//!
//! ```text
//! [prelude <= 100 bytes] "Name:" WS+ name WS+
//! "Size:" WS+ decimal WS+
//! ["CRC:" WS+ hex8 WS+]
//! ("END" WS+ | NUL)
//! <payload bytes...>
//! ```
//!
//! Keywords (`Name:`, `Size:`, `CRC:`, `END`) match case-insensitively; the
//! name and digit tokens do not.

use memchr::memchr2;

const MAX_PRELUDE: usize = 100;
const MAX_NAME_LEN: usize = 100;
const MAX_SIZE_DIGITS: usize = 9;
const CRC_HEX_LEN: usize = 8;

/// A successfully parsed header.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParsedHeader {
    /// The file name from the `Name:` field.
    pub name: String,
    /// The declared payload size from the `Size:` field.
    pub size: u64,
    /// The declared CRC-32 from the optional `CRC:` field.
    pub crc: Option<u32>,
    /// Number of bytes of `buffer` consumed by the header and its
    /// terminator; `buffer[header_len..]` is payload that arrived in the
    /// same chunk as the header end marker.
    pub header_len: usize,
}

/// Outcome of attempting to match a header against the buffer accumulated so far.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum HeaderMatch {
    /// A complete header was found.
    Matched(ParsedHeader),
    /// Not enough bytes yet; keep accumulating and retry.
    Incomplete,
    /// The buffer can never match starting from this point (the prelude
    /// budget was exceeded without finding `Name:`, or a required literal
    /// was contradicted by the bytes present). Caller should reset its
    /// buffer.
    Invalid,
}

/// Attempts to match a header at the start of `buffer`. Pure function: the
/// same bytes always produce the same result.
#[must_use]
pub fn try_match(buffer: &[u8]) -> HeaderMatch {
    let Some(name_start) = find_name_marker(buffer) else {
        return if buffer.len() > MAX_PRELUDE + b"name:".len() {
            HeaderMatch::Invalid
        } else {
            HeaderMatch::Incomplete
        };
    };

    let mut cursor = name_start + b"name:".len();

    let name = match take_ws_then_token(buffer, &mut cursor, MAX_NAME_LEN) {
        Step::Ok(token) => token,
        Step::Incomplete => return HeaderMatch::Incomplete,
        Step::Invalid => return HeaderMatch::Invalid,
    };

    match expect_literal_ci(buffer, &mut cursor, b"size:") {
        Step::Ok(()) => {}
        Step::Incomplete => return HeaderMatch::Incomplete,
        Step::Invalid => return HeaderMatch::Invalid,
    }

    let size_token = match take_ws_then_token(buffer, &mut cursor, MAX_SIZE_DIGITS) {
        Step::Ok(token) => token,
        Step::Incomplete => return HeaderMatch::Incomplete,
        Step::Invalid => return HeaderMatch::Invalid,
    };
    let Ok(size) = size_token.parse::<u64>() else {
        return HeaderMatch::Invalid;
    };

    let crc = match peek_literal_ci(buffer, cursor, b"crc:") {
        Some(true) => {
            cursor += b"crc:".len();
            let token = match take_ws_then_token(buffer, &mut cursor, CRC_HEX_LEN) {
                Step::Ok(token) => token,
                Step::Incomplete => return HeaderMatch::Incomplete,
                Step::Invalid => return HeaderMatch::Invalid,
            };
            if token.len() != CRC_HEX_LEN {
                return HeaderMatch::Invalid;
            }
            match u32::from_str_radix(&token, 16) {
                Ok(value) => Some(value),
                Err(_) => return HeaderMatch::Invalid,
            }
        }
        Some(false) => None,
        None => return HeaderMatch::Incomplete,
    };

    match take_terminator(buffer, &mut cursor) {
        Step::Ok(()) => {}
        Step::Incomplete => return HeaderMatch::Incomplete,
        Step::Invalid => return HeaderMatch::Invalid,
    }

    let Ok(name) = String::from_utf8(name.into_bytes()) else {
        return HeaderMatch::Invalid;
    };

    HeaderMatch::Matched(ParsedHeader {
        name,
        size,
        crc,
        header_len: cursor,
    })
}

enum Step<T> {
    Ok(T),
    Incomplete,
    Invalid,
}

/// Finds the start of a case-insensitive `"name:"` literal within the first
/// `MAX_PRELUDE` bytes of `buffer`.
fn find_name_marker(buffer: &[u8]) -> Option<usize> {
    let needle = b"name:";
    let window_end = buffer.len().min(MAX_PRELUDE + needle.len());
    let window = &buffer[..window_end];
    let mut offset = 0;
    loop {
        let remaining = &window[offset..];
        if remaining.len() < needle.len() {
            return None;
        }
        match memchr2(b'n', b'N', remaining) {
            Some(rel) => {
                let start = offset + rel;
                if start + needle.len() <= window.len()
                    && buffer[start..start + needle.len()].eq_ignore_ascii_case(needle)
                {
                    return Some(start);
                }
                offset = start + 1;
            }
            None => return None,
        }
    }
}

/// Skips one-or-more ASCII whitespace bytes starting at `*cursor`, then
/// collects a run of non-whitespace bytes (the token), up to `max_len`. On
/// success advances `*cursor` past the token and its terminating whitespace
/// run and returns the token.
fn take_ws_then_token(buffer: &[u8], cursor: &mut usize, max_len: usize) -> Step<String> {
    let mut pos = match skip_ws(buffer, *cursor) {
        Step::Ok(pos) => pos,
        Step::Incomplete => return Step::Incomplete,
        Step::Invalid => return Step::Invalid,
    };
    let token_start = pos;
    while pos < buffer.len() && !buffer[pos].is_ascii_whitespace() {
        pos += 1;
        if pos - token_start > max_len {
            return Step::Invalid;
        }
    }
    if pos >= buffer.len() {
        return Step::Incomplete;
    }
    if pos == token_start {
        return Step::Invalid;
    }
    let token = buffer[token_start..pos].to_vec();
    let Ok(token) = String::from_utf8(token) else {
        return Step::Invalid;
    };
    let after_ws = match skip_ws(buffer, pos) {
        Step::Ok(pos) => pos,
        Step::Incomplete => return Step::Incomplete,
        Step::Invalid => return Step::Invalid,
    };
    *cursor = after_ws;
    Step::Ok(token)
}

/// Requires at least one ASCII whitespace byte at `from` (`WS+`), skips the
/// full run, and returns the index of the following non-whitespace byte.
/// `Incomplete` if the buffer ends before that can be determined; `Invalid`
/// if `from` points at a non-whitespace byte (the grammar requires
/// whitespace here and no amount of further buffering changes that).
fn skip_ws(buffer: &[u8], from: usize) -> Step<usize> {
    if from >= buffer.len() {
        return Step::Incomplete;
    }
    if !buffer[from].is_ascii_whitespace() {
        return Step::Invalid;
    }
    let mut pos = from;
    while pos < buffer.len() && buffer[pos].is_ascii_whitespace() {
        pos += 1;
    }
    if pos >= buffer.len() {
        return Step::Incomplete;
    }
    Step::Ok(pos)
}

fn expect_literal_ci(buffer: &[u8], cursor: &mut usize, literal: &[u8]) -> Step<()> {
    let end = *cursor + literal.len();
    if end > buffer.len() {
        return if buffer[*cursor..].eq_ignore_ascii_case(&literal[..buffer.len() - *cursor]) {
            Step::Incomplete
        } else {
            Step::Invalid
        };
    }
    if buffer[*cursor..end].eq_ignore_ascii_case(literal) {
        *cursor = end;
        Step::Ok(())
    } else {
        Step::Invalid
    }
}

/// Peeks whether `literal` (case-insensitive) appears at `at`. `None` means
/// not enough bytes to decide yet.
fn peek_literal_ci(buffer: &[u8], at: usize, literal: &[u8]) -> Option<bool> {
    let end = at + literal.len();
    if end > buffer.len() {
        if buffer[at..].eq_ignore_ascii_case(&literal[..buffer.len() - at]) {
            return None;
        }
        return Some(false);
    }
    Some(buffer[at..end].eq_ignore_ascii_case(literal))
}

fn take_terminator(buffer: &[u8], cursor: &mut usize) -> Step<()> {
    if *cursor >= buffer.len() {
        return Step::Incomplete;
    }
    if buffer[*cursor] == 0 {
        *cursor += 1;
        return Step::Ok(());
    }
    match peek_literal_ci(buffer, *cursor, b"end") {
        Some(true) => match skip_ws(buffer, *cursor + 3) {
            Step::Ok(after_ws) => {
                *cursor = after_ws;
                Step::Ok(())
            }
            Step::Incomplete => Step::Incomplete,
            Step::Invalid => Step::Invalid,
        },
        Some(false) => Step::Invalid,
        None => Step::Incomplete,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_bytes(body: &str) -> Vec<u8> {
        body.as_bytes().to_vec()
    }

    #[test]
    fn scenario_s5_header_with_crc_and_end() {
        let mut buffer = header_bytes("Name: log.bin Size: 4 CRC: cbf43926 END ");
        buffer.extend_from_slice(b"1234");
        match try_match(&buffer) {
            HeaderMatch::Matched(header) => {
                assert_eq!(header.name, "log.bin");
                assert_eq!(header.size, 4);
                assert_eq!(header.crc, Some(0xCBF4_3926));
                assert_eq!(&buffer[header.header_len..], b"1234");
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn header_without_crc_terminated_by_nul() {
        let mut buffer = header_bytes("Name: a Size: 2 \0");
        buffer.extend_from_slice(b"xy");
        match try_match(&buffer) {
            HeaderMatch::Matched(header) => {
                assert_eq!(header.name, "a");
                assert_eq!(header.size, 2);
                assert_eq!(header.crc, None);
                assert_eq!(&buffer[header.header_len..], b"xy");
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn case_insensitive_keywords() {
        let mut buffer = header_bytes("name: a size: 1 end ");
        buffer.push(b'Z');
        match try_match(&buffer) {
            HeaderMatch::Matched(header) => {
                assert_eq!(header.name, "a");
                assert_eq!(header.size, 1);
            }
            other => panic!("expected a match, got {other:?}"),
        }
    }

    #[test]
    fn incomplete_while_still_accumulating() {
        assert_eq!(try_match(b"Name: lo"), HeaderMatch::Incomplete);
        assert_eq!(try_match(b"Name: log.bin Size: "), HeaderMatch::Incomplete);
        assert_eq!(
            try_match(b"Name: log.bin Size: 4 CRC: cbf4"),
            HeaderMatch::Incomplete
        );
    }

    #[test]
    fn invalid_once_prelude_budget_exceeded() {
        let noise = vec![b'x'; MAX_PRELUDE + 10];
        assert_eq!(try_match(&noise), HeaderMatch::Invalid);
    }

    #[test]
    fn invalid_size_is_rejected() {
        assert_eq!(try_match(b"Name: a Size: notanumber END "), HeaderMatch::Invalid);
    }

    #[test]
    fn prelude_noise_before_name_is_tolerated() {
        let mut buffer = header_bytes("garbage-prelude Name: f Size: 3 END ");
        buffer.extend_from_slice(b"abc");
        match try_match(&buffer) {
            HeaderMatch::Matched(header) => assert_eq!(header.name, "f"),
            other => panic!("expected a match, got {other:?}"),
        }
    }
}
