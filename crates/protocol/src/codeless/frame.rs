use super::prefix::Prefix;

/// Outbound framing knobs (§6.4: `append_end_of_line`, `end_of_line`,
/// `trailing_zero`).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FramingConfig {
    /// Append `end_of_line` after the assembled command text.
    pub append_end_of_line: bool,
    /// Line terminator substituted for `\n` and appended when
    /// `append_end_of_line` is set. Upstream default is `\r\n`.
    pub end_of_line: String,
    /// Append a single NUL byte after the (optionally terminated) text.
    pub trailing_zero: bool,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            append_end_of_line: true,
            end_of_line: "\r\n".to_owned(),
            trailing_zero: true,
        }
    }
}

/// Replaces every `\n` in `text` with `eol`, matching the engine's rule that
/// newlines embedded in response bodies are translated to the configured
/// line terminator rather than sent as bare `\n`.
#[must_use]
pub fn translate_newlines(text: &str, eol: &str) -> String {
    if eol == "\n" {
        return text.to_owned();
    }
    text.replace('\n', eol)
}

/// Assembles the outbound payload for a prefixed command:
/// `<prefix><identifier>[=<args>]`, framed per `cfg`.
///
/// Encodes to US-ASCII by construction (the caller is expected to supply
/// ASCII identifiers/arguments; any non-ASCII byte is preserved verbatim,
/// since upstream CodeLess never rejects a command for this — it is purely a
/// wire convention, not a validated charset).
#[must_use]
pub fn assemble(prefix: Prefix, identifier: &str, args: Option<&str>, cfg: &FramingConfig) -> Vec<u8> {
    let mut text = String::with_capacity(identifier.len() + 8);
    text.push_str(prefix.as_str());
    text.push_str(identifier);
    if let Some(args) = args {
        text.push('=');
        text.push_str(args);
    }
    framed_bytes(&text, cfg)
}

/// Assembles a verbatim (`Custom`) outbound payload: no prefix, identifier,
/// or `=args` wrapping is applied, but the same newline translation and
/// trailer rules still apply.
#[must_use]
pub fn assemble_custom(text: &str, cfg: &FramingConfig) -> Vec<u8> {
    framed_bytes(text, cfg)
}

fn framed_bytes(text: &str, cfg: &FramingConfig) -> Vec<u8> {
    let mut translated = translate_newlines(text, &cfg.end_of_line);
    if cfg.append_end_of_line {
        translated.push_str(&cfg.end_of_line);
    }
    let mut bytes: Vec<u8> = translated.into_bytes();
    if cfg.trailing_zero {
        bytes.push(0);
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_matches_scenario_s1() {
        let cfg = FramingConfig::default();
        let bytes = assemble(Prefix::Bare, "", None, &cfg);
        assert_eq!(bytes, vec![0x41, 0x54, 0x0D, 0x0A, 0x00]);
    }

    #[test]
    fn no_trailer_when_disabled() {
        let cfg = FramingConfig {
            append_end_of_line: false,
            end_of_line: "\r\n".to_owned(),
            trailing_zero: false,
        };
        let bytes = assemble(Prefix::Local, "BINREQ", None, &cfg);
        assert_eq!(bytes, b"AT+BINREQ");
    }

    #[test]
    fn args_are_joined_with_equals() {
        let cfg = FramingConfig {
            append_end_of_line: false,
            end_of_line: "\r\n".to_owned(),
            trailing_zero: false,
        };
        let bytes = assemble(Prefix::Remote, "GPIO", Some("1,1"), &cfg);
        assert_eq!(bytes, b"ATrGPIO=1,1");
    }

    #[test]
    fn embedded_newlines_translate_to_configured_eol() {
        let cfg = FramingConfig {
            append_end_of_line: false,
            end_of_line: "\r\n".to_owned(),
            trailing_zero: false,
        };
        assert_eq!(translate_newlines("a\nb", &cfg.end_of_line), "a\r\nb");
    }

    #[test]
    fn custom_text_skips_prefix_assembly() {
        let cfg = FramingConfig::default();
        let bytes = assemble_custom("RAW", &cfg);
        assert_eq!(bytes, b"RAW\r\n\0");
    }
}
