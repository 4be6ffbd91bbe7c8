/// The four recognized CodeLess command prefixes, plus the ability to send
/// verbatim (`Custom`) text with none of them applied.
///
/// Wire grammar: `^AT(?:\+|r\+?)?` — `AT` alone, `AT+` (local), `ATr` (remote),
/// or `ATr+` (remote-local).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Prefix {
    /// Bare `AT`, used for the plain ping command.
    Bare,
    /// `AT+`, used for mode commands (`BINREQ`, `BINREQACK`, `BINEXIT`, `BINEXITACK`).
    Local,
    /// `ATr`, the default prefix for non-mode commands.
    Remote,
    /// `ATr+`, remote-local variant used by a handful of commands.
    RemoteLocal,
}

impl Prefix {
    /// The literal prefix text as it appears on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bare => "AT",
            Self::Local => "AT+",
            Self::Remote => "ATr",
            Self::RemoteLocal => "ATr+",
        }
    }

    /// Strips a recognized prefix from the front of `text`, returning the
    /// matched variant and the remainder. Matches the longest applicable
    /// prefix first (`ATr+` before `ATr`, `AT+` before `AT`).
    #[must_use]
    pub fn strip(text: &str) -> Option<(Self, &str)> {
        if let Some(rest) = text.strip_prefix("ATr+") {
            Some((Self::RemoteLocal, rest))
        } else if let Some(rest) = text.strip_prefix("ATr") {
            Some((Self::Remote, rest))
        } else if let Some(rest) = text.strip_prefix("AT+") {
            Some((Self::Local, rest))
        } else {
            text.strip_prefix("AT").map(|rest| (Self::Bare, rest))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Prefix;

    #[test]
    fn strips_longest_match_first() {
        assert_eq!(Prefix::strip("ATr+PING"), Some((Prefix::RemoteLocal, "PING")));
        assert_eq!(Prefix::strip("ATrPING"), Some((Prefix::Remote, "PING")));
        assert_eq!(Prefix::strip("AT+BINREQ"), Some((Prefix::Local, "BINREQ")));
        assert_eq!(Prefix::strip("AT"), Some((Prefix::Bare, "")));
    }

    #[test]
    fn rejects_non_matching_text() {
        assert_eq!(Prefix::strip("XBINREQ"), None);
        assert_eq!(Prefix::strip(""), None);
    }

    #[test]
    fn as_str_round_trips_through_strip() {
        for prefix in [
            Prefix::Bare,
            Prefix::Local,
            Prefix::Remote,
            Prefix::RemoteLocal,
        ] {
            let wire = format!("{}IDENT", prefix.as_str());
            assert_eq!(Prefix::strip(&wire), Some((prefix, "IDENT")));
        }
    }
}
