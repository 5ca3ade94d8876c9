//! SMTP reply types.

use std::fmt;

/// One complete SMTP reply block from the server.
///
/// A block spans one or more wire lines that share the same status code;
/// every line but the last uses the `-` continuation marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Text of each line, without the code and marker.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Returns true if this is a success reply (2xx).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code.is_success()
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(&self) -> bool {
        self.code.is_intermediate()
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient_error(&self) -> bool {
        self.code.is_transient()
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent_error(&self) -> bool {
        self.code.is_permanent()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Returns the text of the first line, if any.
    #[must_use]
    pub fn first_line(&self) -> Option<&str> {
        self.message.first().map(String::as_str)
    }
}

/// Renders the reply in wire form, one line per message line, joined with `\n`.
impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            return write!(f, "{}", self.code);
        }
        let last = self.message.len() - 1;
        for (i, line) in self.message.iter().enumerate() {
            let marker = if i == last { ' ' } else { '-' };
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}{marker}{line}", self.code)?;
        }
        Ok(())
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns true if this is a success code (2xx).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 200 && self.0 < 300
    }

    /// Returns true if this is an intermediate reply (3xx).
    #[must_use]
    pub const fn is_intermediate(self) -> bool {
        self.0 >= 300 && self.0 < 400
    }

    /// Returns true if this is a transient error (4xx).
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 >= 400 && self.0 < 500
    }

    /// Returns true if this is a permanent error (5xx).
    #[must_use]
    pub const fn is_permanent(self) -> bool {
        self.0 >= 500 && self.0 < 600
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Codes the connection layer itself looks at
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 421 Service not available, closing transmission channel
    pub const SERVICE_UNAVAILABLE: Self = Self(421);
    /// 500 Syntax error, command unrecognized
    pub const SYNTAX_ERROR: Self = Self(500);
    /// 550 Mailbox unavailable
    pub const MAILBOX_UNAVAILABLE: Self = Self(550);
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::redundant_clone)]
mod tests {
    use super::*;

    fn reply(code: u16, lines: &[&str]) -> Reply {
        Reply::new(
            ReplyCode::new(code),
            lines.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn code_classes() {
        assert!(ReplyCode::CLOSING.is_success());
        assert!(ReplyCode::START_DATA.is_intermediate());
        assert!(ReplyCode::SERVICE_UNAVAILABLE.is_transient());
        assert!(ReplyCode::MAILBOX_UNAVAILABLE.is_permanent());
        assert!(!ReplyCode::OK.is_transient());
    }

    #[test]
    fn reply_classes_follow_code() {
        assert!(reply(250, &["OK"]).is_success());
        assert!(reply(354, &["go ahead"]).is_intermediate());
        assert!(reply(452, &["full"]).is_transient_error());
        assert!(reply(554, &["no"]).is_permanent_error());
    }

    #[test]
    fn message_text_joins_lines() {
        let r = reply(250, &["mx.example.com", "PIPELINING", "SIZE 1000"]);
        assert_eq!(r.message_text(), "mx.example.com\nPIPELINING\nSIZE 1000");
        assert_eq!(r.first_line(), Some("mx.example.com"));
    }

    #[test]
    fn display_renders_wire_form() {
        let r = reply(250, &["mx.example.com", "PIPELINING", "SIZE 1000"]);
        assert_eq!(
            r.to_string(),
            "250-mx.example.com\n250-PIPELINING\n250 SIZE 1000"
        );
        assert_eq!(reply(221, &["bye"]).to_string(), "221 bye");
        assert_eq!(reply(250, &[]).to_string(), "250");
    }
}
