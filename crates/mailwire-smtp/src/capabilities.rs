//! Server capabilities learned from an EHLO reply.

use std::collections::HashSet;

use crate::types::{AuthMechanism, Extension, Reply};

/// Capability table built from one EHLO reply.
///
/// The table is replaced wholesale whenever a new EHLO reply is parsed, which
/// is required after STARTTLS since servers may advertise a different set
/// over the secured channel.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Server hostname from the first EHLO line.
    pub hostname: String,
    /// Supported extensions.
    pub extensions: HashSet<Extension>,
}

impl Capabilities {
    /// Builds the table from a parsed EHLO reply. The first line is the
    /// server's greeting; every following line is a capability keyword.
    #[must_use]
    pub fn from_reply(reply: &Reply) -> Self {
        let hostname = reply
            .first_line()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or_default()
            .to_string();
        let extensions = reply
            .message
            .iter()
            .skip(1)
            .map(|line| Extension::parse(line))
            .collect();
        Self {
            hostname,
            extensions,
        }
    }

    /// Builds the table from raw EHLO reply text such as
    /// `250-mx.example.com\n250-PIPELINING\n250 SIZE 1000`.
    ///
    /// Leading reply codes and markers are stripped when present.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let mut lines = raw.lines().map(strip_code).filter(|l| !l.is_empty());
        let hostname = lines
            .next()
            .and_then(|line| line.split_whitespace().next())
            .unwrap_or_default()
            .to_string();
        let extensions = lines.map(Extension::parse).collect();
        Self {
            hostname,
            extensions,
        }
    }

    /// Checks if the server supports an extension.
    #[must_use]
    pub fn supports(&self, ext: &Extension) -> bool {
        self.extensions.contains(ext)
    }

    /// Checks if STARTTLS is supported.
    #[must_use]
    pub fn supports_starttls(&self) -> bool {
        self.supports(&Extension::StartTls)
    }

    /// Checks if command pipelining is supported.
    #[must_use]
    pub fn supports_pipelining(&self) -> bool {
        self.supports(&Extension::Pipelining)
    }

    /// Checks if enhanced status codes are supported.
    #[must_use]
    pub fn supports_enhanced_status_codes(&self) -> bool {
        self.supports(&Extension::EnhancedStatusCodes)
    }

    /// Checks if 8BITMIME is supported.
    #[must_use]
    pub fn supports_8bitmime(&self) -> bool {
        self.supports(&Extension::EightBitMime)
    }

    /// Returns the maximum message size, if advertised with a value.
    #[must_use]
    pub fn max_message_size(&self) -> Option<usize> {
        self.extensions.iter().find_map(|ext| match ext {
            Extension::Size(size) => *size,
            _ => None,
        })
    }

    /// Returns supported authentication mechanisms.
    ///
    /// Servers that repeat the AUTH line (plain and legacy `AUTH=` form)
    /// have their lists merged.
    #[must_use]
    pub fn auth_mechanisms(&self) -> Vec<AuthMechanism> {
        let mut mechanisms = Vec::new();
        for ext in &self.extensions {
            if let Extension::Auth(list) = ext {
                for mech in list {
                    if !mechanisms.contains(mech) {
                        mechanisms.push(*mech);
                    }
                }
            }
        }
        mechanisms
    }

    /// Checks if an authentication mechanism is offered.
    #[must_use]
    pub fn supports_auth(&self, mechanism: AuthMechanism) -> bool {
        self.auth_mechanisms().contains(&mechanism)
    }
}

/// Strips a leading `250-` / `250 ` / `250` from a raw reply line.
fn strip_code(line: &str) -> &str {
    let line = line.trim_end_matches('\r');
    let bytes = line.as_bytes();
    if bytes.len() >= 3 && bytes[..3].iter().all(u8::is_ascii_digit) {
        match bytes.get(3) {
            None => "",
            Some(b' ' | b'-') => &line[4..],
            Some(_) => line,
        }
    } else {
        line
    }
}
