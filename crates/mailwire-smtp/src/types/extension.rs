//! SMTP extension keywords advertised in an EHLO reply.

/// One capability line of an EHLO reply.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Extension {
    /// STARTTLS - TLS upgrade
    StartTls,
    /// AUTH - Authentication (also the legacy `AUTH=` form)
    Auth(Vec<AuthMechanism>),
    /// SIZE - Maximum message size
    Size(Option<usize>),
    /// 8BITMIME - 8-bit MIME transport
    EightBitMime,
    /// PIPELINING - Command pipelining
    Pipelining,
    /// ENHANCEDSTATUSCODES - RFC 2034 status codes
    EnhancedStatusCodes,
    /// SMTPUTF8 - UTF-8 email addresses
    SmtpUtf8,
    /// DSN - Delivery status notifications
    Dsn,
    /// Any other keyword, kept verbatim
    Unknown(String),
}

impl Extension {
    /// Parses one capability line (without the reply code).
    ///
    /// Keywords are matched case-insensitively.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let mut parts = line.split_whitespace();
        let Some(first) = parts.next() else {
            return Self::Unknown(line.to_string());
        };

        // "AUTH=PLAIN LOGIN" is what some older servers send
        let (keyword, inline_arg) = match first.split_once('=') {
            Some((kw, arg)) => (kw.to_ascii_uppercase(), Some(arg)),
            None => (first.to_ascii_uppercase(), None),
        };

        match keyword.as_str() {
            "STARTTLS" => Self::StartTls,
            "AUTH" => Self::Auth(
                inline_arg
                    .into_iter()
                    .chain(parts)
                    .filter_map(AuthMechanism::parse)
                    .collect(),
            ),
            "SIZE" => Self::Size(inline_arg.or_else(|| parts.next()).and_then(|s| s.parse().ok())),
            "8BITMIME" => Self::EightBitMime,
            "PIPELINING" => Self::Pipelining,
            "ENHANCEDSTATUSCODES" => Self::EnhancedStatusCodes,
            "SMTPUTF8" => Self::SmtpUtf8,
            "DSN" => Self::Dsn,
            _ => Self::Unknown(line.to_string()),
        }
    }
}

/// SASL authentication mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMechanism {
    /// PLAIN - plaintext authentication
    Plain,
    /// LOGIN - legacy plaintext
    Login,
    /// CRAM-MD5 - challenge-response
    CramMd5,
    /// `XOAUTH2` - `OAuth2` (Google/Microsoft)
    XOAuth2,
    /// `OAUTHBEARER` - RFC 7628 `OAuth2`
    OAuthBearer,
}

impl AuthMechanism {
    /// Parses an authentication mechanism name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "PLAIN" => Some(Self::Plain),
            "LOGIN" => Some(Self::Login),
            "CRAM-MD5" => Some(Self::CramMd5),
            "XOAUTH2" => Some(Self::XOAuth2),
            "OAUTHBEARER" => Some(Self::OAuthBearer),
            _ => None,
        }
    }

    /// Returns the mechanism name as a string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plain => "PLAIN",
            Self::Login => "LOGIN",
            Self::CramMd5 => "CRAM-MD5",
            Self::XOAuth2 => "XOAUTH2",
            Self::OAuthBearer => "OAUTHBEARER",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::unreadable_literal)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_keywords() {
        assert_eq!(Extension::parse("STARTTLS"), Extension::StartTls);
        assert_eq!(Extension::parse("starttls"), Extension::StartTls);
        assert_eq!(Extension::parse("PIPELINING"), Extension::Pipelining);
        assert_eq!(Extension::parse("8bitmime"), Extension::EightBitMime);
        assert_eq!(
            Extension::parse("EnhancedStatusCodes"),
            Extension::EnhancedStatusCodes
        );
    }

    #[test]
    fn parse_auth_list() {
        assert_eq!(
            Extension::parse("AUTH PLAIN login XOAUTH2 GSSAPI"),
            Extension::Auth(vec![
                AuthMechanism::Plain,
                AuthMechanism::Login,
                AuthMechanism::XOAuth2
            ])
        );
    }

    #[test]
    fn parse_legacy_auth_form() {
        assert_eq!(
            Extension::parse("AUTH=LOGIN PLAIN"),
            Extension::Auth(vec![AuthMechanism::Login, AuthMechanism::Plain])
        );
    }

    #[test]
    fn parse_size() {
        assert_eq!(Extension::parse("SIZE 52428800"), Extension::Size(Some(52428800)));
        assert_eq!(Extension::parse("SIZE"), Extension::Size(None));
        assert_eq!(Extension::parse("SIZE lots"), Extension::Size(None));
    }

    #[test]
    fn parse_unknown_and_empty() {
        assert_eq!(
            Extension::parse("X-VENDOR foo"),
            Extension::Unknown("X-VENDOR foo".to_string())
        );
        assert!(matches!(Extension::parse("   "), Extension::Unknown(_)));
    }

    #[test]
    fn auth_mechanism_names() {
        assert_eq!(AuthMechanism::parse("cram-md5"), Some(AuthMechanism::CramMd5));
        assert_eq!(AuthMechanism::parse("OAUTHBEARER"), Some(AuthMechanism::OAuthBearer));
        assert_eq!(AuthMechanism::parse("NTLM"), None);
        assert_eq!(AuthMechanism::CramMd5.as_str(), "CRAM-MD5");
    }
}
