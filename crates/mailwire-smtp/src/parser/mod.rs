//! SMTP reply line parser.

use crate::error::{Error, Result};
use crate::types::{Reply, ReplyCode};

/// Position of a line within its reply block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// `250-...`: more lines of the same block follow.
    Continuation,
    /// `250 ...` or a bare `250`: the block is complete.
    Final,
}

/// Classifies one reply line (without its CRLF).
///
/// # Errors
///
/// Returns an error if the line does not start with a three digit code
/// followed by `-`, a space, or the end of the line.
pub fn classify_line(line: &str) -> Result<LineKind> {
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(Error::Protocol(format!("Malformed reply line: {line}")));
    }
    match bytes.get(3) {
        None | Some(b' ') => Ok(LineKind::Final),
        Some(b'-') => Ok(LineKind::Continuation),
        Some(_) => Err(Error::Protocol(format!("Malformed reply line: {line}"))),
    }
}

/// Parses an SMTP reply block from its lines.
///
/// SMTP replies can be single-line or multi-line:
/// - Single: `250 OK\r\n`
/// - Multi: `250-First line\r\n250-Second line\r\n250 Last line\r\n`
///
/// # Errors
///
/// Returns an error if the block is empty or any line is malformed.
pub fn parse_reply(lines: &[String]) -> Result<Reply> {
    let Some(first) = lines.first() else {
        return Err(Error::Protocol("Empty reply".into()));
    };
    classify_line(first)?;

    let code_str = &first[0..3];
    let code = code_str
        .parse::<u16>()
        .map_err(|_| Error::Protocol(format!("Invalid reply code: {code_str}")))?;

    let mut message = Vec::with_capacity(lines.len());
    for line in lines {
        classify_line(line)?;
        if &line[0..3] != code_str {
            return Err(Error::Protocol(format!(
                "Reply code changed inside block: {line}"
            )));
        }
        message.push(line.get(4..).unwrap_or_default().to_string());
    }

    Ok(Reply::new(ReplyCode::new(code), message))
}
