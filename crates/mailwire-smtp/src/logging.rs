//! Redaction of outgoing commands before they reach the log.

/// Longest command text written to the log.
pub const MAX_LOGGED_LEN: usize = 1000;

/// Character that replaces masked command text.
pub const MASK_CHAR: char = '*';

/// Prepares an outgoing command for debug logging.
///
/// Characters at and after `mask_from` are replaced with [`MASK_CHAR`], so
/// `AUTH PLAIN <secret>` can be logged with `mask_from = 11`. Text longer than
/// [`MAX_LOGGED_LEN`] characters is cut and suffixed with `...`. Positions are
/// counted in characters, not bytes.
#[must_use]
pub fn redact_command(text: &str, mask_from: Option<usize>) -> String {
    let mut out: String = match mask_from {
        Some(from) => text
            .chars()
            .enumerate()
            .map(|(i, c)| if i >= from { MASK_CHAR } else { c })
            .collect(),
        None => text.to_string(),
    };

    if let Some((cut, _)) = out.char_indices().nth(MAX_LOGGED_LEN) {
        out.truncate(cut);
        out.push_str("...");
    }
    out
}
