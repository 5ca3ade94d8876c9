//! Reply assembly from raw transport data.
//!
//! The assembler buffers whatever the socket delivers, cuts it into lines,
//! groups continuation lines into reply blocks and hands out *batches*: one
//! batch per write, holding as many blocks as the write expected. A plain
//! command expects one block; a pipelined group of N commands expects N.

use bytes::{Buf, BytesMut};

use crate::error::{Error, Result};
use crate::parser::{LineKind, classify_line, parse_reply};
use crate::types::Reply;

/// Longest line accepted before the peer is considered broken.
const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Reassembles SMTP reply blocks from a byte stream.
#[derive(Debug)]
pub struct ReplyAssembler {
    buffer: BytesMut,
    /// Lines of the block currently being read.
    lines: Vec<String>,
    /// Blocks completed for the current batch.
    completed: Vec<Reply>,
    expected: usize,
}

impl Default for ReplyAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplyAssembler {
    /// Creates an assembler expecting one block per batch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(1024),
            lines: Vec::new(),
            completed: Vec::new(),
            expected: 1,
        }
    }

    /// Sets how many blocks make up the next batch. Zero is treated as one.
    pub fn set_expected(&mut self, expected: usize) {
        self.expected = expected.max(1);
    }

    /// Returns how many blocks make up a batch.
    #[must_use]
    pub const fn expected(&self) -> usize {
        self.expected
    }

    /// Appends raw data received from the transport.
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Returns the next complete batch, if the buffered data holds one.
    ///
    /// Blocks are returned in arrival order. A malformed line yields an error
    /// and discards the partially assembled batch.
    pub fn poll_batch(&mut self) -> Option<Result<Vec<Reply>>> {
        loop {
            if self.completed.len() >= self.expected {
                return Some(Ok(std::mem::take(&mut self.completed)));
            }

            let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') else {
                if self.buffer.len() > MAX_LINE_LENGTH {
                    self.reset();
                    return Some(Err(Error::Protocol("reply line too long".into())));
                }
                return None;
            };

            let raw = self.buffer.split_to(pos + 1);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\r', '\n']);
            if line.is_empty() {
                continue;
            }

            match classify_line(line) {
                Ok(LineKind::Continuation) => self.lines.push(line.to_string()),
                Ok(LineKind::Final) => {
                    self.lines.push(line.to_string());
                    let lines = std::mem::take(&mut self.lines);
                    match parse_reply(&lines) {
                        Ok(reply) => self.completed.push(reply),
                        Err(e) => {
                            self.completed.clear();
                            return Some(Err(e));
                        }
                    }
                }
                Err(e) => {
                    self.lines.clear();
                    self.completed.clear();
                    return Some(Err(e));
                }
            }
        }
    }

    /// Drops buffered input and any partial batch. The expectation is kept.
    pub fn reset(&mut self) {
        self.buffer.advance(self.buffer.len());
        self.lines.clear();
        self.completed.clear();
    }

    /// Returns true if no partial input is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty() && self.lines.is_empty() && self.completed.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::ReplyCode;

    fn next(assembler: &mut ReplyAssembler) -> Vec<Reply> {
        assembler.poll_batch().unwrap().unwrap()
    }

    #[test]
    fn single_line_reply() {
        let mut a = ReplyAssembler::new();
        a.feed(b"220 mx.example.com ESMTP\r\n");
        let batch = next(&mut a);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].code, ReplyCode::SERVICE_READY);
        assert!(a.poll_batch().is_none());
        assert!(a.is_empty());
    }

    #[test]
    fn multiline_reply_split_across_reads() {
        let mut a = ReplyAssembler::new();
        a.feed(b"250-mx.example.com\r\n250-PIPE");
        assert!(a.poll_batch().is_none());
        a.feed(b"LINING\r\n250 SIZE 1000");
        assert!(a.poll_batch().is_none());
        a.feed(b"\r\n");
        let batch = next(&mut a);
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].message, vec!["mx.example.com", "PIPELINING", "SIZE 1000"]);
    }

    #[test]
    fn batch_waits_for_expected_blocks() {
        let mut a = ReplyAssembler::new();
        a.set_expected(3);
        a.feed(b"250 2.1.0 sender ok\r\n250 2.1.5 rcpt ok\r\n");
        assert!(a.poll_batch().is_none());
        a.feed(b"354 go ahead\r\n");
        let batch = next(&mut a);
        let codes: Vec<u16> = batch.iter().map(|r| r.code.as_u16()).collect();
        assert_eq!(codes, vec![250, 250, 354]);
    }

    #[test]
    fn back_to_back_batches_in_one_read() {
        let mut a = ReplyAssembler::new();
        a.feed(b"250 first\r\n250 second\r\n");
        assert_eq!(next(&mut a)[0].message, vec!["first"]);
        assert_eq!(next(&mut a)[0].message, vec!["second"]);
        assert!(a.poll_batch().is_none());
    }

    #[test]
    fn zero_expected_is_one() {
        let mut a = ReplyAssembler::new();
        a.set_expected(0);
        assert_eq!(a.expected(), 1);
    }

    #[test]
    fn tolerates_bare_lf_and_blank_lines() {
        let mut a = ReplyAssembler::new();
        a.feed(b"\r\n250-a\n250 b\n");
        assert_eq!(next(&mut a)[0].message, vec!["a", "b"]);
    }

    #[test]
    fn malformed_line_is_an_error() {
        let mut a = ReplyAssembler::new();
        a.feed(b"250-ok\r\nHELLO THERE\r\n");
        assert!(a.poll_batch().unwrap().is_err());
        a.feed(b"250 recovered\r\n");
        assert_eq!(next(&mut a)[0].message, vec!["recovered"]);
    }

    #[test]
    fn overlong_line_is_an_error() {
        let mut a = ReplyAssembler::new();
        a.feed(&vec![b'2'; MAX_LINE_LENGTH + 1]);
        assert!(a.poll_batch().unwrap().is_err());
        assert!(a.is_empty());
    }

    #[test]
    fn reset_discards_partial_input() {
        let mut a = ReplyAssembler::new();
        a.set_expected(2);
        a.feed(b"250 one\r\n250-par");
        assert!(a.poll_batch().is_none());
        a.reset();
        assert!(a.is_empty());
        assert_eq!(a.expected(), 2);
    }

    proptest::proptest! {
        #[test]
        fn read_boundaries_do_not_matter(split in 0usize..64) {
            let wire = b"250-mx.example.com\r\n250 PIPELINING\r\n354 go ahead\r\n";
            let split = split.min(wire.len());

            let mut a = ReplyAssembler::new();
            a.set_expected(2);
            a.feed(&wire[..split]);
            let early = a.poll_batch();
            a.feed(&wire[split..]);
            let batch = match early {
                Some(batch) => batch.unwrap(),
                None => next(&mut a),
            };

            proptest::prop_assert_eq!(batch.len(), 2);
            proptest::prop_assert_eq!(batch[0].message.len(), 2);
            proptest::prop_assert_eq!(batch[1].code, ReplyCode::START_DATA);
        }
    }
}
