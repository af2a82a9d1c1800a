use bytes::{Buf, BytesMut};
use std::{cmp, io};
use tokio_util::codec::Decoder;
use tracing::warn;

/// Splits the ingest stream into lines.
///
/// Unlike `LinesCodec` it never fails a connection over content: bytes that
/// are not valid UTF-8 are replaced, and a line longer than `max_length` is
/// skipped up to its terminator. A trailing line without a terminator is
/// still delivered when the peer closes.
#[derive(Debug)]
pub struct LogLineCodec {
    max_length: usize,
    next_index: usize,
    discarding: bool,
}

impl LogLineCodec {
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: false,
        }
    }
}

impl Decoder for LogLineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            let read_to = cmp::min(self.max_length.saturating_add(1), src.len());
            let newline = src[self.next_index..read_to]
                .iter()
                .position(|b| *b == b'\n');

            match (self.discarding, newline) {
                (true, Some(offset)) => {
                    src.advance(self.next_index + offset + 1);
                    self.next_index = 0;
                    self.discarding = false;
                }
                (true, None) => {
                    src.advance(read_to);
                    self.next_index = 0;
                    if src.is_empty() {
                        return Ok(None);
                    }
                }
                (false, Some(offset)) => {
                    let newline_index = self.next_index + offset;
                    self.next_index = 0;
                    let line = src.split_to(newline_index + 1);
                    return Ok(Some(to_line(&line[..newline_index])));
                }
                (false, None) if src.len() > self.max_length => {
                    warn!("Dropping log line longer than {} bytes", self.max_length);
                    self.discarding = true;
                }
                (false, None) => {
                    self.next_index = read_to;
                    return Ok(None);
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if self.discarding || src.is_empty() {
            self.discarding = false;
            src.clear();
            return Ok(None);
        }
        let line = src.split_to(src.len());
        Ok(Some(to_line(&line)))
    }
}

fn to_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}
