//! Rolling transcript of terminal output.
//!
//! Bounded by a byte cap. When an append pushes it over, the oldest bytes
//! go first; whatever remains is always the most recent output.

use std::collections::VecDeque;

pub const DEFAULT_TRANSCRIPT_CAP: usize = 200_000;

#[derive(Debug, Clone)]
pub struct TranscriptBuffer {
    bytes: VecDeque<u8>,
    cap: usize,
}

impl TranscriptBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            bytes: VecDeque::new(),
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }

    pub fn append(&mut self, data: &[u8]) {
        if self.cap == 0 {
            return;
        }
        // Only the tail of an oversized chunk can survive anyway
        let skipped = data.len().saturating_sub(self.cap);
        self.bytes.extend(&data[skipped..]);

        let overflow = self.bytes.len().saturating_sub(self.cap);
        if overflow > 0 || skipped > 0 {
            self.bytes.drain(..overflow);
            // Don't leave half a UTF-8 sequence at the front
            while matches!(self.bytes.front(), Some(b) if b & 0xC0 == 0x80) {
                self.bytes.pop_front();
            }
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.iter().copied().collect()
    }

    pub fn export(&self) -> String {
        String::from_utf8_lossy(&self.to_bytes()).into_owned()
    }
}

impl Default for TranscriptBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_TRANSCRIPT_CAP)
    }
}
