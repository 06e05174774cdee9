//! Tail-cursor abstraction for the backward-writing serializer (C5).
//!
//! Writing payload before header means the final length is known before the
//! header form (TLV8 vs TLV16) must be chosen. `BackFiller` hides the shrinking
//! write cursor behind `write_tail`, so callers never touch raw indices.

use crate::error::TlvError;

pub struct BackFiller<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> BackFiller<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        let pos = buf.len();
        Self { buf, pos }
    }

    /// Bytes still unwritten at the front of the buffer.
    pub fn remaining(&self) -> usize {
        self.pos
    }

    /// Writes `bytes` immediately before the current cursor, then moves the
    /// cursor back by `bytes.len()`.
    pub fn write_tail(&mut self, bytes: &[u8]) -> Result<(), TlvError> {
        if bytes.len() > self.pos {
            return Err(TlvError::BufferOverflow {
                needed: bytes.len(),
                available: self.pos,
            });
        }
        self.pos -= bytes.len();
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
