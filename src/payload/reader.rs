// src/payload/reader.rs
//! The consumed "reader" interface (spec §6.2) and `read_from_stream` (C6).

use alloc::vec::Vec;

use super::tree::TlvNode;
use crate::error::TlvError;
use crate::header::{self, MAX_PAYLOAD_LEN};

/// A byte source the codec can read a single TLV out of.
///
/// Modeled on the reference implementation's `read(dst, wanted, &got)` /
/// `is_eof()` / `get_offset()` contract. A blanket impl below covers anything
/// that already implements `std::io::Read`; [`SliceReader`] covers `no_std`
/// callers who already hold the whole buffer in memory.
pub trait ByteReader {
    /// Reads up to `dst.len()` bytes, returning the number actually read.
    /// Returning `0` signals end-of-stream.
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, TlvError>;
    fn is_eof(&self) -> bool;
    fn get_offset(&self) -> usize;
}

/// A [`ByteReader`] over an in-memory slice, for callers that already have the
/// full buffer and do not want to pull in `std::io`.
pub struct SliceReader<'a> {
    data: &'a [u8],
    pos: usize,
    base_offset: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            base_offset: 0,
        }
    }

    /// Like [`Self::new`], but `get_offset` reports positions relative to
    /// `base_offset` instead of zero (for slices that are themselves a window
    /// into a larger stream).
    pub fn with_base_offset(data: &'a [u8], base_offset: usize) -> Self {
        Self {
            data,
            pos: 0,
            base_offset,
        }
    }
}

impl<'a> ByteReader for SliceReader<'a> {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, TlvError> {
        let available = self.data.len() - self.pos;
        let n = available.min(dst.len());
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn get_offset(&self) -> usize {
        self.base_offset + self.pos
    }
}

#[cfg(feature = "std")]
pub struct StdReader<R> {
    inner: R,
    offset: usize,
    eof: bool,
}

#[cfg(feature = "std")]
impl<R: std::io::Read> StdReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            offset: 0,
            eof: false,
        }
    }
}

#[cfg(feature = "std")]
impl<R: std::io::Read> ByteReader for StdReader<R> {
    fn read(&mut self, dst: &mut [u8]) -> Result<usize, TlvError> {
        let n = self.inner.read(dst).map_err(|_| TlvError::InvalidFormat)?;
        self.offset += n;
        if n == 0 {
            self.eof = true;
        }
        Ok(n)
    }

    fn is_eof(&self) -> bool {
        self.eof
    }

    fn get_offset(&self) -> usize {
        self.offset
    }
}

fn read_exact(reader: &mut impl ByteReader, dst: &mut [u8]) -> Result<(), TlvError> {
    let mut filled = 0;
    while filled < dst.len() {
        let n = reader.read(&mut dst[filled..])?;
        if n == 0 {
            return Err(TlvError::InvalidFormat);
        }
        filled += n;
    }
    Ok(())
}

/// `read_from_stream(reader)`: reads a header (up to 4 bytes) then
/// `payload_len` more bytes, then parses the concatenation as a single blob.
/// Records the stream's offset at the start of the read as the node's
/// `absolute_offset`.
///
/// Returns `Ok(None)`, not an error, if the stream is already at EOF before the
/// first header byte.
pub fn read_from_stream(reader: &mut impl ByteReader) -> Result<Option<TlvNode>, TlvError> {
    let start_offset = reader.get_offset();

    let mut first_byte = [0u8; 1];
    let n = reader.read(&mut first_byte)?;
    if n == 0 {
        return Ok(None);
    }

    // Up to 4 header bytes; the form bit in the first byte tells us how many more to expect.
    let needs_tlv16 = first_byte[0] & 0x80 != 0;
    let mut header_buf = Vec::with_capacity(4);
    header_buf.push(first_byte[0]);
    if needs_tlv16 {
        let mut rest = [0u8; 3];
        read_exact(reader, &mut rest)?;
        header_buf.extend_from_slice(&rest);
    } else {
        let mut rest = [0u8; 1];
        read_exact(reader, &mut rest)?;
        header_buf.extend_from_slice(&rest);
    }

    let (decoded, _) = header::decode_header(&header_buf)?;
    if decoded.payload_len > MAX_PAYLOAD_LEN {
        return Err(TlvError::BufferOverflow {
            needed: decoded.payload_len,
            available: MAX_PAYLOAD_LEN,
        });
    }

    let mut blob = header_buf;
    let mut payload = alloc::vec![0u8; decoded.payload_len];
    read_exact(reader, &mut payload)?;
    blob.extend_from_slice(&payload);

    let node = TlvNode::parse_blob_at(&blob, start_offset)?;
    Ok(Some(node))
}
