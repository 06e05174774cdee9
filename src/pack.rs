// src/pack.rs
//! Backward-writing serializer (C5).
//!
//! Payload bytes are written before the header so the final length is known
//! before the header form (TLV8 vs TLV16) has to be chosen, the same trick
//! the spec's `BackFiller`-based header codec relies on. A node's exact
//! encoded length is computed once up front (`encoded_len`) so the output
//! buffer is allocated at exactly the right size; there is no unconditional
//! worst-case scratch allocation.

use alloc::vec::Vec;

use crate::backfill::BackFiller;
use crate::error::TlvError;
use crate::header;
use crate::payload::tree::TlvNode;

/// Options controlling what [`write_bytes`] emits into a caller-supplied buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Emit payload only, skipping this node's own header. Used by casts and
    /// by callers serializing a node's value without its tag/length prefix.
    pub no_header: bool,
    /// Leave the written bytes at the tail of the buffer instead of shifting
    /// them to the front. Useful for callers who are themselves concatenating
    /// several serializations from the right.
    pub no_move: bool,
}

/// Exact number of bytes a full serialization of `node` (header + payload)
/// would occupy. Used to size the output buffer before writing a single byte
/// (the "measurement mode" the spec requires callers be able to reach).
pub fn encoded_len(node: &TlvNode) -> Result<usize, TlvError> {
    let payload_len = payload_len_of(node)?;
    let header_len = header::header_len_for(node.tag(), payload_len)?;
    Ok(header_len + payload_len)
}

fn payload_len_of(node: &TlvNode) -> Result<usize, TlvError> {
    if node.is_raw() {
        Ok(node.raw_payload()?.len())
    } else {
        let children = node.children()?;
        children
            .iter()
            .try_fold(0usize, |acc, child| Ok(acc + encoded_len(child)?))
    }
}

/// Serializes `node` (header + payload, recursively) into a freshly
/// allocated buffer sized to exactly fit.
pub fn serialize(node: &TlvNode) -> Result<Vec<u8>, TlvError> {
    let len = encoded_len(node)?;
    let mut buf = alloc::vec![0u8; len];
    let mut filler = BackFiller::new(&mut buf);
    write_node_tail(node, &mut filler, false)?;
    Ok(buf)
}

/// Serializes an ordered list of children, each with its own header, in
/// stored order, the payload a node in nested view would produce when cast
/// to raw. Children are visited in reverse since each write lands at the
/// shrinking tail; the concatenation still reads in forward order.
pub fn serialize_children(children: &[TlvNode]) -> Result<Vec<u8>, TlvError> {
    let total = children
        .iter()
        .try_fold(0usize, |acc, child| Ok(acc + encoded_len(child)?))?;
    let mut buf = alloc::vec![0u8; total];
    let mut filler = BackFiller::new(&mut buf);
    for child in children.iter().rev() {
        write_node_tail(child, &mut filler, false)?;
    }
    Ok(buf)
}

/// `write_bytes(node, buf, opts)`, the spec's C5 entry point for callers who
/// supply their own (possibly oversized) buffer rather than letting the codec
/// allocate one. Returns the number of bytes actually written.
pub fn write_bytes(node: &TlvNode, buf: &mut [u8], opts: WriteOptions) -> Result<usize, TlvError> {
    let mut filler = BackFiller::new(buf);
    write_node_tail(node, &mut filler, opts.no_header)?;
    let written = buf.len() - filler.remaining();
    if !opts.no_move && filler.remaining() > 0 {
        let start = buf.len() - written;
        buf.copy_within(start.., 0);
    }
    Ok(written)
}

/// Writes one node's payload to the tail of `filler`, then (unless
/// `no_header`) its header, returning nothing. The header length needed
/// depends only on the payload length just written, which this function
/// already knows without a second pass over the node.
fn write_node_tail(
    node: &TlvNode,
    filler: &mut BackFiller<'_>,
    no_header: bool,
) -> Result<(), TlvError> {
    let payload_len = write_payload_tail(node, filler)?;
    if !no_header {
        header::encode_header_tail(node.tag(), node.flags(), payload_len, filler)?;
    }
    Ok(())
}

/// Writes just `node`'s payload bytes to the tail of `filler`: a memcpy for
/// raw/integer views, or each child (with its own header) for nested views.
/// Returns the number of payload bytes written.
fn write_payload_tail(node: &TlvNode, filler: &mut BackFiller<'_>) -> Result<usize, TlvError> {
    if node.is_raw() {
        let payload = node.raw_payload()?;
        filler.write_tail(&payload)?;
        Ok(payload.len())
    } else {
        let children = node.children()?;
        let before = filler.remaining();
        for child in children.iter().rev() {
            write_node_tail(child, filler, false)?;
        }
        Ok(before - filler.remaining())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::TlvFlags;
    use crate::payload::tree::View;

    fn flags(lenient: bool, forward: bool) -> TlvFlags {
        TlvFlags::new(lenient, forward)
    }

    #[test]
    fn tlv8_leaf_round_trips_exactly() {
        let bytes = [0x01, 0x03, 0x41, 0x42, 0x43];
        let node = TlvNode::parse_blob(&bytes).unwrap();
        assert_eq!(serialize(&node).unwrap(), alloc::vec![0x01, 0x03, 0x41, 0x42, 0x43]);
    }

    #[test]
    fn tlv16_by_tag_serializes_to_four_byte_header() {
        let node = TlvNode::new(0x1234, flags(true, false), View::Raw).unwrap();
        assert_eq!(serialize(&node).unwrap(), alloc::vec![0xD2, 0x34, 0x00, 0x00]);
    }

    #[test]
    fn append_then_serialize_reflects_new_length() {
        let parent = TlvNode::new(5, flags(false, false), View::Nested).unwrap();
        parent
            .append_child(TlvNode::from_uint(1, flags(false, false), 0xAB).unwrap())
            .unwrap();
        assert_eq!(
            serialize(&parent).unwrap(),
            alloc::vec![0x05, 0x03, 0x01, 0x01, 0xAB]
        );
    }

    #[test]
    fn nested_round_trip_preserves_byte_layout() {
        let bytes = [0x05, 0x06, 0x01, 0x01, 0x07, 0x01, 0x01, 0x07];
        let node = TlvNode::parse_blob(&bytes).unwrap();
        node.cast_to_nested().unwrap();
        assert_eq!(node.child_count().unwrap(), 2);
        assert_eq!(serialize(&node).unwrap(), bytes.to_vec());
    }

    #[test]
    fn write_bytes_into_oversized_buffer_shifts_to_front_by_default() {
        let node = TlvNode::parse_blob(&[0x01, 0x03, 0x41, 0x42, 0x43]).unwrap();
        let mut buf = [0u8; 16];
        let written = write_bytes(&node, &mut buf, WriteOptions::default()).unwrap();
        assert_eq!(written, 5);
        assert_eq!(&buf[..5], &[0x01, 0x03, 0x41, 0x42, 0x43]);
    }

    #[test]
    fn write_bytes_no_move_leaves_bytes_at_tail() {
        let node = TlvNode::parse_blob(&[0x01, 0x03, 0x41, 0x42, 0x43]).unwrap();
        let mut buf = [0u8; 16];
        let opts = WriteOptions {
            no_header: false,
            no_move: true,
        };
        let written = write_bytes(&node, &mut buf, opts).unwrap();
        assert_eq!(written, 5);
        assert_eq!(&buf[11..], &[0x01, 0x03, 0x41, 0x42, 0x43]);
    }

    #[test]
    fn write_bytes_no_header_emits_payload_only() {
        let node = TlvNode::parse_blob(&[0x01, 0x03, 0x41, 0x42, 0x43]).unwrap();
        let mut buf = [0u8; 3];
        let opts = WriteOptions {
            no_header: true,
            no_move: false,
        };
        let written = write_bytes(&node, &mut buf, opts).unwrap();
        assert_eq!(written, 3);
        assert_eq!(&buf, &[0x41, 0x42, 0x43]);
    }

    #[test]
    fn write_bytes_reports_buffer_overflow_without_writing_garbage_length() {
        let node = TlvNode::parse_blob(&[0x01, 0x03, 0x41, 0x42, 0x43]).unwrap();
        let mut buf = [0u8; 2];
        let err = write_bytes(&node, &mut buf, WriteOptions::default()).unwrap_err();
        assert!(matches!(err, TlvError::BufferOverflow { .. }));
    }

    #[test]
    fn encoded_len_matches_actual_serialization() {
        let parent = TlvNode::new(5, flags(false, false), View::Nested).unwrap();
        parent
            .append_child(TlvNode::from_uint(1, flags(false, false), 0xAB).unwrap())
            .unwrap();
        parent
            .append_child(TlvNode::from_uint(2, flags(false, false), 0x100).unwrap())
            .unwrap();
        assert_eq!(encoded_len(&parent).unwrap(), serialize(&parent).unwrap().len());
    }
}
