// src/payload/tree.rs
//! The TLV node store (C3) and dual-view engine (C4), the heart of the codec.
//!
//! A node presents either an opaque raw payload or an ordered sequence of child
//! nodes, never both at once, and casts between the two on demand.

use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt::Write as _;

use super::Payload;
use crate::error::TlvError;
use crate::header::{self, TlvFlags};

/// Which shape a node's payload currently presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Raw,
    Nested,
}

#[derive(Debug)]
struct NodeInner {
    tag: u16,
    flags: TlvFlags,
    view: View,
    payload: Payload,
    /// Parse-time hint: payload encodes a minimal big-endian unsigned integer.
    /// Serializes identically to a plain raw payload; never a third view variant.
    is_integer_hint: bool,
    children: Option<Vec<TlvNode>>,
    absolute_offset: Option<usize>,
    relative_offset: Option<usize>,
}

/// A strong handle to a TLV node.
///
/// Cloning a handle is the spec's "share" operation: it bumps `Rc`'s strong
/// count rather than copying node contents. Dropping the last handle releases
/// the backing buffer and recursively drops owned children.
#[derive(Debug, Clone)]
pub struct TlvNode(Rc<RefCell<NodeInner>>);

/// A non-owning reference to a node, for callers that must not extend its
/// lifetime (e.g. the ownership test in the crate's test suite).
#[derive(Debug, Clone)]
pub struct WeakTlvNode(Weak<RefCell<NodeInner>>);

impl WeakTlvNode {
    pub fn upgrade(&self) -> Option<TlvNode> {
        self.0.upgrade().map(TlvNode)
    }
}

impl TlvNode {
    /// `new(tag, flags, view)`: empty payload, no backing buffer.
    pub fn new(tag: u16, flags: TlvFlags, view: View) -> Result<Self, TlvError> {
        if tag > header::MAX_TAG {
            return Err(TlvError::InvalidArgument);
        }
        let children = match view {
            View::Nested => Some(Vec::new()),
            View::Raw => None,
        };
        Ok(TlvNode(Rc::new(RefCell::new(NodeInner {
            tag,
            flags,
            view,
            payload: Payload::Owned(Vec::new()),
            is_integer_hint: false,
            children,
            absolute_offset: None,
            relative_offset: None,
        }))))
    }

    /// `from_uint(tag, flags, value)`: an integer-hinted raw node whose payload
    /// is the minimal big-endian encoding of `value`.
    pub fn from_uint(tag: u16, flags: TlvFlags, value: u64) -> Result<Self, TlvError> {
        let node = Self::new(tag, flags, View::Raw)?;
        node.set_uint_value(value)?;
        Ok(node)
    }

    /// `parse_blob(bytes)`: copies `bytes` into a freshly owned buffer and
    /// scans exactly one TLV out of it. Fails if the blob is not exactly one
    /// complete TLV (trailing bytes are an error, not silently dropped).
    pub fn parse_blob(bytes: &[u8]) -> Result<Self, TlvError> {
        Self::parse_blob_at(bytes, 0)
    }

    /// As [`Self::parse_blob`], but stamps `absolute_offset` with the given
    /// value instead of `0`. Used by `read_from_stream`, which knows the
    /// stream's position before the read started.
    pub(crate) fn parse_blob_at(bytes: &[u8], absolute_offset: usize) -> Result<Self, TlvError> {
        let owned: Rc<[u8]> = Rc::from(bytes);
        let (decoded, consumed) = header::scan_one(&owned)?;
        if consumed != owned.len() {
            return Err(TlvError::InvalidFormat);
        }
        let payload_range = decoded.header_len..consumed;
        Ok(TlvNode(Rc::new(RefCell::new(NodeInner {
            tag: decoded.tag,
            flags: decoded.flags,
            view: View::Raw,
            payload: Payload::Borrowed(owned, payload_range),
            is_integer_hint: false,
            children: None,
            absolute_offset: Some(absolute_offset),
            relative_offset: Some(0),
        }))))
    }

    /// Scans one child out of `buf` starting at `offset`, used recursively by
    /// [`Self::cast_to_nested`]. `absolute_base` is the parent's own absolute
    /// offset (if known), so grandchildren keep stream-relative absolute offsets.
    fn scan_child(
        buf: &Rc<[u8]>,
        offset: usize,
        absolute_base: Option<usize>,
    ) -> Result<(TlvNode, usize), TlvError> {
        let (decoded, consumed) = header::scan_one(&buf[offset..])?;
        if consumed == 0 {
            return Err(TlvError::InvalidFormat);
        }
        let payload_range = offset + decoded.header_len..offset + consumed;
        let node = TlvNode(Rc::new(RefCell::new(NodeInner {
            tag: decoded.tag,
            flags: decoded.flags,
            view: View::Raw,
            payload: Payload::Borrowed(buf.clone(), payload_range),
            is_integer_hint: false,
            children: None,
            absolute_offset: absolute_base.map(|base| base + offset),
            relative_offset: Some(offset),
        })));
        Ok((node, consumed))
    }

    pub fn tag(&self) -> u16 {
        self.0.borrow().tag
    }

    pub fn lenient(&self) -> bool {
        self.0.borrow().flags.lenient
    }

    pub fn forward(&self) -> bool {
        self.0.borrow().flags.forward
    }

    pub fn flags(&self) -> TlvFlags {
        self.0.borrow().flags
    }

    pub fn absolute_offset(&self) -> Option<usize> {
        self.0.borrow().absolute_offset
    }

    pub fn relative_offset(&self) -> Option<usize> {
        self.0.borrow().relative_offset
    }

    pub fn is_integer_hint(&self) -> bool {
        self.0.borrow().is_integer_hint
    }

    pub fn is_raw(&self) -> bool {
        self.0.borrow().view == View::Raw
    }

    pub fn is_nested(&self) -> bool {
        self.0.borrow().view == View::Nested
    }

    /// Number of outstanding strong handles to this node.
    pub fn share_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    pub fn downgrade(&self) -> WeakTlvNode {
        WeakTlvNode(Rc::downgrade(&self.0))
    }

    /// Drops this handle. Purely documentary, the same as letting `self` go
    /// out of scope, but named to match the reference implementation's
    /// explicit `release` vocabulary.
    pub fn release(self) {
        drop(self);
    }

    /// Raw payload bytes. Fails [`TlvError::PayloadTypeMismatch`] if the node is
    /// in nested view.
    pub fn raw_payload(&self) -> Result<Vec<u8>, TlvError> {
        let inner = self.0.borrow();
        match inner.view {
            View::Raw => Ok(inner.payload.as_slice().to_vec()),
            View::Nested => Err(TlvError::PayloadTypeMismatch),
        }
    }

    /// The node's children, as additional shared handles (cloning the returned
    /// `Vec` bumps each child's strong count, it does not deep-copy). Fails
    /// [`TlvError::PayloadTypeMismatch`] if the node is in raw view.
    pub fn children(&self) -> Result<Vec<TlvNode>, TlvError> {
        let inner = self.0.borrow();
        match (&inner.view, &inner.children) {
            (View::Nested, Some(children)) => Ok(children.clone()),
            _ => Err(TlvError::PayloadTypeMismatch),
        }
    }

    pub fn child_count(&self) -> Result<usize, TlvError> {
        let inner = self.0.borrow();
        match (&inner.view, &inner.children) {
            (View::Nested, Some(children)) => Ok(children.len()),
            _ => Err(TlvError::PayloadTypeMismatch),
        }
    }

    /// `set_raw_value(node, bytes)`: node must be in raw view; `bytes.len()`
    /// must stay under the 65,536-byte wire cap.
    pub fn set_raw_value(&self, bytes: &[u8]) -> Result<(), TlvError> {
        if !self.is_raw() {
            return Err(TlvError::PayloadTypeMismatch);
        }
        if bytes.len() > header::MAX_PAYLOAD_LEN {
            return Err(TlvError::BufferOverflow {
                needed: bytes.len(),
                available: header::MAX_PAYLOAD_LEN,
            });
        }
        let mut inner = self.0.borrow_mut();
        inner.payload = Payload::Owned(bytes.to_vec());
        inner.is_integer_hint = false;
        Ok(())
    }

    /// `set_uint_value(node, value)`: rewrites the payload with the minimal
    /// big-endian encoding of `value` and marks it with the integer hint.
    pub fn set_uint_value(&self, value: u64) -> Result<(), TlvError> {
        if !self.is_raw() {
            return Err(TlvError::PayloadTypeMismatch);
        }
        let bytes = minimal_be_bytes(value);
        let mut inner = self.0.borrow_mut();
        inner.payload = Payload::Owned(bytes);
        inner.is_integer_hint = true;
        Ok(())
    }

    /// `append_child(parent, child)`: parent must already be nested, or raw
    /// with an empty payload (in which case it is promoted to nested on the
    /// spot). Appends at the tail, preserving prior order.
    pub fn append_child(&self, child: TlvNode) -> Result<(), TlvError> {
        let mut inner = self.0.borrow_mut();
        match inner.view {
            View::Nested => {}
            View::Raw if inner.payload.is_empty() => {
                inner.view = View::Nested;
                inner.children = Some(Vec::new());
            }
            View::Raw => return Err(TlvError::PayloadTypeMismatch),
        }
        inner
            .children
            .as_mut()
            .expect("nested view always carries a child list")
            .push(child);
        Ok(())
    }

    /// `remove_child(parent, child)`: located by handle identity, not by tag.
    pub fn remove_child(&self, child: &TlvNode) -> Result<(), TlvError> {
        let mut inner = self.0.borrow_mut();
        if inner.view != View::Nested {
            return Err(TlvError::PayloadTypeMismatch);
        }
        let children = inner
            .children
            .as_mut()
            .ok_or(TlvError::PayloadTypeMismatch)?;
        let pos = children
            .iter()
            .position(|c| Rc::ptr_eq(&c.0, &child.0))
            .ok_or(TlvError::InvalidArgument)?;
        children.remove(pos);
        Ok(())
    }

    /// `replace_child(parent, old, new)`: located by handle identity.
    pub fn replace_child(&self, old: &TlvNode, new: TlvNode) -> Result<(), TlvError> {
        let mut inner = self.0.borrow_mut();
        if inner.view != View::Nested {
            return Err(TlvError::PayloadTypeMismatch);
        }
        let children = inner
            .children
            .as_mut()
            .ok_or(TlvError::PayloadTypeMismatch)?;
        let pos = children
            .iter()
            .position(|c| Rc::ptr_eq(&c.0, &old.0))
            .ok_or(TlvError::InvalidArgument)?;
        children[pos] = new;
        Ok(())
    }

    /// Cast to raw (from nested): serializes current children into this node's
    /// own buffer and discards the child list. No-op if already raw.
    ///
    /// Transactional: children are cloned (cheap `Rc` bumps) and serialized
    /// before anything on `self` is mutated, so a serialization failure leaves
    /// the node exactly as it was.
    pub fn cast_to_raw(&self) -> Result<(), TlvError> {
        if self.is_raw() {
            return Ok(());
        }
        let children = {
            let inner = self.0.borrow();
            inner
                .children
                .clone()
                .ok_or(TlvError::PayloadTypeMismatch)?
        };
        let serialized = crate::pack::serialize_children(&children)?;
        let mut inner = self.0.borrow_mut();
        inner.payload = Payload::Owned(serialized);
        inner.is_integer_hint = false;
        inner.view = View::Raw;
        inner.children = None;
        Ok(())
    }

    /// Cast to nested (from raw): repeatedly scans the payload into an ordered
    /// child list. No-op if already nested; fails
    /// [`TlvError::PayloadTypeMismatch`] if the node carries neither view (which
    /// cannot happen through the public API, but guards future view kinds).
    ///
    /// Transactional: the child list is built up locally and only swapped into
    /// `self` once the whole payload has been consumed with nothing left over.
    pub fn cast_to_nested(&self) -> Result<(), TlvError> {
        if self.is_nested() {
            return Ok(());
        }
        let (payload_bytes, absolute_base): (Rc<[u8]>, Option<usize>) = {
            let inner = self.0.borrow();
            if inner.view != View::Raw {
                return Err(TlvError::PayloadTypeMismatch);
            }
            let bytes: Rc<[u8]> = Rc::from(inner.payload.as_slice());
            (bytes, inner.absolute_offset)
        };

        let mut children = Vec::new();
        let mut cursor = 0usize;
        let len = payload_bytes.len();
        while cursor < len {
            let (child, consumed) = Self::scan_child(&payload_bytes, cursor, absolute_base)?;
            if consumed == 0 {
                return Err(TlvError::InvalidFormat);
            }
            children.push(child);
            cursor += consumed;
        }
        if cursor != len {
            return Err(TlvError::InvalidFormat);
        }

        let mut inner = self.0.borrow_mut();
        inner.children = Some(children);
        inner.view = View::Nested;
        Ok(())
    }

    /// Deep clone: serialize this node to bytes, re-parse it, then recursively
    /// restore nested view on every subtree that was nested in the original, so
    /// the clone matches both the original's byte layout and its view mode.
    ///
    /// This additionally checks each child's tag before descending (not just
    /// the child count), catching a serializer/parser disagreement earlier.
    pub fn deep_clone(&self) -> Result<TlvNode, TlvError> {
        let bytes = crate::pack::serialize(self)?;
        let fresh = TlvNode::parse_blob(&bytes)?;
        Self::expand_like(self, &fresh)?;
        Ok(fresh)
    }

    fn expand_like(original: &TlvNode, fresh: &TlvNode) -> Result<(), TlvError> {
        if !original.is_nested() {
            return Ok(());
        }
        fresh.cast_to_nested()?;
        let originals = original.children()?;
        let freshes = fresh.children()?;
        if originals.len() != freshes.len() {
            return Err(TlvError::Unknown);
        }
        for (o, f) in originals.iter().zip(freshes.iter()) {
            if o.tag() != f.tag() {
                return Err(TlvError::Unknown);
            }
            Self::expand_like(o, f)?;
        }
        Ok(())
    }

    /// Structural equality ignoring offsets and handle identity: same tag,
    /// flags, view mode and (recursively) payload/children. Used by tests.
    pub fn deep_eq(&self, other: &TlvNode) -> bool {
        if self.tag() != other.tag() || self.flags() != other.flags() {
            return false;
        }
        match (self.is_raw(), other.is_raw()) {
            (true, true) => self.raw_payload().ok() == other.raw_payload().ok(),
            (false, false) => {
                let a = match self.children() {
                    Ok(c) => c,
                    Err(_) => return false,
                };
                let b = match other.children() {
                    Ok(c) => c,
                    Err(_) => return false,
                };
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            _ => false,
        }
    }

    /// Diagnostic dump: tag in hex, flags as `L`/`-` and `F`/`-`, and either a
    /// hex dump of the payload or a recursive indented dump of the children.
    pub fn to_string_tree(&self, indent: usize) -> String {
        let mut out = String::new();
        self.write_string_tree(indent, &mut out);
        out
    }

    fn write_string_tree(&self, indent: usize, out: &mut String) {
        let inner = self.0.borrow();
        for _ in 0..indent {
            let _ = out.write_str("  ");
        }
        let l = if inner.flags.lenient { 'L' } else { '-' };
        let f = if inner.flags.forward { 'F' } else { '-' };
        match &inner.view {
            View::Raw => {
                let _ = write!(out, "TLV[0x{:04x}]({}{}): ", inner.tag, l, f);
                for b in inner.payload.as_slice() {
                    let _ = write!(out, "{:02x}", b);
                }
                let _ = writeln!(out);
            }
            View::Nested => {
                let _ = writeln!(out, "TLV[0x{:04x}]({}{}):", inner.tag, l, f);
                if let Some(children) = &inner.children {
                    for child in children {
                        child.write_string_tree(indent + 1, out);
                    }
                }
            }
        }
    }
}

fn minimal_be_bytes(value: u64) -> Vec<u8> {
    if value == 0 {
        return Vec::new();
    }
    let be = value.to_be_bytes();
    let first_nonzero = be.iter().position(|&b| b != 0).unwrap();
    be[first_nonzero..].to_vec()
}
