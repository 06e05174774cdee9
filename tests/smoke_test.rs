//! End-to-end scenarios against the public API, one per concrete case in the
//! codec's testable-properties section. No internals reached through
//! `crate::` paths — everything here goes through `ksi_tlv::`.

use ksi_tlv::error::TlvError;
use ksi_tlv::header::TlvFlags;
use ksi_tlv::payload::reader::{read_from_stream, SliceReader};
use ksi_tlv::payload::tree::{TlvNode, View};

fn flags(lenient: bool, forward: bool) -> TlvFlags {
    TlvFlags::new(lenient, forward)
}

#[test]
fn scenario_tlv8_leaf() {
    let bytes = [0x01, 0x03, 0x41, 0x42, 0x43];
    let node = TlvNode::parse_blob(&bytes).unwrap();
    assert_eq!(node.tag(), 1);
    assert!(!node.lenient());
    assert!(!node.forward());
    assert_eq!(node.raw_payload().unwrap(), vec![0x41, 0x42, 0x43]);
    assert_eq!(ksi_tlv::serialize(&node).unwrap(), bytes.to_vec());
}

#[test]
fn scenario_tlv16_by_length() {
    let mut bytes = vec![0x00, 0x02, 0x01, 0x00];
    bytes.extend(core::iter::repeat(0xAAu8).take(256));
    let node = TlvNode::parse_blob(&bytes).unwrap();
    assert_eq!(node.tag(), 2);
    assert_eq!(node.raw_payload().unwrap().len(), 256);
    assert!(node.raw_payload().unwrap().iter().all(|&b| b == 0xAA));
    assert_eq!(ksi_tlv::serialize(&node).unwrap(), bytes);
}

#[test]
fn scenario_tlv16_by_tag() {
    let node = TlvNode::new(0x1234, flags(true, false), View::Raw).unwrap();
    let encoded = ksi_tlv::serialize(&node).unwrap();
    assert_eq!(encoded, vec![0xD2, 0x34, 0x00, 0x00]);
}

#[test]
fn scenario_nested_round_trip() {
    let bytes = [0x05, 0x06, 0x01, 0x01, 0x07, 0x01, 0x01, 0x07];
    let node = TlvNode::parse_blob(&bytes).unwrap();
    node.cast_to_nested().unwrap();
    let children = node.children().unwrap();
    assert_eq!(children.len(), 2);
    for child in &children {
        assert_eq!(child.tag(), 1);
        assert_eq!(child.raw_payload().unwrap(), vec![0x07]);
    }
    node.cast_to_raw().unwrap();
    assert_eq!(ksi_tlv::serialize(&node).unwrap(), bytes.to_vec());
}

#[test]
fn scenario_append_changes_length() {
    let parent = TlvNode::new(5, flags(false, false), View::Nested).unwrap();
    parent
        .append_child(TlvNode::from_uint(1, flags(false, false), 0xAB).unwrap())
        .unwrap();
    let encoded = ksi_tlv::serialize(&parent).unwrap();
    assert_eq!(encoded, vec![0x05, 0x03, 0x01, 0x01, 0xAB]);
}

#[test]
fn scenario_malformed_truncation() {
    let bytes = [0x01, 0x05, 0xAA, 0xBB];
    let err = TlvNode::parse_blob(&bytes).unwrap_err();
    assert_eq!(err, TlvError::InvalidFormat);
}

#[test]
fn read_from_stream_round_trips_through_a_reader() {
    let bytes = [0x05, 0x06, 0x01, 0x01, 0x07, 0x01, 0x01, 0x07];
    let mut reader = SliceReader::new(&bytes);
    let node = read_from_stream(&mut reader).unwrap().unwrap();
    assert_eq!(node.absolute_offset(), Some(0));
    assert_eq!(ksi_tlv::serialize(&node).unwrap(), bytes.to_vec());
    assert!(read_from_stream(&mut reader).unwrap().is_none());
}

#[test]
fn deep_clone_matches_original_across_append_and_cast() {
    let root = TlvNode::new(5, flags(false, true), View::Nested).unwrap();
    root.append_child(TlvNode::from_uint(1, flags(true, false), 0x100).unwrap())
        .unwrap();
    root.append_child(TlvNode::from_uint(2, flags(false, false), 0).unwrap())
        .unwrap();

    let clone = root.deep_clone().unwrap();
    assert!(root.deep_eq(&clone));
    assert!(clone.is_nested());
    assert_eq!(ksi_tlv::serialize(&root).unwrap(), ksi_tlv::serialize(&clone).unwrap());
}

#[test]
fn remove_and_replace_preserve_order_of_the_rest() {
    let parent = TlvNode::new(5, flags(false, false), View::Nested).unwrap();
    let a = TlvNode::from_uint(1, flags(false, false), 1).unwrap();
    let b = TlvNode::from_uint(1, flags(false, false), 2).unwrap();
    let c = TlvNode::from_uint(1, flags(false, false), 3).unwrap();
    parent.append_child(a.clone()).unwrap();
    parent.append_child(b.clone()).unwrap();
    parent.append_child(c.clone()).unwrap();

    parent.remove_child(&b).unwrap();
    let remaining = parent.children().unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].raw_payload().unwrap(), vec![1]);
    assert_eq!(remaining[1].raw_payload().unwrap(), vec![3]);

    let d = TlvNode::from_uint(1, flags(false, false), 9).unwrap();
    parent.replace_child(&a, d.clone()).unwrap();
    let remaining = parent.children().unwrap();
    assert_eq!(remaining[0].raw_payload().unwrap(), vec![9]);
}

#[test]
fn to_string_tree_dumps_tags_flags_and_payload() {
    let parent = TlvNode::new(5, flags(true, true), View::Nested).unwrap();
    parent
        .append_child(TlvNode::from_uint(1, flags(false, false), 0xAB).unwrap())
        .unwrap();
    let dump = parent.to_string_tree(0);
    assert!(dump.contains("TLV[0x0005](LF)"));
    assert!(dump.contains("TLV[0x0001](--): ab"));
}
