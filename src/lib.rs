#![no_std]

#[cfg(any(feature = "std", test))]
extern crate std;

// Needed for Vec/Rc.
extern crate alloc;

pub mod backfill;
pub mod error;
pub mod header;
pub mod pack;
pub mod payload;

pub use error::TlvError;
pub use header::{HeaderForm, TlvFlags, MAX_PAYLOAD_LEN, MAX_TAG, TLV8_MAX_LEN, TLV8_MAX_TAG};
pub use pack::{encoded_len, serialize, write_bytes, WriteOptions};
pub use payload::reader::{read_from_stream, ByteReader, SliceReader};
pub use payload::tree::{TlvNode, View, WeakTlvNode};

#[cfg(feature = "std")]
pub use payload::reader::StdReader;
