//! # nexas-pac
//!
//! Pack and unpack NeXaS PAC resource archives, and extract/reinject the
//! Japanese text section of NeXaS compiled scripts.
//!
//! * `pac` drives everything: header, index, variant dispatch, per-entry
//!   codec selection.
//! * `lzss` and `huffman` are the two payload/index codecs the container
//!   uses; `bitstream` and `priority_queue` are their shared primitives.
//! * `script` is a sibling tool sharing only Shift-JIS transcoding with the
//!   container.
//!
//! ## Buffer example
//!
//! ```rs
//! use nexas_pac::lzss;
//! let data = b"abcabcabcabcabcabc";
//! let encoded = lzss::lzss_encode(data);
//! let decoded = lzss::lzss_decode(&encoded, data.len());
//! assert_eq!(decoded, data);
//! ```

pub mod bitstream;
pub mod error;
pub mod huffman;
pub mod lzss;
pub mod pac;
pub mod priority_queue;
pub mod script;

pub use error::{Error, Result};
