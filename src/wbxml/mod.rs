//! WBXML binary codec for the SyncML 1.2 / OMA DM dialect.
//!
//! WBXML is a compact binary representation of a tagged tree, used by the
//! device fleet for over-the-air exchange. A document is a header followed
//! by a token stream:
//!
//! ```text
//! [version:1][public_id:mb-uint][charset:mb-uint][strtbl_len:mb-uint][strtbl]
//! <body>
//!
//! Body tokens:
//!   tag open      page token, bit 0x40 = has content (content ends at END)
//!   SWITCH_PAGE   0x00 <page>   change the active code page
//!   STR_I         0x03 <utf8> 0 inline null-terminated string
//!   STR_T         0x83 <offset> string table reference
//!   OPAQUE        0xC3 <len:mb-uint> <bytes>
//!   LITERAL       0x04 <offset> tag named via the string table
//!   END           0x01
//! ```
//!
//! Multi-byte integers carry 7 bits per byte, high bit set on all but the
//! last byte, most significant group first.
//!
//! The codec is a pure transform with no protocol knowledge; the
//! [`TokenTable`] it is driven by defines the tag vocabulary.

mod codec;
mod element;
mod mbuint;
mod tokens;

pub use codec::{decode, encode, looks_binary};
pub use element::Element;
pub use mbuint::{mbuint_size, read_mbuint, write_mbuint};
pub use tokens::{
    TokenTable, CHARSET_UTF8, END, LITERAL, OPAQUE, STR_I, STR_T, SWITCH_PAGE,
    SYNCML_1_2_PUBLIC_ID, TAG_HAS_ATTRS, TAG_HAS_CONTENT, TAG_MASK, WBXML_VERSION,
};
