//! Multi-byte unsigned integer encoding for WBXML.
//!
//! Seven payload bits per byte with the high bit as a continuation marker,
//! most significant group first:
//! - 0-127: 1 byte
//! - 128-16383: 2 bytes
//! - 16384-2097151: 3 bytes

use crate::error::{DmError, Result};

/// Write a multi-byte uint32 to a buffer.
pub fn write_mbuint(buf: &mut Vec<u8>, value: u32) {
    if value == 0 {
        buf.push(0);
        return;
    }

    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut v = value;
    while v > 0 {
        groups[count] = (v & 0x7F) as u8;
        v >>= 7;
        count += 1;
    }

    // Groups were collected least significant first; emit in wire order.
    for i in (0..count).rev() {
        let mut byte = groups[i];
        if i > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
    }
}

/// Read a multi-byte uint32 from a byte slice, returning (value, bytes_consumed).
pub fn read_mbuint(data: &[u8]) -> Result<(u32, usize)> {
    let mut result: u32 = 0;
    let mut pos = 0;

    loop {
        if pos >= data.len() {
            return Err(DmError::Decode(
                "mb-uint32: unexpected end of data".to_string(),
            ));
        }
        if pos >= 5 {
            return Err(DmError::Decode("mb-uint32 overflow".to_string()));
        }

        let byte = data[pos];
        pos += 1;

        result = (result << 7) | u32::from(byte & 0x7F);

        if byte & 0x80 == 0 {
            break;
        }
    }

    Ok((result, pos))
}

/// Number of bytes needed to encode a value.
pub fn mbuint_size(value: u32) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 32 - value.leading_zeros() as usize;
    (bits + 6) / 7
}
