//! Variable-length integer encodings used in node hashing and proof prefixes.
//!
//! Two forms are used:
//!
//! - the legacy *signed* varint (`encode_varint`), which folds the sign into
//!   the low bit (`x << 1`, all bits flipped for negatives) before the
//!   base-128 encoding. Heights, sizes and versions are hashed this way.
//! - the plain unsigned protobuf varint (`encode_uvarint`), used for the
//!   length prefix in front of keys and child hashes.

/// Length-prefix byte in front of every 32-byte child hash (`uvarint(32)`).
pub const HASH_LENGTH_PREFIX: u8 = 0x20;

/// Encode an unsigned integer as a base-128 varint, least significant group first.
pub fn encode_uvarint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    while value >= 0x80 {
        out.push((value as u8 & 0x7f) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
    out
}

/// Encode a signed integer with the legacy sign-folding transform.
pub fn encode_varint(value: i64) -> Vec<u8> {
    let mut folded = (value as u64) << 1;
    if value < 0 {
        folded = !folded;
    }
    encode_uvarint(folded)
}

/// Append `uvarint(len(bytes)) ‖ bytes` to `buf`.
pub fn write_length_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&encode_uvarint(bytes.len() as u64));
    buf.extend_from_slice(bytes);
}

/// Decode an unsigned varint from the front of `bytes`.
///
/// Returns the value and the number of bytes consumed, or `None` on a
/// truncated or overlong input.
pub fn decode_uvarint(bytes: &[u8]) -> Option<(u64, usize)> {
    let mut value = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(10) {
        // The tenth group holds only bit 63.
        if i == 9 && *byte > 1 {
            return None;
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Some((value, i + 1));
        }
    }
    None
}

/// Decode a legacy signed varint from the front of `bytes`.
pub fn decode_varint(bytes: &[u8]) -> Option<(i64, usize)> {
    let (folded, read) = decode_uvarint(bytes)?;
    let value = if folded & 1 == 1 {
        !(folded >> 1) as i64
    } else {
        (folded >> 1) as i64
    };
    Some((value, read))
}
