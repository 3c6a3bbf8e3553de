// TLS specific helpers for parsing and serializing binary wire values.
//
// These mirror the length-prefixed "varlen_vector" wire format used throughout
// the protocol: a fixed-width length field (1, 2, 3 or 4 bytes, chosen by the
// max possible size of the payload) followed by that many bytes of payload.

use bytes::{Buf, Bytes};

use crate::tls::error::{HandshakeError, Result};

pub const U8_LIMIT: usize = u8::max_value() as usize;
pub const U16_LIMIT: usize = u16::max_value() as usize;
pub const U24_LIMIT: usize = 1 << 24;
pub const U32_LIMIT: usize = u32::max_value() as usize;

fn len_field_width(max_bytes: usize) -> usize {
    if max_bytes <= U8_LIMIT {
        1
    } else if max_bytes <= U16_LIMIT {
        2
    } else if max_bytes <= U24_LIMIT {
        3
    } else if max_bytes <= U32_LIMIT {
        4
    } else {
        panic!("maximum length not supported")
    }
}

/// Reads one big-endian `width`-byte unsigned integer from the front of `input`.
pub fn read_uint(input: &mut Bytes, width: usize) -> Result<usize> {
    if input.remaining() < width {
        return Err(HandshakeError::UnexpectedMessage(
            "truncated length field".into(),
        ));
    }
    let mut v: usize = 0;
    for _ in 0..width {
        v = (v << 8) | (input.get_u8() as usize);
    }
    Ok(v)
}

pub fn write_uint(out: &mut Vec<u8>, width: usize, value: usize) {
    for i in (0..width).rev() {
        out.push(((value >> (8 * i)) & 0xff) as u8);
    }
}

/// Reads a length-prefixed vector of bytes: `length(n) || data`, `n` chosen by
/// `max_bytes`. Fails if the decoded length falls outside `[min_bytes, max_bytes]`
/// or the input is too short.
pub fn varlen_vector(input: &mut Bytes, min_bytes: usize, max_bytes: usize) -> Result<Bytes> {
    let width = len_field_width(max_bytes);
    let len = read_uint(input, width)?;
    if len < min_bytes || len > max_bytes {
        return Err(HandshakeError::UnexpectedMessage(
            "length out of allowed range".into(),
        ));
    }
    if input.remaining() < len {
        return Err(HandshakeError::UnexpectedMessage(
            "truncated varlen vector".into(),
        ));
    }
    Ok(input.split_to(len))
}

/// Encodes a byte vector using the length-prefixed wire format defined by TLS.
/// `f` appends the payload to `out`; the length prefix is backpatched in place.
pub fn serialize_varlen_vector<F: FnMut(&mut Vec<u8>)>(
    min_bytes: usize,
    max_bytes: usize,
    out: &mut Vec<u8>,
    mut f: F,
) {
    let width = len_field_width(max_bytes);
    let i = out.len();
    out.resize(i + width, 0);
    let body_start = out.len();

    f(out);

    let size = out.len() - body_start;
    assert!(
        size >= min_bytes && size <= max_bytes,
        "varlen vector payload out of bounds"
    );

    for (j, byte) in out[i..i + width].iter_mut().enumerate() {
        let shift = 8 * (width - 1 - j);
        *byte = ((size >> shift) & 0xff) as u8;
    }
}
