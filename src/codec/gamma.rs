//! Elias-gamma encoding for positive integers.
//!
//! A value `n >= 1` is written as a unary length prefix of `floor(log2 n)`
//! zero-bits terminated by a one-bit, followed by the `floor(log2 n)`
//! low-order bits of `n`. The code is self-delimiting, so a sequence of
//! values concatenates into one bitstring with no separators. Packing pads
//! the final byte with zero bits; the decoder stops after the declared value
//! count and never interprets pad bits.
//!
//! Zero is not representable. Callers encoding gap sequences that may
//! contain zero must pre-shift by +1 before encoding (the posting store
//! does exactly that).

use bit_vec::BitVec;

use crate::error::{MyrtusError, Result};

/// Append the gamma code of `value` to `bits`.
///
/// Returns `InvalidInput` if `value` is zero.
pub fn encode_into(bits: &mut BitVec, value: u64) -> Result<()> {
    if value == 0 {
        return Err(MyrtusError::invalid_input(
            "gamma code is undefined for zero",
        ));
    }

    let width = 63 - value.leading_zeros() as u64; // floor(log2 value)

    for _ in 0..width {
        bits.push(false);
    }
    bits.push(true);

    // Offset: the low `width` bits of the value, most significant first.
    for i in (0..width).rev() {
        bits.push((value >> i) & 1 == 1);
    }

    Ok(())
}

/// Encode a sequence of positive integers into one concatenated bitstring.
pub fn encode_sequence(values: &[u64]) -> Result<BitVec> {
    let mut bits = BitVec::new();
    for &value in values {
        encode_into(&mut bits, value)?;
    }
    Ok(bits)
}

/// Serialize a bitstring into a byte buffer, padding the final byte with
/// zero bits.
pub fn pack(bits: &BitVec) -> Vec<u8> {
    bits.to_bytes()
}

/// Decode exactly `count` gamma-coded values from a packed byte buffer.
///
/// Fails with `MalformedBitstream` if the buffer is exhausted mid-code or a
/// unary prefix runs past the end of the stream.
pub fn decode_sequence(bytes: &[u8], count: usize) -> Result<Vec<u64>> {
    let bits = BitVec::from_bytes(bytes);
    let total = bits.len();
    let mut values = Vec::with_capacity(count);
    let mut pos = 0usize;

    for _ in 0..count {
        // Unary prefix: zero-bits terminated by a one-bit.
        let mut width = 0usize;
        loop {
            match bits.get(pos) {
                Some(false) => {
                    width += 1;
                    pos += 1;
                }
                Some(true) => {
                    pos += 1;
                    break;
                }
                None => {
                    return Err(MyrtusError::malformed_bitstream(format!(
                        "unterminated unary prefix at bit {pos} of {total}"
                    )));
                }
            }
        }

        if pos + width > total {
            return Err(MyrtusError::malformed_bitstream(format!(
                "stream exhausted at bit {pos}: {width} offset bits expected, {} available",
                total - pos
            )));
        }

        let mut value = 1u64;
        for _ in 0..width {
            value = (value << 1) | u64::from(bits.get(pos).unwrap_or(false));
            pos += 1;
        }
        values.push(value);
    }

    Ok(values)
}
