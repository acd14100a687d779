//! Numbits: a set of non-negative integers stored as a bit-per-value blob.
//!
//! Bit `n % 8` of byte `n / 8` is set when `n` is in the set. Trailing zero
//! bytes are never produced, so equal sets always encode to equal blobs.

use crate::types::LineNo;

/// Encode line numbers as a numbits blob. The empty set encodes to an empty blob.
pub fn nums_to_numbits<I>(nums: I) -> Vec<u8>
where
    I: IntoIterator<Item = LineNo>,
{
    let mut bits: Vec<u8> = Vec::new();
    for num in nums {
        let byte = (num / 8) as usize;
        if byte >= bits.len() {
            bits.resize(byte + 1, 0);
        }
        bits[byte] |= 1 << (num % 8);
    }
    bits
}

/// Decode a numbits blob into ascending line numbers.
pub fn numbits_to_nums(numbits: &[u8]) -> Vec<LineNo> {
    let mut nums = Vec::new();
    for (byte_i, byte) in numbits.iter().enumerate() {
        if *byte == 0 {
            continue;
        }
        for bit_i in 0..8u32 {
            if byte & (1 << bit_i) != 0 {
                nums.push(byte_i as LineNo * 8 + bit_i);
            }
        }
    }
    nums
}

/// Union of two numbits blobs. The shorter input is treated as zero-padded.
pub fn numbits_union(a: &[u8], b: &[u8]) -> Vec<u8> {
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    let mut out = long.to_vec();
    for (dst, src) in out.iter_mut().zip(short) {
        *dst |= src;
    }
    trim_trailing_zeros(&mut out);
    out
}

fn trim_trailing_zeros(bits: &mut Vec<u8>) {
    while bits.last() == Some(&0) {
        bits.pop();
    }
}
