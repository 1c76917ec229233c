//! This module contains the pure, stateless kernels for Zig-zag encoding and
//! decoding.
//!
//! Zig-zag is a lossless, bitwise mapping of signed integers to unsigned
//! integers that keeps small-magnitude values (positive or negative)
//! numerically small, which is what makes the LEB128 variable-length codec in
//! `crate::buffer` effective on signed data. This module is panic-free.

use num_traits::{PrimInt, Signed, Unsigned};
use std::ops::{BitXor, Shl, Shr};

use crate::traits::{HasSigned, HasUnsigned};

/// Encodes a single signed integer using the Zig-zag algorithm.
pub fn encode<T>(n: T) -> T::Unsigned
where
    T: PrimInt
        + Signed
        + HasUnsigned
        + Shl<usize, Output = T>
        + Shr<usize, Output = T>
        + BitXor<T, Output = T>,
    T::Unsigned: PrimInt,
{
    let bits = std::mem::size_of::<T>() * 8;
    // The formula (n << 1) ^ (n >> (BITS - 1)) must be done carefully.
    // The right shift must be arithmetic.
    let shifted = (n << 1) ^ (n >> (bits - 1));
    // We can now safely cast the bit pattern to the unsigned type.
    unsafe { std::mem::transmute_copy::<T, T::Unsigned>(&shifted) }
}

/// Decodes a single unsigned integer back to its signed representation.
pub fn decode<U>(n: U) -> U::Signed
where
    U: PrimInt + Unsigned + HasSigned + Shr<usize, Output = U> + BitXor<U, Output = U>,
    U::Signed: PrimInt + std::ops::Neg<Output = U::Signed>,
{
    let one = U::one();
    let shifted_n = n >> 1;
    let lsb = n & one;
    // The formula is (n >> 1) ^ -(n & 1)
    let signed_shifted = unsafe { std::mem::transmute_copy::<U, U::Signed>(&shifted_n) };
    let signed_lsb = unsafe { std::mem::transmute_copy::<U, U::Signed>(&lsb) };

    signed_shifted ^ (-signed_lsb)
}

//==================================================================================
// Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_adjacent_in_magnitude() {
        // 0 -> 0, -1 -> 1, 1 -> 2, -2 -> 3, 2 -> 4, ...
        assert_eq!(encode(0i32), 0u32);
        assert_eq!(encode(-1i32), 1u32);
        assert_eq!(encode(1i32), 2u32);
        assert_eq!(encode(-2i32), 3u32);
        assert_eq!(encode(2i32), 4u32);
        for n in 0i64..100 {
            assert_eq!(encode(n), (n as u64) * 2);
            assert_eq!(encode(-n - 1), (n as u64) * 2 + 1);
        }
    }

    #[test]
    fn roundtrip_boundary_values_i32() {
        for v in [0, 1, -1, i32::MIN, i32::MAX, 0x7f, -0x80, 0x80] {
            assert_eq!(decode(encode(v)), v);
        }
    }

    #[test]
    fn roundtrip_boundary_values_i64() {
        for v in [0, 1, -1, i64::MIN, i64::MAX, 0x7f, -0x80, 1 << 40] {
            assert_eq!(decode(encode(v)), v);
        }
    }
}
