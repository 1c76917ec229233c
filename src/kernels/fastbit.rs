//! This module contains the pure, stateless, and performant kernels for reading
//! and writing fixed-width unsigned values at arbitrary bit offsets in a byte
//! buffer.
//!
//! Values are stored little-endian in the bitstream, LSB first within a byte.
//! A write only touches the targeted bits; every other bit of the affected
//! bytes is preserved, which lets adjacent fields share a byte. These kernels
//! perform no window validation of their own: the buffer views in
//! `crate::buffer` validate every access before delegating here, so slice
//! indexing is always in range.

/// Writes the low `bit_count` bits of `value` at `bit_offset`, merging with
/// the existing contents of the touched byte(s).
///
/// `bit_count` is clamped to 8; zero bits is a no-op. A misaligned write
/// straddles at most one byte boundary and only touches the second byte when
/// the targeted bits actually reach it.
pub fn write_u8(value: u8, buf: &mut [u8], bit_offset: usize, bit_count: u32) {
    let bit_count = bit_count.min(8);
    if bit_count == 0 {
        return;
    }

    let in_byte = (bit_offset & 7) as u32;
    let byte_idx = bit_offset >> 3;
    if in_byte == 0 {
        if bit_count == 8 {
            buf[byte_idx] = value;
        } else {
            let mask = ((1u16 << bit_count) - 1) as u8;
            buf[byte_idx] = (buf[byte_idx] & !mask) | (value & mask);
        }
    } else {
        let mask = (if bit_count == 8 {
            0xffu16
        } else {
            (1u16 << bit_count) - 1
        }) << in_byte;
        let shifted = (value as u16) << in_byte;

        let lo_mask = mask as u8;
        buf[byte_idx] = (buf[byte_idx] & !lo_mask) | (lo_mask & shifted as u8);

        if bit_count > 8 - in_byte {
            let hi_mask = (mask >> 8) as u8;
            buf[byte_idx + 1] = (buf[byte_idx + 1] & !hi_mask) | (hi_mask & (shifted >> 8) as u8);
        }
    }
}

/// Reads `bit_count` bits at `bit_offset`, masked to `bit_count` when fewer
/// than 8 are requested. Zero bits reads as 0. The byte after the targeted one
/// is only dereferenced when the requested bits straddle into it, so a 1-bit
/// read of the last bit of an array never indexes past the end.
pub fn read_u8(buf: &[u8], bit_offset: usize, bit_count: u32) -> u8 {
    if bit_count == 0 {
        return 0;
    }
    let bit_count = bit_count.min(8);

    let in_byte = (bit_offset & 7) as u32;
    let byte_idx = bit_offset >> 3;
    let mut value;
    if in_byte == 0 {
        value = buf[byte_idx];
    } else {
        value = buf[byte_idx] >> in_byte;
        if bit_count > 8 - in_byte {
            value |= buf[byte_idx + 1] << (8 - in_byte);
        }
    }
    if bit_count >= 8 {
        value
    } else {
        value & ((1u8 << bit_count) - 1)
    }
}

// The wider widths decompose the value into little-endian bytes and lean on
// the 8-bit kernel. Two regimes:
//   - byte-aligned offset: whole-byte stores/loads for the full 8-bit groups
//     plus one partial-byte op for the remainder (touches ceil(bit_count/8)
//     bytes, the fast path);
//   - misaligned offset: emit the bits that reach the next byte boundary,
//     shift the value down, and continue on the now-aligned remainder
//     (worst case ceil(bit_count/8) + 1 bytes).
macro_rules! impl_fastbit_wide {
    ($write_fn:ident, $read_fn:ident, $ty:ty) => {
        /// Writes the low `bit_count` bits of `value` at `bit_offset`,
        /// little-endian in the bitstream, preserving untargeted bits.
        pub fn $write_fn(value: $ty, buf: &mut [u8], bit_offset: usize, bit_count: u32) {
            debug_assert!(bit_count <= <$ty>::BITS);
            let mut value = value;
            let mut bit_offset = bit_offset;
            let mut bit_count = bit_count;

            let in_byte = (bit_offset & 7) as u32;
            if in_byte != 0 {
                if bit_count <= 8 {
                    write_u8(value as u8, buf, bit_offset, bit_count);
                    return;
                }
                // Fill up to the next byte boundary, then continue aligned.
                let align = 8 - in_byte;
                write_u8(value as u8, buf, bit_offset, align);
                value >>= align;
                bit_offset += align as usize;
                bit_count -= align;
            }

            let bytes = value.to_le_bytes();
            let full = (bit_count / 8) as usize;
            let base = bit_offset >> 3;
            buf[base..base + full].copy_from_slice(&bytes[..full]);
            let rem = bit_count & 7;
            if rem != 0 {
                write_u8(bytes[full], buf, bit_offset + full * 8, rem);
            }
        }

        /// Reads `bit_count` bits at `bit_offset`, assembled little-endian.
        pub fn $read_fn(buf: &[u8], bit_offset: usize, bit_count: u32) -> $ty {
            debug_assert!(bit_count <= <$ty>::BITS);
            if bit_count == 0 {
                return 0;
            }

            if bit_offset & 7 == 0 {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                let full = (bit_count / 8) as usize;
                let base = bit_offset >> 3;
                bytes[..full].copy_from_slice(&buf[base..base + full]);
                let rem = bit_count & 7;
                if rem != 0 {
                    bytes[full] = read_u8(buf, bit_offset + full * 8, rem);
                }
                <$ty>::from_le_bytes(bytes)
            } else {
                let mut value: $ty = 0;
                let mut consumed = 0u32;
                while consumed < bit_count {
                    let take = (bit_count - consumed).min(8);
                    value |= (read_u8(buf, bit_offset + consumed as usize, take) as $ty) << consumed;
                    consumed += take;
                }
                value
            }
        }
    };
}

impl_fastbit_wide!(write_u16, read_u16, u16);
impl_fastbit_wide!(write_u32, read_u32, u32);
impl_fastbit_wide!(write_u64, read_u64, u64);

//==================================================================================
// Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use bitvec::prelude::*;

    fn mask(bits: u32) -> u64 {
        if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    #[test]
    fn byte_roundtrip_every_offset_and_width() {
        let values: [u8; 9] = [0x00, 0x01, 0x55, 0xAA, 0x77, 0xF0, 0x0F, 0x7F, 0xFF];
        for &value in &values {
            for fill in [0x00u8, 0xffu8] {
                for offset in 0..16 {
                    for bits in 0..=8u32 {
                        let mut arr = [fill; 3];
                        write_u8(value, &mut arr, offset, bits);
                        assert_eq!(
                            read_u8(&arr, offset, bits) as u64,
                            value as u64 & mask(bits),
                            "offset={offset} bits={bits} fill={fill:#x}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn byte_write_preserves_neighbouring_bits() {
        for offset in 0..16usize {
            for bits in 0..=8u32 {
                let mut arr = [0xffu8; 3];
                write_u8(0x00, &mut arr, offset, bits);
                let view = arr.view_bits::<Lsb0>();
                for i in 0..24 {
                    let inside = i >= offset && i < offset + bits as usize;
                    assert_eq!(view[i], !inside, "offset={offset} bits={bits} i={i}");
                }
            }
        }
    }

    #[test]
    fn byte_write_behind_does_not_clobber() {
        // A full-strength write immediately before the target range must leave
        // the previously written bits intact.
        for bits in 0..=8u32 {
            for offset in bits as usize..16 {
                let mut arr = [0xffu8; 3];
                write_u8(0x55, &mut arr, offset, bits);
                write_u32(0xffff_ffff, &mut arr, offset - bits as usize, bits);
                assert_eq!(
                    read_u8(&arr, offset, bits) as u64,
                    0x55 & mask(bits),
                    "offset={offset} bits={bits}"
                );
            }
        }
    }

    #[test]
    fn wide_roundtrip_matches_bitvec_oracle() {
        let values: [u64; 12] = [
            0x00,
            0x01,
            0xFF,
            0x5555,
            0x7fff,
            0x11224488,
            0xFFDDAA99,
            0xFFFF_FFFF,
            0x5555_5555_5555_5555,
            0x1122_4488_99AA_DDFF,
            0xFFDD_AA99_8844_2211,
            u64::MAX,
        ];
        for &value in &values {
            for offset in 0..16usize {
                for bits in 0..=64u32 {
                    let mut arr = [0u8; 12];
                    write_u64(value, &mut arr, offset, bits);
                    assert_eq!(
                        read_u64(&arr, offset, bits),
                        value & mask(bits),
                        "offset={offset} bits={bits} value={value:#x}"
                    );
                    let view = arr.view_bits::<Lsb0>();
                    for i in 0..bits as usize {
                        assert_eq!(
                            view[offset + i],
                            (value >> i) & 1 == 1,
                            "bit {i} offset={offset} bits={bits}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn u16_and_u32_agree_with_u64() {
        for offset in 0..16usize {
            for bits in 0..=16u32 {
                let mut a = [0xa5u8; 8];
                let mut b = [0xa5u8; 8];
                write_u16(0xBEEF, &mut a, offset, bits);
                write_u64(0xBEEF, &mut b, offset, bits);
                assert_eq!(a, b, "u16 offset={offset} bits={bits}");
                assert_eq!(read_u16(&a, offset, bits) as u64, read_u64(&b, offset, bits));
            }
            for bits in 0..=32u32 {
                let mut a = [0xa5u8; 10];
                let mut b = [0xa5u8; 10];
                write_u32(0xDEAD_BEEF, &mut a, offset, bits);
                write_u64(0xDEAD_BEEF, &mut b, offset, bits);
                assert_eq!(a, b, "u32 offset={offset} bits={bits}");
                assert_eq!(read_u32(&a, offset, bits) as u64, read_u64(&b, offset, bits));
            }
        }
    }

    #[test]
    fn last_bit_of_array_is_reachable() {
        // Reading the final bits of a 1-byte array must not index past the end.
        let arr = [0xffu8; 1];
        assert_eq!(read_u8(&arr, 7, 1), 1);
        for i in 0..8 {
            assert_eq!(read_u8(&arr, i, 8 - i as u32) as u64, mask(8 - i as u32));
        }
        let mut arr = [0u8; 1];
        write_u8(0x1, &mut arr, 7, 1);
        assert_eq!(arr[0], 0x80);
    }

    #[test]
    fn zero_bits_is_a_no_op() {
        let mut arr = [0x12u8, 0x34];
        write_u8(0xff, &mut arr, 3, 0);
        write_u64(u64::MAX, &mut arr, 5, 0);
        assert_eq!(arr, [0x12, 0x34]);
        assert_eq!(read_u8(&arr, 3, 0), 0);
        assert_eq!(read_u64(&arr, 5, 0), 0);
    }
}
