//! The bit-addressed buffer view.
//!
//! [`BitBuffer`] is a lightweight cursor over a borrowed byte array that reads
//! and writes typed values at arbitrary bit granularity. It carries an
//! absolute bit cursor plus a window (`abs_offset..abs_length`, in bits) and
//! validates every access against that window up front, before any memory is
//! touched, so a failed call never leaves a partially encoded value behind.
//!
//! On top of the fixed-width primitives in [`crate::kernels::fastbit`] it
//! layers the zigzag+LEB128 variable-length codec, delta compression, ranged
//! quantization, length-prefixed UTF-8 strings, and bit-exact sub-buffer
//! composition. The wire format is little-endian throughout: the LSB of a
//! value lands in the lowest bit position touched, and multi-byte scalars are
//! stored least-significant-byte first regardless of host endianness.
//!
//! Two views over the same array are only safe to use from one thread at a
//! time; the type holds no locks and no global state.

use crate::error::BitwireError;
use crate::kernels::{fastbit, zigzag};

/// Number of bits in the binary representation of `value` (0 occupies 0 bits).
///
/// This is the automatic bit width used by the ranged integer codec.
pub fn bits_occupied(value: u64) -> u32 {
    64 - value.leading_zeros()
}

/// Number of bytes the variable-length codec uses to encode `value`.
pub fn var_len_bytes(value: u64) -> usize {
    let mut value = value;
    let mut bytes = 1;
    while value >= 0x80 {
        bytes += 1;
        value >>= 7;
    }
    bytes
}

/// A copy-on-reborrow cursor over a byte array, addressed in bits.
///
/// The window invariant `abs_offset <= abs_position <= abs_length <=
/// 8 * data.len()` holds at all times; operations that would break it fail
/// with [`BitwireError::RangeViolation`] instead.
#[derive(Debug)]
pub struct BitBuffer<'a> {
    data: &'a mut [u8],
    abs_position: usize,
    abs_offset: usize,
    abs_length: usize,
}

macro_rules! impl_bit_scalar {
    ($ty:ty, $un:ty, $write:path, $read:path,
     $put:ident, $put_bits:ident, $put_at:ident, $put_bits_at:ident,
     $get:ident, $get_bits:ident, $get_at:ident, $get_bits_at:ident) => {
        #[doc = concat!("Writes a full-width `", stringify!($ty), "` at the cursor and advances it.")]
        pub fn $put(&mut self, value: $ty) -> Result<(), BitwireError> {
            self.$put_bits(value, <$un>::BITS)
        }

        #[doc = concat!("Writes the low `bit_count` bits of a `", stringify!($ty), "` at the cursor and advances it.")]
        pub fn $put_bits(&mut self, value: $ty, bit_count: u32) -> Result<(), BitwireError> {
            self.check_write(self.abs_position, bit_count as usize)?;
            $write(value as $un, self.data, self.abs_position, bit_count);
            self.abs_position += bit_count as usize;
            Ok(())
        }

        #[doc = concat!("Writes a full-width `", stringify!($ty), "` at a window-relative bit offset without moving the cursor.")]
        pub fn $put_at(&mut self, offset: usize, value: $ty) -> Result<(), BitwireError> {
            self.$put_bits_at(offset, value, <$un>::BITS)
        }

        #[doc = concat!("Writes the low `bit_count` bits of a `", stringify!($ty), "` at a window-relative bit offset without moving the cursor.")]
        pub fn $put_bits_at(
            &mut self,
            offset: usize,
            value: $ty,
            bit_count: u32,
        ) -> Result<(), BitwireError> {
            let abs = self.abs_offset + offset;
            self.check_write(abs, bit_count as usize)?;
            $write(value as $un, self.data, abs, bit_count);
            Ok(())
        }

        #[doc = concat!("Reads a full-width `", stringify!($ty), "` at the cursor and advances it.")]
        pub fn $get(&mut self) -> Result<$ty, BitwireError> {
            self.$get_bits(<$un>::BITS)
        }

        #[doc = concat!("Reads `bit_count` bits as a `", stringify!($ty), "` at the cursor and advances it. \
                         Partial widths are returned as the raw low bits; sign extension is not applied.")]
        pub fn $get_bits(&mut self, bit_count: u32) -> Result<$ty, BitwireError> {
            self.check_read(self.abs_position, bit_count as usize)?;
            let value = $read(self.data, self.abs_position, bit_count);
            self.abs_position += bit_count as usize;
            Ok(value as $ty)
        }

        #[doc = concat!("Reads a full-width `", stringify!($ty), "` at a window-relative bit offset without moving the cursor.")]
        pub fn $get_at(&self, offset: usize) -> Result<$ty, BitwireError> {
            self.$get_bits_at(offset, <$un>::BITS)
        }

        #[doc = concat!("Reads `bit_count` bits as a `", stringify!($ty), "` at a window-relative bit offset without moving the cursor.")]
        pub fn $get_bits_at(&self, offset: usize, bit_count: u32) -> Result<$ty, BitwireError> {
            let abs = self.abs_offset + offset;
            self.check_read(abs, bit_count as usize)?;
            Ok($read(self.data, abs, bit_count) as $ty)
        }
    };
}

impl<'a> BitBuffer<'a> {
    //==============================================================================
    // Construction
    //==============================================================================

    /// A view over the whole array.
    pub fn new(data: &'a mut [u8]) -> Self {
        let abs_length = data.len() * 8;
        Self {
            data,
            abs_position: 0,
            abs_offset: 0,
            abs_length,
        }
    }

    /// A view starting `offset_bits` into the array, running to its end.
    pub fn with_offset(data: &'a mut [u8], offset_bits: usize) -> Result<Self, BitwireError> {
        let capacity = data.len() * 8;
        if offset_bits > capacity {
            return Err(BitwireError::WindowExceedsBuffer {
                offset: offset_bits,
                length: 0,
                capacity,
                unit: "bits",
            });
        }
        Ok(Self {
            data,
            abs_position: offset_bits,
            abs_offset: offset_bits,
            abs_length: capacity,
        })
    }

    /// A view over the `length_bits` window starting `offset_bits` into the array.
    pub fn with_window(
        data: &'a mut [u8],
        offset_bits: usize,
        length_bits: usize,
    ) -> Result<Self, BitwireError> {
        let capacity = data.len() * 8;
        if offset_bits + length_bits > capacity {
            return Err(BitwireError::WindowExceedsBuffer {
                offset: offset_bits,
                length: length_bits,
                capacity,
                unit: "bits",
            });
        }
        Ok(Self {
            data,
            abs_position: offset_bits,
            abs_offset: offset_bits,
            abs_length: offset_bits + length_bits,
        })
    }

    /// Internal constructor for windows already known to fit the array.
    pub(crate) fn over(data: &'a mut [u8], offset_bits: usize, length_bits: usize) -> Self {
        debug_assert!(offset_bits + length_bits <= data.len() * 8);
        Self {
            data,
            abs_position: offset_bits,
            abs_offset: offset_bits,
            abs_length: offset_bits + length_bits,
        }
    }

    //==============================================================================
    // Cursor & window
    //==============================================================================

    /// Cursor position relative to the window start, in bits.
    pub fn position(&self) -> usize {
        self.abs_position - self.abs_offset
    }

    /// Moves the cursor to a window-relative bit position.
    pub fn set_position(&mut self, position: usize) -> Result<(), BitwireError> {
        let abs = self.abs_offset + position;
        if abs > self.abs_length {
            return Err(self.range_violation(false, abs, 0));
        }
        self.abs_position = abs;
        Ok(())
    }

    /// Usable window length, in bits.
    pub fn length(&self) -> usize {
        self.abs_length - self.abs_offset
    }

    /// Re-bases the window end. Shrinking below the cursor clamps the cursor
    /// down to the new end; growing past the backing array fails.
    pub fn set_length(&mut self, length_bits: usize) -> Result<(), BitwireError> {
        let capacity = self.data.len() * 8;
        if self.abs_offset + length_bits > capacity {
            return Err(BitwireError::WindowExceedsBuffer {
                offset: self.abs_offset,
                length: length_bits,
                capacity,
                unit: "bits",
            });
        }
        self.abs_length = self.abs_offset + length_bits;
        if self.abs_position > self.abs_length {
            self.abs_position = self.abs_length;
        }
        Ok(())
    }

    /// Bits left between the cursor and the window end.
    pub fn remaining(&self) -> usize {
        self.abs_length - self.abs_position
    }

    /// Absolute bit cursor into the backing array.
    pub fn abs_position(&self) -> usize {
        self.abs_position
    }

    /// Absolute bit index of the window start.
    pub fn abs_offset(&self) -> usize {
        self.abs_offset
    }

    /// Absolute bit index one past the window's usable end.
    pub fn abs_length(&self) -> usize {
        self.abs_length
    }

    /// Advances the cursor by `bits` without writing.
    pub fn skip_bits(&mut self, bits: usize) -> Result<(), BitwireError> {
        let abs = self.abs_position + bits;
        if abs > self.abs_length {
            return Err(self.range_violation(false, self.abs_position, bits));
        }
        self.abs_position = abs;
        Ok(())
    }

    /// Advances the cursor by whole bytes without writing.
    pub fn skip_bytes(&mut self, bytes: usize) -> Result<(), BitwireError> {
        self.skip_bits(bytes * 8)
    }

    /// Moves the cursor back to the window start.
    pub fn rewind(&mut self) {
        self.abs_position = self.abs_offset;
    }

    /// Moves the cursor back by `bits`.
    pub fn rewind_bits(&mut self, bits: usize) -> Result<(), BitwireError> {
        let abs = self
            .abs_position
            .checked_sub(bits)
            .filter(|&p| p >= self.abs_offset)
            .ok_or_else(|| self.range_violation(false, self.abs_position.saturating_sub(bits), 0))?;
        self.abs_position = abs;
        Ok(())
    }

    /// Advances the cursor to the next byte boundary, unless already there.
    /// Read/write operations are faster when the cursor is byte aligned.
    pub fn byte_align_position(&mut self) -> Result<(), BitwireError> {
        let delta = (8 - (self.abs_position & 7)) & 7;
        self.skip_bits(delta)
    }

    /// Whether the cursor sits on a byte boundary.
    pub fn is_position_byte_aligned(&self) -> bool {
        self.abs_position & 7 == 0
    }

    /// Reads the byte at a window-relative byte index, ignoring the cursor.
    /// Addresses whole bytes of the backing array, so it only makes sense on
    /// byte-aligned windows.
    pub fn byte_at(&self, index: usize) -> Result<u8, BitwireError> {
        self.check_read(self.abs_offset + index * 8, 8)?;
        Ok(fastbit::read_u8(self.data, self.abs_offset + index * 8, 8))
    }

    /// Writes the byte at a window-relative byte index, ignoring the cursor.
    pub fn set_byte_at(&mut self, index: usize, value: u8) -> Result<(), BitwireError> {
        self.check_write(self.abs_offset + index * 8, 8)?;
        fastbit::write_u8(value, self.data, self.abs_offset + index * 8, 8);
        Ok(())
    }

    //==============================================================================
    // Scalar put/get
    //==============================================================================

    impl_bit_scalar!(u8, u8, fastbit::write_u8, fastbit::read_u8,
        put_u8, put_u8_bits, put_u8_at, put_u8_bits_at,
        get_u8, get_u8_bits, get_u8_at, get_u8_bits_at);
    impl_bit_scalar!(u16, u16, fastbit::write_u16, fastbit::read_u16,
        put_u16, put_u16_bits, put_u16_at, put_u16_bits_at,
        get_u16, get_u16_bits, get_u16_at, get_u16_bits_at);
    impl_bit_scalar!(u32, u32, fastbit::write_u32, fastbit::read_u32,
        put_u32, put_u32_bits, put_u32_at, put_u32_bits_at,
        get_u32, get_u32_bits, get_u32_at, get_u32_bits_at);
    impl_bit_scalar!(u64, u64, fastbit::write_u64, fastbit::read_u64,
        put_u64, put_u64_bits, put_u64_at, put_u64_bits_at,
        get_u64, get_u64_bits, get_u64_at, get_u64_bits_at);
    impl_bit_scalar!(i8, u8, fastbit::write_u8, fastbit::read_u8,
        put_i8, put_i8_bits, put_i8_at, put_i8_bits_at,
        get_i8, get_i8_bits, get_i8_at, get_i8_bits_at);
    impl_bit_scalar!(i16, u16, fastbit::write_u16, fastbit::read_u16,
        put_i16, put_i16_bits, put_i16_at, put_i16_bits_at,
        get_i16, get_i16_bits, get_i16_at, get_i16_bits_at);
    impl_bit_scalar!(i32, u32, fastbit::write_u32, fastbit::read_u32,
        put_i32, put_i32_bits, put_i32_at, put_i32_bits_at,
        get_i32, get_i32_bits, get_i32_at, get_i32_bits_at);
    impl_bit_scalar!(i64, u64, fastbit::write_u64, fastbit::read_u64,
        put_i64, put_i64_bits, put_i64_at, put_i64_bits_at,
        get_i64, get_i64_bits, get_i64_at, get_i64_bits_at);

    /// Writes a bool as a single bit and advances the cursor.
    pub fn put_bool(&mut self, value: bool) -> Result<(), BitwireError> {
        self.put_u8_bits(value as u8, 1)
    }

    /// Writes a bool as a single bit at a window-relative offset.
    pub fn put_bool_at(&mut self, offset: usize, value: bool) -> Result<(), BitwireError> {
        self.put_u8_bits_at(offset, value as u8, 1)
    }

    /// Reads a single bit as a bool and advances the cursor.
    pub fn get_bool(&mut self) -> Result<bool, BitwireError> {
        Ok(self.get_u8_bits(1)? == 1)
    }

    /// Reads a single bit as a bool at a window-relative offset.
    pub fn get_bool_at(&self, offset: usize) -> Result<bool, BitwireError> {
        Ok(self.get_u8_bits_at(offset, 1)? == 1)
    }

    // Floats always travel as their full IEEE-754 bit pattern, little-endian
    // on the wire regardless of host byte order. No partial widths.

    /// Writes an `f32` (always 32 bits) and advances the cursor.
    pub fn put_f32(&mut self, value: f32) -> Result<(), BitwireError> {
        self.put_u32(value.to_bits())
    }

    /// Writes an `f32` at a window-relative bit offset.
    pub fn put_f32_at(&mut self, offset: usize, value: f32) -> Result<(), BitwireError> {
        self.put_u32_at(offset, value.to_bits())
    }

    /// Reads an `f32` and advances the cursor.
    pub fn get_f32(&mut self) -> Result<f32, BitwireError> {
        Ok(f32::from_bits(self.get_u32()?))
    }

    /// Reads an `f32` at a window-relative bit offset.
    pub fn get_f32_at(&self, offset: usize) -> Result<f32, BitwireError> {
        Ok(f32::from_bits(self.get_u32_at(offset)?))
    }

    /// Writes an `f64` (always 64 bits) and advances the cursor.
    pub fn put_f64(&mut self, value: f64) -> Result<(), BitwireError> {
        self.put_u64(value.to_bits())
    }

    /// Writes an `f64` at a window-relative bit offset.
    pub fn put_f64_at(&mut self, offset: usize, value: f64) -> Result<(), BitwireError> {
        self.put_u64_at(offset, value.to_bits())
    }

    /// Reads an `f64` and advances the cursor.
    pub fn get_f64(&mut self) -> Result<f64, BitwireError> {
        Ok(f64::from_bits(self.get_u64()?))
    }

    /// Reads an `f64` at a window-relative bit offset.
    pub fn get_f64_at(&self, offset: usize) -> Result<f64, BitwireError> {
        Ok(f64::from_bits(self.get_u64_at(offset)?))
    }

    //==============================================================================
    // Variable-length integers (zigzag + LEB128)
    //==============================================================================

    /// Writes a variable-length unsigned integer (LEB128: 7 payload bits per
    /// byte, continuation bit 0x80, least-significant group first) and
    /// advances the cursor by the whole encoding.
    pub fn put_var_u64(&mut self, value: u64) -> Result<(), BitwireError> {
        let bytes = self.put_var_u64_at(self.position(), value)?;
        self.abs_position += bytes * 8;
        Ok(())
    }

    /// Writes a variable-length unsigned integer at a window-relative bit
    /// offset; returns the byte count of the encoding. The whole encoding is
    /// validated against the window before the first byte is written.
    pub fn put_var_u64_at(&mut self, offset: usize, value: u64) -> Result<usize, BitwireError> {
        let len = var_len_bytes(value);
        self.check_write(self.abs_offset + offset, len * 8)?;
        let mut value = value;
        let mut off = offset;
        for _ in 1..len {
            self.put_u8_at(off, 0x80 | value as u8)?;
            off += 8;
            value >>= 7;
        }
        self.put_u8_at(off, value as u8)?;
        Ok(len)
    }

    /// Writes a variable-length `u32` and advances the cursor.
    pub fn put_var_u32(&mut self, value: u32) -> Result<(), BitwireError> {
        self.put_var_u64(value as u64)
    }

    /// Writes a variable-length `u32` at a window-relative bit offset.
    pub fn put_var_u32_at(&mut self, offset: usize, value: u32) -> Result<usize, BitwireError> {
        self.put_var_u64_at(offset, value as u64)
    }

    /// Zigzag-encodes then writes a variable-length `i32`.
    pub fn put_var_i32(&mut self, value: i32) -> Result<(), BitwireError> {
        self.put_var_u64(zigzag::encode(value) as u64)
    }

    /// Zigzag-encodes then writes a variable-length `i32` at an offset.
    pub fn put_var_i32_at(&mut self, offset: usize, value: i32) -> Result<usize, BitwireError> {
        self.put_var_u64_at(offset, zigzag::encode(value) as u64)
    }

    /// Zigzag-encodes then writes a variable-length `i64`.
    pub fn put_var_i64(&mut self, value: i64) -> Result<(), BitwireError> {
        self.put_var_u64(zigzag::encode(value))
    }

    /// Zigzag-encodes then writes a variable-length `i64` at an offset.
    pub fn put_var_i64_at(&mut self, offset: usize, value: i64) -> Result<usize, BitwireError> {
        self.put_var_u64_at(offset, zigzag::encode(value))
    }

    // Lenient decode core: stops consuming at the window end and reports
    // whether a terminator byte was seen. Groups past the 64-bit capacity are
    // consumed but contribute nothing.
    fn var_decode_at(&self, offset: usize) -> (u64, usize, bool) {
        let mut value = 0u64;
        let mut shift = 0u32;
        let mut bytes = 0usize;
        let mut abs = self.abs_offset + offset;
        while abs + 8 <= self.abs_length {
            let b = fastbit::read_u8(self.data, abs, 8);
            if shift < 64 {
                value |= ((b & 0x7f) as u64) << shift;
            }
            shift += 7;
            bytes += 1;
            abs += 8;
            if b & 0x80 == 0 {
                return (value, bytes, true);
            }
        }
        (value, bytes, false)
    }

    /// Reads a variable-length unsigned integer and advances the cursor.
    ///
    /// Lenient on truncation: if the window ends before a terminator byte the
    /// accumulated partial value is returned and the cursor stops at the
    /// window end. Callers that need a hard framing guarantee should use
    /// [`BitBuffer::try_get_var_u64`] or check `remaining()` beforehand.
    pub fn get_var_u64(&mut self) -> u64 {
        let (value, bytes, _) = self.var_decode_at(self.position());
        self.abs_position += bytes * 8;
        value
    }

    /// Lenient decode at a window-relative offset; returns the value and the
    /// byte count consumed.
    pub fn get_var_u64_at(&self, offset: usize) -> (u64, usize) {
        let (value, bytes, _) = self.var_decode_at(offset);
        (value, bytes)
    }

    /// Strict decode: fails with [`BitwireError::TruncatedVarint`] when the
    /// window ends before a terminator byte; the cursor is only advanced on
    /// success.
    pub fn try_get_var_u64(&mut self) -> Result<u64, BitwireError> {
        let (value, bytes, terminated) = self.var_decode_at(self.position());
        if !terminated {
            return Err(BitwireError::TruncatedVarint {
                bytes_consumed: bytes,
            });
        }
        self.abs_position += bytes * 8;
        Ok(value)
    }

    /// Reads a variable-length `u32` (lenient) and advances the cursor.
    pub fn get_var_u32(&mut self) -> u32 {
        self.get_var_u64() as u32
    }

    /// Lenient `u32` decode at an offset; returns value and bytes consumed.
    pub fn get_var_u32_at(&self, offset: usize) -> (u32, usize) {
        let (value, bytes) = self.get_var_u64_at(offset);
        (value as u32, bytes)
    }

    /// Strict variable-length `u32` decode.
    pub fn try_get_var_u32(&mut self) -> Result<u32, BitwireError> {
        Ok(self.try_get_var_u64()? as u32)
    }

    /// Reads a variable-length zigzagged `i32` (lenient) and advances the cursor.
    pub fn get_var_i32(&mut self) -> i32 {
        zigzag::decode(self.get_var_u32())
    }

    /// Lenient `i32` decode at an offset; returns value and bytes consumed.
    pub fn get_var_i32_at(&self, offset: usize) -> (i32, usize) {
        let (value, bytes) = self.get_var_u32_at(offset);
        (zigzag::decode(value), bytes)
    }

    /// Strict variable-length `i32` decode.
    pub fn try_get_var_i32(&mut self) -> Result<i32, BitwireError> {
        Ok(zigzag::decode(self.try_get_var_u32()?))
    }

    /// Reads a variable-length zigzagged `i64` (lenient) and advances the cursor.
    pub fn get_var_i64(&mut self) -> i64 {
        zigzag::decode(self.get_var_u64())
    }

    /// Lenient `i64` decode at an offset; returns value and bytes consumed.
    pub fn get_var_i64_at(&self, offset: usize) -> (i64, usize) {
        let (value, bytes) = self.get_var_u64_at(offset);
        (zigzag::decode(value), bytes)
    }

    /// Strict variable-length `i64` decode.
    pub fn try_get_var_i64(&mut self) -> Result<i64, BitwireError> {
        Ok(zigzag::decode(self.try_get_var_u64()?))
    }

    //==============================================================================
    // Delta compression
    //==============================================================================

    /// Varint-encodes `value - previous` and advances the cursor.
    pub fn put_delta_i32(&mut self, value: i32, previous: i32) -> Result<(), BitwireError> {
        self.put_var_i32(value.wrapping_sub(previous))
    }

    /// Varint-encodes `value - previous` at a window-relative offset.
    pub fn put_delta_i32_at(
        &mut self,
        offset: usize,
        value: i32,
        previous: i32,
    ) -> Result<usize, BitwireError> {
        self.put_var_i32_at(offset, value.wrapping_sub(previous))
    }

    /// Decodes a delta against `previous` and advances the cursor.
    pub fn get_delta_i32(&mut self, previous: i32) -> i32 {
        self.get_var_i32().wrapping_add(previous)
    }

    /// Decodes a delta against `previous` at a window-relative offset.
    pub fn get_delta_i32_at(&self, offset: usize, previous: i32) -> (i32, usize) {
        let (value, bytes) = self.get_var_i32_at(offset);
        (value.wrapping_add(previous), bytes)
    }

    /// Varint-encodes `value - previous` and advances the cursor.
    pub fn put_delta_i64(&mut self, value: i64, previous: i64) -> Result<(), BitwireError> {
        self.put_var_i64(value.wrapping_sub(previous))
    }

    /// Varint-encodes `value - previous` at a window-relative offset.
    pub fn put_delta_i64_at(
        &mut self,
        offset: usize,
        value: i64,
        previous: i64,
    ) -> Result<usize, BitwireError> {
        self.put_var_i64_at(offset, value.wrapping_sub(previous))
    }

    /// Decodes a delta against `previous` and advances the cursor.
    pub fn get_delta_i64(&mut self, previous: i64) -> i64 {
        self.get_var_i64().wrapping_add(previous)
    }

    /// Decodes a delta against `previous` at a window-relative offset.
    pub fn get_delta_i64_at(&self, offset: usize, previous: i64) -> (i64, usize) {
        let (value, bytes) = self.get_var_i64_at(offset);
        (value.wrapping_add(previous), bytes)
    }

    //==============================================================================
    // Ranged quantization
    //==============================================================================

    /// Linearly quantizes `value` from `[min, max]` into `bit_count` bits and
    /// advances the cursor. Lossy; zero bits encodes a fixed `min` and writes
    /// nothing.
    pub fn put_ranged_f32(
        &mut self,
        value: f32,
        min: f32,
        max: f32,
        bit_count: u32,
    ) -> Result<(), BitwireError> {
        self.put_ranged_f32_at(self.position(), value, min, max, bit_count)?;
        self.abs_position += bit_count as usize;
        Ok(())
    }

    /// Ranged float quantization at a window-relative offset.
    pub fn put_ranged_f32_at(
        &mut self,
        offset: usize,
        value: f32,
        min: f32,
        max: f32,
        bit_count: u32,
    ) -> Result<(), BitwireError> {
        if bit_count == 0 {
            return Ok(());
        }
        let unit = (value - min) / (max - min);
        let max_val = u32::MAX >> (32 - bit_count);
        let encoded = (f64::from(unit) * f64::from(max_val)).round() as u32;
        self.put_u32_bits_at(offset, encoded, bit_count)
    }

    /// Inverse of [`BitBuffer::put_ranged_f32`]; zero bits yields `min`.
    pub fn get_ranged_f32(
        &mut self,
        min: f32,
        max: f32,
        bit_count: u32,
    ) -> Result<f32, BitwireError> {
        let value = self.get_ranged_f32_at(self.position(), min, max, bit_count)?;
        self.abs_position += bit_count as usize;
        Ok(value)
    }

    /// Ranged float dequantization at a window-relative offset.
    pub fn get_ranged_f32_at(
        &self,
        offset: usize,
        min: f32,
        max: f32,
        bit_count: u32,
    ) -> Result<f32, BitwireError> {
        if bit_count == 0 {
            return Ok(min);
        }
        let max_val = u32::MAX >> (32 - bit_count);
        let encoded = self.get_u32_bits_at(offset, bit_count)?;
        let unit = encoded as f32 / max_val as f32;
        Ok(min + unit * (max - min))
    }

    /// Stores `value - min` in `bits_occupied(max - min)` bits and advances
    /// the cursor; returns the bit count used. Exact for every integer in
    /// `[min, max]`.
    pub fn put_ranged_i32(&mut self, value: i32, min: i32, max: i32) -> Result<u32, BitwireError> {
        let bits = Self::ranged_bits_i32(min, max);
        self.put_u32_bits(value.wrapping_sub(min) as u32, bits)?;
        Ok(bits)
    }

    /// Ranged integer encode at a window-relative offset; returns the bit count.
    pub fn put_ranged_i32_at(
        &mut self,
        offset: usize,
        value: i32,
        min: i32,
        max: i32,
    ) -> Result<u32, BitwireError> {
        let bits = Self::ranged_bits_i32(min, max);
        self.put_u32_bits_at(offset, value.wrapping_sub(min) as u32, bits)?;
        Ok(bits)
    }

    /// Inverse of [`BitBuffer::put_ranged_i32`].
    pub fn get_ranged_i32(&mut self, min: i32, max: i32) -> Result<i32, BitwireError> {
        let bits = Self::ranged_bits_i32(min, max);
        Ok(min.wrapping_add(self.get_u32_bits(bits)? as i32))
    }

    /// Ranged integer decode at a window-relative offset.
    pub fn get_ranged_i32_at(&self, offset: usize, min: i32, max: i32) -> Result<i32, BitwireError> {
        let bits = Self::ranged_bits_i32(min, max);
        Ok(min.wrapping_add(self.get_u32_bits_at(offset, bits)? as i32))
    }

    /// 64-bit ranged integer encode; returns the bit count used.
    pub fn put_ranged_i64(&mut self, value: i64, min: i64, max: i64) -> Result<u32, BitwireError> {
        let bits = Self::ranged_bits_i64(min, max);
        self.put_u64_bits(value.wrapping_sub(min) as u64, bits)?;
        Ok(bits)
    }

    /// 64-bit ranged integer encode at a window-relative offset.
    pub fn put_ranged_i64_at(
        &mut self,
        offset: usize,
        value: i64,
        min: i64,
        max: i64,
    ) -> Result<u32, BitwireError> {
        let bits = Self::ranged_bits_i64(min, max);
        self.put_u64_bits_at(offset, value.wrapping_sub(min) as u64, bits)?;
        Ok(bits)
    }

    /// Inverse of [`BitBuffer::put_ranged_i64`].
    pub fn get_ranged_i64(&mut self, min: i64, max: i64) -> Result<i64, BitwireError> {
        let bits = Self::ranged_bits_i64(min, max);
        Ok(min.wrapping_add(self.get_u64_bits(bits)? as i64))
    }

    /// 64-bit ranged integer decode at a window-relative offset.
    pub fn get_ranged_i64_at(&self, offset: usize, min: i64, max: i64) -> Result<i64, BitwireError> {
        let bits = Self::ranged_bits_i64(min, max);
        Ok(min.wrapping_add(self.get_u64_bits_at(offset, bits)? as i64))
    }

    fn ranged_bits_i32(min: i32, max: i32) -> u32 {
        bits_occupied(max.wrapping_sub(min) as u32 as u64)
    }

    fn ranged_bits_i64(min: i64, max: i64) -> u32 {
        bits_occupied(max.wrapping_sub(min) as u64)
    }

    //==============================================================================
    // Raw bytes, sub-buffers, strings
    //==============================================================================

    /// Writes a byte slice at the cursor; bulk copy when byte-aligned,
    /// per-byte through the bit primitives otherwise.
    pub fn put_bytes(&mut self, src: &[u8]) -> Result<(), BitwireError> {
        self.check_write(self.abs_position, src.len() * 8)?;
        if self.abs_position & 7 == 0 {
            let base = self.abs_position >> 3;
            self.data[base..base + src.len()].copy_from_slice(src);
            self.abs_position += src.len() * 8;
        } else {
            for &b in src {
                self.put_u8(b)?;
            }
        }
        Ok(())
    }

    /// Fills `dst` from the cursor, advancing it.
    pub fn get_bytes(&mut self, dst: &mut [u8]) -> Result<(), BitwireError> {
        self.check_read(self.abs_position, dst.len() * 8)?;
        if self.abs_position & 7 == 0 {
            let base = self.abs_position >> 3;
            dst.copy_from_slice(&self.data[base..base + dst.len()]);
            self.abs_position += dst.len() * 8;
        } else {
            for b in dst.iter_mut() {
                *b = self.get_u8()?;
            }
        }
        Ok(())
    }

    /// Copies `src`'s whole window to the cursor and advances it by
    /// `src.length()` bits.
    pub fn put_buffer(&mut self, src: &BitBuffer<'_>) -> Result<(), BitwireError> {
        self.put_buffer_at(self.position(), src)?;
        self.abs_position += src.length();
        Ok(())
    }

    /// Copies `src`'s whole window to a window-relative bit offset without
    /// moving the cursor.
    ///
    /// Three copy regimes, all producing bit-identical output: both sides
    /// byte-aligned (bulk copy), both sides sharing the same intra-byte phase
    /// (partial head, bulk middle, partial tail), and the general per-byte
    /// path through the bit primitives.
    pub fn put_buffer_at(&mut self, offset: usize, src: &BitBuffer<'_>) -> Result<(), BitwireError> {
        let len = src.length();
        let dst_abs = self.abs_offset + offset;
        self.check_write(dst_abs, len)?;
        let src_abs = src.abs_offset;
        let src_phase = src_abs & 7;
        let dst_phase = dst_abs & 7;

        let full_bytes = len / 8;
        let tail_bits = (len & 7) as u32;

        if src_phase == 0 && dst_phase == 0 {
            self.data[dst_abs / 8..dst_abs / 8 + full_bytes]
                .copy_from_slice(&src.data[src_abs / 8..src_abs / 8 + full_bytes]);
        } else if src_phase == dst_phase && len >= 16 {
            let head = (8 - src_phase) as u32;
            let b = fastbit::read_u8(src.data, src_abs, head);
            fastbit::write_u8(b, self.data, dst_abs, head);

            let mid_bytes = (len - head as usize) / 8;
            let src_mid = (src_abs + head as usize) / 8;
            let dst_mid = (dst_abs + head as usize) / 8;
            self.data[dst_mid..dst_mid + mid_bytes]
                .copy_from_slice(&src.data[src_mid..src_mid + mid_bytes]);

            let copied = head as usize + mid_bytes * 8;
            let rem = (len - copied) as u32;
            if rem != 0 {
                let b = fastbit::read_u8(src.data, src_abs + copied, rem);
                fastbit::write_u8(b, self.data, dst_abs + copied, rem);
            }
            return Ok(());
        } else {
            for i in 0..full_bytes {
                let b = fastbit::read_u8(src.data, src_abs + i * 8, 8);
                fastbit::write_u8(b, self.data, dst_abs + i * 8, 8);
            }
        }

        if tail_bits != 0 {
            let b = fastbit::read_u8(src.data, src_abs + full_bytes * 8, tail_bits);
            fastbit::write_u8(b, self.data, dst_abs + full_bytes * 8, tail_bits);
        }
        Ok(())
    }

    /// Encodes a string as a varint byte length followed by its UTF-8 bytes,
    /// starting at the current cursor (no implicit byte alignment; this is
    /// the canonical wire format). Lengths above `u16::MAX` bytes fail.
    pub fn put_str(&mut self, s: &str) -> Result<(), BitwireError> {
        let len = s.len();
        if len > u16::MAX as usize {
            return Err(BitwireError::StringTooLong { len });
        }
        // Validate the whole encoding up front so no partial write occurs.
        let total_bits = (var_len_bytes(len as u64) + len) * 8;
        self.check_write(self.abs_position, total_bits)?;
        self.put_var_u64(len as u64)?;
        self.put_bytes(s.as_bytes())
    }

    /// Decodes a string written by [`BitBuffer::put_str`], advancing the cursor.
    pub fn get_string(&mut self) -> Result<String, BitwireError> {
        let len = self.get_var_u64() as u16 as usize;
        self.check_read(self.abs_position, len * 8)?;
        let mut bytes = vec![0u8; len];
        self.get_bytes(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }

    //==============================================================================
    // Equality, derived views
    //==============================================================================

    /// Compares the logical windows of two views bit for bit: all full bytes
    /// plus the masked final partial byte. Views of different lengths are
    /// never equal; two zero-length views always are.
    pub fn buffer_equals(&self, other: &BitBuffer<'_>) -> bool {
        if self.length() != other.length() {
            return false;
        }
        let len = self.length();
        let full = len / 8;
        for i in 0..full {
            if fastbit::read_u8(self.data, self.abs_offset + i * 8, 8)
                != fastbit::read_u8(other.data, other.abs_offset + i * 8, 8)
            {
                return false;
            }
        }
        let rem = (len & 7) as u32;
        if rem != 0
            && fastbit::read_u8(self.data, self.abs_offset + full * 8, rem)
                != fastbit::read_u8(other.data, other.abs_offset + full * 8, rem)
        {
            return false;
        }
        true
    }

    /// A view over the bits written so far: window start up to the cursor.
    pub fn from_start_to_position(&mut self) -> BitBuffer<'_> {
        let offset = self.abs_offset;
        let length = self.abs_position - self.abs_offset;
        BitBuffer::over(self.data, offset, length)
    }

    /// A view over the rest of the window: cursor up to the window end.
    pub fn from_here_to_end(&mut self) -> BitBuffer<'_> {
        let offset = self.abs_position;
        let length = self.abs_length - self.abs_position;
        BitBuffer::over(self.data, offset, length)
    }

    /// Carves a `length_bits` sub-view starting at the cursor and advances
    /// past it. The sub-view shares the backing array; nothing is copied.
    pub fn get_bits(&mut self, length_bits: usize) -> Result<BitBuffer<'_>, BitwireError> {
        self.check_read(self.abs_position, length_bits)?;
        let start = self.abs_position;
        self.abs_position += length_bits;
        Ok(BitBuffer::over(self.data, start, length_bits))
    }

    /// A sub-view at an explicit window-relative offset, without moving the cursor.
    pub fn get_bits_at(
        &mut self,
        offset: usize,
        length_bits: usize,
    ) -> Result<BitBuffer<'_>, BitwireError> {
        let abs = self.abs_offset + offset;
        self.check_read(abs, length_bits)?;
        Ok(BitBuffer::over(self.data, abs, length_bits))
    }

    /// Copies the window into a fresh `Vec<u8>` of `ceil(length / 8)` bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        let len = self.length();
        let mut out = vec![0u8; len.div_ceil(8)];
        let full = len / 8;
        for (i, slot) in out.iter_mut().take(full).enumerate() {
            *slot = fastbit::read_u8(self.data, self.abs_offset + i * 8, 8);
        }
        let rem = (len & 7) as u32;
        if rem != 0 {
            out[full] = fastbit::read_u8(self.data, self.abs_offset + full * 8, rem);
        }
        out
    }

    //==============================================================================
    // Validation
    //==============================================================================

    fn check_write(&self, abs_bit: usize, bit_count: usize) -> Result<(), BitwireError> {
        self.check_access(true, abs_bit, bit_count)
    }

    fn check_read(&self, abs_bit: usize, bit_count: usize) -> Result<(), BitwireError> {
        self.check_access(false, abs_bit, bit_count)
    }

    fn check_access(
        &self,
        writing: bool,
        abs_bit: usize,
        bit_count: usize,
    ) -> Result<(), BitwireError> {
        if abs_bit < self.abs_offset || abs_bit.saturating_add(bit_count) > self.abs_length {
            return Err(self.range_violation(writing, abs_bit, bit_count));
        }
        Ok(())
    }

    fn range_violation(&self, writing: bool, abs_bit: usize, bit_count: usize) -> BitwireError {
        BitwireError::RangeViolation {
            writing,
            offset_bits: abs_bit.saturating_sub(self.abs_offset),
            bit_count,
            position: self.position(),
            length: self.length(),
        }
    }
}
