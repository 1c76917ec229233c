//! The byte-granular buffer view.
//!
//! [`ByteBuffer`] is the whole-byte counterpart to [`crate::buffer::BitBuffer`]:
//! the same window-and-cursor model, addressed in bytes, with a selectable
//! scalar byte order. It is the right view when a format never packs below
//! byte granularity; every scalar lands on whole bytes and copies are plain
//! slice operations.
//!
//! Variable-length integers, deltas, and strings share the exact codec used
//! by the bit view, so a varint or string written through one view decodes
//! through the other whenever the bit view's cursor is byte aligned.

use crate::buffer::bit::var_len_bytes;
use crate::error::BitwireError;
use crate::kernels::zigzag;

/// Scalar byte order for a [`ByteBuffer`].
///
/// Network formats conventionally use big-endian, which is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// A cursor over a byte array window with a fixed scalar byte order.
#[derive(Debug)]
pub struct ByteBuffer<'a> {
    data: &'a mut [u8],
    abs_position: usize,
    abs_offset: usize,
    abs_length: usize,
    endianness: Endianness,
}

macro_rules! impl_byte_scalar {
    ($ty:ty, $put:ident, $put_at:ident, $get:ident, $get_at:ident) => {
        #[doc = concat!("Writes a `", stringify!($ty), "` in the buffer's byte order and advances the cursor.")]
        pub fn $put(&mut self, value: $ty) -> Result<(), BitwireError> {
            self.$put_at(self.position(), value)?;
            self.abs_position += std::mem::size_of::<$ty>();
            Ok(())
        }

        #[doc = concat!("Writes a `", stringify!($ty), "` at a window-relative byte offset without moving the cursor.")]
        pub fn $put_at(&mut self, offset: usize, value: $ty) -> Result<(), BitwireError> {
            let size = std::mem::size_of::<$ty>();
            let abs = self.check_write(offset, size)?;
            let bytes = match self.endianness {
                Endianness::Big => value.to_be_bytes(),
                Endianness::Little => value.to_le_bytes(),
            };
            self.data[abs..abs + size].copy_from_slice(&bytes);
            Ok(())
        }

        #[doc = concat!("Reads a `", stringify!($ty), "` in the buffer's byte order and advances the cursor.")]
        pub fn $get(&mut self) -> Result<$ty, BitwireError> {
            let value = self.$get_at(self.position())?;
            self.abs_position += std::mem::size_of::<$ty>();
            Ok(value)
        }

        #[doc = concat!("Reads a `", stringify!($ty), "` at a window-relative byte offset without moving the cursor.")]
        pub fn $get_at(&self, offset: usize) -> Result<$ty, BitwireError> {
            let size = std::mem::size_of::<$ty>();
            let abs = self.check_read(offset, size)?;
            let mut bytes = [0u8; std::mem::size_of::<$ty>()];
            bytes.copy_from_slice(&self.data[abs..abs + size]);
            Ok(match self.endianness {
                Endianness::Big => <$ty>::from_be_bytes(bytes),
                Endianness::Little => <$ty>::from_le_bytes(bytes),
            })
        }
    };
}

impl<'a> ByteBuffer<'a> {
    //==============================================================================
    // Construction
    //==============================================================================

    /// A big-endian view over the whole array.
    pub fn new(data: &'a mut [u8]) -> Self {
        Self::with_endianness(data, Endianness::Big)
    }

    /// A view over the whole array with an explicit byte order.
    pub fn with_endianness(data: &'a mut [u8], endianness: Endianness) -> Self {
        let abs_length = data.len();
        Self {
            data,
            abs_position: 0,
            abs_offset: 0,
            abs_length,
            endianness,
        }
    }

    /// A view over the `length` window starting `offset` bytes into the array.
    pub fn with_window(
        data: &'a mut [u8],
        offset: usize,
        length: usize,
        endianness: Endianness,
    ) -> Result<Self, BitwireError> {
        if offset + length > data.len() {
            return Err(BitwireError::WindowExceedsBuffer {
                offset,
                length,
                capacity: data.len(),
                unit: "bytes",
            });
        }
        Ok(Self {
            data,
            abs_position: offset,
            abs_offset: offset,
            abs_length: offset + length,
            endianness,
        })
    }

    pub(crate) fn over(data: &'a mut [u8], offset: usize, length: usize, endianness: Endianness) -> Self {
        debug_assert!(offset + length <= data.len());
        Self {
            data,
            abs_position: offset,
            abs_offset: offset,
            abs_length: offset + length,
            endianness,
        }
    }

    //==============================================================================
    // Cursor & window
    //==============================================================================

    /// The byte order scalars are encoded with.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Cursor position relative to the window start, in bytes.
    pub fn position(&self) -> usize {
        self.abs_position - self.abs_offset
    }

    /// Moves the cursor to a window-relative byte position.
    pub fn set_position(&mut self, position: usize) -> Result<(), BitwireError> {
        let abs = self.abs_offset + position;
        if abs > self.abs_length {
            return Err(self.range_violation(false, abs, 0));
        }
        self.abs_position = abs;
        Ok(())
    }

    /// Usable window length, in bytes.
    pub fn length(&self) -> usize {
        self.abs_length - self.abs_offset
    }

    /// Re-bases the window end; shrinking clamps the cursor down.
    pub fn set_length(&mut self, length: usize) -> Result<(), BitwireError> {
        if self.abs_offset + length > self.data.len() {
            return Err(BitwireError::WindowExceedsBuffer {
                offset: self.abs_offset,
                length,
                capacity: self.data.len(),
                unit: "bytes",
            });
        }
        self.abs_length = self.abs_offset + length;
        if self.abs_position > self.abs_length {
            self.abs_position = self.abs_length;
        }
        Ok(())
    }

    /// Bytes left between the cursor and the window end.
    pub fn remaining(&self) -> usize {
        self.abs_length - self.abs_position
    }

    /// Advances the cursor without writing.
    pub fn skip_bytes(&mut self, bytes: usize) -> Result<(), BitwireError> {
        let abs = self.abs_position + bytes;
        if abs > self.abs_length {
            return Err(self.range_violation(false, self.abs_position, bytes));
        }
        self.abs_position = abs;
        Ok(())
    }

    /// Moves the cursor back to the window start.
    pub fn rewind(&mut self) {
        self.abs_position = self.abs_offset;
    }

    /// Advances the cursor to the next 4-byte boundary, unless already there.
    pub fn pad_to_4(&mut self) -> Result<(), BitwireError> {
        let delta = (4 - (self.abs_position & 3)) & 3;
        self.skip_bytes(delta)
    }

    //==============================================================================
    // Scalars
    //==============================================================================

    impl_byte_scalar!(u8, put_u8, put_u8_at, get_u8, get_u8_at);
    impl_byte_scalar!(u16, put_u16, put_u16_at, get_u16, get_u16_at);
    impl_byte_scalar!(u32, put_u32, put_u32_at, get_u32, get_u32_at);
    impl_byte_scalar!(u64, put_u64, put_u64_at, get_u64, get_u64_at);
    impl_byte_scalar!(i8, put_i8, put_i8_at, get_i8, get_i8_at);
    impl_byte_scalar!(i16, put_i16, put_i16_at, get_i16, get_i16_at);
    impl_byte_scalar!(i32, put_i32, put_i32_at, get_i32, get_i32_at);
    impl_byte_scalar!(i64, put_i64, put_i64_at, get_i64, get_i64_at);
    impl_byte_scalar!(f32, put_f32, put_f32_at, get_f32, get_f32_at);
    impl_byte_scalar!(f64, put_f64, put_f64_at, get_f64, get_f64_at);

    /// Writes a bool as one byte (0 or 1) and advances the cursor.
    pub fn put_bool(&mut self, value: bool) -> Result<(), BitwireError> {
        self.put_u8(value as u8)
    }

    /// Reads a one-byte bool; any non-zero byte is true.
    pub fn get_bool(&mut self) -> Result<bool, BitwireError> {
        Ok(self.get_u8()? != 0)
    }

    //==============================================================================
    // Variable-length integers & deltas
    //==============================================================================

    // Varints are byte-order independent; the codec is shared with the bit view.

    /// Writes a variable-length unsigned integer and advances the cursor.
    pub fn put_var_u64(&mut self, value: u64) -> Result<(), BitwireError> {
        let len = var_len_bytes(value);
        self.check_write(self.position(), len)?;
        let mut value = value;
        while value >= 0x80 {
            self.put_u8(0x80 | value as u8)?;
            value >>= 7;
        }
        self.put_u8(value as u8)
    }

    /// Writes a variable-length `u32` and advances the cursor.
    pub fn put_var_u32(&mut self, value: u32) -> Result<(), BitwireError> {
        self.put_var_u64(value as u64)
    }

    /// Zigzag-encodes then writes a variable-length `i32`.
    pub fn put_var_i32(&mut self, value: i32) -> Result<(), BitwireError> {
        self.put_var_u64(zigzag::encode(value) as u64)
    }

    /// Zigzag-encodes then writes a variable-length `i64`.
    pub fn put_var_i64(&mut self, value: i64) -> Result<(), BitwireError> {
        self.put_var_u64(zigzag::encode(value))
    }

    /// Reads a variable-length unsigned integer, lenient on truncation: if
    /// the window ends before a terminator byte the accumulated partial value
    /// is returned and the cursor stops at the window end.
    pub fn get_var_u64(&mut self) -> u64 {
        let mut value = 0u64;
        let mut shift = 0u32;
        while self.abs_position < self.abs_length {
            let b = self.data[self.abs_position];
            self.abs_position += 1;
            if shift < 64 {
                value |= ((b & 0x7f) as u64) << shift;
            }
            shift += 7;
            if b & 0x80 == 0 {
                break;
            }
        }
        value
    }

    /// Reads a variable-length `u32` (lenient) and advances the cursor.
    pub fn get_var_u32(&mut self) -> u32 {
        self.get_var_u64() as u32
    }

    /// Reads a variable-length zigzagged `i32` (lenient).
    pub fn get_var_i32(&mut self) -> i32 {
        zigzag::decode(self.get_var_u32())
    }

    /// Reads a variable-length zigzagged `i64` (lenient).
    pub fn get_var_i64(&mut self) -> i64 {
        zigzag::decode(self.get_var_u64())
    }

    /// Varint-encodes `value - previous` and advances the cursor.
    pub fn put_delta_i32(&mut self, value: i32, previous: i32) -> Result<(), BitwireError> {
        self.put_var_i32(value.wrapping_sub(previous))
    }

    /// Decodes a delta against `previous` and advances the cursor.
    pub fn get_delta_i32(&mut self, previous: i32) -> i32 {
        self.get_var_i32().wrapping_add(previous)
    }

    /// Varint-encodes `value - previous` and advances the cursor.
    pub fn put_delta_i64(&mut self, value: i64, previous: i64) -> Result<(), BitwireError> {
        self.put_var_i64(value.wrapping_sub(previous))
    }

    /// Decodes a delta against `previous` and advances the cursor.
    pub fn get_delta_i64(&mut self, previous: i64) -> i64 {
        self.get_var_i64().wrapping_add(previous)
    }

    //==============================================================================
    // Raw bytes, sub-buffers, strings
    //==============================================================================

    /// Writes a byte slice at the cursor and advances it.
    pub fn put_bytes(&mut self, src: &[u8]) -> Result<(), BitwireError> {
        let abs = self.check_write(self.position(), src.len())?;
        self.data[abs..abs + src.len()].copy_from_slice(src);
        self.abs_position += src.len();
        Ok(())
    }

    /// Fills `dst` from the cursor, advancing it.
    pub fn get_bytes(&mut self, dst: &mut [u8]) -> Result<(), BitwireError> {
        let abs = self.check_read(self.position(), dst.len())?;
        dst.copy_from_slice(&self.data[abs..abs + dst.len()]);
        self.abs_position += dst.len();
        Ok(())
    }

    /// Copies `src`'s whole window to the cursor and advances by its length.
    pub fn put_buffer(&mut self, src: &ByteBuffer<'_>) -> Result<(), BitwireError> {
        let len = src.length();
        let abs = self.check_write(self.position(), len)?;
        self.data[abs..abs + len].copy_from_slice(&src.data[src.abs_offset..src.abs_length]);
        self.abs_position += len;
        Ok(())
    }

    /// Encodes a string as a varint byte length followed by its UTF-8 bytes.
    pub fn put_str(&mut self, s: &str) -> Result<(), BitwireError> {
        let len = s.len();
        if len > u16::MAX as usize {
            return Err(BitwireError::StringTooLong { len });
        }
        self.check_write(self.position(), var_len_bytes(len as u64) + len)?;
        self.put_var_u64(len as u64)?;
        self.put_bytes(s.as_bytes())
    }

    /// Decodes a string written by [`ByteBuffer::put_str`].
    pub fn get_string(&mut self) -> Result<String, BitwireError> {
        let len = self.get_var_u64() as u16 as usize;
        self.check_read(self.position(), len)?;
        let mut bytes = vec![0u8; len];
        self.get_bytes(&mut bytes)?;
        Ok(String::from_utf8(bytes)?)
    }

    //==============================================================================
    // Equality, derived views
    //==============================================================================

    /// Compares the logical windows of two views byte for byte.
    pub fn buffer_equals(&self, other: &ByteBuffer<'_>) -> bool {
        self.data[self.abs_offset..self.abs_length]
            == other.data[other.abs_offset..other.abs_length]
    }

    /// A view over the bytes written so far: window start up to the cursor.
    pub fn from_start_to_position(&mut self) -> ByteBuffer<'_> {
        let offset = self.abs_offset;
        let length = self.abs_position - self.abs_offset;
        let endianness = self.endianness;
        ByteBuffer::over(self.data, offset, length, endianness)
    }

    /// A view over the rest of the window: cursor up to the window end.
    pub fn from_here_to_end(&mut self) -> ByteBuffer<'_> {
        let offset = self.abs_position;
        let length = self.abs_length - self.abs_position;
        let endianness = self.endianness;
        ByteBuffer::over(self.data, offset, length, endianness)
    }

    /// Carves a `length` sub-view starting at the cursor and advances past it.
    pub fn get_buffer(&mut self, length: usize) -> Result<ByteBuffer<'_>, BitwireError> {
        self.check_read(self.position(), length)?;
        let start = self.abs_position;
        self.abs_position += length;
        let endianness = self.endianness;
        Ok(ByteBuffer::over(self.data, start, length, endianness))
    }

    /// Copies the window into a fresh `Vec<u8>`.
    pub fn to_vec(&self) -> Vec<u8> {
        self.data[self.abs_offset..self.abs_length].to_vec()
    }

    //==============================================================================
    // Validation
    //==============================================================================

    // Returns the absolute start index on success.
    fn check_write(&self, offset: usize, byte_count: usize) -> Result<usize, BitwireError> {
        self.check_access(true, offset, byte_count)
    }

    fn check_read(&self, offset: usize, byte_count: usize) -> Result<usize, BitwireError> {
        self.check_access(false, offset, byte_count)
    }

    fn check_access(
        &self,
        writing: bool,
        offset: usize,
        byte_count: usize,
    ) -> Result<usize, BitwireError> {
        let abs = self.abs_offset + offset;
        if abs.saturating_add(byte_count) > self.abs_length {
            return Err(self.range_violation(writing, abs, byte_count));
        }
        Ok(abs)
    }

    fn range_violation(&self, writing: bool, abs: usize, byte_count: usize) -> BitwireError {
        // Reported in bits, matching the bit view's diagnostics.
        BitwireError::RangeViolation {
            writing,
            offset_bits: abs.saturating_sub(self.abs_offset) * 8,
            bit_count: byte_count * 8,
            position: self.position() * 8,
            length: self.length() * 8,
        }
    }
}

//==================================================================================
// Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_respect_endianness() {
        let mut storage = [0u8; 8];
        let mut buf = ByteBuffer::new(&mut storage);
        buf.put_u32(0x1122_3344).unwrap();
        assert_eq!(&storage[..4], &[0x11, 0x22, 0x33, 0x44]);

        let mut buf = ByteBuffer::with_endianness(&mut storage, Endianness::Little);
        buf.put_u32(0x1122_3344).unwrap();
        assert_eq!(&storage[..4], &[0x44, 0x33, 0x22, 0x11]);
    }

    #[test]
    fn mixed_record_roundtrip() {
        let mut storage = [0u8; 64];
        let mut buf = ByteBuffer::with_endianness(&mut storage, Endianness::Little);
        buf.put_bool(true).unwrap();
        buf.put_u16(0xBEEF).unwrap();
        buf.put_var_i64(-123_456_789).unwrap();
        buf.put_f64(std::f64::consts::PI).unwrap();
        buf.put_str("payload").unwrap();
        let end = buf.position();

        buf.rewind();
        assert!(buf.get_bool().unwrap());
        assert_eq!(buf.get_u16().unwrap(), 0xBEEF);
        assert_eq!(buf.get_var_i64(), -123_456_789);
        assert_eq!(buf.get_f64().unwrap(), std::f64::consts::PI);
        assert_eq!(buf.get_string().unwrap(), "payload");
        assert_eq!(buf.position(), end);
    }

    #[test]
    fn window_confines_all_access() {
        let mut storage = [0u8; 16];
        let mut buf = ByteBuffer::with_window(&mut storage, 4, 8, Endianness::Big).unwrap();
        assert_eq!(buf.length(), 8);
        buf.put_u64(u64::MAX).unwrap();
        assert!(buf.put_u8(1).is_err());
        assert!(buf.set_position(9).is_err());

        assert_eq!(storage[3], 0);
        assert_eq!(storage[12], 0);
        assert_eq!(&storage[4..12], &[0xff; 8]);
    }

    #[test]
    fn pad_to_4_only_when_misaligned() {
        let mut storage = [0u8; 16];
        let mut buf = ByteBuffer::new(&mut storage);
        buf.pad_to_4().unwrap();
        assert_eq!(buf.position(), 0);
        buf.put_u8(1).unwrap();
        buf.pad_to_4().unwrap();
        assert_eq!(buf.position(), 4);
    }

    #[test]
    fn sub_buffer_carve_and_compare() {
        let mut a = [0u8; 16];
        let mut b = [0u8; 8];
        {
            let mut buf = ByteBuffer::new(&mut a);
            buf.put_u32(7).unwrap();
            buf.put_u32(9).unwrap();
            let mut head = buf.from_start_to_position();
            assert_eq!(head.length(), 8);
            assert_eq!(head.get_u32().unwrap(), 7);
        }
        {
            let mut buf = ByteBuffer::new(&mut b);
            buf.put_u32(7).unwrap();
            buf.put_u32(9).unwrap();
        }
        let mut a_view = ByteBuffer::new(&mut a);
        let carved = a_view.get_buffer(8).unwrap();
        let b_view = ByteBuffer::new(&mut b);
        assert!(carved.buffer_equals(&b_view));
    }

    #[test]
    fn lenient_varint_stops_at_window_end() {
        let mut storage = [0x80u8; 3];
        let mut buf = ByteBuffer::new(&mut storage);
        let value = buf.get_var_u64();
        assert_eq!(value, 0);
        assert_eq!(buf.remaining(), 0);
    }
}
