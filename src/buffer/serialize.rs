//! Symmetric serialization over a [`BitBuffer`].
//!
//! A single `serialize_*` call sequence describes a record once; the
//! [`SerializeMode`] chosen at construction decides whether that sequence
//! writes the in-memory values to the buffer, reads the buffer back into
//! them, or merely advances the cursor to measure the encoded size without
//! touching memory. Keeping one code path for all three eliminates the
//! classic encode/decode drift bug.

use crate::buffer::bit::{var_len_bytes, BitBuffer};
use crate::error::BitwireError;

/// What a `serialize_*` call does to the value it is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerializeMode {
    /// Encode the value into the buffer.
    Write,
    /// Decode the buffer into the value.
    Read,
    /// Advance the cursor by the exact encoded size; the buffer and the
    /// value are both left untouched.
    Measure,
}

/// Drives one record description through a [`BitBuffer`] in a fixed mode.
#[derive(Debug)]
pub struct BitSerializer<'a, 'b> {
    buf: &'a mut BitBuffer<'b>,
    mode: SerializeMode,
}

macro_rules! impl_serialize_scalar {
    ($name:ident, $name_bits:ident, $ty:ty, $put_bits:ident, $get_bits:ident) => {
        #[doc = concat!("Serializes a full-width `", stringify!($ty), "`.")]
        pub fn $name(&mut self, value: &mut $ty) -> Result<(), BitwireError> {
            self.$name_bits(value, <$ty>::BITS)
        }

        #[doc = concat!("Serializes the low `bit_count` bits of a `", stringify!($ty), "`.")]
        pub fn $name_bits(&mut self, value: &mut $ty, bit_count: u32) -> Result<(), BitwireError> {
            match self.mode {
                SerializeMode::Write => self.buf.$put_bits(*value, bit_count),
                SerializeMode::Read => {
                    *value = self.buf.$get_bits(bit_count)?;
                    Ok(())
                }
                SerializeMode::Measure => self.buf.skip_bits(bit_count as usize),
            }
        }
    };
}

macro_rules! impl_serialize_var {
    ($name:ident, $ty:ty, $put:ident, $get:ident, $measure:expr) => {
        #[doc = concat!("Serializes a variable-length `", stringify!($ty), "`.")]
        pub fn $name(&mut self, value: &mut $ty) -> Result<(), BitwireError> {
            match self.mode {
                SerializeMode::Write => self.buf.$put(*value),
                SerializeMode::Read => {
                    *value = self.buf.$get();
                    Ok(())
                }
                SerializeMode::Measure => {
                    let bytes = var_len_bytes($measure(*value));
                    self.buf.skip_bits(bytes * 8)
                }
            }
        }
    };
}

impl<'a, 'b> BitSerializer<'a, 'b> {
    /// Binds a serializer to `buf` for the duration of one record.
    pub fn new(buf: &'a mut BitBuffer<'b>, mode: SerializeMode) -> Self {
        Self { buf, mode }
    }

    /// The mode this serializer was constructed with.
    pub fn mode(&self) -> SerializeMode {
        self.mode
    }

    /// Whether calls encode into the buffer (true in `Write` mode only).
    pub fn is_writing(&self) -> bool {
        self.mode == SerializeMode::Write
    }

    /// The underlying buffer, e.g. to inspect the cursor after measuring.
    pub fn buffer(&mut self) -> &mut BitBuffer<'b> {
        self.buf
    }

    /// Serializes a bool as a single bit.
    pub fn serialize_bool(&mut self, value: &mut bool) -> Result<(), BitwireError> {
        match self.mode {
            SerializeMode::Write => self.buf.put_bool(*value),
            SerializeMode::Read => {
                *value = self.buf.get_bool()?;
                Ok(())
            }
            SerializeMode::Measure => self.buf.skip_bits(1),
        }
    }

    impl_serialize_scalar!(serialize_u8, serialize_u8_bits, u8, put_u8_bits, get_u8_bits);
    impl_serialize_scalar!(serialize_u16, serialize_u16_bits, u16, put_u16_bits, get_u16_bits);
    impl_serialize_scalar!(serialize_u32, serialize_u32_bits, u32, put_u32_bits, get_u32_bits);
    impl_serialize_scalar!(serialize_u64, serialize_u64_bits, u64, put_u64_bits, get_u64_bits);
    impl_serialize_scalar!(serialize_i8, serialize_i8_bits, i8, put_i8_bits, get_i8_bits);
    impl_serialize_scalar!(serialize_i16, serialize_i16_bits, i16, put_i16_bits, get_i16_bits);
    impl_serialize_scalar!(serialize_i32, serialize_i32_bits, i32, put_i32_bits, get_i32_bits);
    impl_serialize_scalar!(serialize_i64, serialize_i64_bits, i64, put_i64_bits, get_i64_bits);

    /// Serializes an `f32` as its full 32-bit pattern.
    pub fn serialize_f32(&mut self, value: &mut f32) -> Result<(), BitwireError> {
        match self.mode {
            SerializeMode::Write => self.buf.put_f32(*value),
            SerializeMode::Read => {
                *value = self.buf.get_f32()?;
                Ok(())
            }
            SerializeMode::Measure => self.buf.skip_bits(32),
        }
    }

    /// Serializes an `f64` as its full 64-bit pattern.
    pub fn serialize_f64(&mut self, value: &mut f64) -> Result<(), BitwireError> {
        match self.mode {
            SerializeMode::Write => self.buf.put_f64(*value),
            SerializeMode::Read => {
                *value = self.buf.get_f64()?;
                Ok(())
            }
            SerializeMode::Measure => self.buf.skip_bits(64),
        }
    }

    impl_serialize_var!(serialize_var_u32, u32, put_var_u32, get_var_u32, |v: u32| v as u64);
    impl_serialize_var!(serialize_var_u64, u64, put_var_u64, get_var_u64, |v: u64| v);
    impl_serialize_var!(serialize_var_i32, i32, put_var_i32, get_var_i32, |v: i32| {
        crate::kernels::zigzag::encode(v) as u64
    });
    impl_serialize_var!(serialize_var_i64, i64, put_var_i64, get_var_i64, |v: i64| {
        crate::kernels::zigzag::encode(v)
    });

    /// Serializes a ranged-quantized float in `bit_count` bits.
    pub fn serialize_ranged_f32(
        &mut self,
        value: &mut f32,
        min: f32,
        max: f32,
        bit_count: u32,
    ) -> Result<(), BitwireError> {
        match self.mode {
            SerializeMode::Write => self.buf.put_ranged_f32(*value, min, max, bit_count),
            SerializeMode::Read => {
                *value = self.buf.get_ranged_f32(min, max, bit_count)?;
                Ok(())
            }
            SerializeMode::Measure => self.buf.skip_bits(bit_count as usize),
        }
    }

    /// Serializes a ranged integer; the bit width follows from `[min, max]`.
    pub fn serialize_ranged_i32(
        &mut self,
        value: &mut i32,
        min: i32,
        max: i32,
    ) -> Result<(), BitwireError> {
        match self.mode {
            SerializeMode::Write => self.buf.put_ranged_i32(*value, min, max).map(|_| ()),
            SerializeMode::Read => {
                *value = self.buf.get_ranged_i32(min, max)?;
                Ok(())
            }
            SerializeMode::Measure => {
                let bits = super::bit::bits_occupied(max.wrapping_sub(min) as u32 as u64);
                self.buf.skip_bits(bits as usize)
            }
        }
    }

    /// Serializes a 64-bit ranged integer.
    pub fn serialize_ranged_i64(
        &mut self,
        value: &mut i64,
        min: i64,
        max: i64,
    ) -> Result<(), BitwireError> {
        match self.mode {
            SerializeMode::Write => self.buf.put_ranged_i64(*value, min, max).map(|_| ()),
            SerializeMode::Read => {
                *value = self.buf.get_ranged_i64(min, max)?;
                Ok(())
            }
            SerializeMode::Measure => {
                let bits = super::bit::bits_occupied(max.wrapping_sub(min) as u64);
                self.buf.skip_bits(bits as usize)
            }
        }
    }

    /// Serializes a length-prefixed UTF-8 string. Measure mode still rejects
    /// over-long strings so a measured size is always writable.
    pub fn serialize_string(&mut self, value: &mut String) -> Result<(), BitwireError> {
        match self.mode {
            SerializeMode::Write => self.buf.put_str(value),
            SerializeMode::Read => {
                *value = self.buf.get_string()?;
                Ok(())
            }
            SerializeMode::Measure => {
                let len = value.len();
                if len > u16::MAX as usize {
                    return Err(BitwireError::StringTooLong { len });
                }
                self.buf.skip_bits((var_len_bytes(len as u64) + len) * 8)
            }
        }
    }

    /// Serializes a fixed-size byte run.
    pub fn serialize_bytes(&mut self, value: &mut [u8]) -> Result<(), BitwireError> {
        match self.mode {
            SerializeMode::Write => self.buf.put_bytes(value),
            SerializeMode::Read => self.buf.get_bytes(value),
            SerializeMode::Measure => self.buf.skip_bits(value.len() * 8),
        }
    }
}

//==================================================================================
// Unit Tests
//==================================================================================
#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        alive: bool,
        id: u32,
        health: i32,
        heading: f32,
        name: String,
    }

    impl Sample {
        fn serialize(&mut self, s: &mut BitSerializer<'_, '_>) -> Result<(), BitwireError> {
            s.serialize_bool(&mut self.alive)?;
            s.serialize_var_u32(&mut self.id)?;
            s.serialize_ranged_i32(&mut self.health, 0, 1000)?;
            s.serialize_ranged_f32(&mut self.heading, 0.0, 360.0, 16)?;
            s.serialize_string(&mut self.name)
        }
    }

    #[test]
    fn one_description_writes_and_reads() {
        let mut storage = [0u8; 64];
        let mut original = Sample {
            alive: true,
            id: 300,
            health: 731,
            heading: 123.5,
            name: "scout".to_string(),
        };

        let mut buf = BitBuffer::new(&mut storage);
        let mut s = BitSerializer::new(&mut buf, SerializeMode::Write);
        original.serialize(&mut s).unwrap();
        let written = buf.position();

        let mut decoded = Sample {
            alive: false,
            id: 0,
            health: 0,
            heading: 0.0,
            name: String::new(),
        };
        buf.rewind();
        let mut s = BitSerializer::new(&mut buf, SerializeMode::Read);
        decoded.serialize(&mut s).unwrap();

        assert_eq!(buf.position(), written);
        assert_eq!(decoded.alive, original.alive);
        assert_eq!(decoded.id, original.id);
        assert_eq!(decoded.health, original.health);
        assert!((decoded.heading - original.heading).abs() < 360.0 / 65535.0);
        assert_eq!(decoded.name, original.name);
    }

    #[test]
    fn measure_matches_write_exactly() {
        let mut sample = Sample {
            alive: false,
            id: u32::MAX,
            health: 1000,
            heading: 359.9,
            name: "a longer name with spaces".to_string(),
        };

        let mut storage = [0u8; 64];
        let mut buf = BitBuffer::new(&mut storage);
        let mut s = BitSerializer::new(&mut buf, SerializeMode::Write);
        sample.serialize(&mut s).unwrap();
        let written = buf.position();

        let mut scratch = [0u8; 64];
        let mut buf = BitBuffer::new(&mut scratch);
        let mut s = BitSerializer::new(&mut buf, SerializeMode::Measure);
        sample.serialize(&mut s).unwrap();
        assert_eq!(buf.position(), written);

        // Measuring must not have touched the backing memory.
        assert_eq!(scratch, [0u8; 64]);
    }

    #[test]
    fn measure_fails_where_write_would() {
        // A record too large for the window must fail in every mode, so a
        // measuring pass is a reliable preflight.
        let mut storage = [0u8; 4];
        let mut value = u64::MAX;

        let mut buf = BitBuffer::new(&mut storage);
        let mut s = BitSerializer::new(&mut buf, SerializeMode::Measure);
        assert!(s.serialize_var_u64(&mut value).is_err());

        let mut buf = BitBuffer::new(&mut storage);
        let mut s = BitSerializer::new(&mut buf, SerializeMode::Write);
        assert!(s.serialize_var_u64(&mut value).is_err());
    }
}
