//! This module defines shared traits used across the codec kernels.

/// A trait that maps a signed integer type to its unsigned counterpart.
pub trait HasUnsigned {
    type Unsigned;
}

/// A trait that maps an unsigned integer type to its signed counterpart.
pub trait HasSigned {
    type Signed;
}

// Implement the traits for the integer widths the wire format carries.
macro_rules! impl_signed_unsigned_pair {
    ($S:ty, $U:ty) => {
        impl HasUnsigned for $S {
            type Unsigned = $U;
        }
        impl HasSigned for $U {
            type Signed = $S;
        }
    };
}

impl_signed_unsigned_pair!(i8, u8);
impl_signed_unsigned_pair!(i16, u16);
impl_signed_unsigned_pair!(i32, u32);
impl_signed_unsigned_pair!(i64, u64);
