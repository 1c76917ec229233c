//! Buffer views, symmetric serialization, and pooling.
//!
//! `bit` and `byte` are the two addressing granularities over a borrowed
//! array; `serialize` layers the write/read/measure triple over the bit view;
//! `pool` supplies reusable backing storage for both.

pub mod bit;
pub mod byte;
pub mod pool;
pub mod serialize;

pub use bit::{bits_occupied, var_len_bytes, BitBuffer};
pub use byte::{ByteBuffer, Endianness};
pub use pool::{size_class, BufferPool, PoolHandle, PooledBuffer, SharedPool};
pub use serialize::{BitSerializer, SerializeMode};

#[cfg(test)]
mod pool_tests;
