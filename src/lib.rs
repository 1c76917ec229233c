//! This file is the root of the `bitwire` Rust crate.
//!
//! `bitwire` is a bit-granular binary encoding engine: buffer views that read
//! and write typed values at arbitrary bit offsets, variable-length and
//! ranged codecs layered on top, symmetric write/read/measure serialization,
//! and a generational pool for the backing byte arrays.
//!
//! This file's responsibilities are strictly limited to:
//! 1.  Declaring the top-level modules of the library (`buffer`, `kernels`,
//!     etc.) so the Rust compiler knows they exist.
//! 2.  Re-exporting the handful of types that make up the public surface.

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
pub mod buffer;
pub mod config;
pub mod error;
pub mod kernels;
pub mod traits;

//==================================================================================
// 2. Public Surface
//==================================================================================
pub use buffer::{
    bits_occupied, size_class, var_len_bytes, BitBuffer, BitSerializer, BufferPool, ByteBuffer,
    Endianness, PoolHandle, PooledBuffer, SerializeMode, SharedPool,
};
pub use config::PoolConfig;
pub use error::BitwireError;
