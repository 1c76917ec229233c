//! This module defines the single, unified error type for the entire bitwire library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! Every fallible buffer operation reports through `BitwireError`. Range
//! violations are raised up front, before any partial write touches the
//! backing array, so a failed call never leaves a half-encoded value behind.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BitwireError {
    // =========================================================================
    // === Window / cursor violations
    // =========================================================================
    /// A put/get/seek would cross the view's window. Carries the direction of
    /// the access, the window-relative offset and bit count that were
    /// attempted, and a snapshot of the cursor state at the time of failure.
    #[error(
        "out-of-range {} of {bit_count} bits at bit offset {offset_bits} (cursor={position}, window={length} bits)",
        if *writing { "write" } else { "read" }
    )]
    RangeViolation {
        writing: bool,
        offset_bits: usize,
        bit_count: usize,
        position: usize,
        length: usize,
    },

    /// A view window was constructed or resized past the end of its backing array.
    #[error("window of {length} {unit} at offset {offset} exceeds backing buffer of {capacity} {unit}")]
    WindowExceedsBuffer {
        offset: usize,
        length: usize,
        capacity: usize,
        unit: &'static str,
    },

    // =========================================================================
    // === Codec errors
    // =========================================================================
    /// Strict variable-length decoding hit the end of the window before a
    /// terminator byte. The lenient decode path never raises this; it returns
    /// the accumulated partial value instead.
    #[error("variable-length integer truncated after {bytes_consumed} bytes")]
    TruncatedVarint { bytes_consumed: usize },

    /// A decoded string payload was not valid UTF-8.
    #[error("decoded string is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The string byte length does not fit the u16-range length prefix.
    #[error("string of {len} bytes exceeds the u16 length prefix range")]
    StringTooLong { len: usize },
}
