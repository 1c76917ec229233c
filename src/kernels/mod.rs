//! Pure, stateless codec kernels.
//!
//! Everything in here operates on plain slices and primitive values with no
//! buffer, cursor, or pool state; the `crate::buffer` views compose these into
//! the public encoding surface.

pub mod fastbit;
pub mod zigzag;
