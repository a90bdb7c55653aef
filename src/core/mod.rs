//! Core deterministic primitives.
//!
//! Integer coordinates, fixed-point turn time and state hashing.
//! Nothing in here knows about puzzle rules.

pub mod coord;
pub mod fixed;
pub mod hash;

// Re-export core types
pub use coord::{Coord, Shape};
pub use fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use hash::{StateHash, StateHasher};
