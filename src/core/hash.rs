//! State Hashing for Verification
//!
//! Deterministic hashing of puzzle state for:
//! - Replay validation (same inputs, same final hash)
//! - Undo checks (a step followed by its undo restores the hash)
//!
//! Entity ids are deliberately not hashed by the world: an entity respawned
//! by undo gets a fresh id but is structurally the same entity.

use sha2::{Sha256, Digest};
use super::coord::Coord;
use super::fixed::Fixed;

/// Hash output type (256 bits / 32 bytes)
pub type StateHash = [u8; 32];

/// Deterministic hasher for puzzle state.
///
/// Wraps SHA-256 with helpers for grid types.
/// Order of updates is critical for determinism.
pub struct StateHasher {
    hasher: Sha256,
}

impl StateHasher {
    /// Create a new hasher with domain separator.
    pub fn new(domain: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain);
        Self { hasher }
    }

    /// Create hasher for world state.
    pub fn for_world_state() -> Self {
        Self::new(b"ROCKSLIDE_WORLD_V1")
    }

    /// Create hasher for input transcripts.
    pub fn for_transcript() -> Self {
        Self::new(b"ROCKSLIDE_TRANSCRIPT_V1")
    }

    /// Update with raw bytes.
    #[inline]
    pub fn update_bytes(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Update with a u8 value.
    #[inline]
    pub fn update_u8(&mut self, value: u8) {
        self.hasher.update([value]);
    }

    /// Update with a u32 value (little-endian).
    #[inline]
    pub fn update_u32(&mut self, value: u32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with an i32 value (little-endian).
    #[inline]
    pub fn update_i32(&mut self, value: i32) {
        self.hasher.update(value.to_le_bytes());
    }

    /// Update with a Fixed value.
    #[inline]
    pub fn update_fixed(&mut self, value: Fixed) {
        self.update_i32(value);
    }

    /// Update with a coordinate.
    #[inline]
    pub fn update_coord(&mut self, value: Coord) {
        self.update_i32(value.x);
        self.update_i32(value.y);
        self.update_i32(value.layer);
    }

    /// Update with a length-prefixed list of coordinates.
    pub fn update_coords(&mut self, values: &[Coord]) {
        self.update_u32(values.len() as u32);
        for value in values {
            self.update_coord(*value);
        }
    }

    /// Update with a boolean.
    #[inline]
    pub fn update_bool(&mut self, value: bool) {
        self.update_u8(value as u8);
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> StateHash {
        self.hasher.finalize().into()
    }
}

/// Compute the world state hash.
///
/// Called by `World::structural_hash()`. The closure adds entity data.
pub fn compute_state_hash<F>(won: bool, add_state: F) -> StateHash
where
    F: FnOnce(&mut StateHasher),
{
    let mut hasher = StateHasher::for_world_state();
    hasher.update_bool(won);
    add_state(&mut hasher);
    hasher.finalize()
}

// =============================================================================
// TESTS
// =============================================================================
