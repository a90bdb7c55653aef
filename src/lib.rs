//! # Rockslide Core
//!
//! Deterministic turn resolution for Rockslide, a grid pushing puzzle
//! with rolling rocks, gravity and unlimited undo.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ROCKSLIDE CORE                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  ├── coord.rs    - Integer 3D cells and directions           │
//! │  ├── fixed.rs    - Q16.16 fixed-point turn time              │
//! │  └── hash.rs     - State hashing for verification            │
//! │                                                              │
//! │  game/           - Puzzle rules (deterministic)              │
//! │  ├── grid.rs     - Cell -> occupant index                    │
//! │  ├── registry.rs - Entity storage and ids                    │
//! │  ├── world.rs    - Paired mutations, inverse actions         │
//! │  ├── graph.rs    - Push-dependency graph                     │
//! │  ├── push.rs     - Attempted moves                           │
//! │  ├── collision.rs- Rolling rock scheduler                    │
//! │  ├── step.rs     - One turn                                  │
//! │  ├── action.rs   - Undo/redo history                         │
//! │  └── replay.rs   - Transcripts                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Determinism Guarantee
//!
//! - No floating-point arithmetic in game logic
//! - No HashMap (uses BTreeMap/BTreeSet for sorted iteration)
//! - No system time dependencies, no randomness
//!
//! Given the same level and the same inputs, the simulation produces
//! **identical results** on any platform.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;

// Re-export commonly used types
pub use core::coord::Coord;
pub use core::fixed::{Fixed, FIXED_ONE, FIXED_HALF, FIXED_SCALE};
pub use core::hash::StateHash;
pub use game::{step, Input, Level, PuzzleState, StepConfig, StepResult, Transcript};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
