//! Puzzle Rules
//!
//! Everything that decides what a turn does. 100% deterministic.
//!
//! ## Module Structure
//!
//! - `entity`: Entity records, kinds and capabilities
//! - `grid`: Cell to occupant index
//! - `registry`: Entity storage, id allocation, respawn aliases
//! - `world`: Grid + registry, the only mutation point
//! - `action`: Reversible actions and the undo stack
//! - `graph`: Push-dependency graph for one attempted move
//! - `push`: Building and applying push graphs
//! - `collision`: Rolling rock collision scheduler
//! - `step`: One turn
//! - `events`: Timed presentation events
//! - `input`: Input symbols
//! - `level`: Level descriptions
//! - `state`: Level in play (world + history)
//! - `replay`: Transcripts and replay verification

pub mod entity;
pub mod grid;
pub mod registry;
pub mod world;
pub mod action;
pub mod graph;
pub mod push;
pub mod collision;
pub mod step;
pub mod events;
pub mod input;
pub mod level;
pub mod state;
pub mod replay;

// Re-export key types
pub use entity::{Entity, EntityDef, EntityId, EntityKind, KindTag};
pub use grid::Bounds;
pub use world::World;
pub use action::{Action, UndoStack};
pub use step::{step, StepConfig, StepResult};
pub use events::{GameEvent, GameEventData};
pub use input::Input;
pub use level::{Level, LevelError};
pub use state::PuzzleState;
pub use replay::{Recorder, ReplayError, Transcript};
