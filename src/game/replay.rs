//! Input Transcripts and Replay
//!
//! A transcript is everything needed to re-run a play session: the level,
//! the step configuration, the input sequence, periodic state hash
//! checkpoints and the final hash. Replaying it must land on the same
//! hashes bit for bit.
//!
//! Encoded with `bincode` for storage (a few bytes per input) or
//! `serde_json` when a human has to read it.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::{StateHash, StateHasher};
use crate::game::input::{self, Input};
use crate::game::level::LevelError;
use crate::game::state::PuzzleState;
use crate::game::step::{step, StepConfig, StepResult};

/// Current transcript version.
pub const TRANSCRIPT_VERSION: u8 = 1;

/// Inputs between state hash checkpoints.
pub const CHECKPOINT_INTERVAL: u32 = 16;

/// Why a transcript could not be replayed.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("transcript encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("transcript JSON failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("transcript level is invalid: {0}")]
    Level(#[from] LevelError),

    #[error("unsupported transcript version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid input code: {0}")]
    Input(#[from] input::InputError),

    #[error("checkpoint after input {at} diverged: expected {expected}, got {actual}")]
    CheckpointMismatch { at: u32, expected: String, actual: String },

    #[error("final state diverged: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
}

/// State hash after a given number of inputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub inputs: u32,
    pub state_hash: StateHash,
}

/// Recorded play session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    /// Version for forward compatibility
    pub version: u8,
    /// Level description, as loaded
    pub level_json: String,
    /// Step configuration the session ran with
    pub config: StepConfig,
    /// Input codes, one byte each
    pub inputs: Vec<u8>,
    /// Periodic state hashes
    pub checkpoints: Vec<Checkpoint>,
    /// State hash after the last input
    pub final_hash: StateHash,
    /// Was the level solved at the end?
    pub won: bool,
}

impl Transcript {
    pub fn inputs(&self) -> Result<Vec<Input>, ReplayError> {
        Ok(input::unpack(&self.inputs)?)
    }

    /// Serialize to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ReplayError> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ReplayError> {
        let transcript: Transcript = bincode::deserialize(data)?;
        transcript.check_version()?;
        Ok(transcript)
    }

    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        let transcript: Transcript = serde_json::from_str(json)?;
        transcript.check_version()?;
        Ok(transcript)
    }

    fn check_version(&self) -> Result<(), ReplayError> {
        if self.version != TRANSCRIPT_VERSION {
            return Err(ReplayError::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    /// Identity of the session: level, rules and inputs, not outcome.
    pub fn digest(&self) -> StateHash {
        let mut hasher = StateHasher::for_transcript();
        hasher.update_u8(self.version);
        hasher.update_u32(self.level_json.len() as u32);
        hasher.update_bytes(self.level_json.as_bytes());
        hasher.update_fixed(self.config.collision_tie_epsilon);
        hasher.update_u32(self.config.max_gravity_passes);
        hasher.update_u32(self.inputs.len() as u32);
        hasher.update_bytes(&self.inputs);
        hasher.finalize()
    }

    /// Re-run the session from scratch and check every recorded hash.
    /// Returns the final state.
    pub fn replay(&self) -> Result<PuzzleState, ReplayError> {
        let mut state = PuzzleState::from_json(&self.level_json, self.config.timing)?;
        let inputs = self.inputs()?;
        let mut checkpoints = self.checkpoints.iter().peekable();

        for (i, input) in inputs.iter().enumerate() {
            step(&mut state, *input, &self.config);
            let done = i as u32 + 1;
            if let Some(checkpoint) = checkpoints.next_if(|c| c.inputs == done) {
                let actual = state.compute_hash();
                if actual != checkpoint.state_hash {
                    return Err(ReplayError::CheckpointMismatch {
                        at: done,
                        expected: hex::encode(checkpoint.state_hash),
                        actual: hex::encode(actual),
                    });
                }
            }
        }

        let actual = state.compute_hash();
        if actual != self.final_hash {
            return Err(ReplayError::HashMismatch {
                expected: hex::encode(self.final_hash),
                actual: hex::encode(actual),
            });
        }
        tracing::debug!(inputs = inputs.len(), hash = %hex::encode(actual), "replay verified");
        Ok(state)
    }
}

// =============================================================================
// RECORDER
// =============================================================================

/// Plays a level while recording a transcript.
pub struct Recorder {
    state: PuzzleState,
    level_json: String,
    config: StepConfig,
    inputs: Vec<Input>,
    checkpoints: Vec<Checkpoint>,
}

impl Recorder {
    pub fn new(level_json: &str, config: StepConfig) -> Result<Self, ReplayError> {
        let state = PuzzleState::from_json(level_json, config.timing)?;
        Ok(Self {
            state,
            level_json: level_json.to_string(),
            config,
            inputs: Vec::new(),
            checkpoints: Vec::new(),
        })
    }

    pub fn state(&self) -> &PuzzleState {
        &self.state
    }

    /// Step and record.
    pub fn step(&mut self, input: Input) -> StepResult {
        let result = step(&mut self.state, input, &self.config);
        self.inputs.push(input);
        let count = self.inputs.len() as u32;
        if count % CHECKPOINT_INTERVAL == 0 {
            self.checkpoints.push(Checkpoint { inputs: count, state_hash: self.state.compute_hash() });
        }
        result
    }

    /// Close the recording.
    pub fn finish(self) -> (PuzzleState, Transcript) {
        let transcript = Transcript {
            version: TRANSCRIPT_VERSION,
            level_json: self.level_json,
            config: self.config,
            inputs: input::pack(&self.inputs),
            checkpoints: self.checkpoints,
            final_hash: self.state.compute_hash(),
            won: self.state.is_won(),
        };
        (self.state, transcript)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::input::parse_script;

    const LEVEL: &str = r#"{
        "name": "replay",
        "base": [0, 0, 0],
        "size": [7, 4, 2],
        "map": [
            1, 1, 1, 1, 1, 1, 1,
            1, 1, 1, 1, 1, 1, 1,
            1, 1, 1, 1, 1, 1, 1,
            1, 1, 1, 1, 1, 1, 1,

            1, 1, 1, 1, 1, 1, 1,
            1, 0, 0, 0, 0, 0, 1,
            1, 0, 0, 0, 0, 0, 1,
            1, 1, 1, 1, 1, 1, 1
        ],
        "entities": [
            { "kind": { "type": "Player" }, "position": [1, 1, 1], "direction": [1, 0, 0] },
            { "kind": { "type": "PushBlock" }, "position": [2, 2, 1] },
            { "kind": { "type": "Goal" }, "position": [5, 2, 1] }
        ]
    }"#;

    fn record(script: &str) -> Transcript {
        let mut recorder = Recorder::new(LEVEL, StepConfig::default()).unwrap();
        for input in parse_script(script).unwrap() {
            recorder.step(input);
        }
        recorder.finish().1
    }

    #[test]
    fn test_replay_matches_recording() {
        let transcript = record("RRRRzzyD.LLR!RRRRDRRRRRRRRRRRRRR");
        assert!(!transcript.checkpoints.is_empty());
        let state = transcript.replay().unwrap();
        assert_eq!(state.compute_hash(), transcript.final_hash);
    }

    #[test]
    fn test_binary_and_json_encodings() {
        let transcript = record("RDRR");
        let bytes = transcript.to_bytes().unwrap();
        assert_eq!(Transcript::from_bytes(&bytes).unwrap(), transcript);
        let json = transcript.to_json().unwrap();
        assert_eq!(Transcript::from_json(&json).unwrap(), transcript);
    }

    #[test]
    fn test_tampered_transcript_is_rejected() {
        let mut transcript = record("RDRR");
        transcript.inputs[0] = Input::Wait.to_u8();
        assert!(matches!(transcript.replay(), Err(ReplayError::HashMismatch { .. })));
    }

    #[test]
    fn test_tampered_checkpoint_is_rejected() {
        let mut transcript = record("RRRRDLLLLURRRRDL");
        assert_eq!(transcript.checkpoints.len(), 1);
        transcript.checkpoints[0].state_hash = [0; 32];
        assert!(matches!(transcript.replay(), Err(ReplayError::CheckpointMismatch { at: 16, .. })));
    }

    #[test]
    fn test_version_checked() {
        let mut transcript = record("R");
        transcript.version = 99;
        let bytes = transcript.to_bytes().unwrap();
        assert!(matches!(Transcript::from_bytes(&bytes), Err(ReplayError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_digest_ignores_outcome() {
        let a = record("RD");
        let mut b = a.clone();
        b.final_hash = [7; 32];
        assert_eq!(a.digest(), b.digest());
        assert_ne!(a.digest(), record("DR").digest());
    }

    #[test]
    fn test_digest_covers_collision_rules() {
        let a = record("RD");
        let mut b = a.clone();
        b.config.collision_tie_epsilon += 1;
        assert_ne!(a.digest(), b.digest());
    }
}
