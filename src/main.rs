//! Rockslide Simulator
//!
//! Headless runner for the puzzle core. Plays a scripted input sequence on
//! a level, checks that undo restores the board, and verifies the run by
//! replaying its transcript.
//!
//! ```text
//! rockslide-sim [--config step.json] [level.json] [script]
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rockslide::{
    VERSION,
    game::{
        events::GameEventData,
        input::parse_script,
        replay::{Recorder, Transcript},
        Input, StepConfig,
    },
};

/// Level played when none is given.
const DEMO_LEVEL: &str = r#"{
    "name": "demo",
    "base": [0, 0, 0],
    "size": [9, 7, 2],
    "map": [
        1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1,

        1, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 0, 0, 0, 0, 0, 0, 0, 1,
        1, 1, 1, 1, 1, 1, 1, 1, 1
    ],
    "entities": [
        { "kind": { "type": "Player" }, "position": [1, 5, 1], "direction": [1, 0, 0] },
        { "kind": { "type": "PushBlock" }, "position": [2, 3, 1] },
        { "kind": { "type": "Rock" }, "position": [5, 1, 1] },
        { "kind": { "type": "Brittle" }, "position": [7, 4, 1] },
        { "kind": { "type": "Goal" }, "position": [7, 2, 1] }
    ]
}"#;

/// Inputs played when none are given.
const DEMO_SCRIPT: &str = "URRz.yRRUURRU";

/// Play a Rockslide level headlessly and verify the run replays.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Step configuration JSON (collision epsilon, event timing).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Level JSON to play. Defaults to the built-in demo level.
    #[arg(value_name = "LEVEL")]
    level: Option<PathBuf>,
    /// Inputs as letters: U D L R, `.` to wait, z undo, y redo, ! restart.
    #[arg(value_name = "SCRIPT")]
    script: Option<String>,
}

fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    info!("Rockslide simulator v{}", VERSION);

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
            StepConfig::from_json(&json).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => StepConfig::default(),
    };
    let level_json = match &args.level {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading level {}", path.display()))?,
        None => DEMO_LEVEL.to_string(),
    };
    let inputs = parse_script(args.script.as_deref().unwrap_or(DEMO_SCRIPT)).context("parsing input script")?;

    let transcript = play(&level_json, config, &inputs)?;
    verify(&transcript)?;
    Ok(())
}

/// Play the inputs, checking after every turn that undo would restore
/// the board it started from.
fn play(level_json: &str, config: StepConfig, inputs: &[Input]) -> Result<Transcript> {
    let mut recorder = Recorder::new(level_json, config).context("loading level")?;
    let bounds = recorder.state().level_bounds();
    info!(
        "=== Level {:?}: {} entities, base {}, size {} ===",
        recorder.state().level().name,
        recorder.state().world.registry().len(),
        bounds.base,
        bounds.size
    );

    for input in inputs {
        let before = recorder.state().compute_hash();
        let result = recorder.step(*input);

        if input.is_turn() && result.changed {
            let mut rewound = recorder.state().clone();
            rewound.undo();
            if rewound.compute_hash() != before {
                bail!("undo after {} did not restore the board", input);
            }
        }

        let moved = result.events.iter().filter(|e| matches!(e.data, GameEventData::Moved { .. })).count();
        info!(
            "{} -> changed: {}, events: {}, moved: {}, gravity passes: {}",
            input,
            result.changed,
            result.events.len(),
            moved,
            result.gravity_passes
        );
        if result.won {
            info!("Level solved");
        }
    }

    let (state, transcript) = recorder.finish();
    info!("Final state hash: {}", hex::encode(state.compute_hash()));
    Ok(transcript)
}

/// Round-trip the transcript through both encodings and replay it.
fn verify(transcript: &Transcript) -> Result<()> {
    info!("=== Verifying Determinism ===");
    let bytes = transcript.to_bytes().context("encoding transcript")?;
    info!("Transcript: {} bytes, digest {}", bytes.len(), hex::encode(transcript.digest()));

    let decoded = Transcript::from_bytes(&bytes).context("decoding transcript")?;
    let json = decoded.to_json().context("writing transcript JSON")?;
    let decoded = Transcript::from_json(&json).context("reading transcript JSON")?;

    match decoded.replay() {
        Ok(state) => {
            info!("Replay state hash: {}", hex::encode(state.compute_hash()));
            info!("DETERMINISM VERIFIED: Hashes match!");
            Ok(())
        }
        Err(err) => {
            warn!("DETERMINISM FAILURE: {}", err);
            Err(anyhow::Error::new(err).context("replaying transcript"))
        }
    }
}
