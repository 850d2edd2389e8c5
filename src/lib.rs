#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::invalid_rust_codeblocks)]

//! # Block World
//!
//! A voxel-world core: a lattice of axis-aligned blocks that is procedurally populated,
//! spatially indexed for O(1) occlusion queries and continuously re-batched into
//! render-ready groups while a background generator may be writing to it.
//!
//! ## Key Modules
//!
//! * `core` - Shared-ownership primitives used throughout the engine
//! * `engine_state` - The world, the optimizer, the generator, persistence and the
//!   coordinating `EngineState`
//!
//! ## Usage
//!
//! ```no_run
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     block_world::run()
//! }
//! ```
//!
//! The binary takes optional positional arguments:
//! `block-world [config.json|-] [blocks] [seed] [save-path]`.

use std::{
    env,
    error::Error,
    thread,
    time::{Duration, Instant},
};

use log::info;

use engine_state::{config::EngineConfig, EngineState, TickOutcome};

pub mod core;
pub mod engine_state;

const DEFAULT_BLOCKS: usize = 20_000;

/// Command line settings of the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct RunArgs {
    pub config_path: Option<String>,
    pub blocks: usize,
    pub seed: u64,
    pub save_path: Option<String>,
}

impl RunArgs {
    /// Parses `[config.json|-] [blocks] [seed] [save-path]`.
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Self, String> {
        let mut args = args.into_iter();
        let config_path = args.next().filter(|path| path != "-");
        let blocks = match args.next() {
            Some(value) => value
                .parse()
                .map_err(|_| format!("Invalid block count: {}", value))?,
            None => DEFAULT_BLOCKS,
        };
        let seed = match args.next() {
            Some(value) => value.parse().map_err(|_| format!("Invalid seed: {}", value))?,
            None => 0,
        };
        Ok(RunArgs {
            config_path,
            blocks,
            seed,
            save_path: args.next(),
        })
    }
}

/// Generates a world, runs the optimizer until a full sweep after generation is
/// published, then optionally saves the level.
pub fn run() -> Result<(), Box<dyn Error>> {
    let mut log_builder = env_logger::Builder::new();
    log_builder
        .target(env_logger::Target::Stdout)
        .parse_env("RUST_LOG")
        .init();
    info!("Logger initialized");

    let args = RunArgs::parse(env::args().skip(1))?;
    let config = match &args.config_path {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    let tick = Duration::from_secs_f64(1.0 / config.tick_rate_hz);

    let mut engine = EngineState::new(config);
    engine.start_generation(args.blocks, args.seed);

    let started = Instant::now();
    let mut generated = false;
    let mut ticks = 0u64;
    loop {
        let frame_start = Instant::now();

        if let Some(result) = engine.poll_generation() {
            let report = result?;
            info!(
                "Generation finished in {:.2?}: {:?}",
                started.elapsed(),
                report
            );
            generated = true;
        } else if !engine.is_generating() && !generated {
            // The generation thread died without a result.
            return Err("generation did not complete".into());
        }

        let outcome = engine.update();
        ticks += 1;
        if generated && outcome == TickOutcome::SweepCompleted {
            break;
        }
        if !generated && ticks % 60 == 0 {
            info!("Generation progress: {} blocks", engine.generation_progress());
        }

        if let Some(remaining) = tick.checked_sub(frame_start.elapsed()) {
            thread::sleep(remaining);
        }
    }

    {
        let environment = engine.environment.get();
        info!(
            "Optimizer published sweep {}: {} tuples holding {} blocks after {} ticks",
            environment.generation(),
            environment.optimized_tuples().len(),
            environment.optimized_block_count(),
            ticks
        );
    }

    if let Some(path) = &args.save_path {
        engine.save_level(path)?;
    }
    engine.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Result<RunArgs, String> {
        RunArgs::parse(values.iter().map(|value| value.to_string()))
    }

    #[test]
    fn defaults_apply_to_missing_arguments() {
        let parsed = args(&[]).unwrap();
        assert_eq!(parsed.config_path, None);
        assert_eq!(parsed.blocks, DEFAULT_BLOCKS);
        assert_eq!(parsed.seed, 0);
        assert_eq!(parsed.save_path, None);
    }

    #[test]
    fn positional_arguments_are_read_in_order() {
        let parsed = args(&["-", "500", "9", "out.json"]).unwrap();
        assert_eq!(parsed.config_path, None);
        assert_eq!(parsed.blocks, 500);
        assert_eq!(parsed.seed, 9);
        assert_eq!(parsed.save_path.as_deref(), Some("out.json"));
    }

    #[test]
    fn bad_numbers_are_reported() {
        assert!(args(&["cfg.json", "lots"]).is_err());
        assert!(args(&["cfg.json", "10", "-3"]).is_err());
    }
}
