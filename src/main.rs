//! # Block World Entry Point
//!
//! Calls into the library's `run()`, which generates a world, optimizes it and
//! optionally saves it.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- - 50000 7 level.json
//! ```

fn main() {
    if let Err(e) = block_world::run() {
        log::error!("{}", e);
        eprintln!("block-world: {}", e);
        std::process::exit(1);
    }
}
