//! # Core Module
//!
//! Concurrency primitives shared by the rest of the engine.
//!
//! ## Key Components
//! - `MtResource`: Thread-safe reference-counted resource with read-write locking. It is
//!   the single coarse lock guarding the world during generation, loading and saving.

pub mod mt_resource;

pub use mt_resource::MtResource;
