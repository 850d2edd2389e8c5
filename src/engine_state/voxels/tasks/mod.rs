//! # Voxel Task System
//!
//! Tasks run by the worker pool on behalf of the world generator.

pub mod column_generation_task;
