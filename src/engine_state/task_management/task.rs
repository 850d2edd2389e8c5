//! # Task System Core Traits
//!
//! This module defines the two halves of a unit of background work:
//! - `Task`: runs on a worker thread and must not touch the world
//! - `TaskResult`: carries the worker's output back and applies it to the world on the
//!   thread that owns the world lock
//!
//! ## Task Lifecycle
//! 1. A `Task` is created and scheduled via `TaskManager::publish_task()`
//! 2. The task's `process()` method is called on a worker thread
//! 3. The task returns a boxed `TaskResult`
//! 4. The result's `handle_result()` is called with mutable access to the world
//!
//! ## Thread Safety
//! - `Task` must be `Send` to be transferred between threads
//! - `TaskResult` must be `Send` to be transferred back
//! - Tasks own all of their input; shared state is limited to atomics such as the
//!   shutdown flag

use crate::engine_state::voxels::world::World;

/// A unit of work that can be executed on a worker thread.
///
/// # Implementation Guidelines
/// - Should be coarse-grained to amortize scheduling overhead
/// - Should own the data it needs instead of borrowing engine state
pub trait Task: Send {
    /// Processes the task and returns a result.
    ///
    /// # Returns
    /// A boxed `TaskResult` that will be applied on the joining thread.
    fn process(&self) -> Box<dyn TaskResult + Send>;
}

/// The output of a `Task`, applied to the world after the worker finished.
pub trait TaskResult: Send {
    /// Applies the result.
    ///
    /// # Arguments
    /// * `world` - The world the result is written into
    ///
    /// # Returns
    /// The number of blocks the result placed
    fn handle_result(self: Box<Self>, world: &mut World) -> usize;
}
