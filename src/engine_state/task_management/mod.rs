//! # Task Management System
//!
//! This module provides the worker pool used by the generator's noise phase.
//!
//! ## Architecture Overview
//!
//! - `TaskManager`: central coordinator for task distribution and worker management
//! - `Task`: a unit of work executed on a worker thread
//! - `TaskResult`: the output of a task, applied to the world afterwards
//! - `TaskChannel`: the pair of channels linking the manager to one worker
//!
//! Each worker owns a dedicated channel and tasks are handed out round-robin, skipping
//! workers that already hold `MAX_TASKS_IN_FLIGHT` tasks. Tasks that cannot be placed
//! are queued and dispatched as results come back.
//!
//! ## Task Lifecycle
//! 1. Tasks are created and published via `TaskManager::publish_task()`
//! 2. The manager distributes tasks to worker channels using round-robin
//! 3. Workers process tasks and send back results
//! 4. Results are applied to the world in `process_completed_tasks()` or
//!    `wait_for_completion()`
//!
//! Workers never see the world. That keeps the pool free of locks: the caller holds
//! the single world lock for the whole generation run and results are applied on its
//! thread.
//!
//! ## Example Usage
//! ```ignore
//! let mut task_manager = TaskManager::new(num_workers);
//! task_manager.publish_task(Box::new(ColumnGenerationTask::new(/* ... */)));
//! let placed = task_manager.wait_for_completion(&mut world);
//! ```

pub mod task;

use std::{
    collections::VecDeque,
    sync::mpsc::{channel, Receiver, Sender},
    thread::{self, JoinHandle},
};

use log::{error, info};
use task::{Task, TaskResult};

use super::voxels::world::World;

/// A communication channel between the manager and one worker thread.
///
/// # Fields
/// - `task_sender`: Sends tasks to the worker; dropping it stops the worker
/// - `result_receiver`: Receives task results from the worker
/// - `num_tasks_in_flight`: Tracks number of tasks currently being processed
/// - `worker`: Handle to the worker thread, joined on drop
#[derive(Debug)]
pub struct TaskChannel {
    task_sender: Option<Sender<Box<dyn Task + Send>>>,
    result_receiver: Receiver<Box<dyn TaskResult + Send>>,
    num_tasks_in_flight: usize,
    worker: Option<JoinHandle<()>>,
}

/// Manages a pool of worker threads and coordinates task execution.
///
/// # Fields
/// - `channels`: Set of active worker channels
/// - `queued_tasks`: Tasks waiting for an available worker
/// - `current_channel`: Index for round-robin scheduling
pub struct TaskManager {
    channels: Vec<TaskChannel>,
    queued_tasks: VecDeque<Box<dyn Task + Send>>,
    current_channel: usize,
}

/// Maximum number of tasks that can be in flight per worker channel.
pub const MAX_TASKS_IN_FLIGHT: usize = 8;

impl TaskManager {
    /// Creates a new `TaskManager` with the specified number of worker threads.
    ///
    /// # Arguments
    /// * `num_workers` - Number of worker threads to create, at least one
    pub fn new(num_workers: usize) -> Self {
        let num_workers = num_workers.max(1);
        let mut channels = Vec::with_capacity(num_workers);

        for _ in 0..num_workers {
            let (task_tx, task_rx) = channel::<Box<dyn Task + Send>>();
            let (result_tx, result_rx) = channel::<Box<dyn TaskResult + Send>>();

            let worker = thread::spawn(move || {
                while let Ok(task) = task_rx.recv() {
                    let result = task.process();
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
            });

            channels.push(TaskChannel {
                task_sender: Some(task_tx),
                result_receiver: result_rx,
                num_tasks_in_flight: 0,
                worker: Some(worker),
            });
        }

        info!("Started task manager with {} workers", num_workers);

        TaskManager {
            channels,
            queued_tasks: VecDeque::new(),
            current_channel: 0,
        }
    }

    /// Creates a manager sized to the number of logical cores.
    pub fn with_available_parallelism() -> Self {
        let workers = thread::available_parallelism()
            .map(|count| count.get())
            .unwrap_or(1);
        Self::new(workers)
    }

    pub fn num_workers(&self) -> usize {
        self.channels.len()
    }

    /// Attempts to send a task to a specific worker channel.
    ///
    /// # Returns
    /// - `Ok(())` if the task was handed to the worker
    /// - `Err(task)` if the worker is gone, giving the task back for requeueing
    fn try_send_task(
        &mut self,
        task: Box<dyn Task + Send>,
        channel_idx: usize,
    ) -> Result<(), Box<dyn Task + Send>> {
        let channel = &mut self.channels[channel_idx];
        let Some(sender) = &channel.task_sender else {
            return Err(task);
        };
        match sender.send(task) {
            Ok(()) => {
                channel.num_tasks_in_flight += 1;
                Ok(())
            }
            Err(failed) => Err(failed.0),
        }
    }

    /// Finds the next channel, round-robin from the last used one, that can accept a
    /// task.
    fn find_available_channel(&self) -> Option<usize> {
        let count = self.channels.len();
        (0..count)
            .map(|step| (self.current_channel + step) % count)
            .find(|idx| self.channels[*idx].num_tasks_in_flight < MAX_TASKS_IN_FLIGHT)
    }

    /// Publishes a new task for execution.
    ///
    /// # Returns
    /// - `true` if the task was immediately scheduled on a worker
    /// - `false` if the task was queued because all workers are busy
    pub fn publish_task(&mut self, task: Box<dyn Task + Send>) -> bool {
        match self.find_available_channel() {
            Some(channel_idx) => match self.try_send_task(task, channel_idx) {
                Ok(()) => {
                    self.current_channel = (channel_idx + 1) % self.channels.len();
                    true
                }
                Err(task) => {
                    error!("Worker {} is gone, queueing task", channel_idx);
                    self.queued_tasks.push_back(task);
                    false
                }
            },
            None => {
                self.queued_tasks.push_back(task);
                false
            }
        }
    }

    /// Dispatches queued tasks, oldest first, while workers have room.
    pub fn process_queued_tasks(&mut self) {
        while let Some(channel_idx) = self.find_available_channel() {
            let Some(task) = self.queued_tasks.pop_front() else {
                return;
            };
            match self.try_send_task(task, channel_idx) {
                Ok(()) => self.current_channel = (channel_idx + 1) % self.channels.len(),
                Err(task) => {
                    self.queued_tasks.push_front(task);
                    return;
                }
            }
        }
    }

    /// Applies every result that is already available, without blocking.
    ///
    /// # Returns
    /// The number of blocks placed by the applied results
    pub fn process_completed_tasks(&mut self, world: &mut World) -> usize {
        let mut placed = 0;
        for channel in &mut self.channels {
            while let Ok(result) = channel.result_receiver.try_recv() {
                channel.num_tasks_in_flight -= 1;
                placed += result.handle_result(world);
            }
        }
        self.process_queued_tasks();
        placed
    }

    /// Blocks until every published task has run and its result has been applied.
    ///
    /// # Returns
    /// The number of blocks placed by the applied results
    pub fn wait_for_completion(&mut self, world: &mut World) -> usize {
        let mut placed = 0;
        loop {
            self.process_queued_tasks();
            let mut waited = false;
            for idx in 0..self.channels.len() {
                let channel = &mut self.channels[idx];
                if channel.num_tasks_in_flight == 0 {
                    continue;
                }
                waited = true;
                match channel.result_receiver.recv() {
                    Ok(result) => {
                        channel.num_tasks_in_flight -= 1;
                        placed += result.handle_result(world);
                    }
                    Err(_) => {
                        error!(
                            "Worker {} stopped with {} tasks in flight",
                            idx, channel.num_tasks_in_flight
                        );
                        channel.num_tasks_in_flight = 0;
                    }
                }
            }
            if !waited {
                if !self.queued_tasks.is_empty() {
                    error!(
                        "Dropping {} tasks, no worker accepts them",
                        self.queued_tasks.len()
                    );
                    self.queued_tasks.clear();
                }
                return placed;
            }
        }
    }

    /// Whether any task is queued or running.
    pub fn is_busy(&self) -> bool {
        !self.queued_tasks.is_empty()
            || self
                .channels
                .iter()
                .any(|channel| channel.num_tasks_in_flight > 0)
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        for channel in &mut self.channels {
            channel.task_sender.take();
        }
        for channel in &mut self.channels {
            if let Some(worker) = channel.worker.take() {
                if worker.join().is_err() {
                    error!("A task worker panicked");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;
    use crate::engine_state::voxels::block::texture::TextureId;

    struct PlaceTask(i32);

    struct PlaceResult(i32);

    impl Task for PlaceTask {
        fn process(&self) -> Box<dyn TaskResult + Send> {
            Box::new(PlaceResult(self.0))
        }
    }

    impl TaskResult for PlaceResult {
        fn handle_result(self: Box<Self>, world: &mut World) -> usize {
            let stone = TextureId::new("stone").unwrap();
            world.insert_block(Point3::new(self.0 * 2, 0, 0), stone, [1.0; 4], true);
            1
        }
    }

    #[test]
    fn every_published_task_is_applied() {
        let mut manager = TaskManager::new(3);
        let mut world = World::new();
        for x in 0..100 {
            manager.publish_task(Box::new(PlaceTask(x)));
        }
        assert_eq!(manager.wait_for_completion(&mut world), 100);
        assert_eq!(world.len(), 100);
        assert!(!manager.is_busy());
    }

    #[test]
    fn overflow_is_queued() {
        let mut manager = TaskManager::new(1);
        for x in 0..MAX_TASKS_IN_FLIGHT as i32 {
            assert!(manager.publish_task(Box::new(PlaceTask(x))));
        }
        assert!(!manager.publish_task(Box::new(PlaceTask(-1))));
        assert!(manager.is_busy());

        let mut world = World::new();
        manager.wait_for_completion(&mut world);
        assert_eq!(world.len(), MAX_TASKS_IN_FLIGHT + 1);
    }

    #[test]
    fn polling_drains_results_without_blocking() {
        let mut manager = TaskManager::new(2);
        let mut world = World::new();
        for x in 0..40 {
            manager.publish_task(Box::new(PlaceTask(x)));
        }

        let mut placed = 0;
        while manager.is_busy() {
            placed += manager.process_completed_tasks(&mut world);
            std::thread::yield_now();
        }
        assert_eq!(placed, 40);
        assert_eq!(world.len(), 40);
        assert_eq!(manager.process_completed_tasks(&mut world), 0);
    }
}
