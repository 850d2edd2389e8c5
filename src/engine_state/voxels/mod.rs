//! # Voxel Core
//!
//! This module contains the world model and the two engines that work on it.
//!
//! ## Architecture
//!
//! * **Position**: the even-integer lattice every block sits on
//! * **Block**: block records, the six faces and the 6-bit face masks
//! * **Occlusion index**: position → record, with neighbor bits kept symmetric
//! * **Chunk**: fixed-size regions whose blocks are grouped into render tuples
//! * **World**: the owner of index and partition, and the only way to edit blocks
//! * **Environment**: the incremental, double-buffered render-batch optimizer
//! * **Generator** and **Tasks**: procedural population on the worker pool
//!
//! ## Data Flow
//!
//! 1. The generator or the editor inserts and removes blocks through `World`
//! 2. The index updates the occlusion bits of the block and its neighbors
//! 3. The partition moves every block whose face mask changed to its new tuple
//! 4. The environment periodically harvests tuples of visible chunks into batches
//!
//! Chunks and tuples are derived state; they can be thrown away and rebuilt from the
//! index at any time.

pub mod block;
pub mod chunk;
pub mod environment;
pub mod generator;
pub mod occlusion_index;
pub mod position;
pub mod tasks;
pub mod world;
