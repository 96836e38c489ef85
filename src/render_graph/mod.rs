//! Frame Graph System
//!
//! A declarative system for defining render passes as a directed acyclic graph (DAG).
//! The graph orders and prunes passes, aliases transient resources into shared
//! heaps, and records the barriers each pass needs.

pub mod executor;
pub mod graph;
pub mod heap;
pub mod lifetime;
pub mod pass;
pub mod pool;
pub mod registry;
pub mod resource;
pub mod schedule;
pub mod sort;

pub use executor::*;
pub use graph::*;
pub use heap::{GreedyAliasing, HeapInfo, NoAliasing, PackingStrategy};
pub use lifetime::ResourceLifecycle;
pub use pass::*;
pub use pool::ResourcePool;
pub use registry::{ResourceId, ResourceRegistry, GRAPH_OUTPUT_NAME};
pub use resource::*;
pub use schedule::{BuildStats, CompiledSchedule};
pub use sort::PassOrder;
