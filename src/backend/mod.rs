//! Backend abstraction layer
//!
//! Provides the traits a GPU backend implements for the frame graph, the types
//! shared with it, and a dummy backend for tests and headless runs.

pub mod dummy;
pub mod traits;
pub mod types;

pub use dummy::{DummyDevice, DummyEncoder, DummyPresenter, EncodedCommand};
pub use traits::*;
pub use types::*;
