//! # Frame Graph
//!
//! Per-frame render graph for explicit graphics APIs with placed resources.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`FrameGraphBuilder`] - Declarative description of passes and the resources they touch
//! - [`FrameGraph`] - Lazy build with dead-pass pruning and heap aliasing, then per-frame execution
//! - [`backend`] - Device, encoder and presenter traits plus a Dummy backend for testing
//!
//! ## Example
//!
//! ```
//! use frame_graph::prelude::*;
//!
//! let mut builder = FrameGraphBuilder::new(FrameGraphConfig::default());
//! let hdr = builder.resource_id("Hdr");
//! builder
//!     .add_texture(TextureDesc::new(hdr, TextureSize::default(), TextureFormat::Rgba16Float))
//!     .add_texture(TextureDesc::new(
//!         ResourceId::GRAPH_OUTPUT,
//!         TextureSize::default(),
//!         TextureFormat::Bgra8Unorm,
//!     ));
//! builder.add_pass(RenderPass::new("scene").write(hdr, OutputKind::RenderTarget));
//! builder.add_pass(
//!     RenderPass::new("tonemap")
//!         .read(hdr, InputKind::ShaderRead)
//!         .write(ResourceId::GRAPH_OUTPUT, OutputKind::RenderTarget),
//! );
//! let mut graph = builder.build().unwrap();
//!
//! let mut device = DummyDevice::new();
//! let mut encoder = DummyEncoder::new();
//! graph
//!     .execute(&mut device, &mut encoder, &RenderMetadata::new(1280, 720))
//!     .unwrap();
//! ```

pub mod backend;
pub mod error;
pub mod render_graph;

pub use backend::{
    BackendError, CommandEncoder, DummyDevice, DummyEncoder, DummyPresenter, GpuDevice, Presenter,
};
pub use error::{FrameGraphError, FrameGraphResult};
pub use render_graph::{
    FrameGraph, FrameGraphBuilder, FrameGraphConfig, PackingMode, RenderContext, RenderPass,
    ResourceId,
};

/// Commonly used types
pub mod prelude {
    pub use crate::backend::*;
    pub use crate::error::{FrameGraphError, FrameGraphResult};
    pub use crate::render_graph::{
        BufferDesc, BufferSize, BuildStats, FrameGraph, FrameGraphBuilder, FrameGraphConfig,
        InitAction, InputKind, OutputKind, PackingMode, RenderContext, RenderMetadata, RenderPass,
        ResourceId, TextureDesc, TextureSize, TokenDesc,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log the library version. Call once after installing a logger.
pub fn init() {
    log::info!("Frame graph v{} initialized", VERSION);
}
