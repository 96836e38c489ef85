//! Common utilities for frame graph integration tests.
//!
//! Every test runs against the Dummy backend, which records the exact command
//! stream so barriers, clears and bindings can be checked.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use frame_graph::prelude::*;

/// Install a test logger once per process.
#[allow(dead_code)]
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Default test resolution.
#[allow(dead_code)]
pub fn metadata() -> RenderMetadata {
    RenderMetadata::new(256, 256)
}

/// Shared counter a pass closure can bump.
#[derive(Debug, Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

#[allow(dead_code)]
impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Dummy device, encoder and presenter bundled together.
pub struct TestContext {
    pub device: DummyDevice,
    pub encoder: DummyEncoder,
    pub presenter: DummyPresenter,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        init_logger();
        Self {
            device: DummyDevice::new(),
            encoder: DummyEncoder::new(),
            presenter: DummyPresenter::new(),
        }
    }

    pub fn with_memory_budget(budget: u64) -> Self {
        Self {
            device: DummyDevice::with_memory_budget(budget),
            ..Self::new()
        }
    }

    pub fn execute(&mut self, graph: &mut FrameGraph) -> FrameGraphResult<()> {
        self.execute_with(graph, &metadata())
    }

    pub fn execute_with(
        &mut self,
        graph: &mut FrameGraph,
        metadata: &RenderMetadata,
    ) -> FrameGraphResult<()> {
        graph.execute(&mut self.device, &mut self.encoder, metadata)
    }

    pub fn present(&mut self, graph: &mut FrameGraph) -> FrameGraphResult<()> {
        graph.present(
            ResourceId::GRAPH_OUTPUT,
            &mut self.encoder,
            &mut self.presenter,
        )
    }
}

/// Full-screen color texture.
#[allow(dead_code)]
pub fn color_texture(id: ResourceId) -> TextureDesc {
    TextureDesc::new(id, TextureSize::default(), TextureFormat::Rgba8Unorm)
}

/// Physical resource of `id` in the graph's current build.
#[allow(dead_code)]
pub fn resource_of(graph: &FrameGraph, id: ResourceId) -> GpuResource {
    let schedule = graph.schedule().expect("graph is built");
    schedule.pool().resource(id).expect("resource is allocated")
}

/// `A -> X -> B -> Y -> C -> GraphOutput`, plus a pass `D` writing `Z` that
/// nothing reads.
#[allow(dead_code)]
pub struct ChainGraph {
    pub graph: FrameGraph,
    pub x: ResourceId,
    pub y: ResourceId,
    pub z: ResourceId,
    pub runs: [Counter; 4],
    pub inits: [Counter; 4],
}

#[allow(dead_code)]
pub fn chain_graph(config: FrameGraphConfig) -> ChainGraph {
    let mut builder = FrameGraphBuilder::new(config);
    let x = builder.resource_id("X");
    let y = builder.resource_id("Y");
    let z = builder.resource_id("Z");
    builder
        .add_texture(color_texture(ResourceId::GRAPH_OUTPUT))
        .add_texture(color_texture(x))
        .add_texture(color_texture(y))
        .add_texture(color_texture(z));

    let runs: [Counter; 4] = Default::default();
    let inits: [Counter; 4] = Default::default();
    let passes = [
        RenderPass::new("A").write(x, OutputKind::RenderTarget),
        RenderPass::new("B")
            .read(x, InputKind::ShaderRead)
            .write(y, OutputKind::RenderTarget),
        RenderPass::new("C")
            .read(y, InputKind::ShaderRead)
            .write(ResourceId::GRAPH_OUTPUT, OutputKind::RenderTarget),
        RenderPass::new("D").write(z, OutputKind::RenderTarget),
    ];

    for (index, pass) in passes.into_iter().enumerate() {
        let run = runs[index].clone();
        let init = inits[index].clone();
        builder.add_pass(
            pass.on_init(move |_| {
                init.bump();
                Ok(())
            })
            .on_execute(move |_, encoder| {
                run.bump();
                encoder.draw(3, 1);
            }),
        );
    }

    ChainGraph {
        graph: builder.build().expect("chain graph is valid"),
        x,
        y,
        z,
        runs,
        inits,
    }
}
