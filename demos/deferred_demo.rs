//! Deferred pipeline on the Dummy backend
//!
//! Builds a small deferred renderer as a frame graph, records a few frames and
//! prints what the build allocated.
//!
//! Run with:
//!   cargo run --example deferred_demo
//!   cargo run --example deferred_demo -- --packing disabled --frames 4
//!   RUST_LOG=trace cargo run --example deferred_demo

use clap::Parser;
use glam::Vec4;

use frame_graph::prelude::*;

/// Heap packing selection for CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
enum CliPacking {
    /// Alias transient resources with disjoint lifetimes.
    #[default]
    Greedy,
    /// One heap per resource.
    Disabled,
}

impl From<CliPacking> for PackingMode {
    fn from(cli: CliPacking) -> Self {
        match cli {
            CliPacking::Greedy => PackingMode::Greedy,
            CliPacking::Disabled => PackingMode::Disabled,
        }
    }
}

/// Deferred frame graph demo.
#[derive(Parser, Debug)]
#[command(name = "deferred_demo", about = "Record a deferred pipeline through the frame graph")]
struct Args {
    /// Screen width in pixels.
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Screen height in pixels.
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Number of frames to record.
    #[arg(long, default_value_t = 3)]
    frames: u64,

    /// Frame at which the window is "resized" to half size.
    #[arg(long)]
    resize_at: Option<u64>,

    /// Heap packing strategy.
    #[arg(long, value_enum, default_value_t = CliPacking::Greedy)]
    packing: CliPacking,
}

fn build_graph(packing: PackingMode) -> FrameGraphResult<FrameGraph> {
    let mut builder = FrameGraphBuilder::new(FrameGraphConfig {
        label: "Deferred".to_string(),
        packing,
        validate_heaps: true,
    });

    let albedo = builder.resource_id("GBuffer.Albedo");
    let normal = builder.resource_id("GBuffer.Normal");
    let depth = builder.resource_id("GBuffer.Depth");
    let ssao = builder.resource_id("Ssao");
    let hdr = builder.resource_id("Hdr");
    let bloom = builder.resource_id("Bloom");
    let particles = builder.resource_id("Particles");
    let particle_layer = builder.resource_id("ParticleLayer");
    let overlay = builder.resource_id("DebugOverlay");
    let uploaded = builder.resource_id("Uploaded");

    let half = TextureSize::Relative {
        width_scale: 0.5,
        height_scale: 0.5,
    };
    builder
        .add_token(TokenDesc::new(uploaded))
        .add_texture(
            TextureDesc::new(albedo, TextureSize::default(), TextureFormat::Rgba8UnormSrgb)
                .with_init_action(InitAction::Discard),
        )
        .add_texture(TextureDesc::new(normal, TextureSize::default(), TextureFormat::Rg16Float))
        .add_texture(TextureDesc::new(depth, TextureSize::default(), TextureFormat::Depth32Float))
        .add_texture(TextureDesc::new(ssao, half.clone(), TextureFormat::R32Float))
        .add_texture(TextureDesc::new(hdr, TextureSize::default(), TextureFormat::Rg11B10Float))
        .add_texture(TextureDesc::new(bloom, half, TextureFormat::Rgba16Float))
        .add_buffer(
            BufferDesc::new(particles, BufferSize::Fixed(64 * 1024 * 32), 32)
                .with_init_action(InitAction::Discard),
        )
        .add_texture(
            TextureDesc::new(particle_layer, TextureSize::default(), TextureFormat::Rgba16Float)
                .with_clear_value(ClearValue::Color(Vec4::new(0.0, 0.0, 0.0, 0.0))),
        )
        .add_texture(TextureDesc::new(overlay, TextureSize::default(), TextureFormat::Rgba8Unorm))
        .add_texture(
            TextureDesc::new(
                ResourceId::GRAPH_OUTPUT,
                TextureSize::default(),
                TextureFormat::Bgra8Unorm,
            )
            .with_init_action(InitAction::Discard),
        );

    builder.add_pass(
        RenderPass::new("upload")
            .write(uploaded, OutputKind::Token)
            .on_init(|_| {
                log::info!("Creating upload staging pipeline");
                Ok(())
            }),
    );
    builder.add_pass(
        RenderPass::new("gbuffer")
            .read(uploaded, InputKind::Token)
            .write(albedo, OutputKind::RenderTarget)
            .write(normal, OutputKind::RenderTarget)
            .write(depth, OutputKind::DepthWrite)
            .on_execute(|_, encoder| encoder.draw(36, 512)),
    );
    builder.add_pass(
        RenderPass::new("ssao")
            .read(depth, InputKind::ShaderRead)
            .read(normal, InputKind::ShaderRead)
            .write(ssao, OutputKind::UnorderedAccess)
            .on_execute(|ctx, encoder| {
                let size = ctx.metadata();
                encoder.dispatch(size.screen_width.div_ceil(16), size.screen_height.div_ceil(16), 1);
            }),
    );
    builder.add_pass(
        RenderPass::new("lighting")
            .read(albedo, InputKind::ShaderRead)
            .read(normal, InputKind::ShaderRead)
            .read(depth, InputKind::ShaderRead)
            .read(ssao, InputKind::ShaderRead)
            .write(hdr, OutputKind::RenderTarget)
            .on_execute(|_, encoder| encoder.draw(3, 1)),
    );
    builder.add_pass(
        RenderPass::new("simulate_particles")
            .write(particles, OutputKind::UnorderedAccess)
            .on_execute(|_, encoder| encoder.dispatch(256, 1, 1)),
    );
    builder.add_pass(
        RenderPass::new("draw_particles")
            .read(particles, InputKind::ShaderRead)
            .write(particle_layer, OutputKind::RenderTarget)
            .on_execute(|_, encoder| encoder.draw(6, 64 * 1024)),
    );
    builder.add_pass(
        RenderPass::new("bloom")
            .read(hdr, InputKind::ShaderRead)
            .write(bloom, OutputKind::RenderTarget)
            .on_execute(|_, encoder| encoder.draw(3, 1)),
    );
    builder.add_pass(
        RenderPass::new("debug_overlay")
            .read(hdr, InputKind::ShaderRead)
            .write(overlay, OutputKind::RenderTarget),
    );
    builder.add_pass(
        RenderPass::new("tonemap")
            .read(hdr, InputKind::ShaderRead)
            .read(bloom, InputKind::ShaderRead)
            .read(particle_layer, InputKind::ShaderRead)
            .write(ResourceId::GRAPH_OUTPUT, OutputKind::RenderTarget)
            .on_execute(|_, encoder| encoder.draw(3, 1)),
    );

    builder.build()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    frame_graph::init();

    let args = Args::parse();
    let mut graph = build_graph(args.packing.into())?;

    let order = graph.pass_order();
    for (index, layer) in order.layers.iter().enumerate() {
        let names: Vec<&str> = layer
            .iter()
            .filter_map(|p| graph.pass(*p).map(RenderPass::name))
            .collect();
        println!("layer {index}: {}", names.join(", "));
    }
    for pruned in &order.pruned {
        if let Some(pass) = graph.pass(*pruned) {
            println!("pruned: {}", pass.name());
        }
    }

    let mut device = DummyDevice::new();
    let mut encoder = DummyEncoder::new();
    let mut presenter = DummyPresenter::new();
    let mut metadata = RenderMetadata::new(args.width, args.height);

    for frame in 0..args.frames {
        if args.resize_at == Some(frame) {
            metadata.screen_width = (metadata.screen_width / 2).max(1);
            metadata.screen_height = (metadata.screen_height / 2).max(1);
            graph.mark_dirty();
        }
        metadata.frame_index = frame;
        metadata.time = frame as f32 / 60.0;

        encoder.clear();
        graph.execute(&mut device, &mut encoder, &metadata)?;
        graph.present(ResourceId::GRAPH_OUTPUT, &mut encoder, &mut presenter)?;

        let stats = graph.stats().copied().unwrap_or_default();
        println!(
            "frame {frame}: {} commands, {} barriers in {} batches | {} heaps, {:.1} MiB ({:.1} MiB saved)",
            encoder.commands().len(),
            encoder.barriers().len(),
            encoder.barrier_batch_count(),
            stats.heaps,
            stats.heap_bytes as f64 / (1024.0 * 1024.0),
            stats.saved_bytes() as f64 / (1024.0 * 1024.0),
        );
    }

    graph.release(&mut device);
    println!(
        "presented {} frames, {} heaps left alive",
        presenter.presented().len(),
        device.live_heap_count()
    );
    Ok(())
}
