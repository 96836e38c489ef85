//! Build: turn a static pass order plus frame metadata into an immutable
//! schedule with every physical resource allocated.

use std::collections::HashMap;

use crate::backend::traits::GpuDevice;
use crate::backend::types::*;
use crate::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::heap::*;
use crate::render_graph::lifetime::{analyze_lifetimes, ResourceLifecycle};
use crate::render_graph::pass::{OutputKind, PassId, RenderPass};
use crate::render_graph::pool::ResourcePool;
use crate::render_graph::registry::{ResourceId, ResourceRegistry};
use crate::render_graph::resource::*;
use crate::render_graph::sort::PassOrder;

/// Summary of one build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub live_passes: usize,
    pub pruned_passes: usize,
    pub physical_resources: usize,
    pub heaps: usize,
    /// Bytes of all heaps created.
    pub heap_bytes: u64,
    /// Bytes one dedicated heap per resource would have needed.
    pub unaliased_bytes: u64,
}

impl BuildStats {
    /// Bytes saved by aliasing.
    pub fn saved_bytes(&self) -> u64 {
        self.unaliased_bytes.saturating_sub(self.heap_bytes)
    }
}

/// Everything the executor needs for one metadata configuration.
///
/// Produced by [`CompiledSchedule::build`] and never mutated afterwards
/// except for [`CompiledSchedule::release`]; per-frame state lives in the
/// [`StateTracker`](crate::render_graph::StateTracker).
#[derive(Debug)]
pub struct CompiledSchedule {
    order: Vec<PassId>,
    lifecycles: Vec<ResourceLifecycle>,
    heaps: Vec<HeapInfo>,
    pool: ResourcePool,
    bindings: HashMap<PassId, RenderTargetBinding>,
    metadata: RenderMetadata,
    stats: BuildStats,
}

/// Inputs of a build, borrowed from the graph.
pub struct BuildContext<'a> {
    pub label: &'a str,
    pub passes: &'a [RenderPass],
    pub order: &'a PassOrder,
    pub tables: &'a ResourceTables,
    pub registry: &'a ResourceRegistry,
    pub packing: &'a dyn PackingStrategy,
    pub validate_heaps: bool,
}

impl CompiledSchedule {
    /// Build the schedule for `metadata`.
    ///
    /// On failure every heap and resource created so far is destroyed again.
    pub fn build(
        ctx: &BuildContext<'_>,
        metadata: &RenderMetadata,
        device: &mut dyn GpuDevice,
    ) -> FrameGraphResult<Self> {
        let order = ctx.order.live.clone();
        if order.is_empty() {
            log::warn!(
                "Frame graph '{}' has no live passes: nothing writes GraphOutput",
                ctx.label
            );
        }

        let lifecycles = analyze_lifetimes(ctx.passes, &order, ctx.registry)?;
        let mut schedule = Self {
            order,
            lifecycles,
            heaps: Vec::new(),
            pool: ResourcePool::new(ctx.registry.clone()),
            bindings: HashMap::new(),
            metadata: *metadata,
            stats: BuildStats::default(),
        };

        if let Err(err) = schedule.allocate(ctx, device) {
            schedule.release(device);
            return Err(err);
        }

        log::info!(
            "Built frame graph '{}' for {}x{}: {} passes ({} pruned), {} resources in {} heaps, {} bytes ({} saved by aliasing)",
            ctx.label,
            metadata.screen_width,
            metadata.screen_height,
            schedule.stats.live_passes,
            schedule.stats.pruned_passes,
            schedule.stats.physical_resources,
            schedule.stats.heaps,
            schedule.stats.heap_bytes,
            schedule.stats.saved_bytes()
        );
        Ok(schedule)
    }

    fn allocate(&mut self, ctx: &BuildContext<'_>, device: &mut dyn GpuDevice) -> FrameGraphResult<()> {
        let live: Vec<&RenderPass> = self.order.iter().map(|p| &ctx.passes[p.index()]).collect();

        for lifecycle in &self.lifecycles {
            match ctx.tables.get(lifecycle.id) {
                Some(ResourceDescription::Texture(desc)) => {
                    self.pool.register_texture(desc, &live, &self.metadata)?
                }
                Some(ResourceDescription::Buffer(desc)) => {
                    self.pool.register_buffer(desc, &live, &self.metadata)?
                }
                Some(ResourceDescription::Token(_)) => {}
                None => {
                    let pass = live
                        .iter()
                        .find(|p| p.reads_resource(lifecycle.id) || p.writes_resource(lifecycle.id))
                        .map(|p| p.name().to_string())
                        .unwrap_or_default();
                    return Err(FrameGraphError::UndeclaredResource {
                        pass,
                        resource: ctx.registry.display_name(lifecycle.id),
                    });
                }
            }
        }

        let mut requests = Vec::with_capacity(self.pool.len());
        for lifecycle in self.lifecycles.iter().filter(|l| self.pool.is_registered(l.id)) {
            requests.push(AllocationRequest {
                lifecycle: *lifecycle,
                info: self.pool.allocation_info(lifecycle.id, device)?,
            });
        }

        self.heaps = ctx.packing.pack(&requests);
        if ctx.validate_heaps {
            if let Some((first, second)) = find_aliasing_overlap(&self.heaps) {
                return Err(FrameGraphError::AliasingOverlap {
                    first: ctx.registry.display_name(first),
                    second: ctx.registry.display_name(second),
                });
            }
        }

        for (index, heap) in self.heaps.iter_mut().enumerate() {
            let handle = self.pool.create_heap(
                &HeapDescriptor {
                    label: Some(format!("{} heap {}", ctx.label, index)),
                    size: heap.size,
                    alignment: heap.alignment,
                },
                device,
            )?;
            heap.heap = Some(handle);

            let members: Vec<String> = heap
                .lifecycles
                .iter()
                .map(|l| {
                    format!(
                        "{} [{}, {}]",
                        ctx.registry.display_name(l.id),
                        l.begin,
                        l.end
                    )
                })
                .collect();
            log::debug!(
                "Heap {} ({} bytes, alignment {}): {}",
                index,
                heap.size,
                heap.alignment,
                members.join(", ")
            );

            for lifecycle in &heap.lifecycles {
                self.pool.create_resource(
                    lifecycle.id,
                    Placement {
                        heap: handle,
                        offset: 0,
                    },
                    device,
                )?;
            }
        }

        for (&handle, pass) in self.order.iter().zip(&live) {
            if pass.owns_render_target_binding() {
                let binding = Self::render_target_binding(pass, &self.pool)?;
                self.bindings.insert(handle, binding);
            }
        }

        self.stats = BuildStats {
            live_passes: self.order.len(),
            pruned_passes: ctx.order.pruned.len(),
            physical_resources: requests.len(),
            heaps: self.heaps.len(),
            heap_bytes: self.heaps.iter().map(|h| h.size).sum(),
            unaliased_bytes: requests.iter().map(|r| r.info.size).sum(),
        };
        Ok(())
    }

    fn render_target_binding(
        pass: &RenderPass,
        pool: &ResourcePool,
    ) -> FrameGraphResult<RenderTargetBinding> {
        let mut binding = RenderTargetBinding::default();
        for output in pass.outputs() {
            match output.kind {
                OutputKind::RenderTarget => binding.colors.push(pool.texture(output.id)?),
                OutputKind::DepthWrite | OutputKind::DepthRead => {
                    binding.depth = Some(pool.texture(output.id)?);
                    binding.depth_read_only = output.kind == OutputKind::DepthRead;
                }
                _ => {}
            }
        }
        Ok(binding)
    }

    /// Live passes in execution order.
    pub fn order(&self) -> &[PassId] {
        &self.order
    }

    /// Lifecycles of every referenced resource, sorted by id.
    pub fn lifecycles(&self) -> &[ResourceLifecycle] {
        &self.lifecycles
    }

    pub fn lifecycle(&self, id: ResourceId) -> Option<&ResourceLifecycle> {
        self.lifecycles
            .binary_search_by_key(&id, |l| l.id)
            .ok()
            .map(|index| &self.lifecycles[index])
    }

    /// Whether `id` is first touched by the pass at `pass_index`.
    pub fn begins_at(&self, id: ResourceId, pass_index: usize) -> bool {
        self.lifecycle(id).is_some_and(|l| l.begin == pass_index)
    }

    pub fn heaps(&self) -> &[HeapInfo] {
        &self.heaps
    }

    /// Heap a physical resource lives in.
    pub fn heap_of(&self, id: ResourceId) -> Option<&HeapInfo> {
        self.heaps.iter().find(|h| h.contains(id))
    }

    pub fn pool(&self) -> &ResourcePool {
        &self.pool
    }

    pub fn render_targets(&self, pass: PassId) -> Option<&RenderTargetBinding> {
        self.bindings.get(&pass)
    }

    /// Metadata the schedule was built against.
    pub fn metadata(&self) -> &RenderMetadata {
        &self.metadata
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Destroy every physical resource and heap of this build.
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        self.pool.release(device);
        for heap in &mut self.heaps {
            heap.heap = None;
        }
    }
}
