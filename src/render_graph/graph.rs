//! Frame graph definition, lazy build and per-frame execution

use crate::backend::traits::*;
use crate::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::executor::{execute_schedule, present_resource, StateTracker};
use crate::render_graph::heap::{GreedyAliasing, NoAliasing, PackingStrategy};
use crate::render_graph::pass::{PassId, RenderPass};
use crate::render_graph::registry::{ResourceId, ResourceRegistry};
use crate::render_graph::resource::*;
use crate::render_graph::schedule::{BuildContext, BuildStats, CompiledSchedule};
use crate::render_graph::sort::PassOrder;

/// How transient resources are packed into heaps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PackingMode {
    /// Alias resources with disjoint lifetimes into shared heaps
    #[default]
    Greedy,
    /// One heap per resource
    Disabled,
}

impl PackingMode {
    fn strategy(self) -> Box<dyn PackingStrategy> {
        match self {
            PackingMode::Greedy => Box::new(GreedyAliasing),
            PackingMode::Disabled => Box::new(NoAliasing),
        }
    }
}

/// Configuration for a frame graph
#[derive(Debug, Clone)]
pub struct FrameGraphConfig {
    /// Used in logs and heap labels
    pub label: String,
    pub packing: PackingMode,
    /// Re-check after packing that no heap holds overlapping lifetimes
    pub validate_heaps: bool,
}

impl Default for FrameGraphConfig {
    fn default() -> Self {
        Self {
            label: "FrameGraph".to_string(),
            packing: PackingMode::Greedy,
            validate_heaps: cfg!(debug_assertions),
        }
    }
}

/// Collects the static description of a frame graph.
pub struct FrameGraphBuilder {
    config: FrameGraphConfig,
    registry: ResourceRegistry,
    declarations: Vec<ResourceDescription>,
    passes: Vec<RenderPass>,
}

impl FrameGraphBuilder {
    pub fn new(config: FrameGraphConfig) -> Self {
        Self {
            config,
            registry: ResourceRegistry::new(),
            declarations: Vec::new(),
            passes: Vec::new(),
        }
    }

    /// Intern a resource name
    pub fn resource_id(&mut self, name: &str) -> ResourceId {
        self.registry.resource_id(name)
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    /// Add a texture table entry
    pub fn add_texture(&mut self, desc: TextureDesc) -> &mut Self {
        self.declarations.push(ResourceDescription::Texture(desc));
        self
    }

    /// Add a buffer table entry
    pub fn add_buffer(&mut self, desc: BufferDesc) -> &mut Self {
        self.declarations.push(ResourceDescription::Buffer(desc));
        self
    }

    /// Add a token table entry
    pub fn add_token(&mut self, desc: TokenDesc) -> &mut Self {
        self.declarations.push(ResourceDescription::Token(desc));
        self
    }

    /// Add a render pass. Passes keep their declaration order within a layer.
    pub fn add_pass(&mut self, pass: RenderPass) -> PassId {
        let id = PassId(self.passes.len() as u32);
        self.passes.push(pass);
        id
    }

    /// Validate the description and compute the static pass order.
    pub fn build(self) -> FrameGraphResult<FrameGraph> {
        let mut tables = ResourceTables::new();
        for description in self.declarations {
            tables.declare(description, &self.registry)?;
        }
        for pass in &self.passes {
            pass.validate(&tables, &self.registry)?;
        }
        let order = PassOrder::compile(&self.passes, &self.registry)?;

        log::debug!(
            "Frame graph '{}': {} passes, {} declared resources, {} layers",
            self.config.label,
            self.passes.len(),
            tables.len(),
            order.layers.len()
        );

        Ok(FrameGraph {
            packing: self.config.packing.strategy(),
            config: self.config,
            registry: self.registry,
            tables,
            passes: self.passes,
            order,
            initialized: false,
            dirty: false,
            schedule: None,
            tracker: StateTracker::new(),
        })
    }
}

/// A validated frame graph.
///
/// Pass order and pruning are fixed at construction. Physical resources are
/// built lazily on the first [`FrameGraph::execute`] and rebuilt after
/// [`FrameGraph::mark_dirty`].
pub struct FrameGraph {
    config: FrameGraphConfig,
    packing: Box<dyn PackingStrategy>,
    registry: ResourceRegistry,
    tables: ResourceTables,
    passes: Vec<RenderPass>,
    order: PassOrder,
    initialized: bool,
    dirty: bool,
    schedule: Option<CompiledSchedule>,
    tracker: StateTracker,
}

impl FrameGraph {
    pub fn config(&self) -> &FrameGraphConfig {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn passes(&self) -> &[RenderPass] {
        &self.passes
    }

    pub fn pass(&self, id: PassId) -> Option<&RenderPass> {
        self.passes.get(id.index())
    }

    /// Static pass layers, live order and pruned passes.
    pub fn pass_order(&self) -> &PassOrder {
        &self.order
    }

    /// The current build, if any.
    pub fn schedule(&self) -> Option<&CompiledSchedule> {
        self.schedule.as_ref()
    }

    pub fn stats(&self) -> Option<&BuildStats> {
        self.schedule.as_ref().map(CompiledSchedule::stats)
    }

    /// The next [`FrameGraph::execute`] will build.
    pub fn is_dirty(&self) -> bool {
        self.dirty || self.schedule.is_none()
    }

    /// Force the next [`FrameGraph::execute`] to rebuild, e.g. after a resize.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Run every live pass's init hook once, in declaration order.
    fn initialize(&mut self, device: &mut dyn GpuDevice) -> FrameGraphResult<()> {
        for (index, pass) in self.passes.iter_mut().enumerate() {
            if self.order.is_live(PassId(index as u32)) {
                pass.run_init(device)?;
            }
        }
        self.initialized = true;
        Ok(())
    }

    /// Build the schedule now unless a current one exists.
    pub fn build(
        &mut self,
        device: &mut dyn GpuDevice,
        metadata: &RenderMetadata,
    ) -> FrameGraphResult<&CompiledSchedule> {
        if !self.initialized {
            self.initialize(device)?;
        }
        let schedule = match self.schedule.take() {
            Some(current) if !self.dirty => current,
            stale => {
                if let Some(mut stale) = stale {
                    log::debug!("Rebuilding frame graph '{}'", self.config.label);
                    stale.release(device);
                }
                let ctx = BuildContext {
                    label: &self.config.label,
                    passes: &self.passes,
                    order: &self.order,
                    tables: &self.tables,
                    registry: &self.registry,
                    packing: self.packing.as_ref(),
                    validate_heaps: self.config.validate_heaps,
                };
                let schedule = CompiledSchedule::build(&ctx, metadata, device)?;
                self.tracker.reset();
                self.dirty = false;
                schedule
            }
        };
        Ok(&*self.schedule.insert(schedule))
    }

    /// Record one frame.
    pub fn execute(
        &mut self,
        device: &mut dyn GpuDevice,
        encoder: &mut dyn CommandEncoder,
        metadata: &RenderMetadata,
    ) -> FrameGraphResult<()> {
        self.build(device, metadata)?;
        match self.schedule.as_ref() {
            Some(schedule) => {
                execute_schedule(schedule, &mut self.passes, &mut self.tracker, metadata, encoder)
            }
            None => Ok(()),
        }
    }

    /// Transition `id` to the present state and hand it to `presenter`.
    pub fn present(
        &mut self,
        id: ResourceId,
        encoder: &mut dyn CommandEncoder,
        presenter: &mut dyn Presenter,
    ) -> FrameGraphResult<()> {
        let schedule =
            self.schedule
                .as_ref()
                .ok_or_else(|| FrameGraphError::ResourceNotRegistered {
                    resource: self.registry.display_name(id),
                })?;
        present_resource(schedule, &mut self.tracker, id, encoder, presenter)
    }

    /// Destroy every physical resource. The next execute rebuilds.
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        if let Some(mut schedule) = self.schedule.take() {
            schedule.release(device);
        }
        self.tracker.reset();
    }
}

impl std::fmt::Debug for FrameGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameGraph")
            .field("config", &self.config)
            .field("passes", &self.passes)
            .field("order", &self.order)
            .field("built", &self.schedule.is_some())
            .finish_non_exhaustive()
    }
}
