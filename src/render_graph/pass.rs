//! Render pass definitions for the frame graph

use std::collections::HashSet;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::pool::ResourcePool;
use crate::render_graph::registry::{ResourceId, ResourceRegistry};
use crate::render_graph::resource::*;

/// Unique identifier for a render pass: its declaration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(pub(crate) u32);

impl PassId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// How a pass reads a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// Ordering only, no state change.
    Token,
    /// Sampled or loaded in a shader.
    ShaderRead,
    /// Source of a copy.
    CopySource,
}

impl InputKind {
    /// State the resource must be in while the pass runs.
    pub fn required_state(self) -> Option<ResourceState> {
        match self {
            InputKind::Token => None,
            InputKind::ShaderRead => Some(ResourceState::ShaderResource),
            InputKind::CopySource => Some(ResourceState::CopySource),
        }
    }
}

/// How a pass writes a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    /// Ordering only, no state change.
    Token,
    RenderTarget,
    /// Bound as a read-only depth attachment.
    DepthRead,
    DepthWrite,
    UnorderedAccess,
    CopyDestination,
}

impl OutputKind {
    /// State the resource must be in while the pass runs.
    pub fn required_state(self) -> Option<ResourceState> {
        match self {
            OutputKind::Token => None,
            OutputKind::RenderTarget => Some(ResourceState::RenderTarget),
            OutputKind::DepthRead => Some(ResourceState::DepthRead),
            OutputKind::DepthWrite => Some(ResourceState::DepthWrite),
            OutputKind::UnorderedAccess => Some(ResourceState::UnorderedAccess),
            OutputKind::CopyDestination => Some(ResourceState::CopyDest),
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, OutputKind::DepthRead | OutputKind::DepthWrite)
    }

    /// Bound through the render-target binding.
    pub fn is_attachment(self) -> bool {
        matches!(
            self,
            OutputKind::RenderTarget | OutputKind::DepthRead | OutputKind::DepthWrite
        )
    }
}

/// Resource read declaration for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Input {
    pub id: ResourceId,
    pub kind: InputKind,
}

/// Resource write declaration for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub id: ResourceId,
    pub kind: OutputKind,
}

/// One-time setup hook (pipeline states, root signatures, ...).
pub type InitFn = Box<dyn FnOnce(&mut dyn GpuDevice) -> BackendResult<()> + Send>;

/// Per-frame pass body.
pub type ExecuteFn = Box<dyn FnMut(&RenderContext<'_>, &mut dyn CommandEncoder) + Send>;

/// A node of the frame graph.
///
/// Inputs and outputs are fixed once the pass is handed to the
/// [`FrameGraphBuilder`](crate::render_graph::FrameGraphBuilder).
pub struct RenderPass {
    name: String,
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    bind_render_targets: bool,
    init: Option<InitFn>,
    execute: Option<ExecuteFn>,
}

impl RenderPass {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            bind_render_targets: true,
            init: None,
            execute: None,
        }
    }

    /// Declare that this pass reads from a resource
    pub fn read(mut self, id: ResourceId, kind: InputKind) -> Self {
        self.inputs.push(Input { id, kind });
        self
    }

    /// Declare that this pass writes to a resource
    pub fn write(mut self, id: ResourceId, kind: OutputKind) -> Self {
        self.outputs.push(Output { id, kind });
        self
    }

    pub fn on_init(
        mut self,
        init: impl FnOnce(&mut dyn GpuDevice) -> BackendResult<()> + Send + 'static,
    ) -> Self {
        self.init = Some(Box::new(init));
        self
    }

    pub fn on_execute(
        mut self,
        execute: impl FnMut(&RenderContext<'_>, &mut dyn CommandEncoder) + Send + 'static,
    ) -> Self {
        self.execute = Some(Box::new(execute));
        self
    }

    /// Leave attachment binding to the pass body.
    pub fn without_render_target_binding(mut self) -> Self {
        self.bind_render_targets = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn reads_resource(&self, id: ResourceId) -> bool {
        self.inputs.iter().any(|i| i.id == id)
    }

    pub fn writes_resource(&self, id: ResourceId) -> bool {
        self.outputs.iter().any(|o| o.id == id)
    }

    /// The executor binds this pass's color/depth outputs before its body.
    pub fn owns_render_target_binding(&self) -> bool {
        self.bind_render_targets && self.outputs.iter().any(|o| o.kind.is_attachment())
    }

    /// Construction-time checks that only need this pass and the tables.
    pub(crate) fn validate(
        &self,
        tables: &ResourceTables,
        registry: &ResourceRegistry,
    ) -> FrameGraphResult<()> {
        let pass = || self.name.clone();
        let name = |id| registry.display_name(id);

        let mut seen = HashSet::new();
        for input in &self.inputs {
            if !seen.insert(input.id) {
                return Err(FrameGraphError::DuplicateInput {
                    pass: pass(),
                    resource: name(input.id),
                });
            }
        }

        let mut written = HashSet::new();
        for output in &self.outputs {
            if !written.insert(output.id) {
                return Err(FrameGraphError::DuplicateOutput {
                    pass: pass(),
                    resource: name(output.id),
                });
            }
            if seen.contains(&output.id) {
                return Err(FrameGraphError::ReadWriteOverlap {
                    pass: pass(),
                    resource: name(output.id),
                });
            }
        }

        if self.outputs.iter().filter(|o| o.kind.is_depth()).count() > 1 {
            return Err(FrameGraphError::MultipleDepthOutputs { pass: pass() });
        }

        let invalid = |id, reason: &str| FrameGraphError::InvalidAccess {
            pass: pass(),
            resource: name(id),
            reason: reason.to_string(),
        };

        for input in &self.inputs {
            let description = tables
                .get(input.id)
                .ok_or_else(|| FrameGraphError::UndeclaredResource {
                    pass: pass(),
                    resource: name(input.id),
                })?;
            if description.is_token() && input.kind != InputKind::Token {
                return Err(invalid(input.id, "token resources have no storage to read"));
            }
        }

        for output in &self.outputs {
            let description = tables
                .get(output.id)
                .ok_or_else(|| FrameGraphError::UndeclaredResource {
                    pass: pass(),
                    resource: name(output.id),
                })?;
            match (description, output.kind) {
                (ResourceDescription::Token(_), OutputKind::Token) => {}
                (_, OutputKind::Token) => {
                    return Err(invalid(output.id, "token writes need a token resource"));
                }
                (ResourceDescription::Token(_), _) => {
                    return Err(invalid(output.id, "token resources have no storage to write"));
                }
                (ResourceDescription::Buffer(_), kind) if kind.is_attachment() => {
                    return Err(invalid(output.id, "buffers cannot be bound as attachments"));
                }
                (ResourceDescription::Texture(t), kind) if kind.is_depth() && !t.format.is_depth() => {
                    return Err(invalid(output.id, "depth output needs a depth format"));
                }
                (ResourceDescription::Texture(t), OutputKind::RenderTarget) if t.format.is_depth() => {
                    return Err(invalid(output.id, "render target output needs a color format"));
                }
                _ => {}
            }

            // The single producer is the first write, so it must be able to
            // record the declared clear.
            if description.init_action() == Some(InitAction::Clear) {
                clear_target(description, output.kind)
                    .map_err(|reason| invalid(output.id, reason))?;
            }
        }

        Ok(())
    }

    pub(crate) fn run_init(&mut self, device: &mut dyn GpuDevice) -> FrameGraphResult<()> {
        if let Some(init) = self.init.take() {
            log::debug!("Initializing pass '{}'", self.name);
            init(device).map_err(|source| FrameGraphError::PassInitFailed {
                pass: self.name.clone(),
                source,
            })?;
        }
        Ok(())
    }

    pub(crate) fn run_execute(
        &mut self,
        pool: &ResourcePool,
        metadata: &RenderMetadata,
        render_targets: Option<&RenderTargetBinding>,
        encoder: &mut dyn CommandEncoder,
    ) {
        let Self { name, execute, .. } = self;
        if let Some(execute) = execute.as_mut() {
            let ctx = RenderContext {
                pass_name: name.as_str(),
                pool,
                metadata,
                render_targets,
            };
            execute(&ctx, encoder);
        }
    }
}

/// Check that a resource declared with [`InitAction::Clear`] can be cleared in
/// the state its producer leaves it in.
fn clear_target(description: &ResourceDescription, kind: OutputKind) -> Result<(), &'static str> {
    match (description, kind) {
        (ResourceDescription::Texture(t), OutputKind::RenderTarget | OutputKind::UnorderedAccess) => {
            match t.clear_value {
                ClearValue::Color(_) => Ok(()),
                ClearValue::DepthStencil { .. } => Err("color clear needs a color clear value"),
            }
        }
        (ResourceDescription::Texture(t), OutputKind::DepthWrite) => match t.clear_value {
            ClearValue::DepthStencil { .. } => Ok(()),
            ClearValue::Color(_) => Err("depth clear needs a depth-stencil clear value"),
        },
        (ResourceDescription::Buffer(_), OutputKind::UnorderedAccess) => Ok(()),
        _ => Err("first write cannot clear; declare Discard or CopyDestination instead"),
    }
}

impl std::fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPass")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("bind_render_targets", &self.bind_render_targets)
            .finish_non_exhaustive()
    }
}

/// Context handed to a pass body
pub struct RenderContext<'a> {
    pub(crate) pass_name: &'a str,
    pub(crate) pool: &'a ResourcePool,
    pub(crate) metadata: &'a RenderMetadata,
    pub(crate) render_targets: Option<&'a RenderTargetBinding>,
}

impl<'a> RenderContext<'a> {
    pub fn pass_name(&self) -> &str {
        self.pass_name
    }

    /// Metadata of the frame being executed
    pub fn metadata(&self) -> &RenderMetadata {
        self.metadata
    }

    /// Attachments bound by the executor, if this pass owns a binding
    pub fn render_targets(&self) -> Option<&RenderTargetBinding> {
        self.render_targets
    }

    pub fn resource(&self, id: ResourceId) -> FrameGraphResult<GpuResource> {
        self.pool.resource(id)
    }

    pub fn texture(&self, id: ResourceId) -> FrameGraphResult<TextureHandle> {
        self.pool.texture(id)
    }

    pub fn buffer(&self, id: ResourceId) -> FrameGraphResult<BufferHandle> {
        self.pool.buffer(id)
    }

    pub fn texture_descriptor(&self, id: ResourceId) -> FrameGraphResult<&TextureDescriptor> {
        self.pool.texture_descriptor(id)
    }
}
