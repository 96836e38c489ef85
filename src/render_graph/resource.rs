//! Static resource declarations for the frame graph

use std::collections::HashMap;
use std::sync::Arc;

use crate::backend::types::*;
use crate::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::registry::{ResourceId, ResourceRegistry};

/// Per-frame data every shape expression is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RenderMetadata {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Seconds since start.
    pub time: f32,
    pub frame_index: u64,
}

impl RenderMetadata {
    pub fn new(screen_width: u32, screen_height: u32) -> Self {
        Self {
            screen_width,
            screen_height,
            ..Default::default()
        }
    }
}

/// What happens to a resource's contents on the first pass of its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InitAction {
    /// Clear to the declared clear value.
    #[default]
    Clear,
    /// Contents become undefined; the pass overwrites every texel.
    Discard,
    /// The producing pass copies into the resource itself.
    CopyDestination,
}

/// Describes texture dimensions that can be relative to screen size
#[derive(Clone)]
pub enum TextureSize {
    /// Absolute size in pixels
    Absolute { width: u32, height: u32 },
    /// Relative to screen size (1.0 = full screen)
    Relative { width_scale: f32, height_scale: f32 },
    /// Arbitrary function of the frame metadata
    Custom(Arc<dyn Fn(&RenderMetadata) -> (u32, u32) + Send + Sync>),
}

impl Default for TextureSize {
    fn default() -> Self {
        TextureSize::Relative {
            width_scale: 1.0,
            height_scale: 1.0,
        }
    }
}

impl std::fmt::Debug for TextureSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextureSize::Absolute { width, height } => f
                .debug_struct("Absolute")
                .field("width", width)
                .field("height", height)
                .finish(),
            TextureSize::Relative {
                width_scale,
                height_scale,
            } => f
                .debug_struct("Relative")
                .field("width_scale", width_scale)
                .field("height_scale", height_scale)
                .finish(),
            TextureSize::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl TextureSize {
    pub fn custom(f: impl Fn(&RenderMetadata) -> (u32, u32) + Send + Sync + 'static) -> Self {
        TextureSize::Custom(Arc::new(f))
    }

    /// Evaluate against `metadata`. Never returns a zero dimension.
    pub fn resolve(&self, metadata: &RenderMetadata) -> (u32, u32) {
        let (width, height) = match self {
            TextureSize::Absolute { width, height } => (*width, *height),
            TextureSize::Relative {
                width_scale,
                height_scale,
            } => (
                ((metadata.screen_width as f32) * width_scale) as u32,
                ((metadata.screen_height as f32) * height_scale) as u32,
            ),
            TextureSize::Custom(f) => f(metadata),
        };
        (width.max(1), height.max(1))
    }
}

/// Buffer size, fixed or derived from frame metadata.
#[derive(Clone)]
pub enum BufferSize {
    Fixed(u64),
    Custom(Arc<dyn Fn(&RenderMetadata) -> u64 + Send + Sync>),
}

impl std::fmt::Debug for BufferSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BufferSize::Fixed(size) => f.debug_tuple("Fixed").field(size).finish(),
            BufferSize::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl BufferSize {
    pub fn custom(f: impl Fn(&RenderMetadata) -> u64 + Send + Sync + 'static) -> Self {
        BufferSize::Custom(Arc::new(f))
    }

    pub fn resolve(&self, metadata: &RenderMetadata) -> u64 {
        match self {
            BufferSize::Fixed(size) => *size,
            BufferSize::Custom(f) => f(metadata),
        }
    }
}

/// Texture table entry
#[derive(Debug, Clone)]
pub struct TextureDesc {
    pub id: ResourceId,
    pub size: TextureSize,
    pub format: TextureFormat,
    pub clear_value: ClearValue,
    pub init_action: InitAction,
    pub array_size: u16,
    pub mip_levels: u16,
    pub sample_count: u32,
}

impl TextureDesc {
    /// A single-mip, single-sample texture cleared on first use.
    ///
    /// Depth formats clear to depth 1.0, color formats to transparent black.
    pub fn new(id: ResourceId, size: TextureSize, format: TextureFormat) -> Self {
        let clear_value = if format.is_depth() {
            ClearValue::DepthStencil {
                depth: 1.0,
                stencil: 0,
            }
        } else {
            ClearValue::default()
        };
        Self {
            id,
            size,
            format,
            clear_value,
            init_action: InitAction::Clear,
            array_size: 1,
            mip_levels: 1,
            sample_count: 1,
        }
    }

    pub fn with_clear_value(mut self, clear_value: ClearValue) -> Self {
        self.clear_value = clear_value;
        self
    }

    pub fn with_init_action(mut self, init_action: InitAction) -> Self {
        self.init_action = init_action;
        self
    }

    pub fn with_array_size(mut self, array_size: u16) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u16) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn with_sample_count(mut self, sample_count: u32) -> Self {
        self.sample_count = sample_count;
        self
    }
}

/// Buffer table entry
#[derive(Debug, Clone)]
pub struct BufferDesc {
    pub id: ResourceId,
    pub size: BufferSize,
    pub stride: u32,
    pub init_action: InitAction,
    /// Value written by [`InitAction::Clear`].
    pub clear_value: u32,
}

impl BufferDesc {
    pub fn new(id: ResourceId, size: BufferSize, stride: u32) -> Self {
        Self {
            id,
            size,
            stride,
            init_action: InitAction::Clear,
            clear_value: 0,
        }
    }

    pub fn with_init_action(mut self, init_action: InitAction) -> Self {
        self.init_action = init_action;
        self
    }

    pub fn with_clear_value(mut self, clear_value: u32) -> Self {
        self.clear_value = clear_value;
        self
    }
}

/// Token table entry: a pure ordering edge with no storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenDesc {
    pub id: ResourceId,
}

impl TokenDesc {
    pub fn new(id: ResourceId) -> Self {
        Self { id }
    }
}

/// Resource type enumeration
#[derive(Debug, Clone)]
pub enum ResourceDescription {
    Texture(TextureDesc),
    Buffer(BufferDesc),
    Token(TokenDesc),
}

impl ResourceDescription {
    pub fn id(&self) -> ResourceId {
        match self {
            ResourceDescription::Texture(t) => t.id,
            ResourceDescription::Buffer(b) => b.id,
            ResourceDescription::Token(t) => t.id,
        }
    }

    pub fn is_token(&self) -> bool {
        matches!(self, ResourceDescription::Token(_))
    }

    pub fn init_action(&self) -> Option<InitAction> {
        match self {
            ResourceDescription::Texture(t) => Some(t.init_action),
            ResourceDescription::Buffer(b) => Some(b.init_action),
            ResourceDescription::Token(_) => None,
        }
    }
}

/// The three static declaration tables, merged and keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ResourceTables {
    descriptions: HashMap<ResourceId, ResourceDescription>,
}

impl ResourceTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a declaration. Each id may be declared once across all tables.
    pub fn declare(
        &mut self,
        description: ResourceDescription,
        registry: &ResourceRegistry,
    ) -> FrameGraphResult<()> {
        let id = description.id();
        registry.resource_name(id)?;
        if self.descriptions.contains_key(&id) {
            return Err(FrameGraphError::DuplicateDeclaration {
                resource: registry.display_name(id),
            });
        }
        self.descriptions.insert(id, description);
        Ok(())
    }

    pub fn get(&self, id: ResourceId) -> Option<&ResourceDescription> {
        self.descriptions.get(&id)
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.descriptions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.descriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptions.is_empty()
    }
}
