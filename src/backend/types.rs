//! Common types shared between the frame graph and GPU backends

use bitflags::bitflags;
use glam::Vec4;

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextureFormat {
    #[default]
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Rg11B10Float,
    Rg16Float,
    R32Float,
    Rg32Float,
    Depth32Float,
    Depth24PlusStencil8,
}

impl TextureFormat {
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            TextureFormat::Depth32Float | TextureFormat::Depth24PlusStencil8
        )
    }

    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            TextureFormat::Rgba8Unorm
            | TextureFormat::Rgba8UnormSrgb
            | TextureFormat::Bgra8Unorm
            | TextureFormat::Bgra8UnormSrgb
            | TextureFormat::Rg11B10Float
            | TextureFormat::Rg16Float
            | TextureFormat::Depth32Float
            | TextureFormat::Depth24PlusStencil8
            | TextureFormat::R32Float => 4,
            TextureFormat::Rgba16Float | TextureFormat::Rg32Float => 8,
            TextureFormat::Rgba32Float => 16,
        }
    }
}

bitflags! {
    /// Texture usage flags, derived by the frame graph from pass declarations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TextureUsage: u32 {
        const RENDER_TARGET = 1 << 0;
        const DEPTH_STENCIL = 1 << 1;
        const UNORDERED_ACCESS = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const COPY_SRC = 1 << 4;
        const COPY_DST = 1 << 5;
    }
}

bitflags! {
    /// Buffer usage flags, derived by the frame graph from pass declarations.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BufferUsage: u32 {
        const UNORDERED_ACCESS = 1 << 0;
        const SHADER_RESOURCE = 1 << 1;
        const COPY_SRC = 1 << 2;
        const COPY_DST = 1 << 3;
    }
}

/// Residency state of a GPU resource.
///
/// Mirrors the D3D12 resource states the executor transitions between.
/// Resources are created in `Common` and every later change goes through an
/// explicit [`Barrier::Transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceState {
    #[default]
    Common,
    RenderTarget,
    UnorderedAccess,
    DepthWrite,
    DepthRead,
    ShaderResource,
    CopyDest,
    CopySource,
    Present,
}

/// Clear value declared for a texture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    Color(Vec4),
    DepthStencil { depth: f32, stencil: u8 },
}

impl Default for ClearValue {
    fn default() -> Self {
        ClearValue::Color(Vec4::ZERO)
    }
}

/// Handle to a GPU heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeapHandle(u64);

/// Handle to a GPU texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle(u64);

/// Handle to a GPU buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

macro_rules! impl_raw_handle {
    ($($ty:ident),*) => {
        $(
            impl $ty {
                /// Wrap a backend-specific raw value.
                pub fn from_raw(raw: u64) -> Self {
                    Self(raw)
                }

                /// Backend-specific raw value.
                pub fn raw(self) -> u64 {
                    self.0
                }
            }
        )*
    };
}

impl_raw_handle!(HeapHandle, TextureHandle, BufferHandle);

/// Any physical resource the frame graph places in a heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuResource {
    Texture(TextureHandle),
    Buffer(BufferHandle),
}

/// A single GPU synchronization command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Barrier {
    /// State transition of one resource.
    Transition {
        resource: GpuResource,
        before: ResourceState,
        after: ResourceState,
    },
    /// The heap bytes backing `resource` may have been written through another
    /// aliased resource; reinterpret them as `resource`.
    Aliasing { resource: GpuResource },
    /// Orders unordered-access writes against later accesses.
    UnorderedAccess { resource: GpuResource },
}

/// Size and alignment a placed resource needs inside a heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AllocationInfo {
    pub size: u64,
    pub alignment: u64,
}

/// Heap descriptor
#[derive(Debug, Clone)]
pub struct HeapDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub alignment: u64,
}

/// Location of a placed resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub heap: HeapHandle,
    pub offset: u64,
}

/// Texture descriptor
#[derive(Debug, Clone)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub array_size: u16,
    pub mip_levels: u16,
    pub sample_count: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
    /// Optimized clear value, only meaningful for render-target/depth usage.
    pub clear_value: Option<ClearValue>,
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            array_size: 1,
            mip_levels: 1,
            sample_count: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::SHADER_RESOURCE,
            clear_value: None,
        }
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub stride: u32,
    pub usage: BufferUsage,
}

/// Color and depth attachments bound for a pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderTargetBinding {
    pub colors: Vec<TextureHandle>,
    pub depth: Option<TextureHandle>,
    /// The depth attachment is bound read-only.
    pub depth_read_only: bool,
}

impl RenderTargetBinding {
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty() && self.depth.is_none()
    }
}
