//! Core backend abstraction traits
//!
//! The frame graph never talks to a graphics API directly. Heap and placed
//! resource creation go through [`GpuDevice`], recorded GPU work through
//! [`CommandEncoder`] and presentation through [`Presenter`].

use crate::backend::types::*;
use glam::Vec4;
use thiserror::Error;

/// Backend error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Failed to create heap: {0}")]
    HeapCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to present: {0}")]
    PresentFailed(String),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Resource creation side of a GPU device.
///
/// Placed resources must be created in [`ResourceState::Common`] with every
/// implicit state promotion and automatic barrier disabled: the frame graph
/// executor issues each transition explicitly.
pub trait GpuDevice {
    /// Size and alignment a texture needs inside a heap.
    fn texture_allocation_info(&self, desc: &TextureDescriptor) -> AllocationInfo;

    /// Size and alignment a buffer needs inside a heap.
    fn buffer_allocation_info(&self, desc: &BufferDescriptor) -> AllocationInfo;

    /// Create a heap
    fn create_heap(&mut self, desc: &HeapDescriptor) -> BackendResult<HeapHandle>;

    /// Create a texture at `placement`
    fn create_placed_texture(
        &mut self,
        placement: Placement,
        desc: &TextureDescriptor,
    ) -> BackendResult<TextureHandle>;

    /// Create a buffer at `placement`
    fn create_placed_buffer(
        &mut self,
        placement: Placement,
        desc: &BufferDescriptor,
    ) -> BackendResult<BufferHandle>;

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Destroy a heap. All resources placed in it are destroyed first.
    fn destroy_heap(&mut self, heap: HeapHandle);
}

/// Command recording interface handed to the executor and to pass bodies.
pub trait CommandEncoder {
    /// Submit a batch of barriers as one call.
    fn resource_barriers(&mut self, barriers: &[Barrier]);

    fn clear_render_target(&mut self, texture: TextureHandle, color: Vec4);

    fn clear_depth_stencil(&mut self, texture: TextureHandle, depth: f32, stencil: u8);

    /// Clear a texture through its unordered-access view.
    fn clear_unordered_access_texture(&mut self, texture: TextureHandle, color: Vec4);

    /// Clear a buffer through its unordered-access view.
    fn clear_buffer(&mut self, buffer: BufferHandle, value: u32);

    /// Mark the contents of a resource as undefined.
    fn discard_resource(&mut self, resource: GpuResource);

    fn set_render_targets(&mut self, binding: &RenderTargetBinding);

    fn copy_resource(&mut self, dst: GpuResource, src: GpuResource);

    fn draw(&mut self, vertex_count: u32, instance_count: u32);

    fn dispatch(&mut self, x: u32, y: u32, z: u32);

    /// Open a named debug region (PIX/RenderDoc marker).
    fn begin_event(&mut self, _label: &str) {}

    /// Close the innermost debug region.
    fn end_event(&mut self) {}
}

/// Window/swapchain side: receives the finished frame.
pub trait Presenter {
    fn present(&mut self, texture: TextureHandle) -> BackendResult<()>;
}
