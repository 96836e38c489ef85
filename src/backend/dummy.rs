//! Dummy GPU backend for testing and development.
//!
//! This backend doesn't perform actual GPU operations. [`DummyDevice`] keeps
//! book of every heap and placed resource so tests can check what the frame
//! graph allocated, and [`DummyEncoder`] records every command so tests can
//! check the exact barrier stream.

use std::collections::HashMap;

use glam::Vec4;

use super::traits::{BackendError, BackendResult, CommandEncoder, GpuDevice, Presenter};
use super::types::*;

/// Default placement alignment of a heap resource (64 KiB).
pub const DEFAULT_PLACEMENT_ALIGNMENT: u64 = 64 * 1024;

/// Placement alignment of multisampled textures (4 MiB).
pub const MSAA_PLACEMENT_ALIGNMENT: u64 = 4 * 1024 * 1024;

fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

#[derive(Debug, Clone)]
struct DummyHeap {
    size: u64,
    alignment: u64,
}

/// A texture or buffer placed by the dummy device.
#[derive(Debug, Clone)]
pub struct DummyPlacedResource {
    pub label: Option<String>,
    pub placement: Placement,
    pub size: u64,
}

/// Dummy GPU device.
#[derive(Debug, Default)]
pub struct DummyDevice {
    next_handle: u64,
    heaps: HashMap<HeapHandle, DummyHeap>,
    textures: HashMap<TextureHandle, DummyPlacedResource>,
    buffers: HashMap<BufferHandle, DummyPlacedResource>,
    memory_budget: Option<u64>,
    heaps_created: usize,
}

impl DummyDevice {
    /// Create a new dummy device with unlimited memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a dummy device that fails heap creation with
    /// [`BackendError::OutOfMemory`] once `budget` bytes are in use.
    pub fn with_memory_budget(budget: u64) -> Self {
        Self {
            memory_budget: Some(budget),
            ..Self::default()
        }
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        "Dummy"
    }

    fn allocate_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    /// Number of heaps currently alive.
    pub fn live_heap_count(&self) -> usize {
        self.heaps.len()
    }

    /// Number of heaps created over the device lifetime.
    pub fn heaps_created(&self) -> usize {
        self.heaps_created
    }

    /// Number of textures currently alive.
    pub fn live_texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Number of buffers currently alive.
    pub fn live_buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Bytes held by all live heaps.
    pub fn allocated_bytes(&self) -> u64 {
        self.heaps.values().map(|h| h.size).sum()
    }

    /// Size of a live heap.
    pub fn heap_size(&self, heap: HeapHandle) -> Option<u64> {
        self.heaps.get(&heap).map(|h| h.size)
    }

    /// Alignment of a live heap.
    pub fn heap_alignment(&self, heap: HeapHandle) -> Option<u64> {
        self.heaps.get(&heap).map(|h| h.alignment)
    }

    /// Look up a live texture.
    pub fn texture(&self, texture: TextureHandle) -> Option<&DummyPlacedResource> {
        self.textures.get(&texture)
    }

    /// Look up a live buffer.
    pub fn buffer(&self, buffer: BufferHandle) -> Option<&DummyPlacedResource> {
        self.buffers.get(&buffer)
    }

    /// `creation_failed` builds the error for the kind of resource being placed.
    fn check_placement(
        &self,
        placement: Placement,
        size: u64,
        creation_failed: fn(String) -> BackendError,
    ) -> BackendResult<()> {
        let heap = self
            .heaps
            .get(&placement.heap)
            .ok_or_else(|| creation_failed(format!("unknown heap {:?}", placement.heap)))?;
        if placement.offset % heap.alignment != 0 || placement.offset + size > heap.size {
            return Err(BackendError::OutOfMemory);
        }
        Ok(())
    }
}

impl GpuDevice for DummyDevice {
    fn texture_allocation_info(&self, desc: &TextureDescriptor) -> AllocationInfo {
        let mut texels = 0u64;
        for mip in 0..desc.mip_levels.max(1) as u32 {
            let width = (desc.width >> mip).max(1) as u64;
            let height = (desc.height >> mip).max(1) as u64;
            texels += width * height;
        }
        let bytes = texels
            * desc.format.bytes_per_pixel() as u64
            * desc.array_size.max(1) as u64
            * desc.sample_count.max(1) as u64;
        let alignment = if desc.sample_count > 1 {
            MSAA_PLACEMENT_ALIGNMENT
        } else {
            DEFAULT_PLACEMENT_ALIGNMENT
        };
        AllocationInfo {
            size: align_up(bytes.max(1), alignment),
            alignment,
        }
    }

    fn buffer_allocation_info(&self, desc: &BufferDescriptor) -> AllocationInfo {
        AllocationInfo {
            size: align_up(desc.size.max(1), DEFAULT_PLACEMENT_ALIGNMENT),
            alignment: DEFAULT_PLACEMENT_ALIGNMENT,
        }
    }

    fn create_heap(&mut self, desc: &HeapDescriptor) -> BackendResult<HeapHandle> {
        if let Some(budget) = self.memory_budget {
            if self.allocated_bytes() + desc.size > budget {
                return Err(BackendError::OutOfMemory);
            }
        }
        let handle = HeapHandle::from_raw(self.allocate_handle());
        log::trace!(
            "DummyDevice: creating heap {:?} (size: {}, alignment: {})",
            desc.label,
            desc.size,
            desc.alignment
        );
        self.heaps.insert(
            handle,
            DummyHeap {
                size: desc.size,
                alignment: desc.alignment,
            },
        );
        self.heaps_created += 1;
        Ok(handle)
    }

    fn create_placed_texture(
        &mut self,
        placement: Placement,
        desc: &TextureDescriptor,
    ) -> BackendResult<TextureHandle> {
        let size = self.texture_allocation_info(desc).size;
        self.check_placement(placement, size, BackendError::TextureCreationFailed)?;
        let handle = TextureHandle::from_raw(self.allocate_handle());
        log::trace!(
            "DummyDevice: placing texture {:?} ({}x{}) in {:?}",
            desc.label,
            desc.width,
            desc.height,
            placement.heap
        );
        self.textures.insert(
            handle,
            DummyPlacedResource {
                label: desc.label.clone(),
                placement,
                size,
            },
        );
        Ok(handle)
    }

    fn create_placed_buffer(
        &mut self,
        placement: Placement,
        desc: &BufferDescriptor,
    ) -> BackendResult<BufferHandle> {
        let size = self.buffer_allocation_info(desc).size;
        self.check_placement(placement, size, BackendError::BufferCreationFailed)?;
        let handle = BufferHandle::from_raw(self.allocate_handle());
        log::trace!(
            "DummyDevice: placing buffer {:?} (size: {}) in {:?}",
            desc.label,
            desc.size,
            placement.heap
        );
        self.buffers.insert(
            handle,
            DummyPlacedResource {
                label: desc.label.clone(),
                placement,
                size,
            },
        );
        Ok(handle)
    }

    fn destroy_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(&texture);
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(&buffer);
    }

    fn destroy_heap(&mut self, heap: HeapHandle) {
        self.textures.retain(|_, t| t.placement.heap != heap);
        self.buffers.retain(|_, b| b.placement.heap != heap);
        self.heaps.remove(&heap);
    }
}

/// A command captured by [`DummyEncoder`].
#[derive(Debug, Clone, PartialEq)]
pub enum EncodedCommand {
    Barriers(Vec<Barrier>),
    ClearRenderTarget(TextureHandle, Vec4),
    ClearDepthStencil(TextureHandle, f32, u8),
    ClearUnorderedAccess(TextureHandle, Vec4),
    ClearBuffer(BufferHandle, u32),
    Discard(GpuResource),
    SetRenderTargets(RenderTargetBinding),
    Copy { dst: GpuResource, src: GpuResource },
    Draw { vertex_count: u32, instance_count: u32 },
    Dispatch(u32, u32, u32),
    BeginEvent(String),
    EndEvent,
}

/// Command encoder that records instead of encoding.
#[derive(Debug, Default)]
pub struct DummyEncoder {
    commands: Vec<EncodedCommand>,
}

impl DummyEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded commands, in order.
    pub fn commands(&self) -> &[EncodedCommand] {
        &self.commands
    }

    /// Drop the recorded commands.
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Every barrier recorded, flattened across batches.
    pub fn barriers(&self) -> Vec<Barrier> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                EncodedCommand::Barriers(batch) => Some(batch.iter().copied()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Every transition recorded, as `(resource, before, after)`.
    pub fn transitions(&self) -> Vec<(GpuResource, ResourceState, ResourceState)> {
        self.barriers()
            .into_iter()
            .filter_map(|b| match b {
                Barrier::Transition {
                    resource,
                    before,
                    after,
                } => Some((resource, before, after)),
                _ => None,
            })
            .collect()
    }

    /// Number of barrier batches submitted.
    pub fn barrier_batch_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, EncodedCommand::Barriers(_)))
            .count()
    }

    /// Commands recorded between `BeginEvent(label)` and the matching `EndEvent`.
    pub fn commands_in_event(&self, label: &str) -> Vec<EncodedCommand> {
        let mut inside = false;
        let mut found = Vec::new();
        for command in &self.commands {
            match command {
                EncodedCommand::BeginEvent(name) if name == label => inside = true,
                EncodedCommand::EndEvent if inside => inside = false,
                other if inside => found.push(other.clone()),
                _ => {}
            }
        }
        found
    }
}

impl CommandEncoder for DummyEncoder {
    fn resource_barriers(&mut self, barriers: &[Barrier]) {
        log::trace!("DummyEncoder: {} barriers", barriers.len());
        self.commands.push(EncodedCommand::Barriers(barriers.to_vec()));
    }

    fn clear_render_target(&mut self, texture: TextureHandle, color: Vec4) {
        self.commands
            .push(EncodedCommand::ClearRenderTarget(texture, color));
    }

    fn clear_depth_stencil(&mut self, texture: TextureHandle, depth: f32, stencil: u8) {
        self.commands
            .push(EncodedCommand::ClearDepthStencil(texture, depth, stencil));
    }

    fn clear_unordered_access_texture(&mut self, texture: TextureHandle, color: Vec4) {
        self.commands
            .push(EncodedCommand::ClearUnorderedAccess(texture, color));
    }

    fn clear_buffer(&mut self, buffer: BufferHandle, value: u32) {
        self.commands.push(EncodedCommand::ClearBuffer(buffer, value));
    }

    fn discard_resource(&mut self, resource: GpuResource) {
        self.commands.push(EncodedCommand::Discard(resource));
    }

    fn set_render_targets(&mut self, binding: &RenderTargetBinding) {
        self.commands
            .push(EncodedCommand::SetRenderTargets(binding.clone()));
    }

    fn copy_resource(&mut self, dst: GpuResource, src: GpuResource) {
        self.commands.push(EncodedCommand::Copy { dst, src });
    }

    fn draw(&mut self, vertex_count: u32, instance_count: u32) {
        self.commands.push(EncodedCommand::Draw {
            vertex_count,
            instance_count,
        });
    }

    fn dispatch(&mut self, x: u32, y: u32, z: u32) {
        self.commands.push(EncodedCommand::Dispatch(x, y, z));
    }

    fn begin_event(&mut self, label: &str) {
        self.commands
            .push(EncodedCommand::BeginEvent(label.to_string()));
    }

    fn end_event(&mut self) {
        self.commands.push(EncodedCommand::EndEvent);
    }
}

/// Presenter that remembers what it was handed.
#[derive(Debug, Default)]
pub struct DummyPresenter {
    presented: Vec<TextureHandle>,
}

impl DummyPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn presented(&self) -> &[TextureHandle] {
        &self.presented
    }
}

impl Presenter for DummyPresenter {
    fn present(&mut self, texture: TextureHandle) -> BackendResult<()> {
        self.presented.push(texture);
        Ok(())
    }
}
