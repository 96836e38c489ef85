//! Physical resources of a built frame graph.

use std::collections::BTreeMap;

use crate::backend::traits::GpuDevice;
use crate::backend::types::*;
use crate::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::pass::{InputKind, OutputKind, RenderPass};
use crate::render_graph::registry::{ResourceId, ResourceRegistry};
use crate::render_graph::resource::*;

/// A texture known to the pool.
#[derive(Debug, Clone)]
pub struct PooledTexture {
    pub descriptor: TextureDescriptor,
    pub init_action: InitAction,
    pub clear_value: ClearValue,
    pub handle: Option<TextureHandle>,
}

/// A buffer known to the pool.
#[derive(Debug, Clone)]
pub struct PooledBuffer {
    pub descriptor: BufferDescriptor,
    pub init_action: InitAction,
    pub clear_value: u32,
    pub handle: Option<BufferHandle>,
}

#[derive(Debug, Clone)]
enum PoolEntry {
    Texture(PooledTexture),
    Buffer(PooledBuffer),
}

/// Owns every heap and placed resource of one build.
///
/// Resources are registered from the declaration tables, then created at the
/// placement the heap allocator picked. Lookups fail for ids that were pruned
/// or never registered.
#[derive(Debug, Clone)]
pub struct ResourcePool {
    registry: ResourceRegistry,
    entries: BTreeMap<ResourceId, PoolEntry>,
    heaps: Vec<HeapHandle>,
}

fn texture_usage(id: ResourceId, passes: &[&RenderPass]) -> TextureUsage {
    let mut usage = TextureUsage::empty();
    for pass in passes {
        for input in pass.inputs().iter().filter(|i| i.id == id) {
            usage |= match input.kind {
                InputKind::Token => TextureUsage::empty(),
                InputKind::ShaderRead => TextureUsage::SHADER_RESOURCE,
                InputKind::CopySource => TextureUsage::COPY_SRC,
            };
        }
        for output in pass.outputs().iter().filter(|o| o.id == id) {
            usage |= match output.kind {
                OutputKind::Token => TextureUsage::empty(),
                OutputKind::RenderTarget => TextureUsage::RENDER_TARGET,
                OutputKind::DepthRead | OutputKind::DepthWrite => TextureUsage::DEPTH_STENCIL,
                OutputKind::UnorderedAccess => TextureUsage::UNORDERED_ACCESS,
                OutputKind::CopyDestination => TextureUsage::COPY_DST,
            };
        }
    }
    usage
}

fn buffer_usage(id: ResourceId, passes: &[&RenderPass]) -> BufferUsage {
    let mut usage = BufferUsage::empty();
    for pass in passes {
        for input in pass.inputs().iter().filter(|i| i.id == id) {
            usage |= match input.kind {
                InputKind::Token => BufferUsage::empty(),
                InputKind::ShaderRead => BufferUsage::SHADER_RESOURCE,
                InputKind::CopySource => BufferUsage::COPY_SRC,
            };
        }
        for output in pass.outputs().iter().filter(|o| o.id == id) {
            usage |= match output.kind {
                OutputKind::UnorderedAccess => BufferUsage::UNORDERED_ACCESS,
                OutputKind::CopyDestination => BufferUsage::COPY_DST,
                _ => BufferUsage::empty(),
            };
        }
    }
    usage
}

impl ResourcePool {
    pub fn new(registry: ResourceRegistry) -> Self {
        Self {
            registry,
            entries: BTreeMap::new(),
            heaps: Vec::new(),
        }
    }

    fn not_registered(&self, id: ResourceId) -> FrameGraphError {
        FrameGraphError::ResourceNotRegistered {
            resource: self.registry.display_name(id),
        }
    }

    /// Register a texture used by `passes`, deriving its usage from how they
    /// access it.
    pub fn register_texture(
        &mut self,
        desc: &TextureDesc,
        passes: &[&RenderPass],
        metadata: &RenderMetadata,
    ) -> FrameGraphResult<()> {
        let usage = texture_usage(desc.id, passes);
        if usage.contains(TextureUsage::DEPTH_STENCIL)
            && usage.intersects(TextureUsage::RENDER_TARGET | TextureUsage::UNORDERED_ACCESS)
        {
            return Err(FrameGraphError::ConflictingUsage {
                resource: self.registry.display_name(desc.id),
                usages: format!("{:?}", usage),
            });
        }

        let (width, height) = desc.size.resolve(metadata);
        let clear_value = usage
            .intersects(TextureUsage::RENDER_TARGET | TextureUsage::DEPTH_STENCIL)
            .then_some(desc.clear_value);
        let descriptor = TextureDescriptor {
            label: Some(self.registry.display_name(desc.id)),
            width,
            height,
            array_size: desc.array_size,
            mip_levels: desc.mip_levels,
            sample_count: desc.sample_count,
            format: desc.format,
            usage,
            clear_value,
        };

        self.entries.insert(
            desc.id,
            PoolEntry::Texture(PooledTexture {
                descriptor,
                init_action: desc.init_action,
                clear_value: desc.clear_value,
                handle: None,
            }),
        );
        Ok(())
    }

    /// Register a buffer used by `passes`.
    pub fn register_buffer(
        &mut self,
        desc: &BufferDesc,
        passes: &[&RenderPass],
        metadata: &RenderMetadata,
    ) -> FrameGraphResult<()> {
        let descriptor = BufferDescriptor {
            label: Some(self.registry.display_name(desc.id)),
            size: desc.size.resolve(metadata).max(1),
            stride: desc.stride,
            usage: buffer_usage(desc.id, passes),
        };

        self.entries.insert(
            desc.id,
            PoolEntry::Buffer(PooledBuffer {
                descriptor,
                init_action: desc.init_action,
                clear_value: desc.clear_value,
                handle: None,
            }),
        );
        Ok(())
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn is_registered(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Registered ids in ascending order.
    pub fn registered_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.entries.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Heap requirements of a registered resource as reported by `device`.
    pub fn allocation_info(
        &self,
        id: ResourceId,
        device: &dyn GpuDevice,
    ) -> FrameGraphResult<AllocationInfo> {
        match self.entries.get(&id) {
            Some(PoolEntry::Texture(t)) => Ok(device.texture_allocation_info(&t.descriptor)),
            Some(PoolEntry::Buffer(b)) => Ok(device.buffer_allocation_info(&b.descriptor)),
            None => Err(self.not_registered(id)),
        }
    }

    /// Create a heap that the pool then owns.
    pub fn create_heap(
        &mut self,
        desc: &HeapDescriptor,
        device: &mut dyn GpuDevice,
    ) -> FrameGraphResult<HeapHandle> {
        let heap = device.create_heap(desc)?;
        self.heaps.push(heap);
        Ok(heap)
    }

    /// Instantiate a registered texture at `placement`.
    pub fn create_texture(
        &mut self,
        id: ResourceId,
        placement: Placement,
        device: &mut dyn GpuDevice,
    ) -> FrameGraphResult<TextureHandle> {
        let not_registered = self.not_registered(id);
        match self.entries.get_mut(&id) {
            Some(PoolEntry::Texture(texture)) => {
                let handle = device.create_placed_texture(placement, &texture.descriptor)?;
                texture.handle = Some(handle);
                Ok(handle)
            }
            _ => Err(not_registered),
        }
    }

    /// Instantiate a registered buffer at `placement`.
    pub fn create_buffer(
        &mut self,
        id: ResourceId,
        placement: Placement,
        device: &mut dyn GpuDevice,
    ) -> FrameGraphResult<BufferHandle> {
        let not_registered = self.not_registered(id);
        match self.entries.get_mut(&id) {
            Some(PoolEntry::Buffer(buffer)) => {
                let handle = device.create_placed_buffer(placement, &buffer.descriptor)?;
                buffer.handle = Some(handle);
                Ok(handle)
            }
            _ => Err(not_registered),
        }
    }

    /// Create whichever kind of resource `id` is registered as.
    pub fn create_resource(
        &mut self,
        id: ResourceId,
        placement: Placement,
        device: &mut dyn GpuDevice,
    ) -> FrameGraphResult<GpuResource> {
        match self.entries.get(&id) {
            Some(PoolEntry::Texture(_)) => self
                .create_texture(id, placement, device)
                .map(GpuResource::Texture),
            Some(PoolEntry::Buffer(_)) => self
                .create_buffer(id, placement, device)
                .map(GpuResource::Buffer),
            None => Err(self.not_registered(id)),
        }
    }

    pub fn resource(&self, id: ResourceId) -> FrameGraphResult<GpuResource> {
        match self.entries.get(&id) {
            Some(PoolEntry::Texture(PooledTexture {
                handle: Some(handle),
                ..
            })) => Ok(GpuResource::Texture(*handle)),
            Some(PoolEntry::Buffer(PooledBuffer {
                handle: Some(handle),
                ..
            })) => Ok(GpuResource::Buffer(*handle)),
            _ => Err(self.not_registered(id)),
        }
    }

    pub fn texture(&self, id: ResourceId) -> FrameGraphResult<TextureHandle> {
        self.texture_entry(id)?
            .handle
            .ok_or_else(|| self.not_registered(id))
    }

    pub fn buffer(&self, id: ResourceId) -> FrameGraphResult<BufferHandle> {
        self.buffer_entry(id)?
            .handle
            .ok_or_else(|| self.not_registered(id))
    }

    pub fn texture_descriptor(&self, id: ResourceId) -> FrameGraphResult<&TextureDescriptor> {
        self.texture_entry(id).map(|t| &t.descriptor)
    }

    pub fn buffer_descriptor(&self, id: ResourceId) -> FrameGraphResult<&BufferDescriptor> {
        self.buffer_entry(id).map(|b| &b.descriptor)
    }

    pub fn texture_entry(&self, id: ResourceId) -> FrameGraphResult<&PooledTexture> {
        match self.entries.get(&id) {
            Some(PoolEntry::Texture(texture)) => Ok(texture),
            _ => Err(self.not_registered(id)),
        }
    }

    pub fn buffer_entry(&self, id: ResourceId) -> FrameGraphResult<&PooledBuffer> {
        match self.entries.get(&id) {
            Some(PoolEntry::Buffer(buffer)) => Ok(buffer),
            _ => Err(self.not_registered(id)),
        }
    }

    pub fn heaps(&self) -> &[HeapHandle] {
        &self.heaps
    }

    /// Destroy every created resource, then every heap.
    pub fn release(&mut self, device: &mut dyn GpuDevice) {
        for entry in self.entries.values_mut() {
            match entry {
                PoolEntry::Texture(texture) => {
                    if let Some(handle) = texture.handle.take() {
                        device.destroy_texture(handle);
                    }
                }
                PoolEntry::Buffer(buffer) => {
                    if let Some(handle) = buffer.handle.take() {
                        device.destroy_buffer(handle);
                    }
                }
            }
        }
        for heap in self.heaps.drain(..) {
            device.destroy_heap(heap);
        }
        log::debug!("Released {} pooled resources", self.entries.len());
    }
}
