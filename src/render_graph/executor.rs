//! Render graph execution
//!
//! Walks a [`CompiledSchedule`] once per frame, gathering each pass's barriers
//! into one batch, applying init actions on first use, binding render targets
//! and finally running the pass body.

use std::collections::HashMap;

use crate::backend::traits::*;
use crate::backend::types::*;
use crate::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::pass::{OutputKind, RenderPass};
use crate::render_graph::registry::ResourceId;
use crate::render_graph::resource::{InitAction, RenderMetadata};
use crate::render_graph::pool::ResourcePool;
use crate::render_graph::schedule::CompiledSchedule;

/// Current state of every physical resource.
///
/// Reset to [`ResourceState::Common`] whenever a new schedule is built and
/// carried across frames otherwise.
#[derive(Debug, Default)]
pub struct StateTracker {
    states: HashMap<GpuResource, ResourceState>,
}

impl StateTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every tracked state; everything reads as `Common` again.
    pub fn reset(&mut self) {
        self.states.clear();
    }

    pub fn state(&self, resource: GpuResource) -> ResourceState {
        self.states.get(&resource).copied().unwrap_or_default()
    }

    /// Record a transition to `after`, pushing a barrier unless the resource
    /// is already there.
    pub fn transition(
        &mut self,
        resource: GpuResource,
        after: ResourceState,
        barriers: &mut Vec<Barrier>,
    ) {
        let before = self.state(resource);
        if before == after {
            return;
        }
        barriers.push(Barrier::Transition {
            resource,
            before,
            after,
        });
        self.states.insert(resource, after);
    }
}

/// Record the init action of `id` on the first pass of its lifetime.
///
/// Construction rejects `Clear` on writes that cannot record it.
fn apply_init_action(
    schedule: &CompiledSchedule,
    pass: &str,
    id: ResourceId,
    kind: OutputKind,
    encoder: &mut dyn CommandEncoder,
) -> FrameGraphResult<()> {
    let pool = schedule.pool();
    let resource = pool.resource(id)?;
    let action = match resource {
        GpuResource::Texture(_) => pool.texture_entry(id)?.init_action,
        GpuResource::Buffer(_) => pool.buffer_entry(id)?.init_action,
    };

    match action {
        InitAction::Clear => match resource {
            GpuResource::Texture(texture) => match (kind, pool.texture_entry(id)?.clear_value) {
                (OutputKind::RenderTarget, ClearValue::Color(color)) => {
                    encoder.clear_render_target(texture, color)
                }
                (OutputKind::UnorderedAccess, ClearValue::Color(color)) => {
                    encoder.clear_unordered_access_texture(texture, color)
                }
                (OutputKind::DepthWrite, ClearValue::DepthStencil { depth, stencil }) => {
                    encoder.clear_depth_stencil(texture, depth, stencil)
                }
                _ => return Err(unclearable(pool, pass, id, kind)),
            },
            GpuResource::Buffer(buffer) if kind == OutputKind::UnorderedAccess => {
                encoder.clear_buffer(buffer, pool.buffer_entry(id)?.clear_value)
            }
            GpuResource::Buffer(_) => return Err(unclearable(pool, pass, id, kind)),
        },
        InitAction::Discard => encoder.discard_resource(resource),
        InitAction::CopyDestination => {}
    }
    Ok(())
}

fn unclearable(pool: &ResourcePool, pass: &str, id: ResourceId, kind: OutputKind) -> FrameGraphError {
    FrameGraphError::InvalidAccess {
        pass: pass.to_string(),
        resource: pool.registry().display_name(id),
        reason: format!("cannot clear on a {kind:?} write"),
    }
}

/// Record one frame of `schedule` into `encoder`.
pub fn execute_schedule(
    schedule: &CompiledSchedule,
    passes: &mut [RenderPass],
    tracker: &mut StateTracker,
    metadata: &RenderMetadata,
    encoder: &mut dyn CommandEncoder,
) -> FrameGraphResult<()> {
    let pool = schedule.pool();
    let mut barriers = Vec::new();

    for (index, &handle) in schedule.order().iter().enumerate() {
        let pass = &passes[handle.index()];
        encoder.begin_event(pass.name());

        for input in pass.inputs() {
            if let Some(state) = input.kind.required_state() {
                tracker.transition(pool.resource(input.id)?, state, &mut barriers);
            }
        }

        // Whatever was aliased into the same heap before is gone now.
        for output in pass.outputs() {
            if pool.is_registered(output.id) && schedule.begins_at(output.id, index) {
                barriers.push(Barrier::Aliasing {
                    resource: pool.resource(output.id)?,
                });
            }
        }

        for output in pass.outputs() {
            if let Some(state) = output.kind.required_state() {
                let resource = pool.resource(output.id)?;
                tracker.transition(resource, state, &mut barriers);
                if output.kind == OutputKind::UnorderedAccess {
                    barriers.push(Barrier::UnorderedAccess { resource });
                }
            }
        }

        if !barriers.is_empty() {
            log::trace!("Pass '{}': {} barriers", pass.name(), barriers.len());
            encoder.resource_barriers(&barriers);
            barriers.clear();
        }

        for output in pass.outputs() {
            if output.kind != OutputKind::Token
                && pool.is_registered(output.id)
                && schedule.begins_at(output.id, index)
            {
                apply_init_action(schedule, pass.name(), output.id, output.kind, encoder)?;
            }
        }

        let render_targets = schedule.render_targets(handle);
        if let Some(binding) = render_targets {
            encoder.set_render_targets(binding);
        }

        passes[handle.index()].run_execute(pool, metadata, render_targets, encoder);
        encoder.end_event();
    }

    Ok(())
}

/// Transition `id` to the present state and hand it to `presenter`.
pub fn present_resource(
    schedule: &CompiledSchedule,
    tracker: &mut StateTracker,
    id: ResourceId,
    encoder: &mut dyn CommandEncoder,
    presenter: &mut dyn Presenter,
) -> FrameGraphResult<()> {
    let texture = schedule.pool().texture(id)?;
    let mut barriers = Vec::new();
    tracker.transition(GpuResource::Texture(texture), ResourceState::Present, &mut barriers);
    if !barriers.is_empty() {
        encoder.resource_barriers(&barriers);
    }
    presenter.present(texture)?;
    Ok(())
}
