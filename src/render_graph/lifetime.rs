//! Resource lifetime analysis over the pruned pass order.

use std::collections::BTreeMap;

use crate::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::pass::{PassId, RenderPass};
use crate::render_graph::registry::{ResourceId, ResourceRegistry};

/// Inclusive span of execution indices during which a resource is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceLifecycle {
    pub id: ResourceId,
    pub begin: usize,
    pub end: usize,
}

impl ResourceLifecycle {
    pub fn new(id: ResourceId, begin: usize, end: usize) -> Self {
        debug_assert!(begin <= end);
        Self { id, begin, end }
    }

    /// Whether the two spans share at least one pass index.
    pub fn intersects(&self, other: &ResourceLifecycle) -> bool {
        fn endpoint_inside(r: &ResourceLifecycle, l: &ResourceLifecycle) -> bool {
            (r.begin <= l.begin && l.begin <= r.end) || (r.begin <= l.end && l.end <= r.end)
        }
        endpoint_inside(self, other) || endpoint_inside(other, self)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.begin <= index && index <= self.end
    }
}

/// Compute the lifecycle of every resource referenced by the ordered passes.
///
/// Results are sorted by id. `GraphOutput` is kept alive until the last
/// pass so nothing is aliased over it before presentation.
pub fn analyze_lifetimes(
    passes: &[RenderPass],
    order: &[PassId],
    registry: &ResourceRegistry,
) -> FrameGraphResult<Vec<ResourceLifecycle>> {
    let mut spans: BTreeMap<ResourceId, (usize, usize)> = BTreeMap::new();

    for (index, handle) in order.iter().enumerate() {
        let pass = &passes[handle.index()];
        for output in pass.outputs() {
            spans
                .entry(output.id)
                .and_modify(|span| span.1 = index)
                .or_insert((index, index));
        }
        for input in pass.inputs() {
            match spans.get_mut(&input.id) {
                Some(span) => span.1 = index,
                None => {
                    return Err(FrameGraphError::FirstUseIsInput {
                        resource: registry.display_name(input.id),
                        pass: pass.name().to_string(),
                    })
                }
            }
        }
    }

    if let Some(span) = spans.get_mut(&ResourceId::GRAPH_OUTPUT) {
        span.1 = order.len() - 1;
    }

    Ok(spans
        .into_iter()
        .map(|(id, (begin, end))| ResourceLifecycle::new(id, begin, end))
        .collect())
}
