//! Pass ordering: layered topological sort and dead pass pruning.
//!
//! A pass depends on another when one of its inputs is one of the other's
//! outputs. Sorting groups passes into layers of mutually independent passes;
//! pruning then walks the layers backwards from
//! [`ResourceId::GRAPH_OUTPUT`] and keeps only the passes whose outputs are
//! (transitively) consumed.

use std::collections::{HashMap, HashSet};

use crate::error::{FrameGraphError, FrameGraphResult};
use crate::render_graph::pass::{PassId, RenderPass};
use crate::render_graph::registry::{ResourceId, ResourceRegistry};

/// Map every written resource to the single pass producing it.
///
/// Two passes writing the same id is rejected: the lifetime start of such a
/// resource would depend on intra-layer order.
pub fn find_producers(
    passes: &[RenderPass],
    registry: &ResourceRegistry,
) -> FrameGraphResult<HashMap<ResourceId, PassId>> {
    let mut producers: HashMap<ResourceId, PassId> = HashMap::new();
    for (index, pass) in passes.iter().enumerate() {
        let handle = PassId(index as u32);
        for output in pass.outputs() {
            if let Some(&first) = producers.get(&output.id) {
                return Err(FrameGraphError::MultipleProducers {
                    resource: registry.display_name(output.id),
                    first: passes[first.index()].name().to_string(),
                    second: pass.name().to_string(),
                });
            }
            producers.insert(output.id, handle);
        }
    }

    // Every input must be produced by someone, otherwise its first touch
    // would be a read.
    for pass in passes {
        for input in pass.inputs() {
            if !producers.contains_key(&input.id) {
                return Err(FrameGraphError::FirstUseIsInput {
                    resource: registry.display_name(input.id),
                    pass: pass.name().to_string(),
                });
            }
        }
    }

    Ok(producers)
}

/// Layered Kahn's algorithm.
///
/// Each layer holds every pass whose dependencies are all in earlier layers,
/// in declaration order. A round that resolves nothing while passes remain
/// means a cycle.
pub fn topological_sort(
    passes: &[RenderPass],
    producers: &HashMap<ResourceId, PassId>,
) -> FrameGraphResult<Vec<Vec<PassId>>> {
    let dependencies: Vec<HashSet<PassId>> = passes
        .iter()
        .enumerate()
        .map(|(index, pass)| {
            pass.inputs()
                .iter()
                .filter_map(|input| producers.get(&input.id).copied())
                .filter(|producer| producer.index() != index)
                .collect()
        })
        .collect();

    let mut resolved = vec![false; passes.len()];
    let mut remaining: Vec<PassId> = (0..passes.len() as u32).map(PassId).collect();
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let layer: Vec<PassId> = remaining
            .iter()
            .copied()
            .filter(|pass| {
                dependencies[pass.index()]
                    .iter()
                    .all(|dependency| resolved[dependency.index()])
            })
            .collect();

        if layer.is_empty() {
            return Err(FrameGraphError::CyclicDependency {
                passes: remaining
                    .iter()
                    .map(|pass| passes[pass.index()].name().to_string())
                    .collect(),
            });
        }

        for pass in &layer {
            resolved[pass.index()] = true;
        }
        remaining.retain(|pass| !resolved[pass.index()]);
        layers.push(layer);
    }

    Ok(layers)
}

/// Mark-and-sweep over the sorted layers, rooted at `GraphOutput`.
///
/// Returns the live passes in execution order.
pub fn prune_dead_passes(passes: &[RenderPass], layers: &[Vec<PassId>]) -> Vec<PassId> {
    let mut used: HashSet<ResourceId> = HashSet::from([ResourceId::GRAPH_OUTPUT]);
    let mut live = vec![false; passes.len()];

    for layer in layers.iter().rev() {
        for &handle in layer {
            let pass = &passes[handle.index()];
            if pass.outputs().iter().any(|output| used.contains(&output.id)) {
                live[handle.index()] = true;
                used.extend(pass.inputs().iter().map(|input| input.id));
            }
        }
    }

    layers
        .iter()
        .flatten()
        .copied()
        .filter(|handle| live[handle.index()])
        .collect()
}

/// Static execution plan of a graph: independent of frame metadata, so it is
/// computed once at construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOrder {
    pub layers: Vec<Vec<PassId>>,
    /// Live passes in execution order.
    pub live: Vec<PassId>,
    /// Passes dropped by pruning, in declaration order.
    pub pruned: Vec<PassId>,
    /// Liveness indexed by declaration index.
    live_mask: Vec<bool>,
}

impl PassOrder {
    pub fn compile(passes: &[RenderPass], registry: &ResourceRegistry) -> FrameGraphResult<Self> {
        let producers = find_producers(passes, registry)?;
        let layers = topological_sort(passes, &producers)?;
        let live = prune_dead_passes(passes, &layers);

        let mut live_mask = vec![false; passes.len()];
        for handle in &live {
            live_mask[handle.index()] = true;
        }
        let pruned: Vec<PassId> = (0..passes.len() as u32)
            .map(PassId)
            .filter(|handle| !live_mask[handle.index()])
            .collect();

        for handle in &pruned {
            log::debug!(
                "Pruning pass '{}': no output reaches {}",
                passes[handle.index()].name(),
                crate::render_graph::registry::GRAPH_OUTPUT_NAME
            );
        }

        Ok(Self {
            layers,
            live,
            pruned,
            live_mask,
        })
    }

    pub fn is_live(&self, handle: PassId) -> bool {
        self.live_mask.get(handle.index()).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_graph::pass::{InputKind, OutputKind};
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    struct Ids {
        registry: ResourceRegistry,
    }

    impl Ids {
        fn new() -> Self {
            Self {
                registry: ResourceRegistry::new(),
            }
        }

        fn id(&mut self, name: &str) -> ResourceId {
            self.registry.resource_id(name)
        }
    }

    fn pass(name: &str, inputs: &[ResourceId], outputs: &[ResourceId]) -> RenderPass {
        let mut pass = RenderPass::new(name);
        for &id in inputs {
            pass = pass.read(id, InputKind::ShaderRead);
        }
        for &id in outputs {
            pass = pass.write(id, OutputKind::RenderTarget);
        }
        pass
    }

    fn position(layers: &[Vec<PassId>], handle: PassId) -> usize {
        layers
            .iter()
            .position(|layer| layer.contains(&handle))
            .unwrap()
    }

    #[test]
    fn test_sort_empty_graph() {
        let registry = ResourceRegistry::new();
        let order = PassOrder::compile(&[], &registry).unwrap();
        assert!(order.layers.is_empty());
        assert!(order.live.is_empty());
    }

    #[test]
    fn test_sort_linear_chain() {
        let mut ids = Ids::new();
        let (x, y) = (ids.id("X"), ids.id("Y"));
        let passes = vec![
            pass("C", &[y], &[ResourceId::GRAPH_OUTPUT]),
            pass("B", &[x], &[y]),
            pass("A", &[], &[x]),
        ];
        let producers = find_producers(&passes, &ids.registry).unwrap();
        let layers = topological_sort(&passes, &producers).unwrap();
        assert_eq!(
            layers,
            vec![vec![PassId(2)], vec![PassId(1)], vec![PassId(0)]]
        );
    }

    #[test]
    fn test_sort_diamond_layers() {
        //     A
        //    / \
        //   B   C
        //    \ /
        //     D
        let mut ids = Ids::new();
        let (a, b, c) = (ids.id("a"), ids.id("b"), ids.id("c"));
        let passes = vec![
            pass("A", &[], &[a]),
            pass("B", &[a], &[b]),
            pass("C", &[a], &[c]),
            pass("D", &[b, c], &[ResourceId::GRAPH_OUTPUT]),
        ];
        let producers = find_producers(&passes, &ids.registry).unwrap();
        let layers = topological_sort(&passes, &producers).unwrap();
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[1].len(), 2);
        assert!(layers[1].contains(&PassId(1)) && layers[1].contains(&PassId(2)));
    }

    #[test]
    fn test_sort_cycle_is_reported() {
        let mut ids = Ids::new();
        let (x, y) = (ids.id("X"), ids.id("Y"));
        let passes = vec![
            pass("free", &[], &[ResourceId::GRAPH_OUTPUT]),
            pass("A", &[y], &[x]),
            pass("B", &[x], &[y]),
        ];
        let result = PassOrder::compile(&passes, &ids.registry);
        assert_eq!(
            result,
            Err(FrameGraphError::CyclicDependency {
                passes: vec!["A".into(), "B".into()]
            })
        );
    }

    #[test]
    fn test_multiple_producers_rejected() {
        let mut ids = Ids::new();
        let x = ids.id("X");
        let passes = vec![pass("A", &[], &[x]), pass("B", &[], &[x])];
        assert_eq!(
            find_producers(&passes, &ids.registry),
            Err(FrameGraphError::MultipleProducers {
                resource: "X".into(),
                first: "A".into(),
                second: "B".into()
            })
        );
    }

    #[test]
    fn test_unproduced_input_rejected() {
        let mut ids = Ids::new();
        let x = ids.id("X");
        let passes = vec![pass("A", &[x], &[ResourceId::GRAPH_OUTPUT])];
        assert!(matches!(
            find_producers(&passes, &ids.registry),
            Err(FrameGraphError::FirstUseIsInput { .. })
        ));
    }

    #[test]
    fn test_prune_unconsumed_pass() {
        let mut ids = Ids::new();
        let (x, z) = (ids.id("X"), ids.id("Z"));
        let passes = vec![
            pass("A", &[], &[x]),
            pass("D", &[], &[z]),
            pass("B", &[x], &[ResourceId::GRAPH_OUTPUT]),
        ];
        let order = PassOrder::compile(&passes, &ids.registry).unwrap();
        assert_eq!(order.live, vec![PassId(0), PassId(2)]);
        assert_eq!(order.pruned, vec![PassId(1)]);
        assert!(!order.is_live(PassId(1)));
    }

    #[test]
    fn test_prune_transitive_dead_chain() {
        // A -> B -> (unused), C -> GraphOutput
        let mut ids = Ids::new();
        let (a, b) = (ids.id("a"), ids.id("b"));
        let passes = vec![
            pass("A", &[], &[a]),
            pass("B", &[a], &[b]),
            pass("C", &[], &[ResourceId::GRAPH_OUTPUT]),
        ];
        let order = PassOrder::compile(&passes, &ids.registry).unwrap();
        assert_eq!(order.live, vec![PassId(2)]);
        assert_eq!(order.pruned, vec![PassId(0), PassId(1)]);
    }

    #[test]
    fn test_prune_without_graph_output_drops_everything() {
        let mut ids = Ids::new();
        let a = ids.id("a");
        let passes = vec![pass("A", &[], &[a])];
        let order = PassOrder::compile(&passes, &ids.registry).unwrap();
        assert!(order.live.is_empty());
    }

    #[test]
    fn test_prune_is_idempotent() {
        let mut ids = Ids::new();
        let (a, b, c) = (ids.id("a"), ids.id("b"), ids.id("c"));
        let passes = vec![
            pass("A", &[], &[a]),
            pass("B", &[a], &[b]),
            pass("C", &[a], &[c]),
            pass("D", &[b], &[ResourceId::GRAPH_OUTPUT]),
        ];
        let producers = find_producers(&passes, &ids.registry).unwrap();
        let layers = topological_sort(&passes, &producers).unwrap();
        let live = prune_dead_passes(&passes, &layers);

        let live_layers: Vec<Vec<PassId>> = layers
            .iter()
            .map(|layer| layer.iter().copied().filter(|p| live.contains(p)).collect())
            .collect();
        assert_eq!(prune_dead_passes(&passes, &live_layers), live);
        assert_eq!(prune_dead_passes(&passes, &layers), live);
    }

    #[test]
    fn test_random_dags_order_producers_first() {
        let mut rng = StdRng::seed_from_u64(0xda6);

        for _ in 0..100 {
            let count = rng.gen_range(1..30);
            let mut ids = Ids::new();
            let targets: Vec<ResourceId> = (0..count).map(|i| ids.id(&format!("r{i}"))).collect();

            // Pass i writes r_i and reads a few earlier targets, so the
            // generated graph is acyclic; declaration order is shuffled.
            let mut passes: Vec<RenderPass> = (0..count)
                .map(|i| {
                    let inputs: Vec<ResourceId> = (0..i)
                        .filter(|_| rng.gen_bool(0.2))
                        .map(|j| targets[j])
                        .collect();
                    let output = if i + 1 == count && rng.gen_bool(0.8) {
                        ResourceId::GRAPH_OUTPUT
                    } else {
                        targets[i]
                    };
                    pass(&format!("p{i}"), &inputs, &[output])
                })
                .collect();
            passes.shuffle(&mut rng);

            let order = PassOrder::compile(&passes, &ids.registry).unwrap();
            let placed: usize = order.layers.iter().map(Vec::len).sum();
            assert_eq!(placed, passes.len());

            let producers = find_producers(&passes, &ids.registry).unwrap();
            for (index, consumer) in passes.iter().enumerate() {
                for input in consumer.inputs() {
                    let producer = producers[&input.id];
                    assert!(
                        position(&order.layers, producer)
                            < position(&order.layers, PassId(index as u32))
                    );
                }
            }

            for index in 0..passes.len() as u32 {
                let handle = PassId(index);
                assert_eq!(order.is_live(handle), order.live.contains(&handle));
                assert_ne!(order.is_live(handle), order.pruned.contains(&handle));
            }
        }
    }

    #[test]
    fn test_token_edges_order_passes() {
        let mut ids = Ids::new();
        let sync = ids.id("Sync");
        let passes = vec![
            RenderPass::new("present")
                .read(sync, InputKind::Token)
                .write(ResourceId::GRAPH_OUTPUT, OutputKind::RenderTarget),
            RenderPass::new("upload").write(sync, OutputKind::Token),
        ];
        let order = PassOrder::compile(&passes, &ids.registry).unwrap();
        assert_eq!(order.live, vec![PassId(1), PassId(0)]);
        assert!(position(&order.layers, PassId(1)) < position(&order.layers, PassId(0)));
    }
}
