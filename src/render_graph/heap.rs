//! Transient heap allocation.
//!
//! Resources whose lifecycles never overlap can share backing memory. Every
//! resource starts in a heap of its own and a [`PackingStrategy`] merges heaps
//! whose members are never alive at the same time. All members of a heap are
//! placed at offset 0, so a heap is as large as its largest member.

use crate::backend::types::{AllocationInfo, HeapHandle};
use crate::render_graph::lifetime::ResourceLifecycle;
use crate::render_graph::registry::ResourceId;

/// A resource that needs heap memory for the span of its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationRequest {
    pub lifecycle: ResourceLifecycle,
    pub info: AllocationInfo,
}

/// One backing heap and the resources aliased into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapInfo {
    pub size: u64,
    pub alignment: u64,
    pub lifecycles: Vec<ResourceLifecycle>,
    /// Device heap, set once the heap is created.
    pub heap: Option<HeapHandle>,
}

impl HeapInfo {
    fn seed(request: &AllocationRequest) -> Self {
        Self {
            size: request.info.size,
            alignment: request.info.alignment,
            lifecycles: vec![request.lifecycle],
            heap: None,
        }
    }

    /// No member of this heap is alive while `lifecycle` is.
    pub fn accepts(&self, lifecycle: &ResourceLifecycle) -> bool {
        !self.lifecycles.iter().any(|l| l.intersects(lifecycle))
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.lifecycles.iter().any(|l| l.id == id)
    }

    /// The member of this heap alive at `pass_index`, if any.
    pub fn member_at(&self, pass_index: usize) -> Option<ResourceId> {
        self.lifecycles
            .iter()
            .find(|l| l.contains(pass_index))
            .map(|l| l.id)
    }
}

/// Assigns allocation requests to heaps.
///
/// Implementations must never put two intersecting lifecycles in one heap,
/// must size each heap for its largest member and must only group members of
/// equal alignment.
pub trait PackingStrategy: std::fmt::Debug + Send + Sync {
    fn pack(&self, requests: &[AllocationRequest]) -> Vec<HeapInfo>;
}

/// One heap per request, largest first, ties broken by id.
pub fn seed_heaps(requests: &[AllocationRequest]) -> Vec<HeapInfo> {
    let mut sorted: Vec<&AllocationRequest> = requests.iter().collect();
    sorted.sort_by(|a, b| {
        b.info
            .size
            .cmp(&a.info.size)
            .then(a.lifecycle.id.cmp(&b.lifecycle.id))
    });
    sorted.into_iter().map(HeapInfo::seed).collect()
}

/// Disables aliasing: every resource keeps a dedicated heap.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAliasing;

impl PackingStrategy for NoAliasing {
    fn pack(&self, requests: &[AllocationRequest]) -> Vec<HeapInfo> {
        seed_heaps(requests)
    }
}

/// Greedy "largest fitting single-resource heap" merging.
///
/// For each heap A, the largest single-resource heap B that is no larger than
/// A, has the same alignment and does not intersect any lifecycle in A is
/// merged into A, then the scan restarts. Stops after a full scan without a
/// merge.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyAliasing;

impl GreedyAliasing {
    fn best_candidate(heaps: &[HeapInfo], target: usize) -> Option<usize> {
        let host = &heaps[target];
        let mut best: Option<usize> = None;
        for (index, candidate) in heaps.iter().enumerate() {
            if index == target
                || candidate.lifecycles.len() != 1
                || candidate.size > host.size
                || candidate.alignment != host.alignment
                || !host.accepts(&candidate.lifecycles[0])
            {
                continue;
            }
            if best.map_or(true, |current| candidate.size > heaps[current].size) {
                best = Some(index);
            }
        }
        best
    }
}

impl PackingStrategy for GreedyAliasing {
    fn pack(&self, requests: &[AllocationRequest]) -> Vec<HeapInfo> {
        let mut heaps = seed_heaps(requests);

        'scan: loop {
            for target in 0..heaps.len() {
                if let Some(candidate) = Self::best_candidate(&heaps, target) {
                    let merged = heaps.remove(candidate);
                    let target = if candidate < target { target - 1 } else { target };
                    heaps[target].lifecycles.extend(merged.lifecycles);
                    continue 'scan;
                }
            }
            break;
        }

        for heap in &mut heaps {
            heap.lifecycles.sort_by_key(|l| l.begin);
        }
        heaps
    }
}

/// First pair of resources sharing a heap while both alive, if any.
pub fn find_aliasing_overlap(heaps: &[HeapInfo]) -> Option<(ResourceId, ResourceId)> {
    heaps.iter().find_map(|heap| {
        heap.lifecycles.iter().enumerate().find_map(|(i, a)| {
            heap.lifecycles[i + 1..]
                .iter()
                .find(|b| a.intersects(b))
                .map(|b| (a.id, b.id))
        })
    })
}

/// Check that no heap holds two intersecting lifecycles.
pub fn heaps_are_disjoint(heaps: &[HeapInfo]) -> bool {
    find_aliasing_overlap(heaps).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::collections::HashMap;

    const ALIGN: u64 = 64 * 1024;

    fn request(id: u32, begin: usize, end: usize, size: u64, alignment: u64) -> AllocationRequest {
        AllocationRequest {
            lifecycle: ResourceLifecycle::new(ResourceId(id), begin, end),
            info: AllocationInfo { size, alignment },
        }
    }

    #[test]
    fn test_disjoint_lifetimes_share_a_heap() {
        let requests = [request(1, 0, 2, ALIGN, ALIGN), request(2, 3, 5, ALIGN, ALIGN)];
        let heaps = GreedyAliasing.pack(&requests);
        assert_eq!(heaps.len(), 1);
        assert_eq!(heaps[0].size, ALIGN);
        assert_eq!(heaps[0].lifecycles.len(), 2);
    }

    #[test]
    fn test_overlapping_lifetimes_get_distinct_heaps() {
        let requests = [request(1, 0, 3, ALIGN, ALIGN), request(2, 2, 5, ALIGN, ALIGN)];
        let heaps = GreedyAliasing.pack(&requests);
        assert_eq!(heaps.len(), 2);
        assert!(!heaps.iter().any(|h| h.contains(ResourceId(1)) && h.contains(ResourceId(2))));
    }

    #[test]
    fn test_heap_size_is_max_not_sum() {
        let requests = [
            request(1, 0, 1, 4 * ALIGN, ALIGN),
            request(2, 2, 3, 2 * ALIGN, ALIGN),
            request(3, 4, 5, 3 * ALIGN, ALIGN),
        ];
        let heaps = GreedyAliasing.pack(&requests);
        assert_eq!(heaps.len(), 1);
        assert_eq!(heaps[0].size, 4 * ALIGN);
    }

    #[test]
    fn test_alignment_mismatch_prevents_aliasing() {
        let requests = [
            request(1, 0, 1, 4 * ALIGN, 64 * ALIGN),
            request(2, 2, 3, ALIGN, ALIGN),
        ];
        assert_eq!(GreedyAliasing.pack(&requests).len(), 2);
    }

    #[test]
    fn test_prefers_largest_fitting_candidate() {
        // Host [0,1] can take either 2 or 3, they overlap each other; the
        // larger one wins.
        let requests = [
            request(1, 0, 1, 8 * ALIGN, ALIGN),
            request(2, 2, 4, 2 * ALIGN, ALIGN),
            request(3, 3, 5, 6 * ALIGN, ALIGN),
        ];
        let heaps = GreedyAliasing.pack(&requests);
        let host = heaps.iter().find(|h| h.contains(ResourceId(1))).unwrap();
        assert!(host.contains(ResourceId(3)));
        assert!(!host.contains(ResourceId(2)));
    }

    #[test]
    fn test_overlap_detection() {
        let heap = HeapInfo {
            size: ALIGN,
            alignment: ALIGN,
            lifecycles: vec![
                ResourceLifecycle::new(ResourceId(1), 0, 3),
                ResourceLifecycle::new(ResourceId(2), 3, 4),
            ],
            heap: None,
        };
        assert_eq!(
            find_aliasing_overlap(&[heap]),
            Some((ResourceId(1), ResourceId(2)))
        );
    }

    #[test]
    fn test_no_aliasing_strategy() {
        let requests = [request(1, 0, 2, ALIGN, ALIGN), request(2, 3, 5, ALIGN, ALIGN)];
        assert_eq!(NoAliasing.pack(&requests).len(), 2);
    }

    #[test]
    fn test_member_lookup() {
        let requests = [request(1, 0, 2, ALIGN, ALIGN), request(2, 3, 5, ALIGN, ALIGN)];
        let heap = &GreedyAliasing.pack(&requests)[0];
        assert_eq!(heap.member_at(1), Some(ResourceId(1)));
        assert_eq!(heap.member_at(4), Some(ResourceId(2)));
        assert_eq!(heap.member_at(6), None);
    }

    #[test]
    fn test_random_lifetimes_never_share_overlapping_heaps() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let alignments = [ALIGN, 64 * ALIGN];

        for _ in 0..200 {
            let count = rng.gen_range(1..40);
            let requests: Vec<AllocationRequest> = (0..count)
                .map(|i| {
                    let begin = rng.gen_range(0..20);
                    let end = begin + rng.gen_range(0..6);
                    let alignment = alignments[rng.gen_range(0..alignments.len())];
                    let size = alignment * rng.gen_range(1..8);
                    request(i + 1, begin, end, size, alignment)
                })
                .collect();
            let by_id: HashMap<ResourceId, AllocationInfo> = requests
                .iter()
                .map(|r| (r.lifecycle.id, r.info))
                .collect();

            for strategy in [&GreedyAliasing as &dyn PackingStrategy, &NoAliasing] {
                let heaps = strategy.pack(&requests);
                assert!(heaps_are_disjoint(&heaps));

                let placed: usize = heaps.iter().map(|h| h.lifecycles.len()).sum();
                assert_eq!(placed, requests.len());

                for heap in &heaps {
                    for lifecycle in &heap.lifecycles {
                        let info = by_id[&lifecycle.id];
                        assert!(heap.size >= info.size);
                        assert_eq!(heap.alignment, info.alignment);
                    }
                }
            }
        }
    }

    #[test]
    fn test_packing_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(7);
        let requests: Vec<AllocationRequest> = (0..30)
            .map(|i| {
                let begin = rng.gen_range(0..10);
                request(i + 1, begin, begin + rng.gen_range(0..4), ALIGN * rng.gen_range(1..4), ALIGN)
            })
            .collect();
        assert_eq!(GreedyAliasing.pack(&requests), GreedyAliasing.pack(&requests));
    }
}
