//! Packed, pool-allocated bounds storage for one pipeline [`Node`](crate::dag::Node).
//!
//! A [`BoundContents`] is a flat array of [`Span`]s partitioned by its
//! [`Layout`] into three regions: region-required, region-computed, and one
//! block of loop spans per stage. The pool exists because the search creates
//! millions of short-lived bounds; see `DESIGN.md` for why this is a free
//! list over growable blocks rather than a per-allocation `Vec`.

use crate::span::Span;
use std::cell::RefCell;
use std::rc::Rc;

/// Minimum number of entries per bulk-allocated block (spec §4.2).
const MIN_BLOCK_ENTRIES: usize = 32;

/// Fixes the three region offsets for one node's bounds array. Shared (via
/// `Rc`) by every [`BoundContents`] produced from it.
#[derive(Debug)]
pub struct Layout {
    /// Width of the region-required block (== node dimensionality).
    node_dims: usize,
    /// Offset at which the region-computed block starts.
    computed_offset: usize,
    /// Offset at which each stage's loop-span block starts, indexed by stage.
    loop_offset: Vec<usize>,
    /// Width of each stage's loop-span block.
    loop_dims: Vec<usize>,
    /// Total span-array length every `BoundContents` from this layout has.
    total_size: usize,
    pool: RefCell<Pool>,
}

#[derive(Debug, Default)]
struct Pool {
    free_list: Vec<Vec<Span>>,
    num_live: usize,
    num_blocks_allocated: usize,
}

impl Layout {
    /// Build a layout for a node with `node_dims` required/computed
    /// dimensions and one loop-span block per stage, each sized by
    /// `loop_dims_per_stage[stage_idx]`.
    pub fn new(node_dims: usize, loop_dims_per_stage: &[usize]) -> Rc<Layout> {
        let computed_offset = node_dims;
        let mut loop_offset = Vec::with_capacity(loop_dims_per_stage.len());
        let mut cursor = computed_offset + node_dims;
        for &width in loop_dims_per_stage {
            loop_offset.push(cursor);
            cursor += width;
        }
        Rc::new(Layout {
            node_dims,
            computed_offset,
            loop_offset,
            loop_dims: loop_dims_per_stage.to_vec(),
            total_size: cursor,
            pool: RefCell::new(Pool::default()),
        })
    }

    pub fn node_dims(&self) -> usize {
        self.node_dims
    }

    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn num_live(&self) -> usize {
        self.pool.borrow().num_live
    }

    /// Allocate a block large enough to amortize `Vec` growth: geometric
    /// growth over previously allocated blocks, never fewer than
    /// [`MIN_BLOCK_ENTRIES`] fresh buffers at a time.
    fn allocate_some_more(&self, pool: &mut Pool) {
        let growth = MIN_BLOCK_ENTRIES << pool.num_blocks_allocated.min(8);
        pool.num_blocks_allocated += 1;
        for _ in 0..growth {
            pool.free_list.push(vec![Span::empty(); self.total_size]);
        }
    }

    /// Pop a buffer from the free list (allocating a new block if empty) and
    /// wrap it as a live, refcounted `BoundContents`. There is no zeroing
    /// contract: the popped buffer holds whatever a prior occupant last
    /// wrote (or `Span::empty()` the first time a block is carved), and the
    /// caller is expected to populate every entry it reads before use.
    pub fn make(self: &Rc<Self>) -> BoundContents {
        let spans = {
            let mut pool = self.pool.borrow_mut();
            if pool.free_list.is_empty() {
                self.allocate_some_more(&mut pool);
            }
            pool.num_live += 1;
            pool.free_list.pop().expect("just replenished the free list")
        };
        BoundContents(Rc::new(BoundContentsSlot {
            layout: Rc::clone(self),
            spans: RefCell::new(spans),
        }))
    }

    /// Return a buffer to the free list. Called automatically when the last
    /// handle to a `BoundContents` produced by this layout is dropped.
    fn release(&self, mut spans: Vec<Span>) {
        let mut pool = self.pool.borrow_mut();
        debug_assert!(pool.num_live > 0, "Layout::release with no live BoundContents");
        pool.num_live -= 1;
        for s in &mut spans {
            *s = Span::empty();
        }
        pool.free_list.push(spans);
    }

    fn loop_offset(&self, stage_idx: usize) -> usize {
        self.loop_offset[stage_idx]
    }
}

impl Drop for Layout {
    fn drop(&mut self) {
        // Every live BoundContents holds an `Rc<Layout>` clone, so in safe
        // Rust this can only run once nothing references it; the assertion
        // documents the invariant the C++ source enforces by hand.
        debug_assert_eq!(
            self.pool.borrow().num_live,
            0,
            "Layout dropped with live BoundContents outstanding"
        );
    }
}

#[derive(Debug)]
struct BoundContentsSlot {
    layout: Rc<Layout>,
    spans: RefCell<Vec<Span>>,
}

impl Drop for BoundContentsSlot {
    fn drop(&mut self) {
        let spans = std::mem::take(&mut *self.spans.borrow_mut());
        self.layout.release(spans);
    }
}

/// A reference-counted, pool-backed span array for one node. Clones share
/// the same underlying buffer (the spec's "reference-counted... mutation
/// means copy-on-write": callers that need an independent copy must call
/// [`BoundContents::make_copy`] explicitly).
#[derive(Debug, Clone)]
pub struct BoundContents(Rc<BoundContentsSlot>);

impl BoundContents {
    pub fn layout(&self) -> &Rc<Layout> {
        &self.0.layout
    }

    fn get(&self, idx: usize) -> Span {
        self.0.spans.borrow()[idx]
    }

    fn set(&self, idx: usize, value: Span) {
        self.0.spans.borrow_mut()[idx] = value;
    }

    pub fn region_required(&self, dim: usize) -> Span {
        self.get(dim)
    }

    pub fn set_region_required(&self, dim: usize, value: Span) {
        self.set(dim, value);
    }

    pub fn region_computed(&self, dim: usize) -> Span {
        self.get(self.0.layout.computed_offset + dim)
    }

    pub fn set_region_computed(&self, dim: usize, value: Span) {
        self.set(self.0.layout.computed_offset + dim, value);
    }

    pub fn loop_span(&self, stage_idx: usize, loop_idx: usize) -> Span {
        self.get(self.0.layout.loop_offset(stage_idx) + loop_idx)
    }

    pub fn set_loop_span(&self, stage_idx: usize, loop_idx: usize, value: Span) {
        let idx = self.0.layout.loop_offset(stage_idx) + loop_idx;
        self.set(idx, value);
    }

    pub fn loop_dims(&self, stage_idx: usize) -> usize {
        self.0.layout.loop_dims[stage_idx]
    }

    /// Bitwise-copy the span array into a fresh pool slot from the same
    /// layout. Does not share pool entries with `self` — a write to one
    /// never affects the other.
    pub fn make_copy(&self) -> BoundContents {
        let copy = self.0.layout.make();
        let src = self.0.spans.borrow();
        copy.0.spans.borrow_mut().copy_from_slice(&src);
        copy
    }
}
